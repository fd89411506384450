//! # geoprobe
//!
//! Batch reachability checks through geo-targeted proxies, with live
//! progress streaming.
//!
//! An operator submits a batch of targets (URLs, domains, or URL × country
//! pairs). Each target becomes an independent task that acquires a proxy
//! session, performs a timed request, optionally captures a screenshot and
//! writes a markdown report. Progress is published on a per-run event bus
//! that any number of observers can follow until the run finishes.
//!
//! ## Design
//!
//! - **In-memory** - Runs live until the process exits; nothing is persisted
//!   except the report artifacts
//! - **Never fails per task** - Every problem becomes a classified record
//! - **Bounded** - Workers per run and screenshot renders per process are
//!   both limited by semaphores
//! - **Event-driven** - Observers drain a subscription until `End`
//!
//! ## Quick Start
//!
//! ```no_run
//! use geoprobe::{BusMessage, Config, RunOrchestrator, RunParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = RunOrchestrator::new(Config::default()).await?;
//!
//!     let run_id = orchestrator
//!         .start_run(RunParams {
//!             targets: vec!["example.com".into()],
//!             country: "US".into(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let mut events = orchestrator.subscribe(&run_id);
//!     while let BusMessage::Event(event) = events.next().await {
//!         println!("{}", serde_json::to_string(&event)?);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Geo catalog of regions, cities and ISPs
pub mod catalog;
/// Outcome classification
pub mod classifier;
/// Configuration types and loading
pub mod config;
/// DNS and whois lookups
pub mod dns;
/// Error types
pub mod error;
/// Task execution
pub mod executor;
/// Run lifecycle, worker pool and event bus
pub mod orchestrator;
/// Timed HTTP requests through a proxy session
pub mod probe;
/// Markdown report cards and run summaries
pub mod report;
/// Screenshot rendering
pub mod screenshot;
/// Proxy session providers
pub mod session;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use catalog::GeoCatalog;
pub use classifier::classify;
pub use config::{Config, ConfigLoad, ConfigLoader};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use executor::{CheckExecutor, DnsExecutor, TaskRunner};
pub use orchestrator::{BusMessage, Collaborators, RunOrchestrator, Subscription};
pub use screenshot::{
    CommandScreenshotRenderer, NoOpScreenshotRenderer, ScreenshotLimiter, ScreenshotRenderer,
};
pub use session::{ProxySession, SessionProvider, SoaxPortSessionProvider};
pub use types::{
    CheckTask, Classification, DnsMode, DnsRecord, DnsRunParams, DnsTask, MultiGeoParams,
    ProxyType, RunEvent, RunId, RunKind, RunParams, RunProgress, RunRecord, RunTotals,
    StickyPolicy, TaskRecord, Timings,
};

/// Serve the REST API until a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use geoprobe::{Config, RunOrchestrator, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let orchestrator = RunOrchestrator::new(config.clone()).await?;
///
///     run_with_shutdown(orchestrator, config).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(orchestrator: RunOrchestrator, config: Config) -> Result<()> {
    api::start_api_server(
        std::sync::Arc::new(orchestrator),
        std::sync::Arc::new(config),
        wait_for_signal(),
    )
    .await
}

/// Resolve once SIGTERM or SIGINT arrives
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal handlers may fail to register in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Resolve once Ctrl+C arrives
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
