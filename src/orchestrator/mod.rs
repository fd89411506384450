//! Run orchestration
//!
//! [`RunOrchestrator`] owns the run registry, the per-run event buses and the
//! process-wide screenshot limiter. Every `start_*` call validates its input,
//! registers the run, publishes `run_started` and hands the task list to a
//! background driver before returning the run id.
//!
//! - [`bus`] - per-run bounded event log and subscriptions
//! - [`registry`] - run state behind one mutex
//! - [`driver`] - bounded worker pool that executes one run

mod bus;
mod driver;
mod registry;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use bus::{BusMessage, Subscription};

use crate::config::Config;
use crate::dns::{DomainResolver, SystemResolver};
use crate::error::{Error, Result};
use crate::executor::{CheckExecutor, DnsExecutor, TaskRunner};
use crate::probe::{NetworkProbe, ReqwestProbe};
use crate::screenshot::{
    CommandScreenshotRenderer, NoOpScreenshotRenderer, ScreenshotLimiter, ScreenshotOptions,
    ScreenshotRenderer,
};
use crate::session::{SessionProvider, SoaxPortSessionProvider};
use crate::types::{
    CheckTask, DnsRunParams, DnsTask, MultiGeoParams, RunEvent, RunId, RunKind, RunParams,
    RunProgress, RunRecord,
};
use chrono::Utc;
use driver::DriveSettings;
use registry::Registry;
use std::sync::Arc;

/// External services a run talks to
///
/// Built from configuration by [`Collaborators::from_config`]; tests swap in
/// scripted fakes.
#[derive(Clone)]
pub struct Collaborators {
    /// Proxy session source for URL checks
    pub sessions: Arc<dyn SessionProvider>,
    /// Timed HTTP request through a session
    pub probe: Arc<dyn NetworkProbe>,
    /// Screenshot capture
    pub renderer: Arc<dyn ScreenshotRenderer>,
    /// DNS/whois lookups
    pub resolver: Arc<dyn DomainResolver>,
}

impl Collaborators {
    /// Production collaborators for `config`
    ///
    /// The screenshot renderer is the configured command, else
    /// `geoprobe-screenshot` from `PATH`, else a no-op renderer whose
    /// failures degrade into task notes.
    pub fn from_config(config: &Config) -> Result<Self> {
        let renderer: Arc<dyn ScreenshotRenderer> = match &config.screenshots.command {
            Some(command) => Arc::new(
                CommandScreenshotRenderer::new(command.clone())
                    .with_args(config.screenshots.args.clone()),
            ),
            None => CommandScreenshotRenderer::from_path()
                .map(|r| Arc::new(r) as Arc<dyn ScreenshotRenderer>)
                .unwrap_or_else(|| Arc::new(NoOpScreenshotRenderer)),
        };

        Ok(Self {
            sessions: Arc::new(SoaxPortSessionProvider::new(config.soax.clone())),
            probe: Arc::new(ReqwestProbe::new(&config.http_client)),
            renderer,
            resolver: Arc::new(SystemResolver::new(
                config.dns_checker.clone(),
                config.paths.logs_dir.clone(),
            )?),
        })
    }
}

/// Starts runs and exposes their progress and events (cloneable; all fields are Arc-wrapped)
#[derive(Clone)]
pub struct RunOrchestrator {
    config: Arc<Config>,
    registry: Arc<Registry>,
    checks: Arc<CheckExecutor>,
    lookups: Arc<DnsExecutor>,
    limiter: ScreenshotLimiter,
}

impl RunOrchestrator {
    /// Create an orchestrator with production collaborators
    pub async fn new(config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Self::with_collaborators(config, collaborators).await
    }

    /// Create an orchestrator over the given collaborators
    ///
    /// Validates `config`, creates the output directory and builds the
    /// screenshot limiter every run will share.
    pub async fn with_collaborators(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.paths.logs_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create logs directory '{}': {}",
                        config.paths.logs_dir.display(),
                        e
                    ),
                ))
            })?;

        let limiter = ScreenshotLimiter::new(config.screenshots.max_workers);
        let checks = CheckExecutor::new(
            collaborators.sessions.clone(),
            collaborators.probe.clone(),
            collaborators.renderer.clone(),
            limiter.clone(),
            ScreenshotOptions::from_config(&config.screenshots, &config.http_client),
            config.paths.logs_dir.clone(),
        );
        let lookups = DnsExecutor::new(collaborators.resolver.clone());

        tracing::info!(
            sessions = collaborators.sessions.name(),
            probe = collaborators.probe.name(),
            renderer = collaborators.renderer.name(),
            resolver = collaborators.resolver.name(),
            max_concurrency = config.execution.max_concurrency,
            screenshot_workers = limiter.capacity(),
            "orchestrator initialized"
        );

        Ok(Self {
            registry: Arc::new(Registry::new(config.execution.event_buffer)),
            config: Arc::new(config),
            checks: Arc::new(checks),
            lookups: Arc::new(lookups),
            limiter,
        })
    }

    /// Start a URL check run for one country
    ///
    /// # Errors
    ///
    /// `Error::Validation` when no non-blank target or no country is given.
    pub async fn start_run(&self, params: RunParams) -> Result<RunId> {
        let targets = non_blank(&params.targets);
        if targets.is_empty() {
            return Err(Error::Validation("at least one target is required".into()));
        }
        let country = params.country.trim().to_string();
        if country.is_empty() {
            return Err(Error::Validation("country is required".into()));
        }

        let settings = params.settings();
        let sticky = params.sticky_policy.resolve(targets.len());
        let params = Arc::new(params);

        let total = targets.len();
        self.launch(RunKind::Single, settings, self.checks.clone(), total, |run_id| {
            targets
                .iter()
                .map(|target| CheckTask {
                    run_id: run_id.clone(),
                    target: target.clone(),
                    country: country.clone(),
                    sticky,
                    params: params.clone(),
                })
                .collect()
        })
    }

    /// Start a DNS/whois run
    ///
    /// # Errors
    ///
    /// `Error::Validation` when no non-blank domain is given.
    pub async fn start_dns_run(&self, params: DnsRunParams) -> Result<RunId> {
        let domains = non_blank(&params.targets);
        if domains.is_empty() {
            return Err(Error::Validation("at least one domain is required".into()));
        }

        let total = domains.len();
        self.launch(RunKind::Dns, params.settings(), self.lookups.clone(), total, |run_id| {
            domains
                .iter()
                .map(|domain| DnsTask {
                    run_id: run_id.clone(),
                    domain: domain.clone(),
                })
                .collect()
        })
    }

    /// Start a run checking every target from every country
    ///
    /// Tasks are ordered target-major: all countries for the first target,
    /// then the next target.
    ///
    /// # Errors
    ///
    /// `Error::Validation` when no non-blank target or country is given.
    pub async fn start_multi_geo_run(&self, params: MultiGeoParams) -> Result<RunId> {
        let targets = non_blank(&params.base.targets);
        if targets.is_empty() {
            return Err(Error::Validation("at least one target is required".into()));
        }
        let countries = non_blank(&params.countries);
        if countries.is_empty() {
            return Err(Error::Validation("at least one country is required".into()));
        }

        let settings = params.settings();
        let sticky = params.base.sticky_policy.resolve(targets.len());
        let base = Arc::new(params.base);

        let total = targets.len() * countries.len();
        self.launch(RunKind::MultiGeo, settings, self.checks.clone(), total, |run_id| {
            targets
                .iter()
                .flat_map(|target| {
                    countries.iter().map(|country| CheckTask {
                        run_id: run_id.clone(),
                        target: target.clone(),
                        country: country.clone(),
                        sticky,
                        params: base.clone(),
                    })
                })
                .collect()
        })
    }

    /// Progress snapshot, or `None` for an unknown run
    pub fn run_state(&self, run_id: &RunId) -> Option<RunProgress> {
        self.registry.progress(run_id)
    }

    /// Records finished so far, in completion order
    pub fn run_records(&self, run_id: &RunId) -> Option<Vec<RunRecord>> {
        self.registry.records(run_id)
    }

    /// Kind of a known run
    pub fn run_kind(&self, run_id: &RunId) -> Option<RunKind> {
        self.registry.kind(run_id)
    }

    /// Follow a run's events
    ///
    /// A subscription to a finished or unknown run yields `End` at once.
    pub fn subscribe(&self, run_id: &RunId) -> Subscription {
        self.registry.subscribe(run_id)
    }

    /// Configuration this orchestrator was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The limiter shared by every run
    pub fn screenshot_limiter(&self) -> &ScreenshotLimiter {
        &self.limiter
    }

    fn launch<R, F>(
        &self,
        kind: RunKind,
        settings: serde_json::Value,
        runner: Arc<R>,
        total: usize,
        build: F,
    ) -> Result<RunId>
    where
        R: TaskRunner,
        F: FnOnce(&RunId) -> Vec<R::Task>,
    {
        let run_id = self.register_unique(kind, total)?;
        let tasks = build(&run_id);

        self.registry.publish(
            &run_id,
            RunEvent::RunStarted {
                run_id: run_id.clone(),
                ts: Utc::now(),
                kind,
                settings,
            },
        );

        let drive_settings = DriveSettings {
            max_concurrency: self.config.execution.max_concurrency,
            write_summary: self.config.execution.write_run_summary,
            logs_dir: self.config.paths.logs_dir.clone(),
        };
        tokio::spawn(driver::drive(
            self.registry.clone(),
            runner,
            run_id.clone(),
            tasks,
            drive_settings,
        ));

        Ok(run_id)
    }

    fn register_unique(&self, kind: RunKind, total: usize) -> Result<RunId> {
        for _ in 0..8 {
            let run_id = RunId::generate();
            if self.registry.register(&run_id, kind, total) {
                return Ok(run_id);
            }
        }
        Err(Error::Other("could not allocate a unique run id".into()))
    }
}

/// Trimmed, non-blank entries in their original order
fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
