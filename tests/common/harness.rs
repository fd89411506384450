//! Orchestrator construction and event collection

use geoprobe::probe::ReqwestProbe;
use geoprobe::screenshot::ScreenshotRenderer;
use geoprobe::{
    BusMessage, Collaborators, Config, RunEvent, RunId, RunOrchestrator, RunParams, RunTotals,
    SoaxPortSessionProvider, TaskRecord,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use super::fakes::StaticResolver;

/// Config writing into `dir`, with SOAX credentials so sessions can be built
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.paths.logs_dir = dir.path().join("logs");
    config.paths.data_dir = dir.path().join("data");
    config.soax.port_login = "package-123-sessionlength-300".into();
    config
}

/// Real SOAX session provider and reqwest probe with the given renderer
pub fn collaborators(config: &Config, renderer: Arc<dyn ScreenshotRenderer>) -> Collaborators {
    Collaborators {
        sessions: Arc::new(SoaxPortSessionProvider::new(config.soax.clone())),
        probe: Arc::new(ReqwestProbe::new(&config.http_client)),
        renderer,
        resolver: Arc::new(StaticResolver),
    }
}

pub async fn orchestrator(config: Config, renderer: Arc<dyn ScreenshotRenderer>) -> RunOrchestrator {
    let collaborators = collaborators(&config, renderer);
    RunOrchestrator::with_collaborators(config, collaborators)
        .await
        .unwrap()
}

/// Run parameters routing every request through `127.0.0.1:port`
pub fn params_via(port: u16, targets: &[&str]) -> RunParams {
    RunParams {
        targets: targets.iter().map(|t| t.to_string()).collect(),
        country: "TR".into(),
        proxy_host: Some("127.0.0.1".into()),
        proxy_port: Some(port),
        ..Default::default()
    }
}

/// Drain a run's events until `End`
pub async fn collect_events(orchestrator: &RunOrchestrator, run_id: &RunId) -> Vec<RunEvent> {
    let mut subscription = orchestrator.subscribe(run_id);
    tokio::time::timeout(Duration::from_secs(30), async {
        let mut events = Vec::new();
        while let BusMessage::Event(event) = subscription.next().await {
            events.push(event);
        }
        events
    })
    .await
    .unwrap_or_else(|_| panic!("run {run_id} did not finish within 30s"))
}

pub fn totals(events: &[RunEvent]) -> RunTotals {
    match events.last() {
        Some(RunEvent::RunFinished { totals, .. }) => *totals,
        other => panic!("last event is not run_finished: {other:?}"),
    }
}

pub fn check_records(events: &[RunEvent]) -> Vec<TaskRecord> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::CheckFinished { record, .. } => Some(record.clone()),
            _ => None,
        })
        .collect()
}
