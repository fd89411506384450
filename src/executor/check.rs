//! URL check task runner

use super::TaskRunner;
use crate::classifier::classify;
use crate::probe::NetworkProbe;
use crate::report::{ReportCard, render_report_card};
use crate::screenshot::{ScreenshotLimiter, ScreenshotOptions, ScreenshotRenderer};
use crate::session::{ProxySession, SessionProvider};
use crate::types::{CheckTask, Classification, RunEvent, RunRecord, TaskRecord, Timings};
use crate::utils::{
    NormalizedTarget, artifact_base_name, create_unique_file, ensure_day_dir, normalize_url,
    relative_path, unique_file_path,
};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Runs one URL check end to end
///
/// Holds the collaborators a check needs. The screenshot limiter is shared
/// with every other executor built by the same orchestrator.
#[derive(Clone)]
pub struct CheckExecutor {
    sessions: Arc<dyn SessionProvider>,
    probe: Arc<dyn NetworkProbe>,
    renderer: Arc<dyn ScreenshotRenderer>,
    limiter: ScreenshotLimiter,
    screenshot_options: ScreenshotOptions,
    logs_dir: PathBuf,
}

/// Outcome of the network phase of a check
#[derive(Default)]
struct Measurement {
    session: Option<ProxySession>,
    error: Option<String>,
    status: Option<u16>,
    bytes: Option<u64>,
    redirects: Vec<crate::types::RedirectHop>,
    timings: Timings,
    /// Session debug payload, or the acquisition error
    debug_info: serde_json::Value,
}

impl CheckExecutor {
    /// Create an executor from its collaborators
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        probe: Arc<dyn NetworkProbe>,
        renderer: Arc<dyn ScreenshotRenderer>,
        limiter: ScreenshotLimiter,
        screenshot_options: ScreenshotOptions,
        logs_dir: PathBuf,
    ) -> Self {
        Self {
            sessions,
            probe,
            renderer,
            limiter,
            screenshot_options,
            logs_dir,
        }
    }

    /// Run `task`; always returns a classified record
    pub async fn execute(&self, task: &CheckTask) -> TaskRecord {
        let started = Local::now();
        let target = normalize_url(&task.target);
        let base_name = artifact_base_name(started, &target.host);
        tracing::debug!(run_id = %task.run_id, url = %target.url, "check started");

        let measured = self.measure(task, &target).await;
        let result = classify(measured.error.as_deref(), measured.status);
        tracing::debug!(run_id = %task.run_id, url = %target.url, result = %result, "check classified");

        let mut record = TaskRecord {
            url: task.target.clone(),
            country: task.country.clone(),
            result,
            http_code: measured.status,
            bytes: measured.bytes,
            timings: measured.timings.clone(),
            redirects: measured.redirects.clone(),
            ext_ip: measured.session.as_ref().and_then(|s| s.ext_ip.clone()),
            report_path: None,
            screenshot_path: None,
            notes: measured.error.clone(),
        };

        let day = match ensure_day_dir(&self.logs_dir).await {
            Ok(day) => Some(day),
            Err(e) => {
                tracing::error!(run_id = %task.run_id, error = %e, "cannot create artifact directory");
                record.add_note(format!("report: {e}"));
                None
            }
        };

        // Reserve the report name first so the screenshot can share its stem
        let report = match &day {
            Some(day) => match create_unique_file(day, &base_name, "md").await {
                Ok(reserved) => Some(reserved),
                Err(e) => {
                    tracing::error!(run_id = %task.run_id, error = %e, "cannot create report file");
                    record.add_note(format!("report: {e}"));
                    None
                }
            },
            None => None,
        };

        let screenshot = match (&measured.session, &day) {
            (Some(session), Some(day))
                if task.params.make_screenshot && result == Classification::Success =>
            {
                let stem = report
                    .as_ref()
                    .and_then(|(path, _)| path.file_stem())
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| base_name.clone());
                match self.screenshot(task, session, &target.url, day, &stem).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        record.add_note(format!("screenshot: {e}"));
                        None
                    }
                }
            }
            _ => None,
        };
        record.screenshot_path = screenshot.as_deref().map(|p| relative_path(p, &self.logs_dir));

        if let Some((path, mut file)) = report {
            let card = self.report_card(task, &target, started, &record, &measured, screenshot.as_deref());
            let text = render_report_card(&card);
            match write_report(&mut file, &text).await {
                Ok(()) => {
                    record.report_path = Some(relative_path(&path, &self.logs_dir));
                }
                Err(e) => {
                    tracing::error!(run_id = %task.run_id, path = ?path, error = %e, "failed to write report");
                    record.add_note(format!("report: {e}"));
                }
            }
        }

        record
    }

    async fn measure(&self, task: &CheckTask, target: &NormalizedTarget) -> Measurement {
        let session = match self.sessions.acquire(task).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(run_id = %task.run_id, url = %target.url, error = %e, "session acquisition failed");
                return Measurement {
                    error: Some(e.to_string()),
                    debug_info: serde_json::json!({ "error": e.to_string() }),
                    ..Default::default()
                };
            }
        };

        match self
            .probe
            .measure(&target.url, &session, task.params.dns_mode, task.params.timeout())
            .await
        {
            Ok(response) => Measurement {
                debug_info: session.debug_info.clone(),
                session: Some(session),
                error: None,
                status: Some(response.status),
                bytes: Some(response.bytes),
                redirects: response.redirects,
                timings: response.timings,
            },
            Err(e) => {
                tracing::warn!(run_id = %task.run_id, url = %target.url, error = %e, "request failed");
                Measurement {
                    debug_info: session.debug_info.clone(),
                    session: Some(session),
                    error: Some(e.message),
                    status: None,
                    bytes: None,
                    redirects: e.redirects,
                    timings: e.timings,
                }
            }
        }
    }

    async fn screenshot(
        &self,
        task: &CheckTask,
        session: &ProxySession,
        url: &str,
        day: &Path,
        stem: &str,
    ) -> crate::Result<PathBuf> {
        let out = unique_file_path(day, stem, "png")?;

        tracing::debug!(run_id = %task.run_id, url = %url, in_use = self.limiter.in_use(), "waiting for screenshot slot");
        let permit = self.limiter.acquire().await?;
        let captured = self
            .renderer
            .capture(session, url, &out, &self.screenshot_options)
            .await;
        drop(permit);

        match captured {
            Ok(()) => Ok(out),
            Err(e) => {
                tracing::warn!(run_id = %task.run_id, url = %url, renderer = self.renderer.name(), error = %e, "screenshot failed");
                let _ = tokio::fs::remove_file(&out).await;
                Err(e)
            }
        }
    }

    fn report_card<'a>(
        &self,
        task: &'a CheckTask,
        target: &'a NormalizedTarget,
        started: DateTime<Local>,
        record: &'a TaskRecord,
        measured: &'a Measurement,
        screenshot: Option<&'a Path>,
    ) -> ReportCard<'a> {
        let params = &task.params;
        let any = |v: &Option<String>| v.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| "(any)".into());
        let geo = format!(
            "{} / {} / {} / ISP: {}",
            if task.country.is_empty() { "-" } else { task.country.as_str() },
            any(&params.region_code),
            any(&params.city),
            any(&params.isp),
        );
        let proxy = match &measured.session {
            Some(session) => format!(
                "{} {}, sticky: {}, ext_ip: {}",
                self.sessions.name(),
                session.server(),
                task.sticky,
                session.ext_ip.as_deref().unwrap_or("-")
            ),
            None => format!("{}, ext_ip: -", self.sessions.name()),
        };

        ReportCard {
            host: &target.host,
            started,
            geo,
            proxy,
            dns_mode: params.dns_mode.as_str(),
            timeout_sec: params.timeout_sec,
            url: &target.url,
            redirects: &record.redirects,
            timings: &record.timings,
            http_status: record.http_code,
            bytes: record.bytes,
            result: record.result,
            screenshot: screenshot.and_then(|p| p.file_name()).and_then(|n| n.to_str()),
            notes: record.notes.as_deref(),
            debug_info: params.debug_mode.then_some(&measured.debug_info),
        }
    }
}

/// Write and flush a report card
async fn write_report<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}

#[async_trait]
impl TaskRunner for CheckExecutor {
    type Task = CheckTask;

    fn started_event(&self, task: &CheckTask) -> RunEvent {
        RunEvent::CheckStarted {
            run_id: task.run_id.clone(),
            url: task.target.clone(),
            country: task.country.clone(),
            region: task.params.region_code.clone(),
            isp: task.params.isp.clone(),
        }
    }

    async fn run(&self, task: CheckTask) -> RunRecord {
        RunRecord::Check(self.execute(&task).await)
    }

    fn failed(&self, task: &CheckTask, reason: &str) -> RunRecord {
        RunRecord::Check(TaskRecord::failed(
            task.target.clone(),
            task.country.clone(),
            reason,
        ))
    }
}
