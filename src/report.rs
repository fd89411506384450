//! Markdown artifacts: per-check report cards and run summaries

use crate::error::Result;
use crate::types::{Classification, RedirectHop, RunRecord, Timings};
use crate::utils::{create_unique_file, ensure_day_dir, relative_path};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Everything a report card shows
#[derive(Clone, Debug)]
pub struct ReportCard<'a> {
    /// Heading (target host)
    pub host: &'a str,
    /// When the check started
    pub started: DateTime<Local>,
    /// `country / region / city / ISP: isp`
    pub geo: String,
    /// Proxy description
    pub proxy: String,
    /// DNS mode wire name
    pub dns_mode: &'a str,
    /// Request timeout in seconds
    pub timeout_sec: u64,
    /// Requested URL
    pub url: &'a str,
    /// Redirect chain
    pub redirects: &'a [RedirectHop],
    /// Request timings
    pub timings: &'a Timings,
    /// Final status
    pub http_status: Option<u16>,
    /// Final body size
    pub bytes: Option<u64>,
    /// Outcome label
    pub result: Classification,
    /// Screenshot file name
    pub screenshot: Option<&'a str>,
    /// Notes
    pub notes: Option<&'a str>,
    /// Session debug payload (debug mode only)
    pub debug_info: Option<&'a serde_json::Value>,
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Render a report card as markdown
pub fn render_report_card(card: &ReportCard<'_>) -> String {
    let mut out = String::new();
    // writeln! into a String cannot fail
    let _ = writeln!(out, "# {}", card.host);
    let _ = writeln!(out, "Started: {}", card.started.format("%Y-%m-%dT%H:%M:%S"));
    let _ = writeln!(out, "Geo: {}", card.geo);
    let _ = writeln!(out, "Proxy: {}", card.proxy);
    let _ = writeln!(out, "DNS mode: {}", card.dns_mode);
    let _ = writeln!(out, "Timeout: {}s", card.timeout_sec);
    let _ = writeln!(out, "URL: {}", card.url);

    let _ = writeln!(out, "\n## Redirect chain");
    if card.redirects.is_empty() {
        let _ = writeln!(out, "—");
    }
    for (i, hop) in card.redirects.iter().enumerate() {
        let _ = writeln!(out, "{}) {} → {}", i + 1, hop.status, hop.to);
    }

    let t = card.timings;
    let _ = writeln!(out, "\n## Timings");
    let _ = writeln!(
        out,
        "DNS: {}ms | TCP: {}ms | TLS: {}ms | TTFB: {}ms | Total: {}ms",
        or_dash(t.dns_ms),
        or_dash(t.tcp_ms),
        or_dash(t.tls_ms),
        or_dash(t.ttfb_ms),
        or_dash(t.total_ms)
    );

    let _ = writeln!(out, "\n## HTTP");
    let _ = writeln!(out, "Status: {}", or_dash(card.http_status));
    let _ = writeln!(out, "Bytes: {}", or_dash(card.bytes));

    let _ = writeln!(out, "\n## Result");
    let mark = if card.result.is_success() { "✅" } else { "❌" };
    let _ = writeln!(out, "{mark} {}", card.result);
    if let Some(screenshot) = card.screenshot {
        let _ = writeln!(out, "Screenshot: {screenshot}");
    }
    let _ = write!(out, "Notes: {}", card.notes.unwrap_or("—"));

    if let Some(debug) = card.debug_info {
        let pretty = serde_json::to_string_pretty(debug).unwrap_or_else(|_| debug.to_string());
        let _ = write!(out, "\n\n## Debug Info\n```json\n{pretty}\n```");
    }
    out.push('\n');
    out
}

/// Render a run summary table
pub fn render_run_summary(records: &[RunRecord], at: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Run summary ({})", at.format("%Y-%m-%dT%H:%M:%S"));
    let _ = writeln!(out);

    let checks: Vec<_> = records
        .iter()
        .filter_map(|r| match r {
            RunRecord::Check(c) => Some(c),
            RunRecord::Dns(_) => None,
        })
        .collect();
    let lookups: Vec<_> = records
        .iter()
        .filter_map(|r| match r {
            RunRecord::Dns(d) => Some(d),
            RunRecord::Check(_) => None,
        })
        .collect();

    if !checks.is_empty() {
        let _ = writeln!(
            out,
            "| # | URL | Country | Result | HTTP | TTFB (ms) | Proxy IP | File | Screenshot |"
        );
        let _ = writeln!(
            out,
            "|---|-----|---------|--------|------|-----------|----------|------|------------|"
        );
        for (i, r) in checks.iter().enumerate() {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                i + 1,
                r.url,
                r.country,
                r.result,
                or_dash(r.http_code),
                or_dash(r.timings.ttfb_ms),
                r.ext_ip.as_deref().unwrap_or("-"),
                r.report_path.as_deref().unwrap_or(""),
                r.screenshot_path.as_deref().unwrap_or("")
            );
        }
    }

    if !lookups.is_empty() {
        if !checks.is_empty() {
            let _ = writeln!(out);
        }
        let _ = writeln!(out, "| # | Domain | IPs | Owner | Country | City | Error |");
        let _ = writeln!(out, "|---|--------|-----|-------|---------|------|-------|");
        for (i, r) in lookups.iter().enumerate() {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} |",
                i + 1,
                r.domain,
                r.ips.join(", "),
                r.owner,
                r.country_name.as_deref().unwrap_or("-"),
                r.city.as_deref().unwrap_or("-"),
                r.error.as_deref().unwrap_or("")
            );
        }
    }
    out
}

/// Write `contents` to a fresh `<day>/<name>.<ext>` and return its absolute path
pub async fn write_artifact(logs_dir: &Path, name: &str, ext: &str, contents: &[u8]) -> Result<PathBuf> {
    let day = ensure_day_dir(logs_dir).await?;
    let (path, mut file) = create_unique_file(&day, name, ext).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    Ok(path)
}

/// Write the run summary and return its path relative to `logs_dir`
pub async fn write_run_summary(logs_dir: &Path, records: &[RunRecord]) -> Result<String> {
    let now = Local::now();
    let name = format!("{}_run-summary", now.format("%H-%M-%S"));
    let text = render_run_summary(records, now);
    let path = write_artifact(logs_dir, &name, "md", text.as_bytes()).await?;
    Ok(relative_path(&path, logs_dir))
}
