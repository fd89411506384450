//! Task execution
//!
//! A [`TaskRunner`] turns one task into one [`RunRecord`] and never fails:
//! every problem becomes part of the record. The orchestrator is generic
//! over the runner, so URL checks and DNS lookups share one run lifecycle.
//!
//! - [`CheckExecutor`]: session → timed request → classification →
//!   optional screenshot → report card
//! - [`DnsExecutor`]: DNS/whois lookup per domain

mod check;
mod dns;

pub use check::CheckExecutor;
pub use dns::DnsExecutor;

use crate::types::{RunEvent, RunRecord};
use async_trait::async_trait;

/// Runs tasks of one kind for the orchestrator
#[async_trait]
pub trait TaskRunner: Send + Sync + 'static {
    /// Unit of work
    type Task: Clone + Send + Sync + 'static;

    /// Event published when a worker picks `task` up
    fn started_event(&self, task: &Self::Task) -> RunEvent;

    /// Run `task` to completion
    async fn run(&self, task: Self::Task) -> RunRecord;

    /// Record for a task whose worker died before producing one
    fn failed(&self, task: &Self::Task, reason: &str) -> RunRecord;
}
