//! DNS/whois task runner

use super::TaskRunner;
use crate::dns::{DomainResolver, OWNER_UNKNOWN};
use crate::types::{DnsRecord, DnsTask, RunEvent, RunRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs DNS tasks through a [`DomainResolver`]
#[derive(Clone)]
pub struct DnsExecutor {
    resolver: Arc<dyn DomainResolver>,
}

impl DnsExecutor {
    /// Create an executor over `resolver`
    pub fn new(resolver: Arc<dyn DomainResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl TaskRunner for DnsExecutor {
    type Task = DnsTask;

    fn started_event(&self, task: &DnsTask) -> RunEvent {
        RunEvent::DnsStarted {
            run_id: task.run_id.clone(),
            domain: task.domain.clone(),
        }
    }

    async fn run(&self, task: DnsTask) -> RunRecord {
        let record = self.resolver.resolve(&task.domain).await;
        tracing::debug!(
            run_id = %task.run_id,
            domain = %task.domain,
            owner = %record.owner,
            error = ?record.error,
            "DNS task finished"
        );
        RunRecord::Dns(record)
    }

    fn failed(&self, task: &DnsTask, reason: &str) -> RunRecord {
        RunRecord::Dns(DnsRecord {
            domain: task.domain.clone(),
            owner: OWNER_UNKNOWN.to_string(),
            error: Some(reason.to_string()),
            ..Default::default()
        })
    }
}
