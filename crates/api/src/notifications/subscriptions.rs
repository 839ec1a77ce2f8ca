use std::collections::HashMap;

use tokio::sync::RwLock;

use sellora_core::types::JobId;

/// Email addresses registered per job, consumed once the job finishes.
#[derive(Default)]
pub struct EmailSubscriptions {
    by_job: RwLock<HashMap<JobId, Vec<String>>>,
}

impl EmailSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `email` for `job_id`. Returns `false` if the address was
    /// already registered (case-insensitive).
    pub async fn subscribe(&self, job_id: &str, email: String) -> bool {
        let mut by_job = self.by_job.write().await;
        let recipients = by_job.entry(job_id.to_string()).or_default();
        if recipients.iter().any(|r| r.eq_ignore_ascii_case(&email)) {
            return false;
        }
        recipients.push(email);
        true
    }

    /// Remove and return every address registered for `job_id`.
    pub async fn take(&self, job_id: &str) -> Vec<String> {
        self.by_job.write().await.remove(job_id).unwrap_or_default()
    }

    /// Remove `email` from `job_id`. Returns `false` if it was not registered.
    pub async fn unsubscribe(&self, job_id: &str, email: &str) -> bool {
        let mut by_job = self.by_job.write().await;
        let Some(recipients) = by_job.get_mut(job_id) else {
            return false;
        };
        let before = recipients.len();
        recipients.retain(|r| !r.eq_ignore_ascii_case(email));
        let removed = recipients.len() != before;
        if recipients.is_empty() {
            by_job.remove(job_id);
        }
        removed
    }

    pub async fn recipients(&self, job_id: &str) -> Vec<String> {
        self.by_job
            .read()
            .await
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }
}
