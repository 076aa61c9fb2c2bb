use crate::ports::health::HealthCheck;
use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// `"ok"` or `"error: <reason>"` per dependency.
    pub dependencies: BTreeMap<String, String>,
    pub timestamp: String,
    pub version: String,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }

    /// Dependencies whose check failed.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.dependencies
            .iter()
            .filter(|(_, detail)| detail.as_str() != "ok")
            .map(|(name, detail)| (name.as_str(), detail.as_str()))
            .collect()
    }
}

/// Runs every dependency check concurrently, each bounded by `timeout`.
#[derive(Clone)]
pub struct HealthGate {
    checks: Vec<Arc<dyn HealthCheck>>,
    timeout: Duration,
}

impl HealthGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            checks: Vec::new(),
            timeout,
        }
    }

    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub async fn check(&self) -> HealthReport {
        let timeout = self.timeout;
        let results = join_all(self.checks.iter().map(|dep| async move {
            let detail = match tokio::time::timeout(timeout, dep.check()).await {
                Ok(Ok(())) => "ok".to_string(),
                Ok(Err(e)) => format!("error: {e}"),
                Err(_) => format!(
                    "error: no answer within {}",
                    humantime::format_duration(timeout)
                ),
            };
            (dep.name().to_string(), detail)
        }))
        .await;

        let dependencies: BTreeMap<String, String> = results.into_iter().collect();
        let status = if dependencies.values().all(|d| d == "ok") {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        };

        let report = HealthReport {
            status,
            dependencies,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        if !report.is_ok() {
            warn!(failures = ?report.failures(), "dependency check failed");
        }
        report
    }
}
