//! Alert delivery.
//!
//! Notifications are fire-and-forget: a failing channel is logged and never
//! turned into an error for the caller. Severity is carried in the subject
//! so an operator can triage from the subject line alone.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }

    /// Subject line with the severity tag prepended.
    #[must_use]
    pub fn tag(self, subject: &str) -> String {
        format!("[{}] {}", self.as_str(), subject)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification channel (email, chat, pager...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, severity: Severity, subject: &str, body: &str) -> Result<()>;
}

/// Sends an alert, logging delivery failures instead of returning them.
pub async fn alert(notifier: &dyn Notifier, severity: Severity, subject: &str, body: &str) {
    if let Err(e) = notifier.notify(severity, subject, body).await {
        error!(
            severity = %severity,
            subject,
            error = %e,
            "Failed to deliver notification"
        );
    }
}

/// Delivers notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, severity: Severity, subject: &str, body: &str) -> Result<()> {
        let subject = severity.tag(subject);
        match severity {
            Severity::Info => info!(subject = %subject, body, "Notification"),
            Severity::Warning => warn!(subject = %subject, body, "Notification"),
            Severity::Critical => error!(subject = %subject, body, "Notification"),
        }
        Ok(())
    }
}

/// A notification captured by [`MemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentAlert {
    pub severity: Severity,
    pub subject: String,
    pub body: String,
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<SentAlert>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().clone()
    }

    /// Number of alerts at the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|a| a.severity == severity)
            .count()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, severity: Severity, subject: &str, body: &str) -> Result<()> {
        self.sent.lock().push(SentAlert {
            severity,
            subject: severity.tag(subject),
            body: body.to_string(),
        });
        Ok(())
    }
}
