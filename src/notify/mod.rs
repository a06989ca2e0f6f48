//! Operator notifications
//!
//! Breaker transitions, cascade alerts and persistence failures are pushed to
//! every configured sink. A failing sink is logged and never stops trading.

mod webhook;

pub use webhook::WebhookNotifier;

use crate::cascade::CascadeAlert;
use crate::config::NotifyConfig;
use crate::risk::{BreakerLevel, BreakerTransition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Notable event for operators
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    BreakerTransition(BreakerTransition),
    CascadeAlert(CascadeAlert),
    PersistenceFailure { error: String, at: DateTime<Utc> },
}

impl Notification {
    pub fn summary(&self) -> String {
        match self {
            Notification::BreakerTransition(t) => format!(
                "circuit breaker {:?} -> {:?} at daily pnl {}",
                t.from,
                t.to,
                t.daily_pnl_pct.round_dp(4)
            ),
            Notification::CascadeAlert(a) => format!(
                "liquidation cascade on {} (score {}), applying {:?}",
                a.symbol,
                a.score.score.round_dp(3),
                a.action
            ),
            Notification::PersistenceFailure { error, .. } => {
                format!("state snapshot could not be saved: {}", error)
            }
        }
    }
}

/// Sink for notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let summary = notification.summary();
        match notification {
            Notification::BreakerTransition(t) if t.to == BreakerLevel::Halted => {
                tracing::error!(notification = %summary, "Operator alert")
            }
            Notification::PersistenceFailure { .. } => {
                tracing::error!(notification = %summary, "Operator alert")
            }
            _ => tracing::warn!(notification = %summary, "Operator alert"),
        }
        Ok(())
    }
}

/// Fans a notification out to several sinks
pub struct NotifierSet {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Log sink, plus a webhook when one is configured
    pub fn from_config(config: &NotifyConfig) -> anyhow::Result<Self> {
        let mut sinks: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];
        if let Some(url) = &config.webhook_url {
            sinks.push(Arc::new(WebhookNotifier::new(url.clone())?));
        }
        Ok(Self::new(sinks))
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.notify(notification).await {
                tracing::warn!(error = %e, "Notification sink failed");
            }
        }
        Ok(())
    }
}
