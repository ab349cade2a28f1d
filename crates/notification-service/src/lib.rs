mod ring;
mod webhook;

pub use ring::AlertRing;
pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Events that trigger notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertType {
    TradeExecuted {
        symbol: String,
        direction: String,
        volume: f64,
        price: f64,
    },
    TradeRejected {
        symbol: String,
        reason: String,
    },
    RiskLimitApproaching {
        limit_name: String,
        current: f64,
        limit: f64,
    },
    PositionClosed {
        symbol: String,
        volume: f64,
        pnl: f64,
    },
    DailyReport {
        date: String,
        pnl: f64,
        trades_count: u32,
        positions_count: usize,
    },
    Error {
        context: String,
        detail: String,
    },
}

/// A notification to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            timestamp: chrono::Utc::now(),
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system. These are logged, never allowed
/// to reach trading logic.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Webhook error: {0}")]
    Webhook(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Dispatches alerts to every configured channel and keeps a bounded ring
/// of recent alerts for inspection.
pub struct NotificationService {
    channels: std::sync::Arc<Vec<Box<dyn NotificationChannel>>>,
    recent: std::sync::Arc<std::sync::Mutex<AlertRing>>,
}

impl NotificationService {
    pub fn new(webhook_url: Option<String>, ring_capacity: usize) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if let Some(url) = webhook_url.filter(|u| !u.is_empty()) {
            channels.push(Box::new(WebhookNotifier::new(url)));
            tracing::info!("Webhook notifications enabled");
        }

        if channels.is_empty() {
            tracing::info!("No notification channels configured (set WEBHOOK_URL)");
        }

        Self {
            channels: std::sync::Arc::new(channels),
            recent: std::sync::Arc::new(std::sync::Mutex::new(AlertRing::new(ring_capacity))),
        }
    }

    /// Send an alert to all channels, fire-and-forget. Channel failures
    /// are logged and never block the caller.
    pub fn send_alert(&self, alert: Alert) {
        if let Ok(mut ring) = self.recent.lock() {
            ring.push(alert.clone());
        }

        let channels = self.channels.clone();
        tokio::spawn(async move {
            for channel in channels.iter() {
                match channel.send(&alert).await {
                    Ok(()) => tracing::debug!("Sent notification via {}", channel.name()),
                    Err(e) => {
                        tracing::warn!("Failed to send notification via {}: {}", channel.name(), e)
                    }
                }
            }
        });
    }

    /// Most recent alerts, oldest first.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.recent
            .lock()
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FailingChannel;

    #[async_trait]
    impl NotificationChannel for FailingChannel {
        async fn send(&self, _alert: &Alert) -> Result<(), NotificationError> {
            Err(NotificationError::Webhook("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct CountingChannel {
        sent: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NotificationChannel for CountingChannel {
        async fn send(&self, _alert: &Alert) -> Result<(), NotificationError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn alert() -> Alert {
        Alert::new(
            AlertType::TradeRejected {
                symbol: "EURUSD".to_string(),
                reason: "test".to_string(),
            },
            "test alert",
            "",
        )
    }

    #[tokio::test]
    async fn channel_failure_does_not_block_other_channels() {
        let sent = Arc::new(AtomicUsize::new(0));
        let service = NotificationService {
            channels: std::sync::Arc::new(vec![
                Box::new(FailingChannel) as Box<dyn NotificationChannel>,
                Box::new(CountingChannel { sent: sent.clone() }),
            ]),
            recent: std::sync::Arc::new(std::sync::Mutex::new(AlertRing::new(4))),
        };

        service.send_alert(alert());

        // Recorded in the ring synchronously, before any channel runs
        assert_eq!(service.recent_alerts().len(), 1);

        // The healthy channel still delivers despite the failing one
        for _ in 0..100 {
            if sent.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("counting channel never received the alert");
    }

    #[tokio::test]
    async fn no_channels_still_records_recent_alerts() {
        let service = NotificationService::new(None, 2);
        service.send_alert(alert());
        service.send_alert(alert());
        service.send_alert(alert());
        assert_eq!(service.recent_alerts().len(), 2);
    }
}
