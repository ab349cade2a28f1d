use async_trait::async_trait;
use std::time::Duration;

use crate::{Alert, AlertType, NotificationChannel, NotificationError};

/// Posts alerts as embed payloads to a messaging webhook.
pub struct WebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            webhook_url,
            client,
        }
    }

    fn color(alert: &Alert) -> u32 {
        match &alert.alert_type {
            AlertType::TradeExecuted { direction, .. } => {
                if direction == "buy" {
                    0x00ff00
                } else {
                    0xff0000
                }
            }
            AlertType::TradeRejected { .. } => 0xff6600,
            AlertType::RiskLimitApproaching { .. } => 0xff0000,
            AlertType::PositionClosed { pnl, .. } => {
                if *pnl >= 0.0 {
                    0x00ff00
                } else {
                    0xff0000
                }
            }
            AlertType::DailyReport { pnl, .. } => {
                if *pnl >= 0.0 {
                    0x00ff00
                } else {
                    0xff0000
                }
            }
            AlertType::Error { .. } => 0xff0000,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let payload = serde_json::json!({
            "embeds": [{
                "title": alert.title,
                "description": alert.message,
                "color": Self::color(alert),
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        });

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Webhook(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
