use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::fanout::Notifier;
use crate::registry::SubscriberId;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram caps a message at 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramNotifier {
    http_client: Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            http_client: Client::new(),
            endpoint: format!("{API_BASE}/bot{bot_token}/sendMessage"),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, to: SubscriberId, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            anyhow::bail!("Refusing to send an empty message");
        }

        let payload = SendMessage {
            chat_id: to.0,
            text: truncate(text),
            disable_web_page_preview: true,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body: ApiResponse = response.json().await.map_err(|e| {
            anyhow::anyhow!("Unreadable Telegram response ({}): {}", status, e)
        })?;

        if !status.is_success() || !body.ok {
            anyhow::bail!(
                "Telegram rejected message to chat {}: {} - {}",
                to,
                status,
                body.description.unwrap_or_default()
            );
        }
        Ok(())
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_messages_are_cut_on_a_char_boundary() {
        let text = "я".repeat(MAX_MESSAGE_CHARS + 10);
        assert_eq!(truncate(&text).chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn payload_matches_bot_api_shape() {
        let payload = SendMessage {
            chat_id: -100,
            text: "hi",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"chat_id": -100, "text": "hi", "disable_web_page_preview": true})
        );
    }
}
