use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};

/// Outbound message delivery. The bot and the monitor only ever talk to
/// telegram through this trait, tests plug in a recording fake.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

pub struct Telegram {
    http: reqwest::Client,
    token: String,
}

impl Telegram {
    pub fn new(token: String) -> Self {
        Telegram {
            http: reqwest::Client::new(),
            token,
        }
    }
}

#[async_trait]
impl Notifier for Telegram {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| Error::UpstreamUnavailable {
                service: "telegram",
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(Error::UpstreamRejected {
                service: "telegram",
                code: status.as_u16() as i64,
                message,
            });
        }
        Ok(())
    }
}
