use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::registry::StreamerSnapshot;

/// Seam between the components and the live sidekick api, so the monitor and
/// the subscription manager can be driven by a fake in tests.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Single best-effort request, no retry. The caller decides whether a
    /// failure is logged and skipped (scheduled path) or surfaced to the
    /// user (interactive path).
    async fn fetch_status(&self, room_id: &str) -> Result<StreamerSnapshot>;
}

/// Response envelope of the status api: `code == 0` means success with the
/// payload in `data`, anything else is a rejection with a human readable
/// `msg`.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<StreamerSnapshot>,
}

#[derive(Clone)]
pub struct SidekickClient {
    http: reqwest::Client,
    base_url: String,
}

impl SidekickClient {
    pub fn new(base_url: &str) -> Self {
        SidekickClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn info_url(&self, room_id: &str) -> String {
        format!(
            "{}/query/api/get_streamer_info?uid={}",
            self.base_url, room_id
        )
    }

    /// Raw envelope passthrough for the debug endpoint, no decoding beyond
    /// json, no side effects.
    pub async fn raw_status(&self, room_id: &str) -> Result<serde_json::Value> {
        self.http
            .get(&self.info_url(room_id))
            .send()
            .await
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)
    }
}

#[async_trait]
impl StatusSource for SidekickClient {
    async fn fetch_status(&self, room_id: &str) -> Result<StreamerSnapshot> {
        let envelope: Envelope = self
            .http
            .get(&self.info_url(room_id))
            .send()
            .await
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        match envelope {
            Envelope {
                code: 0,
                data: Some(info),
                ..
            } => Ok(info),
            Envelope { code, msg, .. } => Err(Error::UpstreamRejected {
                service: "sidekick",
                code,
                message: msg.unwrap_or_else(|| "empty payload".to_string()),
            }),
        }
    }
}

fn unavailable(source: reqwest::Error) -> Error {
    Error::UpstreamUnavailable {
        service: "sidekick",
        source,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn success_envelope_from_json() {
        let json = r#"{"code":0,"data":{"username":"alice","title":"speedrun",
            "viewer":12,"followers":3400,"tags":["games"],"twitter":null,
            "uid":"cmahm5oy0001fl40m59hgr47g","live_status":true}}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code, 0);
        let info = envelope.data.unwrap();
        assert_eq!(info.username, "alice");
        assert!(info.live_status);
    }

    #[test]
    fn rejection_envelope_from_json() {
        let json = r#"{"code":404,"msg":"room not found"}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code, 404);
        assert_eq!(envelope.msg.as_deref(), Some("room not found"));
        assert!(envelope.data.is_none());
    }

    #[test]
    fn info_url_is_parameterized_by_room_id() {
        let client = SidekickClient::new("https://sidekick.fans/");
        assert_eq!(
            client.info_url("abc123"),
            "https://sidekick.fans/query/api/get_streamer_info?uid=abc123"
        );
    }
}
