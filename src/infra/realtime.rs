use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use md5::Md5;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::{AppConfig, PusherConfig};

const AUTH_VERSION: &str = "1.0";

/// Outbound push to a hosted pub/sub service.
#[axum::async_trait]
pub trait RealtimePublisher: Send + Sync {
    async fn trigger(&self, channel: &str, event: &str, payload: &Value) -> Result<()>;
}

/// Pick the publisher for this process. Missing credentials turn realtime into a no-op.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn RealtimePublisher>> {
    match &config.pusher {
        Some(pusher) => Ok(Arc::new(PusherPublisher::new(
            pusher.clone(),
            Duration::from_secs(config.pusher_timeout_seconds),
        )?)),
        None => {
            warn!("PUSHER_APP_ID, PUSHER_KEY, PUSHER_SECRET or PUSHER_CLUSTER not set; realtime notifications disabled");
            Ok(Arc::new(DisabledPublisher))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPublisher;

#[axum::async_trait]
impl RealtimePublisher for DisabledPublisher {
    async fn trigger(&self, channel: &str, event: &str, _payload: &Value) -> Result<()> {
        debug!(channel, event, "realtime disabled, dropping event");
        Ok(())
    }
}

#[derive(Clone)]
pub struct PusherPublisher {
    client: reqwest::Client,
    config: PusherConfig,
}

#[derive(Serialize)]
struct TriggerBody<'a> {
    name: &'a str,
    channels: [&'a str; 1],
    data: String,
}

impl PusherPublisher {
    pub fn new(config: PusherConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    fn events_path(&self) -> String {
        format!("/apps/{}/events", self.config.app_id)
    }
}

#[axum::async_trait]
impl RealtimePublisher for PusherPublisher {
    async fn trigger(&self, channel: &str, event: &str, payload: &Value) -> Result<()> {
        let body = serde_json::to_string(&TriggerBody {
            name: event,
            channels: [channel],
            data: serde_json::to_string(payload)?,
        })?;

        let path = self.events_path();
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let query = signed_query(
            &self.config.key,
            &self.config.secret,
            "POST",
            &path,
            timestamp,
            &body_md5(&body),
        )?;
        let url = format!(
            "https://api-{}.pusher.com{}?{}",
            self.config.cluster, path, query
        );

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("pusher returned {}: {}", status, text));
        }

        debug!(channel, event, "realtime event published");
        Ok(())
    }
}

fn body_md5(body: &str) -> String {
    hex::encode(Md5::digest(body.as_bytes()))
}

/// Build the authenticated query string, signature last.
fn signed_query(
    key: &str,
    secret: &str,
    method: &str,
    path: &str,
    timestamp: i64,
    body_md5: &str,
) -> Result<String> {
    // Parameters must be in lexical order for the signature.
    let query = format!(
        "auth_key={}&auth_timestamp={}&auth_version={}&body_md5={}",
        key, timestamp, AUTH_VERSION, body_md5
    );
    let to_sign = format!("{}\n{}\n{}", method, path, query);

    let mut mac = <Hmac<Sha256>>::new_from_slice(secret.as_bytes())
        .map_err(|_| anyhow!("invalid pusher secret"))?;
    mac.update(to_sign.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(format!("{}&auth_signature={}", query, signature))
}
