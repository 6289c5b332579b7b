//! HTTP command channel for the robot's `/cmd` endpoint.
//!
//! Each dispatch becomes `GET {address}/cmd?action=..[&value=..]&t=..`, where `t`
//! is a millisecond timestamp that defeats caches between the client and the
//! device. The request runs on a detached task; its outcome is only logged at
//! debug level because the device has no acknowledgment channel.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::error::{AppResult, BotError};
use crate::hardware::capabilities::{Action, CommandChannel};

/// Fire-and-forget HTTP channel.
pub struct HttpCommandChannel {
    client: Client,
    address: RwLock<String>,
    settle_delay: Duration,
    request_timeout: Duration,
    connected: watch::Sender<bool>,
}

impl HttpCommandChannel {
    /// Create a channel from device configuration.
    ///
    /// The address is not validated here; a malformed address surfaces as an
    /// unreachable dispatch, the same as when it is changed at runtime.
    pub fn new(config: &DeviceConfig) -> AppResult<Self> {
        let client = Client::builder().build()?;
        let (connected, _) = watch::channel(false);

        Ok(Self {
            client,
            address: RwLock::new(config.address.clone()),
            settle_delay: config.settle_delay(),
            request_timeout: config.request_timeout(),
            connected,
        })
    }
}

/// Build the command URL for `address`.
///
/// A trailing slash on the address is ignored.
pub fn command_url(
    address: &str,
    action: Action,
    value: Option<u16>,
    nonce: i64,
) -> AppResult<Url> {
    let base = format!("{}/cmd", address.trim().trim_end_matches('/'));
    let mut url = Url::parse(&base).map_err(|e| BotError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" {
        return Err(BotError::InvalidAddress {
            address: address.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("action", action.as_str());
        if let Some(value) = value {
            query.append_pair("value", &value.to_string());
        }
        query.append_pair("t", &nonce.to_string());
    }

    Ok(url)
}

#[async_trait]
impl CommandChannel for HttpCommandChannel {
    async fn dispatch(&self, action: Action, value: Option<u16>) -> bool {
        let address = self.address.read().await.clone();
        let url = match command_url(&address, action, value, Utc::now().timestamp_millis()) {
            Ok(url) => url,
            Err(e) => {
                warn!(%action, error = %e, "Could not build command request");
                self.connected.send_replace(false);
                return false;
            }
        };

        let request = self.client.get(url.clone()).timeout(self.request_timeout);
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) => debug!(%url, status = %response.status(), "Device answered"),
                Err(e) => debug!(%url, error = %e, "Command request not delivered"),
            }
        });

        self.connected.send_replace(true);
        sleep(self.settle_delay).await;
        true
    }

    async fn set_address(&self, address: &str) {
        *self.address.write().await = address.trim().to_string();
    }

    async fn address(&self) -> String {
        self.address.read().await.clone()
    }

    fn subscribe_connectivity(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}
