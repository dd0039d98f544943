//! Connection negotiation
//!
//! Before upgrading to WebSocket the client POSTs to `{hub}/negotiate`. The hub
//! answers with the connection identifier used for the rest of the session.

use reqwest::Url;
use serde::Deserialize;

use crate::error::HubError;

/// Negotiate Response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    pub connection_id: String,
    #[serde(default)]
    pub connection_token: Option<String>,
    #[serde(default)]
    pub negotiate_version: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl NegotiateResponse {
    /// Token the socket must present in its `id` query parameter
    pub fn token(&self) -> &str {
        match (&self.connection_token, self.negotiate_version) {
            (Some(token), v) if v >= 1 => token,
            _ => &self.connection_id,
        }
    }

    /// WebSocket URL for the negotiated session
    pub fn socket_url(&self, hub_url: &Url) -> Result<Url, HubError> {
        let mut url = hub_url.clone();
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(HubError::InvalidAddress(format!(
                    "unsupported scheme '{}' in {}",
                    other, hub_url
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| HubError::InvalidAddress(hub_url.to_string()))?;
        url.query_pairs_mut().append_pair("id", self.token());
        Ok(url)
    }
}

/// Resolve the hub URL from the endpoint and hub name
///
/// `http://localhost:3932/` + `timeHub` gives `http://localhost:3932/timeHub`.
pub fn hub_url(endpoint: &str, hub: &str) -> Result<Url, HubError> {
    let mut base = Url::parse(endpoint)
        .map_err(|e| HubError::InvalidAddress(format!("{}: {}", endpoint, e)))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(hub.trim_start_matches('/'))
        .map_err(|e| HubError::InvalidAddress(format!("{}{}: {}", endpoint, hub, e)))
}

pub async fn negotiate(http: &reqwest::Client, hub_url: &Url) -> Result<NegotiateResponse, HubError> {
    let mut url = hub_url.clone();
    let path = format!("{}/negotiate", hub_url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut().append_pair("negotiateVersion", "1");

    tracing::debug!(%url, "negotiating hub connection");
    let response = http.post(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(HubError::Negotiate {
            url: url.to_string(),
            reason: format!("HTTP {}", status),
        });
    }

    let body: NegotiateResponse = response.json().await?;
    if let Some(error) = body.error.clone() {
        return Err(HubError::Negotiate {
            url: url.to_string(),
            reason: error,
        });
    }
    Ok(body)
}
