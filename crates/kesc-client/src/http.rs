//! HTTP keystore backed by a remote `kescd`

use std::num::NonZeroU64;
use std::time::Duration;

use kesc_core::types::{AddBody, FetchBody, InfoBody, TokenBody};
use kesc_core::{AuthToken, EntryInfo, Envelope, EscrowError, EscrowResult, StorageId};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use crate::keystore::KeyStore;

/// Keystore client for the `/api/*` JSON routes.
#[derive(Debug, Clone)]
pub struct HttpKeyStore {
    base_url: String,
    http: Client,
}

impl HttpKeyStore {
    /// `base_url` is the scheme and authority, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: &str, timeout: Duration) -> EscrowResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str, id: &StorageId) -> String {
        format!("{}/api/{route}/{}", self.base_url, id.to_hex())
    }
}

fn transport(err: reqwest::Error) -> EscrowError {
    EscrowError::Transport(err.to_string())
}

#[derive(Deserialize)]
struct ErrorField {
    error: Option<String>,
}

/// Pass a success response through; map a failure to its protocol error.
async fn check(resp: Response) -> EscrowResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.map_err(transport)?;
    let message = serde_json::from_str::<ErrorField>(&text)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or(text);
    debug!(status = status.as_u16(), %message, "keystore rejected request");
    Err(EscrowError::from_response(status.as_u16(), &message))
}

impl KeyStore for HttpKeyStore {
    async fn add(
        &self,
        id: StorageId,
        wrapped_key: Envelope,
        token: AuthToken,
        remove_after: Option<NonZeroU64>,
    ) -> EscrowResult<()> {
        let body = AddBody {
            ws: wrapped_key.to_wire(),
            st: token.to_hex(),
            ra: remove_after.map(NonZeroU64::get),
        };
        let resp = self
            .http
            .put(self.url("add", &id))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await.map(drop)
    }

    async fn fetch(&self, id: &StorageId, token: &AuthToken) -> EscrowResult<Envelope> {
        let resp = self
            .http
            .post(self.url("get", id))
            .json(&TokenBody { st: token.to_hex() })
            .send()
            .await
            .map_err(transport)?;
        let body: FetchBody = check(resp).await?.json().await.map_err(transport)?;
        body.ws.decode()
    }

    async fn delete(&self, id: &StorageId, token: &AuthToken) -> EscrowResult<()> {
        let resp = self
            .http
            .delete(self.url("rem", id))
            .json(&TokenBody { st: token.to_hex() })
            .send()
            .await
            .map_err(transport)?;
        check(resp).await.map(drop)
    }

    async fn inspect(&self, id: &StorageId) -> EscrowResult<EntryInfo> {
        let resp = self
            .http
            .get(self.url("info", id))
            .send()
            .await
            .map_err(transport)?;
        let body: InfoBody = check(resp).await?.json().await.map_err(transport)?;
        Ok(EntryInfo::from(&body))
    }
}
