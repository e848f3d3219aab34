//! Escrow HTTP API
//!
//! Every request is validated completely (path id, token, envelope sizes,
//! remove-after) before the store is touched, so a rejected request never
//! mutates state.

use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use kesc_core::types::{
    ErrorBody, FetchBody, InfoBody, OkBody, MIN_WRAPPED_KEY_SIZE,
};
use kesc_core::{AuthToken, EntryInfo, Envelope, EscrowError, EscrowResult, StorageId, WireEnvelope};
use kesc_store::{EscrowEntry, EscrowStore};
use prometheus_client::registry::Registry;
use serde::Deserialize;
use tracing::{debug, info};

use crate::metrics::{healthz_handler, metrics_handler, Metrics, Operation, SharedRegistry};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EscrowStore>,
    pub metrics: Metrics,
    pub registry: SharedRegistry,
}

impl AppState {
    pub fn new(store: EscrowStore) -> Self {
        Self::with_shared_store(Arc::new(store))
    }

    /// Serve a store that the caller keeps a handle to.
    pub fn with_shared_store(store: Arc<EscrowStore>) -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::register(&mut registry);
        Self {
            store,
            metrics,
            registry: Arc::new(registry),
        }
    }
}

/// Build the router. `/metrics` is mounted only when `with_metrics` is set.
pub fn router(state: AppState, with_metrics: bool) -> Router {
    let mut app = Router::new()
        .route("/api/add/{su}", put(add_handler))
        .route("/api/get/{su}", post(get_handler))
        .route("/api/rem/{su}", delete(rem_handler))
        .route("/api/info/{su}", get(info_handler))
        .route("/healthz", get(healthz_handler));
    if with_metrics {
        app = app.route("/metrics", get(metrics_handler));
    }
    app.with_state(state)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(addr: &str, state: AppState, with_metrics: bool) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind {addr}: {e}"))?;

    info!(addr = %addr, metrics = with_metrics, "keystore: listening");

    axum::serve(listener, router(state, with_metrics))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("keystore server: {e}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("installing ctrl-c handler failed: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Protocol failure rendered as `{"error": ...}` with its fixed status code.
pub struct ApiError(EscrowError);

impl From<EscrowError> for ApiError {
    fn from(e: EscrowError) -> Self {
        ApiError(e)
    }
}

fn rejected(rejection: JsonRejection) -> EscrowError {
    EscrowError::Validation(format!("invalid JSON body: {}", rejection.body_text()))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.wire_message(),
            }),
        )
            .into_response()
    }
}

// ── Request bodies ────────────────────────────────────────────────────────────

// Fields are optional so a missing field is reported by name as a 400
// instead of a generic deserialization rejection.

#[derive(Debug, Deserialize)]
struct AddRequest {
    #[serde(rename = "WS")]
    ws: Option<WsFields>,
    #[serde(rename = "ST")]
    st: Option<String>,
    #[serde(rename = "RA", default)]
    ra: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WsFields {
    ct: Option<String>,
    tag: Option<String>,
    nonce: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    #[serde(rename = "ST")]
    st: Option<String>,
}

fn parse_token(st: Option<&str>) -> EscrowResult<AuthToken> {
    let st = st.ok_or_else(|| EscrowError::Validation("ST missing.".into()))?;
    AuthToken::from_hex(st)
}

fn parse_wrapped_key(ws: Option<WsFields>) -> EscrowResult<Envelope> {
    let ws = ws.ok_or_else(|| EscrowError::Validation("WS missing.".into()))?;
    let missing = |k: &str| EscrowError::Validation(format!("Key WS/{k} is missing."));
    let wire = WireEnvelope {
        ct: ws.ct.ok_or_else(|| missing("ct"))?,
        tag: ws.tag.ok_or_else(|| missing("tag"))?,
        nonce: ws.nonce.ok_or_else(|| missing("nonce"))?,
    };
    let envelope = wire.decode()?;
    if envelope.ciphertext.len() < MIN_WRAPPED_KEY_SIZE {
        return Err(EscrowError::Validation("Key WS/ct is invalid!".into()));
    }
    Ok(envelope)
}

/// `RA` absent, `null`, or `0` means no limit; anything else must be a positive integer.
fn parse_remove_after(ra: Option<serde_json::Value>) -> EscrowResult<Option<NonZeroU64>> {
    match ra {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => match n.as_u64() {
            Some(v) => Ok(NonZeroU64::new(v)),
            None => Err(EscrowError::Validation("Key RA is invalid!".into())),
        },
        Some(_) => Err(EscrowError::Validation("Key RA is invalid!".into())),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn add_handler(
    State(state): State<AppState>,
    Path(su): Path<String>,
    body: Result<Json<AddRequest>, JsonRejection>,
) -> Result<Json<OkBody>, ApiError> {
    let result = add(&state, &su, body);
    state
        .metrics
        .observe(Operation::Add, &result, state.store.len());
    result.map(|()| Json(OkBody::ok())).map_err(ApiError::from)
}

fn add(
    state: &AppState,
    su: &str,
    body: Result<Json<AddRequest>, JsonRejection>,
) -> EscrowResult<()> {
    let id = StorageId::from_hex(su)?;
    let Json(req) = body.map_err(rejected)?;
    let token = parse_token(req.st.as_deref())?;
    let wrapped_key = parse_wrapped_key(req.ws)?;
    let remove_after = parse_remove_after(req.ra)?;

    state
        .store
        .add(id, EscrowEntry::new(wrapped_key, token, remove_after))
}

async fn get_handler(
    State(state): State<AppState>,
    Path(su): Path<String>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<FetchBody>, ApiError> {
    let result = fetch(&state, &su, body);
    state
        .metrics
        .observe(Operation::Fetch, &result, state.store.len());
    let wrapped = result?;
    Ok(Json(FetchBody {
        msg: "ok".into(),
        ws: wrapped.to_wire(),
    }))
}

fn fetch(
    state: &AppState,
    su: &str,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> EscrowResult<Envelope> {
    let id = StorageId::from_hex(su)?;
    let Json(req) = body.map_err(rejected)?;
    let token = parse_token(req.st.as_deref())?;
    debug!(su = %id.short(), "fetch requested");
    state.store.fetch(&id, &token)
}

async fn rem_handler(
    State(state): State<AppState>,
    Path(su): Path<String>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<OkBody>, ApiError> {
    let result = remove(&state, &su, body);
    state
        .metrics
        .observe(Operation::Remove, &result, state.store.len());
    result.map(|()| Json(OkBody::ok())).map_err(ApiError::from)
}

fn remove(
    state: &AppState,
    su: &str,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> EscrowResult<()> {
    let id = StorageId::from_hex(su)?;
    let Json(req) = body.map_err(rejected)?;
    let token = parse_token(req.st.as_deref())?;
    state.store.delete(&id, &token)
}

async fn info_handler(State(state): State<AppState>, Path(su): Path<String>) -> Response {
    let result = StorageId::from_hex(&su).and_then(|id| state.store.inspect(&id));
    state
        .metrics
        .observe(Operation::Info, &result, state.store.len());
    match result {
        Ok(info) => Json(InfoBody::from(info)).into_response(),
        Err(EscrowError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(InfoBody::from(EntryInfo::absent())),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
