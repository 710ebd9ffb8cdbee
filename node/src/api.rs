//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the node's HTTP interface. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Liveness probe                       |
//! | GET    | `/status`         | Chain and registry summary           |
//! | POST   | `/rpc`            | JSON-RPC 2.0 gateway (named params)  |
//! | GET    | `/positions/:id`  | Live position by token id            |
//! | GET    | `/ws`             | WebSocket stream of committed events |
//!
//! Amounts travel as decimal strings in both directions (plain JSON
//! numbers are also accepted on input). Token ids are `0x` hex or decimal
//! strings.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use synthswap_contracts::{PositionEvent, PositionId, SwapError, SwapInto};
use synthswap_protocol::chain::CallContext;
use synthswap_protocol::exchange::FixedRatePool;
use synthswap_protocol::math::AssetPrice;
use synthswap_protocol::Amount;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::parse_price;
use crate::devnet::DevnetNode;
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier from the configuration.
    pub network: String,
    /// Chain and registry. One lock guards both, so every call sees and
    /// commits a consistent world. Never held across an `.await`.
    pub node: Arc<Mutex<DevnetNode>>,
    /// Broadcast channel for committed events.
    pub event_tx: broadcast::Sender<NodeEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

/// Events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// The registry committed an event.
    Position { timestamp: u64, event: PositionEvent },
    /// The chain clock moved forward.
    TimeAdvanced { timestamp: u64 },
}

impl AppState {
    /// Publishes events to subscribers. Having no subscribers is fine.
    pub fn broadcast(&self, events: impl IntoIterator<Item = NodeEvent>) {
        for event in events {
            let _ = self.event_tx.send(event);
        }
    }

    /// Moves the chain clock forward and notifies subscribers.
    pub fn advance_time(&self, secs: u64) -> u64 {
        let timestamp = {
            let mut node = self.node.lock();
            node.chain.advance_time(secs);
            self.metrics.observe(&node);
            node.chain.now()
        };
        self.broadcast([NodeEvent::TimeAdvanced { timestamp }]);
        timestamp
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .route("/positions/:id", get(position_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// Malformed envelope.
pub const INVALID_REQUEST: i32 = -32600;
/// No such method.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Params missing or of the wrong shape.
pub const INVALID_PARAMS: i32 = -32602;
/// Response could not be encoded.
pub const INTERNAL_ERROR: i32 = -32603;
/// The registry reverted the call.
pub const EXECUTION_REVERTED: i32 = -32000;

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Named method parameters.
    pub params: Option<Value>,
    /// Request identifier. Echoed back in the response.
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<SwapError> for JsonRpcError {
    fn from(err: SwapError) -> Self {
        Self {
            code: EXECUTION_REVERTED,
            message: err.to_string(),
            data: Some(json!({ "kind": err.kind(), "reason": err.reason() })),
        }
    }
}

/// Why a call did not produce a result.
#[derive(Debug)]
enum RpcFailure {
    MethodNotFound(String),
    InvalidParams(String),
    Reverted(SwapError),
    Internal(String),
}

impl From<SwapError> for RpcFailure {
    fn from(err: SwapError) -> Self {
        RpcFailure::Reverted(err)
    }
}

impl From<RpcFailure> for JsonRpcError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::MethodNotFound(method) => {
                JsonRpcError::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
            }
            RpcFailure::InvalidParams(msg) => {
                JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {msg}"))
            }
            RpcFailure::Reverted(err) => err.into(),
            RpcFailure::Internal(msg) => {
                JsonRpcError::new(INTERNAL_ERROR, format!("Internal error: {msg}"))
            }
        }
    }
}

type RpcResult = Result<Value, RpcFailure>;

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

/// Lenient decoders for amounts, token ids and interface ids.
mod de {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use synthswap_contracts::PositionId;
    use synthswap_protocol::{Amount, U256};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(u64),
        Str(String),
    }

    pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<Amount, D::Error> {
        match NumOrStr::deserialize(d)? {
            NumOrStr::Num(n) => Ok(Amount::from(n)),
            NumOrStr::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid amount {s:?}"))),
        }
    }

    fn to_token_id<E: Error>(raw: NumOrStr) -> Result<PositionId, E> {
        match raw {
            NumOrStr::Num(n) => Ok(PositionId::from_u256(U256::from(n))),
            NumOrStr::Str(s) => s
                .parse()
                .map_err(|_| E::custom(format!("invalid token id {s:?}"))),
        }
    }

    pub fn token_id<'de, D: Deserializer<'de>>(d: D) -> Result<PositionId, D::Error> {
        to_token_id(NumOrStr::deserialize(d)?)
    }

    pub fn opt_token_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<PositionId>, D::Error> {
        Option::<NumOrStr>::deserialize(d)?.map(to_token_id::<D::Error>).transpose()
    }

    pub fn interface_id<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        match NumOrStr::deserialize(d)? {
            NumOrStr::Num(n) => u32::try_from(n).map_err(D::Error::custom),
            NumOrStr::Str(s) => {
                let hex = s.trim().trim_start_matches("0x");
                u32::from_str_radix(hex, 16)
                    .map_err(|_| D::Error::custom(format!("invalid interface id {s:?}")))
            }
        }
    }
}

fn params<P: DeserializeOwned>(raw: Option<Value>) -> Result<P, RpcFailure> {
    serde_json::from_value(raw.unwrap_or_else(|| json!({})))
        .map_err(|e| RpcFailure::InvalidParams(e.to_string()))
}

fn to_json<T: Serialize>(value: T) -> RpcResult {
    serde_json::to_value(value).map_err(|e| RpcFailure::Internal(e.to_string()))
}

fn amount(value: Amount) -> Value {
    Value::String(value.to_string())
}

#[derive(Deserialize)]
struct TokenParams {
    #[serde(deserialize_with = "de::token_id")]
    token_id: PositionId,
}

#[derive(Deserialize)]
struct AddSynthParams {
    synth: Address,
    pool: Address,
    #[serde(default)]
    fee_bps: u32,
    coins: Vec<PoolCoinParams>,
}

#[derive(Deserialize)]
struct PoolCoinParams {
    asset: Address,
    price: String,
}

#[derive(Deserialize)]
struct SwapIntoParams {
    caller: Address,
    source: Address,
    synth: Address,
    #[serde(deserialize_with = "de::amount")]
    amount: Amount,
    #[serde(default, deserialize_with = "de::amount")]
    min_amount: Amount,
    #[serde(default)]
    receiver: Option<Address>,
    #[serde(default, deserialize_with = "de::opt_token_id")]
    token_id: Option<PositionId>,
    /// Native value attached to the call.
    #[serde(default, deserialize_with = "de::amount")]
    value: Amount,
}

#[derive(Deserialize)]
struct SwapFromParams {
    caller: Address,
    #[serde(deserialize_with = "de::token_id")]
    token_id: PositionId,
    target: Address,
    #[serde(deserialize_with = "de::amount")]
    amount: Amount,
    #[serde(default, deserialize_with = "de::amount")]
    min_amount: Amount,
    #[serde(default)]
    receiver: Option<Address>,
}

#[derive(Deserialize)]
struct WithdrawParams {
    caller: Address,
    #[serde(deserialize_with = "de::token_id")]
    token_id: PositionId,
    #[serde(deserialize_with = "de::amount")]
    amount: Amount,
    #[serde(default)]
    receiver: Option<Address>,
}

#[derive(Deserialize)]
struct QuoteIntoParams {
    source: Address,
    synth: Address,
    #[serde(deserialize_with = "de::amount")]
    amount: Amount,
}

#[derive(Deserialize)]
struct QuoteFromParams {
    synth: Address,
    target: Address,
    #[serde(deserialize_with = "de::amount")]
    amount: Amount,
}

#[derive(Deserialize)]
struct TransferParams {
    caller: Address,
    from: Address,
    to: Address,
    #[serde(deserialize_with = "de::token_id")]
    token_id: PositionId,
}

#[derive(Deserialize)]
struct ApproveParams {
    caller: Address,
    approved: Address,
    #[serde(deserialize_with = "de::token_id")]
    token_id: PositionId,
}

#[derive(Deserialize)]
struct ApprovalForAllParams {
    caller: Address,
    operator: Address,
    approved: bool,
}

#[derive(Deserialize)]
struct MintParams {
    asset: Address,
    to: Address,
    #[serde(deserialize_with = "de::amount")]
    amount: Amount,
}

#[derive(Deserialize)]
struct BalanceParams {
    asset: Address,
    account: Address,
}

#[derive(Deserialize)]
struct SetPriceParams {
    synth: Address,
    price: String,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Network identifier.
    pub network: String,
    /// Chain timestamp (unix seconds).
    pub chain_timestamp: u64,
    /// Positions currently minted.
    pub live_positions: usize,
    /// Vaults deployed by the registry.
    pub deployed_vaults: usize,
    /// Vaults waiting to be reused.
    pub free_vaults: usize,
    /// Seconds a gate conversion stays pending.
    pub settlement_delay_secs: u64,
    /// Gate fee in basis points.
    pub settlement_fee_bps: u32,
    /// `(account, synth)` pairs with a pending conversion.
    pub pending_settlements: usize,
    /// Synths the gate trades, sorted.
    pub synths: Vec<Address>,
    /// ISO-8601 wall-clock timestamp of the response.
    pub timestamp: String,
}

/// A live position, as returned by `GET /positions/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PositionResponse {
    pub token_id: String,
    pub owner: Address,
    pub synth: Address,
    /// Decimal string.
    pub underlying_balance: String,
    pub settled: bool,
    pub vault: Address,
    pub generation: u64,
}

impl PositionResponse {
    fn of(node: &DevnetNode, id: PositionId) -> Result<Self, SwapError> {
        let info = node.swap.token_info(&node.chain, id)?;
        Ok(Self {
            token_id: id.to_string(),
            owner: info.owner,
            synth: info.synth,
            underlying_balance: info.underlying_balance.to_string(),
            settled: node.swap.is_settled(&node.chain, id),
            vault: id.vault_address(),
            generation: id.generation(),
        })
    }
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /status`: chain clock and registry counters.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let node = state.node.lock();
    let pool = node.swap.vault_pool();
    let mut synths = node.gate.synths();
    synths.sort();
    Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        chain_timestamp: node.chain.now(),
        live_positions: node.swap.live_positions(),
        deployed_vaults: pool.deployed_count(),
        free_vaults: pool.free_count(),
        settlement_delay_secs: node.gate.delay_secs(),
        settlement_fee_bps: node.gate.fee_bps(),
        pending_settlements: node.chain.settlement().pending_accounts(),
        synths,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /positions/:id`: 404 unless the id is live.
async fn position_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Ok(id) = id.parse::<PositionId>() else {
        let err = ErrorResponse {
            error: format!("Invalid token id: {id}"),
        };
        return (StatusCode::BAD_REQUEST, Json(json!(err))).into_response();
    };

    let node = state.node.lock();
    match PositionResponse::of(&node, id) {
        Ok(position) => (StatusCode::OK, Json(json!(position))).into_response(),
        Err(_) => {
            let err = ErrorResponse {
                error: format!("Position not found: {id}"),
            };
            (StatusCode::NOT_FOUND, Json(json!(err))).into_response()
        }
    }
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
///
/// Every call runs under the node lock. Events committed by the call are
/// broadcast after the lock is released.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError::new(
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            )),
            id: req.id,
        });
    }

    if req.method == "dev_advanceTime" {
        let outcome = params::<AdvanceTimeParams>(req.params)
            .map(|p| json!(state.advance_time(p.seconds)));
        return Json(respond(outcome, req.id));
    }

    let (outcome, events) = {
        let timer = state.metrics.operation_latency_seconds.start_timer();
        let mut node = state.node.lock();
        let outcome = dispatch(&state, &mut node, &req.method, req.params);
        let timestamp = node.chain.now();
        let events: Vec<NodeEvent> = node
            .swap
            .take_events()
            .into_iter()
            .map(|event| NodeEvent::Position { timestamp, event })
            .collect();
        state.metrics.observe(&node);
        timer.observe_duration();
        (outcome, events)
    };
    state.broadcast(events);

    Json(respond(outcome, req.id))
}

#[derive(Deserialize)]
struct AdvanceTimeParams {
    seconds: u64,
}

fn respond(outcome: RpcResult, id: Value) -> JsonRpcResponse {
    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(failure) => (None, Some(failure.into())),
    };
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id,
    }
}

/// Runs one JSON-RPC method against the locked node.
fn dispatch(state: &AppState, node: &mut DevnetNode, method: &str, raw: Option<Value>) -> RpcResult {
    let metrics = &state.metrics;
    let DevnetNode { chain, swap, gate } = node;

    match method {
        // -- registry -------------------------------------------------------
        "synth_addSynth" => {
            let p: AddSynthParams = params(raw)?;
            let mut pool = FixedRatePool::new(p.pool, p.fee_bps)
                .map_err(|e| RpcFailure::InvalidParams(e.to_string()))?;
            for coin in p.coins {
                let decimals = chain
                    .ledger()
                    .asset(coin.asset)
                    .map(|info| info.decimals)
                    .ok_or_else(|| RpcFailure::InvalidParams(format!("unknown asset {}", coin.asset)))?;
                let price =
                    parse_price(&coin.price).map_err(|e| RpcFailure::InvalidParams(e.to_string()))?;
                pool = pool.with_coin(coin.asset, AssetPrice::new(price, decimals));
            }
            let result = swap.add_synth(p.synth, Arc::new(pool));
            metrics.record("add_synth", &result);
            result?;
            Ok(Value::Null)
        }
        "synth_swapInto" => {
            let p: SwapIntoParams = params(raw)?;
            let mut request = SwapInto::new(p.source, p.synth, p.amount, p.min_amount);
            if let Some(receiver) = p.receiver {
                request = request.receiver(receiver);
            }
            if let Some(id) = p.token_id {
                request = request.into_position(id);
            }
            let ctx = CallContext::new(p.caller).with_value(p.value);
            let result = swap.swap_into_synth(chain, ctx, request);
            metrics.record("swap_into_synth", &result);
            Ok(json!(result?.to_string()))
        }
        "synth_swapFrom" => {
            let p: SwapFromParams = params(raw)?;
            let result = swap.swap_from_synth(
                chain,
                CallContext::new(p.caller),
                p.token_id,
                p.target,
                p.amount,
                p.min_amount,
                p.receiver,
            );
            metrics.record("swap_from_synth", &result);
            Ok(amount(result?))
        }
        "synth_withdraw" => {
            let p: WithdrawParams = params(raw)?;
            let result = swap.withdraw(
                chain,
                CallContext::new(p.caller),
                p.token_id,
                p.amount,
                p.receiver,
            );
            metrics.record("withdraw", &result);
            result?;
            Ok(Value::Null)
        }
        "synth_settle" => {
            let p: TokenParams = params(raw)?;
            let result = swap.settle(chain, p.token_id);
            metrics.record("settle", &result);
            let outcome = result?;
            Ok(json!({
                "reclaimed": amount(outcome.reclaimed),
                "rebated": amount(outcome.rebated),
                "entries": outcome.entries,
            }))
        }
        "synth_isSettled" => {
            let p: TokenParams = params(raw)?;
            Ok(json!(swap.is_settled(chain, p.token_id)))
        }
        "synth_tokenInfo" => {
            let p: TokenParams = params(raw)?;
            let info = swap.token_info(chain, p.token_id)?;
            Ok(json!({
                "owner": info.owner,
                "synth": info.synth,
                "underlying_balance": amount(info.underlying_balance),
            }))
        }
        "synth_quoteSwapInto" => {
            let p: QuoteIntoParams = params(raw)?;
            Ok(amount(swap.get_swap_into_synth_amount(chain, p.source, p.synth, p.amount)?))
        }
        "synth_quoteSwapFrom" => {
            let p: QuoteFromParams = params(raw)?;
            Ok(amount(swap.get_swap_from_synth_amount(chain, p.synth, p.target, p.amount)?))
        }
        "synth_swappableSynth" => {
            #[derive(Deserialize)]
            struct P {
                coin: Address,
            }
            let p: P = params(raw)?;
            to_json(swap.swappable_synth(p.coin))
        }
        "synth_synthPool" => {
            #[derive(Deserialize)]
            struct P {
                synth: Address,
            }
            let p: P = params(raw)?;
            to_json(swap.synth_pool(p.synth))
        }
        "synth_positionOfVault" => {
            #[derive(Deserialize)]
            struct P {
                vault: Address,
            }
            let p: P = params(raw)?;
            Ok(json!(swap.position_of_vault(p.vault).map(|id| id.to_string())))
        }

        // -- ownership ------------------------------------------------------
        "nft_balanceOf" => {
            #[derive(Deserialize)]
            struct P {
                owner: Address,
            }
            let p: P = params(raw)?;
            Ok(json!(swap.balance_of(p.owner)?))
        }
        "nft_ownerOf" => {
            let p: TokenParams = params(raw)?;
            to_json(swap.owner_of(p.token_id)?)
        }
        "nft_getApproved" => {
            let p: TokenParams = params(raw)?;
            to_json(swap.get_approved(p.token_id)?)
        }
        "nft_isApprovedForAll" => {
            #[derive(Deserialize)]
            struct P {
                owner: Address,
                operator: Address,
            }
            let p: P = params(raw)?;
            Ok(json!(swap.is_approved_for_all(p.owner, p.operator)))
        }
        "nft_transferFrom" => {
            let p: TransferParams = params(raw)?;
            let result = swap.transfer_from(CallContext::new(p.caller), p.from, p.to, p.token_id);
            metrics.record("transfer_from", &result);
            result?;
            Ok(Value::Null)
        }
        "nft_approve" => {
            let p: ApproveParams = params(raw)?;
            let result = swap.approve(CallContext::new(p.caller), p.approved, p.token_id);
            metrics.record("approve", &result);
            result?;
            Ok(Value::Null)
        }
        "nft_setApprovalForAll" => {
            let p: ApprovalForAllParams = params(raw)?;
            let result = swap.set_approval_for_all(CallContext::new(p.caller), p.operator, p.approved);
            metrics.record("set_approval_for_all", &result);
            result?;
            Ok(Value::Null)
        }
        "nft_supportsInterface" => {
            #[derive(Deserialize)]
            struct P {
                #[serde(deserialize_with = "de::interface_id")]
                interface_id: u32,
            }
            let p: P = params(raw)?;
            Ok(json!(swap.supports_interface(p.interface_id)))
        }

        // -- devnet helpers -------------------------------------------------
        "dev_mint" => {
            let p: MintParams = params(raw)?;
            chain
                .ledger_mut()
                .mint(p.asset, p.to, p.amount)
                .map_err(SwapError::from)?;
            Ok(amount(chain.balance_of(p.asset, p.to)))
        }
        "dev_balanceOf" => {
            let p: BalanceParams = params(raw)?;
            Ok(amount(chain.balance_of(p.asset, p.account)))
        }
        "dev_timestamp" => Ok(json!(chain.now())),
        "dev_setPrice" => {
            let p: SetPriceParams = params(raw)?;
            let decimals = chain
                .ledger()
                .asset(p.synth)
                .map(|info| info.decimals)
                .ok_or_else(|| RpcFailure::InvalidParams(format!("unknown asset {}", p.synth)))?;
            let price = parse_price(&p.price).map_err(|e| RpcFailure::InvalidParams(e.to_string()))?;
            gate.set_price(p.synth, AssetPrice::new(price, decimals));
            Ok(Value::Null)
        }

        _ => Err(RpcFailure::MethodNotFound(method.to_string())),
    }
}

/// `GET /ws`: WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`NodeEvent`] messages. The connection is
/// read-only from the server's perspective; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

/// Advances the chain clock every `interval`, by the same number of
/// seconds. Runs until aborted.
pub async fn clock_loop(state: AppState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let timestamp = state.advance_time(interval.as_secs());
        tracing::debug!(timestamp, "chain clock advanced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use synthswap_contracts::ErrorKind;
    use tower::ServiceExt;

    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);
    const DAI: Address = Address::repeat_byte(0x20);
    const SBTC: Address = Address::repeat_byte(0x11);
    const SETH: Address = Address::repeat_byte(0x12);
    const WBTC: Address = Address::repeat_byte(0x22);

    /// 60k DAI, roughly one sBTC at devnet prices.
    const SIXTY_K_DAI: &str = "60000000000000000000000";

    /// Creates a test AppState backed by the built-in devnet.
    fn test_app_state() -> AppState {
        let (node, _) = DevnetNode::from_config(&NodeConfig::devnet()).unwrap();
        let (event_tx, _) = broadcast::channel(16);
        let metrics = Arc::new(crate::metrics::NodeMetrics::new().unwrap());

        AppState {
            version: "0.1.0-test".into(),
            network: "devnet".into(),
            node: Arc::new(Mutex::new(node)),
            event_tx,
            metrics,
        }
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    async fn rpc(router: &Router, method: &str, params: Value) -> JsonRpcResponse {
        let body = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
        let (status, body) = post_json(router, "/rpc", body).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    async fn rpc_ok(router: &Router, method: &str, params: Value) -> Value {
        let resp = rpc(router, method, params).await;
        assert!(resp.error.is_none(), "{method} failed: {:?}", resp.error);
        resp.result.unwrap_or(Value::Null)
    }

    /// Funds Alice and opens an sBTC position from DAI. Returns the token id.
    async fn open_position(router: &Router) -> String {
        rpc_ok(router, "dev_mint", json!({ "asset": DAI, "to": ALICE, "amount": SIXTY_K_DAI })).await;
        let id = rpc_ok(
            router,
            "synth_swapInto",
            json!({ "caller": ALICE, "source": DAI, "synth": SBTC, "amount": SIXTY_K_DAI }),
        )
        .await;
        id.as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_devnet() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.network, "devnet");
        assert_eq!(resp.live_positions, 0);
        assert_eq!(resp.deployed_vaults, 3);
        assert_eq!(resp.free_vaults, 3);
        assert_eq!(resp.chain_timestamp, NodeConfig::devnet().genesis_timestamp);
        assert_eq!(resp.settlement_delay_secs, 300);
        assert_eq!(resp.settlement_fee_bps, 30);
        assert_eq!(resp.pending_settlements, 0);
        assert!(resp.synths.contains(&SBTC));
        assert!(resp.synths.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn status_counts_pending_settlements() {
        let router = create_router(test_app_state());
        open_position(&router).await;

        let (_, body) = get(&router, "/status").await;
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.live_positions, 1);
        assert_eq!(resp.pending_settlements, 1);
    }

    #[tokio::test]
    async fn rpc_invalid_version_returns_error() {
        let router = create_router(test_app_state());
        let body = json!({ "jsonrpc": "1.0", "method": "dev_timestamp", "id": 20 });
        let (_, body) = post_json(&router, "/rpc", body).await;
        let resp: JsonRpcResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
        assert_eq!(resp.id, json!(20));
    }

    #[tokio::test]
    async fn rpc_unknown_method() {
        let router = create_router(test_app_state());
        let resp = rpc(&router, "synth_teleport", json!({})).await;
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn rpc_missing_params() {
        let router = create_router(test_app_state());
        let resp = rpc(&router, "synth_withdraw", json!({ "token_id": "0x1" })).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(err.message.contains("caller"));

        let resp = rpc(
            &router,
            "dev_mint",
            json!({ "asset": DAI, "to": ALICE, "amount": "12abc" }),
        )
        .await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn swap_into_matches_quote() {
        let router = create_router(test_app_state());
        let quote = rpc_ok(
            &router,
            "synth_quoteSwapInto",
            json!({ "source": DAI, "synth": SBTC, "amount": SIXTY_K_DAI }),
        )
        .await;
        let id = open_position(&router).await;

        let info = rpc_ok(&router, "synth_tokenInfo", json!({ "token_id": id })).await;
        assert_eq!(info["underlying_balance"], quote);
        assert_eq!(info["owner"], json!(ALICE));
        assert_eq!(info["synth"], json!(SBTC));
        assert_eq!(
            rpc_ok(&router, "dev_balanceOf", json!({ "asset": DAI, "account": ALICE })).await,
            json!("0")
        );
    }

    #[tokio::test]
    async fn withdraw_waits_for_settlement() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let id = open_position(&router).await;
        let info = rpc_ok(&router, "synth_tokenInfo", json!({ "token_id": id })).await;
        let balance = info["underlying_balance"].clone();

        let resp = rpc(
            &router,
            "synth_withdraw",
            json!({ "caller": ALICE, "token_id": id, "amount": balance }),
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, EXECUTION_REVERTED);
        let data = err.data.unwrap();
        assert_eq!(data["kind"], json!(ErrorKind::NotReady));
        assert_eq!(data["reason"], "Settlement not finished");
        assert_eq!(rpc_ok(&router, "synth_isSettled", json!({ "token_id": id })).await, json!(false));

        rpc_ok(&router, "dev_advanceTime", json!({ "seconds": 300 })).await;
        rpc_ok(
            &router,
            "synth_withdraw",
            json!({ "caller": ALICE, "token_id": id, "amount": balance }),
        )
        .await;

        assert_eq!(
            rpc_ok(&router, "dev_balanceOf", json!({ "asset": SBTC, "account": ALICE })).await,
            balance
        );
        let resp = rpc(&router, "nft_ownerOf", json!({ "token_id": id })).await;
        assert_eq!(resp.error.unwrap().data.unwrap()["reason"], "Unknown Token ID");

        let metrics = &state.metrics;
        assert_eq!(metrics.operations_total.with_label_values(&["withdraw"]).get(), 1);
        assert_eq!(
            metrics.reverts_total.with_label_values(&["withdraw", "not_ready"]).get(),
            1
        );
        assert_eq!(metrics.live_positions.get(), 0);
    }

    #[tokio::test]
    async fn swap_from_pays_out_in_target() {
        let router = create_router(test_app_state());
        let id = open_position(&router).await;
        rpc_ok(&router, "dev_advanceTime", json!({ "seconds": 300 })).await;
        let info = rpc_ok(&router, "synth_tokenInfo", json!({ "token_id": id })).await;
        let balance = info["underlying_balance"].clone();

        let quote = rpc_ok(
            &router,
            "synth_quoteSwapFrom",
            json!({ "synth": SBTC, "target": WBTC, "amount": balance }),
        )
        .await;
        let paid = rpc_ok(
            &router,
            "synth_swapFrom",
            json!({
                "caller": ALICE,
                "token_id": id,
                "target": WBTC,
                "amount": balance,
                "min_amount": quote,
                "receiver": BOB,
            }),
        )
        .await;
        assert_eq!(paid, quote);
        assert_eq!(
            rpc_ok(&router, "dev_balanceOf", json!({ "asset": WBTC, "account": BOB })).await,
            quote
        );
    }

    #[tokio::test]
    async fn ownership_methods() {
        let router = create_router(test_app_state());
        let id = open_position(&router).await;

        assert_eq!(rpc_ok(&router, "nft_balanceOf", json!({ "owner": ALICE })).await, json!(1));
        rpc_ok(
            &router,
            "nft_setApprovalForAll",
            json!({ "caller": ALICE, "operator": BOB, "approved": true }),
        )
        .await;
        assert_eq!(
            rpc_ok(&router, "nft_isApprovedForAll", json!({ "owner": ALICE, "operator": BOB })).await,
            json!(true)
        );
        rpc_ok(
            &router,
            "nft_transferFrom",
            json!({ "caller": BOB, "from": ALICE, "to": BOB, "token_id": id }),
        )
        .await;
        assert_eq!(rpc_ok(&router, "nft_ownerOf", json!({ "token_id": id })).await, json!(BOB));
        assert_eq!(
            rpc_ok(&router, "nft_getApproved", json!({ "token_id": id })).await,
            json!(Address::ZERO)
        );

        let resp = rpc(
            &router,
            "nft_approve",
            json!({ "caller": ALICE, "approved": ALICE, "token_id": id }),
        )
        .await;
        assert_eq!(resp.error.unwrap().data.unwrap()["kind"], "authorization");

        assert_eq!(
            rpc_ok(&router, "nft_supportsInterface", json!({ "interface_id": "0x80ac58cd" })).await,
            json!(true)
        );
        assert_eq!(
            rpc_ok(&router, "nft_supportsInterface", json!({ "interface_id": "0xffffffff" })).await,
            json!(false)
        );
    }

    #[tokio::test]
    async fn routing_views() {
        let router = create_router(test_app_state());
        assert_eq!(
            rpc_ok(&router, "synth_swappableSynth", json!({ "coin": WBTC })).await,
            json!(SBTC)
        );
        assert_eq!(
            rpc_ok(&router, "synth_synthPool", json!({ "synth": SBTC })).await,
            json!(Address::repeat_byte(0x31))
        );
        assert_eq!(
            rpc_ok(&router, "synth_swappableSynth", json!({ "coin": Address::repeat_byte(0x99) })).await,
            Value::Null
        );

        let id = open_position(&router).await;
        let position = id.parse::<PositionId>().unwrap();
        assert_eq!(
            rpc_ok(
                &router,
                "synth_positionOfVault",
                json!({ "vault": position.vault_address() })
            )
            .await,
            json!(id)
        );
    }

    #[tokio::test]
    async fn add_synth_conflicts_are_reverts() {
        let router = create_router(test_app_state());
        let resp = rpc(
            &router,
            "synth_addSynth",
            json!({
                "synth": SETH,
                "pool": Address::repeat_byte(0x40),
                "coins": [{ "asset": SETH, "price": "3000" }],
            }),
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, EXECUTION_REVERTED);
        assert_eq!(err.data.unwrap()["reason"], "Synth already added");
    }

    #[tokio::test]
    async fn token_info_reverts_for_unknown_id() {
        let router = create_router(test_app_state());
        let resp = rpc(&router, "synth_tokenInfo", json!({ "token_id": "0x1234" })).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, EXECUTION_REVERTED);
        let data = err.data.unwrap();
        assert_eq!(data["kind"], "not_found");
        assert_eq!(data["reason"], "Unknown Token ID");
    }

    #[tokio::test]
    async fn committed_events_are_broadcast() {
        let state = test_app_state();
        let mut rx = state.event_tx.subscribe();
        let router = create_router(state);
        let id = open_position(&router).await;

        match rx.try_recv().unwrap() {
            NodeEvent::Position {
                event: PositionEvent::Transfer { from, to, token_id },
                ..
            } => {
                assert_eq!(from, Address::ZERO);
                assert_eq!(to, ALICE);
                assert_eq!(token_id.to_string(), id);
            }
            other => panic!("unexpected event {other:?}"),
        }

        // A revert broadcasts nothing.
        let resp = rpc(
            &router,
            "synth_withdraw",
            json!({ "caller": BOB, "token_id": id, "amount": 1 }),
        )
        .await;
        assert!(resp.error.is_some());
        assert!(rx.try_recv().is_err());

        rpc_ok(&router, "dev_advanceTime", json!({ "seconds": 10 })).await;
        assert!(matches!(rx.try_recv().unwrap(), NodeEvent::TimeAdvanced { .. }));
    }

    #[tokio::test]
    async fn position_endpoint() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/positions/0x1234").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("not found"));

        let (status, _) = get(&router, "/positions/not-an-id").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let id = open_position(&router).await;
        let (status, body) = get(&router, &format!("/positions/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        let resp: PositionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.token_id, id);
        assert_eq!(resp.owner, ALICE);
        assert_eq!(resp.generation, 0);
        assert!(!resp.settled);
    }

    #[tokio::test]
    async fn price_move_shows_up_at_settlement() {
        let router = create_router(test_app_state());
        let id = open_position(&router).await;
        rpc_ok(&router, "dev_setPrice", json!({ "synth": SBTC, "price": "50000" })).await;
        rpc_ok(&router, "dev_advanceTime", json!({ "seconds": 300 })).await;

        let outcome = rpc_ok(&router, "synth_settle", json!({ "token_id": id })).await;
        assert_eq!(outcome["entries"], json!(1));
        assert_eq!(outcome["reclaimed"], json!("0"));
        assert_ne!(outcome["rebated"], json!("0"));
        assert_eq!(rpc_ok(&router, "synth_isSettled", json!({ "token_id": id })).await, json!(true));
    }
}
