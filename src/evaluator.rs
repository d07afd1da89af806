//! Evaluator-side HTTP service.
//!
//! Stateless request handlers over shared immutable scheme state; the
//! session key store is the only shared mutable resource. Add and subtract
//! need no session. Pairwise multiplication needs the session's
//! relinearization key; the matrix product additionally needs its rotation
//! keys and rejects before decoding anything if either is absent.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use crate::diagonal::diagonal_product;
use crate::error::{Error, Result};
use crate::scheme::{Ciphertext, Evaluator, RelinKey, RotationKeys, SchemeContext};
use crate::session::{
    DeleteOutcome, KeyKind, SessionKey, SessionKeyStore, UploadOutcome,
};
use crate::wire::{
    base64_to_blob, ciphertext_from_base64, ciphertext_to_base64, sequence_from_base64,
    ErrorResponse, KeyRequest, KeyUploadRequest, PairRequest, ResultResponse, SessionPairRequest,
    SessionResultResponse,
};

/// Shared state for all evaluator handlers.
pub struct EvaluatorState {
    ctx: Arc<SchemeContext>,
    evaluator: Evaluator,
    store: Arc<dyn SessionKeyStore>,
}

impl EvaluatorState {
    /// Assemble evaluator state over a context and an injected key store.
    pub fn new(ctx: Arc<SchemeContext>, store: Arc<dyn SessionKeyStore>) -> Self {
        let evaluator = Evaluator::new(ctx.clone());
        Self {
            ctx,
            evaluator,
            store,
        }
    }

    /// The scheme context.
    pub fn context(&self) -> &Arc<SchemeContext> {
        &self.ctx
    }
}

type Rejection = (StatusCode, Json<ErrorResponse>);

fn reject(err: Error) -> Rejection {
    let status = match &err {
        Error::KeyState(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) | Error::Deserialization(_) => StatusCode::BAD_REQUEST,
        Error::Transport(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn parse_kind(name: &str) -> Result<KeyKind> {
    KeyKind::from_wire_name(name)
        .ok_or_else(|| Error::validation(format!("bad key type {name:?}")))
}

fn relin_for(state: &EvaluatorState, sid: &str) -> Result<Arc<SessionKey>> {
    state
        .store
        .get(sid, KeyKind::Relinearization)
        .ok_or_else(|| Error::key_state("RelinKeys for given sid not found"))
}

fn rotation_for(state: &EvaluatorState, sid: &str) -> Result<Arc<SessionKey>> {
    state
        .store
        .get(sid, KeyKind::Rotation)
        .ok_or_else(|| Error::key_state("GaloisKeys for given sid not found"))
}

fn as_relin(key: &SessionKey) -> &RelinKey {
    match key {
        SessionKey::Relinearization(k) => k,
        SessionKey::Rotation(_) => unreachable!("store keyed by kind"),
    }
}

fn as_rotation(key: &SessionKey) -> &RotationKeys {
    match key {
        SessionKey::Rotation(k) => k,
        SessionKey::Relinearization(_) => unreachable!("store keyed by kind"),
    }
}

enum PairOp {
    Add,
    Subtract,
}

fn run_pair_op(state: &EvaluatorState, req: &PairRequest, op: PairOp) -> Result<Ciphertext> {
    let a = ciphertext_from_base64(&req.matrixa, &state.ctx)?;
    let b = ciphertext_from_base64(&req.matrixb, &state.ctx)?;

    let combined = match op {
        PairOp::Add => state.evaluator.add(&a, &b)?,
        PairOp::Subtract => state.evaluator.sub(&a, &b)?,
    };
    // Switch to the smallest modulus so we save in communication.
    state.evaluator.mod_switch_to_smallest(&combined)
}

async fn handle_add(
    State(state): State<Arc<EvaluatorState>>,
    Json(req): Json<PairRequest>,
) -> std::result::Result<Json<ResultResponse>, Rejection> {
    info!("processing request: addition");
    let result = run_pair_op(&state, &req, PairOp::Add).map_err(reject)?;
    Ok(Json(ResultResponse {
        result: ciphertext_to_base64(&result).map_err(reject)?,
    }))
}

async fn handle_subtract(
    State(state): State<Arc<EvaluatorState>>,
    Json(req): Json<PairRequest>,
) -> std::result::Result<Json<ResultResponse>, Rejection> {
    info!("processing request: subtraction");
    let result = run_pair_op(&state, &req, PairOp::Subtract).map_err(reject)?;
    Ok(Json(ResultResponse {
        result: ciphertext_to_base64(&result).map_err(reject)?,
    }))
}

async fn handle_multiply(
    State(state): State<Arc<EvaluatorState>>,
    Json(req): Json<SessionPairRequest>,
) -> std::result::Result<Json<SessionResultResponse>, Rejection> {
    info!("processing request: multiplication");

    let relin = relin_for(&state, &req.sid).map_err(reject)?;

    let result = (|| -> Result<Ciphertext> {
        let a = ciphertext_from_base64(&req.matrixa, &state.ctx)?;
        let b = ciphertext_from_base64(&req.matrixb, &state.ctx)?;
        let product = state.evaluator.multiply(&a, &b)?;
        let product = state.evaluator.relinearize(&product, as_relin(&relin))?;
        state.evaluator.mod_switch_to_smallest(&product)
    })()
    .map_err(reject)?;

    Ok(Json(SessionResultResponse {
        sid: req.sid,
        result: ciphertext_to_base64(&result).map_err(reject)?,
    }))
}

async fn handle_product(
    State(state): State<Arc<EvaluatorState>>,
    Json(req): Json<SessionPairRequest>,
) -> std::result::Result<Json<SessionResultResponse>, Rejection> {
    info!("processing request: matrix product");

    // Both key kinds must be present before any ciphertext is decoded.
    let relin = relin_for(&state, &req.sid).map_err(reject)?;
    let rotation = rotation_for(&state, &req.sid).map_err(reject)?;

    let result = (|| -> Result<Ciphertext> {
        let diagonals = sequence_from_base64(&req.matrixa, &state.ctx)?;
        let operand = ciphertext_from_base64(&req.matrixb, &state.ctx)?;
        diagonal_product(
            &state.ctx,
            &state.evaluator,
            &diagonals,
            &operand,
            as_relin(&relin),
            as_rotation(&rotation),
        )
    })()
    .map_err(reject)?;

    Ok(Json(SessionResultResponse {
        sid: req.sid,
        result: ciphertext_to_base64(&result).map_err(reject)?,
    }))
}

async fn handle_key_query(
    State(state): State<Arc<EvaluatorState>>,
    Json(req): Json<KeyRequest>,
) -> std::result::Result<StatusCode, Rejection> {
    info!("processing request: key query");
    let kind = parse_kind(&req.kind).map_err(reject)?;
    if state.store.query(&req.sid, kind) {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

async fn handle_key_upload(
    State(state): State<Arc<EvaluatorState>>,
    Json(req): Json<KeyUploadRequest>,
) -> std::result::Result<StatusCode, Rejection> {
    info!("processing request: key upload");
    let kind = parse_kind(&req.kind).map_err(reject)?;

    // Occupied slots conflict before any key material is parsed; the
    // store's atomic insert below still decides races.
    if state.store.query(&req.sid, kind) {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("{} for given sid already present", kind.wire_name()),
            }),
        ));
    }

    let key = (|| -> Result<SessionKey> {
        let bytes = base64_to_blob(&req.key)?;
        Ok(match kind {
            KeyKind::Relinearization => {
                SessionKey::Relinearization(RelinKey::from_bytes(&bytes, &state.ctx)?)
            }
            KeyKind::Rotation => SessionKey::Rotation(RotationKeys::from_bytes(&bytes, &state.ctx)?),
        })
    })()
    .map_err(reject)?;

    match state.store.upload(&req.sid, key) {
        UploadOutcome::Stored => Ok(StatusCode::OK),
        UploadOutcome::Conflict => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("{} for given sid already present", kind.wire_name()),
            }),
        )),
    }
}

async fn handle_key_delete(
    State(state): State<Arc<EvaluatorState>>,
    Json(req): Json<KeyRequest>,
) -> std::result::Result<StatusCode, Rejection> {
    info!("processing request: key delete");
    let kind = parse_kind(&req.kind).map_err(reject)?;
    match state.store.delete(&req.sid, kind) {
        DeleteOutcome::Deleted => Ok(StatusCode::OK),
        DeleteOutcome::NotFound => Ok(StatusCode::NOT_FOUND),
    }
}

/// Assemble the evaluator's route table.
pub fn router(state: Arc<EvaluatorState>) -> Router {
    Router::new()
        .route("/add", post(handle_add))
        .route("/subtract", post(handle_subtract))
        .route("/multiply", post(handle_multiply))
        .route("/product", post(handle_product))
        .route("/keys/query", post(handle_key_query))
        .route("/keys/upload", post(handle_key_upload))
        .route("/keys/delete", post(handle_key_delete))
        .with_state(state)
}
