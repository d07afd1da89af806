//! Client-side orchestration.
//!
//! One `MatrixClient` owns a session: a random 256-bit token, the full key
//! set generated once off the calling task, and the codec bound to the
//! shared parameters. Products run the provisioning handshake first (query
//! each key kind, upload the absent ones), then encode, send, decode.
//! Requests within an operation are sequential and awaited one at a time.
//! Shutdown deletes the uploaded keys best-effort; a failed delete is
//! logged, never escalated.

use std::sync::Arc;

use rand::RngCore;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::MatrixCodec;
use crate::diagonal::{encode_product_operands, finalize_product, orient_operands};
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::params::BfvParams;
use crate::scheme::{
    Decryptor, Encryptor, KeyGenerator, RelinKey, RotationKeys, SchemeContext,
};
use crate::session::KeyKind;
use crate::wire::{
    blob_to_base64, ciphertext_from_base64, ciphertext_to_base64, sequence_to_base64, KeyRequest,
    KeyUploadRequest, PairRequest, ResultResponse, SessionPairRequest, SessionResultResponse,
};

/// Client for one evaluator session.
pub struct MatrixClient {
    http: reqwest::Client,
    base_url: String,
    sid: String,
    ctx: Arc<SchemeContext>,
    codec: MatrixCodec,
    encryptor: Encryptor,
    decryptor: Decryptor,
    relin: RelinKey,
    rotation: RotationKeys,
}

impl MatrixClient {
    /// Build a client session against `server`. Key generation is the
    /// expensive one-time setup; it runs on a blocking worker and this
    /// future resolves only once the session is ready for any operation.
    pub async fn connect(server: &str, params: BfvParams) -> Result<Self> {
        let ctx = Arc::new(SchemeContext::new(params)?);

        let keygen_ctx = ctx.clone();
        let (pk, sk, relin, rotation) = tokio::task::spawn_blocking(move || {
            let mut keygen = KeyGenerator::new(keygen_ctx);
            let pk = keygen.public_key();
            let relin = keygen.relin_key();
            let rotation = keygen.rotation_keys();
            (pk, keygen.secret_key(), relin, rotation)
        })
        .await
        .map_err(|e| Error::Transport(format!("key generation task failed: {e}")))?;

        let mut sid_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut sid_bytes);
        let sid = blob_to_base64(&sid_bytes);

        let base_url = if server.starts_with("http") {
            server.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", server.trim_end_matches('/'))
        };

        info!(%sid, "client session ready");
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            sid,
            codec: MatrixCodec::new(ctx.clone())?,
            encryptor: Encryptor::new(ctx.clone(), pk),
            decryptor: Decryptor::new(ctx.clone(), sk),
            relin,
            rotation,
            ctx,
        })
    }

    /// The session token.
    pub fn session_id(&self) -> &str {
        &self.sid
    }

    async fn post_json<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "{path} failed with status {status}: {detail}"
            )));
        }
        Ok(response.json().await?)
    }

    async fn post_for_status<Req: Serialize>(&self, path: &str, body: &Req) -> Result<StatusCode> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Ok(response.status())
    }

    async fn query_key(&self, kind: KeyKind) -> Result<bool> {
        let status = self
            .post_for_status(
                "/keys/query",
                &KeyRequest {
                    sid: self.sid.clone(),
                    kind: kind.wire_name().to_string(),
                },
            )
            .await?;
        debug!(kind = kind.wire_name(), %status, "key query response");
        Ok(status.is_success())
    }

    async fn upload_key(&self, kind: KeyKind) -> Result<()> {
        let bytes = match kind {
            KeyKind::Relinearization => self.relin.to_bytes()?,
            KeyKind::Rotation => self.rotation.to_bytes()?,
        };
        let encoded = blob_to_base64(&bytes);
        info!(
            kind = kind.wire_name(),
            kb = encoded.len() / 1024,
            "uploading session key"
        );

        let status = self
            .post_for_status(
                "/keys/upload",
                &KeyUploadRequest {
                    sid: self.sid.clone(),
                    kind: kind.wire_name().to_string(),
                    key: encoded,
                },
            )
            .await?;
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "{} upload failed with status {status}",
                kind.wire_name()
            )));
        }
        Ok(())
    }

    /// The provisioning handshake: query each kind, upload the absent ones.
    /// Each request is awaited before the next is issued.
    async fn ensure_session_keys(&self) -> Result<()> {
        for kind in [KeyKind::Relinearization, KeyKind::Rotation] {
            if !self.query_key(kind).await? {
                self.upload_key(kind).await?;
            }
        }
        Ok(())
    }

    fn decrypt_result(&self, encoded: &str, rows: usize, cols: usize) -> Result<Matrix> {
        let ct = ciphertext_from_base64(encoded, &self.ctx)?;
        let budget = self.decryptor.invariant_noise_budget(&ct)?;
        debug!(budget, "noise budget of result");
        let plain = self.decryptor.decrypt(&ct)?;
        self.codec.plaintext_to_matrix(&plain, rows, cols)
    }

    fn encode_pair(&mut self, a: &Matrix, b: &Matrix) -> Result<(String, String)> {
        let ca = self.codec.matrix_to_ciphertext(a, &mut self.encryptor)?;
        let cb = self.codec.matrix_to_ciphertext(b, &mut self.encryptor)?;
        let (ba, bb) = (ciphertext_to_base64(&ca)?, ciphertext_to_base64(&cb)?);
        info!(
            kb = (ba.len() + bb.len()) / 1024,
            "sending ciphertext data to evaluator"
        );
        Ok((ba, bb))
    }

    fn check_same_shape(a: &Matrix, b: &Matrix) -> Result<()> {
        if a.rows() != b.rows() || a.cols() != b.cols() {
            return Err(Error::validation(
                "operands must have identical shapes",
            ));
        }
        Ok(())
    }

    /// Encrypted matrix addition.
    pub async fn add(&mut self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        Self::check_same_shape(a, b)?;
        let (matrixa, matrixb) = self.encode_pair(a, b)?;
        let response: ResultResponse = self
            .post_json("/add", &PairRequest { matrixa, matrixb })
            .await?;
        self.decrypt_result(&response.result, a.rows(), a.cols())
    }

    /// Encrypted matrix subtraction.
    pub async fn subtract(&mut self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        Self::check_same_shape(a, b)?;
        let (matrixa, matrixb) = self.encode_pair(a, b)?;
        let response: ResultResponse = self
            .post_json("/subtract", &PairRequest { matrixa, matrixb })
            .await?;
        self.decrypt_result(&response.result, a.rows(), a.cols())
    }

    /// Encrypted elementwise (slotwise) multiplication.
    pub async fn multiply_elementwise(&mut self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        Self::check_same_shape(a, b)?;
        self.ensure_session_keys().await?;

        let (matrixa, matrixb) = self.encode_pair(a, b)?;
        let response: SessionResultResponse = self
            .post_json(
                "/multiply",
                &SessionPairRequest {
                    sid: self.sid.clone(),
                    matrixa,
                    matrixb,
                },
            )
            .await?;
        self.decrypt_result(&response.result, a.rows(), a.cols())
    }

    /// Encrypted matrix product A x B.
    pub async fn product(&mut self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        if a.cols() != b.rows() {
            return Err(Error::validation(
                "matrices are incompatible for multiplication",
            ));
        }
        self.codec.validate_operand(a)?;
        self.codec.validate_operand(b)?;

        self.ensure_session_keys().await?;

        let (result_rows, result_cols) = (a.rows(), b.cols());
        let (oriented_a, oriented_b, transposed) = orient_operands(a, b);
        if transposed {
            info!("computing on transposes for improved performance");
        }

        let encoding =
            encode_product_operands(&oriented_a, &oriented_b, &self.codec, &mut self.encryptor)?;
        let matrixa = sequence_to_base64(&encoding.diagonals)?;
        let matrixb = ciphertext_to_base64(&encoding.operand)?;
        info!(
            kb = (matrixa.len() + matrixb.len()) / 1024,
            "sending ciphertext data to evaluator"
        );

        let response: SessionResultResponse = self
            .post_json(
                "/product",
                &SessionPairRequest {
                    sid: self.sid.clone(),
                    matrixa,
                    matrixb,
                },
            )
            .await?;

        let ct = ciphertext_from_base64(&response.result, &self.ctx)?;
        let budget = self.decryptor.invariant_noise_budget(&ct)?;
        debug!(budget, "noise budget of result");
        let plain = self.decryptor.decrypt(&ct)?;
        let wide = self
            .codec
            .plaintext_to_matrix(&plain, encoding.dimension, encoding.result_cols)?;
        finalize_product(wide, transposed, result_rows, result_cols)
    }

    /// Delete this session's keys from the evaluator. Cleanup is advisory:
    /// failures are logged and swallowed.
    pub async fn shutdown(self) {
        for kind in [KeyKind::Rotation, KeyKind::Relinearization] {
            let request = KeyRequest {
                sid: self.sid.clone(),
                kind: kind.wire_name().to_string(),
            };
            match self.post_for_status("/keys/delete", &request).await {
                Ok(status) if status.is_success() => {
                    debug!(kind = kind.wire_name(), "session key deleted")
                }
                Ok(status) => warn!(
                    kind = kind.wire_name(),
                    %status,
                    "session key delete was not acknowledged"
                ),
                Err(err) => warn!(
                    kind = kind.wire_name(),
                    %err,
                    "session key delete failed"
                ),
            }
        }
    }
}
