//! Streaming digest transform.
//!
//! A null transform on the response body: every chunk is forwarded to the
//! client unchanged and fed to a running SHA-256. When the body completes the
//! digest is recorded in the digest index, after the downstream side has been
//! closed so the client is never held up by the index write.
//!
//! State machine:
//!
//! ```text
//! Uninitialized --first chunk, capacity--> Streaming --end of body--> Finished
//!       |                                      |
//!       +------ capacity gone / upstream error +----------------> Aborted
//! ```
//!
//! An aborted body never produces a digest and never writes the index. An
//! empty body gets the SHA-256 of no bytes but is not indexed.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::debug;

use crate::index::DigestIndexWriter;

/// Lifecycle of one transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformState {
    Uninitialized,
    Streaming,
    Finished,
    Aborted,
}

impl TransformState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransformState::Finished | TransformState::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransformState::Uninitialized => "uninitialized",
            TransformState::Streaming => "streaming",
            TransformState::Finished => "finished",
            TransformState::Aborted => "aborted",
        }
    }
}

/// What the body pipeline delivered to the transform.
enum BodyEvent {
    Data(Bytes),
    End,
    Abort,
}

/// Hash state, allocated with the first body byte.
struct TransformContext {
    hasher: Sha256,
    consumed: u64,
}

/// Summary of one transform run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    pub state: TransformState,
    /// Bytes forwarded downstream.
    pub bytes: u64,
    /// SHA-256 of the forwarded bytes; set whenever the body finished.
    pub digest: Option<[u8; 32]>,
    /// Whether an index entry was committed.
    pub indexed: bool,
}

impl TransformReport {
    pub fn digest_hex(&self) -> Option<String> {
        self.digest.map(hex::encode)
    }
}

/// Pass-through body filter computing the content digest of one response.
#[derive(Debug)]
pub struct DigestTransform {
    request_url: String,
    index: Option<DigestIndexWriter>,
    state: TransformState,
    ctx: Option<TransformContext>,
    digest: Option<[u8; 32]>,
    forwarded: u64,
}

impl std::fmt::Debug for TransformContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformContext").field("consumed", &self.consumed).finish_non_exhaustive()
    }
}

impl DigestTransform {
    /// Create a transform for the response to `request_url`.
    ///
    /// With `index` set to `None` the digest is still computed but not recorded.
    pub fn new(request_url: impl Into<String>, index: Option<DigestIndexWriter>) -> Self {
        Self {
            request_url: request_url.into(),
            index,
            state: TransformState::Uninitialized,
            ctx: None,
            digest: None,
            forwarded: 0,
        }
    }

    pub fn state(&self) -> TransformState {
        self.state
    }

    /// Drive the transform until the body ends or the pipeline goes away.
    ///
    /// Each chunk waits for downstream capacity before it is hashed and
    /// sent, so at most one body write is outstanding. `output` is dropped
    /// before the index write, which tells the receiver the body is complete.
    pub async fn run<S, E>(mut self, mut input: S, output: mpsc::Sender<Bytes>) -> TransformReport
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        while !self.state.is_terminal() {
            let event = match input.next().await {
                Some(Ok(chunk)) => BodyEvent::Data(chunk),
                Some(Err(e)) => {
                    debug!(url = %self.request_url, error = %e, "upstream body failed");
                    BodyEvent::Abort
                }
                None => BodyEvent::End,
            };

            self.state = match event {
                BodyEvent::Data(chunk) => self.on_data(chunk, &output).await,
                BodyEvent::End => self.on_end(),
                BodyEvent::Abort => self.on_abort(),
            };
        }
        drop(output);

        let indexed = match (&self.index, self.digest) {
            (Some(index), Some(digest)) if self.forwarded > 0 => index.write(&digest, &self.request_url).await,
            _ => false,
        };

        TransformReport { state: self.state, bytes: self.forwarded, digest: self.digest, indexed }
    }

    async fn on_data(&mut self, chunk: Bytes, output: &mpsc::Sender<Bytes>) -> TransformState {
        if chunk.is_empty() {
            return self.state;
        }

        let Ok(permit) = output.reserve().await else {
            debug!(url = %self.request_url, forwarded = self.forwarded, "downstream closed before end of body");
            return self.on_abort();
        };

        let ctx = self.ctx.get_or_insert_with(|| TransformContext { hasher: Sha256::new(), consumed: 0 });
        ctx.hasher.update(&chunk);
        ctx.consumed += chunk.len() as u64;
        self.forwarded = ctx.consumed;
        permit.send(chunk);

        TransformState::Streaming
    }

    fn on_end(&mut self) -> TransformState {
        match self.ctx.take() {
            Some(ctx) => {
                let digest: [u8; 32] = ctx.hasher.finalize().into();
                debug!(
                    url = %self.request_url,
                    bytes = ctx.consumed,
                    digest = %hex::encode(digest),
                    "body complete"
                );
                self.digest = Some(digest);
            }
            None => {
                debug!(url = %self.request_url, "empty body, not indexed");
                self.digest = Some(Sha256::digest(b"").into());
            }
        }
        TransformState::Finished
    }

    fn on_abort(&mut self) -> TransformState {
        self.ctx = None;
        TransformState::Aborted
    }
}
