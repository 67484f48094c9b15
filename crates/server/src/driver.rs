//! Transaction driver for the stdio harness.
//!
//! Each input line is one proxied response. The driver plays the host: it
//! installs the digest transform when the origin headers arrive, runs the
//! send-response hook on the client headers, and then streams the body
//! through the transform to a bounded client channel.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures_util::stream;
use http::{HeaderMap, HeaderName, HeaderValue};
use metadup_filter::{DedupFilter, Outcome};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{DriverError, ErrorReply};

/// One proxied response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// URL the client requested; the digest is indexed under it.
    pub request_url: String,

    /// Response header fields in order, as `[name, value]` pairs.
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Response body, standard base64.
    #[serde(default)]
    pub body_base64: String,

    /// Chunk sizes to split the body into, repeated until it runs out.
    /// Empty means one chunk.
    #[serde(default)]
    pub chunk_sizes: Vec<usize>,
}

/// What the client would have received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionResult {
    pub headers: Vec<(String, String)>,
    pub outcome: String,
    pub rewritten: bool,
    /// Final state of the digest transform.
    pub state: String,
    /// Hex SHA-256 of the body, when it completed.
    pub digest: Option<String>,
    /// Bytes delivered to the client.
    pub bytes: u64,
    pub indexed: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Reply {
    Done(TransactionResult),
    Failed { error: ErrorReply },
}

/// Drives transactions through a [`DedupFilter`].
#[derive(Debug, Clone)]
pub struct Driver {
    filter: DedupFilter,
    body_channel_capacity: usize,
}

impl Driver {
    pub fn new(filter: DedupFilter, body_channel_capacity: usize) -> Self {
        Self { filter, body_channel_capacity: body_channel_capacity.max(1) }
    }

    /// Run one transaction through both hooks.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` if the transaction cannot be turned into an HTTP
    /// response; the filter itself never fails a transaction.
    pub async fn run(&self, transaction: Transaction) -> Result<TransactionResult, DriverError> {
        let body = STANDARD
            .decode(transaction.body_base64.as_bytes())
            .map_err(|e| DriverError::InvalidBody(e.to_string()))?;
        let mut headers = header_map(&transaction.headers)?;
        let chunks = split_body(Bytes::from(body), &transaction.chunk_sizes)?;

        let transform = self.filter.on_read_response_headers(&transaction.request_url);
        let outcome = self.filter.on_send_response_headers(&mut headers).await;

        let (tx, mut rx) = mpsc::channel::<Bytes>(self.body_channel_capacity);
        let client = async move {
            let mut delivered = 0u64;
            while let Some(chunk) = rx.recv().await {
                delivered += chunk.len() as u64;
            }
            delivered
        };
        let input = stream::iter(chunks.into_iter().map(Ok::<_, std::convert::Infallible>));
        let (report, delivered) = tokio::join!(transform.run(input, tx), client);

        if delivered != report.bytes {
            warn!(url = %transaction.request_url, delivered, forwarded = report.bytes, "client saw a short body");
        }
        info!(
            url = %transaction.request_url,
            outcome = %outcome,
            state = report.state.as_str(),
            bytes = report.bytes,
            indexed = report.indexed,
            "transaction complete"
        );

        Ok(TransactionResult {
            headers: header_pairs(&headers),
            rewritten: outcome.is_rewritten(),
            outcome: outcome_label(&outcome),
            state: report.state.as_str().to_string(),
            digest: report.digest_hex(),
            bytes: delivered,
            indexed: report.indexed,
        })
    }

    /// Handle one input line and produce the output line.
    pub async fn handle_line(&self, line: &str) -> String {
        let reply = match serde_json::from_str::<Transaction>(line) {
            Ok(transaction) => match self.run(transaction).await {
                Ok(result) => Reply::Done(result),
                Err(e) => Reply::Failed { error: ErrorReply::from(&e) },
            },
            Err(e) => Reply::Failed { error: ErrorReply::from(&DriverError::InvalidInput(e.to_string())) },
        };
        if let Reply::Failed { error } = &reply {
            warn!(code = error.code, message = %error.message, "transaction rejected");
        }
        encode_reply(&reply)
    }

    /// Read transactions line by line until EOF, answering each in order.
    /// Returns the number of transactions handled.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<u64>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut handled = 0u64;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let reply = self.handle_line(&line).await;
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            handled += 1;
        }
        debug!(handled, "input closed");
        Ok(handled)
    }
}

/// Sent when a reply cannot be serialized, so every input line still gets a
/// parseable answer.
const UNENCODABLE_REPLY: &str =
    r#"{"error":{"code":"INVALID_INPUT","message":"INVALID_INPUT: result could not be encoded"}}"#;

fn encode_reply<T: Serialize>(reply: &T) -> String {
    serde_json::to_string(reply).unwrap_or_else(|e| {
        warn!(error = %e, "reply serialization failed");
        UNENCODABLE_REPLY.to_string()
    })
}

fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::PassThrough(reason) => reason.as_str().to_string(),
        Outcome::Rewritten { via, .. } => format!("rewritten_{}", via.as_str()),
    }
}

fn header_map(pairs: &[(String, String)]) -> Result<HeaderMap, DriverError> {
    let mut map = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| DriverError::InvalidHeader(format!("{name:?}: {e}")))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| DriverError::InvalidHeader(format!("{name}: {value:?}: {e}")))?;
        map.append(name, value);
    }
    Ok(map)
}

fn header_pairs(map: &HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect()
}

fn split_body(body: Bytes, sizes: &[usize]) -> Result<Vec<Bytes>, DriverError> {
    if sizes.contains(&0) {
        return Err(DriverError::InvalidInput("chunk_sizes must be positive".into()));
    }
    if sizes.is_empty() || body.is_empty() {
        return Ok(if body.is_empty() { Vec::new() } else { vec![body] });
    }

    let mut rest = body;
    let mut chunks = Vec::new();
    for size in sizes.iter().cycle() {
        if rest.is_empty() {
            break;
        }
        chunks.push(rest.split_to((*size).min(rest.len())));
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metadup_core::{CacheKey, MemoryStore};
    use metadup_filter::FilterConfig;
    use metadup_filter::header::encode_sha256;
    use sha2::{Digest, Sha256};
    use std::sync::Arc;

    fn driver(store: &MemoryStore) -> Driver {
        Driver::new(DedupFilter::new(Arc::new(store.clone()), FilterConfig::default()), 2)
    }

    fn transaction(request_url: &str, headers: &[(&str, &str)], body: &[u8]) -> Transaction {
        Transaction {
            request_url: request_url.into(),
            headers: headers.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
            body_base64: STANDARD.encode(body),
            chunk_sizes: vec![3, 1],
        }
    }

    #[test]
    fn test_split_body() {
        let chunks = split_body(Bytes::from_static(b"abcdefgh"), &[3, 1]).unwrap();
        assert_eq!(chunks, vec![&b"abc"[..], b"d", b"efg", b"h"]);
        assert_eq!(split_body(Bytes::from_static(b"abc"), &[]).unwrap(), vec![&b"abc"[..]]);
        assert!(split_body(Bytes::new(), &[4]).unwrap().is_empty());
        assert!(matches!(split_body(Bytes::from_static(b"abc"), &[2, 0]), Err(DriverError::InvalidInput(_))));
    }

    #[test]
    fn test_header_map_rejects_bad_names() {
        let pairs = vec![("bad name".to_string(), "x".to_string())];
        assert!(matches!(header_map(&pairs), Err(DriverError::InvalidHeader(_))));
    }

    #[tokio::test]
    async fn test_run_indexes_body() {
        let store = MemoryStore::new();
        let result = driver(&store).run(transaction("http://b/y", &[], b"release bytes")).await.unwrap();

        let expected = hex_sha256(b"release bytes");
        assert_eq!(result.state, "finished");
        assert_eq!(result.digest.as_deref(), Some(expected.as_str()));
        assert_eq!(result.bytes, 13);
        assert!(result.indexed);
        assert_eq!(result.outcome, "no_location");
    }

    #[tokio::test]
    async fn test_run_rewrites_redirect() {
        let store = MemoryStore::new();
        let driver = driver(&store);
        let body = b"release bytes";
        driver.run(transaction("http://b/y", &[], body)).await.unwrap();
        store.insert(CacheKey::from_url("http://b/y").unwrap(), &body[..]).await;

        let digest: [u8; 32] = Sha256::digest(body).into();
        let header = encode_sha256(&digest);
        let redirect = transaction("http://a/", &[("location", "http://a/x"), ("digest", &header)], b"");
        let result = driver.run(redirect).await.unwrap();

        assert!(result.rewritten);
        assert_eq!(result.outcome, "rewritten_digest_index");
        assert!(result.headers.contains(&("location".to_string(), "http://b/y".to_string())));
        assert_eq!(result.digest, Some(hex::encode(Sha256::digest(b""))));
    }

    #[tokio::test]
    async fn test_handle_line_reports_errors() {
        let driver = driver(&MemoryStore::new());
        let reply: serde_json::Value = serde_json::from_str(&driver.handle_line("{not json").await).unwrap();
        assert_eq!(reply["error"]["code"], "INVALID_INPUT");

        let line = r#"{"request_url":"http://a/x","body_base64":"!!"}"#;
        let reply: serde_json::Value = serde_json::from_str(&driver.handle_line(line).await).unwrap();
        assert_eq!(reply["error"]["code"], "INVALID_BODY");
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not representable"))
        }
    }

    #[test]
    fn test_unencodable_reply_is_still_an_error_object() {
        let line = encode_reply(&Unencodable);
        let reply: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(reply["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_serve_answers_each_line() {
        let driver = driver(&MemoryStore::new());
        let input = concat!(
            r#"{"request_url":"http://a/x","headers":[["location","http://m/x"]],"body_base64":"aGVsbG8="}"#,
            "\n\n",
            r#"{"request_url":"http://a/y"}"#,
            "\n"
        );
        let mut output = Vec::new();
        let handled = driver.serve(input.as_bytes(), &mut output).await.unwrap();
        assert_eq!(handled, 2);

        let lines: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["outcome"], "no_candidates");
        assert_eq!(lines[0]["bytes"], 5);
        assert_eq!(lines[1]["state"], "finished");
        assert_eq!(lines[1]["digest"], hex::encode(Sha256::digest(b"")));
    }

    fn hex_sha256(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}
