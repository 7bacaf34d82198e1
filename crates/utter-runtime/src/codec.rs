//! Wire protocol envelopes and the incremental line decoder.
//!
//! The worker speaks JSON-RPC 2.0, one object per line, over its standard
//! streams. There is no other framing: a request is a single
//! newline-terminated line on stdin, and every stdout line is either a
//! response (`result` or `error` with a matching `id`) or an unsolicited
//! notification (`method`, no meaningful `id`).

use serde_json::Value;

/// One outbound request line.
#[derive(Debug, serde::Serialize)]
pub struct RequestEnvelope<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RequestEnvelope<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }

    /// Serialize to one newline-terminated line ready for the worker's
    /// stdin.
    #[must_use]
    pub fn to_line(&self) -> Vec<u8> {
        // Serialization of Value + primitives cannot fail.
        let mut line = serde_json::to_vec(self).unwrap_or_default();
        line.push(b'\n');
        line
    }
}

/// Error object the worker attaches to a failed call.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// A classified inbound line.
#[derive(Debug)]
pub enum Inbound {
    /// Answer to one outstanding request.
    Response {
        id: u64,
        outcome: Result<Value, RpcError>,
    },
    /// Unsolicited notification; `"ready"` is the one that matters.
    Notification { method: String },
}

/// Raw shape of an inbound line before classification.
#[derive(Debug, serde::Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// Incremental newline-delimited decoder over the worker's stdout.
///
/// Fed arbitrary byte chunks as they arrive; emits complete envelopes.
/// Invariant: `residual` holds at most one partial line, which is never
/// parsed on its own and never dropped; it is prefixed to the next chunk.
#[derive(Debug, Default)]
pub struct LineDecoder {
    residual: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of stdout bytes, returning every envelope completed
    /// by it. Malformed lines are logged and dropped, never fatal.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Inbound> {
        self.residual.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.residual.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.residual.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if let Some(inbound) = classify(line) {
                out.push(inbound);
            }
        }
        out
    }

    /// Bytes currently held back waiting for their newline.
    #[must_use]
    pub fn residual_len(&self) -> usize {
        self.residual.len()
    }
}

fn classify(line: &[u8]) -> Option<Inbound> {
    let raw: RawEnvelope = match serde_json::from_slice(line) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(
                error = %err,
                line = %String::from_utf8_lossy(line),
                "dropping malformed worker line"
            );
            return None;
        }
    };

    // A response must carry a usable id; everything else with a method is
    // a notification.
    let id = raw.id.as_ref().and_then(parse_id);
    match (id, raw.method) {
        (Some(id), _) => {
            let outcome = match raw.error {
                Some(err) => Err(err),
                None => Ok(raw.result.unwrap_or(Value::Null)),
            };
            Some(Inbound::Response { id, outcome })
        }
        (None, Some(method)) => Some(Inbound::Notification { method }),
        (None, None) => {
            tracing::warn!(
                line = %String::from_utf8_lossy(line),
                "dropping worker line with neither id nor method"
            );
            None
        }
    }
}

/// Accept the integer ids this client issues, whether echoed back as a
/// JSON number or a decimal string.
fn parse_id(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
