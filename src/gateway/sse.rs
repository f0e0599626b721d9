//! Decoder for the `data: <json>` line format used by streaming completions.

/// One decoded `data:` record.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    /// Incremental text (may be empty when the record carries no content)
    Delta(String),
    /// The `[DONE]` sentinel
    Done,
    /// A `data:` record whose payload is not valid JSON
    Malformed,
}

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Splits a byte stream into complete lines, carrying partial lines (and
/// partial UTF-8 sequences) over to the next chunk.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk; returns every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            let line = std::mem::replace(&mut self.pending, rest);
            lines.push(decode_line(&line[..pos]));
        }
        lines
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(decode_line(&line))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim_end_matches('\r').to_string()
}

/// Interpret a single line. Lines that are not `data:` records (blank
/// separators, `event:`, comments) yield `None`.
pub fn parse_record(line: &str) -> Option<StreamRecord> {
    let data = line.strip_prefix(DATA_PREFIX)?.trim();
    if data == DONE_SENTINEL {
        return Some(StreamRecord::Done);
    }

    let json: serde_json::Value = match serde_json::from_str(data) {
        Ok(j) => j,
        Err(e) => {
            tracing::debug!(error = %e, "skipping undecodable stream record");
            return Some(StreamRecord::Malformed);
        }
    };

    let delta = json["choices"][0]["delta"]["content"]
        .as_str()
        .unwrap_or_default();
    Some(StreamRecord::Delta(delta.to_string()))
}
