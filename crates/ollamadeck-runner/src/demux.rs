//! Incremental byte-stream to logical-line demuxing (non-UTF8-safe).
//!
//! Subprocess output arrives in arbitrary-sized chunks that can split a
//! multi-byte UTF-8 sequence, and progress output uses `\r` overwrites and
//! ANSI escapes. `BufReader::lines()` handles none of that, so this module
//! does its own decoding:
//!
//! - bytes are decoded incrementally; a sequence straddling a chunk
//!   boundary is held back until completed, invalid sequences become
//!   U+FFFD instead of an error
//! - a line is complete at the first `\r` OR `\n`, whichever comes first
//! - ANSI CSI / OSC / DCS / APC / PM sequences are stripped from each line
//! - emitted lines are trimmed; empty lines are suppressed

use std::sync::LazyLock;

use regex::Regex;

// CSI (ESC [ ... letter), OSC terminated by BEL, and DCS/SOS/PM/APC
// terminated by ST (ESC \).
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]|\x1b\][^\x07]*\x07|\x1b[PX^_].*?\x1b\\")
        .expect("ANSI pattern is valid")
});

/// Remove terminal control sequences from a line.
#[must_use]
pub fn strip_ansi(line: &str) -> String {
    ANSI_ESCAPE.replace_all(line, "").into_owned()
}

/// Stateful chunk-by-chunk line splitter.
///
/// Feed raw chunks with [`feed`](Self::feed); call
/// [`finish`](Self::finish) exactly once at end-of-stream to flush any
/// buffered trailing content.
#[derive(Debug, Default)]
pub struct LineDemuxer {
    /// Decoded text not yet terminated by a separator.
    text: String,
    /// Raw bytes of an incomplete UTF-8 sequence from the previous chunk.
    pending: Vec<u8>,
}

impl LineDemuxer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk, returning every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.text.find(['\r', '\n']) {
            let raw = self.text[..pos].to_string();
            self.text.drain(..=pos);
            if let Some(line) = clean_line(&raw) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush the final unterminated line, if any. The demuxer is spent
    /// afterwards.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            // Incomplete trailing sequence decodes to U+FFFD.
            let rest = String::from_utf8_lossy(&self.pending).into_owned();
            self.text.push_str(&rest);
            self.pending.clear();
        }
        let rest = std::mem::take(&mut self.text);
        clean_line(&rest)
    }

    /// Append a chunk to `text`, holding back an incomplete trailing
    /// UTF-8 sequence and replacing invalid bytes with U+FFFD.
    fn decode(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let mut bytes = std::mem::take(&mut self.pending);
        let mut start = 0;
        loop {
            match std::str::from_utf8(&bytes[start..]) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    // Safe: from_utf8 just validated this prefix.
                    self.text
                        .push_str(std::str::from_utf8(&bytes[start..start + valid_up_to]).unwrap_or(""));
                    start += valid_up_to;
                    match err.error_len() {
                        Some(invalid) => {
                            self.text.push('\u{FFFD}');
                            start += invalid;
                        }
                        None => {
                            // Possibly-valid sequence cut off by the chunk
                            // boundary; keep it for the next feed.
                            bytes.drain(..start);
                            self.pending = bytes;
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn clean_line(raw: &str) -> Option<String> {
    let stripped = strip_ansi(raw.trim());
    let cleaned = stripped.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
