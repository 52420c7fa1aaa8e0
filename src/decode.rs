//! Incremental character decoding for streamed response bodies.
//!
//! Network reads split the body at arbitrary byte offsets, so a multi-byte
//! UTF-8 character can arrive in two (or more) pieces. [`ByteAccumulator`]
//! decodes everything it can, keeps the incomplete tail bytes aside, and
//! finishes the character when the next chunk arrives.

use crate::client::StreamError;

const UTF8_BOM: &str = "\u{feff}";

/// Returns `true` if the declared charset label is one we can decode.
///
/// An absent label defaults to UTF-8, which is what `text/event-stream`
/// mandates anyway.
///
/// # Example
/// ```
/// use qastream::decode::is_supported_charset;
///
/// assert!(is_supported_charset(None));
/// assert!(is_supported_charset(Some("UTF-8")));
/// assert!(!is_supported_charset(Some("latin1")));
/// ```
pub fn is_supported_charset(label: Option<&str>) -> bool {
    match label {
        None => true,
        Some(label) => {
            let label = label.trim().trim_matches('"');
            label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8")
        }
    }
}

/// Reject any declared charset other than UTF-8.
pub fn check_charset(label: Option<&str>) -> Result<(), StreamError> {
    if is_supported_charset(label) {
        Ok(())
    } else {
        Err(StreamError::Decode(format!(
            "unsupported charset: {}",
            label.unwrap_or_default()
        )))
    }
}

/// Growing text buffer fed with raw bytes.
#[derive(Debug, Default)]
pub struct ByteAccumulator {
    /// Decoded text not yet consumed by the frame splitter
    text: String,
    /// Trailing bytes of an incomplete UTF-8 sequence (at most 3)
    pending: Vec<u8>,
    /// Total bytes accepted so far, used for error offsets
    offset: usize,
    /// Whether the stream start (and a possible BOM) has been seen
    started: bool,
}

impl ByteAccumulator {
    /// Create an empty accumulator for a UTF-8 stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes` and append the result to the buffer.
    ///
    /// Incomplete trailing sequences are held back until more bytes arrive.
    /// A sequence that can never become valid is a decode error; the text
    /// decoded before it is still appended, so frames completed by this
    /// delivery can be drained before the error is reported.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        if bytes.is_empty() {
            return Ok(());
        }

        let mut input = std::mem::take(&mut self.pending);
        let held = input.len();
        input.extend_from_slice(bytes);

        let (valid_up_to, error) = match std::str::from_utf8(&input) {
            Ok(_) => (input.len(), None),
            Err(e) if e.error_len().is_none() => (e.valid_up_to(), None),
            Err(e) => {
                let at = self.offset - held + e.valid_up_to();
                let error = StreamError::Decode(format!(
                    "invalid UTF-8 sequence of {} byte(s) at offset {}",
                    e.error_len().unwrap_or(1),
                    at
                ));
                (e.valid_up_to(), Some(error))
            }
        };

        let rest = input.split_off(valid_up_to);
        let decoded = String::from_utf8(input).map_err(|e| StreamError::Decode(e.to_string()))?;
        self.push_text(&decoded);
        self.offset += bytes.len();

        match error {
            Some(e) => Err(e),
            None => {
                self.pending = rest;
                Ok(())
            }
        }
    }

    fn push_text(&mut self, mut valid: &str) {
        if !self.started && !valid.is_empty() {
            self.started = true;
            valid = valid.strip_prefix(UTF8_BOM).unwrap_or(valid);
        }
        self.text.push_str(valid);
    }

    /// Buffered text that has not been consumed yet.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Mutable access to the buffered text, used by the frame splitter to
    /// remove complete frames in place.
    pub fn text_mut(&mut self) -> &mut String {
        &mut self.text
    }

    /// Number of bytes held back as an incomplete character.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Total bytes accepted since creation.
    pub fn bytes_seen(&self) -> usize {
        self.offset
    }

    /// Returns `true` if neither text nor partial bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pending.is_empty()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.text.clear();
        self.pending.clear();
    }
}
