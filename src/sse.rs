//! Server-Sent Events (SSE) framing utilities.
//!
//! Frames are separated by a blank line. Inside a frame only `data:` lines
//! carry payload; everything else (comments, `event:`/`id:` fields,
//! keep-alives) is skipped.
//!
//! SSE format:
//! ```text
//! data: {"type": "chunk", "content": "hel"}
//!
//! : keep-alive
//!
//! data: {"type": "done"}
//! ```

use itertools::Itertools;

/// Find the first blank line in `text`.
///
/// Line terminators may be `\n` or `\r\n`. Returns the byte range of the
/// delimiter: `start` is where the frame ends and `end` is where the next
/// frame begins.
fn find_delimiter(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(rel) = bytes[search_from..].iter().position(|&b| b == b'\n') {
        let pos = search_from + rel;
        let next = &bytes[pos + 1..];
        if next.starts_with(b"\n") {
            return Some((pos, pos + 2));
        }
        if next.starts_with(b"\r\n") {
            return Some((pos, pos + 3));
        }
        search_from = pos + 1;
    }

    None
}

/// Split every complete frame off the front of `buffer`.
///
/// Frames are returned in arrival order without their delimiter. Text after
/// the last delimiter stays in `buffer`; it is the beginning of a frame that
/// has not fully arrived yet.
///
/// # Example
/// ```
/// use qastream::sse::drain_frames;
///
/// let mut buffer = String::from("data: 1\n\ndata: 2\n\ndata: 3");
/// assert_eq!(drain_frames(&mut buffer), vec!["data: 1", "data: 2"]);
/// assert_eq!(buffer, "data: 3");
/// ```
pub fn drain_frames(buffer: &mut String) -> Vec<String> {
    let mut frames = Vec::new();
    let mut consumed = 0;

    while let Some((start, end)) = find_delimiter(&buffer[consumed..]) {
        frames.push(buffer[consumed..consumed + start].to_string());
        consumed += end;
    }

    if consumed > 0 {
        buffer.drain(..consumed);
    }

    frames
}

/// Parse an SSE line to extract the data portion.
///
/// Accepts `data:` with or without the single optional space. A trailing
/// carriage return is removed.
///
/// # Example
/// ```
/// use qastream::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = ": keep-alive";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Collect the payload of a frame.
///
/// Multiple `data:` lines are joined with `\n`. Returns `None` when the frame
/// has no `data:` line at all.
///
/// # Example
/// ```
/// use qastream::sse::frame_payload;
///
/// assert_eq!(frame_payload("event: x\ndata: {}"), Some("{}".to_string()));
/// assert_eq!(frame_payload(": ping"), None);
/// ```
pub fn frame_payload(frame: &str) -> Option<String> {
    let mut data_lines = frame.split('\n').filter_map(parse_sse_line).peekable();
    data_lines.peek()?;
    Some(data_lines.join("\n"))
}
