// src/application/dto/parser.rs
// Decoders for response bodies and realtime frames

use serde::de::DeserializeOwned;

use super::RealtimeFrame;
use crate::domain::errors::{SourceError, SourceResult};
use crate::domain::model::RealtimeStats;

/// Longest body excerpt quoted in a parse failure
const BODY_EXCERPT_CHARS: usize = 200;

/// Decode a JSON body into `T`, reporting any mismatch as a parse failure
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> SourceResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| SourceError::ParseFailure(format!("{} (body: {})", e, excerpt(body))))
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}... [{} bytes]", &text[..cut], body.len()),
        None => text.into_owned(),
    }
}

/// Decode one realtime frame
pub fn parse_realtime_frame(frame: &[u8]) -> SourceResult<RealtimeStats> {
    let text = std::str::from_utf8(frame)
        .map_err(|e| SourceError::ParseFailure(format!("frame is not UTF-8: {}", e)))?;
    let frame: RealtimeFrame = serde_json::from_str(text)?;
    frame.try_into()
}
