//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module converts the raw byte stream of a streamed `/chat/completions` response into a
//! stream of [`Fragment`]s.  Events are delimited by a blank line; only `data:` lines carry a
//! payload, and `data: [DONE]` terminates the stream.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::types::{ChatCompletionChunk, Fragment};
use crate::{Error, Result};

const DONE_MARKER: &str = "[DONE]";

/// Process a stream of bytes into a stream of fragments.
///
/// Unparseable payloads surface as [`Error::MalformedFragment`] items and the stream continues
/// after them.  Transport failures and error payloads surface as their classified error and end
/// the stream.  With an `idle_timeout`, a body that goes quiet for that long ends in
/// [`Error::Timeout`]; a body that keeps delivering data is never cut off.
pub fn process_sse<S>(
    byte_stream: S,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<Fragment>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    let stream = Box::pin(byte_stream);
    let buffer: Vec<u8> = Vec::new();
    let finished = false;

    stream::unfold(
        (stream, buffer, finished),
        move |(mut stream, mut buffer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                // Drain every complete event already buffered before reading more.
                while let Some(event) = extract_event(&mut buffer) {
                    match parse_event(&event) {
                        Parsed::Skip => continue,
                        Parsed::Done => return None,
                        Parsed::Item(item) => return Some((item, (stream, buffer, false))),
                    }
                }

                let next = match idle_timeout {
                    Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            let err = Error::timeout(
                                format!(
                                    "no data from the service for {:.1}s",
                                    limit.as_secs_f64()
                                ),
                                Some(limit.as_secs_f64()),
                            );
                            return Some((Err(err), (stream, buffer, true)));
                        }
                    },
                    None => stream.next().await,
                };
                match next {
                    Some(Ok(bytes)) => {
                        buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer, true)));
                    }
                    None => {
                        // A final event may lack its trailing blank line.
                        if buffer.iter().all(u8::is_ascii_whitespace) {
                            return None;
                        }
                        let event = std::mem::take(&mut buffer);
                        return match parse_event(&event) {
                            Parsed::Item(item) => Some((item, (stream, buffer, true))),
                            Parsed::Skip | Parsed::Done => None,
                        };
                    }
                }
            }
        },
    )
}

enum Parsed {
    Skip,
    Done,
    Item(Result<Fragment>),
}

/// Remove the first complete event from the buffer, without its delimiter.
fn extract_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let mut event: Vec<u8> = buffer.drain(..end + 2).collect();
    event.truncate(end);
    Some(event)
}

fn parse_event(event: &[u8]) -> Parsed {
    let text = match std::str::from_utf8(event) {
        Ok(text) => text,
        Err(e) => {
            return Parsed::Item(Err(Error::malformed_fragment(
                format!("payload is not UTF-8: {e}"),
                String::from_utf8_lossy(event),
            )));
        }
    };

    let mut data: Option<String> = None;
    for line in text.lines() {
        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.strip_prefix(' ').unwrap_or(payload);
            match &mut data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(payload);
                }
                None => data = Some(payload.to_string()),
            }
        }
    }

    match data {
        // Comments, keep-alives and bare `event:` lines carry nothing.
        None => Parsed::Skip,
        Some(payload) if payload.trim() == DONE_MARKER => Parsed::Done,
        Some(payload) if payload.trim().is_empty() => Parsed::Skip,
        Some(payload) => Parsed::Item(parse_payload(&payload)),
    }
}

fn parse_payload(payload: &str) -> Result<Fragment> {
    let value: Value = serde_json::from_str(payload).map_err(|e| {
        Error::malformed_fragment(format!("payload is not JSON: {e}"), payload)
    })?;

    if let Some(error) = value.get("error") {
        return Err(stream_error(error));
    }

    serde_json::from_value::<ChatCompletionChunk>(value)
        .map(Fragment::from)
        .map_err(|e| Error::malformed_fragment(format!("unrecognized chunk: {e}"), payload))
}

/// Map an in-band error payload to the matching error variant.
fn stream_error(error: &Value) -> Error {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| error.as_str().map(str::to_owned))
        .unwrap_or_else(|| error.to_string());
    let tags: Vec<&str> = ["type", "code"]
        .iter()
        .filter_map(|key| error.get(*key).and_then(Value::as_str))
        .collect();
    let tagged = |names: &[&str]| tags.iter().any(|tag| names.contains(tag));

    if tagged(&["authentication_error", "invalid_api_key"]) {
        Error::authentication(message)
    } else if tagged(&["permission_error", "permission_denied"]) {
        Error::permission(message)
    } else if tagged(&["rate_limit_error", "rate_limit_exceeded", "insufficient_quota"]) {
        Error::rate_limit(message, None)
    } else {
        let error_type = tags.first().copied().unwrap_or("stream_error");
        Error::api(500, Some(error_type.to_string()), message, None)
    }
}
