//! File type detection for captured streams.
//!
//! The extension is taken from the `Content-Type` header when it is usable,
//! otherwise from the signature of the first bytes of the body. Sniffing never
//! loses data: the bytes read for it are replayed ahead of the rest of the
//! body by [`SniffedBody`].

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use mime_guess::Mime;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tracing::debug;

use super::constants::SNIFF_PREFIX_LEN;

/// Where a detected extension came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    /// Mapped from the `Content-Type` header.
    ContentType,
    /// Classified from the leading body bytes.
    Sniffed,
    /// Neither path produced an extension.
    Undetected,
}

impl DetectionSource {
    /// Returns the stable label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentType => "content-type",
            Self::Sniffed => "sniffed",
            Self::Undetected => "undetected",
        }
    }
}

/// Result of extension detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Extension without a leading dot, `None` when nothing matched.
    pub extension: Option<&'static str>,
    /// Which path produced the extension.
    pub source: DetectionSource,
}

/// A body stream with previously read chunks replayed in front of it.
#[derive(Debug)]
pub struct SniffedBody<S> {
    replay: VecDeque<Bytes>,
    inner: S,
    exhausted: bool,
}

impl<S> SniffedBody<S> {
    fn new(replay: VecDeque<Bytes>, inner: S, exhausted: bool) -> Self {
        Self {
            replay,
            inner,
            exhausted,
        }
    }

    /// Number of bytes waiting to be replayed.
    #[must_use]
    pub fn replay_len(&self) -> usize {
        self.replay.iter().map(Bytes::len).sum()
    }
}

impl<S, E> Stream for SniffedBody<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(chunk) = self.replay.pop_front() {
            return Poll::Ready(Some(Ok(chunk)));
        }
        // The inner stream is not guaranteed to be fused.
        if self.exhausted {
            return Poll::Ready(None);
        }
        let polled = self.inner.poll_next_unpin(cx);
        if matches!(polled, Poll::Ready(None)) {
            self.exhausted = true;
        }
        polled
    }
}

/// Detects the extension of a response and returns the body to copy from.
///
/// The returned body yields every byte of `body`, including any consumed
/// while sniffing.
///
/// # Errors
///
/// Returns the body's own error if it fails while the sniffing prefix is read.
pub async fn detect_extension<S, E>(
    headers: &HeaderMap,
    mut body: S,
    preferred: &[String],
) -> Result<(Detection, SniffedBody<S>), E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if let Some(extension) =
        content_type.and_then(|value| extension_from_content_type(value, preferred))
    {
        let detection = Detection {
            extension: Some(extension),
            source: DetectionSource::ContentType,
        };
        return Ok((detection, SniffedBody::new(VecDeque::new(), body, false)));
    }
    if let Some(value) = content_type {
        debug!(content_type = %value, "content type unusable, sniffing body");
    }

    let mut prefix = VecDeque::new();
    let mut buffered = 0;
    let mut exhausted = false;
    while buffered < SNIFF_PREFIX_LEN {
        match body.next().await {
            Some(Ok(chunk)) => {
                buffered += chunk.len();
                if !chunk.is_empty() {
                    prefix.push_back(chunk);
                }
            }
            Some(Err(error)) => return Err(error),
            None => {
                exhausted = true;
                break;
            }
        }
    }

    let sample: Vec<u8> = prefix
        .iter()
        .flat_map(|chunk| chunk.iter().copied())
        .take(SNIFF_PREFIX_LEN)
        .collect();
    let extension = sniff_extension(&sample);
    let source = if extension.is_some() {
        DetectionSource::Sniffed
    } else {
        DetectionSource::Undetected
    };
    debug!(sniffed_bytes = sample.len(), ?extension, "sniffed body prefix");

    Ok((
        Detection { extension, source },
        SniffedBody::new(prefix, body, exhausted),
    ))
}

/// Maps a `Content-Type` value to an extension from the system table.
///
/// When the type has several extensions the first entry of `preferred` found
/// among them wins, otherwise the table's first entry. Returns `None` for an
/// unparsable value or an unknown type.
#[must_use]
pub fn extension_from_content_type(content_type: &str, preferred: &[String]) -> Option<&'static str> {
    let mime: Mime = content_type.trim().parse().ok()?;
    let essence = mime.essence_str().to_ascii_lowercase();
    let candidates = mime_guess::get_mime_extensions_str(&essence)?;

    preferred
        .iter()
        .map(|wanted| wanted.trim_start_matches('.'))
        .find_map(|wanted| {
            candidates
                .iter()
                .copied()
                .find(|candidate| candidate.eq_ignore_ascii_case(wanted))
        })
        .or_else(|| candidates.first().copied())
}

/// Classifies a body prefix by its byte signature.
#[must_use]
pub fn sniff_extension(sample: &[u8]) -> Option<&'static str> {
    match sample {
        [] => None,
        [b'I', b'D', b'3', ..] => Some("mp3"),
        [0xFF, second, ..] if second & 0xF6 == 0xF0 => Some("aac"),
        [0xFF, second, ..] if second & 0xE0 == 0xE0 && second & 0x06 != 0 => Some("mp3"),
        [b'O', b'g', b'g', b'S', ..] => {
            if sample.get(28..36) == Some(b"OpusHead".as_slice()) {
                Some("opus")
            } else {
                Some("ogg")
            }
        }
        [b'f', b'L', b'a', b'C', ..] => Some("flac"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some("wav"),
        [b'F', b'O', b'R', b'M', _, _, _, _, b'A', b'I', b'F', b'F' | b'C', ..] => Some("aiff"),
        [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..] => {
            if brand.starts_with(b"M4A ") || brand.starts_with(b"M4B ") {
                Some("m4a")
            } else {
                Some("mp4")
            }
        }
        [0x1A, 0x45, 0xDF, 0xA3, ..] => {
            if sample.windows(4).any(|w| w == b"webm") {
                Some("webm")
            } else {
                Some("mkv")
            }
        }
        _ if sample.starts_with(b"#EXTM3U") => Some("m3u"),
        _ if looks_like_html(sample) => Some("html"),
        _ if looks_like_text(sample) => Some("txt"),
        _ => None,
    }
}

fn looks_like_html(sample: &[u8]) -> bool {
    let start = sample
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(sample.len());
    let head: Vec<u8> = sample[start..]
        .iter()
        .take(14)
        .map(u8::to_ascii_lowercase)
        .collect();
    head.starts_with(b"<!doctype html") || head.starts_with(b"<html")
}

fn looks_like_text(sample: &[u8]) -> bool {
    let text = match std::str::from_utf8(sample) {
        Ok(text) => text,
        // A multi-byte character cut off by the prefix boundary is still text.
        Err(error) if error.error_len().is_none() => {
            std::str::from_utf8(&sample[..error.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return false,
    };
    !text.is_empty()
        && text
            .chars()
            .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}
