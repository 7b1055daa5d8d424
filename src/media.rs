//! Range-aware media delivery.
//!
//! Files are streamed in bounded chunks straight from storage. Partial
//! content is only produced for video assets; everything else is served
//! whole.

use std::io::{Seek, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures_util::Stream;
use tokio::io::{AsyncReadExt, Take};
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use crate::assets::{AssetKind, mime_type, validate_filename};
use crate::error::Result;
use crate::storage::AssetStorage;

/// Default transfer chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// A requested byte range, as written in a `Range: bytes=start-end` header.
///
/// Either bound may be missing: a missing start means 0, a missing end means
/// the last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ByteRange {
    pub const fn new(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Parse a `Range` header value. Only the first range of a list is used;
    /// anything unparseable yields `None` and the full file is served.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix("bytes=")?;
        let first = spec.split(',').next()?.trim();
        let (start, end) = first.split_once('-')?;
        let parse_bound = |s: &str| -> Option<Option<u64>> {
            let s = s.trim();
            if s.is_empty() {
                Some(None)
            } else {
                s.parse().ok().map(Some)
            }
        };
        Some(Self {
            start: parse_bound(start)?,
            end: parse_bound(end)?,
        })
    }
}

/// Whether the whole file or a slice of it goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Full,
    Partial { start: u64, end: u64 },
}

/// Everything a transport needs to write response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlan {
    pub filename: String,
    pub mime: &'static str,
    pub kind: AssetKind,
    pub size: u64,
    pub delivery: Delivery,
}

impl MediaPlan {
    /// Decide what to send for `filename` of `size` bytes.
    ///
    /// Ranges on video are clamped into `[0, size-1]`; an end before the
    /// start is raised to the start. Ranges on other types, or on empty
    /// files, fall back to a full transfer.
    pub fn new(filename: &str, size: u64, range: Option<ByteRange>) -> Self {
        let kind = AssetKind::from_filename(filename);
        let delivery = match range {
            Some(range) if kind.is_video() && size > 0 => {
                let last = size - 1;
                let start = range.start.unwrap_or(0).min(last);
                let end = range.end.unwrap_or(last).min(last).max(start);
                Delivery::Partial { start, end }
            }
            _ => Delivery::Full,
        };
        Self {
            filename: filename.to_string(),
            mime: mime_type(filename),
            kind,
            size,
            delivery,
        }
    }

    pub const fn is_partial(&self) -> bool {
        matches!(self.delivery, Delivery::Partial { .. })
    }

    /// Offset of the first byte sent.
    pub const fn start(&self) -> u64 {
        match self.delivery {
            Delivery::Full => 0,
            Delivery::Partial { start, .. } => start,
        }
    }

    /// Number of bytes in the body.
    pub const fn content_length(&self) -> u64 {
        match self.delivery {
            Delivery::Full => self.size,
            Delivery::Partial { start, end } => end - start + 1,
        }
    }

    /// `Content-Range` value for partial responses, e.g. `bytes 100-199/1000`.
    pub fn content_range(&self) -> Option<String> {
        match self.delivery {
            Delivery::Full => None,
            Delivery::Partial { start, end } => Some(format!("bytes {start}-{end}/{}", self.size)),
        }
    }

    /// Video responses advertise range support.
    pub const fn accepts_ranges(&self) -> bool {
        self.kind.is_video()
    }
}

/// Body of a media response, read from disk one chunk at a time.
///
/// Dropping it before the last byte means the client went away; that is
/// logged at debug level and nothing else.
pub struct AssetStream {
    inner: ReaderStream<Take<tokio::fs::File>>,
    filename: String,
    remaining: u64,
}

impl AssetStream {
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Stream for AssetStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &polled {
            this.remaining = this.remaining.saturating_sub(chunk.len() as u64);
        }
        polled
    }
}

impl Drop for AssetStream {
    fn drop(&mut self) {
        if self.remaining > 0 {
            debug!(
                filename = %self.filename,
                remaining = self.remaining,
                "Client disconnected during asset transfer"
            );
        } else {
            trace!(filename = %self.filename, "Asset transfer complete");
        }
    }
}

/// A planned response plus its body.
pub struct MediaResponse {
    pub plan: MediaPlan,
    pub body: AssetStream,
}

/// Serves asset bytes from storage.
#[derive(Clone)]
pub struct MediaDelivery {
    storage: Arc<dyn AssetStorage>,
    chunk_size: usize,
}

impl MediaDelivery {
    pub fn new(storage: Arc<dyn AssetStorage>, chunk_size: usize) -> Self {
        Self {
            storage,
            chunk_size: chunk_size.max(1),
        }
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Open `filename` and position it for the requested range.
    pub fn serve(&self, filename: &str, range: Option<ByteRange>) -> Result<MediaResponse> {
        validate_filename(filename)?;
        let (mut file, size) = self.storage.open(filename)?;
        let plan = MediaPlan::new(filename, size, range);

        if plan.start() > 0 {
            file.seek(SeekFrom::Start(plan.start()))?;
        }
        debug!(
            filename,
            size,
            start = plan.start(),
            length = plan.content_length(),
            partial = plan.is_partial(),
            "Serving asset"
        );

        let reader = tokio::fs::File::from_std(file).take(plan.content_length());
        let body = AssetStream {
            inner: ReaderStream::with_capacity(reader, self.chunk_size),
            filename: filename.to_string(),
            remaining: plan.content_length(),
        };
        Ok(MediaResponse { plan, body })
    }
}
