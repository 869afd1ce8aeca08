//! Audio codec boundary
//!
//! The renderer only needs one operation from the neural codec: turn three
//! batch-of-one codebook streams into a mono float waveform. [`Codec`] is
//! that seam; [`SnacCodec`] implements it with candle's SNAC 24kHz model,
//! and tests substitute deterministic stubs.

mod snac;

use anyhow::Result;
use std::sync::Arc;

use crate::render::CodebookStreams;

pub use snac::{SnacCodec, SNAC_CONFIG_REPO, SNAC_WEIGHTS_FILE, SNAC_WEIGHTS_REPO};

/// Decode operation of a hierarchical audio codec.
///
/// Implementations must not mutate shared state in `decode`, so one codec
/// can serve several independent streams. Failures are reported as errors
/// and are fatal to the render call that triggered them.
pub trait Codec: Send + Sync {
    /// Decode streams of lengths `N`, `2N`, `4N` into waveform samples.
    fn decode(&self, streams: &CodebookStreams) -> Result<Vec<f32>>;
}

impl<C: Codec + ?Sized> Codec for &C {
    fn decode(&self, streams: &CodebookStreams) -> Result<Vec<f32>> {
        (**self).decode(streams)
    }
}

impl<C: Codec + ?Sized> Codec for Arc<C> {
    fn decode(&self, streams: &CodebookStreams) -> Result<Vec<f32>> {
        (**self).decode(streams)
    }
}

impl<C: Codec + ?Sized> Codec for Box<C> {
    fn decode(&self, streams: &CodebookStreams) -> Result<Vec<f32>> {
        (**self).decode(streams)
    }
}
