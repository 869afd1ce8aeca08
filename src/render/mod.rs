//! Windowed PCM rendering
//!
//! One render call takes the symbols a caller has buffered, keeps the whole
//! frames, splits them into codebook streams, checks every symbol is in
//! range, runs the codec, and keeps a fixed window of the waveform:
//!
//! ```text
//! symbols ─▶ demux ─▶ validate ─┬─▶ Rejected
//!                               └─▶ codec.decode ─▶ window ─▶ quantize ─▶ Ready(bytes)
//! ```
//!
//! Nothing survives between calls. The window skips the first samples of the
//! decoded waveform, which carry the codec's edge artifacts on short inputs.

mod frame;

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::codec::Codec;
use crate::{PCM_SCALE, SYMBOL_MAX, WINDOW_END, WINDOW_START};

pub use frame::{demux, Codebook, CodebookStreams, Frames, OutOfRange, FRAME_LAYOUT};

/// Renderer settings. Defaults match the SNAC 24kHz / Orpheus setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// First waveform sample emitted
    #[serde(default = "default_window_start")]
    pub window_start: usize,
    /// One past the last waveform sample emitted
    #[serde(default = "default_window_end")]
    pub window_end: usize,
    /// Largest accepted symbol (inclusive)
    #[serde(default = "default_symbol_max")]
    pub symbol_max: u32,
    /// Float to i16 scale
    #[serde(default = "default_scale")]
    pub scale: f32,
}

fn default_window_start() -> usize {
    WINDOW_START
}
fn default_window_end() -> usize {
    WINDOW_END
}
fn default_symbol_max() -> u32 {
    SYMBOL_MAX
}
fn default_scale() -> f32 {
    PCM_SCALE
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_start: default_window_start(),
            window_end: default_window_end(),
            symbol_max: default_symbol_max(),
            scale: default_scale(),
        }
    }
}

impl RenderConfig {
    /// Load configuration from a local JSON file. Missing fields take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read render config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse render config from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_end <= self.window_start {
            anyhow::bail!(
                "window_end ({}) must be greater than window_start ({})",
                self.window_end,
                self.window_start
            );
        }
        if !self.scale.is_finite() || self.scale <= 0.0 || self.scale > 32767.0 {
            anyhow::bail!("scale must be in (0, 32767], got {}", self.scale);
        }
        Ok(())
    }

    /// Samples per emitted chunk.
    pub fn window_len(&self) -> usize {
        self.window_end - self.window_start
    }

    /// Bytes per emitted chunk.
    pub fn chunk_bytes(&self) -> usize {
        self.window_len() * 2
    }

    /// Check the window fits the waveform a codec produces for
    /// `num_frames` frames at `samples_per_frame` samples each.
    pub fn check_codec_output(&self, samples_per_frame: usize, num_frames: usize) -> Result<()> {
        let available = samples_per_frame * num_frames;
        if self.window_end > available {
            anyhow::bail!(
                "window [{}, {}) exceeds the {} samples decoded from {} frames",
                self.window_start,
                self.window_end,
                available,
                num_frames
            );
        }
        Ok(())
    }
}

/// Result of one render call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Fewer than one whole frame buffered; the codec was not invoked.
    Pending,
    /// A symbol was out of range; the whole chunk is dropped.
    Rejected(OutOfRange),
    /// Little-endian 16-bit PCM for the configured window.
    Ready(Vec<u8>),
}

impl RenderOutcome {
    /// The PCM bytes, if the render produced any.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            RenderOutcome::Ready(bytes) => Some(bytes),
            RenderOutcome::Pending | RenderOutcome::Rejected(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RenderOutcome::Ready(_))
    }
}

/// Symbols-to-PCM transform over an explicit codec handle.
pub struct Renderer<C> {
    codec: C,
    config: RenderConfig,
}

impl<C: Codec> Renderer<C> {
    /// Renderer with the default window and scale.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            config: RenderConfig::default(),
        }
    }

    pub fn with_config(codec: C, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { codec, config })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Render the whole frames of `symbols` into one PCM chunk.
    ///
    /// A trailing partial frame is ignored and left for the caller to keep.
    /// Errors come only from the codec, or from a waveform too short for the
    /// configured window.
    pub fn render(&self, symbols: &[i64]) -> Result<RenderOutcome> {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("render", symbols = symbols.len()).entered();

        let Some(frames) = demux(symbols) else {
            return Ok(RenderOutcome::Pending);
        };

        let streams = match frames.validate(self.config.symbol_max) {
            Ok(streams) => streams,
            Err(out_of_range) => {
                tracing::debug!(
                    frames = frames.num_frames(),
                    "dropping chunk: {}",
                    out_of_range
                );
                return Ok(RenderOutcome::Rejected(out_of_range));
            }
        };

        let waveform = self.codec.decode(&streams)?;
        let window = waveform
            .get(self.config.window_start..self.config.window_end)
            .with_context(|| {
                format!(
                    "codec returned {} samples for {} frames, window needs {}",
                    waveform.len(),
                    streams.num_frames(),
                    self.config.window_end
                )
            })?;

        Ok(RenderOutcome::Ready(pcm_bytes(window, self.config.scale)))
    }
}

/// Convert one float sample to 16-bit PCM.
///
/// Samples are clamped to `[-1.0, 1.0]` before scaling, so codec overshoot
/// saturates instead of wrapping. NaN maps to silence.
pub fn quantize(sample: f32, scale: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * scale).round() as i16
}

/// Quantize samples and serialize them as little-endian 16-bit PCM.
pub fn pcm_bytes(samples: &[f32], scale: f32) -> Vec<u8> {
    let pcm: Vec<i16> = samples.iter().map(|&s| quantize(s, scale)).collect();
    let mut bytes = vec![0u8; pcm.len() * 2];
    LittleEndian::write_i16_into(&pcm, &mut bytes);
    bytes
}
