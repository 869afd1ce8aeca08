//! # snac-stream
//!
//! Streaming conversion of `<custom_token_NNNN>` output from Orpheus-style
//! text-to-speech language models into 16-bit PCM, using the three-level
//! [SNAC](https://github.com/hubertsiuzdak/snac) 24kHz neural audio codec.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use snac_stream::{auto_device, SnacCodec, StreamSession, StreamEvent};
//!
//! let codec = SnacCodec::from_pretrained(None, auto_device()?)?;
//! let mut session = StreamSession::new(&codec);
//!
//! for token in token_stream {
//!     if let StreamEvent::Chunk(pcm) = session.push_token(&token)? {
//!         sink.write_all(&pcm)?;
//!     }
//! }
//! ```
//!
//! ## Pipeline
//!
//! 1. **Token decoding** ([`tokenizer`]): the last `<custom_token_N>` in a
//!    piece of text becomes the symbol `N - 10 - (position % 7) * 4096`.
//!
//! 2. **Demultiplexing** ([`render::demux`]): every 7 symbols form a frame
//!    whose slots feed codebook A (slot 0), B (slots 1, 4) and C
//!    (slots 2, 3, 5, 6).
//!
//! 3. **Validation**: any symbol outside `[0, 4096]` drops the whole chunk.
//!
//! 4. **Rendering** ([`Renderer`]): the codec decodes the streams, samples
//!    `[2048, 4096)` of the waveform are kept and quantized to `i16`.
//!
//! [`StreamSession`] drives steps 1–4 over a live token stream with a
//! four-frame sliding window. [`Renderer`] is the stateless per-call
//! transform for callers that manage their own buffer.
//!
//! ## Codec
//!
//! The neural codec sits behind the [`Codec`] trait. [`SnacCodec`] runs
//! candle's SNAC implementation on CPU, CUDA (`cuda` feature) or Metal
//! (`metal` feature); tests and benches use deterministic stubs.

pub mod audio;
pub mod codec;
#[cfg(feature = "hub")]
pub mod hub;
pub mod profiling;
pub mod render;
pub mod streaming;
pub mod tokenizer;

use anyhow::Result;
use candle_core::Device;

pub use audio::AudioBuffer;
pub use codec::{Codec, SnacCodec};
pub use render::{
    demux, Codebook, CodebookStreams, OutOfRange, RenderConfig, RenderOutcome, Renderer,
};
pub use streaming::{StreamConfig, StreamEvent, StreamSession, StreamStats};
pub use tokenizer::{decode_token, parse_token, TokenKind};

/// Symbols per frame.
pub const FRAME_SIZE: usize = 7;

/// Reserved token numbers below the first codec symbol.
pub const BASE_OFFSET: i64 = 10;

/// Token-number stride between consecutive frame slots.
pub const CODEBOOK_RANGE: i64 = 4096;

/// Largest symbol accepted by default (inclusive).
pub const SYMBOL_MAX: u32 = 4096;

/// First waveform sample emitted per render.
pub const WINDOW_START: usize = 2048;

/// One past the last waveform sample emitted per render.
pub const WINDOW_END: usize = 4096;

/// Float to 16-bit PCM scale.
pub const PCM_SCALE: f32 = 32767.0;

/// Render the whole frames of `symbols` with the default configuration.
///
/// Shorthand for `Renderer::new(codec).render(symbols)`.
pub fn render<C: Codec>(codec: &C, symbols: &[i64]) -> Result<RenderOutcome> {
    Renderer::new(codec).render(symbols)
}

/// Select the best available compute device for the codec.
///
/// Checks CUDA, then Metal, then falls back to CPU.
pub fn auto_device() -> Result<Device> {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::cuda_if_available(0) {
            if device.is_cuda() {
                tracing::info!("Using CUDA device");
                return Ok(device);
            }
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            tracing::info!("Using Metal device");
            return Ok(device);
        }
    }

    tracing::info!("Using CPU device");
    Ok(Device::Cpu)
}

/// Parse a device string into a [`Device`].
///
/// Supported: `auto`, `cpu`, `cuda`, `cuda:N`, `metal`.
pub fn parse_device(device_str: &str) -> Result<Device> {
    match device_str.to_lowercase().as_str() {
        "auto" => auto_device(),
        "cpu" => Ok(Device::Cpu),
        s if s.starts_with("cuda") => {
            #[cfg(feature = "cuda")]
            {
                let ordinal: usize = match s.strip_prefix("cuda:") {
                    Some(idx) => idx
                        .parse()
                        .map_err(|e| anyhow::anyhow!("invalid CUDA device index: {e}"))?,
                    None => 0,
                };
                Device::cuda_if_available(ordinal)
                    .map_err(|e| anyhow::anyhow!("failed to init CUDA device {ordinal}: {e}"))
            }
            #[cfg(not(feature = "cuda"))]
            anyhow::bail!("CUDA support not compiled in. Rebuild with: cargo build --features cuda")
        }
        "metal" => {
            #[cfg(feature = "metal")]
            {
                Device::new_metal(0)
                    .map_err(|e| anyhow::anyhow!("failed to init Metal device: {e}"))
            }
            #[cfg(not(feature = "metal"))]
            anyhow::bail!(
                "Metal support not compiled in. Rebuild with: cargo build --features metal"
            )
        }
        other => {
            anyhow::bail!("unknown device '{other}'. Supported: auto, cpu, cuda, cuda:N, metal")
        }
    }
}

/// Human-readable label for a [`Device`].
pub fn device_info(device: &Device) -> String {
    match device {
        Device::Cpu => "CPU".to_string(),
        Device::Cuda(_) => "CUDA".to_string(),
        Device::Metal(_) => "Metal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silence;

    impl Codec for Silence {
        fn decode(&self, streams: &CodebookStreams) -> Result<Vec<f32>> {
            Ok(vec![0.0; streams.num_frames() * 2048])
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(FRAME_SIZE, 7);
        assert_eq!(BASE_OFFSET, 10);
        assert_eq!(CODEBOOK_RANGE, 4096);
        assert_eq!(WINDOW_END - WINDOW_START, 2048);
    }

    #[test]
    fn test_render_shorthand() {
        assert_eq!(render(&Silence, &[0; 6]).unwrap(), RenderOutcome::Pending);
        let pcm = render(&Silence, &[0; 14]).unwrap().into_bytes().unwrap();
        assert_eq!(pcm, vec![0u8; 4096]);
    }

    #[test]
    fn test_parse_device_cpu() {
        let device = parse_device("cpu").unwrap();
        assert!(matches!(device, Device::Cpu));
    }

    #[test]
    fn test_parse_device_case_insensitive() {
        let device = parse_device("CPU").unwrap();
        assert!(matches!(device, Device::Cpu));
    }

    #[test]
    fn test_parse_device_unknown() {
        assert!(parse_device("tpu").is_err());
    }

    #[test]
    fn test_auto_device() {
        let device = auto_device().unwrap();
        assert!(
            matches!(device, Device::Cpu)
                || matches!(device, Device::Cuda(_))
                || matches!(device, Device::Metal(_))
        );
    }

    #[test]
    fn test_device_info() {
        assert_eq!(device_info(&Device::Cpu), "CPU");
    }
}
