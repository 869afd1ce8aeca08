//! Audio output helpers
//!
//! Rendered chunks are raw little-endian 16-bit PCM; this module turns them
//! into float buffers and WAV files.

mod io;

pub use io::{load_wav, save_wav, AudioBuffer};

/// Output sample rate of the SNAC 24kHz codec
pub const SAMPLE_RATE: u32 = 24000;
