//! PCM buffers and WAV I/O.

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

use crate::render::quantize;
use crate::PCM_SCALE;

/// Mono audio held as floats in \[-1.0, 1.0\].
///
/// # Example
///
/// ```rust,ignore
/// let pcm = session.render_all(tokens)?;
/// let audio = AudioBuffer::from_pcm16_le(&pcm, 24000)?;
/// audio.save("output.wav")?;
/// ```
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build from little-endian 16-bit PCM bytes, as emitted by the renderer.
    pub fn from_pcm16_le(bytes: &[u8], sample_rate: u32) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            anyhow::bail!("PCM byte length {} is not a multiple of 2", bytes.len());
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| LittleEndian::read_i16(pair) as f32 / PCM_SCALE)
            .collect();
        Ok(Self::new(samples, sample_rate))
    }

    /// Serialize as little-endian 16-bit PCM.
    pub fn to_pcm16_le(&self) -> Vec<u8> {
        crate::render::pcm_bytes(&self.samples, PCM_SCALE)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append another buffer with the same sample rate.
    pub fn extend(&mut self, other: &AudioBuffer) -> Result<()> {
        if other.sample_rate != self.sample_rate {
            anyhow::bail!(
                "sample rate mismatch: {} vs {}",
                self.sample_rate,
                other.sample_rate
            );
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Save to WAV file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_wav(path, &self.samples, self.sample_rate)
    }

    /// Load from WAV file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_wav(path)
    }
}

/// Load a WAV file, averaging channels down to mono.
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            // full-scale positive, so 16-bit files round-trip through `quantize`
            let max_val = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mono = if channels > 1 {
        samples
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    Ok(AudioBuffer::new(mono, spec.sample_rate))
}

/// Save samples as a 16-bit mono WAV file, quantized like rendered chunks.
pub fn save_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let path = path.as_ref();
    let mut writer = WavWriter::create(path, wav_spec(sample_rate))
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in samples {
        writer.write_sample(quantize(sample, PCM_SCALE))?;
    }

    writer.finalize()?;
    Ok(())
}

fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_audio_buffer_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 24000], 24000);
        assert!((buffer.duration() - 1.0).abs() < 1e-6);
        assert_eq!(buffer.len(), 24000);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_from_pcm16_le() {
        let audio = AudioBuffer::from_pcm16_le(&[0xff, 0x7f, 0x01, 0x80, 0, 0], 24000).unwrap();
        assert_eq!(audio.len(), 3);
        assert!((audio.samples[0] - 1.0).abs() < 1e-6);
        assert!((audio.samples[1] + 1.0).abs() < 1e-6);
        assert_eq!(audio.samples[2], 0.0);
    }

    #[test]
    fn test_from_pcm16_le_odd_length() {
        assert!(AudioBuffer::from_pcm16_le(&[0, 0, 0], 24000).is_err());
    }

    #[test]
    fn test_pcm16_bytes_survive_conversion() {
        let pcm = crate::render::pcm_bytes(&[0.25, -0.75, 0.5], PCM_SCALE);
        let audio = AudioBuffer::from_pcm16_le(&pcm, 24000).unwrap();
        assert_eq!(audio.to_pcm16_le(), pcm);
    }

    #[test]
    fn test_extend() {
        let mut a = AudioBuffer::new(vec![0.1], 24000);
        a.extend(&AudioBuffer::new(vec![0.2, 0.3], 24000)).unwrap();
        assert_eq!(a.len(), 3);
        assert!(a.extend(&AudioBuffer::new(vec![0.0], 16000)).is_err());
    }

    #[test]
    fn test_save_and_load_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        let original = AudioBuffer::new(vec![0.1, 0.2, -0.3, 0.4, -0.5], 24000);
        original.save(&path).unwrap();

        let loaded = AudioBuffer::load(&path).unwrap();
        assert_eq!(loaded.sample_rate, 24000);
        assert_eq!(loaded.samples.len(), 5);

        for (a, b) in original.samples.iter().zip(loaded.samples.iter()) {
            assert!((a - b).abs() < 1e-4, "sample mismatch: {a} vs {b}");
        }
    }

    #[test]
    fn test_rendered_pcm_to_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.wav");
        let pcm = crate::render::pcm_bytes(&[0.0, 0.5, -0.5, 1.0], PCM_SCALE);
        AudioBuffer::from_pcm16_le(&pcm, 24000)
            .unwrap()
            .save(&path)
            .unwrap();

        let reader = WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16384, -16384, 32767]);
    }

    #[test]
    fn test_append_keeps_existing_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("append.wav");
        let first = crate::render::pcm_bytes(&[0.1, -0.9, 0.33], PCM_SCALE);
        let second = crate::render::pcm_bytes(&[0.7, -0.2], PCM_SCALE);
        AudioBuffer::from_pcm16_le(&first, 24000)
            .unwrap()
            .save(&path)
            .unwrap();

        let mut audio = AudioBuffer::load(&path).unwrap();
        audio
            .extend(&AudioBuffer::from_pcm16_le(&second, 24000).unwrap())
            .unwrap();
        audio.save(&path).unwrap();

        let pcm = AudioBuffer::load(&path).unwrap().to_pcm16_le();
        assert_eq!(pcm, [first, second].concat());
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(load_wav("/nonexistent/path/to/file.wav").is_err());
    }
}
