//! SNAC 24kHz decoder backed by `candle-transformers`.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::snac::{Config as SnacConfig, Model as SnacModel};
use std::path::{Path, PathBuf};

use super::Codec;
use crate::render::CodebookStreams;

/// Hub repo holding the SNAC 24kHz `config.json`.
pub const SNAC_CONFIG_REPO: &str = "hubertsiuzdak/snac_24khz";

/// Hub repo holding candle-compatible SNAC weights.
pub const SNAC_WEIGHTS_REPO: &str = "lmz/candle-snac";

/// Weight file name for the 24kHz model.
pub const SNAC_WEIGHTS_FILE: &str = "snac_24khz.safetensors";

/// SNAC model handle.
///
/// Holds the weights on one device. Decoding takes `&self` and builds fresh
/// input tensors every call, so a single handle can be shared across threads.
pub struct SnacCodec {
    model: SnacModel,
    config: SnacConfig,
    device: Device,
}

impl SnacCodec {
    /// Load from a local `config.json` and safetensors weight file.
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        config_path: P,
        weights_path: Q,
        device: Device,
    ) -> Result<Self> {
        let config_path = config_path.as_ref();
        let weights_path = weights_path.as_ref();

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read SNAC config from {}", config_path.display()))?;
        let config: SnacConfig = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse SNAC config from {}", config_path.display())
        })?;

        tracing::info!(
            "Loading SNAC weights from {} ({} Hz)",
            weights_path.display(),
            config.sampling_rate
        );
        // SAFETY: the weight file is memory-mapped read-only and must not be
        // modified while the model is alive.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = SnacModel::new(&config, vb).context("Failed to build SNAC model")?;

        Ok(Self {
            model,
            config,
            device,
        })
    }

    /// Load from a directory containing `config.json` and the weight file.
    ///
    /// Accepts either `snac_24khz.safetensors` or `model.safetensors`.
    pub fn from_dir<P: AsRef<Path>>(dir: P, device: Device) -> Result<Self> {
        let dir = dir.as_ref();
        let config = dir.join("config.json");
        if !config.exists() {
            anyhow::bail!("No config.json found in '{}'", dir.display());
        }
        let weights = find_weights(dir)
            .with_context(|| format!("No SNAC safetensors found in '{}'", dir.display()))?;
        Self::from_files(config, weights, device)
    }

    /// Load from a local directory, or download the default 24kHz model
    /// when `model_dir` is `None` (requires the `hub` feature).
    pub fn from_pretrained(model_dir: Option<&str>, device: Device) -> Result<Self> {
        if let Some(dir) = model_dir {
            return Self::from_dir(dir, device);
        }

        #[cfg(feature = "hub")]
        {
            let paths = crate::hub::SnacPaths::download()?;
            Self::from_files(&paths.config, &paths.weights, device)
        }

        #[cfg(not(feature = "hub"))]
        anyhow::bail!(
            "Downloading SNAC requires the `hub` feature. \
             Either enable it or pass a local model directory."
        )
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.config.sampling_rate as u32
    }

    /// Waveform samples produced per seven-symbol frame.
    ///
    /// The coarsest codebook advances once per frame and is upsampled by the
    /// first VQ stride and then every decoder rate.
    pub fn samples_per_frame(&self) -> usize {
        let hop: usize = self.config.decoder_rates.iter().product();
        hop * self.config.vq_strides.first().copied().unwrap_or(1)
    }

    fn stream_tensor(&self, codes: &[u32]) -> Result<Tensor> {
        Ok(Tensor::from_slice(codes, (1, codes.len()), &self.device)?)
    }
}

impl Codec for SnacCodec {
    fn decode(&self, streams: &CodebookStreams) -> Result<Vec<f32>> {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("snac_decode", frames = streams.num_frames()).entered();

        let a = self.stream_tensor(&streams.a)?;
        let b = self.stream_tensor(&streams.b)?;
        let c = self.stream_tensor(&streams.c)?;

        let pcm = self
            .model
            .decode(&[&a, &b, &c])
            .with_context(|| format!("SNAC decode failed for {} frames", streams.num_frames()))?;

        // [1, 1, samples]
        let samples = pcm.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
        tracing::trace!(
            frames = streams.num_frames(),
            samples = samples.len(),
            "decoded codebook streams"
        );
        Ok(samples)
    }
}

fn find_weights(dir: &Path) -> Option<PathBuf> {
    [SNAC_WEIGHTS_FILE, "model.safetensors"]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dir_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = SnacCodec::from_dir(dir.path(), Device::Cpu)
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("No config.json found"));
    }

    #[test]
    fn test_from_dir_missing_weights() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        let err = SnacCodec::from_dir(dir.path(), Device::Cpu)
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("No SNAC safetensors found"));
    }

    #[test]
    fn test_find_weights_prefers_snac_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.safetensors"), b"").unwrap();
        assert_eq!(
            find_weights(dir.path()),
            Some(dir.path().join("model.safetensors"))
        );
        std::fs::write(dir.path().join(SNAC_WEIGHTS_FILE), b"").unwrap();
        assert_eq!(
            find_weights(dir.path()),
            Some(dir.path().join(SNAC_WEIGHTS_FILE))
        );
    }

    #[test]
    fn test_from_files_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        std::fs::write(&config, "not json").unwrap();
        let err = SnacCodec::from_files(&config, dir.path().join("w.safetensors"), Device::Cpu)
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("Failed to parse SNAC config"));
    }
}
