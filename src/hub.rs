//! HuggingFace Hub integration for downloading the SNAC codec.
//!
//! Enable with the `hub` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use snac_stream::hub::SnacPaths;
//!
//! let paths = SnacPaths::download()?;
//! let codec = SnacCodec::from_files(&paths.config, &paths.weights, device)?;
//! ```

use anyhow::{Context, Result};
use hf_hub::api::sync::Api;
use std::path::PathBuf;

use crate::codec::{SNAC_CONFIG_REPO, SNAC_WEIGHTS_FILE, SNAC_WEIGHTS_REPO};

/// Paths to downloaded SNAC files.
#[derive(Debug, Clone)]
pub struct SnacPaths {
    /// SNAC `config.json`
    pub config: PathBuf,
    /// candle-compatible safetensors weights
    pub weights: PathBuf,
}

impl SnacPaths {
    /// Download the 24kHz config and weights into the HuggingFace cache.
    pub fn download() -> Result<Self> {
        Self::download_from(SNAC_CONFIG_REPO, SNAC_WEIGHTS_REPO, SNAC_WEIGHTS_FILE)
    }

    /// Download from custom repos.
    ///
    /// The upstream SNAC repos ship PyTorch weights, so config and weights
    /// usually live in different repos.
    pub fn download_from(config_repo: &str, weights_repo: &str, weights_file: &str) -> Result<Self> {
        let api = Api::new().context("Failed to create HuggingFace API")?;

        tracing::info!("Downloading SNAC config: {}", config_repo);
        let config = api
            .model(config_repo.to_string())
            .get("config.json")
            .context("Failed to download SNAC config.json")?;

        tracing::info!("Downloading SNAC weights: {}/{}", weights_repo, weights_file);
        let weights = api
            .model(weights_repo.to_string())
            .get(weights_file)
            .with_context(|| format!("Failed to download {weights_file}"))?;

        Ok(Self { config, weights })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_ids() {
        assert!(SNAC_CONFIG_REPO.starts_with("hubertsiuzdak/"));
        assert!(SNAC_WEIGHTS_FILE.ends_with(".safetensors"));
    }
}
