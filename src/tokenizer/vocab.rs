//! Id → text mapping for callers that hold raw language-model token ids.

use anyhow::{anyhow, Result};
use std::path::Path;
use tokenizers::Tokenizer;

use super::custom::{parse_token, TokenKind, TOKEN_MARKER};

/// Token text of the end-of-speech marker emitted by Orpheus-style models.
pub const END_OF_SPEECH_TOKEN: &str = "<custom_token_2>";

/// Vocabulary wrapper that turns token ids into custom-token text.
#[derive(Debug)]
pub struct CustomTokenVocab {
    tokenizer: Tokenizer,
    /// Id of [`END_OF_SPEECH_TOKEN`], if the vocabulary has one
    pub end_of_speech_id: Option<u32>,
}

#[cfg(test)]
fn create_mock_tokenizer() -> Tokenizer {
    use tokenizers::models::bpe::BPE;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;

    let vocab: [(&str, u32); 6] = [
        ("hello", 0),
        ("<|eot_id|>", 1),
        ("<custom_token_2>", 2),
        ("<custom_token_10>", 3),
        ("<custom_token_4206>", 4),
        ("<custom_token_x>", 5),
    ];

    let merges: Vec<(String, String)> = vec![];
    let bpe = BPE::builder()
        .vocab_and_merges(vocab.map(|(k, v)| (k.to_string(), v)), merges)
        .unk_token("[UNK]".to_string())
        .build()
        .unwrap();

    let mut tokenizer = Tokenizer::new(bpe);
    tokenizer.with_pre_tokenizer(Some(Whitespace));
    tokenizer
}

impl CustomTokenVocab {
    /// Load from a `tokenizer.json` path, a directory containing one, or
    /// (with the `hub` feature) a HuggingFace model id.
    pub fn from_pretrained(model_id: &str) -> Result<Self> {
        let path = Path::new(model_id);

        if path.is_file() {
            return Self::from_file(path);
        }

        if path.join("tokenizer.json").exists() {
            return Self::from_file(path.join("tokenizer.json"));
        }

        if path.is_dir() {
            anyhow::bail!("No tokenizer.json found in '{}'", model_id);
        }

        #[cfg(feature = "hub")]
        {
            tracing::info!("Downloading tokenizer from HuggingFace Hub: {}", model_id);
            let api = hf_hub::api::sync::Api::new()
                .map_err(|e| anyhow!("Failed to create HuggingFace API: {}", e))?;
            let file = api
                .model(model_id.to_string())
                .get("tokenizer.json")
                .map_err(|e| anyhow!("Failed to download tokenizer from '{}': {}", model_id, e))?;
            Self::from_file(file)
        }

        #[cfg(not(feature = "hub"))]
        Err(anyhow!(
            "No tokenizer found at '{}' and hub feature is disabled",
            model_id
        ))
    }

    /// Load from a local `tokenizer.json`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;

        Ok(Self::from_tokenizer(tokenizer))
    }

    pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        let end_of_speech_id = tokenizer.token_to_id(END_OF_SPEECH_TOKEN);
        Self {
            tokenizer,
            end_of_speech_id,
        }
    }

    /// Text of token `id`, if it exists in the vocabulary.
    pub fn id_to_token(&self, id: u32) -> Option<String> {
        self.tokenizer.id_to_token(id)
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }

    /// Whether `id` is a custom token at all.
    pub fn is_custom_token(&self, id: u32) -> bool {
        self.id_to_token(id)
            .is_some_and(|text| text.contains(TOKEN_MARKER))
    }

    /// Decode token `id` at stream `position`. Unknown ids are not tokens.
    pub fn parse_id(&self, id: u32, position: usize) -> TokenKind {
        match self.id_to_token(id) {
            Some(text) => parse_token(&text, position),
            None => TokenKind::NotAToken,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}
