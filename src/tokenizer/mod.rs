//! Custom-token decoding
//!
//! Turns the `<custom_token_NNNN>` text emitted by the language model into
//! codec symbols, and optionally maps raw token ids to that text through a
//! HuggingFace `tokenizer.json`.

mod custom;
mod vocab;

pub use custom::{
    decode_token, encode_symbol, parse_token, split_token_text, TokenKind, TOKEN_CLOSE,
    TOKEN_MARKER,
};
pub use vocab::{CustomTokenVocab, END_OF_SPEECH_TOKEN};
