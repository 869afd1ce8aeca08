//! Decoding of `<custom_token_NNNN>` text into codec symbols.
//!
//! The language model emits one custom token per codec symbol. Upstream of
//! this crate each of the seven frame slots is shifted into its own block of
//! the vocabulary (`slot * 4096`) on top of a fixed base of 10 reserved ids,
//! so the same codebook entry has a different token number depending on
//! where in the frame it appears. [`decode_token`] undoes both shifts.

use crate::{BASE_OFFSET, CODEBOOK_RANGE, FRAME_SIZE};

/// Marker that opens a custom token.
pub const TOKEN_MARKER: &str = "<custom_token_";

/// Delimiter that closes a custom token.
pub const TOKEN_CLOSE: char = '>';

/// Outcome of parsing one piece of token text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A decoded symbol, offset-corrected for its frame slot.
    Symbol(i64),
    /// No `<custom_token_` marker in the text.
    NotAToken,
    /// Marker present but the delimiter or number is invalid.
    Malformed,
}

impl TokenKind {
    /// The decoded symbol, if any.
    pub fn symbol(self) -> Option<i64> {
        match self {
            TokenKind::Symbol(s) => Some(s),
            TokenKind::NotAToken | TokenKind::Malformed => None,
        }
    }
}

/// Parse token text at stream `position` into a [`TokenKind`].
///
/// Only the last marker occurrence is considered, so a piece of text that
/// carries a partial or stale token in front of the real one still decodes.
pub fn parse_token(text: &str, position: usize) -> TokenKind {
    let text = text.trim();
    let Some(start) = text.rfind(TOKEN_MARKER) else {
        return TokenKind::NotAToken;
    };

    let Some(digits) = text[start + TOKEN_MARKER.len()..].strip_suffix(TOKEN_CLOSE) else {
        return TokenKind::Malformed;
    };

    let Ok(number) = digits.parse::<i64>() else {
        return TokenKind::Malformed;
    };

    // numbers near i64::MIN cannot take the offset correction
    number
        .checked_sub(BASE_OFFSET)
        .and_then(|n| n.checked_sub(slot_offset(position)))
        .map_or(TokenKind::Malformed, TokenKind::Symbol)
}

/// Decode token text at stream `position` into a symbol.
///
/// Returns `None` both when the text is not a custom token and when it is
/// malformed. Use [`parse_token`] to tell the two apart.
///
/// ```
/// use snac_stream::tokenizer::decode_token;
///
/// assert_eq!(decode_token("<custom_token_110>", 0), Some(100));
/// assert_eq!(decode_token("<custom_token_4206>", 1), Some(100));
/// assert_eq!(decode_token("hello", 0), None);
/// ```
pub fn decode_token(text: &str, position: usize) -> Option<i64> {
    parse_token(text, position).symbol()
}

/// Token text that [`decode_token`] maps back to `symbol` at `position`.
///
/// Returns `None` when the token number would not fit in an `i64`.
pub fn encode_symbol(symbol: i64, position: usize) -> Option<String> {
    let number = symbol
        .checked_add(BASE_OFFSET)?
        .checked_add(slot_offset(position))?;
    Some(format!("{TOKEN_MARKER}{number}{TOKEN_CLOSE}"))
}

/// Split generated text into pieces holding at most one custom token each.
///
/// Text is cut after every closing delimiter and on whitespace, so both
/// `"<custom_token_1> <custom_token_2>"` and `"<custom_token_1><custom_token_2>"`
/// yield two pieces.
pub fn split_token_text(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(TOKEN_CLOSE)
        .flat_map(str::split_whitespace)
}

fn slot_offset(position: usize) -> i64 {
    (position % FRAME_SIZE) as i64 * CODEBOOK_RANGE
}
