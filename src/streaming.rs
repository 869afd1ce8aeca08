//! Sliding-window streaming over a live token stream.
//!
//! A [`StreamSession`] owns the symbol buffer for one audio stream. Symbols
//! are appended as tokens arrive; once `context_frames` whole frames are
//! buffered, every newly completed frame triggers a render over the last
//! `context_frames` frames. With the default of four frames and the default
//! `[2048, 4096)` window, each chunk is the audio of the second-oldest frame
//! in the window, decoded with one frame of left and two frames of right
//! context.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::codec::Codec;
use crate::render::{OutOfRange, RenderConfig, RenderOutcome, Renderer};
use crate::tokenizer::{parse_token, TokenKind};
use crate::FRAME_SIZE;

/// Streaming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Frames handed to the codec on each render
    #[serde(default = "default_context_frames")]
    pub context_frames: usize,
    #[serde(default)]
    pub render: RenderConfig,
}

fn default_context_frames() -> usize {
    4
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            context_frames: default_context_frames(),
            render: RenderConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Load configuration from a local JSON file. Missing fields take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stream config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse stream config from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.context_frames == 0 {
            anyhow::bail!("context_frames must be > 0");
        }
        self.render.validate()
    }

    /// Symbols kept in the buffer and passed to each render.
    pub fn window_symbols(&self) -> usize {
        self.context_frames * FRAME_SIZE
    }
}

/// What a single pushed token or symbol produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The token yielded no usable symbol. `TokenKind::Symbol` here carries
    /// a negative control symbol, which does not advance the position.
    NoSymbol(TokenKind),
    /// Symbol buffered; no chunk due yet.
    Pending,
    /// A chunk was due but contained an out-of-range symbol.
    Rejected(OutOfRange),
    /// Little-endian 16-bit PCM.
    Chunk(Vec<u8>),
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub symbols_accepted: usize,
    pub tokens_skipped: usize,
    pub chunks_emitted: usize,
    pub chunks_rejected: usize,
}

/// Per-stream buffer and render cadence.
///
/// Sessions share nothing with each other except the codec handle, so
/// concurrent streams each get their own session.
pub struct StreamSession<C> {
    renderer: Renderer<C>,
    context_frames: usize,
    buffer: Vec<i64>,
    stats: StreamStats,
}

impl<C: Codec> StreamSession<C> {
    pub fn new(codec: C) -> Self {
        Self {
            renderer: Renderer::new(codec),
            context_frames: default_context_frames(),
            buffer: Vec::new(),
            stats: StreamStats::default(),
        }
    }

    pub fn with_config(codec: C, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            renderer: Renderer::with_config(codec, config.render)?,
            context_frames: config.context_frames,
            buffer: Vec::new(),
            stats: StreamStats::default(),
        })
    }

    /// Decode one piece of token text and feed the symbol, if any.
    ///
    /// The token's position is the number of symbols accepted so far, so
    /// skipped text and control tokens do not shift later frame slots.
    pub fn push_token(&mut self, text: &str) -> Result<StreamEvent> {
        match parse_token(text, self.stats.symbols_accepted) {
            TokenKind::Symbol(symbol) if symbol >= 0 => self.push_symbol(symbol),
            kind => {
                tracing::trace!(?kind, "skipping token {:?}", text);
                self.stats.tokens_skipped += 1;
                Ok(StreamEvent::NoSymbol(kind))
            }
        }
    }

    /// Feed an already decoded symbol.
    pub fn push_symbol(&mut self, symbol: i64) -> Result<StreamEvent> {
        self.buffer.push(symbol);
        self.stats.symbols_accepted += 1;

        let window = self.context_frames * FRAME_SIZE;
        if self.buffer.len() > window {
            let excess = self.buffer.len() - window;
            self.buffer.drain(..excess);
        }

        let accepted = self.stats.symbols_accepted;
        if accepted % FRAME_SIZE != 0 || accepted < window {
            return Ok(StreamEvent::Pending);
        }

        match self.renderer.render(&self.buffer)? {
            RenderOutcome::Ready(bytes) => {
                self.stats.chunks_emitted += 1;
                Ok(StreamEvent::Chunk(bytes))
            }
            RenderOutcome::Rejected(out_of_range) => {
                tracing::warn!(
                    symbols = accepted,
                    "dropping audio chunk: {}",
                    out_of_range
                );
                self.stats.chunks_rejected += 1;
                Ok(StreamEvent::Rejected(out_of_range))
            }
            RenderOutcome::Pending => Ok(StreamEvent::Pending),
        }
    }

    /// Iterate over the PCM chunks produced by `tokens`.
    pub fn chunks<I>(&mut self, tokens: I) -> StreamChunks<'_, C, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        StreamChunks {
            session: self,
            tokens: tokens.into_iter(),
        }
    }

    /// Feed every token and concatenate the emitted chunks.
    pub fn render_all<I>(&mut self, tokens: I) -> Result<Vec<u8>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut pcm = Vec::new();
        for chunk in self.chunks(tokens) {
            pcm.extend_from_slice(&chunk?);
        }
        Ok(pcm)
    }

    /// Symbols currently buffered (at most `context_frames * 7`).
    pub fn buffered(&self) -> &[i64] {
        &self.buffer
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn renderer(&self) -> &Renderer<C> {
        &self.renderer
    }

    /// Drop buffered symbols and counters, keeping the codec.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.stats = StreamStats::default();
    }
}

/// Iterator returned by [`StreamSession::chunks`].
pub struct StreamChunks<'a, C, I> {
    session: &'a mut StreamSession<C>,
    tokens: I,
}

impl<C, I> Iterator for StreamChunks<'_, C, I>
where
    C: Codec,
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        for token in self.tokens.by_ref() {
            match self.session.push_token(token.as_ref()) {
                Ok(StreamEvent::Chunk(bytes)) => return Some(Ok(bytes)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::CodebookStreams;
    use crate::tokenizer::encode_symbol;

    /// Emits `samples_per_frame` samples per frame, each equal to the
    /// frame's codebook A symbol / 4096.
    struct FrameEchoCodec;

    impl Codec for FrameEchoCodec {
        fn decode(&self, streams: &CodebookStreams) -> Result<Vec<f32>> {
            Ok(streams
                .a
                .iter()
                .flat_map(|&s| std::iter::repeat(s as f32 / 4096.0).take(2048))
                .collect())
        }
    }

    fn tokens_for(symbols: &[i64]) -> Vec<String> {
        symbols
            .iter()
            .enumerate()
            .map(|(pos, &s)| encode_symbol(s, pos).unwrap())
            .collect()
    }

    #[test]
    fn test_stream_config_default() {
        let config = StreamConfig::default();
        assert_eq!(config.context_frames, 4);
        assert_eq!(config.window_symbols(), 28);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_stream_config_validate() {
        let config = StreamConfig {
            context_frames: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(StreamSession::with_config(FrameEchoCodec, config).is_err());
    }

    #[test]
    fn test_stream_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        std::fs::write(&path, r#"{"context_frames": 6, "render": {"window_start": 4096, "window_end": 6144}}"#)
            .unwrap();
        let config = StreamConfig::from_file(&path).unwrap();
        assert_eq!(config.context_frames, 6);
        assert_eq!(config.render.window_start, 4096);
        assert_eq!(config.render.symbol_max, 4096);
    }

    #[test]
    fn test_first_chunk_after_four_frames() {
        let mut session = StreamSession::new(FrameEchoCodec);
        for i in 0..27 {
            assert_eq!(session.push_symbol(1).unwrap(), StreamEvent::Pending, "symbol {i}");
        }
        let event = session.push_symbol(1).unwrap();
        let StreamEvent::Chunk(bytes) = event else {
            panic!("expected chunk, got {event:?}");
        };
        assert_eq!(bytes.len(), 4096);
        assert_eq!(session.stats().chunks_emitted, 1);
    }

    #[test]
    fn test_chunk_every_frame_after_warmup() {
        let mut session = StreamSession::new(FrameEchoCodec);
        let mut chunk_at = Vec::new();
        for i in 1..=56 {
            if let StreamEvent::Chunk(_) = session.push_symbol(1).unwrap() {
                chunk_at.push(i);
            }
        }
        assert_eq!(chunk_at, vec![28, 35, 42, 49, 56]);
        assert_eq!(session.buffered().len(), 28);
    }

    #[test]
    fn test_chunk_is_second_frame_of_window() {
        // codebook A of frame k holds 100 * (k + 1)
        let symbols: Vec<i64> = (0..5)
            .flat_map(|k| {
                let mut frame = vec![0i64; 7];
                frame[0] = 100 * (k + 1);
                frame
            })
            .collect();
        let mut session = StreamSession::new(FrameEchoCodec);
        let chunks: Vec<Vec<u8>> = session
            .chunks(tokens_for(&symbols))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(chunks.len(), 2);

        let first = i16::from_le_bytes([chunks[0][0], chunks[0][1]]);
        let second = i16::from_le_bytes([chunks[1][0], chunks[1][1]]);
        assert_eq!(first, (200.0f32 / 4096.0 * 32767.0).round() as i16);
        assert_eq!(second, (300.0f32 / 4096.0 * 32767.0).round() as i16);
    }

    #[test]
    fn test_push_token_skips_text_and_control_tokens() {
        let mut session = StreamSession::new(FrameEchoCodec);
        assert_eq!(
            session.push_token("<|audio|>").unwrap(),
            StreamEvent::NoSymbol(TokenKind::NotAToken)
        );
        assert_eq!(
            session.push_token("<custom_token_4>").unwrap(),
            StreamEvent::NoSymbol(TokenKind::Symbol(-6))
        );
        assert_eq!(
            session.push_token("<custom_token_12").unwrap(),
            StreamEvent::NoSymbol(TokenKind::Malformed)
        );
        assert_eq!(session.stats().tokens_skipped, 3);
        assert_eq!(session.stats().symbols_accepted, 0);

        // position 0 is still the next slot
        assert_eq!(
            session.push_token("<custom_token_110>").unwrap(),
            StreamEvent::Pending
        );
        assert_eq!(session.buffered(), &[100]);
        session.push_token("<custom_token_4206>").unwrap();
        assert_eq!(session.buffered(), &[100, 100]);
    }

    #[test]
    fn test_rejected_chunk_is_counted() {
        let mut session = StreamSession::new(FrameEchoCodec);
        for _ in 0..27 {
            session.push_symbol(1).unwrap();
        }
        let event = session.push_symbol(5000).unwrap();
        assert!(matches!(event, StreamEvent::Rejected(OutOfRange { value: 5000, .. })));
        assert_eq!(session.stats().chunks_rejected, 1);
        assert_eq!(session.stats().chunks_emitted, 0);
    }

    #[test]
    fn test_render_all_concatenates() {
        let symbols = vec![7i64; 7 * 6];
        let mut session = StreamSession::new(FrameEchoCodec);
        let mut noisy = tokens_for(&symbols);
        noisy.insert(0, "<custom_token_3>".to_string());
        let pcm = session.render_all(noisy).unwrap();
        // chunks at 28, 35, 42
        assert_eq!(pcm.len(), 3 * 4096);
    }

    #[test]
    fn test_reset() {
        let mut session = StreamSession::new(FrameEchoCodec);
        session.push_symbol(1).unwrap();
        session.reset();
        assert!(session.buffered().is_empty());
        assert_eq!(session.stats(), StreamStats::default());
    }
}
