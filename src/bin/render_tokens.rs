//! Render a recorded custom-token stream to audio.
//!
//! Reads `<custom_token_N>` text (or raw token ids together with a
//! `tokenizer.json`), runs it through the sliding-window renderer with the
//! SNAC 24kHz codec, and writes a WAV file or raw 16-bit PCM.
//!
//! Usage:
//!     cargo run --features cli --bin render_tokens -- tokens.txt --output out.wav
//!     cat tokens.txt | cargo run --features cli --bin render_tokens -- - --output out.pcm
//!     cargo run --features cli --bin render_tokens -- ids.txt --ids --tokenizer tokenizer.json

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;

use snac_stream::audio::SAMPLE_RATE;
use snac_stream::tokenizer::{split_token_text, CustomTokenVocab};
use snac_stream::{
    device_info, parse_device, AudioBuffer, SnacCodec, StreamConfig, StreamEvent, StreamSession,
};

/// Render custom-token text to PCM audio
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Token file, or `-` for stdin
    input: String,

    /// Output path; `.wav` writes a WAV file, anything else raw PCM
    #[arg(short, long, default_value = "out.wav")]
    output: String,

    /// Input holds whitespace-separated token ids instead of token text
    #[arg(long, requires = "tokenizer")]
    ids: bool,

    /// tokenizer.json (or a directory/hub id containing one) for --ids
    #[arg(long)]
    tokenizer: Option<String>,

    /// Directory with SNAC config.json and weights (downloads when omitted)
    #[arg(short, long)]
    model_dir: Option<String>,

    /// Stream/render configuration JSON
    #[arg(short, long)]
    config: Option<String>,

    /// Device for the codec (auto, cpu, cuda, cuda:N, metal)
    #[arg(long, default_value = "auto")]
    device: String,

    /// Append to an existing WAV output instead of overwriting it
    #[arg(long)]
    append: bool,
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
    }
}

/// Token text for every item of the input.
fn token_texts(args: &Args, input: &str) -> Result<Vec<String>> {
    if !args.ids {
        return Ok(split_token_text(input).map(str::to_string).collect());
    }

    let tokenizer = args.tokenizer.as_deref().context("--ids requires --tokenizer")?;
    let vocab = CustomTokenVocab::from_pretrained(tokenizer)?;
    let mut texts = Vec::new();
    for item in input.split_whitespace() {
        let id: u32 = item
            .parse()
            .with_context(|| format!("invalid token id '{item}'"))?;
        if vocab.end_of_speech_id == Some(id) {
            tracing::info!("Reached end-of-speech token");
            break;
        }
        match vocab.id_to_token(id) {
            Some(text) => texts.push(text),
            None => tracing::warn!("Token id {} not in vocabulary", id),
        }
    }
    Ok(texts)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _profiling = snac_stream::profiling::init();
    if _profiling.is_none() {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let config = match &args.config {
        Some(path) => StreamConfig::from_file(path)?,
        None => StreamConfig::default(),
    };

    let input = read_input(&args.input)?;
    let tokens = token_texts(&args, &input)?;
    tracing::info!("Read {} tokens", tokens.len());

    let device = parse_device(&args.device)?;
    tracing::info!("Loading SNAC on {}", device_info(&device));
    let codec = SnacCodec::from_pretrained(args.model_dir.as_deref(), device)?;
    config
        .render
        .check_codec_output(codec.samples_per_frame(), config.context_frames)?;
    let sample_rate = codec.sample_rate();
    if sample_rate != SAMPLE_RATE {
        tracing::warn!("Codec runs at {} Hz, expected {} Hz", sample_rate, SAMPLE_RATE);
    }

    let mut session = StreamSession::with_config(&codec, config)?;

    let progress = ProgressBar::new(tokens.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tokens")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut audio = AudioBuffer::new(Vec::new(), sample_rate);
    for token in &tokens {
        if let StreamEvent::Chunk(bytes) = session.push_token(token)? {
            audio.extend(&AudioBuffer::from_pcm16_le(&bytes, sample_rate)?)?;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let stats = session.stats();
    tracing::info!(
        "Rendered {} chunks ({} rejected, {} tokens skipped), {:.2}s of audio in {:.2?}",
        stats.chunks_emitted,
        stats.chunks_rejected,
        stats.tokens_skipped,
        audio.duration(),
        start.elapsed()
    );

    let output = Path::new(&args.output);
    let is_wav = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if is_wav {
        if args.append && output.exists() {
            let mut existing = AudioBuffer::load(output)?;
            existing
                .extend(&audio)
                .with_context(|| format!("Cannot append to {}", args.output))?;
            audio = existing;
        }
        audio.save(output)?;
    } else if args.append {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(output)
            .with_context(|| format!("Failed to open {}", args.output))?;
        file.write_all(&audio.to_pcm16_le())
            .with_context(|| format!("Failed to write {}", args.output))?;
    } else {
        std::fs::write(output, audio.to_pcm16_le())
            .with_context(|| format!("Failed to write {}", args.output))?;
    }
    tracing::info!("Wrote {} ({:.2}s total)", args.output, audio.duration());

    Ok(())
}
