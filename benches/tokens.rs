//! Micro-benchmarks for custom-token parsing.
//!
//! Run with: `cargo bench -- tokens`

use criterion::{criterion_group, criterion_main, Criterion};
use snac_stream::tokenizer::{encode_symbol, split_token_text};
use snac_stream::{decode_token, parse_token};
use std::hint::black_box;

fn bench_decode_token(c: &mut Criterion) {
    let tokens: Vec<String> = (0..7).map(|pos| encode_symbol(1234, pos).unwrap()).collect();
    c.bench_function("decode_token_frame", |b| {
        b.iter(|| {
            tokens
                .iter()
                .enumerate()
                .filter_map(|(pos, t)| decode_token(black_box(t), pos))
                .sum::<i64>()
        });
    });

    c.bench_function("parse_token_not_a_token", |b| {
        b.iter(|| parse_token(black_box("<|eot_id|>"), 0));
    });
}

fn bench_split_text(c: &mut Criterion) {
    let text: String = (0..7 * 100).map(|pos| encode_symbol(42, pos).unwrap()).collect();
    c.bench_function("split_token_text_700", |b| {
        b.iter(|| split_token_text(black_box(&text)).count());
    });
}

criterion_group!(benches, bench_decode_token, bench_split_text);
criterion_main!(benches);
