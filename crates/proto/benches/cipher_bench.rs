//! Cipher Performance Benchmarks
//!
//! Benchmarks for the session cipher: key schedule cost and block
//! transform throughput at the payload sizes the handshake actually uses.
//!
//! Run with: `cargo bench --bench cipher_bench`

#![cfg(feature = "winbox")]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use krait_proto::winbox::{CipherState, Direction, PADDING_LEN, SESSION_KEY_LEN};

fn session_key() -> Vec<u8> {
    (0..SESSION_KEY_LEN as u32)
        .map(|i| ((i * 7 + 3) & 0xff) as u8)
        .collect()
}

fn bench_key_schedule(c: &mut Criterion) {
    let key = session_key();
    c.bench_function("key_schedule_with_drop", |b| {
        b.iter(|| black_box(CipherState::new(black_box(&key), Direction::Outbound)));
    });
}

fn bench_block_transform(c: &mut Criterion) {
    let key = session_key();
    let mut group = c.benchmark_group("block_transform");

    // Salt response, login acknowledgement, full catalog.
    for &size in &[45usize, 135, 1833] {
        let payload = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encrypt_{}", size), |b| {
            let mut engine = CipherState::new(&key, Direction::Outbound);
            b.iter(|| black_box(engine.encrypt_block(black_box(&payload), &[0u8; PADDING_LEN])));
        });
        group.bench_function(format!("decrypt_{}", size), |b| {
            let mut engine = CipherState::new(&key, Direction::Inbound);
            b.iter(|| black_box(engine.decrypt_block(black_box(&payload), &[0u8; PADDING_LEN])));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_key_schedule, bench_block_transform);
criterion_main!(benches);
