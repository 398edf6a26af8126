//! Performance benchmarks for the wsplug protocol core.
//!
//! Run with: `cargo bench`

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use wsplug::Limits;
use wsplug::protocol::frame::encode_client_frame;
use wsplug::protocol::handshake::{HandshakeRequest, HandshakeResponse, compute_accept_key};
use wsplug::protocol::{FrameReassembler, MAX_HEADER_LEN, OpCode, apply_mask, encode_header};

const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

fn feed_all(wire: &[u8], block: usize) -> usize {
    let mut reassembler = FrameReassembler::new(Limits::default());
    let mut events = Vec::new();
    for chunk in wire.chunks(block) {
        reassembler.feed(chunk, &mut events).unwrap();
    }
    events.len()
}

// =============================================================================
// Reassembler Benchmarks
// =============================================================================

fn bench_reassembler(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembler");

    let small = encode_client_frame(true, OpCode::Text, &[0xAB; 10], MASK);
    group.throughput(Throughput::Bytes(10));
    group.bench_function("small_10b", |b| {
        b.iter(|| feed_all(black_box(&small), small.len()));
    });

    let large = encode_client_frame(true, OpCode::Binary, &vec![0xAB; 65536], MASK);
    group.throughput(Throughput::Bytes(65536));
    group.bench_function("large_64kb_one_block", |b| {
        b.iter(|| feed_all(black_box(&large), large.len()));
    });
    group.bench_function("large_64kb_8k_blocks", |b| {
        b.iter(|| feed_all(black_box(&large), 8192));
    });
    group.bench_function("large_64kb_100b_blocks", |b| {
        b.iter(|| feed_all(black_box(&large), 100));
    });

    let chunk = vec![0xCD; 6554];
    let mut fragmented = Vec::new();
    for i in 0..10 {
        let opcode = if i == 0 { OpCode::Binary } else { OpCode::Continuation };
        let len = if i == 9 { 65536 - 6554 * 9 } else { 6554 };
        fragmented.extend(encode_client_frame(i == 9, opcode, &chunk[..len], MASK));
    }
    group.bench_function("10_fragments_64kb", |b| {
        b.iter(|| feed_all(black_box(&fragmented), 8192));
    });

    group.finish();
}

// =============================================================================
// Encoding Benchmarks
// =============================================================================

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");

    for (name, len) in [("header_7bit", 100u64), ("header_16bit", 1000), ("header_64bit", 1 << 20)] {
        group.bench_function(name, |b| {
            let mut buf = [0u8; MAX_HEADER_LEN];
            b.iter(|| encode_header(OpCode::Binary, black_box(len), &mut buf));
        });
    }

    let mut data = vec![0xAB; 65536];
    group.throughput(Throughput::Bytes(65536));
    group.bench_function("apply_mask_64kb", |b| {
        b.iter(|| apply_mask(black_box(&mut data), MASK));
    });

    group.finish();
}

// =============================================================================
// Handshake Benchmarks
// =============================================================================

fn bench_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");

    group.bench_function("compute_accept_key", |b| {
        b.iter(|| compute_accept_key(black_box("dGhlIHNhbXBsZSBub25jZQ==")));
    });

    let request = b"GET /echo HTTP/1.1\r\n\
        Host: localhost\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 7\r\n\
        Sec-WebSocket-Protocol: chat, superchat\r\n\r\n";

    group.bench_function("parse_and_validate_request", |b| {
        b.iter(|| {
            let req = HandshakeRequest::parse(black_box(request)).unwrap();
            req.validate().unwrap();
            req
        });
    });

    group.bench_function("full_handshake", |b| {
        let mut buf = Vec::with_capacity(256);
        b.iter(|| {
            let req = HandshakeRequest::parse(black_box(request)).unwrap();
            req.validate().unwrap();
            buf.clear();
            let response = HandshakeResponse {
                accept: compute_accept_key(req.key().unwrap()),
                protocol: req.protocols().into_iter().next(),
                headers: Vec::new(),
            };
            response.write(&mut buf).unwrap();
            buf.len()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_reassembler, bench_encoding, bench_handshake);
criterion_main!(benches);
