//! # Relaynet Wire Benchmarks
//!
//! Hot paths on every relayed message:
//!
//! | Path | Runs per message |
//! |------|------------------|
//! | frame pack / unpack | once per hop and peer |
//! | payload decode | once per hop |
//! | known-peer rotation | once per housekeeping pass |

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use peer_network::{
    pack_frames, unpack_frames, FrameLayout, KnownPeer, MessageOp, NodeId, PayloadCodec,
    PeerDirectory, WireMessage,
};
use shared_types::{Block, BlockHeader, TransactionEnvelope, ValueTransfer};

fn block_with(transactions: usize) -> Block {
    let txns = (0..transactions as u64)
        .map(|i| {
            TransactionEnvelope::new(
                vec![1; 33],
                vec![2; 64],
                i,
                ValueTransfer {
                    recipient: vec![3; 20],
                    amount: i,
                    fee: 1,
                },
            )
        })
        .collect();
    Block::new(
        BlockHeader {
            block_id: vec![9; 32],
            previous_block_id: vec![8; 32],
            height: 1,
            ..Default::default()
        },
        txns,
    )
}

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire-frames");
    for size in [64usize, 4 * 1024, 256 * 1024] {
        let message = WireMessage::new(MessageOp::Tail, 3, Bytes::from(vec![0xab; size]))
            .with_sender(NodeId::random());
        let packet = message.to_packet().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("pack", size), &message, |b, msg| {
            b.iter(|| black_box(pack_frames(&msg.to_frames()).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("unpack", size), &packet, |b, packet| {
            b.iter(|| {
                let frames = unpack_frames(packet.clone()).unwrap();
                black_box(WireMessage::from_frames(frames, FrameLayout::FromSender).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_payload(c: &mut Criterion) {
    let codec = PayloadCodec::default();
    let mut group = c.benchmark_group("payload-codec");
    for txns in [0usize, 100, 1000] {
        let encoded = codec.encode_block(&block_with(txns)).unwrap();
        group.throughput(Throughput::Elements(txns.max(1) as u64));
        group.bench_with_input(BenchmarkId::new("decode_block", txns), &encoded, |b, bytes| {
            b.iter(|| black_box(codec.decode(MessageOp::Tail, bytes).unwrap()))
        });
    }
    group.finish();
}

fn bench_rotation(c: &mut Criterion) {
    let directory: PeerDirectory<u32> = PeerDirectory::new();
    for i in 0..1000 {
        directory.add_known(KnownPeer::new(format!("tcp://10.0.{}.{}:30333", i / 256, i % 256)));
    }
    c.bench_function("directory/rotate_next_8_of_1000", |b| {
        b.iter(|| black_box(directory.rotate_next(8)))
    });
}

criterion_group!(benches, bench_frames, bench_payload, bench_rotation);
criterion_main!(benches);
