// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reassembly hot-path benchmarks.
//
// Run with:
//   cargo bench --bench parse
//
// Groups:
//   parse_single — one-record commands (the common case on the pipe)
//   parse_multi  — commands split across several records, in and out of order

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use libbroker::message::{Message, MESSAGE_SIZE, PAYLOAD_CHARS};
use libbroker::parser::{parse, PartialCmds};

fn bench_parse_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_single");
    group.throughput(Throughput::Bytes(MESSAGE_SIZE as u64));

    let short = Message::new(1, 0, 1, "GC /data/store").expect("message");
    let full = Message::new(2, 0, 1, "G".repeat(PAYLOAD_CHARS)).expect("message");

    group.bench_function("short_payload", |b| {
        let mut cmds = PartialCmds::new();
        b.iter(|| {
            let cmd = parse(black_box(&short), &mut cmds).expect("parse");
            black_box(cmd)
        });
    });

    group.bench_function("full_payload", |b| {
        let mut cmds = PartialCmds::new();
        b.iter(|| {
            let cmd = parse(black_box(&full), &mut cmds).expect("parse");
            black_box(cmd)
        });
    });

    group.finish();
}

fn multi_part_messages(parts: u16) -> Vec<Message> {
    (0..parts)
        .map(|part| {
            let content = if part == 0 {
                format!("GC {}", "p".repeat(PAYLOAD_CHARS - 3))
            } else {
                "p".repeat(PAYLOAD_CHARS)
            };
            Message::new(u32::from(parts), part, parts, content).expect("message")
        })
        .collect()
}

fn bench_parse_multi(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_multi");

    for &parts in &[2u16, 8, 32] {
        let messages = multi_part_messages(parts);
        group.throughput(Throughput::Bytes(u64::from(parts) * MESSAGE_SIZE as u64));

        group.bench_with_input(
            BenchmarkId::new("in_order", parts),
            &messages,
            |b, messages| {
                let mut cmds = PartialCmds::new();
                b.iter(|| {
                    for m in messages {
                        if let Some(cmd) = parse(m, &mut cmds).expect("parse") {
                            black_box(cmd);
                        }
                    }
                });
            },
        );

        let mut reversed = messages.clone();
        reversed.reverse();
        group.bench_with_input(
            BenchmarkId::new("reverse_order", parts),
            &reversed,
            |b, messages| {
                let mut cmds = PartialCmds::new();
                b.iter(|| {
                    for m in messages {
                        if let Some(cmd) = parse(m, &mut cmds).expect("parse") {
                            black_box(cmd);
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parse_single, bench_parse_multi);
criterion_main!(benches);
