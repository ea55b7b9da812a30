use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use gatelink_core::{FrameAssembler, FrameFlags, Message, TypedTextCodec, Value, WireCodec, encode_frame};

fn sample_message(entries: usize) -> Message {
    let mut message = Message::new().with("cmd", "relayChat").with("requestId", 42);
    for i in 0..entries {
        message.insert(format!("field{i}"), format!("value number {i}"));
    }
    message.insert(
        "list",
        Value::List((0..entries as i32).map(Value::Int).collect()),
    );
    message
}

fn bench_codec(c: &mut Criterion) {
    let codec = TypedTextCodec::new();
    let mut group = c.benchmark_group("codec");

    for entries in [4usize, 32, 256] {
        let message = sample_message(entries);
        let encoded = codec.encode(&message);
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", entries), &message, |b, m| {
            b.iter(|| codec.encode(black_box(m)))
        });
        group.bench_with_input(BenchmarkId::new("decode", entries), &encoded, |b, e| {
            b.iter(|| codec.decode(black_box(e)))
        });
    }

    group.finish();
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [64usize, 1024, 16384, 262_144] {
        let payload = vec![0x42; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, p| {
            b.iter(|| encode_frame(black_box(FrameFlags::new()), black_box(p)))
        });
    }

    group.finish();
}

fn bench_frame_assembly(c: &mut Criterion) {
    let frame = encode_frame(FrameFlags::new(), &vec![0xAA; 1200]).unwrap();
    let stream: Vec<u8> = frame.iter().cycle().take(frame.len() * 64).copied().collect();

    let mut group = c.benchmark_group("frame_assembly");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for chunk in [1usize, 512, 4096] {
        group.bench_with_input(BenchmarkId::new("chunk", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut assembler = FrameAssembler::default();
                let mut frames = 0;
                for piece in stream.chunks(chunk) {
                    assembler.push(piece);
                    while let Ok(Some(_)) = assembler.next_frame() {
                        frames += 1;
                    }
                }
                black_box(frames)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_frame_encode, bench_frame_assembly);
criterion_main!(benches);
