use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rs2_bytestream::{ByteStream, StreamQueue};
use std::sync::Arc;
use std::thread;

fn bench_split_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_reads");
    let payload = vec![b'x'; 64 * 1024];

    for read_size in [1usize, 64, 4096] {
        group.bench_with_input(
            BenchmarkId::new("read_size", read_size),
            &read_size,
            |b, &read_size| {
                b.iter(|| {
                    let queue = StreamQueue::unbounded();
                    queue.append(payload.clone()).unwrap();
                    queue.end_input().unwrap();
                    let mut total = 0;
                    while let Ok(bytes) = queue.read(read_size) {
                        total += bytes.len();
                    }
                    black_box(total)
                });
            },
        );
    }

    group.finish();
}

fn bench_producer_consumer(c: &mut Criterion) {
    let mut group = c.benchmark_group("producer_consumer");

    for capacity in [None, Some(4096usize)] {
        let label = capacity.map_or("unbounded".to_string(), |c| format!("bounded_{}", c));
        group.bench_function(label, |b| {
            b.iter(|| {
                let queue = match capacity {
                    Some(capacity) => StreamQueue::bounded(capacity).unwrap(),
                    None => StreamQueue::unbounded(),
                };
                let stream = Arc::new(ByteStream::new(queue));
                let writer = {
                    let stream = Arc::clone(&stream);
                    thread::spawn(move || {
                        for _ in 0..1000 {
                            stream.write_all(b"0123456789abcdef\n").unwrap();
                        }
                        stream.end_input().unwrap();
                    })
                };
                let lines = stream.readlines().unwrap();
                writer.join().unwrap();
                black_box(lines.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_split_reads, bench_producer_consumer);
criterion_main!(benches);
