use rand::{thread_rng, Rng};
use rs2_bytestream::{ByteStream, StreamError, StreamQueue};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Payloads are `<producer>:<seq>;` so each chunk can be located and checked
/// after concatenation.
fn payload(producer: usize, seq: usize) -> String {
    format!("{}:{:04};", producer, seq)
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_two_producers_thousand_appends_each() {
    init_logging();
    let stream = ByteStream::queue();
    let producers: Vec<_> = (0..2)
        .map(|id| {
            let queue = stream.producer();
            thread::spawn(move || {
                for seq in 0..1000 {
                    queue.append(payload(id, seq)).unwrap();
                }
            })
        })
        .collect();

    for handle in producers {
        handle.join().unwrap();
    }
    stream.end_input().unwrap();

    let all = String::from_utf8(stream.read_all().unwrap()).unwrap();
    let chunks: Vec<&str> = all.split_terminator(';').collect();
    assert_eq!(chunks.len(), 2000);

    // Interleaving across producers is unspecified; each producer's own
    // chunks arrive intact and in issue order.
    let mut next_seq: HashMap<usize, usize> = HashMap::new();
    for chunk in chunks {
        let (id, seq) = chunk.split_once(':').expect("chunk must be intact");
        let id: usize = id.parse().unwrap();
        let seq: usize = seq.parse().unwrap();
        let expected = next_seq.entry(id).or_insert(0);
        assert_eq!(seq, *expected, "producer {} out of order", id);
        *expected += 1;
    }
    assert_eq!(next_seq.get(&0), Some(&1000));
    assert_eq!(next_seq.get(&1), Some(&1000));
}

#[test]
fn test_producers_and_consumer_run_concurrently() {
    init_logging();
    let stream = Arc::new(ByteStream::queue());
    let producer_count = 4;
    let per_producer = 250;

    let producers: Vec<_> = (0..producer_count)
        .map(|id| {
            let queue = stream.producer();
            thread::spawn(move || {
                let mut rng = thread_rng();
                for seq in 0..per_producer {
                    queue.append(payload(id, seq)).unwrap();
                    if rng.gen_bool(0.05) {
                        thread::sleep(Duration::from_micros(200));
                    }
                }
            })
        })
        .collect();

    let consumer = {
        let stream = Arc::clone(&stream);
        thread::spawn(move || {
            let mut received = Vec::new();
            // Odd read sizes force chunk splits across payload boundaries.
            let mut rng = thread_rng();
            loop {
                match stream.read_blocking(rng.gen_range(1..17)) {
                    Ok(bytes) => received.extend_from_slice(&bytes),
                    Err(StreamError::EndOfStream) => break,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
            received
        })
    };

    for handle in producers {
        handle.join().unwrap();
    }
    stream.end_input().unwrap();

    let received = String::from_utf8(consumer.join().unwrap()).unwrap();
    let total = received.split_terminator(';').count();
    assert_eq!(total, producer_count * per_producer);
    assert_eq!(stream.backend().position(), received.len() as u64);
}

/// Check that every `<producer>:<seq>;` payload arrived intact and that each
/// producer's payloads kept their issue order.
fn assert_payloads_intact(received: &[u8], producers: usize, per_producer: usize) {
    let text = String::from_utf8(received.to_vec()).unwrap();
    let mut next_seq: HashMap<usize, usize> = HashMap::new();
    for chunk in text.split_terminator(';') {
        let (id, seq) = chunk
            .split_once(':')
            .unwrap_or_else(|| panic!("torn payload {:?}", chunk));
        assert_eq!(seq.len(), 4, "torn payload {:?}", chunk);
        let id: usize = id.parse().unwrap();
        let seq: usize = seq.parse().unwrap();
        let expected = next_seq.entry(id).or_insert(0);
        assert_eq!(seq, *expected, "producer {} out of order", id);
        *expected += 1;
    }
    assert_eq!(next_seq.len(), producers);
    assert!(next_seq.values().all(|&count| count == per_producer));
}

#[test]
fn test_multiple_consumers_claim_disjoint_bytes() {
    let queue = StreamQueue::unbounded();
    // Big-endian sequence numbers; chunk and read sizes are multiples of 4,
    // so every delivered piece holds whole numbers.
    let total = 5000u32;
    let expected: Vec<u8> = (0..total).flat_map(|i| i.to_be_bytes()).collect();
    for chunk in expected.chunks(36) {
        queue.append(chunk.to_vec()).unwrap();
    }
    queue.end_input().unwrap();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                loop {
                    match queue.read(8) {
                        Ok(bytes) => {
                            assert_eq!(bytes.len() % 4, 0);
                            seen.extend(
                                bytes
                                    .chunks(4)
                                    .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]])),
                            );
                        }
                        Err(StreamError::EndOfStream) => break,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
                seen
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in consumers {
        let seen = handle.join().unwrap();
        // Each consumer claims pieces in queue order.
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        all.extend(seen);
    }
    all.sort_unstable();
    // Disjoint and complete: every number exactly once.
    assert_eq!(all, (0..total).collect::<Vec<_>>());
    assert_eq!(queue.position(), expected.len() as u64);
}

#[test]
fn test_bounded_queue_with_many_writers() {
    init_logging();
    // Smaller than one payload, so every write_all is accepted in pieces.
    let stream = Arc::new(ByteStream::new(StreamQueue::bounded(5).unwrap()));

    let writers: Vec<_> = (0..3)
        .map(|id| {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                for seq in 0..200 {
                    let written = stream.write_all(payload(id, seq).as_bytes()).unwrap();
                    assert_eq!(written, 7);
                }
            })
        })
        .collect();

    let reader = {
        let stream = Arc::clone(&stream);
        thread::spawn(move || stream.read_all().unwrap())
    };

    for handle in writers {
        handle.join().unwrap();
    }
    stream.end_input().unwrap();

    let received = reader.join().unwrap();
    assert_eq!(received.len(), 3 * 200 * 7);
    assert_payloads_intact(&received, 3, 200);
}

#[test]
fn test_appends_stay_intact_on_bounded_queue() {
    init_logging();
    let queue = StreamQueue::bounded(8).unwrap();

    let producers: Vec<_> = (0..3)
        .map(|id| {
            let queue = queue.clone();
            thread::spawn(move || {
                for seq in 0..300 {
                    queue.append(payload(id, seq)).unwrap();
                }
            })
        })
        .collect();

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let mut received = Vec::new();
            let mut rng = thread_rng();
            loop {
                match queue.read(rng.gen_range(1..10)) {
                    Ok(bytes) => received.extend_from_slice(&bytes),
                    Err(StreamError::EndOfStream) => break,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
            received
        })
    };

    for handle in producers {
        handle.join().unwrap();
    }
    queue.end_input().unwrap();

    let received = consumer.join().unwrap();
    assert_payloads_intact(&received, 3, 300);
}
