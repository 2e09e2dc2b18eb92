//! Concurrency tests for the synchronizer: many producer threads, one drain.

use std::sync::{Arc, Mutex};
use std::thread;

use gridplay_sync::{Handler, Synchronizer};

#[test]
fn test_concurrent_producers_drain_in_enqueue_order() {
    let sync = Arc::new(Synchronizer::<(u32, u32)>::new("test", 1024));
    // Each producer pushes while holding this lock and appends what it
    // pushed, so `log` is the exact enqueue order across all threads.
    let log = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..4u32)
        .map(|producer| {
            let sync = Arc::clone(&sync);
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for seq in 0..100u32 {
                    let mut log = log.lock().unwrap();
                    sync.push((producer, seq));
                    log.push((producer, seq));
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let mut seen = Vec::new();
    let drained = sync.drain_all(|e| seen.push(e));

    assert_eq!(drained, 400);
    assert_eq!(seen, *log.lock().unwrap());
    assert!(sync.is_empty());
}

#[test]
fn test_per_producer_order_survives_interleaving() {
    let sync = Arc::new(Synchronizer::<(u32, u32)>::new("test", 4096));

    let producers: Vec<_> = (0..8u32)
        .map(|producer| {
            let handler: Arc<dyn Handler<(u32, u32)>> = sync.clone();
            thread::spawn(move || {
                for seq in 0..250u32 {
                    handler.handle((producer, seq));
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let mut next = [0u32; 8];
    sync.drain_all(|(producer, seq)| {
        assert_eq!(seq, next[producer as usize], "producer {producer} reordered");
        next[producer as usize] += 1;
    });
    assert_eq!(next, [250; 8]);
    assert_eq!(sync.len(), 0);
}

#[test]
fn test_second_drain_after_empty_is_noop() {
    let sync = Synchronizer::new("test", 4);
    sync.push("a");
    assert_eq!(sync.drain_all(|_| {}), 1);
    assert_eq!(sync.drain_all(|_| {}), 0);
}
