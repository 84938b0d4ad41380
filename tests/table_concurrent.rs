use std::{
    sync::{Arc, Barrier},
    thread,
};

use lfpool::lfht::Table;

const NUM_THREADS: usize = 16;
const KEYS_PER_THREAD: usize = 1024;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn key_of(thread_id: usize, i: usize) -> usize {
    // Pointer-like keys: non-zero, 16-byte aligned.
    (thread_id * KEYS_PER_THREAD + i + 1) * 16
}

fn spawn_all<F>(table: &Arc<Table>, body: F)
where
    F: Fn(&Table, usize) + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let threads: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let table = Arc::clone(table);
            let barrier = Arc::clone(&barrier);
            let body = Arc::clone(&body);

            thread::spawn(move || {
                barrier.wait();
                body(&table, thread_id);
            })
        })
        .collect();

    threads
        .into_iter()
        .for_each(|t| t.join().expect("Thread failed"));
}

#[test]
fn disjoint_inserts_are_all_found() {
    init_logger();
    let table = Arc::new(Table::with_capacity(NUM_THREADS * KEYS_PER_THREAD * 2).unwrap());

    spawn_all(&table, |table, thread_id| {
        for i in 0..KEYS_PER_THREAD {
            let key = key_of(thread_id, i);
            assert!(table.insert(key, key + 1));
        }
    });

    assert_eq!(table.len(), NUM_THREADS * KEYS_PER_THREAD);
    for thread_id in 0..NUM_THREADS {
        for i in 0..KEYS_PER_THREAD {
            let key = key_of(thread_id, i);
            assert_eq!(table.find(key), Some(key + 1));
        }
    }
}

#[test]
fn filling_to_exact_capacity_from_many_threads() {
    init_logger();
    let capacity = NUM_THREADS * KEYS_PER_THREAD;
    let table = Arc::new(Table::with_capacity(capacity).unwrap());
    assert_eq!(table.capacity(), capacity);

    spawn_all(&table, |table, thread_id| {
        for i in 0..KEYS_PER_THREAD {
            assert!(table.insert(key_of(thread_id, i), thread_id));
        }
    });

    assert_eq!(table.len(), capacity);
    assert!(!table.insert(key_of(NUM_THREADS, 0), 0));
    for thread_id in 0..NUM_THREADS {
        for i in 0..KEYS_PER_THREAD {
            assert_eq!(table.find(key_of(thread_id, i)), Some(thread_id));
        }
    }
}

#[test]
fn contended_updates_keep_one_slot_per_key() {
    init_logger();
    const SHARED_KEYS: usize = 64;
    let table = Arc::new(Table::with_capacity(SHARED_KEYS * 2).unwrap());

    // Every thread writes every key; values record the writer.
    spawn_all(&table, |table, thread_id| {
        for round in 0..100 {
            for key in 1..=SHARED_KEYS {
                let val = thread_id * 1000 + round;
                assert!(table.insert_or_update(key, val));
            }
        }
    });

    assert_eq!(table.len(), SHARED_KEYS);
    for key in 1..=SHARED_KEYS {
        let val = table.find(key).unwrap();
        // The last write of some thread.
        assert_eq!(val % 1000, 99, "key {key} has value {val}");
        assert!(val / 1000 < NUM_THREADS);
    }
}

#[test]
fn readers_see_keys_with_their_final_values() {
    init_logger();
    let table = Arc::new(Table::with_capacity(4096).unwrap());
    let total = 2048;

    spawn_all(&table, move |table, thread_id| {
        if thread_id % 2 == 0 {
            // Writers: even threads share the key space.
            for key in (1..=total).filter(|k| k % (NUM_THREADS / 2) == thread_id / 2) {
                assert!(table.insert(key, key));
            }
        } else {
            // Readers: a found key has either its value or, inside the
            // publication window, zero.
            for _ in 0..4 {
                for key in 1..=total {
                    if let Some(val) = table.find(key) {
                        assert!(val == key || val == 0, "key {key} has value {val}");
                    }
                }
            }
        }
    });

    for key in 1..=total {
        assert_eq!(table.find(key), Some(key));
    }
}
