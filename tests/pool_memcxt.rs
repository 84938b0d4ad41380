use std::{
    collections::HashSet,
    mem,
    sync::{Arc, Barrier},
    thread,
};

use lfpool::{
    memcxt::{pool_memcxt, sys_memcxt, MemType, MemoryContext},
    pool::{Bucket, PoolAllocator, Segment},
    MemError, ARENA_LENGTH,
};
use paste::paste;

const NUM_THREADS: usize = 8;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

macro_rules! generate_pool_tests {
    ($item:ident) => {
        paste! {
            #[test]
            fn [<concurrent_ $item:lower _allocation_hands_out_distinct_items>]() {
                init_logger();
                const PER_THREAD: usize = 300;

                let pool = Arc::new(PoolAllocator::new().unwrap());
                let barrier = Arc::new(Barrier::new(NUM_THREADS));

                let threads: Vec<_> = (0..NUM_THREADS)
                    .map(|_| {
                        let pool = Arc::clone(&pool);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            barrier.wait();
                            (0..PER_THREAD)
                                .map(|_| pool.[<allocate_ $item:lower>]().unwrap().as_ptr() as usize)
                                .collect::<Vec<_>>()
                        })
                    })
                    .collect();

                let mut all = HashSet::new();
                for t in threads {
                    for addr in t.join().expect("Thread failed") {
                        assert!(all.insert(addr), "{addr:#x} handed out twice");
                    }
                }

                let total = NUM_THREADS * PER_THREAD;
                let stats = pool.stats().[<$item:lower s>];
                assert_eq!(stats.used_items(), total);
                assert_eq!(stats.free_items(), stats.capacity() - total);
                // No block was appended beyond what the items need.
                assert_eq!(stats.blocks.len(), (total + ARENA_LENGTH - 1) / ARENA_LENGTH);
            }

            #[test]
            fn [<concurrent_ $item:lower _churn_leaves_pool_empty>]() {
                init_logger();
                let pool = Arc::new(PoolAllocator::new().unwrap());
                let barrier = Arc::new(Barrier::new(NUM_THREADS));

                let threads: Vec<_> = (0..NUM_THREADS)
                    .map(|_| {
                        let pool = Arc::clone(&pool);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            barrier.wait();
                            for _ in 0..50 {
                                let held: Vec<_> = (0..40)
                                    .map(|_| pool.[<allocate_ $item:lower>]().unwrap())
                                    .collect();
                                for item in held {
                                    pool.[<release_ $item:lower>](item).unwrap();
                                }
                            }
                        })
                    })
                    .collect();

                threads
                    .into_iter()
                    .for_each(|t| t.join().expect("Thread failed"));

                let stats = pool.stats().[<$item:lower s>];
                assert_eq!(stats.used_items(), 0);
                assert_eq!(stats.free_items(), stats.capacity());
                assert!(stats.blocks.iter().all(|b| b.free_count == ARENA_LENGTH));
            }

            #[test]
            fn [<$item:lower _double_release_is_reported>]() {
                init_logger();
                let pool = PoolAllocator::new().unwrap();
                let item = pool.[<allocate_ $item:lower>]().unwrap();

                pool.[<release_ $item:lower>](item).unwrap();
                assert!(matches!(
                    pool.[<release_ $item:lower>](item),
                    Err(MemError::NotAllocated { .. })
                ));
            }
        }
    };
}

generate_pool_tests!(Segment);
generate_pool_tests!(Bucket);

fn item_sizes() -> [(MemType, usize); 2] {
    [
        (MemType::Segment, mem::size_of::<Segment>()),
        (MemType::Bucket, mem::size_of::<Bucket>()),
    ]
}

#[test]
fn contexts_are_interchangeable_behind_the_trait() {
    init_logger();
    let contexts: [&dyn MemoryContext; 2] = [pool_memcxt(), sys_memcxt()];

    for cxt in contexts {
        for (tag, size) in item_sizes() {
            let blocks: Vec<_> = (0..64).map(|_| cxt.allocate(tag, size).unwrap()).collect();
            let distinct: HashSet<_> = blocks.iter().collect();
            assert_eq!(distinct.len(), blocks.len());

            for block in blocks {
                unsafe { cxt.release(tag, block, size) }.unwrap();
            }
        }
    }
}

#[test]
fn pooled_context_is_shared_across_threads() {
    init_logger();
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let threads: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let cxt = pool_memcxt();
                let size = mem::size_of::<Bucket>();
                barrier.wait();

                for _ in 0..20 {
                    let held: Vec<_> = (0..32)
                        .map(|_| cxt.allocate(MemType::Bucket, size).unwrap())
                        .collect();
                    for block in held {
                        unsafe { cxt.release(MemType::Bucket, block, size) }.unwrap();
                    }
                }
            })
        })
        .collect();

    threads
        .into_iter()
        .for_each(|t| t.join().expect("Thread failed"));
}

#[test]
fn pooled_context_rejects_foreign_blocks() {
    init_logger();
    let size = mem::size_of::<Bucket>();
    let foreign = sys_memcxt().allocate(MemType::Bucket, size).unwrap();

    assert!(matches!(
        unsafe { pool_memcxt().release(MemType::Bucket, foreign, size) },
        Err(MemError::NotOwned { .. })
    ));

    unsafe { sys_memcxt().release(MemType::Bucket, foreign, size) }.unwrap();
}
