// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Benchmarks for the blocking queue and its backends.
//!
//! Measures:
//! - Put latency on the memory and disk backends
//! - Disk put latency with and without a sync per record
//! - Put/get round trip throughput through the blocking queue

use std::{hint::black_box, sync::Arc, thread, time::Duration};

use blockqueue::{BlockingQueue, DiskQueue, FlushMode, MemoryBackend, QueueBuilder, StorageBackend};
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tempfile::TempDir;

/// Message sizes to benchmark (bytes)
const MESSAGE_SIZES: &[usize] = &[64, 1024, 16384];

/// Number of messages per throughput iteration
const BATCH_SIZE: usize = 1_000;

fn open_disk(temp_dir: &TempDir, flush_mode: FlushMode) -> DiskQueue {
    QueueBuilder::new("bench", temp_dir.path())
        .max_bytes_per_segment(64 * 1024 * 1024)
        .flush_mode(flush_mode)
        .open_storage()
        .unwrap()
}

fn generate_message(size: usize) -> Bytes { Bytes::from(vec![0xABu8; size]) }

fn bench_put_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_memory");

    for &size in MESSAGE_SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut backend = MemoryBackend::new();
            let msg = generate_message(size);

            b.iter(|| {
                backend.put(black_box(msg.clone())).unwrap();
                backend.get().unwrap()
            });
        });
    }

    group.finish();
}

fn bench_put_disk(c: &mut Criterion, name: &str, flush_mode: FlushMode) {
    let mut group = c.benchmark_group(name);
    if flush_mode == FlushMode::Sync {
        group.sample_size(20);
    }

    for &size in MESSAGE_SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut log = open_disk(&temp_dir, flush_mode);
            let msg = generate_message(size);

            b.iter(|| {
                log.put(black_box(msg.clone())).unwrap();
                log.get().unwrap()
            });

            log.close().unwrap();
        });
    }

    group.finish();
}

fn bench_put_disk_async(c: &mut Criterion) { bench_put_disk(c, "put_disk_async", FlushMode::Async); }

fn bench_put_disk_sync(c: &mut Criterion) { bench_put_disk(c, "put_disk_sync", FlushMode::Sync); }

/// One producer thread feeding the calling thread through a bounded queue.
fn bench_blocking_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_throughput");
    group.sample_size(20);
    group.throughput(Throughput::Elements(BATCH_SIZE as u64));

    group.bench_function("memory", |b| {
        let queue = Arc::new(BlockingQueue::new(MemoryBackend::new(), 64));
        b.iter(|| run_batch(&queue));
    });

    group.bench_function("disk_async", |b| {
        let temp_dir = TempDir::new().unwrap();
        let queue = Arc::new(BlockingQueue::new(open_disk(&temp_dir, FlushMode::Async), 64));
        b.iter(|| run_batch(&queue));
        if let Some(queue) = Arc::into_inner(queue) {
            queue.into_inner().close().unwrap();
        }
    });

    group.finish();
}

fn run_batch<B>(queue: &Arc<BlockingQueue<B>>)
where
    B: StorageBackend<Item = Bytes> + Send + 'static,
{
    let producer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let msg = generate_message(256);
            for _ in 0..BATCH_SIZE {
                queue.put(msg.clone(), true, Duration::ZERO).unwrap();
            }
        })
    };
    for _ in 0..BATCH_SIZE {
        black_box(queue.get(true, Duration::ZERO).unwrap());
    }
    producer.join().unwrap();
}

criterion_group!(
    benches,
    bench_put_memory,
    bench_put_disk_async,
    bench_put_disk_sync,
    bench_blocking_throughput
);
criterion_main!(benches);
