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

use std::{
    io::Write,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use blockqueue::{
    BlockingQueue, DiskQueue, FlushMode, QueueBuilder, QueueConfig, QueueError, StorageBackend,
    path::{scan_segments, segment_file_path},
};
use bytes::Bytes;
use tempfile::TempDir;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn builder(temp_dir: &TempDir) -> QueueBuilder {
    QueueBuilder::new("jobs", temp_dir.path())
        .max_bytes_per_segment(256)
        .checkpoint_interval(Duration::from_millis(20))
}

fn text(item: &Bytes) -> &str { std::str::from_utf8(item).unwrap() }

#[test]
fn test_capacity_two_scenario_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let queue = builder(&temp_dir).capacity(2).build().unwrap();

    queue.put(Bytes::from_static(b"a"), true, Duration::ZERO).unwrap();
    queue.put(Bytes::from_static(b"b"), true, Duration::ZERO).unwrap();
    assert!(matches!(
        queue.put(Bytes::from_static(b"c"), false, Duration::ZERO),
        Err(QueueError::FullQueue)
    ));

    assert_eq!(queue.get(true, Duration::ZERO).unwrap(), "a");
    queue.put(Bytes::from_static(b"c"), false, Duration::ZERO).unwrap();
    assert_eq!(queue.get(true, Duration::ZERO).unwrap(), "b");
    assert_eq!(queue.get(true, Duration::ZERO).unwrap(), "c");
    assert!(matches!(
        queue.get(false, Duration::ZERO),
        Err(QueueError::EmptyQueue)
    ));

    queue.into_inner().close().unwrap();
}

#[test]
fn test_producers_and_consumers_across_restart() {
    init_test_logging();
    let temp_dir = TempDir::new().unwrap();
    let producers = 4;
    let per_producer = 200;
    let capacity = 16;

    let queue = Arc::new(builder(&temp_dir).capacity(capacity).build().unwrap());

    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..per_producer {
                    let item = Bytes::from(format!("{p}:{i:05}"));
                    queue.put(item, true, Duration::from_secs(10)).unwrap();
                }
            })
        })
        .collect();

    // Consume while producers run, leaving one full queue on disk.
    let total = producers * per_producer;
    let mut last_seen = vec![None::<usize>; producers];
    for _ in 0..total - capacity {
        let item = queue.get(true, Duration::from_secs(10)).unwrap();
        let (p, i) = text(&item).split_once(':').unwrap();
        let (p, i) = (p.parse::<usize>().unwrap(), i.parse::<usize>().unwrap());
        assert!(last_seen[p].is_none_or(|last| last < i), "producer {p} out of order");
        last_seen[p] = Some(i);
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let queue = Arc::into_inner(queue).unwrap();
    assert_eq!(queue.len(), capacity);
    queue.into_inner().close().unwrap();

    let queue = builder(&temp_dir).build().unwrap();
    assert_eq!(queue.len(), capacity);
    while let Ok(item) = queue.get(false, Duration::ZERO) {
        let (p, i) = text(&item).split_once(':').unwrap();
        let (p, i) = (p.parse::<usize>().unwrap(), i.parse::<usize>().unwrap());
        assert!(last_seen[p].is_none_or(|last| last < i), "producer {p} out of order");
        last_seen[p] = Some(i);
    }
    assert!(last_seen.iter().all(|last| *last == Some(per_producer - 1)));
    assert!(scan_segments(temp_dir.path(), "jobs").unwrap().len() > 1);
    queue.into_inner().close().unwrap();
}

#[test]
fn test_blocked_get_woken_by_put() {
    let temp_dir = TempDir::new().unwrap();
    let queue = Arc::new(builder(&temp_dir).build().unwrap());

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || queue.get(true, Duration::from_secs(10)))
    };
    thread::sleep(Duration::from_millis(50));
    queue.put(Bytes::from_static(b"wake"), true, Duration::ZERO).unwrap();

    assert_eq!(consumer.join().unwrap().unwrap(), "wake");
}

#[test]
fn test_get_timeout_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let queue = builder(&temp_dir).build().unwrap();

    let start = Instant::now();
    let err = queue.get(true, Duration::from_millis(100)).unwrap_err();
    assert!(err.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_crash_with_torn_tail_and_stale_checkpoint() {
    init_test_logging();
    let temp_dir = TempDir::new().unwrap();
    let config = QueueConfig {
        name: "jobs".to_string(),
        data_dir: temp_dir.path().to_path_buf(),
        max_bytes_per_segment: 128,
        checkpoint_interval: Duration::from_secs(3600),
        flush_mode: FlushMode::Async,
        ..QueueConfig::default()
    };

    let mut log = DiskQueue::open(config.clone()).unwrap();
    for i in 0..5 {
        log.put(Bytes::from(format!("early-{i}"))).unwrap();
    }
    log.get().unwrap();
    let stale = log.checkpoint().unwrap();
    for i in 0..20 {
        log.put(Bytes::from(format!("late-{i:02}"))).unwrap();
    }
    let write = log.write_cursor();
    log.close().unwrap();

    // Rewind the checkpoint and leave half a frame behind the last record.
    std::fs::write(
        temp_dir.path().join("jobs.diskqueue.meta.dat"),
        stale.to_string(),
    )
    .unwrap();
    let tail = segment_file_path(temp_dir.path(), "jobs", write.segment);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&tail)
        .unwrap();
    file.write_all(&[0, 0, 1, 0, 0xde, 0xad]).unwrap();
    drop(file);

    let log = DiskQueue::open(config).unwrap();
    assert_eq!(log.size(), 24);
    assert_eq!(log.write_cursor(), write);

    let queue = BlockingQueue::new(log, 0);
    queue.put(Bytes::from_static(b"after"), true, Duration::ZERO).unwrap();

    let mut items = Vec::new();
    while let Ok(item) = queue.get(false, Duration::ZERO) {
        items.push(text(&item).to_string());
    }
    let expected: Vec<String> = (1..5)
        .map(|i| format!("early-{i}"))
        .chain((0..20).map(|i| format!("late-{i:02}")))
        .chain(std::iter::once("after".to_string()))
        .collect();
    assert_eq!(items, expected);
    queue.into_inner().close().unwrap();
}

#[test]
fn test_checkpoint_thread_persists_periodically() {
    let temp_dir = TempDir::new().unwrap();
    let queue = builder(&temp_dir).build().unwrap();
    queue.put(Bytes::from_static(b"x"), true, Duration::ZERO).unwrap();

    let meta = temp_dir.path().join("jobs.diskqueue.meta.dat");
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if std::fs::read_to_string(&meta).is_ok_and(|content| content.starts_with("1,")) {
            break;
        }
        assert!(Instant::now() < deadline, "checkpoint never reflected the put");
        thread::sleep(Duration::from_millis(10));
    }
    queue.into_inner().close().unwrap();
}
