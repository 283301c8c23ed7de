//! Concurrent import/read/delete stress tests

use scanstore::{
    DataPoint, ScanHandle, ScanRecord, ScanStoreError, Session, SessionBuilder, ALL_LEVELS,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn shared_session(dir: &TempDir) -> Arc<Session> {
    Arc::new(
        SessionBuilder::new()
            .name("concurrent")
            .scratch_dir(dir.path())
            .build(),
    )
}

fn points_for(scan: u32) -> Vec<DataPoint> {
    (0..(scan % 50 + 1))
        .map(|i| DataPoint::new(100.0 + i as f64, (scan * 10 + i) as f64))
        .collect()
}

#[test]
fn test_parallel_import() {
    let dir = TempDir::new().unwrap();
    let session = shared_session(&dir);

    let handles: Vec<_> = (0..8u32)
        .map(|thread_id| {
            let session = session.clone();
            std::thread::spawn(move || {
                for i in 0..100u32 {
                    let scan = thread_id * 100 + i + 1;
                    session
                        .add_scan(ScanRecord::new(
                            scan,
                            scan % 2 + 1,
                            scan as f64,
                            points_for(scan),
                        ))
                        .unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(session.scan_count(), 800);

    // Every storage ID issued exactly once
    let ids: HashSet<_> = session
        .index()
        .handles()
        .iter()
        .map(|h| h.storage_id)
        .collect();
    assert_eq!(ids.len(), 800);

    // Every scan reads back its own points
    for scan in 1..=800u32 {
        assert_eq!(session.scan_data_points(scan).unwrap(), points_for(scan));
    }

    assert_eq!(session.scan_count_at(1) + session.scan_count_at(2), 800);
    assert_eq!(session.scan_count_at(ALL_LEVELS), 800);
}

#[test]
fn test_readers_and_writers_interleaved() {
    let dir = TempDir::new().unwrap();
    let session = shared_session(&dir);

    for scan in 1..=50u32 {
        session
            .add_scan(ScanRecord::new(scan, 1, scan as f64, points_for(scan)))
            .unwrap();
    }

    let reads = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..6)
        .map(|_| {
            let session = session.clone();
            let reads = reads.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let scan = rand::random::<u32>() % 50 + 1;
                    let points = session.scan_data_points(scan).unwrap();
                    assert_eq!(points, points_for(scan));
                    reads.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..2u32)
        .map(|thread_id| {
            let session = session.clone();
            std::thread::spawn(move || {
                for i in 0..100u32 {
                    let scan = 1000 + thread_id * 100 + i;
                    session
                        .add_scan(ScanRecord::new(scan, 2, scan as f64, points_for(scan)))
                        .unwrap();
                }
            })
        })
        .collect();

    for h in readers.into_iter().chain(writers) {
        h.join().unwrap();
    }

    assert_eq!(reads.load(Ordering::Relaxed), 6 * 200);
    assert_eq!(session.scan_count(), 250);
}

#[test]
fn test_concurrent_deletes() {
    let dir = TempDir::new().unwrap();
    let session = shared_session(&dir);

    let ids: Vec<_> = (0..100u32)
        .map(|i| session.store_data_points(&points_for(i)).unwrap())
        .collect();
    let file_len = session.store().file_len();

    let handles: Vec<_> = (0..10usize)
        .map(|thread_id| {
            let session = session.clone();
            let chunk = ids[thread_id * 10..(thread_id + 1) * 10].to_vec();
            std::thread::spawn(move || {
                for id in chunk {
                    session.remove_data_points(id).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert!(session.store().is_empty());
    assert_eq!(session.store().file_len(), file_len);

    // IDs keep increasing past the deleted range
    let next = session.store_data_points(&[]).unwrap();
    assert!(next > *ids.last().unwrap());
}

#[test]
fn test_snapshot_consistent_during_import() {
    let dir = TempDir::new().unwrap();
    let session = shared_session(&dir);
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let session = session.clone();
        let done = done.clone();
        std::thread::spawn(move || {
            for scan in 1..=2000u32 {
                session
                    .add_scan(ScanRecord::new(scan, 1, scan as f64, points_for(scan)))
                    .unwrap();
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut snapshots = 0;
    while !done.load(Ordering::Acquire) {
        let snapshot = session.snapshot().unwrap();
        for handle in &snapshot.scans {
            assert!(
                snapshot.store.offsets.contains_key(&handle.storage_id),
                "scan {} refers to storage ID {} missing from the snapshot",
                handle.scan_number,
                handle.storage_id
            );
        }
        snapshots += 1;
    }
    writer.join().unwrap();

    let last = session.snapshot().unwrap();
    assert_eq!(last.scans.len(), 2000);
    assert_eq!(last.store.len(), 2000);
    assert!(snapshots > 0);
}

#[test]
fn test_close_while_registering() {
    let dir = TempDir::new().unwrap();
    let session = shared_session(&dir);

    let workers: Vec<_> = (0..4u32)
        .map(|thread_id| {
            let session = session.clone();
            std::thread::spawn(move || {
                for i in 0..u32::MAX {
                    let scan = thread_id * 1_000_000 + i + 1;
                    let result = if thread_id % 2 == 0 {
                        session
                            .add_scan(ScanRecord::new(scan, 1, i as f64, points_for(scan)))
                            .map(|_| ())
                    } else {
                        session
                            .store_data_points(&points_for(scan))
                            .and_then(|id| {
                                session.register_scan(ScanHandle::new(scan, 2, i as f64, id))
                            })
                    };

                    if let Err(e) = result {
                        assert!(matches!(e, ScanStoreError::StoreClosed), "{}", e);
                        return;
                    }
                }
            })
        })
        .collect();

    while session.scan_count() < 200 && !workers.iter().all(|w| w.is_finished()) {
        std::thread::yield_now();
    }
    session.close();

    for h in workers {
        h.join().unwrap();
    }

    // Nothing registered after close survives it
    assert!(session.is_closed());
    assert_eq!(session.scan_count(), 0);
    assert!(session.index().is_empty());
}
