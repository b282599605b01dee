//! Benchmark the reconcile walk over a large tree.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::mpsc;
use std::sync::mpsc::sync_channel;
use tempfile::TempDir;

use duplexd::fs_adapter::LocalFsAdapter;
use duplexd::path_rules::PathRules;
use duplexd::reconciler::Reconciler;
use duplexd::update::{InboxItem, InitialScanDone, Side, Update};

fn populate_inbox(tx: &mpsc::Sender<InboxItem>, file_count: usize) {
    for i in 0..file_count {
        let path = format!("dir{}/file{}.txt", i % 20, i);
        tx.send(InboxItem::Update {
            side: Side::Local,
            update: Update::new(path, i as i64, false),
        })
        .unwrap();
    }
    tx.send(InboxItem::ScanDone(InitialScanDone(Side::Local))).unwrap();
    tx.send(InboxItem::ScanDone(InitialScanDone(Side::Remote))).unwrap();
}

fn benchmark_reconcile_large_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_large_scan");
    for &file_count in &[100usize, 1_000, 5_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(file_count),
            &file_count,
            |b, &file_count| {
                b.iter(|| {
                    let dir = TempDir::new().unwrap();
                    let (inbox_tx, inbox_rx) = mpsc::channel();
                    let (outbound_tx, outbound_rx) = sync_channel(file_count + 1);
                    let (fs_tx, fs_rx) = sync_channel(file_count + 1);
                    let mut reconciler = Reconciler::new(
                        dir.path().to_path_buf(),
                        LocalFsAdapter::new(50),
                        PathRules::empty(),
                        PathRules::empty(),
                        inbox_rx,
                        outbound_tx,
                        fs_tx,
                        50,
                    );
                    populate_inbox(&inbox_tx, file_count);
                    drop(inbox_tx);
                    reconciler.run().unwrap();
                    black_box((outbound_rx.try_iter().count(), fs_rx.try_iter().count()));
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_reconcile_large_scan);
criterion_main!(benches);
