//! Lookup benchmarks for the Ketama locator.

use std::sync::Arc;

use corelib::locator::{LocatorBuilder, NodeLocator};
use corelib::node::SimpleNode;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build(count: usize) -> corelib::KetamaNodeLocator<SimpleNode> {
    LocatorBuilder::new()
        .add_nodes((0..count).map(|i| Arc::new(SimpleNode::new(format!("10.0.{}.{}:11211", i / 256, i % 256)))))
        .build()
        .expect("valid locator")
}

fn bench_primary(c: &mut Criterion) {
    let locator = build(64);
    let keys: Vec<String> = (0..1024).map(|i| format!("user:{}", i)).collect();
    c.bench_function("primary_64_nodes", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % keys.len();
            black_box(locator.primary(&keys[i]).ok())
        })
    });
}

fn bench_sequence(c: &mut Criterion) {
    let locator = build(16);
    c.bench_function("sequence_16_nodes", |b| {
        b.iter(|| black_box(locator.sequence("user:42").count()))
    });
}

fn bench_update(c: &mut Criterion) {
    let locator = build(32);
    c.bench_function("attach_detach_one_node", |b| {
        b.iter(|| {
            let node = vec![Arc::new(SimpleNode::new("10.9.9.9:11211"))];
            locator.update(node.clone(), vec![]).ok();
            locator.update(vec![], node).ok();
        })
    });
}

criterion_group!(benches, bench_primary, bench_sequence, bench_update);
criterion_main!(benches);
