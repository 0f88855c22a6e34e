use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use filehash_core::{Algorithm, ContentHasher, FileGroup, GroupProcessor, Options};
use filehash_store_memory::MemoryStore;

fn bench_content_hash(c: &mut Criterion) {
    let medium = vec![7u8; 1024 * 1024];

    let mut group = c.benchmark_group("content_hash_1mb");
    for algorithm in [Algorithm::Md5, Algorithm::Sha256, Algorithm::Blake3] {
        group.bench_function(algorithm.to_string(), |b| {
            b.iter(|| {
                let mut hasher = ContentHasher::new(algorithm, 10, None, None);
                for chunk in medium.chunks(64 * 1024) {
                    hasher.update(chunk);
                }
                hasher.finish()
            });
        });
    }
    group.finish();
}

fn bench_process_group(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let rt_handle = &rt;
    let store = Arc::new(MemoryStore::default());

    let sources: Vec<String> = (0..200).map(|i| format!("css/file{i}.css")).collect();
    for (i, source) in sources.iter().enumerate() {
        store.insert(&format!("static/{source}"), vec![(i % 251) as u8; 16 * 1024]);
    }
    let group = FileGroup::new(sources).with_cwd("static").with_dest("dist");
    let processor = GroupProcessor::new(store, &Options::default()).unwrap();

    c.bench_function("process_group_200_files", |b| {
        b.iter(|| {
            rt_handle.block_on(async {
                let _ = processor.process(&group).await.unwrap();
            });
        });
    });
}

criterion_group!(fingerprint, bench_content_hash, bench_process_group);
criterion_main!(fingerprint);
