//! Concurrent registry writers through the file-backed storage

use std::sync::{Arc, Barrier};
use std::thread;

use conduit_components::{ComponentManager, ComponentMetadata, EntryPoint, JsonFileStorage, PackageId};
use tempfile::tempdir;

const THREADS: usize = 6;
const ROUNDS: usize = 5;

fn metadata(thread_id: usize) -> ComponentMetadata {
    ComponentMetadata::new(PackageId::parse(&format!("vendor/t{thread_id}")).unwrap())
        .with_entry_points(vec![EntryPoint::new(format!("T{thread_id}\\Provider"))])
        .with_field("thread", thread_id)
}

#[test]
fn concurrent_registrations_never_lose_updates_or_mix_records() {
    let dir = tempdir().unwrap();
    let path = Arc::new(dir.path().join("components.json"));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|thread_id| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Separate storage per thread, as separate processes would have.
                let manager = ComponentManager::new(JsonFileStorage::new(path.as_path()));
                barrier.wait();
                for round in 0..ROUNDS {
                    manager
                        .register("shared", metadata(thread_id), "^1.0")
                        .unwrap();
                    manager
                        .register(&format!("own-{thread_id}-{round}"), metadata(thread_id), "^1.0")
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer thread should not panic");
    }

    let manager = ComponentManager::new(JsonFileStorage::new(path.as_path()));
    let components = manager.list().unwrap();
    assert_eq!(components.len(), THREADS * ROUNDS + 1);

    // Whoever wrote last, the shared record is entirely theirs.
    let shared = manager.get("shared").unwrap().unwrap();
    let writer = shared.metadata["thread"].as_u64().unwrap() as usize;
    assert_eq!(shared.package_id.as_str(), format!("vendor/t{writer}"));
    assert_eq!(
        shared.entry_points,
        vec![EntryPoint::new(format!("T{writer}\\Provider"))]
    );

    for component in components.iter().filter(|c| c.name != "shared") {
        let owner = component.metadata["thread"].as_u64().unwrap() as usize;
        assert!(component.name.starts_with(&format!("own-{owner}-")), "{}", component.name);
    }
}

#[test]
fn concurrent_unregister_and_register_leave_valid_registry() {
    let dir = tempdir().unwrap();
    let path = Arc::new(dir.path().join("components.json"));
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let path = Arc::clone(&path);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let manager = ComponentManager::new(JsonFileStorage::new(path.as_path()));
            barrier.wait();
            for _ in 0..20 {
                manager.register("flip", metadata(1), "^1.0").unwrap();
            }
        })
    };
    let remover = {
        let path = Arc::clone(&path);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let manager = ComponentManager::new(JsonFileStorage::new(path.as_path()));
            barrier.wait();
            for _ in 0..20 {
                manager.unregister("flip").unwrap();
            }
        })
    };
    writer.join().unwrap();
    remover.join().unwrap();

    // Whatever the interleaving, the file still loads cleanly.
    let manager = ComponentManager::new(JsonFileStorage::new(path.as_path()));
    let components = manager.list().unwrap();
    assert!(components.len() <= 1);
}
