use super::mock::MockBackend;
use crate::asset::{
    promise, AssetError, AssetManager, AssetTaskManager, Assets, TextureCreateArgs, TextureLoadArgs,
};
use common::MO_RELAXED;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::{env, fs, process};

fn create_manager(
    thread_count: usize,
    load_delay: Duration,
) -> (Arc<MockBackend>, Arc<AssetTaskManager<MockBackend>>, AssetManager<MockBackend>) {
    let backend = MockBackend::new();
    *backend.load_delay.lock() = load_delay;

    let assets = Arc::new(Assets::new());
    let tasks = Arc::new(AssetTaskManager::new(Arc::clone(&backend), assets, thread_count));
    tasks.start_threads().unwrap();
    let manager = AssetManager::new(Arc::clone(&tasks));
    (backend, tasks, manager)
}

fn texture_args(path: &str, p: Option<promise::Promise<crate::asset::TextureInfo>>) -> TextureLoadArgs {
    TextureLoadArgs {
        path: PathBuf::from(path),
        promise: p,
    }
}

#[test]
fn duplicate_requests_load_once() {
    let (backend, tasks, manager) = create_manager(2, Duration::from_millis(50));
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                manager
                    .request_texture("textures/stone.png", TextureCreateArgs::default())
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let id = results[0].0;
    for (other_id, future) in results {
        assert_eq!(other_id, id);
        let info = future.wait().unwrap();
        assert_eq!((info.id, info.width, info.height), (id, 16, 8));
    }

    assert_eq!(backend.texture_loads.load(MO_RELAXED), 1);
    assert_eq!(tasks.assets().textures.len(), 1);

    // Already loaded: resolves immediately without another load.
    let (again, future) = manager
        .request_texture("textures/stone.png", TextureCreateArgs::default())
        .unwrap();
    assert_eq!(again, id);
    assert!(future.try_get().unwrap().is_ok());
    assert_eq!(backend.texture_loads.load(MO_RELAXED), 1);
}

#[test]
fn different_paths_get_different_ids() {
    let (_backend, _tasks, manager) = create_manager(2, Duration::ZERO);

    let (a, fa) = manager.request_texture("a.png", Default::default()).unwrap();
    let (b, fb) = manager.request_texture("b.png", Default::default()).unwrap();
    let (m, fm) = manager.request_model("cube.glb").unwrap();

    assert_ne!(a, b);
    assert!(fa.wait().is_ok());
    assert!(fb.wait().is_ok());
    assert_eq!(fm.wait().unwrap().id, m);
}

#[test]
fn failed_load_reports_error_and_can_be_retried() {
    let (_backend, tasks, manager) = create_manager(1, Duration::ZERO);

    let (id, future) = manager.request_texture("missing.png", Default::default()).unwrap();
    assert!(matches!(future.wait(), Err(AssetError::Io(_))));
    assert!(tasks.assets().textures.get(id).is_none());
    assert!(!tasks.assets().textures.is_pending(id));

    let (retry_id, future) = manager.request_texture("missing.png", Default::default()).unwrap();
    assert_eq!(retry_id, id);
    assert!(future.wait().is_err());
}

#[test]
fn duplicate_id_is_rejected() {
    let (_backend, tasks, _manager) = create_manager(1, Duration::from_millis(20));

    tasks
        .load_texture(3, texture_args("a.png", None), Default::default())
        .unwrap();

    let (p, future) = promise::promise();
    let err = tasks
        .load_texture(3, texture_args("b.png", Some(p)), Default::default())
        .unwrap_err();
    assert!(matches!(err, AssetError::DuplicateId(3)));
    assert!(matches!(future.wait(), Err(AssetError::DuplicateId(3))));
}

#[test]
fn cancel_fulfills_queued_promises() {
    let (backend, tasks, _manager) = create_manager(1, Duration::from_millis(100));

    let futures: Vec<_> = (0..4)
        .map(|id| {
            let (p, future) = promise::promise();
            tasks
                .load_texture(id, texture_args("tex.png", Some(p)), Default::default())
                .unwrap();
            future
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    tasks.cancel_threads();

    let mut loaded = 0;
    let mut canceled = 0;
    for future in &futures {
        match future.wait_timeout(Duration::from_secs(1)) {
            Some(Ok(_)) => loaded += 1,
            Some(Err(AssetError::Canceled)) => canceled += 1,
            other => panic!("unexpected outcome: {:?}", other.map(|r| r.map(|i| i.id))),
        }
    }

    assert_eq!(loaded, backend.texture_loads.load(MO_RELAXED));
    assert!(canceled >= 2);
    assert_eq!(loaded + canceled, 4);
    assert!(!tasks.is_running());
}

#[test]
fn stopped_pool_keeps_jobs() {
    let (_backend, tasks, _manager) = create_manager(2, Duration::ZERO);
    tasks.stop_threads();

    let (p, future) = promise::promise();
    tasks
        .load_texture(0, texture_args("late.png", Some(p)), Default::default())
        .unwrap();
    assert_eq!(tasks.pending_jobs(), 1);
    assert!(future.wait_timeout(Duration::from_millis(30)).is_none());

    tasks.start_threads().unwrap();
    assert!(future.wait().is_ok());
    assert_eq!(tasks.pending_jobs(), 0);
}

#[test]
fn spine_registers_page_texture() {
    let dir = env::temp_dir().join(format!("spine-test-{}", process::id()));
    fs::create_dir_all(&dir).unwrap();

    let atlas_path = dir.join("hero.atlas");
    let skeleton_path = dir.join("hero.json");
    fs::write(
        &atlas_path,
        "\nhero.png\nsize: 128,64\nformat: RGBA8888\nbody\n  xy: 0, 0\n  size: 32, 64\n",
    )
    .unwrap();
    fs::write(
        &skeleton_path,
        r#"{ "skeleton": { "width": 30, "height": 60 }, "bones": [ { "name": "root" } ],
             "slots": [ { "name": "body", "bone": "root", "attachment": "body" } ] }"#,
    )
    .unwrap();

    let (backend, tasks, manager) = create_manager(1, Duration::ZERO);
    let (id, future) = manager
        .request_spine(&atlas_path, &skeleton_path, Default::default())
        .unwrap();

    let info = future.wait().unwrap();
    assert_eq!(info.spine_id, id);
    assert_eq!((info.width, info.height), (30, 60));

    let spine = tasks.assets().spines.get(id).unwrap();
    assert_eq!(spine.texture_id, info.texture_id);
    assert!(tasks.assets().textures.get(info.texture_id).is_some());
    assert_eq!(backend.loaded_paths.lock().as_slice(), &[dir.join("hero.png")]);

    let (again, future) = manager
        .request_spine(&atlas_path, &skeleton_path, Default::default())
        .unwrap();
    assert_eq!(again, id);
    assert_eq!(future.wait().unwrap().texture_id, info.texture_id);

    fs::remove_dir_all(&dir).ok();
}
