mod assets;
mod device;
mod mock;
mod render;

use crate::render::RenderSystem;
use crate::settings::RenderSettings;
use mock::{MockBackend, MockPresenter, MockTexture};
use std::sync::Arc;

type MockSystem = RenderSystem<MockBackend, MockPresenter>;

fn settings(render_threads: usize) -> RenderSettings {
    RenderSettings {
        render_threads,
        asset_threads: 2,
        ..Default::default()
    }
}

fn create_system(frame_count: usize, render_threads: usize) -> (Arc<MockBackend>, MockSystem) {
    let backend = MockBackend::new();
    let presenter = MockPresenter::new(&backend, frame_count);
    let system = RenderSystem::new(Arc::clone(&backend), presenter, &settings(render_threads)).unwrap();
    (backend, system)
}

fn register_textures(system: &MockSystem, ids: std::ops::Range<u32>) {
    for id in ids {
        system
            .assets()
            .textures
            .register(id, MockTexture { size: (4, 4) })
            .unwrap();
    }
}
