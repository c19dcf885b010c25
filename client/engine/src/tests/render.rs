use super::mock::{Event, MockBackend, MockTexture};
use super::{create_system, register_textures};
use crate::render::{
    FrameStatus, GlyphBatch, ModelBatch, Renderer, SpineSpriteBatch, SpriteBatch, TaskKind,
};
use common::glm::{self, Vec2, Vec3, Vec4};
use common::MO_RELAXED;
use rand::Rng;
use std::thread;
use std::time::{Duration, Instant};

fn sprite(texture_id: u32) -> SpriteBatch {
    SpriteBatch {
        texture_id,
        positions: vec![Vec3::zeros()],
        sizes: vec![Vec2::new(1.0, 1.0)],
    }
}

fn model(texture_id: u32) -> ModelBatch {
    ModelBatch {
        model_id: 0,
        texture_id,
        positions: vec![Vec3::new(0.0, 0.0, -5.0)],
    }
}

fn glyph(texture_id: u32) -> GlyphBatch {
    GlyphBatch {
        texture_id,
        positions: vec![Vec3::zeros()],
        sizes: vec![Vec2::new(8.0, 16.0)],
        fg_colors: vec![Vec4::new(1.0, 1.0, 1.0, 1.0)],
        bg_colors: vec![Vec4::zeros()],
        uv_rects: vec![],
    }
}

fn spine(texture_id: u32) -> SpineSpriteBatch {
    SpineSpriteBatch {
        spine_id: 0,
        texture_id,
        positions: vec![Vec3::zeros()],
        sizes: vec![Vec2::new(64.0, 64.0)],
    }
}

#[test]
fn buffers_follow_issue_order() {
    let (backend, mut system) = create_system(3, 4);
    backend.jitter.store(true, MO_RELAXED);
    register_textures(&system, 0..16);

    let mut rng = rand::thread_rng();

    for _ in 0..10 {
        assert_eq!(system.begin_frame().unwrap(), FrameStatus::Busy);

        let identity: glm::Mat4 = glm::identity();
        system.update_frame_uniforms(&identity, &identity, &identity, &identity);

        let n = rng.gen_range(1..16);
        let mut expected = vec![];
        for tag in 0..n {
            let kind = match rng.gen_range(0..5) {
                0 => {
                    system.draw_models(vec![model(tag)]);
                    TaskKind::Models
                }
                1 => {
                    system.draw_sprites(vec![sprite(tag)]);
                    TaskKind::Sprites
                }
                2 => {
                    system.draw_billboards(vec![sprite(tag)]);
                    TaskKind::Billboards
                }
                3 => {
                    system.draw_glyphs(vec![glyph(tag)]);
                    TaskKind::Glyphs
                }
                _ => {
                    system.draw_spines(vec![spine(tag)]);
                    TaskKind::Spines
                }
            };
            expected.push((kind, tag));
        }

        system.end_frame().unwrap();
        assert_eq!(system.status(), FrameStatus::Ready);

        let submitted: Vec<_> = system
            .presenter()
            .submissions
            .last()
            .unwrap()
            .iter()
            .map(|cmd| (cmd.kind, cmd.tag))
            .collect();
        assert_eq!(submitted, expected);
    }
}

#[test]
fn models_then_sprite_are_submitted_together() {
    let (_backend, mut system) = create_system(2, 2);
    register_textures(&system, 0..4);

    assert_eq!(system.begin_frame().unwrap(), FrameStatus::Busy);
    system.draw_models(vec![model(1), model(2), model(3)]);
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();

    let presenter = system.presenter();
    assert_eq!(presenter.submissions.len(), 1);
    assert_eq!(presenter.fence_resets, 1);

    let kinds: Vec<_> = presenter.submissions[0].iter().map(|cmd| cmd.kind).collect();
    assert_eq!(kinds, vec![TaskKind::Models, TaskKind::Sprites]);
    assert_eq!(presenter.submissions[0][0].tag, 1);
}

#[test]
fn end_frame_waits_for_slow_tasks() {
    let (backend, mut system) = create_system(2, 2);
    register_textures(&system, 0..1);
    *backend.slow_kind.lock() = Some((TaskKind::Models, Duration::from_millis(150)));

    system.begin_frame().unwrap();
    let start = Instant::now();
    system.draw_models(vec![model(0)]);
    system.draw_sprites(vec![sprite(0)]);
    assert!(!system.render_tasks().check_tasks_complete());

    system.end_frame().unwrap();
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert_eq!(system.presenter().submissions[0].len(), 2);
}

#[test]
fn frame_slots_are_reused_only_after_retire() {
    let (_backend, mut system) = create_system(2, 3);
    register_textures(&system, 0..1);

    for _ in 0..7 {
        assert_eq!(system.begin_frame().unwrap(), FrameStatus::Busy);
        system.draw_sprites(vec![sprite(0)]);
        system.draw_sprites(vec![sprite(0)]);
        system.end_frame().unwrap();
    }

    let backend = system.backend().clone();
    let mut retired = vec![true; 2];
    for event in backend.events() {
        match event {
            Event::Submit { slot, .. } => retired[slot] = false,
            Event::WaitFrame(slot) => retired[slot] = true,
            Event::Execute { slot, .. } | Event::Rebuild { slot, .. } => {
                assert!(retired[slot], "slot {} recorded while in flight", slot)
            }
        }
    }
    assert_eq!(system.presenter().submitted_slots, vec![0, 1, 0, 1, 0, 1, 0]);
}

#[test]
fn frame_without_textures_is_discarded() {
    let (_backend, mut system) = create_system(2, 2);

    assert_eq!(system.begin_frame().unwrap(), FrameStatus::Discarded);
    system.draw_sprites(vec![sprite(0)]);
    system.draw_models(vec![model(0)]);
    system.draw_glyphs(vec![glyph(0)]);
    assert_eq!(system.render_tasks().queued_jobs(), 0);
    assert!(!system.render_tasks().check_tasks_complete());

    system.end_frame().unwrap();
    assert_eq!(system.status(), FrameStatus::Discarded);
    assert!(system.presenter().submissions.is_empty());
}

fn executed(backend: &MockBackend) -> usize {
    backend
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Execute { .. }))
        .count()
}

fn rebuilds(backend: &MockBackend) -> usize {
    backend
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Rebuild { .. }))
        .count()
}

#[test]
fn calls_after_end_frame_are_dropped() {
    let (backend, mut system) = create_system(2, 2);
    register_textures(&system, 0..1);

    system.begin_frame().unwrap();
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();
    assert_eq!(executed(&backend), 1);

    let identity: glm::Mat4 = glm::identity();
    system.draw_sprites(vec![sprite(0)]);
    system.draw_models(vec![model(0)]);
    system.update_frame_uniforms(&identity, &identity, &identity, &identity);
    assert_eq!(system.render_tasks().queued_jobs(), 0);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(executed(&backend), 1);

    assert_eq!(system.begin_frame().unwrap(), FrameStatus::Busy);
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();
    assert_eq!(executed(&backend), 2);
    assert_eq!(system.presenter().submissions[1].len(), 1);
}

#[test]
fn calls_after_failed_begin_frame_are_dropped() {
    let (backend, mut system) = create_system(2, 2);
    register_textures(&system, 0..1);

    // Render threads are running from here on.
    system.begin_frame().unwrap();
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();

    system.presenter_mut().failed_waits = 1;
    assert!(system.begin_frame().is_err());
    assert_eq!(system.status(), FrameStatus::Discarded);

    let identity: glm::Mat4 = glm::identity();
    system.update_frame_uniforms(&identity, &identity, &identity, &identity);
    system.draw_sprites(vec![sprite(0)]);
    system.draw_glyphs(vec![glyph(0)]);
    assert_eq!(system.render_tasks().queued_jobs(), 0);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(executed(&backend), 1);

    system.end_frame().unwrap();
    assert_eq!(system.presenter().submissions.len(), 1);

    assert_eq!(system.begin_frame().unwrap(), FrameStatus::Busy);
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();
    assert_eq!(system.presenter().submissions.len(), 2);
    assert_eq!(system.presenter().submissions[1].len(), 1);
}

#[test]
fn panicking_task_fails_the_frame() {
    let (backend, mut system) = create_system(2, 1);
    register_textures(&system, 0..2);
    *backend.panic_tag.lock() = Some(1);

    system.begin_frame().unwrap();
    system.draw_sprites(vec![sprite(0)]);
    system.draw_sprites(vec![sprite(1)]);
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();
    assert!(system.render_tasks().frame_failed());
    assert!(system.presenter().submissions[0].is_empty());

    // The single render thread survived the panic.
    *backend.panic_tag.lock() = None;
    system.begin_frame().unwrap();
    system.draw_sprites(vec![sprite(1)]);
    system.end_frame().unwrap();
    assert!(!system.render_tasks().frame_failed());
    assert_eq!(system.presenter().submissions[1].len(), 1);
}

#[test]
fn mid_frame_rebuild_is_not_repeated() {
    let (backend, mut system) = create_system(2, 1);
    register_textures(&system, 0..1);
    *backend.slow_kind.lock() = Some((TaskKind::Sprites, Duration::from_millis(200)));

    system.begin_frame().unwrap();
    // The worker snapshots before texture 1 exists, then finds it registered while recording.
    system.draw_sprites(vec![sprite(1)]);
    thread::sleep(Duration::from_millis(50));
    register_textures(&system, 1..2);
    system.draw_billboards(vec![sprite(1)]);
    system.end_frame().unwrap();

    assert!(!system.render_tasks().frame_failed());
    assert_eq!(system.presenter().submissions[0].len(), 2);
    assert_eq!(rebuilds(&backend), 2);
}

#[test]
fn out_of_date_acquire_discards_and_recreates() {
    let (_backend, mut system) = create_system(2, 2);
    register_textures(&system, 0..1);

    system.begin_frame().unwrap();
    system.end_frame().unwrap();

    // Next frame starts on slot 1; acquiring fails and the swapchain is rebuilt.
    system.presenter_mut().out_of_date_acquires = 1;
    assert_eq!(system.begin_frame().unwrap(), FrameStatus::Discarded);
    system.draw_sprites(vec![sprite(0)]);
    assert_eq!(system.render_tasks().queued_jobs(), 0);
    system.end_frame().unwrap();

    assert_eq!(system.presenter().recreations, 1);
    assert_eq!(system.frame_slot(), 0);

    assert_eq!(system.begin_frame().unwrap(), FrameStatus::Busy);
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();
    assert_eq!(system.presenter().submitted_slots, vec![0, 0]);
}

#[test]
fn failed_task_presents_empty_frame() {
    let (_backend, mut system) = create_system(2, 2);
    register_textures(&system, 0..1);

    system.begin_frame().unwrap();
    system.draw_sprites(vec![sprite(0)]);
    system.draw_sprites(vec![sprite(42)]);
    system.end_frame().unwrap();
    assert!(system.render_tasks().frame_failed());
    assert!(system.presenter().submissions[0].is_empty());

    system.begin_frame().unwrap();
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();
    assert!(!system.render_tasks().frame_failed());
    assert_eq!(system.presenter().submissions[1].len(), 1);
}

#[test]
fn textures_registered_between_frames_are_visible() {
    let (backend, mut system) = create_system(3, 3);

    for id in 0..12 {
        system
            .assets()
            .textures
            .register(id, MockTexture { size: (4, 4) })
            .unwrap();

        assert_eq!(system.begin_frame().unwrap(), FrameStatus::Busy);
        for _ in 0..6 {
            system.draw_sprites(vec![sprite(id)]);
        }
        system.end_frame().unwrap();
        assert!(!system.render_tasks().frame_failed(), "texture {} not visible", id);
        assert_eq!(system.presenter().submissions.last().unwrap().len(), 6);
    }

    let rebuilds = backend
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Rebuild { .. }))
        .count();
    assert!(rebuilds >= 12);
}

#[test]
fn textures_loaded_during_frames_are_visible() {
    let (backend, mut system) = create_system(3, 3);
    *backend.load_delay.lock() = Duration::from_millis(3);

    let mut futures = vec![];
    for i in 0..8 {
        let (id, future) = system
            .asset_manager()
            .request_texture(format!("textures/{}.png", i), Default::default())
            .unwrap();
        futures.push((id, future));
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while system.assets().textures.len() < futures.len() {
        assert!(Instant::now() < deadline, "textures never finished loading");

        let loaded: Vec<u32> = futures
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| system.assets().textures.get(*id).is_some())
            .collect();

        if system.begin_frame().unwrap() == FrameStatus::Busy {
            for &id in &loaded {
                system.draw_sprites(vec![sprite(id)]);
            }
            system.end_frame().unwrap();
            assert!(!system.render_tasks().frame_failed());
        } else {
            system.end_frame().unwrap();
            thread::sleep(Duration::from_millis(1));
        }
    }

    for (_, future) in futures {
        assert!(future.wait().is_ok());
    }
}

#[test]
fn resize_recreates_after_present() {
    let (_backend, mut system) = create_system(2, 1);
    register_textures(&system, 0..1);

    system.resize((1024, 512));
    system.begin_frame().unwrap();
    system.end_frame().unwrap();

    assert_eq!(system.presenter().recreations, 1);
    approx::assert_abs_diff_eq!(system.aspect_ratio(), 2.0);
}

#[test]
fn zero_extent_pauses_rendering() {
    let (_backend, mut system) = create_system(2, 1);
    register_textures(&system, 0..1);

    system.resize((0, 0));
    system.begin_frame().unwrap();
    system.end_frame().unwrap();
    assert_eq!(system.presenter().submissions.len(), 1);

    assert_eq!(system.begin_frame().unwrap(), FrameStatus::Discarded);
    system.end_frame().unwrap();

    system.resize((640, 480));
    assert_eq!(system.begin_frame().unwrap(), FrameStatus::Busy);
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();
    assert_eq!(system.presenter().submissions.len(), 2);
}

#[test]
#[should_panic]
fn begin_frame_twice_panics() {
    let (_backend, mut system) = create_system(2, 1);
    register_textures(&system, 0..1);

    system.begin_frame().unwrap();
    let _ = system.begin_frame();
}

#[test]
fn shutdown_is_idempotent() {
    let (_backend, mut system) = create_system(2, 2);
    register_textures(&system, 0..1);

    system.begin_frame().unwrap();
    system.draw_sprites(vec![sprite(0)]);
    system.end_frame().unwrap();

    system.shutdown();
    system.shutdown();
    assert!(!system.asset_tasks().is_running());
}
