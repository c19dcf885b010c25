mod scene;

use crate::scene::Scene;
use common::log::{error, info};
use engine::raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use engine::{RenderSettings, Renderer, VulkanRenderSystem};
use simple_logger::SimpleLogger;
use std::env;
use std::process;
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

pub const PROGRAM_NAME: &str = "frame-pipeline-demo";

fn parking_lot_deadlock_detection() {
    use common::parking_lot::deadlock;
    use std::thread;
    use std::time::Duration;

    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(5));

        let deadlocks = deadlock::check_deadlock();
        if deadlocks.is_empty() {
            continue;
        }

        println!("{} deadlocks detected", deadlocks.len());
        for (i, threads) in deadlocks.iter().enumerate() {
            println!("Deadlock #{}", i);
            for t in threads {
                println!("Thread Id {:#?}", t.thread_id());
                println!("{:#?}", t.backtrace());
            }
        }
    });
}

fn load_settings() -> RenderSettings {
    match env::args().nth(1) {
        Some(path) => match RenderSettings::from_yaml_file(&path) {
            Ok(settings) => settings,
            Err(err) => {
                error!("{}: {}, using defaults", path, err);
                RenderSettings::default()
            }
        },
        None => RenderSettings::default(),
    }
}

fn main() {
    parking_lot_deadlock_detection();

    SimpleLogger::new()
        .with_level(common::log::LevelFilter::Debug)
        .init()
        .unwrap();

    let settings = load_settings();
    let model_path = env::args().nth(2);

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(PROGRAM_NAME)
        .with_inner_size(PhysicalSize::new(1280, 720))
        .build(&event_loop)
        .unwrap();

    let size = window.inner_size();
    let mut renderer = match VulkanRenderSystem::initialize(
        window.raw_display_handle(),
        window.raw_window_handle(),
        (size.width, size.height),
        &settings,
    ) {
        Ok(renderer) => renderer,
        Err(err) => {
            error!("Failed to initialize renderer: {}", err);
            process::exit(1);
        }
    };

    let mut scene = match Scene::load(renderer.asset_manager(), model_path.as_deref()) {
        Ok(scene) => scene,
        Err(err) => {
            error!("Failed to request scene assets: {}", err);
            process::exit(1);
        }
    };

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                WindowEvent::Resized(size) => renderer.resize((size.width, size.height)),
                _ => {}
            },
            Event::MainEventsCleared => window.request_redraw(),
            Event::RedrawRequested(_) => {
                scene.poll_assets();
                if let Err(err) = scene.render(&mut renderer) {
                    error!("Frame failed: {}", err);
                    *control_flow = ControlFlow::Exit;
                }
            }
            Event::LoopDestroyed => {
                renderer.shutdown();
                info!("Exiting");
            }
            _ => {}
        }
    });
}
