use vk_wrapper::Entry;

#[test]
#[ignore = "requires a Vulkan loader"]
fn instance_without_surface() {
    let entry = Entry::new().unwrap();
    let instance = entry.create_instance("device-smoke-test", None, false);
    assert!(instance.is_ok(), "{:?}", instance.err());
}

#[cfg(target_os = "linux")]
#[test]
#[ignore = "requires a Vulkan device and a display"]
fn small_buffers_share_memory_blocks() {
    use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
    use vk_wrapper::{BufferUsageFlags, ImageUsageFlags};
    use winit::event_loop::EventLoopBuilder;
    use winit::platform::x11::EventLoopBuilderExtX11;
    use winit::window::WindowBuilder;

    let event_loop = EventLoopBuilder::new().with_any_thread(true).build();
    let window = WindowBuilder::new().with_visible(false).build(&event_loop).unwrap();

    let entry = Entry::new().unwrap();
    let instance = entry
        .create_instance("device-smoke-test", Some(window.raw_display_handle()), false)
        .unwrap();
    let surface = instance
        .create_surface(window.raw_display_handle(), window.raw_window_handle())
        .unwrap();
    let adapter = instance.enumerate_adapters(&surface).unwrap().remove(0);
    let device = adapter.create_device().unwrap();

    let mut a = device.create_host_buffer::<u32>(BufferUsageFlags::UNIFORM, 64).unwrap();
    let b = device.create_host_buffer::<u32>(BufferUsageFlags::UNIFORM, 64).unwrap();
    a.write(0, &[7; 64]);

    let (memory_a, offset_a) = a.raw().memory_range();
    let (memory_b, offset_b) = b.raw().memory_range();
    assert_eq!(memory_a, memory_b);
    assert_ne!(offset_a, offset_b);

    let image = device
        .create_image_2d(vk_wrapper::vk::Format::R8G8B8A8_UNORM, ImageUsageFlags::SAMPLED, (16, 16))
        .unwrap();
    assert_eq!(image.size(), (16, 16));

    drop((a, b, image));
    drop(device);
}
