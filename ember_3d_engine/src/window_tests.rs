use super::*;
use winit::dpi::PhysicalSize;

// ============================================================================
// WINIT TRANSLATION
// ============================================================================

#[test]
fn test_translate_resize() {
    let event = winit::event::WindowEvent::Resized(PhysicalSize::new(1024, 768));
    assert_eq!(
        translate_winit_event(&event),
        Some(WindowEvent::Resized(Extent2D::new(1024, 768)))
    );
}

#[test]
fn test_translate_minimise_to_zero_extent() {
    let event = winit::event::WindowEvent::Resized(PhysicalSize::new(0, 0));
    match translate_winit_event(&event) {
        Some(WindowEvent::Resized(extent)) => assert!(extent.is_zero()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_translate_close() {
    let event = winit::event::WindowEvent::CloseRequested;
    assert_eq!(translate_winit_event(&event), Some(WindowEvent::Quit));
}

#[test]
fn test_ignored_events() {
    let event = winit::event::WindowEvent::Focused(true);
    assert_eq!(translate_winit_event(&event), None);
}

#[test]
fn test_queue_drains_on_poll() {
    let mut queue = WinitEventQueue::new();
    queue.push_winit_event(&winit::event::WindowEvent::CloseRequested);
    queue.push_winit_event(&winit::event::WindowEvent::Focused(false));
    queue.push(WindowEvent::Resized(Extent2D::new(1, 1)));

    assert_eq!(queue.poll_events().len(), 2);
    assert!(queue.poll_events().is_empty());

    queue.set_mouse_capture(true);
    assert!(queue.mouse_capture);
}

// ============================================================================
// INPUT STATE
// ============================================================================

#[test]
fn test_keys_and_buttons() {
    let mut input = InputState::new();
    input.apply(&InputEvent::Key { code: KeyCode::KeyW, pressed: true });
    input.apply(&InputEvent::MouseButton { button: MouseButton::Left, pressed: true });

    assert!(input.is_key_down(KeyCode::KeyW));
    assert!(input.is_button_down(MouseButton::Left));

    input.apply(&InputEvent::Key { code: KeyCode::KeyW, pressed: false });
    input.apply(&InputEvent::MouseButton { button: MouseButton::Left, pressed: false });

    assert!(!input.is_key_down(KeyCode::KeyW));
    assert!(!input.is_button_down(MouseButton::Left));
}

#[test]
fn test_mouse_delta_accumulates_per_frame() {
    let mut input = InputState::new();
    input.apply(&InputEvent::CursorMoved { position: Vec2::new(10.0, 10.0) });
    assert_eq!(input.mouse_delta(), Vec2::ZERO);

    input.apply(&InputEvent::CursorMoved { position: Vec2::new(15.0, 8.0) });
    input.apply(&InputEvent::CursorMoved { position: Vec2::new(20.0, 8.0) });
    assert_eq!(input.mouse_delta(), Vec2::new(10.0, -2.0));
    assert_eq!(input.mouse_position(), Vec2::new(20.0, 8.0));

    input.begin_frame();
    assert_eq!(input.mouse_delta(), Vec2::ZERO);
    assert_eq!(input.mouse_position(), Vec2::new(20.0, 8.0));
}

#[test]
fn test_f10_toggles_capture_on_press_only() {
    let mut input = InputState::new();
    assert!(!input.mouse_captured());

    assert!(input.apply(&InputEvent::Key { code: KeyCode::F10, pressed: true }));
    assert!(input.mouse_captured());

    // key repeat while held
    assert!(!input.apply(&InputEvent::Key { code: KeyCode::F10, pressed: true }));
    assert!(!input.apply(&InputEvent::Key { code: KeyCode::F10, pressed: false }));
    assert!(input.mouse_captured());

    assert!(input.apply(&InputEvent::Key { code: KeyCode::F10, pressed: true }));
    assert!(!input.mouse_captured());
}
