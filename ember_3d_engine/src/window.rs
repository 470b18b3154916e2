//! Window events and input state
//!
//! The engine never owns the window. Each frame it polls a
//! `WindowEventSource` for resize, quit and input events and folds the
//! input into an `InputState`.

use glam::Vec2;
use rustc_hash::FxHashSet;
use winit::event::{ElementState, MouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};
use crate::graphics_device::Extent2D;

/// Event delivered to the engine once per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    /// New drawable size in pixels (zero when minimised)
    Resized(Extent2D),
    /// The user asked to close the window
    Quit,
    Input(InputEvent),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key { code: KeyCode, pressed: bool },
    MouseButton { button: MouseButton, pressed: bool },
    CursorMoved { position: Vec2 },
}

/// Source of window events, polled once per frame
pub trait WindowEventSource {
    /// Drain the events received since the last poll
    fn poll_events(&mut self) -> Vec<WindowEvent>;

    /// Lock or release the mouse cursor
    fn set_mouse_capture(&mut self, _captured: bool) {}
}

/// Map a winit window event to an engine event
pub fn translate_winit_event(event: &winit::event::WindowEvent) -> Option<WindowEvent> {
    use winit::event::WindowEvent as Winit;

    match event {
        Winit::Resized(size) => Some(WindowEvent::Resized(Extent2D::new(size.width, size.height))),
        Winit::CloseRequested => Some(WindowEvent::Quit),
        Winit::KeyboardInput { event, .. } => match event.physical_key {
            PhysicalKey::Code(code) => Some(WindowEvent::Input(InputEvent::Key {
                code,
                pressed: event.state == ElementState::Pressed,
            })),
            PhysicalKey::Unidentified(_) => None,
        },
        Winit::MouseInput { state, button, .. } => Some(WindowEvent::Input(InputEvent::MouseButton {
            button: *button,
            pressed: *state == ElementState::Pressed,
        })),
        Winit::CursorMoved { position, .. } => Some(WindowEvent::Input(InputEvent::CursorMoved {
            position: Vec2::new(position.x as f32, position.y as f32),
        })),
        _ => None,
    }
}

/// Buffers translated winit events between an application handler and the engine
#[derive(Debug, Default)]
pub struct WinitEventQueue {
    events: Vec<WindowEvent>,
    /// Last capture state requested by the engine
    pub mouse_capture: bool,
}

impl WinitEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a winit event if the engine cares about it
    pub fn push_winit_event(&mut self, event: &winit::event::WindowEvent) {
        if let Some(event) = translate_winit_event(event) {
            self.events.push(event);
        }
    }

    pub fn push(&mut self, event: WindowEvent) {
        self.events.push(event);
    }
}

impl WindowEventSource for WinitEventQueue {
    fn poll_events(&mut self) -> Vec<WindowEvent> {
        std::mem::take(&mut self.events)
    }

    fn set_mouse_capture(&mut self, captured: bool) {
        self.mouse_capture = captured;
    }
}

// ===== INPUT STATE =====

/// Keyboard and mouse state accumulated from input events
#[derive(Debug, Default, Clone)]
pub struct InputState {
    keys: FxHashSet<KeyCode>,
    buttons: FxHashSet<MouseButton>,
    mouse_position: Vec2,
    mouse_delta: Vec2,
    has_position: bool,
    mouse_captured: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame values; call before applying a frame's events
    pub fn begin_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }

    /// Apply one event. Returns `true` when mouse capture was toggled (F10).
    pub fn apply(&mut self, event: &InputEvent) -> bool {
        match *event {
            InputEvent::Key { code, pressed } => {
                let was_down = self.keys.contains(&code);
                if pressed {
                    self.keys.insert(code);
                } else {
                    self.keys.remove(&code);
                }
                if code == KeyCode::F10 && pressed && !was_down {
                    self.mouse_captured = !self.mouse_captured;
                    return true;
                }
            }
            InputEvent::MouseButton { button, pressed } => {
                if pressed {
                    self.buttons.insert(button);
                } else {
                    self.buttons.remove(&button);
                }
            }
            InputEvent::CursorMoved { position } => {
                if self.has_position {
                    self.mouse_delta += position - self.mouse_position;
                }
                self.mouse_position = position;
                self.has_position = true;
            }
        }
        false
    }

    pub fn is_key_down(&self, code: KeyCode) -> bool {
        self.keys.contains(&code)
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    /// Mouse movement since `begin_frame`
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    pub fn mouse_captured(&self) -> bool {
        self.mouse_captured
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
