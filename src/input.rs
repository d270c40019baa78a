//! Input state and the renderer event queue.
//!
//! winit events are folded into an [`InputState`] and turned into [`Event`]
//! values that the caller drains, in arrival order, after
//! [`Renderer::update`](crate::renderer::Renderer::update).

use std::collections::{HashMap, VecDeque};

use winit::{
    event::{ElementState, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::window::WindowHandle;

/// State of a key or mouse button.
///
/// The ordering matters: a repeated report of the same state promotes the
/// button to `Held`, a report of a "higher" state replaces the current one.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ButtonState {
    #[default]
    Released = 0,
    Pressed = 1,
    Held = 2,
}

impl ButtonState {
    /// The state after `incoming` is reported for a button currently in `self`.
    pub fn advance(self, incoming: ButtonState) -> ButtonState {
        if incoming == ButtonState::Released {
            ButtonState::Released
        } else if incoming == self {
            ButtonState::Held
        } else if incoming > self {
            incoming
        } else {
            self
        }
    }
}

impl From<ElementState> for ButtonState {
    fn from(state: ElementState) -> Self {
        match state {
            ElementState::Pressed => ButtonState::Pressed,
            ElementState::Released => ButtonState::Released,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Key {
        window: WindowHandle,
        key: KeyCode,
        state: ButtonState,
    },
    MouseButton {
        window: WindowHandle,
        button: MouseButton,
        state: ButtonState,
    },
    /// Cursor position in physical pixels and the movement since the last report.
    MouseMotion {
        window: WindowHandle,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
    },
    /// A window was moved, resized, maximised or minimised.
    Window {
        window: WindowHandle,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        focused: bool,
    },
    WindowClosed(WindowHandle),
    /// The renderer stopped running, because the default or last window closed.
    Quit,
}

/// FIFO of events waiting for the caller.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Last known state of every key and mouse button that was ever reported.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashMap<KeyCode, ButtonState>,
    buttons: HashMap<MouseButton, ButtonState>,
    cursor: Option<(f32, f32)>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_event(&mut self, key: KeyCode, incoming: ButtonState) -> ButtonState {
        let state = self.keys.entry(key).or_default();
        *state = state.advance(incoming);
        *state
    }

    pub fn button_event(&mut self, button: MouseButton, incoming: ButtonState) -> ButtonState {
        let state = self.buttons.entry(button).or_default();
        *state = state.advance(incoming);
        *state
    }

    /// Records the cursor position and returns the movement since the last one.
    pub fn cursor_moved(&mut self, x: f32, y: f32) -> (f32, f32) {
        let (px, py) = self.cursor.replace((x, y)).unwrap_or((x, y));
        (x - px, y - py)
    }

    pub fn key_state(&self, key: KeyCode) -> ButtonState {
        self.keys.get(&key).copied().unwrap_or_default()
    }

    pub fn mouse_button_state(&self, button: MouseButton) -> ButtonState {
        self.buttons.get(&button).copied().unwrap_or_default()
    }

    pub fn cursor(&self) -> Option<(f32, f32)> {
        self.cursor
    }
}

/// Translates the input part of a winit `WindowEvent`.
///
/// Returns `None` for events that are not input, including window geometry
/// changes which the renderer handles itself.
pub fn translate_window_event(
    input: &mut InputState,
    window: WindowHandle,
    event: &WindowEvent,
) -> Option<Event> {
    match event {
        WindowEvent::KeyboardInput { event, .. } => {
            let PhysicalKey::Code(key) = event.physical_key else {
                return None;
            };
            let state = input.key_event(key, event.state.into());
            Some(Event::Key { window, key, state })
        }
        WindowEvent::MouseInput { state, button, .. } => {
            let state = input.button_event(*button, (*state).into());
            Some(Event::MouseButton {
                window,
                button: *button,
                state,
            })
        }
        WindowEvent::CursorMoved { position, .. } => {
            let (x, y) = (position.x as f32, position.y as f32);
            let (dx, dy) = input.cursor_moved(x, y);
            Some(Event::MouseMotion {
                window,
                x,
                y,
                dx,
                dy,
            })
        }
        _ => None,
    }
}
