//! Window-library independent input model
//!
//! Event sources translate whatever the windowing layer delivers into
//! [`InputEvent`]s; the viewer folds them into an [`InputState`] that is
//! passed explicitly to the camera and selection handlers.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn slot(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
        }
    }
}

/// Modifier keys currently held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    Character(char),
    Other,
}

impl Key {
    /// Case-insensitive character match
    pub fn is_char(&self, c: char) -> bool {
        matches!(self, Key::Character(k) if k.eq_ignore_ascii_case(&c))
    }
}

/// One input event
///
/// Cursor positions are window coordinates in pixels with a top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    CursorMoved { x: f32, y: f32 },
    MouseInput { button: MouseButton, pressed: bool },
    /// Vertical scroll in lines; positive zooms in
    Scroll { delta: f32 },
    ModifiersChanged(Modifiers),
    KeyInput { key: Key, pressed: bool },
    Resized { width: u32, height: u32 },
    CloseRequested,
}

/// Cursor, buttons and modifiers as of the last processed event
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    pub cursor: [f32; 2],
    pub modifiers: Modifiers,
    buttons: [bool; 3],
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.buttons[button.slot()]
    }

    pub fn any_pressed(&self) -> bool {
        self.buttons.iter().any(|&b| b)
    }

    /// Fold one event into the state
    pub fn apply(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::CursorMoved { x, y } => self.cursor = [x, y],
            InputEvent::MouseInput { button, pressed } => self.buttons[button.slot()] = pressed,
            InputEvent::ModifiersChanged(m) => self.modifiers = m,
            _ => {}
        }
    }
}

/// Produces the events that arrived since the previous poll
///
/// Each call to [`EventSource::poll`] yields a fresh batch that is consumed
/// once by the render loop.
pub trait EventSource {
    type Events<'a>: Iterator<Item = InputEvent>
    where
        Self: 'a;

    fn poll(&mut self) -> Self::Events<'_>;
}

/// Replays prepared batches of events, one batch per poll
///
/// When the script runs out it reports a close request so loops driven by
/// it always terminate.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvents {
    frames: VecDeque<Vec<InputEvent>>,
    current: Vec<InputEvent>,
    close_when_done: bool,
}

impl ScriptedEvents {
    pub fn new() -> Self {
        Self {
            close_when_done: true,
            ..Self::default()
        }
    }

    /// Keep returning empty batches instead of closing at the end
    pub fn without_close(mut self) -> Self {
        self.close_when_done = false;
        self
    }

    /// Append a batch delivered by one poll
    pub fn frame(mut self, events: Vec<InputEvent>) -> Self {
        self.frames.push_back(events);
        self
    }

    /// Append `count` empty batches
    pub fn idle(mut self, count: usize) -> Self {
        self.frames.extend(std::iter::repeat_with(Vec::new).take(count));
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl EventSource for ScriptedEvents {
    type Events<'a> = std::vec::Drain<'a, InputEvent>;

    fn poll(&mut self) -> Self::Events<'_> {
        self.current = match self.frames.pop_front() {
            Some(events) => events,
            None if self.close_when_done => vec![InputEvent::CloseRequested],
            None => Vec::new(),
        };
        self.current.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tracks_buttons_and_cursor() {
        let mut state = InputState::new();
        state.apply(&InputEvent::CursorMoved { x: 3.0, y: 4.0 });
        state.apply(&InputEvent::MouseInput {
            button: MouseButton::Middle,
            pressed: true,
        });
        state.apply(&InputEvent::ModifiersChanged(Modifiers {
            ctrl: true,
            ..Modifiers::default()
        }));
        assert_eq!(state.cursor, [3.0, 4.0]);
        assert!(state.is_pressed(MouseButton::Middle));
        assert!(!state.is_pressed(MouseButton::Left));
        assert!(state.modifiers.ctrl);

        state.apply(&InputEvent::MouseInput {
            button: MouseButton::Middle,
            pressed: false,
        });
        assert!(!state.any_pressed());
    }

    #[test]
    fn test_scripted_events_close_at_end() {
        let mut source = ScriptedEvents::new()
            .frame(vec![InputEvent::Scroll { delta: 1.0 }])
            .idle(1);
        assert_eq!(source.poll().collect::<Vec<_>>(), vec![InputEvent::Scroll { delta: 1.0 }]);
        assert_eq!(source.poll().count(), 0);
        assert_eq!(source.poll().collect::<Vec<_>>(), vec![InputEvent::CloseRequested]);

        let mut open = ScriptedEvents::new().without_close();
        assert_eq!(open.poll().count(), 0);
    }

    #[test]
    fn test_key_matching_ignores_case() {
        assert!(Key::Character('S').is_char('s'));
        assert!(!Key::Escape.is_char('s'));
    }
}
