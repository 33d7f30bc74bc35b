//! [`EventSource`] backed by a winit event loop

use crate::input::{EventSource, InputEvent, Key, Modifiers, MouseButton};
use devview_core::{Error, Result};
use std::time::Duration;
use winit::event::{ElementState, Event, MouseScrollDelta, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key as WinitKey, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowBuilder};

/// Pixels per scroll line for touchpad deltas
const PIXELS_PER_LINE: f64 = 100.0;

/// Pumps a winit event loop once per poll without blocking
pub struct WinitEventSource {
    event_loop: EventLoop<()>,
    pending: Vec<InputEvent>,
}

impl WinitEventSource {
    /// Create the event loop
    pub fn new() -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|e| Error::Window(format!("Failed to create event loop: {}", e)))?;
        Ok(Self {
            event_loop,
            pending: Vec::new(),
        })
    }

    /// Open the viewer window on this loop
    pub fn create_window(&self, title: &str, width: u32, height: u32) -> Result<Window> {
        WindowBuilder::new()
            .with_title(title)
            .with_inner_size(winit::dpi::PhysicalSize::new(width, height))
            .build(&self.event_loop)
            .map_err(|e| Error::Window(format!("Failed to create window: {}", e)))
    }
}

impl EventSource for WinitEventSource {
    type Events<'a> = std::vec::Drain<'a, InputEvent>;

    fn poll(&mut self) -> Self::Events<'_> {
        let pending = &mut self.pending;
        let status = self.event_loop.pump_events(Some(Duration::ZERO), |event, _| {
            if let Event::WindowEvent { event, .. } = event {
                if let Some(e) = translate(event) {
                    pending.push(e);
                }
            }
        });
        if let PumpStatus::Exit(code) = status {
            log::info!("Event loop exited with code {}", code);
            self.pending.push(InputEvent::CloseRequested);
        }
        self.pending.drain(..)
    }
}

fn translate(event: WindowEvent) -> Option<InputEvent> {
    Some(match event {
        WindowEvent::CloseRequested => InputEvent::CloseRequested,
        WindowEvent::Resized(size) => InputEvent::Resized {
            width: size.width,
            height: size.height,
        },
        WindowEvent::CursorMoved { position, .. } => InputEvent::CursorMoved {
            x: position.x as f32,
            y: position.y as f32,
        },
        WindowEvent::MouseInput { state, button, .. } => {
            let button = match button {
                winit::event::MouseButton::Left => MouseButton::Left,
                winit::event::MouseButton::Right => MouseButton::Right,
                winit::event::MouseButton::Middle => MouseButton::Middle,
                _ => return None,
            };
            InputEvent::MouseInput {
                button,
                pressed: state == ElementState::Pressed,
            }
        }
        WindowEvent::MouseWheel { delta, .. } => {
            let delta = match delta {
                MouseScrollDelta::LineDelta(_, y) => y,
                MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_LINE) as f32,
            };
            InputEvent::Scroll { delta }
        }
        WindowEvent::ModifiersChanged(modifiers) => {
            let state = modifiers.state();
            InputEvent::ModifiersChanged(Modifiers {
                shift: state.shift_key(),
                ctrl: state.control_key(),
                alt: state.alt_key(),
            })
        }
        WindowEvent::KeyboardInput { event, .. } => {
            let key = match &event.logical_key {
                WinitKey::Named(NamedKey::Escape) => Key::Escape,
                WinitKey::Character(c) => c.chars().next().map_or(Key::Other, Key::Character),
                _ => Key::Other,
            };
            InputEvent::KeyInput {
                key,
                pressed: event.state == ElementState::Pressed,
            }
        }
        _ => return None,
    })
}
