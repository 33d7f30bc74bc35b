//! Frame scheduling and the main loop

use crate::input::{EventSource, InputEvent, Key};
use crate::viewer::Viewer;
use devview_core::Result;
use devview_gpu::GraphicsBackend;
use std::time::{Duration, Instant};

/// Paces frames to a maximum rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameScheduler {
    interval: Duration,
}

impl FrameScheduler {
    pub fn new(target_fps: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1))),
        }
    }

    /// Minimum duration of one frame
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left in the frame after `elapsed`
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }

    /// Sleep out the rest of a frame that began at `started`
    pub fn pace(&self, started: Instant) -> Duration {
        let remaining = self.remaining(started.elapsed());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        remaining
    }
}

type PreDrawHook<'a, B> = Box<dyn FnMut(&mut Viewer<B>, bool) -> Result<()> + 'a>;
type KeyboardHook<'a, B> = Box<dyn FnMut(&mut Viewer<B>, &Key, bool) -> bool + 'a>;
type MouseHook<'a, B> = Box<dyn FnMut(&mut Viewer<B>, &InputEvent) -> bool + 'a>;

/// Optional hooks invoked by [`run`]
///
/// The keyboard and mouse hooks return `true` when they consumed the event,
/// which skips the viewer's own handling of it.
pub struct ViewerCallbacks<'a, B: GraphicsBackend> {
    /// Called before every frame with whether the user interacted since the last one
    pub pre_draw: Option<PreDrawHook<'a, B>>,
    /// Called with the key and whether it was pressed
    pub keyboard: Option<KeyboardHook<'a, B>>,
    /// Called for cursor, button and scroll events
    pub mouse: Option<MouseHook<'a, B>>,
}

impl<B: GraphicsBackend> Default for ViewerCallbacks<'_, B> {
    fn default() -> Self {
        Self {
            pre_draw: None,
            keyboard: None,
            mouse: None,
        }
    }
}

impl<'a, B: GraphicsBackend> ViewerCallbacks<'a, B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_draw(mut self, hook: impl FnMut(&mut Viewer<B>, bool) -> Result<()> + 'a) -> Self {
        self.pre_draw = Some(Box::new(hook));
        self
    }

    pub fn keyboard(mut self, hook: impl FnMut(&mut Viewer<B>, &Key, bool) -> bool + 'a) -> Self {
        self.keyboard = Some(Box::new(hook));
        self
    }

    pub fn mouse(mut self, hook: impl FnMut(&mut Viewer<B>, &InputEvent) -> bool + 'a) -> Self {
        self.mouse = Some(Box::new(hook));
        self
    }
}

/// Drive frames until the viewer is asked to close; returns the number of frames drawn
///
/// Each iteration runs the pre-draw hook, renders, then drains the events
/// that arrived meanwhile and sleeps out the rest of the frame.
pub fn run<B, S>(viewer: &mut Viewer<B>, source: &mut S, callbacks: &mut ViewerCallbacks<'_, B>) -> Result<usize>
where
    B: GraphicsBackend,
    S: EventSource,
{
    if !viewer.is_launched() {
        viewer.launch()?;
    }
    let scheduler = FrameScheduler::new(viewer.config().target_fps);
    let mut frames = 0;

    while !viewer.should_close() {
        let started = Instant::now();

        let interacted = viewer.take_interaction();
        if let Some(hook) = callbacks.pre_draw.as_mut() {
            hook(viewer, interacted)?;
        }
        viewer.render_frame()?;
        frames += 1;

        for event in source.poll() {
            dispatch(viewer, callbacks, &event)?;
        }
        scheduler.pace(started);
    }

    log::info!("Render loop finished after {} frames", frames);
    Ok(frames)
}

fn dispatch<B: GraphicsBackend>(
    viewer: &mut Viewer<B>,
    callbacks: &mut ViewerCallbacks<'_, B>,
    event: &InputEvent,
) -> Result<()> {
    match event {
        InputEvent::KeyInput { key, pressed } => {
            let consumed = callbacks
                .keyboard
                .as_mut()
                .is_some_and(|hook| hook(viewer, key, *pressed));
            if *pressed && !consumed {
                viewer.handle_key(key);
            }
            Ok(())
        }
        InputEvent::CursorMoved { .. } | InputEvent::MouseInput { .. } | InputEvent::Scroll { .. } => {
            let consumed = callbacks.mouse.as_mut().is_some_and(|hook| hook(viewer, event));
            if consumed {
                viewer.track_input(event);
                Ok(())
            } else {
                viewer.handle_event(event)
            }
        }
        _ => viewer.handle_event(event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_interval() {
        let scheduler = FrameScheduler::new(60);
        assert_eq!(scheduler.interval(), Duration::from_secs_f64(1.0 / 60.0));
        assert_eq!(scheduler.remaining(Duration::from_secs(1)), Duration::ZERO);
        assert!(scheduler.remaining(Duration::from_millis(4)) > Duration::from_millis(12));
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        assert_eq!(FrameScheduler::new(0).interval(), Duration::from_secs(1));
    }
}
