//! Per-frame input session
//!
//! Owns the device poller, the normalizer and the binding registry, and
//! drives the shared [`ArbitrationEngine`] once per host frame:
//!
//! 1. pump the device
//! 2. drain device events into the normalizer
//! 3. apply game actions (only while no surface is focused)
//! 4. report controller activity to the engine
//! 5. tick the virtual pointer
//! 6. let a real click take arbitration back
//! 7. commit button state for edge detection
//!
//! [`InputSession::frame`] never fails: device errors leave the last known
//! input in place and are logged.

use crate::arbitration::ArbitrationEngine;
use crate::config::ControllerConfig;
use crate::cursor::{CursorInput, SurfaceDispatch, VirtualPointer};
use crate::input::layout::{
    AXIS_LEFT_X, AXIS_LEFT_Y, AXIS_RIGHT_X, AXIS_RIGHT_Y, AXIS_TRIGGER_LEFT, AXIS_TRIGGER_RIGHT,
};
use crate::input::{
    Action, BindingRegistry, Category, DeviceEvent, DevicePoller, EventCallback, Normalizer,
};
use crate::host::{FocusedSurface, SurfaceHost};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Device listener feeding the session's event channel
///
/// Once the session is gone the device may keep calling; that is logged
/// once and the events are dropped.
fn forward_events(tx: Sender<DeviceEvent>) -> EventCallback {
    let closed = AtomicBool::new(false);
    Arc::new(move |event: DeviceEvent| {
        if tx.send(event).is_err() && !closed.swap(true, Ordering::Relaxed) {
            debug!("Input session closed, dropping device events");
        }
    })
}

/// Game-side sink for controller actions
///
/// Only called while no surface has focus.
pub trait GameActions: Send {
    /// Hold-class binding state, every frame
    fn set_held(&mut self, action: Action, held: bool);

    /// Press-class binding went down this frame
    fn fire(&mut self, action: Action);

    /// Left stick, normalized, Y down-positive
    fn movement(&mut self, x: f32, y: f32);

    /// Camera delta, already scaled by the look sensitivity
    fn look(&mut self, dx: f32, dy: f32);

    /// Drop everything held; a surface just took focus
    fn release_all(&mut self);
}

/// Settings the session reads every frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub look_sensitivity: f32,
    pub invert_y: bool,
}

impl From<&ControllerConfig> for SessionSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            look_sensitivity: config.look_sensitivity,
            invert_y: config.invert_y,
        }
    }
}

pub struct InputSession {
    poller: Box<dyn DevicePoller>,
    events: Receiver<DeviceEvent>,
    input: Normalizer,
    registry: BindingRegistry,
    host: Arc<dyn SurfaceHost>,
    game: Box<dyn GameActions>,
    engine: Arc<ArbitrationEngine>,
    settings: SessionSettings,
    surface_focused: bool,
    poll_failures: u32,
    frames: u64,
}

impl InputSession {
    /// Wire a session together and install a fresh virtual pointer
    ///
    /// Surface handlers are resolved here, once.
    pub fn new(
        mut poller: Box<dyn DevicePoller>,
        mut registry: BindingRegistry,
        host: Arc<dyn SurfaceHost>,
        game: Box<dyn GameActions>,
        engine: Arc<ArbitrationEngine>,
        config: &ControllerConfig,
    ) -> Self {
        let (event_tx, events) = channel::unbounded::<DeviceEvent>();
        poller.subscribe(forward_events(event_tx));

        registry.set_trigger_threshold(config.trigger_threshold);
        engine.set_enabled(config.virtual_cursor);
        engine.install_pointer(VirtualPointer::new(
            SurfaceDispatch::resolve(host.as_ref()),
            config.cursor_speed,
        ));

        info!("Input session started on {} device backend", poller.name());

        Self {
            poller,
            events,
            input: Normalizer::new(config.deadzone),
            registry,
            host,
            game,
            engine,
            settings: SessionSettings::from(config),
            surface_focused: false,
            poll_failures: 0,
            frames: 0,
        }
    }

    /// Run one frame
    pub fn frame(&mut self) {
        self.poll();
        self.drain_events();

        let focused = self.host.focused_surface();
        self.apply_game_actions(focused.as_ref());

        if self.has_controller_input() {
            self.engine.set_controller_input_active(true);
        }

        let cursor_input = CursorInput {
            axis_x: self.input.axis(AXIS_LEFT_X),
            axis_y: self.input.axis(AXIS_LEFT_Y),
            select: self.registry.resolve(Action::GuiSelect, &self.input),
            back: self.registry.resolve(Action::GuiBack, &self.input),
        };
        self.engine.frame(focused.as_ref(), &cursor_input);
        self.engine.check_real_device();

        self.input.commit_frame();
        self.frames += 1;
    }

    fn poll(&mut self) {
        match self.poller.poll_state() {
            Ok(()) => {
                if self.poll_failures > 0 {
                    info!(
                        "Device polling recovered after {} failed frame(s)",
                        self.poll_failures
                    );
                    self.poll_failures = 0;
                }
            }
            Err(e) => {
                if self.poll_failures == 0 {
                    warn!("Device poll failed, keeping last input: {}", e);
                } else {
                    debug!("Device poll still failing: {}", e);
                }
                self.poll_failures = self.poll_failures.saturating_add(1);
            }
        }
    }

    fn drain_events(&mut self) {
        for event in self.events.try_iter() {
            match event {
                DeviceEvent::Axis { axis, value } => self.input.update_axis(axis, value),
                DeviceEvent::ButtonDown(button) => self.input.update_button(button, true),
                DeviceEvent::ButtonUp(button) => self.input.update_button(button, false),
                DeviceEvent::Connected(name) => info!("🎮 Controller connected: {}", name),
                DeviceEvent::Disconnected(name) => {
                    info!("🎮 Controller disconnected: {}", name);
                    self.input.reset();
                }
            }
        }
    }

    fn apply_game_actions(&mut self, focused: Option<&FocusedSurface>) {
        if let Some(surface) = focused {
            if !self.surface_focused {
                debug!("{} took focus, releasing game input", surface.handle);
                self.game.release_all();
                self.surface_focused = true;
            }
            return;
        }
        self.surface_focused = false;

        for binding in self.registry.all() {
            if binding.category() == Category::Gui {
                continue;
            }
            let action = binding.action();
            if binding.is_hold() {
                self.game.set_held(action, self.registry.resolve(action, &self.input));
            } else if self.registry.resolve_just_pressed(action, &self.input) {
                self.game.fire(action);
            }
        }

        self.game
            .movement(self.input.axis(AXIS_LEFT_X), self.input.axis(AXIS_LEFT_Y));

        let dx = self.input.axis(AXIS_RIGHT_X) * self.settings.look_sensitivity;
        let mut dy = self.input.axis(AXIS_RIGHT_Y) * self.settings.look_sensitivity;
        if self.settings.invert_y {
            dy = -dy;
        }
        if dx != 0.0 || dy != 0.0 {
            self.game.look(dx, dy);
        }
    }

    /// Any stick outside the deadzone, any button, or a trigger past threshold
    fn has_controller_input(&self) -> bool {
        let threshold = self.registry.trigger_threshold();
        self.input.any_stick_moved()
            || self.input.any_pressed()
            || self.input.axis(AXIS_TRIGGER_LEFT) > threshold
            || self.input.axis(AXIS_TRIGGER_RIGHT) > threshold
    }

    pub fn engine(&self) -> &Arc<ArbitrationEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BindingRegistry {
        &mut self.registry
    }

    pub fn input(&self) -> &Normalizer {
        &self.input
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: SessionSettings) {
        self.settings = settings;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Release game input and detach the virtual pointer
    pub fn shutdown(mut self) {
        self.game.release_all();
        self.engine.remove_pointer();
        info!("Input session stopped after {} frame(s)", self.frames);
    }
}

#[cfg(test)]
mod tests;
