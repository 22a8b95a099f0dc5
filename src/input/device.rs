//! Device-polling seam
//!
//! The session never talks to a gamepad library directly. A
//! [`DevicePoller`] delivers [`DeviceEvent`]s to subscribed callbacks,
//! synchronously, from inside [`DevicePoller::poll_state`].

use crate::error::DeviceError;
use std::sync::Arc;

/// Raw event from the device backend, in SDL2 GameController indices
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Axis value in -1.0..=1.0 (sticks) or 0.0..=1.0 (triggers)
    Axis { axis: i32, value: f32 },
    ButtonDown(i32),
    ButtonUp(i32),
    Connected(String),
    Disconnected(String),
}

/// Callback type for device events
pub type EventCallback = Arc<dyn Fn(DeviceEvent) + Send + Sync>;

/// Backend that turns physical controller state into [`DeviceEvent`]s
pub trait DevicePoller: Send {
    /// Register a listener; called for every event delivered by `poll_state`
    fn subscribe(&mut self, callback: EventCallback);

    /// Pump the backend once, delivering pending events to listeners
    fn poll_state(&mut self) -> Result<(), DeviceError>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Poller with nothing attached, for runs without a controller
#[derive(Default)]
pub struct NullPoller;

impl DevicePoller for NullPoller {
    fn subscribe(&mut self, _callback: EventCallback) {}

    fn poll_state(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
