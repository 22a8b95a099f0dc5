//! gilrs-backed device poller
//!
//! gilrs lives on a dedicated thread (its context is not shareable across
//! threads on every platform). Events are translated to SDL2 indices there
//! and forwarded over a channel; [`GilrsPoller::poll_state`] drains the
//! channel on the frame thread and hands each event to the listeners.

use super::device::{DeviceEvent, DevicePoller, EventCallback};
use super::layout::*;
use crate::error::DeviceError;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use gilrs::{Axis, Button, Event, EventType, Gilrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

const PUMP_INTERVAL: Duration = Duration::from_millis(4);

/// Map a gilrs button to its SDL2 button index
///
/// The analog triggers are not buttons here; they arrive as axes.
pub fn map_button(button: Button) -> Option<i32> {
    let index = match button {
        Button::South => BUTTON_A,
        Button::East => BUTTON_B,
        Button::West => BUTTON_X,
        Button::North => BUTTON_Y,
        Button::Select => BUTTON_BACK,
        Button::Mode => BUTTON_GUIDE,
        Button::Start => BUTTON_START,
        Button::LeftThumb => BUTTON_L3,
        Button::RightThumb => BUTTON_R3,
        Button::LeftTrigger => BUTTON_LB,
        Button::RightTrigger => BUTTON_RB,
        Button::DPadUp => BUTTON_DPAD_UP,
        Button::DPadDown => BUTTON_DPAD_DOWN,
        Button::DPadLeft => BUTTON_DPAD_LEFT,
        Button::DPadRight => BUTTON_DPAD_RIGHT,
        _ => return None,
    };
    Some(index)
}

/// Map a gilrs stick axis to its SDL2 index and value
///
/// gilrs reports stick Y with up positive; SDL2 has down positive.
pub fn map_axis(axis: Axis, value: f32) -> Option<(i32, f32)> {
    match axis {
        Axis::LeftStickX => Some((AXIS_LEFT_X, value)),
        Axis::LeftStickY => Some((AXIS_LEFT_Y, -value)),
        Axis::RightStickX => Some((AXIS_RIGHT_X, value)),
        Axis::RightStickY => Some((AXIS_RIGHT_Y, -value)),
        _ => None,
    }
}

/// Map an analog trigger change to its SDL2 trigger axis
pub fn map_trigger(button: Button, value: f32) -> Option<DeviceEvent> {
    let axis = match button {
        Button::LeftTrigger2 => AXIS_TRIGGER_LEFT,
        Button::RightTrigger2 => AXIS_TRIGGER_RIGHT,
        _ => return None,
    };
    Some(DeviceEvent::Axis { axis, value })
}

/// Translate one gilrs event into zero or one device events
pub fn translate(event: EventType, gamepad_name: impl FnOnce() -> String) -> Option<DeviceEvent> {
    match event {
        EventType::ButtonPressed(button, _) => map_button(button).map(DeviceEvent::ButtonDown),
        EventType::ButtonReleased(button, _) => map_button(button).map(DeviceEvent::ButtonUp),
        EventType::ButtonChanged(button, value, _) => map_trigger(button, value),
        EventType::AxisChanged(axis, value, _) => {
            map_axis(axis, value).map(|(axis, value)| DeviceEvent::Axis { axis, value })
        }
        EventType::Connected => Some(DeviceEvent::Connected(gamepad_name())),
        EventType::Disconnected => Some(DeviceEvent::Disconnected(gamepad_name())),
        _ => None,
    }
}

/// Device poller backed by a gilrs thread
pub struct GilrsPoller {
    listeners: Vec<EventCallback>,
    event_rx: Receiver<DeviceEvent>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl GilrsPoller {
    /// Spawn the gilrs thread and wait for it to initialize
    pub fn start() -> Result<Self, DeviceError> {
        let (event_tx, event_rx) = channel::unbounded::<DeviceEvent>();
        let (ready_tx, ready_rx) = channel::bounded::<Result<(), DeviceError>>(1);
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread_shutdown = shutdown.clone();
        let thread = std::thread::Builder::new()
            .name("gilrs".into())
            .spawn(move || Self::event_loop_blocking(event_tx, ready_tx, thread_shutdown))
            .map_err(|e| DeviceError::Init(format!("failed to spawn gilrs thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(DeviceError::Init("gilrs thread exited during startup".into())),
        }

        Ok(Self {
            listeners: Vec::new(),
            event_rx,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Runs on the dedicated thread until shutdown or until the poller is dropped
    fn event_loop_blocking(
        event_tx: Sender<DeviceEvent>,
        ready_tx: Sender<Result<(), DeviceError>>,
        shutdown: Arc<AtomicBool>,
    ) {
        let mut gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("GilRs initialized");
                let _ = ready_tx.send(Ok(()));
                g
            }
            Err(e) => {
                let _ = ready_tx.send(Err(DeviceError::Init(e.to_string())));
                return;
            }
        };

        for (id, gamepad) in gilrs.gamepads().filter(|(_, gp)| gp.is_connected()) {
            debug!("Gamepad present at startup: {:?} \"{}\"", id, gamepad.name());
            if event_tx
                .send(DeviceEvent::Connected(gamepad.name().to_string()))
                .is_err()
            {
                return;
            }
        }

        while !shutdown.load(Ordering::Relaxed) {
            while let Some(Event { id, event, .. }) = gilrs.next_event() {
                let translated = translate(event, || gilrs.gamepad(id).name().to_string());
                if let Some(device_event) = translated {
                    if event_tx.send(device_event).is_err() {
                        debug!("Device event receiver dropped, stopping gilrs thread");
                        return;
                    }
                }
            }
            std::thread::sleep(PUMP_INTERVAL);
        }

        info!("Gamepad provider shutting down");
    }
}

impl DevicePoller for GilrsPoller {
    fn subscribe(&mut self, callback: EventCallback) {
        self.listeners.push(callback);
    }

    fn poll_state(&mut self) -> Result<(), DeviceError> {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => {
                    for callback in &self.listeners {
                        callback(event.clone());
                    }
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return Err(DeviceError::Poll("gilrs thread stopped".into()))
                }
            }
        }
    }

    fn name(&self) -> &str {
        "gilrs"
    }
}

impl Drop for GilrsPoller {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("gilrs thread panicked");
            }
        }
    }
}

/// A gamepad as reported by `list_gamepads`
#[derive(Debug, Clone)]
pub struct GamepadInfo {
    pub id: usize,
    pub name: String,
    pub connected: bool,
}

/// Enumerate gamepads once, pumping events briefly so hot-plugged
/// devices show up
pub fn list_gamepads(settle: Duration) -> Result<Vec<GamepadInfo>, DeviceError> {
    let mut gilrs = Gilrs::new().map_err(|e| DeviceError::Init(e.to_string()))?;

    let start = std::time::Instant::now();
    while start.elapsed() < settle {
        while gilrs.next_event().is_some() {}
        std::thread::sleep(Duration::from_millis(50));
    }

    Ok(gilrs
        .gamepads()
        .map(|(id, gp)| GamepadInfo {
            id: usize::from(id),
            name: gp.name().to_string(),
            connected: gp.is_connected(),
        })
        .collect())
}
