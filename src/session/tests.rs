//! Tests for the frame session

use super::*;
use crate::error::{DeviceError, HostError};
use crate::host::console::ConsolePointer;
use crate::host::{
    HandlerKind, PointerDevice, PointerEvent, SurfaceHandle, SurfaceHandler, SurfaceMetrics,
};
use crate::input::layout::*;
use crate::input::EventCallback;
use parking_lot::Mutex;

#[derive(Default)]
struct Script {
    pending: Vec<DeviceEvent>,
    fail: bool,
}

/// Device that replays queued events on the next poll
struct ScriptedPoller {
    listeners: Vec<EventCallback>,
    script: Arc<Mutex<Script>>,
}

impl DevicePoller for ScriptedPoller {
    fn subscribe(&mut self, callback: EventCallback) {
        self.listeners.push(callback);
    }

    fn poll_state(&mut self) -> Result<(), DeviceError> {
        let mut script = self.script.lock();
        if script.fail {
            return Err(DeviceError::Poll("unplugged".into()));
        }
        for event in script.pending.drain(..) {
            for listener in &self.listeners {
                listener(event.clone());
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Clone, PartialEq)]
enum GameCall {
    Held(Action, bool),
    Fire(Action),
    Movement(f32, f32),
    Look(f32, f32),
    ReleaseAll,
}

struct RecordingGame {
    calls: Arc<Mutex<Vec<GameCall>>>,
}

impl GameActions for RecordingGame {
    fn set_held(&mut self, action: Action, held: bool) {
        self.calls.lock().push(GameCall::Held(action, held));
    }

    fn fire(&mut self, action: Action) {
        self.calls.lock().push(GameCall::Fire(action));
    }

    fn movement(&mut self, x: f32, y: f32) {
        self.calls.lock().push(GameCall::Movement(x, y));
    }

    fn look(&mut self, dx: f32, dy: f32) {
        self.calls.lock().push(GameCall::Look(dx, dy));
    }

    fn release_all(&mut self) {
        self.calls.lock().push(GameCall::ReleaseAll);
    }
}

/// Host whose focus is toggled by the test
struct FakeHost {
    focus: Arc<Mutex<Option<FocusedSurface>>>,
    delivered: Arc<Mutex<Vec<PointerEvent>>>,
}

impl SurfaceHost for FakeHost {
    fn focused_surface(&self) -> Option<FocusedSurface> {
        *self.focus.lock()
    }

    fn resolve_handler(&self, _kind: HandlerKind, _candidates: &[&str]) -> Option<SurfaceHandler> {
        let delivered = self.delivered.clone();
        Some(Arc::new(
            move |_: &SurfaceHandle, ev: &PointerEvent| -> Result<(), HostError> {
                delivered.lock().push(*ev);
                Ok(())
            },
        ))
    }
}

struct Harness {
    session: InputSession,
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<GameCall>>>,
    focus: Arc<Mutex<Option<FocusedSurface>>>,
    delivered: Arc<Mutex<Vec<PointerEvent>>>,
    mouse: Arc<ConsolePointer>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    fn with_config(config: ControllerConfig) -> Self {
        let script = Arc::new(Mutex::new(Script::default()));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let focus = Arc::new(Mutex::new(None));
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let mouse = Arc::new(ConsolePointer::default());

        let device: Arc<dyn PointerDevice> = mouse.clone();
        let session = InputSession::new(
            Box::new(ScriptedPoller {
                listeners: Vec::new(),
                script: script.clone(),
            }),
            BindingRegistry::new(),
            Arc::new(FakeHost {
                focus: focus.clone(),
                delivered: delivered.clone(),
            }),
            Box::new(RecordingGame {
                calls: calls.clone(),
            }),
            Arc::new(ArbitrationEngine::new(device)),
            &config,
        );

        Self {
            session,
            script,
            calls,
            focus,
            delivered,
            mouse,
        }
    }

    fn frame(&mut self, events: Vec<DeviceEvent>) {
        self.script.lock().pending.extend(events);
        self.session.frame();
    }

    fn set_focus(&self, focused: bool) {
        *self.focus.lock() = focused.then(|| FocusedSurface {
            handle: SurfaceHandle(1),
            metrics: SurfaceMetrics::new(200.0, 100.0, 2.0),
        });
    }

    fn take_calls(&self) -> Vec<GameCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    fn engine(&self) -> &ArbitrationEngine {
        self.session.engine()
    }
}

fn stick(axis: i32, value: f32) -> DeviceEvent {
    DeviceEvent::Axis { axis, value }
}

#[test]
fn test_hold_and_press_actions_while_unfocused() {
    let mut h = Harness::new();

    h.frame(vec![DeviceEvent::ButtonDown(BUTTON_A), DeviceEvent::ButtonDown(BUTTON_Y)]);
    let calls = h.take_calls();
    assert!(calls.contains(&GameCall::Held(Action::Jump, true)));
    assert!(calls.contains(&GameCall::Held(Action::Sneak, false)));
    assert!(calls.contains(&GameCall::Fire(Action::Inventory)));
    assert!(calls.contains(&GameCall::Movement(0.0, 0.0)));

    // Still held: hold actions repeat, press actions do not
    h.frame(vec![]);
    let calls = h.take_calls();
    assert!(calls.contains(&GameCall::Held(Action::Jump, true)));
    assert!(!calls.contains(&GameCall::Fire(Action::Inventory)));

    h.frame(vec![DeviceEvent::ButtonUp(BUTTON_A)]);
    assert!(h.take_calls().contains(&GameCall::Held(Action::Jump, false)));
}

#[test]
fn test_gui_bindings_never_reach_the_game() {
    let mut h = Harness::new();
    h.frame(vec![DeviceEvent::ButtonDown(BUTTON_B)]);

    let calls = h.take_calls();
    assert!(calls.contains(&GameCall::Held(Action::Sneak, true)));
    assert!(!calls.iter().any(|c| matches!(
        c,
        GameCall::Held(Action::GuiBack | Action::GuiSelect, _)
            | GameCall::Fire(Action::GuiBack | Action::GuiSelect)
    )));
}

#[test]
fn test_trigger_holds_attack() {
    let mut h = Harness::new();
    assert!(!h.engine().is_controller_mode_active());

    h.frame(vec![stick(AXIS_TRIGGER_RIGHT, 0.8)]);
    assert!(h.take_calls().contains(&GameCall::Held(Action::Attack, true)));
    assert!(h.engine().is_controller_mode_active());

    h.frame(vec![stick(AXIS_TRIGGER_RIGHT, 0.3)]);
    assert!(h.take_calls().contains(&GameCall::Held(Action::Attack, false)));
}

#[test]
fn test_trigger_below_threshold_is_not_controller_input() {
    let mut h = Harness::new();
    h.frame(vec![stick(AXIS_TRIGGER_LEFT, 0.2)]);
    assert!(!h.engine().is_controller_mode_active());
}

#[test]
fn test_look_is_scaled_and_inverted() {
    let config = ControllerConfig {
        look_sensitivity: 4.0,
        invert_y: true,
        ..Default::default()
    };
    let mut h = Harness::with_config(config);

    h.frame(vec![]);
    assert!(!h.take_calls().iter().any(|c| matches!(c, GameCall::Look(..))));

    h.frame(vec![stick(AXIS_RIGHT_X, 1.0), stick(AXIS_RIGHT_Y, 1.0)]);
    assert!(h.take_calls().contains(&GameCall::Look(4.0, -4.0)));
}

#[test]
fn test_focus_releases_game_once_and_drives_pointer() {
    let mut h = Harness::new();
    h.frame(vec![DeviceEvent::ButtonDown(BUTTON_X)]);
    h.frame(vec![DeviceEvent::ButtonUp(BUTTON_X)]);
    h.take_calls();

    h.set_focus(true);
    h.frame(vec![]);
    assert_eq!(h.take_calls(), vec![GameCall::ReleaseAll]);
    h.frame(vec![]);
    assert!(h.take_calls().is_empty());

    let cursor = h.engine().cursor_state().unwrap();
    assert!(cursor.active);
    assert_eq!((cursor.x, cursor.y), (100.0, 50.0));

    h.frame(vec![stick(AXIS_LEFT_X, 1.0)]);
    assert_eq!(h.engine().cursor_state().unwrap().x, 105.0);

    h.frame(vec![DeviceEvent::ButtonDown(BUTTON_A)]);
    let delivered = h.delivered.lock().clone();
    assert_eq!(delivered[0], PointerEvent::Press { x: 110, y: 50, slot: 0 });
    assert_eq!(delivered[1].kind(), HandlerKind::Drag);
    assert!(h.engine().query_button_down(0));

    // Unfocus: the held press is force-released and the game resumes
    h.set_focus(false);
    h.frame(vec![]);
    assert!(matches!(
        h.delivered.lock().last(),
        Some(PointerEvent::Release { slot: 0, .. })
    ));
    assert!(!h.engine().query_button_down(0));
    assert!(h.take_calls().contains(&GameCall::Held(Action::Jump, true)));
}

#[test]
fn test_real_click_wins_and_controller_takes_back() {
    let mut h = Harness::new();
    h.set_focus(true);
    h.mouse.move_to(7, 9);

    h.frame(vec![stick(AXIS_LEFT_X, 1.0)]);
    assert!(h.engine().is_controller_mode_active());
    assert_eq!(h.engine().query_x(), 210);
    assert_eq!(h.engine().query_y(), 100);

    // Click in the same frame as stick input: the click still wins
    h.mouse.set_button(0, true);
    h.frame(vec![]);
    assert!(!h.engine().is_controller_mode_active());
    assert_eq!(h.engine().query_x(), 7);
    assert_eq!(h.engine().query_y(), 9);

    // Sustained controller input takes arbitration back
    h.mouse.set_button(0, false);
    h.frame(vec![]);
    assert!(h.engine().is_controller_mode_active());
}

#[test]
fn test_disabled_engine_reports_real_pointer() {
    let config = ControllerConfig {
        virtual_cursor: false,
        ..Default::default()
    };
    let mut h = Harness::with_config(config);
    h.set_focus(true);
    h.mouse.move_to(3, 4);

    h.frame(vec![stick(AXIS_LEFT_X, 1.0), DeviceEvent::ButtonDown(BUTTON_A)]);
    assert_eq!(h.engine().query_x(), 3);
    assert!(!h.engine().query_button_down(0));
}

#[test]
fn test_disconnect_clears_input() {
    let mut h = Harness::new();
    h.frame(vec![DeviceEvent::ButtonDown(BUTTON_A), stick(AXIS_LEFT_X, 1.0)]);
    assert!(h.take_calls().contains(&GameCall::Movement(1.0, 0.0)));

    h.frame(vec![DeviceEvent::Disconnected("pad".into())]);
    let calls = h.take_calls();
    assert!(calls.contains(&GameCall::Held(Action::Jump, false)));
    assert!(calls.contains(&GameCall::Movement(0.0, 0.0)));
    assert!(!h.session.input().any_pressed());
}

#[test]
fn test_poll_failure_keeps_last_input() {
    let mut h = Harness::new();
    h.frame(vec![DeviceEvent::ButtonDown(BUTTON_A)]);

    h.script.lock().fail = true;
    h.frame(vec![DeviceEvent::ButtonUp(BUTTON_A)]);
    h.frame(vec![]);
    assert!(h.take_calls().contains(&GameCall::Held(Action::Jump, true)));
    assert_eq!(h.session.frames(), 3);

    // Queued events arrive once the device recovers
    h.script.lock().fail = false;
    h.frame(vec![]);
    assert!(h.take_calls().contains(&GameCall::Held(Action::Jump, false)));
}

#[test]
fn test_rebound_action_follows_new_button() {
    let mut h = Harness::new();
    h.session.registry_mut().rebind(Action::Jump, BUTTON_X);

    h.frame(vec![DeviceEvent::ButtonDown(BUTTON_A)]);
    assert!(h.take_calls().contains(&GameCall::Held(Action::Jump, false)));

    h.frame(vec![DeviceEvent::ButtonDown(BUTTON_X)]);
    assert!(h.take_calls().contains(&GameCall::Held(Action::Jump, true)));
}

#[test]
fn test_shutdown_detaches_pointer() {
    let h = Harness::new();
    let engine = h.session.engine().clone();
    assert!(engine.has_pointer());

    let calls = h.calls.clone();
    h.session.shutdown();
    assert!(!engine.has_pointer());
    assert_eq!(calls.lock().last(), Some(&GameCall::ReleaseAll));
}

#[test]
fn test_device_events_after_session_close_are_dropped() {
    let (tx, rx) = channel::unbounded::<DeviceEvent>();
    let listener = forward_events(tx);

    listener(DeviceEvent::ButtonDown(BUTTON_A));
    assert_eq!(rx.try_recv().ok(), Some(DeviceEvent::ButtonDown(BUTTON_A)));

    // The device outlives the session and keeps calling
    drop(rx);
    listener(DeviceEvent::ButtonUp(BUTTON_A));
    listener(DeviceEvent::ButtonDown(BUTTON_B));
}
