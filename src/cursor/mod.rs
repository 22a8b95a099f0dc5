//! Virtual pointer state machine
//!
//! Owns the gamepad-driven cursor: position in GUI space, the
//! Inactive/Active focus state and the held button slots. Press, release
//! and drag events are synthesized into the focused surface through a
//! [`SurfaceDispatch`] resolved at construction.
//!
//! Every held slot remembers the surface it was pressed on and is released
//! there, whether the pointer loses focus or the focus moves to another
//! surface. A press is never left without its release.
//!
//! After every change the pointer publishes a [`VirtualCursorState`] to a
//! [`SharedCursor`]. Readers (the arbitration engine, the interception
//! hooks) only ever see that published copy, never the pointer itself.

pub mod dispatch;

pub use dispatch::SurfaceDispatch;

use crate::host::{FocusedSurface, PointerEvent, SurfaceHandle, SurfaceMetrics};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Button slot driven by the select action
pub const SLOT_SELECT: i32 = 0;
/// Button slot driven by the back action
pub const SLOT_BACK: i32 = 1;

const SLOTS: [i32; 2] = [SLOT_SELECT, SLOT_BACK];

/// Default cursor speed in GUI pixels per frame at full deflection
pub const DEFAULT_CURSOR_SPEED: f32 = 5.0;

/// Focus-driven pointer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerState {
    Inactive,
    Active,
}

/// Read-only view of the pointer, published once per change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualCursorState {
    pub x: f32,
    pub y: f32,
    pub active: bool,
    /// Held flag per slot, indexed by slot number
    pub held: [bool; 2],
    /// Metrics of the surface the position is relative to
    pub metrics: SurfaceMetrics,
}

impl Default for VirtualCursorState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            active: false,
            held: [false; 2],
            metrics: SurfaceMetrics::new(0.0, 0.0, 1.0),
        }
    }
}

impl VirtualCursorState {
    pub fn is_button_held(&self, slot: i32) -> bool {
        slot_index(slot).is_some_and(|i| self.held[i])
    }
}

/// Published cursor state shared with readers
pub type SharedCursor = Arc<RwLock<VirtualCursorState>>;

/// Per-frame pointer input, already resolved from bindings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CursorInput {
    pub axis_x: f32,
    pub axis_y: f32,
    pub select: bool,
    pub back: bool,
}

#[derive(Debug, Clone, Copy)]
struct HeldButton {
    surface: SurfaceHandle,
    since: Instant,
}

fn slot_index(slot: i32) -> Option<usize> {
    usize::try_from(slot).ok().filter(|&i| i < SLOTS.len())
}

/// Events produced by one frame, not yet delivered
///
/// Lets the caller release whatever lock guards the pointer before host
/// handlers run.
#[must_use = "events are only delivered by `deliver`"]
pub struct PendingEvents {
    dispatch: SurfaceDispatch,
    events: Vec<(SurfaceHandle, PointerEvent)>,
}

impl PendingEvents {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[(SurfaceHandle, PointerEvent)] {
        &self.events
    }

    /// Hand every event to its surface, in order
    pub fn deliver(self) {
        for (surface, event) in &self.events {
            self.dispatch.dispatch(surface, event);
        }
    }
}

pub struct VirtualPointer {
    dispatch: SurfaceDispatch,
    cursor_speed: f32,
    state: PointerState,
    x: f32,
    y: f32,
    metrics: SurfaceMetrics,
    held: [Option<HeldButton>; 2],
    prev: [bool; 2],
    last_surface: Option<SurfaceHandle>,
    outbox: Vec<(SurfaceHandle, PointerEvent)>,
    shared: SharedCursor,
}

impl VirtualPointer {
    pub fn new(dispatch: SurfaceDispatch, cursor_speed: f32) -> Self {
        Self {
            dispatch,
            cursor_speed,
            state: PointerState::Inactive,
            x: 0.0,
            y: 0.0,
            metrics: SurfaceMetrics::new(0.0, 0.0, 1.0),
            held: [None; 2],
            prev: [false; 2],
            last_surface: None,
            outbox: Vec::new(),
            shared: Arc::new(RwLock::new(VirtualCursorState::default())),
        }
    }

    /// Handle to the published state
    pub fn shared(&self) -> SharedCursor {
        self.shared.clone()
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == PointerState::Active
    }

    pub fn cursor_position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn is_button_held(&self, slot: i32) -> bool {
        slot_index(slot).is_some_and(|i| self.held[i].is_some())
    }

    pub fn cursor_speed(&self) -> f32 {
        self.cursor_speed
    }

    pub fn set_cursor_speed(&mut self, speed: f32) {
        self.cursor_speed = speed;
    }

    /// One frame, delivering its events immediately
    pub fn tick(&mut self, focused: Option<&FocusedSurface>, input: &CursorInput) {
        self.step(focused, input).deliver();
    }

    /// One frame: apply focus edges, then integrate and synthesize if focused
    ///
    /// The events are returned instead of delivered; see [`PendingEvents`].
    pub fn step(&mut self, focused: Option<&FocusedSurface>, input: &CursorInput) -> PendingEvents {
        match (self.state, focused) {
            (PointerState::Inactive, Some(surface)) => self.activate(surface),
            (PointerState::Active, None) => self.deactivate(),
            _ => {}
        }

        if let Some(surface) = focused {
            self.update(surface, input.axis_x, input.axis_y, input.select, input.back);
        }

        PendingEvents {
            dispatch: self.dispatch.clone(),
            events: std::mem::take(&mut self.outbox),
        }
    }

    /// Rising edge: center on the surface and forget any held state
    fn activate(&mut self, surface: &FocusedSurface) {
        let (cx, cy) = surface.metrics.center();
        self.x = cx;
        self.y = cy;
        self.metrics = surface.metrics;
        self.held = [None; 2];
        self.prev = [false; 2];
        self.last_surface = Some(surface.handle);
        self.state = PointerState::Active;
        debug!("Virtual pointer active on {} at ({}, {})", surface.handle, cx, cy);
        self.publish();
    }

    /// Falling edge: force-release so the host never sees a stuck press
    fn deactivate(&mut self) {
        self.release_held(|_| true, "focus loss");
        self.prev = [false; 2];
        self.state = PointerState::Inactive;
        debug!("Virtual pointer inactive");
        self.publish();
    }

    /// Release held slots matching `pressed_on`, each on its own surface
    fn release_held(&mut self, pressed_on: impl Fn(SurfaceHandle) -> bool, reason: &str) {
        let (x, y) = self.int_position();
        for slot in SLOTS {
            let Some(index) = slot_index(slot) else {
                continue;
            };
            let Some(held) = self.held[index].filter(|h| pressed_on(h.surface)) else {
                continue;
            };
            self.held[index] = None;
            self.outbox
                .push((held.surface, PointerEvent::Release { x, y, slot }));
            debug!("Force-released slot {} on {} ({})", slot, held.surface, reason);
        }
    }

    /// Integrate movement and synthesize button events for one frame
    ///
    /// Only meaningful while a surface is focused; [`Self::step`] calls it.
    /// Events are queued for the next [`PendingEvents`].
    pub fn update(&mut self, surface: &FocusedSurface, axis_x: f32, axis_y: f32, select: bool, back: bool) {
        if self.last_surface.is_some_and(|last| last != surface.handle) {
            // Presses stay with the surface that received them
            self.release_held(|pressed_on| pressed_on != surface.handle, "surface switch");
        }
        self.metrics = surface.metrics;
        self.last_surface = Some(surface.handle);

        self.x += axis_x * self.cursor_speed;
        self.y += axis_y * self.cursor_speed;
        self.x = self.x.clamp(0.0, (surface.metrics.width - 1.0).max(0.0));
        self.y = self.y.clamp(0.0, (surface.metrics.height - 1.0).max(0.0));

        self.handle_edge(surface.handle, SLOT_SELECT, select);
        self.handle_edge(surface.handle, SLOT_BACK, back);

        let (x, y) = self.int_position();
        for slot in SLOTS {
            let Some(held) = slot_index(slot).and_then(|i| self.held[i]) else {
                continue;
            };
            self.outbox.push((
                held.surface,
                PointerEvent::Drag {
                    x,
                    y,
                    slot,
                    since_press_ms: held.since.elapsed().as_millis() as u64,
                },
            ));
        }

        self.publish();
    }

    fn handle_edge(&mut self, surface: SurfaceHandle, slot: i32, pressed: bool) {
        let Some(index) = slot_index(slot) else {
            return;
        };
        let was_pressed = std::mem::replace(&mut self.prev[index], pressed);
        let (x, y) = self.int_position();

        if pressed && !was_pressed {
            self.outbox.push((surface, PointerEvent::Press { x, y, slot }));
            self.held[index] = Some(HeldButton {
                surface,
                since: Instant::now(),
            });
        } else if !pressed && was_pressed {
            // Already released if the press belonged to a surface that lost focus
            if let Some(held) = self.held[index].take() {
                self.outbox
                    .push((held.surface, PointerEvent::Release { x, y, slot }));
            }
        }
    }

    fn int_position(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }

    fn publish(&self) {
        *self.shared.write() = VirtualCursorState {
            x: self.x,
            y: self.y,
            active: self.is_active(),
            held: self.held.map(|h| h.is_some()),
            metrics: self.metrics,
        };
    }
}

impl std::fmt::Debug for VirtualPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualPointer")
            .field("state", &self.state)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("held", &self.held.map(|h| h.map(|h| h.surface)))
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::host::{HandlerKind, SurfaceHandler, SurfaceHost};
    use parking_lot::Mutex;

    /// Host that records every delivered event
    struct RecordingHost {
        events: Arc<Mutex<Vec<(SurfaceHandle, PointerEvent)>>>,
    }

    impl SurfaceHost for RecordingHost {
        fn focused_surface(&self) -> Option<FocusedSurface> {
            None
        }

        fn resolve_handler(&self, _kind: HandlerKind, _candidates: &[&str]) -> Option<SurfaceHandler> {
            let events = self.events.clone();
            Some(Arc::new(
                move |surface: &SurfaceHandle, ev: &PointerEvent| -> Result<(), HostError> {
                    events.lock().push((*surface, *ev));
                    Ok(())
                },
            ))
        }
    }

    fn setup() -> (VirtualPointer, Arc<Mutex<Vec<(SurfaceHandle, PointerEvent)>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let host = RecordingHost {
            events: events.clone(),
        };
        let pointer = VirtualPointer::new(SurfaceDispatch::resolve(&host), 5.0);
        (pointer, events)
    }

    fn surface(id: u64) -> FocusedSurface {
        FocusedSurface {
            handle: SurfaceHandle(id),
            metrics: SurfaceMetrics::new(200.0, 100.0, 2.0),
        }
    }

    fn idle() -> CursorInput {
        CursorInput::default()
    }

    fn kinds(events: &Mutex<Vec<(SurfaceHandle, PointerEvent)>>) -> Vec<HandlerKind> {
        events.lock().iter().map(|(_, e)| e.kind()).collect()
    }

    #[test]
    fn test_rising_edge_centers_cursor() {
        let (mut pointer, _) = setup();
        assert_eq!(pointer.state(), PointerState::Inactive);

        pointer.tick(Some(&surface(1)), &idle());
        assert!(pointer.is_active());
        assert_eq!(pointer.cursor_position(), (100.0, 50.0));

        let shared = pointer.shared();
        assert!(shared.read().active);
        assert_eq!(shared.read().metrics.scale_factor, 2.0);
    }

    #[test]
    fn test_movement_integrates_and_clamps() {
        let (mut pointer, _) = setup();
        let s = surface(1);
        pointer.tick(Some(&s), &idle());

        let right = CursorInput {
            axis_x: 1.0,
            axis_y: -0.5,
            ..idle()
        };
        pointer.tick(Some(&s), &right);
        assert_eq!(pointer.cursor_position(), (105.0, 47.5));

        for _ in 0..100 {
            pointer.tick(Some(&s), &right);
        }
        assert_eq!(pointer.cursor_position(), (199.0, 0.0));
    }

    #[test]
    fn test_press_drag_release_sequence() {
        let (mut pointer, events) = setup();
        let s = surface(7);
        pointer.tick(Some(&s), &idle());

        let held = CursorInput {
            select: true,
            ..idle()
        };
        pointer.tick(Some(&s), &held);
        assert!(pointer.is_button_held(SLOT_SELECT));
        pointer.tick(Some(&s), &held);
        pointer.tick(Some(&s), &idle());
        assert!(!pointer.is_button_held(SLOT_SELECT));

        // Drag fires on the press frame too
        assert_eq!(
            kinds(&events),
            vec![HandlerKind::Press, HandlerKind::Drag, HandlerKind::Drag, HandlerKind::Release]
        );
        let recorded = events.lock();
        assert_eq!(recorded[0], (SurfaceHandle(7), PointerEvent::Press { x: 100, y: 50, slot: 0 }));
        assert_eq!(recorded[3].1, PointerEvent::Release { x: 100, y: 50, slot: 0 });
    }

    #[test]
    fn test_back_uses_slot_one() {
        let (mut pointer, events) = setup();
        let s = surface(1);
        pointer.tick(Some(&s), &idle());
        pointer.tick(Some(&s), &CursorInput { back: true, ..idle() });

        assert!(pointer.is_button_held(SLOT_BACK));
        assert!(!pointer.is_button_held(SLOT_SELECT));
        assert_eq!(events.lock()[0].1, PointerEvent::Press { x: 100, y: 50, slot: 1 });
    }

    #[test]
    fn test_slots_are_held_independently() {
        let (mut pointer, events) = setup();
        let s = surface(1);
        pointer.tick(Some(&s), &idle());
        pointer.tick(Some(&s), &CursorInput { select: true, ..idle() });
        pointer.tick(Some(&s), &CursorInput { select: true, back: true, ..idle() });
        assert!(pointer.is_button_held(SLOT_SELECT));
        assert!(pointer.is_button_held(SLOT_BACK));
        assert_eq!(pointer.shared().read().held, [true, true]);

        events.lock().clear();
        pointer.tick(Some(&s), &CursorInput { back: true, ..idle() });
        assert!(!pointer.is_button_held(SLOT_SELECT));
        assert!(pointer.is_button_held(SLOT_BACK));

        let recorded = events.lock();
        assert_eq!(recorded[0].1, PointerEvent::Release { x: 100, y: 50, slot: 0 });
        assert_eq!(recorded[1].1.kind(), HandlerKind::Drag);
        assert_eq!(recorded.len(), 2);
    }

    #[test]
    fn test_focus_loss_releases_both_slots() {
        let (mut pointer, events) = setup();
        let s = surface(4);
        let both = CursorInput { select: true, back: true, ..idle() };
        pointer.tick(Some(&s), &idle());
        pointer.tick(Some(&s), &CursorInput { select: true, ..idle() });
        pointer.tick(Some(&s), &both);
        pointer.tick(None, &both);

        assert!(!pointer.is_button_held(SLOT_SELECT));
        assert!(!pointer.is_button_held(SLOT_BACK));

        let recorded = events.lock();
        let buttons: Vec<_> = recorded
            .iter()
            .filter(|(_, e)| e.kind() != HandlerKind::Drag)
            .copied()
            .collect();
        assert_eq!(
            buttons,
            vec![
                (SurfaceHandle(4), PointerEvent::Press { x: 100, y: 50, slot: 0 }),
                (SurfaceHandle(4), PointerEvent::Press { x: 100, y: 50, slot: 1 }),
                (SurfaceHandle(4), PointerEvent::Release { x: 100, y: 50, slot: 0 }),
                (SurfaceHandle(4), PointerEvent::Release { x: 100, y: 50, slot: 1 }),
            ]
        );
    }

    #[test]
    fn test_surface_switch_releases_on_pressed_surface() {
        let (mut pointer, events) = setup();
        let held = CursorInput { select: true, ..idle() };
        pointer.tick(Some(&surface(1)), &idle());
        pointer.tick(Some(&surface(1)), &held);

        // Select still down while focus moves to another surface
        events.lock().clear();
        pointer.tick(Some(&surface(2)), &held);
        assert!(!pointer.is_button_held(SLOT_SELECT));
        assert_eq!(
            *events.lock(),
            vec![(SurfaceHandle(1), PointerEvent::Release { x: 100, y: 50, slot: 0 })]
        );

        // Letting go afterwards reaches neither surface, and no press leaks into the new one
        events.lock().clear();
        pointer.tick(Some(&surface(2)), &idle());
        assert!(events.lock().is_empty());

        pointer.tick(Some(&surface(2)), &held);
        assert_eq!(
            events.lock()[0],
            (SurfaceHandle(2), PointerEvent::Press { x: 100, y: 50, slot: 0 })
        );
    }

    #[test]
    fn test_step_defers_delivery() {
        let (mut pointer, events) = setup();
        let s = surface(1);
        let pending = pointer.step(Some(&s), &CursorInput { select: true, ..idle() });

        assert!(events.lock().is_empty());
        assert_eq!(pending.events().len(), 2);
        assert!(pointer.is_button_held(SLOT_SELECT));

        pending.deliver();
        assert_eq!(kinds(&events), vec![HandlerKind::Press, HandlerKind::Drag]);
    }

    #[test]
    fn test_focus_loss_force_releases() {
        let (mut pointer, events) = setup();
        let s = surface(3);
        pointer.tick(Some(&s), &idle());
        pointer.tick(Some(&s), &CursorInput { select: true, ..idle() });

        // Select still physically held when the surface closes
        pointer.tick(None, &CursorInput { select: true, ..idle() });
        assert_eq!(pointer.state(), PointerState::Inactive);
        assert!(!pointer.is_button_held(SLOT_SELECT));
        assert!(!pointer.shared().read().active);

        let recorded = events.lock();
        let last = recorded.last().copied();
        assert_eq!(
            last,
            Some((SurfaceHandle(3), PointerEvent::Release { x: 100, y: 50, slot: 0 }))
        );
    }

    #[test]
    fn test_refocus_clears_button_history() {
        let (mut pointer, events) = setup();
        let s = surface(1);
        pointer.tick(Some(&s), &idle());
        pointer.tick(None, &idle());

        // Select held across the reopen counts as a fresh press
        pointer.tick(Some(&s), &CursorInput { select: true, ..idle() });
        assert!(pointer.is_button_held(SLOT_SELECT));
        assert_eq!(kinds(&events), vec![HandlerKind::Press, HandlerKind::Drag]);
    }

    #[test]
    fn test_no_events_while_inactive() {
        let (mut pointer, events) = setup();
        pointer.tick(None, &CursorInput { select: true, axis_x: 1.0, ..idle() });
        assert!(events.lock().is_empty());
        assert_eq!(pointer.cursor_position(), (0.0, 0.0));
    }
}
