//! Input arbitration
//!
//! Decides, per query, whether the real pointer or the virtual pointer is
//! authoritative. Controller mode is entered by sustained controller input
//! ([`ArbitrationEngine::set_controller_input_active`]) and left the
//! instant the real pointer clicks ([`ArbitrationEngine::check_real_device`]).
//!
//! Button queries OR the two sources together so a real click always
//! lands, even in the middle of a controller session.
//!
//! Locking: queries only read the snapshot and the published cursor. The
//! pointer itself sits behind a mutex that only the frame driver takes, and
//! never across a call into the host, so a handler that queries the hooks
//! or touches the pointer while an event is being dispatched cannot
//! deadlock the frame.

pub mod coords;
pub mod hooks;

use crate::cursor::{CursorInput, SharedCursor, VirtualCursorState, VirtualPointer};
use crate::host::{FocusedSurface, PointerDevice};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

/// Process-wide arbitration flags
///
/// Always replaced as a whole; readers never observe a half-written pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbitrationSnapshot {
    pub controller_mode_active: bool,
    pub enabled: bool,
}

impl Default for ArbitrationSnapshot {
    fn default() -> Self {
        Self {
            controller_mode_active: false,
            enabled: true,
        }
    }
}

pub struct ArbitrationEngine {
    snapshot: RwLock<ArbitrationSnapshot>,
    cursor: RwLock<Option<SharedCursor>>,
    pointer: Mutex<Option<VirtualPointer>>,
    device: Arc<dyn PointerDevice>,
}

impl ArbitrationEngine {
    pub fn new(device: Arc<dyn PointerDevice>) -> Self {
        Self {
            snapshot: RwLock::new(ArbitrationSnapshot::default()),
            cursor: RwLock::new(None),
            pointer: Mutex::new(None),
            device,
        }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.set_enabled(enabled);
        self
    }

    pub fn snapshot(&self) -> ArbitrationSnapshot {
        *self.snapshot.read()
    }

    fn publish(&self, update: impl FnOnce(ArbitrationSnapshot) -> ArbitrationSnapshot) -> ArbitrationSnapshot {
        let mut guard = self.snapshot.write();
        let previous = *guard;
        *guard = update(previous);
        previous
    }

    pub fn is_enabled(&self) -> bool {
        self.snapshot().enabled
    }

    /// Global on/off switch, independent of the current mode
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.publish(|s| ArbitrationSnapshot { enabled, ..s });
        if previous.enabled != enabled {
            info!("Virtual pointer {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    pub fn is_controller_mode_active(&self) -> bool {
        self.snapshot().controller_mode_active
    }

    /// Report qualifying controller input (or its absence)
    pub fn set_controller_input_active(&self, active: bool) {
        let previous = self.publish(|s| ArbitrationSnapshot {
            controller_mode_active: active,
            ..s
        });
        if active && !previous.controller_mode_active {
            info!("Input mode: controller");
        }
    }

    /// Install a pointer, dropping any previous one without carrying state over
    pub fn install_pointer(&self, pointer: VirtualPointer) {
        let shared = pointer.shared();
        let previous = self.pointer.lock().replace(pointer);
        *self.cursor.write() = Some(shared);
        if previous.is_some() {
            debug!("Replaced installed virtual pointer");
        }
    }

    pub fn remove_pointer(&self) -> Option<VirtualPointer> {
        *self.cursor.write() = None;
        self.pointer.lock().take()
    }

    pub fn has_pointer(&self) -> bool {
        self.cursor.read().is_some()
    }

    /// Run `f` against the installed pointer
    pub fn with_pointer<R>(&self, f: impl FnOnce(&mut VirtualPointer) -> R) -> Option<R> {
        self.pointer.lock().as_mut().map(f)
    }

    /// Last published cursor state, if a pointer is installed
    pub fn cursor_state(&self) -> Option<VirtualCursorState> {
        self.cursor.read().as_ref().map(|shared| *shared.read())
    }

    /// Advance the installed pointer by one frame
    ///
    /// Events are delivered after the pointer lock is released, so a host
    /// handler may call back into the engine.
    pub fn frame(&self, focused: Option<&FocusedSurface>, input: &CursorInput) {
        let pending = self
            .pointer
            .lock()
            .as_mut()
            .map(|pointer| pointer.step(focused, input));

        if let Some(pending) = pending {
            pending.deliver();
        }
    }

    /// Leave controller mode if the real pointer has a button down
    ///
    /// Runs once per frame, after the virtual pointer, so a real click in
    /// the same frame as controller input still wins.
    pub fn check_real_device(&self) {
        let snapshot = self.snapshot();
        if !snapshot.enabled || !snapshot.controller_mode_active {
            return;
        }

        if self.device.is_button_down(0) || self.device.is_button_down(1) {
            self.publish(|s| ArbitrationSnapshot {
                controller_mode_active: false,
                ..s
            });
            info!("Input mode: mouse (click)");
        }
    }

    /// Cursor state when the virtual pointer is authoritative
    fn authoritative_cursor(&self) -> Option<VirtualCursorState> {
        let snapshot = self.snapshot();
        if !snapshot.enabled || !snapshot.controller_mode_active {
            return None;
        }
        self.cursor_state().filter(|c| c.active)
    }

    /// Pointer X in device space
    pub fn query_x(&self) -> i32 {
        match self.authoritative_cursor() {
            Some(c) => coords::gui_to_device_x(c.x, c.metrics.scale_factor) as i32,
            None => self.device.x(),
        }
    }

    /// Pointer Y in device space (bottom-left origin)
    pub fn query_y(&self) -> i32 {
        match self.authoritative_cursor() {
            Some(c) => coords::gui_to_device_y(c.y, c.metrics.height, c.metrics.scale_factor) as i32,
            None => self.device.y(),
        }
    }

    /// Real button OR virtual held button
    pub fn query_button_down(&self, slot: i32) -> bool {
        if self.device.is_button_down(slot) {
            return true;
        }

        if !self.is_enabled() {
            return false;
        }
        self.cursor_state()
            .is_some_and(|c| c.active && c.is_button_held(slot))
    }
}

impl std::fmt::Debug for ArbitrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrationEngine")
            .field("snapshot", &self.snapshot())
            .field("cursor", &self.cursor_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{SurfaceDispatch, SLOT_BACK, SLOT_SELECT};
    use crate::error::HostError;
    use crate::host::{HandlerKind, PointerEvent, SurfaceHandle, SurfaceHandler, SurfaceHost, SurfaceMetrics};
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    #[derive(Default)]
    struct FakeMouse {
        x: AtomicI32,
        y: AtomicI32,
        left: AtomicBool,
        right: AtomicBool,
    }

    impl PointerDevice for FakeMouse {
        fn x(&self) -> i32 {
            self.x.load(Ordering::SeqCst)
        }

        fn y(&self) -> i32 {
            self.y.load(Ordering::SeqCst)
        }

        fn is_button_down(&self, slot: i32) -> bool {
            match slot {
                0 => self.left.load(Ordering::SeqCst),
                1 => self.right.load(Ordering::SeqCst),
                _ => false,
            }
        }
    }

    fn engine() -> (ArbitrationEngine, Arc<FakeMouse>) {
        let mouse = Arc::new(FakeMouse::default());
        mouse.x.store(640, Ordering::SeqCst);
        mouse.y.store(360, Ordering::SeqCst);
        let engine = ArbitrationEngine::new(mouse.clone());
        engine.install_pointer(VirtualPointer::new(SurfaceDispatch::disabled(), 5.0));
        (engine, mouse)
    }

    fn surface() -> FocusedSurface {
        FocusedSurface {
            handle: SurfaceHandle(1),
            metrics: SurfaceMetrics::new(320.0, 240.0, 2.0),
        }
    }

    #[test]
    fn test_real_device_without_controller_mode() {
        let (engine, _) = engine();
        engine.frame(Some(&surface()), &CursorInput::default());
        assert_eq!(engine.query_x(), 640);
        assert_eq!(engine.query_y(), 360);
    }

    #[test]
    fn test_virtual_position_in_device_space() {
        let (engine, _) = engine();
        engine.set_controller_input_active(true);
        engine.frame(Some(&surface()), &CursorInput::default());

        // Centered at (160, 120) GUI
        assert_eq!(engine.query_x(), 320);
        assert_eq!(engine.query_y(), 240);

        let input = CursorInput {
            axis_x: 1.0,
            axis_y: 1.0,
            ..CursorInput::default()
        };
        engine.frame(Some(&surface()), &input);
        assert_eq!(engine.query_x(), 330);
        // Down in GUI space is down in device space too: Y shrinks
        assert_eq!(engine.query_y(), 230);
    }

    #[test]
    fn test_inactive_cursor_falls_through() {
        let (engine, _) = engine();
        engine.set_controller_input_active(true);
        engine.frame(None, &CursorInput::default());
        assert_eq!(engine.query_x(), 640);
    }

    #[test]
    fn test_disabled_always_falls_through() {
        let (engine, _) = engine();
        engine.set_controller_input_active(true);
        engine.set_enabled(false);
        let select = CursorInput {
            select: true,
            ..CursorInput::default()
        };
        engine.frame(Some(&surface()), &select);

        assert_eq!(engine.query_x(), 640);
        assert_eq!(engine.query_y(), 360);
        assert!(!engine.query_button_down(SLOT_SELECT));
    }

    #[test]
    fn test_button_is_or_merge() {
        let (engine, mouse) = engine();
        let select = CursorInput {
            select: true,
            ..CursorInput::default()
        };
        engine.frame(Some(&surface()), &select);

        // Held virtual select counts regardless of mode
        assert!(engine.query_button_down(SLOT_SELECT));
        assert!(!engine.query_button_down(SLOT_BACK));

        mouse.right.store(true, Ordering::SeqCst);
        assert!(engine.query_button_down(SLOT_BACK));
    }

    #[test]
    fn test_real_click_exits_controller_mode() {
        let (engine, mouse) = engine();
        engine.set_controller_input_active(true);
        engine.check_real_device();
        assert!(engine.is_controller_mode_active());

        mouse.left.store(true, Ordering::SeqCst);
        // Sustained controller input in the same frame does not matter
        engine.set_controller_input_active(true);
        engine.check_real_device();
        assert!(!engine.is_controller_mode_active());
    }

    #[test]
    fn test_snapshot_replaced_whole() {
        let (engine, _) = engine();
        engine.set_enabled(false);
        engine.set_controller_input_active(true);
        assert_eq!(
            engine.snapshot(),
            ArbitrationSnapshot {
                controller_mode_active: true,
                enabled: false
            }
        );
    }

    #[test]
    fn test_replacing_pointer_does_not_carry_state() {
        let (engine, _) = engine();
        engine.set_controller_input_active(true);
        engine.frame(Some(&surface()), &CursorInput::default());
        assert!(engine.cursor_state().is_some_and(|c| c.active));

        engine.install_pointer(VirtualPointer::new(SurfaceDispatch::disabled(), 5.0));
        assert!(engine.cursor_state().is_some_and(|c| !c.active));
        assert_eq!(engine.query_x(), 640);

        assert!(engine.remove_pointer().is_some());
        assert!(!engine.has_pointer());
        assert!(!engine.query_button_down(SLOT_SELECT));
    }

    /// Host whose handlers reach back into the engine they are called from
    struct ReentrantHost {
        engine: Arc<Mutex<Option<Arc<ArbitrationEngine>>>>,
        seen: Arc<Mutex<Vec<(PointerEvent, Option<bool>)>>>,
    }

    impl SurfaceHost for ReentrantHost {
        fn focused_surface(&self) -> Option<FocusedSurface> {
            None
        }

        fn resolve_handler(&self, _kind: HandlerKind, _candidates: &[&str]) -> Option<SurfaceHandler> {
            let engine = self.engine.clone();
            let seen = self.seen.clone();
            Some(Arc::new(move |_: &SurfaceHandle, ev: &PointerEvent| -> Result<(), HostError> {
                let engine = engine.lock().clone();
                let held = engine.and_then(|e| e.with_pointer(|p| p.is_button_held(SLOT_SELECT)));
                seen.lock().push((*ev, held));
                Ok(())
            }))
        }
    }

    #[test]
    fn test_handlers_may_reenter_engine() {
        let slot = Arc::new(Mutex::new(None));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let host = ReentrantHost {
            engine: slot.clone(),
            seen: seen.clone(),
        };

        let engine = Arc::new(ArbitrationEngine::new(Arc::new(FakeMouse::default())));
        engine.install_pointer(VirtualPointer::new(SurfaceDispatch::resolve(&host), 5.0));
        *slot.lock() = Some(engine.clone());

        let select = CursorInput {
            select: true,
            ..CursorInput::default()
        };
        engine.frame(Some(&surface()), &select);
        engine.frame(Some(&surface()), &CursorInput::default());

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|(_, held)| held.is_some()));
        assert_eq!(seen[0], (PointerEvent::Press { x: 160, y: 120, slot: 0 }, Some(true)));
        assert_eq!(seen[2], (PointerEvent::Release { x: 160, y: 120, slot: 0 }, Some(false)));

        // Break the engine <-> handler cycle
        slot.lock().take();
    }
}
