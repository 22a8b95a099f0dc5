//! Console host - a headless stand-in for a real host application
//!
//! Surfaces are simulated: the game side opens one when an inventory or
//! menu action fires, and the back button closes it. Every delivered
//! pointer event is logged, which makes this useful for:
//! - checking bindings against a real controller without a host
//! - watching arbitration and cursor movement in the logs

use super::{
    FocusedSurface, HandlerKind, PointerDevice, PointerEvent, SurfaceHandle, SurfaceHandler,
    SurfaceHost, SurfaceMetrics,
};
use crate::cursor::SLOT_BACK;
use crate::error::HostError;
use crate::input::Action;
use crate::session::GameActions;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Operations the console surfaces implement, by name
const OPERATIONS: &[(&str, HandlerKind)] = &[
    ("mouseClicked", HandlerKind::Press),
    ("mouseReleased", HandlerKind::Release),
    ("mouseClickMove", HandlerKind::Drag),
];

#[derive(Debug, Default)]
struct Surfaces {
    open: Option<(SurfaceHandle, String)>,
    next_id: u64,
}

/// Simulated host with at most one open surface
pub struct ConsoleHost {
    metrics: SurfaceMetrics,
    surfaces: Arc<Mutex<Surfaces>>,
    delivered: Arc<AtomicU64>,
}

impl ConsoleHost {
    pub fn new(metrics: SurfaceMetrics) -> Self {
        Self {
            metrics,
            surfaces: Arc::new(Mutex::new(Surfaces::default())),
            delivered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open a surface, replacing any open one
    pub fn open_surface(&self, title: &str) -> SurfaceHandle {
        let mut surfaces = self.surfaces.lock();
        surfaces.next_id += 1;
        let handle = SurfaceHandle(surfaces.next_id);
        if let Some((previous, _)) = surfaces.open.replace((handle, title.to_string())) {
            debug!("{} replaced by {}", previous, handle);
        }
        info!(
            "📋 Opened {} \"{}\" ({}x{} @{})",
            handle, title, self.metrics.width, self.metrics.height, self.metrics.scale_factor
        );
        handle
    }

    pub fn close_surface(&self) -> Option<SurfaceHandle> {
        let closed = self.surfaces.lock().open.take().map(|(handle, _)| handle);
        if let Some(handle) = closed {
            info!("📋 Closed {}", handle);
        }
        closed
    }

    pub fn is_open(&self) -> bool {
        self.surfaces.lock().open.is_some()
    }

    /// Pointer events accepted by a surface so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn handler(&self) -> SurfaceHandler {
        let surfaces = self.surfaces.clone();
        let delivered = self.delivered.clone();

        Arc::new(move |surface: &SurfaceHandle, event: &PointerEvent| -> Result<(), HostError> {
            let mut open = surfaces.lock();
            match &open.open {
                Some((handle, _)) if handle == surface => {}
                _ => return Err(HostError::SurfaceGone(surface.0)),
            }
            delivered.fetch_add(1, Ordering::Relaxed);

            match *event {
                PointerEvent::Press { x, y, slot } => {
                    info!("🖱️  {} press slot {} at ({}, {})", surface, slot, x, y);
                    if slot == SLOT_BACK {
                        open.open = None;
                        info!("📋 Closed {} (back)", surface);
                    }
                }
                PointerEvent::Release { x, y, slot } => {
                    info!("🖱️  {} release slot {} at ({}, {})", surface, slot, x, y);
                }
                PointerEvent::Drag {
                    x,
                    y,
                    slot,
                    since_press_ms,
                } => {
                    trace!(
                        "{} drag slot {} at ({}, {}), {}ms since press",
                        surface, slot, x, y, since_press_ms
                    );
                }
            }
            Ok(())
        })
    }
}

impl SurfaceHost for ConsoleHost {
    fn focused_surface(&self) -> Option<FocusedSurface> {
        self.surfaces.lock().open.as_ref().map(|(handle, _)| FocusedSurface {
            handle: *handle,
            metrics: self.metrics,
        })
    }

    fn resolve_handler(&self, kind: HandlerKind, candidates: &[&str]) -> Option<SurfaceHandler> {
        let found = candidates
            .iter()
            .any(|name| OPERATIONS.iter().any(|(op, op_kind)| op == name && *op_kind == kind));
        found.then(|| self.handler())
    }
}

/// Game sink that logs actions and opens console surfaces for menus
pub struct ConsoleGame {
    host: Arc<ConsoleHost>,
    held: HashSet<Action>,
    hotbar_slot: i32,
}

impl ConsoleGame {
    pub fn new(host: Arc<ConsoleHost>) -> Self {
        Self {
            host,
            held: HashSet::new(),
            hotbar_slot: 0,
        }
    }

    pub fn hotbar_slot(&self) -> i32 {
        self.hotbar_slot
    }
}

impl GameActions for ConsoleGame {
    fn set_held(&mut self, action: Action, held: bool) {
        let changed = if held {
            self.held.insert(action)
        } else {
            self.held.remove(&action)
        };
        if changed {
            info!("🎮 {} {}", action, if held { "down" } else { "up" });
        }
    }

    fn fire(&mut self, action: Action) {
        match action {
            Action::Inventory => {
                self.host.open_surface("inventory");
            }
            Action::Pause => {
                self.host.open_surface("pause menu");
            }
            Action::OpenChat => {
                self.host.open_surface("chat");
            }
            Action::HotbarNext => {
                self.hotbar_slot = (self.hotbar_slot + 1).rem_euclid(9);
                info!("🎮 Hotbar slot {}", self.hotbar_slot);
            }
            Action::HotbarPrev => {
                self.hotbar_slot = (self.hotbar_slot - 1).rem_euclid(9);
                info!("🎮 Hotbar slot {}", self.hotbar_slot);
            }
            other => info!("🎮 {}", other),
        }
    }

    fn movement(&mut self, x: f32, y: f32) {
        if x != 0.0 || y != 0.0 {
            trace!("move ({:.2}, {:.2})", x, y);
        }
    }

    fn look(&mut self, dx: f32, dy: f32) {
        trace!("look ({:.2}, {:.2})", dx, dy);
    }

    fn release_all(&mut self) {
        if !self.held.is_empty() {
            debug!("Releasing {} held action(s)", self.held.len());
            self.held.clear();
        }
    }
}

/// Real pointer of the console host; nothing moves unless told to
#[derive(Debug, Default)]
pub struct ConsolePointer {
    x: AtomicI32,
    y: AtomicI32,
    left: AtomicBool,
    right: AtomicBool,
}

impl ConsolePointer {
    pub fn move_to(&self, x: i32, y: i32) {
        self.x.store(x, Ordering::Relaxed);
        self.y.store(y, Ordering::Relaxed);
    }

    pub fn set_button(&self, slot: i32, down: bool) {
        match slot {
            0 => self.left.store(down, Ordering::Relaxed),
            1 => self.right.store(down, Ordering::Relaxed),
            _ => {}
        }
    }
}

impl PointerDevice for ConsolePointer {
    fn x(&self) -> i32 {
        self.x.load(Ordering::Relaxed)
    }

    fn y(&self) -> i32 {
        self.y.load(Ordering::Relaxed)
    }

    fn is_button_down(&self, slot: i32) -> bool {
        match slot {
            0 => self.left.load(Ordering::Relaxed),
            1 => self.right.load(Ordering::Relaxed),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::SurfaceDispatch;

    fn host() -> Arc<ConsoleHost> {
        Arc::new(ConsoleHost::new(SurfaceMetrics::new(320.0, 240.0, 2.0)))
    }

    #[test]
    fn test_resolves_all_handlers() {
        let host = host();
        assert!(SurfaceDispatch::resolve(host.as_ref()).is_complete());
        assert!(host
            .resolve_handler(HandlerKind::Press, &["func_73864_a"])
            .is_none());
    }

    #[test]
    fn test_back_press_closes_surface() {
        let host = host();
        let dispatch = SurfaceDispatch::resolve(host.as_ref());
        let handle = host.open_surface("inventory");
        assert_eq!(host.focused_surface().map(|f| f.handle), Some(handle));

        dispatch.dispatch(&handle, &PointerEvent::Press { x: 1, y: 1, slot: 0 });
        assert!(host.is_open());
        dispatch.dispatch(&handle, &PointerEvent::Press { x: 1, y: 1, slot: SLOT_BACK });
        assert!(!host.is_open());

        // Late events for a closed surface are rejected, not counted
        dispatch.dispatch(&handle, &PointerEvent::Release { x: 1, y: 1, slot: SLOT_BACK });
        assert_eq!(host.delivered(), 2);
    }

    #[test]
    fn test_game_opens_menus_and_tracks_hotbar() {
        let host = host();
        let mut game = ConsoleGame::new(host.clone());

        game.fire(Action::HotbarPrev);
        assert_eq!(game.hotbar_slot(), 8);
        game.fire(Action::HotbarNext);
        assert_eq!(game.hotbar_slot(), 0);

        assert!(!host.is_open());
        game.fire(Action::Pause);
        assert!(host.is_open());
    }

    #[test]
    fn test_pointer_buttons() {
        let pointer = ConsolePointer::default();
        pointer.set_button(1, true);
        pointer.move_to(10, 20);
        assert!(pointer.is_button_down(1));
        assert!(!pointer.is_button_down(0));
        assert_eq!((pointer.x(), pointer.y()), (10, 20));
    }
}
