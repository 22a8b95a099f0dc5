//! Interception surface
//!
//! Rewritten call sites land on these three exported symbols. They read
//! the engine installed with [`install`]; with none installed they
//! report a pointer at the origin with no buttons down.

use super::ArbitrationEngine;
use parking_lot::{const_rwlock, RwLock};
use std::sync::Arc;
use tracing::info;

/// Exported symbol for the X query
pub const HOOK_POINTER_X: &str = "hookPointerX";
/// Exported symbol for the Y query
pub const HOOK_POINTER_Y: &str = "hookPointerY";
/// Exported symbol for the button query
pub const HOOK_BUTTON_DOWN: &str = "hookButtonDown";

static ENGINE: RwLock<Option<Arc<ArbitrationEngine>>> = const_rwlock(None);

/// Route the hooks to `engine`, returning the previously installed one
pub fn install(engine: Arc<ArbitrationEngine>) -> Option<Arc<ArbitrationEngine>> {
    let previous = ENGINE.write().replace(engine);
    info!("Pointer hooks installed");
    previous
}

/// Detach the hooks; they fall back to 0 / false
pub fn uninstall() -> Option<Arc<ArbitrationEngine>> {
    let previous = ENGINE.write().take();
    if previous.is_some() {
        info!("Pointer hooks uninstalled");
    }
    previous
}

pub fn installed() -> Option<Arc<ArbitrationEngine>> {
    ENGINE.read().clone()
}

fn with_engine<R>(fallback: R, f: impl FnOnce(&ArbitrationEngine) -> R) -> R {
    // Clone out so the global lock is not held while the engine is queried
    match installed() {
        Some(engine) => f(&engine),
        None => fallback,
    }
}

#[export_name = "hookPointerX"]
pub extern "C" fn hook_pointer_x() -> i32 {
    with_engine(0, |engine| engine.query_x())
}

#[export_name = "hookPointerY"]
pub extern "C" fn hook_pointer_y() -> i32 {
    with_engine(0, |engine| engine.query_y())
}

#[export_name = "hookButtonDown"]
pub extern "C" fn hook_button_down(slot: i32) -> bool {
    with_engine(false, |engine| engine.query_button_down(slot))
}
