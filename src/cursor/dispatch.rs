//! Late-bound event dispatch into host surfaces
//!
//! Handlers are resolved once, when the pointer is built. A handler the
//! host does not provide is logged once and turns into a no-op; nothing
//! is looked up again per frame.

use crate::host::{HandlerKind, PointerEvent, SurfaceHandle, SurfaceHandler, SurfaceHost};
use tracing::{debug, info, warn};

/// Cached press/release/drag handlers
#[derive(Clone, Default)]
pub struct SurfaceDispatch {
    press: Option<SurfaceHandler>,
    release: Option<SurfaceHandler>,
    drag: Option<SurfaceHandler>,
}

impl SurfaceDispatch {
    /// Resolve all three handlers from the host
    pub fn resolve(host: &dyn SurfaceHost) -> Self {
        let lookup = |kind: HandlerKind| {
            let handler = host.resolve_handler(kind, kind.candidates());
            if handler.is_none() {
                warn!(
                    "No {} handler found on host surfaces (tried {:?}), synthetic {} events disabled",
                    kind,
                    kind.candidates(),
                    kind
                );
            }
            handler
        };

        let dispatch = Self {
            press: lookup(HandlerKind::Press),
            release: lookup(HandlerKind::Release),
            drag: lookup(HandlerKind::Drag),
        };

        if dispatch.is_complete() {
            info!("Surface handlers resolved");
        }
        dispatch
    }

    /// Dispatch with nothing resolved; every event is dropped
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.press.is_some() && self.release.is_some() && self.drag.is_some()
    }

    pub fn has(&self, kind: HandlerKind) -> bool {
        self.handler(kind).is_some()
    }

    fn handler(&self, kind: HandlerKind) -> Option<&SurfaceHandler> {
        match kind {
            HandlerKind::Press => self.press.as_ref(),
            HandlerKind::Release => self.release.as_ref(),
            HandlerKind::Drag => self.drag.as_ref(),
        }
    }

    /// Deliver one event; failures never propagate
    pub fn dispatch(&self, surface: &SurfaceHandle, event: &PointerEvent) {
        let kind = event.kind();
        let Some(handler) = self.handler(kind) else {
            return;
        };

        match (handler(surface, event), kind) {
            (Ok(()), _) => {}
            // Drags fire every frame; a failing one would flood the log
            (Err(_), HandlerKind::Drag) => {}
            (Err(e), _) => debug!("Failed to deliver {} to {}: {}", kind, surface, e),
        }
    }
}

impl std::fmt::Debug for SurfaceDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceDispatch")
            .field("press", &self.press.is_some())
            .field("release", &self.release.is_some())
            .field("drag", &self.drag.is_some())
            .finish()
    }
}
