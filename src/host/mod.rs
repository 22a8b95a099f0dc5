//! Host application seam
//!
//! The host owns its surfaces and its real pointer. This crate only sees
//! them through [`SurfaceHost`] (focus, metrics, late-bound event handlers)
//! and [`PointerDevice`] (the unintercepted real pointer).

pub mod console;

use crate::error::HostError;
use std::fmt;
use std::sync::Arc;

/// Opaque identity of a host surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Logical size of a surface and its GUI → device scale factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMetrics {
    pub width: f32,
    pub height: f32,
    pub scale_factor: f32,
}

impl SurfaceMetrics {
    pub fn new(width: f32, height: f32, scale_factor: f32) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// The surface that currently has focus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusedSurface {
    pub handle: SurfaceHandle,
    pub metrics: SurfaceMetrics,
}

/// Synthetic pointer event delivered to a surface, in GUI coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press { x: i32, y: i32, slot: i32 },
    Release { x: i32, y: i32, slot: i32 },
    Drag { x: i32, y: i32, slot: i32, since_press_ms: u64 },
}

impl PointerEvent {
    pub fn kind(&self) -> HandlerKind {
        match self {
            PointerEvent::Press { .. } => HandlerKind::Press,
            PointerEvent::Release { .. } => HandlerKind::Release,
            PointerEvent::Drag { .. } => HandlerKind::Drag,
        }
    }
}

/// Which surface operation a handler stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Press,
    Release,
    Drag,
}

impl HandlerKind {
    /// Names the host may know the operation by, readable name first
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            HandlerKind::Press => &["mouseClicked", "func_73864_a"],
            HandlerKind::Release => &["mouseReleased", "mouseMovedOrUp", "func_146286_b"],
            HandlerKind::Drag => &["mouseClickMove", "func_146273_a"],
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Press => f.write_str("press"),
            HandlerKind::Release => f.write_str("release"),
            HandlerKind::Drag => f.write_str("drag"),
        }
    }
}

/// A resolved surface operation
pub type SurfaceHandler =
    Arc<dyn Fn(&SurfaceHandle, &PointerEvent) -> Result<(), HostError> + Send + Sync>;

/// Host application as seen by the virtual pointer and the session
pub trait SurfaceHost: Send + Sync {
    /// The pointer-consuming surface with focus, if any
    fn focused_surface(&self) -> Option<FocusedSurface>;

    /// Look up a surface operation by any of its candidate names
    ///
    /// Called once per kind at construction; `None` means the host's API
    /// shape has no such operation.
    fn resolve_handler(&self, kind: HandlerKind, candidates: &[&str]) -> Option<SurfaceHandler>;
}

/// The host's real pointer, read without interception
pub trait PointerDevice: Send + Sync {
    /// X in device space
    fn x(&self) -> i32;

    /// Y in device space (origin at the bottom)
    fn y(&self) -> i32;

    fn is_button_down(&self, slot: i32) -> bool;
}
