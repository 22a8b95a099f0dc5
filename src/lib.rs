//! padcursor - drive a mouse-only application with a gamepad
//!
//! Three pieces cooperate:
//! - [`input`] turns raw controller events into logical actions
//! - [`cursor`] moves a virtual pointer over the focused host surface and
//!   synthesizes clicks and drags into it
//! - [`arbitration`] answers the host's pointer queries from either the
//!   real mouse or the virtual pointer, and [`rewriter`] redirects the
//!   host's compiled pointer calls onto those answers
//!
//! [`session`] runs them together once per frame.

pub mod arbitration;
pub mod config;
pub mod cursor;
pub mod error;
pub mod host;
pub mod input;
pub mod paths;
pub mod rewriter;
pub mod session;
