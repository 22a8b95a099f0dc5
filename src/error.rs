//! Typed errors for the recoverable failure classes
//!
//! None of these ever reach the host's main loop: the rewriter turns a
//! [`ClassFileError`] into a pass-through, the session turns a
//! [`DeviceError`] into stale input, and the virtual pointer turns a
//! [`HostError`] into a skipped event.

use thiserror::Error;

/// Failure while parsing or re-encoding a class body
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("unexpected end of class data at offset {offset} (wanted {wanted} bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error("bad magic 0x{0:08X}")]
    BadMagic(u32),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("constant pool index {0} is out of range or of the wrong kind")]
    BadConstantIndex(u16),

    #[error("constant pool is full, cannot add hook entries")]
    ConstantPoolOverflow,

    #[error("unknown opcode 0x{opcode:02X} at pc {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error("instruction at pc {pc} runs past the end of the code array")]
    TruncatedInstruction { pc: usize },

    #[error("{0} trailing bytes after class body")]
    TrailingBytes(usize),

    #[error("{what} too large to encode ({len})")]
    TooLarge { what: &'static str, len: usize },
}

/// Failure reported by the device-polling backend
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device backend failed to initialize: {0}")]
    Init(String),

    #[error("device poll failed: {0}")]
    Poll(String),
}

/// Failure reported by a resolved host surface handler
#[derive(Debug, Error)]
pub enum HostError {
    #[error("surface handler failed: {0}")]
    Dispatch(String),

    #[error("surface {0} is gone")]
    SurfaceGone(u64),
}
