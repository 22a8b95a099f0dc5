//! Axis deadzone normalization and double-buffered button state
//!
//! Raw device samples land here first. Stick axes get a per-axis deadzone
//! with linear rescaling, trigger axes pass through untouched (their
//! threshold is applied where they are consumed), and buttons are kept
//! in a current/previous pair so consumers can ask for the rising edge.
//!
//! # Frame discipline
//!
//! `update_*` calls write the current frame. Consumers read
//! [`Normalizer::is_pressed`] / [`Normalizer::is_just_pressed`] during the
//! frame. [`Normalizer::commit_frame`] copies current to previous and must
//! run after the last consumer and before the next frame's updates.

use tracing::trace;

use super::layout::{is_stick_axis, AXIS_COUNT, BUTTON_COUNT};

/// Upper bound for the configurable stick deadzone
pub const MAX_DEADZONE: f32 = 0.5;

/// Default stick deadzone
pub const DEFAULT_DEADZONE: f32 = 0.25;

/// Apply a per-axis deadzone and rescale the remaining range
///
/// Values with `|raw| < deadzone` become 0.0. Everything else maps
/// `[deadzone, 1.0]` linearly onto `[0.0, 1.0]`, keeping the sign.
/// `raw` is clamped to `[-1.0, 1.0]` first and non-finite input reads as 0.0.
///
/// # Example
/// ```
/// use padcursor::input::normalize::apply_deadzone;
///
/// assert_eq!(apply_deadzone(0.1, 0.25), 0.0);
/// assert_eq!(apply_deadzone(1.0, 0.25), 1.0);
/// assert_eq!(apply_deadzone(-1.0, 0.25), -1.0);
/// ```
pub fn apply_deadzone(raw: f32, deadzone: f32) -> f32 {
    if !raw.is_finite() {
        return 0.0;
    }

    let deadzone = clamp_deadzone(deadzone);
    let raw = raw.clamp(-1.0, 1.0);

    if raw.abs() < deadzone {
        return 0.0;
    }

    // Map [deadzone..1.0] → [0.0..1.0]
    let sign = raw.signum();
    sign * (raw.abs() - deadzone) / (1.0 - deadzone)
}

/// Clamp a deadzone into `[0.0, MAX_DEADZONE]`
pub fn clamp_deadzone(deadzone: f32) -> f32 {
    if deadzone.is_finite() {
        deadzone.clamp(0.0, MAX_DEADZONE)
    } else {
        DEFAULT_DEADZONE
    }
}

/// One logical axis: the last raw sample and its normalized value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LogicalAxis {
    pub id: i32,
    pub raw: f32,
    pub value: f32,
}

/// One logical button with its previous-frame state for edge detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogicalButton {
    pub id: i32,
    pub pressed: bool,
    pub pressed_previous: bool,
}

impl LogicalButton {
    /// Rising edge: pressed now, released last frame
    pub fn just_pressed(&self) -> bool {
        self.pressed && !self.pressed_previous
    }
}

/// Turns raw device samples into clean logical input
#[derive(Debug, Clone)]
pub struct Normalizer {
    deadzone: f32,
    axes: [LogicalAxis; AXIS_COUNT],
    buttons: [LogicalButton; BUTTON_COUNT],
}

impl Normalizer {
    /// Create a normalizer with the given stick deadzone (clamped to `[0, 0.5]`)
    pub fn new(deadzone: f32) -> Self {
        let mut axes = [LogicalAxis::default(); AXIS_COUNT];
        for (id, axis) in (0..).zip(axes.iter_mut()) {
            axis.id = id;
        }
        let mut buttons = [LogicalButton::default(); BUTTON_COUNT];
        for (id, button) in (0..).zip(buttons.iter_mut()) {
            button.id = id;
        }

        Self {
            deadzone: clamp_deadzone(deadzone),
            axes,
            buttons,
        }
    }

    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    /// Change the stick deadzone; already-stored values are renormalized
    pub fn set_deadzone(&mut self, deadzone: f32) {
        self.deadzone = clamp_deadzone(deadzone);
        for axis in self.axes.iter_mut().filter(|a| is_stick_axis(a.id)) {
            axis.value = apply_deadzone(axis.raw, self.deadzone);
        }
    }

    /// Record a raw axis sample
    ///
    /// Stick axes are deadzone-normalized; trigger axes are stored as-is.
    /// Unknown axis ids are ignored.
    pub fn update_axis(&mut self, axis_id: i32, raw_value: f32) {
        let deadzone = self.deadzone;
        let Some(axis) = slot_mut(&mut self.axes, axis_id) else {
            trace!("Ignoring unmodeled axis {}", axis_id);
            return;
        };

        axis.raw = raw_value;
        axis.value = if is_stick_axis(axis_id) {
            apply_deadzone(raw_value, deadzone)
        } else if raw_value.is_finite() {
            raw_value
        } else {
            0.0
        };
    }

    /// Record a button state in the current-frame buffer
    ///
    /// Out-of-range ids are ignored: devices may report indices beyond
    /// the modeled set.
    pub fn update_button(&mut self, button_id: i32, pressed: bool) {
        match slot_mut(&mut self.buttons, button_id) {
            Some(button) => button.pressed = pressed,
            None => trace!("Ignoring unmodeled button {}", button_id),
        }
    }

    /// Normalized axis value (0.0 for unknown ids)
    pub fn axis(&self, axis_id: i32) -> f32 {
        slot(&self.axes, axis_id).map_or(0.0, |a| a.value)
    }

    /// Last raw sample for an axis (0.0 for unknown ids)
    pub fn raw_axis(&self, axis_id: i32) -> f32 {
        slot(&self.axes, axis_id).map_or(0.0, |a| a.raw)
    }

    /// Current-frame button state (false for unknown ids)
    pub fn is_pressed(&self, button_id: i32) -> bool {
        slot(&self.buttons, button_id).is_some_and(|b| b.pressed)
    }

    /// True only on the frame the button went from released to pressed
    ///
    /// Valid until [`Self::commit_frame`] runs.
    pub fn is_just_pressed(&self, button_id: i32) -> bool {
        slot(&self.buttons, button_id).is_some_and(LogicalButton::just_pressed)
    }

    /// True if any modeled button is held this frame
    pub fn any_pressed(&self) -> bool {
        self.buttons.iter().any(|b| b.pressed)
    }

    /// True if either stick reads non-zero after the deadzone
    pub fn any_stick_moved(&self) -> bool {
        self.axes
            .iter()
            .any(|a| is_stick_axis(a.id) && a.value != 0.0)
    }

    pub fn axes(&self) -> &[LogicalAxis] {
        &self.axes
    }

    pub fn buttons(&self) -> &[LogicalButton] {
        &self.buttons
    }

    /// Frame boundary: copy current button state into the previous buffer
    pub fn commit_frame(&mut self) {
        for button in self.buttons.iter_mut() {
            button.pressed_previous = button.pressed;
        }
    }

    /// Drop all input (device disconnected)
    pub fn reset(&mut self) {
        for axis in self.axes.iter_mut() {
            axis.raw = 0.0;
            axis.value = 0.0;
        }
        for button in self.buttons.iter_mut() {
            button.pressed = false;
            button.pressed_previous = false;
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DEADZONE)
    }
}

fn slot<T>(items: &[T], id: i32) -> Option<&T> {
    usize::try_from(id).ok().and_then(|i| items.get(i))
}

fn slot_mut<T>(items: &mut [T], id: i32) -> Option<&mut T> {
    usize::try_from(id).ok().and_then(move |i| items.get_mut(i))
}
