//! Physical gamepad layout (SDL2 GameController indices)
//!
//! Every index in this crate (normalizer slots, binding targets, the
//! persisted bindings file) uses the SDL2 GameController numbering, so
//! a saved binding means the same physical control regardless of which
//! backend produced the events.
//!
//! ```text
//!        [Y=3]
//!   [X=2]     [B=1]
//!        [A=0]
//! ```

/// Left stick X
pub const AXIS_LEFT_X: i32 = 0;
/// Left stick Y (down is positive)
pub const AXIS_LEFT_Y: i32 = 1;
/// Right stick X
pub const AXIS_RIGHT_X: i32 = 2;
/// Right stick Y (down is positive)
pub const AXIS_RIGHT_Y: i32 = 3;
/// Left trigger (LT/L2), 0.0 to 1.0
pub const AXIS_TRIGGER_LEFT: i32 = 4;
/// Right trigger (RT/R2), 0.0 to 1.0
pub const AXIS_TRIGGER_RIGHT: i32 = 5;

/// Number of modeled axes
pub const AXIS_COUNT: usize = 6;

pub const BUTTON_A: i32 = 0;
pub const BUTTON_B: i32 = 1;
pub const BUTTON_X: i32 = 2;
pub const BUTTON_Y: i32 = 3;
pub const BUTTON_BACK: i32 = 4;
pub const BUTTON_GUIDE: i32 = 5;
pub const BUTTON_START: i32 = 6;
pub const BUTTON_L3: i32 = 7;
pub const BUTTON_R3: i32 = 8;
pub const BUTTON_LB: i32 = 9;
pub const BUTTON_RB: i32 = 10;
pub const BUTTON_DPAD_UP: i32 = 11;
pub const BUTTON_DPAD_DOWN: i32 = 12;
pub const BUTTON_DPAD_LEFT: i32 = 13;
pub const BUTTON_DPAD_RIGHT: i32 = 14;

/// Number of modeled button slots. Devices may report more; those are ignored.
pub const BUTTON_COUNT: usize = 16;

/// Physical index of an explicitly unbound binding
pub const UNBOUND: i32 = -1;

/// True for the four stick axes (the ones that get deadzone treatment)
pub fn is_stick_axis(axis: i32) -> bool {
    (AXIS_LEFT_X..=AXIS_RIGHT_Y).contains(&axis)
}

/// True for the two analog trigger axes
pub fn is_trigger_axis(axis: i32) -> bool {
    axis == AXIS_TRIGGER_LEFT || axis == AXIS_TRIGGER_RIGHT
}

/// Display name for a physical index
///
/// Trigger-class bindings index axes, button-class bindings index buttons,
/// so the caller says which space `index` lives in.
pub fn button_name(index: i32, is_trigger: bool) -> &'static str {
    if index == UNBOUND {
        return "---";
    }

    if is_trigger {
        return match index {
            AXIS_TRIGGER_LEFT => "LT",
            AXIS_TRIGGER_RIGHT => "RT",
            _ => "?",
        };
    }

    match index {
        BUTTON_A => "A",
        BUTTON_B => "B",
        BUTTON_X => "X",
        BUTTON_Y => "Y",
        BUTTON_BACK => "Back",
        BUTTON_GUIDE => "Guide",
        BUTTON_START => "Start",
        BUTTON_L3 => "L3",
        BUTTON_R3 => "R3",
        BUTTON_LB => "LB",
        BUTTON_RB => "RB",
        BUTTON_DPAD_UP => "D-Up",
        BUTTON_DPAD_DOWN => "D-Down",
        BUTTON_DPAD_LEFT => "D-Left",
        BUTTON_DPAD_RIGHT => "D-Right",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_names() {
        assert_eq!(button_name(BUTTON_A, false), "A");
        assert_eq!(button_name(BUTTON_DPAD_RIGHT, false), "D-Right");
        assert_eq!(button_name(UNBOUND, false), "---");
        assert_eq!(button_name(42, false), "?");
    }

    #[test]
    fn test_trigger_names_use_axis_space() {
        assert_eq!(button_name(AXIS_TRIGGER_RIGHT, true), "RT");
        assert_eq!(button_name(AXIS_TRIGGER_LEFT, true), "LT");
        // Button 5 is Guide, axis 5 is the right trigger
        assert_eq!(button_name(5, false), "Guide");
        assert_eq!(button_name(0, true), "?");
    }

    #[test]
    fn test_axis_classes() {
        assert!(is_stick_axis(AXIS_LEFT_X));
        assert!(is_stick_axis(AXIS_RIGHT_Y));
        assert!(!is_stick_axis(AXIS_TRIGGER_LEFT));
        assert!(is_trigger_axis(AXIS_TRIGGER_RIGHT));
        assert!(!is_trigger_axis(AXIS_LEFT_Y));
    }
}
