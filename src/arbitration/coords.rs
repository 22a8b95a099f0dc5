//! GUI space ↔ device space
//!
//! GUI space has its origin at the top-left in logical pixels. Device space
//! is physical pixels with the origin at the bottom-left, so Y flips.

/// GUI X to device X
pub fn gui_to_device_x(gui_x: f32, scale_factor: f32) -> f32 {
    gui_x * scale_factor
}

/// GUI Y to device Y, flipping against the logical surface height
pub fn gui_to_device_y(gui_y: f32, surface_height: f32, scale_factor: f32) -> f32 {
    (surface_height - gui_y) * scale_factor
}

/// Inverse of [`gui_to_device_x`]
pub fn device_to_gui_x(device_x: f32, scale_factor: f32) -> f32 {
    if scale_factor == 0.0 {
        return 0.0;
    }
    device_x / scale_factor
}

/// Inverse of [`gui_to_device_y`]
pub fn device_to_gui_y(device_y: f32, surface_height: f32, scale_factor: f32) -> f32 {
    if scale_factor == 0.0 {
        return surface_height;
    }
    surface_height - device_y / scale_factor
}
