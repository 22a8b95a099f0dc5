//! Controller input: physical layout, normalization, bindings and the
//! device backend

pub mod bindings;
pub mod device;
pub mod layout;
pub mod normalize;
pub mod persistence;
pub mod provider;

pub use bindings::{Action, Binding, BindingRegistry, Category};
pub use device::{DeviceEvent, DevicePoller, EventCallback};
pub use normalize::Normalizer;
pub use persistence::BindingStore;
