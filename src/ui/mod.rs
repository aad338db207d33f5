//! Host-facing controls that drive the viewer.

pub mod controls;

pub use controls::ZoomControl;
