// Adapters layer: concrete implementations of the domain ports.

pub mod camera;

pub use camera::DirectoryCamera;
