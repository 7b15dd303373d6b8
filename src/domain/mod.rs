// Domain layer: core models and ports (interfaces) shared by the api client,
// capture loop and session.

pub mod model;
pub mod ports;
