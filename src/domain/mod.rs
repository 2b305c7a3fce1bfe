// Domain layer: result models, schema handling, and ports (interfaces).

pub mod model;
pub mod ports;
pub mod schema;
