// Domain layer: table model, column schema, ports and the dashboard aggregates.

pub mod locale;
pub mod model;
pub mod ports;
pub mod report;
pub mod schema;
pub mod settings;
