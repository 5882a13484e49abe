// Domain layer: value types, the report table and ports (interfaces).

pub mod model;
pub mod ports;
pub mod table;
