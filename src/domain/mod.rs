// Domain layer: records, operations and the ports the adapters implement.

pub mod model;
pub mod ports;
