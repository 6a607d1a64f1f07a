// Domain layer: entities, dates, settings and ports (interfaces).

pub mod date;
pub mod model;
pub mod ports;
pub mod settings;
