pub mod coerce;
pub mod fs;
