pub mod core;
pub mod media;
pub mod roster;
pub mod units;
