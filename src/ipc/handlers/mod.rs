pub mod backup;
pub mod core;
pub mod outcomes;
pub mod scores;
