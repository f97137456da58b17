pub mod config;
pub mod error;
pub mod media;
pub mod recurrence;
pub mod schedule;
pub mod scope;
pub mod transport;
pub mod types;
