pub mod batches;
pub mod channels;
pub mod posts;
pub mod recurrences;
pub mod windows;
