pub mod artifacts;
pub mod cache;
pub mod hpi;
pub mod sentiment;
pub mod types;
