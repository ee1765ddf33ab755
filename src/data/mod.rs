pub mod loader;
pub mod merge;
pub mod models;
pub mod sentiment;
pub mod synthetic;
