//! Library crate for lan-watch-rs exposing reusable modules.
pub mod display;
pub mod errors;
pub mod netdetect;
pub mod probe;
pub mod registry;
pub mod scanner;
pub mod types;
