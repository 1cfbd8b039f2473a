pub mod collections;
pub mod core;
pub mod screens;
