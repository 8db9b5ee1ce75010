//! Core business logic for pollwave.

pub mod services;

pub use services::*;
