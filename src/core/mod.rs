//! Core onboarding logic

pub mod context;
pub mod error;
pub mod events;
pub mod gate;
pub mod indicator;
pub mod session;
pub mod state;
pub mod system;
pub mod types;
pub mod wait;
