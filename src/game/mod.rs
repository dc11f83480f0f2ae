//! Simulation loop, world state, and deferred scheduling

pub mod schedule;
pub mod session;
pub mod world;

pub use session::{GameSession, SessionOutcome};
pub use world::{SessionState, World};
