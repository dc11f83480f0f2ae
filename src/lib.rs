//! Client-side simulation core for the Ender multiplayer trail game
//!
//! A top-down, trail-leaving action game client: an arena scene graph with a
//! fixed-step update/render loop, a typed publish/subscribe event bus,
//! per-character movement and animation state machines, client-side
//! prediction with server reconciliation for remote players, and a
//! spatially-indexed persistent trail system with offline-queue recovery.
//! The server is polled over JSON; it stays authoritative throughout.

pub mod config;
pub mod events;
pub mod game;
pub mod geom;
pub mod movement;
pub mod net;
pub mod render;
pub mod scene;
pub mod spatial;
pub mod util;
