//! Game simulation modules

pub mod bot;
pub mod broadcast;
pub mod combat;
pub mod constants;
pub mod input;
pub mod items;
pub mod physics;
pub mod player;
pub mod server;
pub mod ship;
pub mod snapshot;
pub mod upgrades;
pub mod weapons;
pub mod world;

pub use server::{GameServer, HealthReport, ServerSettings};
pub use world::AttachError;
