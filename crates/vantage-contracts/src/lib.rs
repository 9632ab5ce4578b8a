pub mod address;
pub mod analysis;
pub mod chat;
pub mod errors;
pub mod events;
pub mod markers;
pub mod models;
pub mod runs;
pub mod workflow;
