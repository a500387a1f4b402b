//! # GramReach Gateway
//!
//! JSON control surface over the campaign machinery: start/stop/status,
//! schedule CRUD, result listing and CSV export. No HTML is served; any
//! dashboard talks to these endpoints.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
