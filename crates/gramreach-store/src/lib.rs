//! # GramReach Store
//!
//! File-backed persistence: the append-only CSV result log (audit trail
//! and dedup source) and profile list parsing for uploads.

pub mod csv;
pub mod profiles;
pub mod results;

pub use profiles::{load_profiles, load_profiles_file};
pub use results::ResultLog;
