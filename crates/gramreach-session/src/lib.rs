//! # GramReach Session
//!
//! The browser side of a campaign: a minimal W3C WebDriver wire-protocol
//! client over HTTP, the Instagram selector table, and the
//! `InstagramSession` state machine that implements `Messenger`.
//!
//! The browser binary and its driver (chromedriver) are external; this
//! crate only speaks the REST protocol to an already-running endpoint.

pub mod instagram;
pub mod selectors;
pub mod webdriver;

pub use instagram::{InstagramSession, SessionState};
pub use webdriver::DriverClient;
