//! Instagram page selectors, kept in one place because the UI churns.

pub const LOGIN_URL: &str = "https://www.instagram.com/accounts/login/";

pub const USERNAME_FIELD: &str = "//input[@name='username']";
pub const PASSWORD_FIELD: &str = "//input[@name='password']";
pub const SUBMIT_BUTTON: &str = "//button[@type='submit']";
pub const NOT_NOW_BUTTON: &str = "//button[contains(text(), 'Not Now')]";
pub const COOKIE_ALLOW_BUTTON: &str = "//button[contains(text(), 'Allow')]";

/// Tried in order; Instagram renders the Message button differently
/// depending on account type and rollout bucket.
pub const MESSAGE_BUTTONS: [&str; 2] = [
    "//div[contains(@class, 'x1q0g3np') and contains(text(), 'Message')]",
    "//div[contains(text(), 'Message')]",
];

pub const MESSAGE_BOX: &str = "//div[@role='textbox']";
