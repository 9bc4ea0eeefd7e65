//! Email notification settings.

use serde::{Deserialize, Serialize};

/// SMTP settings for completion emails.
///
/// The queue only checks whether these are usable; sending is up to the
/// [`Notifier`](super::Notifier) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub enabled: bool,
    /// SMTP host.
    pub smtp: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: String::new(),
        }
    }
}

impl EmailSettings {
    /// Enabled with a transport (host and sender) filled in.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.smtp.trim().is_empty() && !self.from.trim().is_empty()
    }

    /// Configured and has somewhere to send to.
    pub fn should_send(&self) -> bool {
        self.is_configured() && !self.to.trim().is_empty()
    }
}
