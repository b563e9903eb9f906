use crate::telegram::{CodeHandle, UserId};
use serde::{Deserialize, Serialize};

/// Screen the browser session is on
///
/// The pending login (phone and code handle) only exists in the states that
/// need it, so a code can never be submitted without one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Page {
    /// Welcome screen
    #[default]
    Landing,
    /// Phone number entry
    Login,
    /// Login code entry
    VerifyCode {
        /// Code requested for this login attempt
        pending: CodeHandle,
    },
    /// Two-factor password entry
    TwoFactor {
        /// Kept so that "Back" can return to code entry
        pending: CodeHandle,
    },
    /// Favorites list
    Dashboard {
        /// Logged-in user
        user_id: UserId,
    },
}

impl Page {
    /// Short screen name for logs and messages
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::Login => "login",
            Self::VerifyCode { .. } => "code verification",
            Self::TwoFactor { .. } => "two-factor",
            Self::Dashboard { .. } => "dashboard",
        }
    }

    /// Phone number of the login in progress, if any
    #[must_use]
    pub fn pending_phone(&self) -> Option<&str> {
        match self {
            Self::VerifyCode { pending } | Self::TwoFactor { pending } => Some(&pending.phone),
            _ => None,
        }
    }
}

/// User action submitted from a screen
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
    /// "Log in with Telegram" on the landing screen
    Start,
    /// Phone number form
    SubmitPhone(String),
    /// Login code form
    SubmitCode(String),
    /// Two-factor password form
    SubmitPassword(String),
    /// "Back" link
    Back,
    /// "Log out" button
    Logout,
}

impl Action {
    /// Short action name for logs and messages
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::SubmitPhone(_) => "Phone submission",
            Self::SubmitCode(_) => "Code submission",
            Self::SubmitPassword(_) => "Password submission",
            Self::Back => "Back",
            Self::Logout => "Logout",
        }
    }
}

// Form values stay out of logs.
impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
