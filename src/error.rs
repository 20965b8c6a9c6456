use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    /// Credentials were refused, or the tokens a variant requires never showed up.
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    #[error("Login page did not contain a verification token")]
    MissingVerificationToken,

    #[error("Dashboard did not contain the `{0}` script assignment")]
    MissingCredentialFragment(String),

    #[error("Session is not logged in")]
    NotInitialized,

    #[error("Failed to decode {what}: {reason}")]
    Decode {
        what: &'static str,
        reason: String,
        /// Raw response body, kept for diagnosis.
        body: String,
    },

    #[error("No data for incident {0}")]
    EmptyResult(i64),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PortalError {
    pub(crate) fn decode(what: &'static str, reason: impl ToString, body: &str) -> Self {
        PortalError::Decode {
            what,
            reason: reason.to_string(),
            body: body.to_string(),
        }
    }

    /// True for errors the user can fix by changing the login details.
    pub fn is_authentication(&self) -> bool {
        matches!(self, PortalError::AuthenticationRejected(_))
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
