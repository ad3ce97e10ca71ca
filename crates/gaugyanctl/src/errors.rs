//! Error codes and exit status for gaugyanctl

use gaugyan_common::GauError;
use thiserror::Error;

/// Exit code when the command needs a session the user does not have
pub const EXIT_NOT_AUTHENTICATED: i32 = 64;

/// Exit code when the daemon (or the model behind it) returns an unusable response
pub const EXIT_INVALID_RESPONSE: i32 = 65;

/// Exit code when the daemon is unavailable/unreachable
pub const EXIT_DAEMON_UNAVAILABLE: i32 = 70;

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The daemon answered with an error envelope
    #[error("{0}")]
    Api(#[from] GauError),

    #[error("Cannot reach gaugyand at {url}: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("Invalid response from gaugyand: {0}")]
    InvalidResponse(String),

    #[error("Not logged in. Run `gaugyanctl login` first.")]
    NotLoggedIn,
}

impl ClientError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ClientError::NotLoggedIn => EXIT_NOT_AUTHENTICATED,
            ClientError::Api(err) if err.is_auth_required() => EXIT_NOT_AUTHENTICATED,
            ClientError::Api(GauError::ModelResponseInvalid(_)) => EXIT_INVALID_RESPONSE,
            ClientError::InvalidResponse(_) => EXIT_INVALID_RESPONSE,
            ClientError::Unavailable { .. } => EXIT_DAEMON_UNAVAILABLE,
            ClientError::Api(_) => EXIT_GENERAL_ERROR,
        }
    }
}

/// Exit code for any error surfaced by a command
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ClientError>())
        .map(ClientError::exit_code)
        .unwrap_or(EXIT_GENERAL_ERROR)
}
