//! Shared types for Gau Gyan components.
//!
//! Domain records, the image payload format, the error taxonomy and the
//! HTTP wire protocol spoken between `gaugyand` and `gaugyanctl`.

pub mod error;
pub mod image;
pub mod protocol;
pub mod quality;
pub mod types;

pub use error::{ErrorBody, ErrorResponse, GauError};
pub use image::{ImageError, ImagePayload};
pub use quality::QualityBand;
pub use types::{AnalysisRecord, CombinedResult, ScoreResult, TraitSet, UserId};

/// Version shared by the daemon and the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default daemon address
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:7870";

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";
