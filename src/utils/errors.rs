#![forbid(unsafe_code)]

use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("acrostic_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    #[error("Reading environment file: {}", .0)]
    ReadingEnvFile(String),

    /// The submitted word is missing or not exactly 3 characters.  The
    /// message is shown to the user as is.
    #[error("{}", .0)]
    InvalidInput(String),

    /// A static asset path that does not resolve to a file.
    #[error("Asset not found: {}", .0)]
    AssetNotFound(String),
}

/// Failures of the external text generation call.  None of these details are
/// ever returned to HTTP clients.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("No API key configured (ANTHROPIC_API_KEY)")]
    MissingApiKey,

    #[error("Generator returned no text content")]
    EmptyContent,
}
