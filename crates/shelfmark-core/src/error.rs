use thiserror::Error;

/// All errors that can occur in shelfmark-core.
#[derive(Debug, Error)]
pub enum ShelfmarkError {
    #[error("{0}")]
    Validation(String),

    #[error("Not signed in. Run 'shelfmark login' first.")]
    NotSignedIn,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Process exit codes used by the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    AuthRequired = 4,
    Forbidden = 5,
    NetworkError = 6,
    Conflict = 7,
    ServerError = 8,
}

impl ShelfmarkError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Validation(_) | Self::ConfigError(_) | Self::TomlParse(_) => ExitCode::InvalidArgs,
            Self::NotSignedIn => ExitCode::AuthRequired,
            _ => ExitCode::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShelfmarkError>;
