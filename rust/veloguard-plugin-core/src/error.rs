use std::path::PathBuf;
use thiserror::Error;

/// Exit status for a deterministic configuration failure. Service managers
/// should not restart the plugin on this status.
pub const EXIT_CONFIG_ERROR: i32 = 23;

/// Exit status for a runtime failure of the proxy engine.
pub const EXIT_FAILURE: i32 = 1;

/// VeloGuard plugin error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        input: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported transport mode: {mode}")]
    UnsupportedTransport { mode: String },

    #[error("Certificate error: {message}")]
    CertificateIo {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to create proxy engine: {message}")]
    EngineConstruction {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to start proxy engine: {message}")]
    EngineStart {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
            input: None,
            source: None,
        }
    }

    /// Create a new parse error carrying the rejected input
    pub fn parse_with_input<S: Into<String>, I: Into<String>>(message: S, input: I) -> Self {
        Self::Parse {
            message: message.into(),
            input: Some(input.into()),
            source: None,
        }
    }

    /// Create a new parse error with input and source
    pub fn parse_with_source<S, I, E>(message: S, input: I, source: E) -> Self
    where
        S: Into<String>,
        I: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            input: Some(input.into()),
            source: Some(Box::new(source)),
        }
    }

    pub fn unsupported_transport<S: Into<String>>(mode: S) -> Self {
        Self::UnsupportedTransport { mode: mode.into() }
    }

    /// Create a certificate error that has no backing file
    pub fn certificate<S: Into<String>>(message: S) -> Self {
        Self::CertificateIo {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create a certificate error for a file that could not be read
    pub fn certificate_read<S: Into<String>>(
        message: S,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::CertificateIo {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn engine_construction<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EngineConstruction {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn engine_start<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EngineStart {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code/category for external use
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "PARSE",
            Self::UnsupportedTransport { .. } => "UNSUPPORTED_TRANSPORT",
            Self::CertificateIo { .. } => "CERTIFICATE_IO",
            Self::Config { .. } => "CONFIG",
            Self::EngineConstruction { .. } => "ENGINE_CONSTRUCTION",
            Self::EngineStart { .. } => "ENGINE_START",
        }
    }

    /// Process exit status for this error.
    ///
    /// Everything up to and including engine construction is deterministic
    /// for a given configuration, so it maps to [`EXIT_CONFIG_ERROR`].
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::EngineStart { .. } => EXIT_FAILURE,
            _ => EXIT_CONFIG_ERROR,
        }
    }
}
