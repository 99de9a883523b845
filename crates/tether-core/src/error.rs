//! Error types for the behaviour lifecycle
//!
//! Declaration errors are fatal for a discovery pass. Resolution failures are
//! recorded against the cache entry that requested them. Configuration errors
//! surface when a manager is built.

use std::path::PathBuf;
use thiserror::Error;

/// A behaviour declaration on an element that cannot be hydrated.
///
/// Any of these aborts the whole discovery pass that encountered it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// More than one behaviour name was declared on a single element
    #[error(
        "error at: {declaration}, Only one behaviour is allowed per node. Each node must have a unique id"
    )]
    MultipleBehaviours { declaration: String },

    /// The element declaring a behaviour has no id
    #[error(
        "error at: {declaration}, Only one behaviour is allowed per node. Each node must have a unique id"
    )]
    MissingId { declaration: String },

    /// The behaviour attribute is present but blank
    #[error("error at element '{id}': the behaviour declaration is empty")]
    EmptyBehaviour { id: String },
}

impl DeclarationError {
    /// The raw declaration (or element id) this error refers to.
    pub fn declaration(&self) -> &str {
        match self {
            Self::MultipleBehaviours { declaration } | Self::MissingId { declaration } => {
                declaration
            }
            Self::EmptyBehaviour { id } => id,
        }
    }
}

/// Failure reported by a [`ModuleResolver`](crate::ModuleResolver).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to resolve behaviour module: {message}")]
pub struct ResolveError {
    message: String,
}

impl ResolveError {
    /// Create a resolve error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Create the error returned when no module is known under `behaviour`
    pub fn unknown(behaviour: &str) -> Self {
        Self::new(format!("no module registered for '{behaviour}'"))
    }

    /// The failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid TOML for this schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but violates a constraint
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Create a validation error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Top-level error for lifecycle manager operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A discovery pass hit an invalid declaration
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// A behaviour module could not be resolved
    #[error("behaviour '{behaviour}' could not be loaded")]
    Resolve {
        behaviour: String,
        #[source]
        source: ResolveError,
    },

    /// No cache entry exists for the requested id
    #[error("no behaviour registered under id '{id}'")]
    NotFound { id: String },

    /// A fetch was requested outside of an async runtime
    #[error("no async runtime available to fetch '{behaviour}'")]
    NoRuntime { behaviour: String },

    /// A fetch was requested after the manager shut down
    #[error("lifecycle manager is shut down; '{behaviour}' was not fetched")]
    ShutDown { behaviour: String },

    /// The manager configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LifecycleError {
    /// Create a not-found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Check whether this error came from a declaration
    pub fn is_declaration(&self) -> bool {
        matches!(self, Self::Declaration(_))
    }
}
