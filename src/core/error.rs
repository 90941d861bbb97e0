//! # Error Handling Module
//!
//! This module defines every failure the bundler can report, using the `thiserror` crate.
//! All errors are fatal to the current build: there is no partial bundle output and no
//! retry. Each variant carries enough context (entity kind, path, file) for an operator
//! to locate and fix the offending source configuration.
//!
//! ## Error Taxonomy
//! - Structural errors: the folder hierarchy cannot form a single rooted tree
//! - Reference errors: a policy, encass, service or folder reference cannot be resolved,
//!   or resolves to more than one dependency bundle
//! - Graph errors: policy includes form a cycle
//! - Consistency errors: conflicting metadata between entities
//! - External resource errors: certificate files, TLS handshakes, malformed certificates
//! - Input errors: configuration, source files and policy XML that cannot be parsed

use thiserror::Error;

/// Main result type used throughout the bundler
pub type BundleResult<T> = Result<T, BundleError>;

/// Errors raised while loading, linking or assembling a bundle
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BundleError {
    /// The folder collection does not form a single rooted tree
    #[error("Folder structure error: {message}")]
    Structure { message: String },

    /// A referenced entity could not be found locally or in any dependency bundle
    #[error("Could not find referenced {kind} '{key}' (referenced from {referrer})")]
    MissingReference {
        kind: String,
        key: String,
        referrer: String,
    },

    /// More than one dependency bundle defines the referenced entity
    #[error("Found multiple {kind} in dependency bundles with path {key} ({count} matches)")]
    AmbiguousReference {
        kind: String,
        key: String,
        count: usize,
    },

    /// Policy includes form a cycle; the path list starts and ends with the same policy
    #[error("Policy include cycle detected: {}", .cycle.join(" -> "))]
    PolicyCycle { cycle: Vec<String> },

    /// Entities carry metadata that cannot be reconciled
    #[error("Consistency error: {message}")]
    Consistency { message: String },

    /// Certificate data could not be obtained or decoded
    #[error("Certificate error for '{name}': {message}")]
    Certificate { name: String, message: String },

    /// Policy XML is malformed or misses an element required for rewriting
    #[error("Policy XML error in '{policy}': {message}")]
    PolicyXml { policy: String, message: String },

    /// Compiler configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A source file could not be parsed into entities
    #[error("Failed to load '{file}': {message}")]
    Load { file: String, message: String },

    /// Builder registration or execution failure
    #[error("Builder error ({builder}): {message}")]
    Builder { builder: String, message: String },

    /// I/O errors (file operations, network errors, etc.)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// Low-level XML reader errors
    #[error("XML error: {message}")]
    Xml { message: String },

    /// TLS handshake failures while fetching a certificate
    #[error("TLS error: {message}")]
    Tls { message: String },
}

impl BundleError {
    /// Create a folder structure error
    pub fn structure<S: Into<String>>(message: S) -> Self {
        Self::Structure {
            message: message.into(),
        }
    }

    /// Create a missing reference error
    pub fn missing<K, S, R>(kind: K, key: S, referrer: R) -> Self
    where
        K: Into<String>,
        S: Into<String>,
        R: Into<String>,
    {
        Self::MissingReference {
            kind: kind.into(),
            key: key.into(),
            referrer: referrer.into(),
        }
    }

    /// Create an ambiguous reference error
    pub fn ambiguous<K: Into<String>, S: Into<String>>(kind: K, key: S, count: usize) -> Self {
        Self::AmbiguousReference {
            kind: kind.into(),
            key: key.into(),
            count,
        }
    }

    /// Create a consistency error
    pub fn consistency<S: Into<String>>(message: S) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// Create a certificate error
    pub fn certificate<N: Into<String>, S: Into<String>>(name: N, message: S) -> Self {
        Self::Certificate {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a policy XML error
    pub fn policy_xml<P: Into<String>, S: Into<String>>(policy: P, message: S) -> Self {
        Self::PolicyXml {
            policy: policy.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a load error for a source file
    pub fn load<F: Into<String>, S: Into<String>>(file: F, message: S) -> Self {
        Self::Load {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a builder error
    pub fn builder<B: Into<String>, S: Into<String>>(builder: B, message: S) -> Self {
        Self::Builder {
            builder: builder.into(),
            message: message.into(),
        }
    }

    /// Get a string representation of the error category for reports
    pub fn category(&self) -> &'static str {
        match self {
            Self::Structure { .. } => "structure_error",
            Self::MissingReference { .. } => "missing_reference",
            Self::AmbiguousReference { .. } => "ambiguous_reference",
            Self::PolicyCycle { .. } => "policy_cycle",
            Self::Consistency { .. } => "consistency_error",
            Self::Certificate { .. } => "certificate_error",
            Self::PolicyXml { .. } => "policy_xml_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Load { .. } => "load_error",
            Self::Builder { .. } => "builder_error",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
            Self::Xml { .. } => "xml_error",
            Self::Tls { .. } => "tls_error",
        }
    }

    /// Whether the error points at the authored source configuration rather than
    /// the environment the bundler runs in
    pub fn is_authoring_error(&self) -> bool {
        matches!(
            self,
            Self::Structure { .. }
                | Self::MissingReference { .. }
                | Self::AmbiguousReference { .. }
                | Self::PolicyCycle { .. }
                | Self::Consistency { .. }
                | Self::PolicyXml { .. }
                | Self::Load { .. }
        )
    }
}

impl From<std::io::Error> for BundleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for BundleError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<quick_xml::Error> for BundleError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml {
            message: err.to_string(),
        }
    }
}

impl From<rustls::Error> for BundleError {
    fn from(err: rustls::Error) -> Self {
        Self::Tls {
            message: err.to_string(),
        }
    }
}

/// Convenience macro for creating consistency errors
///
/// Usage: `consistency_error!("Duplicate tag {} on {}", tag, path)`
#[macro_export]
macro_rules! consistency_error {
    ($($arg:tt)*) => {
        $crate::core::error::BundleError::consistency(format!($($arg)*))
    };
}

/// Convenience macro for creating configuration errors
///
/// Usage: `config_error!("Invalid mode: {}", mode)`
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::core::error::BundleError::config(format!($($arg)*))
    };
}
