//! # Gateway Bundler - Core Library Crate
//!
//! Compiles a declarative API gateway configuration (folders, policies, services,
//! encapsulated assertions and environment entities such as listen ports, stored
//! passwords and trusted certificates) into a single ordered gateway management bundle
//! that can be imported in one step.
//!
//! ## Pipeline
//! 1. `loader` reads a source directory into a [`Bundle`]
//! 2. `bundle` freezes the folder hierarchy and resolves cross-bundle references
//! 3. `policy` rewrites symbolic policy references and orders policies by dependency
//! 4. `builders` turn every entity kind into bundle entities, in a fixed order
//! 5. `document` assembles the `l7:Bundle` document
//!
//! [`compiler`] runs the whole pipeline for a [`CompilerConfig`].

/// Error types, configuration and identifier generation
pub mod core;

/// Entity store for one configuration unit, its folder tree and dependency bundles
pub mod bundle;

/// Policy graph preparation and topological ordering
pub mod policy;

/// Entity builders, one per entity kind, run as an ordered pipeline
pub mod builders;

/// Bundle document model and assembly
pub mod document;

/// Async source directory loader and the entity type registry
pub mod loader;

/// Trusted certificate resolution (files, TLS handshakes, inline data)
pub mod certs;

/// Owned XML element tree used for policies and bundle payloads
pub mod xml;

/// Structured logging setup
pub mod observability;

/// End-to-end compile entry points
pub mod compiler;

pub use crate::core::config::CompilerConfig;
pub use crate::core::error::{BundleError, BundleResult};
pub use bundle::{Bundle, BundleMode, EntityKind};
pub use builders::{BuildContext, BuilderPipeline, EntityBuilder};
pub use compiler::{compile_sources, BundleCompiler, CompiledBundle};
pub use document::{BundleDocument, Entity};
