//! # RepoLens
//!
//! Indexes remote Git repositories and serves hybrid (lexical + semantic)
//! search over the code snippets it extracts, so that downstream
//! code-assistant agents can retrieve relevant context.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Core business models and error types
//! - `application`: Service interfaces, the indexing pipeline, and search
//! - `connector`: External integrations (DuckDB, tree-sitter, git, HTTP)

pub mod application;
pub mod config;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use config::*;
pub use connector::*;
pub use domain::*;
