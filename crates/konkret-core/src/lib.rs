//! Core data types for konkret.
//!
//! Holds the version algebra, the [`spec::Spec`] node model with its request
//! grammar, and the read-only collaborators the concretizer consults: the
//! package repository, the compiler registry and user preferences.

pub mod compilers;
pub mod config;
pub mod package;
pub mod spec;
pub mod version;
