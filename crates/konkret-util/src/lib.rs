//! Shared utilities for konkret.
//!
//! This crate provides the cross-cutting error type used by every other
//! konkret crate, so that a failed concretization can be reported with the
//! spec and attribute that caused it.

pub mod errors;
