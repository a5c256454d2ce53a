//! # Tarkib Support
//!
//! Shared utilities for the Tarkib crates.
//!
//! This crate provides:
//! - Text rendering for error messages and debug dumps

pub mod rendering;
