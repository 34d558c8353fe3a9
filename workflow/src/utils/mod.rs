//! Utility modules for the beads workflow coordinator.
//!
//! # Modules
//!
//! - [`tokenize`]: Shell-like tokenizer for matching agent-issued commands

pub mod tokenize;

pub use tokenize::{leading_words, starts_with_words};
