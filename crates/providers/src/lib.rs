//! Completion provider implementations for Maitred.
//!
//! All providers implement the `maitred_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
