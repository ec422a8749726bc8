//! Handling of secret-bearing values.
//!
//! Secrets are tagged with a type at the point where they enter the program
//! (settings loading), so every log line that formats one gets the mask
//! instead of the value. Nothing scans log text after formatting.

pub mod secret;

pub use secret::Secret;
