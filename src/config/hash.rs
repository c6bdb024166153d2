//! Digests of templates.
//!
//! Digests are recorded with every deployment so a later run can tell which
//! template the local snapshot corresponds to.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::template::Template;

/// Hasher for templates.
#[derive(Debug, Default)]
pub struct TemplateHasher;

impl TemplateHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the digest of a template.
    ///
    /// The digest covers the serialized document, so key order matters.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be serialized.
    pub fn hash_template(&self, template: &Template) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(template.to_yaml_string()?.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}
