//! Typed locations inside a template tree.

use serde::Serialize;
use std::fmt;

/// One step of a path: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathToken {
    /// Mapping key.
    Key(String),
    /// Sequence index.
    Index(usize),
}

/// Ordered sequence of tokens from the template root to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChangePath(Vec<PathToken>);

impl ChangePath {
    /// Creates an empty (root) path.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new path extended with one token.
    #[must_use]
    pub fn child(&self, token: PathToken) -> Self {
        let mut tokens = self.0.clone();
        tokens.push(token);
        Self(tokens)
    }

    /// Returns the tokens of this path.
    #[must_use]
    pub fn tokens(&self) -> &[PathToken] {
        &self.0
    }

    /// Returns the number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key at a position, if that token is a key.
    #[must_use]
    pub fn key_at(&self, position: usize) -> Option<&str> {
        match self.0.get(position) {
            Some(PathToken::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Returns the final token if it is a key.
    #[must_use]
    pub fn last_key(&self) -> Option<&str> {
        match self.0.last() {
            Some(PathToken::Key(key)) => Some(key),
            _ => None,
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ChangePath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|key| PathToken::Key(key.into())).collect())
    }
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl fmt::Display for ChangePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 && matches!(token, PathToken::Key(_)) {
                write!(f, ".")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}
