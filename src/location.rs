//! Object-store locators
//!
//! Parses `scheme://container/key` strings into a [`Location`].

use crate::error::ExtractError;
use std::fmt;

/// A container (bucket) and key inside an object store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub container: String,
    pub key: String,
}

impl Location {
    /// Parse a `scheme://container/key...` locator.
    ///
    /// The split happens on the first `/` after the scheme, so the key keeps
    /// any further separators. `s3://bucket` and `s3://bucket/` both yield an
    /// empty key.
    pub fn parse(locator: &str) -> Result<Self, ExtractError> {
        let trimmed = locator.trim();
        let (_, rest) = trimmed.split_once("://").ok_or_else(|| {
            ExtractError::MalformedLocator(format!(
                "'{}' is missing a scheme (expected scheme://container/key)",
                locator
            ))
        })?;

        let (container, key) = match rest.split_once('/') {
            Some((container, key)) => (container, key),
            None => (rest, ""),
        };

        if container.is_empty() {
            return Err(ExtractError::MalformedLocator(format!(
                "'{}' has an empty container segment",
                locator
            )));
        }

        Ok(Self {
            container: container.to_string(),
            key: key.to_string(),
        })
    }

    /// Parse a locator that must name an object, not a container root.
    pub fn parse_object(locator: &str) -> Result<Self, ExtractError> {
        let location = Self::parse(locator)?;
        if location.key.is_empty() {
            return Err(ExtractError::MalformedLocator(format!(
                "'{}' names a container root, not an object",
                locator
            )));
        }
        Ok(location)
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Location of `name` underneath this location's key, treated as a prefix.
    ///
    /// Leading slashes on the resulting key are stripped, so an empty
    /// destination key places members at the container root.
    pub fn child(&self, name: &str) -> Location {
        let name = name.trim_start_matches('/');
        let key = if self.key.is_empty() || self.key.ends_with('/') {
            format!("{}{}", self.key, name)
        } else {
            format!("{}/{}", self.key, name)
        };

        Location {
            container: self.container.clone(),
            key: key.trim_start_matches('/').to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}
