//! Banned remote address patterns.
//!
//! Each pattern is a regular expression that must match the whole textual
//! IP address of an accepted socket (`10\.0\..*`, `192\.168\.1\.7`).

use crate::error::TransportError;
use regex::Regex;
use std::net::IpAddr;
use std::sync::RwLock;
use tracing::warn;

#[derive(Debug)]
struct BanPattern {
    source: String,
    regex: Regex,
}

/// Thread-safe list of banned address patterns.
#[derive(Debug, Default)]
pub struct BanList {
    patterns: RwLock<Vec<BanPattern>>,
}

impl BanList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from configured patterns. Invalid patterns are skipped
    /// with a warning.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = Self::new();
        list.reload(patterns);
        list
    }

    /// Replace every pattern. Invalid patterns are skipped with a warning.
    pub fn reload<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match compile(pattern) {
                Ok(regex) => compiled.push(BanPattern {
                    source: pattern.to_string(),
                    regex,
                }),
                Err(err) => warn!("ignored invalid banned address pattern '{}': {}", pattern, err),
            }
        }
        *self.write() = compiled;
    }

    /// Add a pattern. Returns `false` if the same pattern is already listed.
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidPattern`] if `pattern` does not compile.
    pub fn add(&self, pattern: &str) -> Result<bool, TransportError> {
        let regex = compile(pattern)?;
        let mut patterns = self.write();
        if patterns.iter().any(|p| p.source == pattern) {
            return Ok(false);
        }
        patterns.push(BanPattern {
            source: pattern.to_string(),
            regex,
        });
        Ok(true)
    }

    /// Remove a pattern. Returns `false` if it was not listed.
    pub fn remove(&self, pattern: &str) -> bool {
        let mut patterns = self.write();
        let before = patterns.len();
        patterns.retain(|p| p.source != pattern);
        patterns.len() != before
    }

    /// Remove every pattern.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// The listed patterns, in insertion order.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.read().iter().map(|p| p.source.clone()).collect()
    }

    /// Number of listed patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if no pattern is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// True if any pattern matches the whole address text.
    #[must_use]
    pub fn is_banned(&self, address: &IpAddr) -> bool {
        let text = address.to_string();
        self.read().iter().any(|p| p.regex.is_match(&text))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<BanPattern>> {
        self.patterns
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<BanPattern>> {
        self.patterns
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Anchor the pattern so it must match the full address.
fn compile(pattern: &str) -> Result<Regex, TransportError> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}
