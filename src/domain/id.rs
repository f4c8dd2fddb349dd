//! Identifiers for tasks and milestones
//!
//! ID Format:
//! - Task IDs: `t-{7-char-hash}` (e.g., `t-9d3e5f2`), assigned by the store
//! - Milestone IDs: `{rule-id}:{token-slug}` (e.g., `phase:1`, `feature:auth`)
//!
//! Task hashes are derived from content + creation timestamp + a salt, so the
//! store can re-roll on the (unlikely) event of a collision. Milestone IDs are
//! derived purely from the rule and matched token, which makes re-detection
//! idempotent.
//!
//! Dependency lists are free text, so [`TaskId`] accepts any non-empty token
//! when parsed. Only generated IDs are guaranteed to follow the `t-` format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Task ID must not be empty")]
    EmptyTaskId,

    #[error("Task ID must not contain whitespace: '{0}'")]
    InvalidTaskId(String),

    #[error("Invalid milestone ID format: expected '{{rule-id}}:{{token}}', got '{0}'")]
    InvalidMilestoneId(String),
}

/// Generates a 7-character hash from content, timestamp and salt
fn generate_hash(content: &str, timestamp: DateTime<Utc>, salt: u64) -> String {
    let input = format!(
        "{}{}{}",
        content,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        salt
    );
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

/// Task ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Generates a new task ID from content, timestamp and a salt
    pub fn generate(content: &str, timestamp: DateTime<Utc>, salt: u64) -> Self {
        Self(format!("t-{}", generate_hash(content, timestamp, salt)))
    }

    /// Returns the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::EmptyTaskId);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(IdError::InvalidTaskId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

/// Milestone ID in the format `{rule-id}:{token-slug}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MilestoneId {
    rule: String,
    token: String,
}

impl MilestoneId {
    /// Derives a milestone ID from a rule ID and the token the rule matched.
    ///
    /// The token is lowercased and whitespace runs become a single `+`, so
    /// "Phase  1" and "phase 1" land on the same ID. Any other character
    /// outside `[A-Za-z0-9-_.~]` is percent-encoded: "C++" and "C#" stay
    /// apart, and a `:` in the token can't break parsing.
    pub fn derive(rule_id: &str, token: &str) -> Self {
        Self {
            rule: rule_id.to_string(),
            token: slugify(token),
        }
    }

    /// Returns the rule portion of the ID
    pub fn rule_id(&self) -> &str {
        &self.rule
    }

    /// Returns the token portion of the ID
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Lowercases, joins whitespace-separated words with `+` and percent-encodes
/// each word
pub(crate) fn slugify(token: &str) -> String {
    token
        .to_lowercase()
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

impl fmt::Display for MilestoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{}:{}", self.rule, self.token))
    }
}

impl FromStr for MilestoneId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (rule, token) = s
            .split_once(':')
            .ok_or_else(|| IdError::InvalidMilestoneId(s.to_string()))?;

        if rule.is_empty() || token.is_empty() || token.contains(':') {
            return Err(IdError::InvalidMilestoneId(s.to_string()));
        }

        Ok(Self {
            rule: rule.to_string(),
            token: token.to_string(),
        })
    }
}

impl TryFrom<String> for MilestoneId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MilestoneId> for String {
    fn from(id: MilestoneId) -> Self {
        id.to_string()
    }
}
