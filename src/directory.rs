// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! User roster parsing and lookups for `ChatWork` exports.
//!
//! This module handles deserialization of the external user list (a JSON
//! array pairing `ChatWork` account ids with display names and `Slack` account
//! handles) and builds the read-only [`UserDirectory`] that the converter
//! resolves mentions and quote headers against.
//!
//! # Format Overview
//!
//! A roster file contains an array of user objects:
//! - `id`: the `ChatWork` account id (number or string)
//! - `name`: the display name as it appears in chat logs
//! - `account`: the `Slack` handle to mention the user by
//!
//! # Example
//!
//! ```
//! use cw2slack::directory::{UserDirectory, parse_users};
//!
//! let json = r#"[
//!     { "id": 363, "name": "Sato", "account": "SatoYuki" }
//! ]"#;
//!
//! let directory = UserDirectory::from_records(parse_users(json).unwrap());
//! assert_eq!(directory.mention_handle("363"), Some("satoyuki"));
//! ```

use serde::Deserialize;
use snafu::prelude::*;
use std::collections::HashMap;

/// Error type for roster parsing failures.
#[derive(Debug, Snafu)]
pub enum RosterError {
    /// Failed to parse JSON content.
    #[snafu(display("failed to parse JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },
}

/// One entry in the external user roster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    /// The `ChatWork` account id. Rosters carry this as either a JSON number
    /// or a string; it is normalized to a string key.
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,

    /// The display name as it appears in exported chat logs.
    pub name: String,

    /// The `Slack` account handle for this user.
    pub account: String,
}

/// Deserializes a user id that may arrive as a JSON number or string.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "user id must be a number or string, got {other}"
        ))),
    }
}

/// Read-only lookup context shared by all context-dependent tag renders.
///
/// Built once from the roster before any conversion and never mutated
/// afterwards, so it can be shared freely across conversions (and across
/// threads, should the surrounding pipeline parallelize over records).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDirectory {
    display_names: HashMap<String, String>,
    mention_handles: HashMap<String, String>,
    handles_by_name: HashMap<String, String>,
}

impl UserDirectory {
    /// Builds the three lookup maps from roster records.
    ///
    /// Account handles are lowercased here; `Slack` mention handles are
    /// lowercase. Later records win when ids or names repeat.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let mut directory = Self::default();
        for record in records {
            let handle = record.account.to_lowercase();
            directory
                .display_names
                .insert(record.id.clone(), record.name.clone());
            directory.mention_handles.insert(record.id, handle.clone());
            directory.handles_by_name.insert(record.name, handle);
        }
        directory
    }

    /// Looks up a user's display name by `ChatWork` id.
    #[must_use]
    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.display_names.get(id).map(String::as_str)
    }

    /// Looks up a user's `Slack` mention handle by `ChatWork` id.
    #[must_use]
    pub fn mention_handle(&self, id: &str) -> Option<&str> {
        self.mention_handles.get(id).map(String::as_str)
    }

    /// Looks up a user's `Slack` mention handle by display name.
    #[must_use]
    pub fn handle_for_name(&self, name: &str) -> Option<&str> {
        self.handles_by_name.get(name).map(String::as_str)
    }
}

/// Parses a roster JSON string into [`UserRecord`]s.
///
/// This is the main entry point for loading the user list; the binary reads
/// the file and hands the content here.
///
/// # Arguments
///
/// * `json_str` - The raw JSON content of the roster file
///
/// # Errors
///
/// Returns an error if the JSON is malformed or doesn't match the expected
/// roster shape.
///
/// # Example
///
/// ```
/// use cw2slack::directory::parse_users;
///
/// let json = r#"[{ "id": "1", "name": "Ann", "account": "ann" }]"#;
/// let records = parse_users(json).unwrap();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].name, "Ann");
/// ```
pub fn parse_users(json_str: &str) -> Result<Vec<UserRecord>, RosterError> {
    serde_json::from_str(json_str).context(JsonSnafu)
}
