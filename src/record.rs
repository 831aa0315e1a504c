// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! CSV record layer for whole `ChatWork` export files.
//!
//! This module turns a `ChatWork` export (headerless CSV rows of
//! `timestamp, name, message`) into `Slack` import rows
//! (`timestamp, room, account, message`), running every message through the
//! [converter](crate::converter) and enriching each row with a Unix
//! timestamp and a `Slack` account handle.
//!
//! # Row processing
//!
//! [`convert_export`] reads rows from any reader and writes converted rows
//! to any writer; the binary supplies files. Per file:
//!
//! 1. Convert each row's message markup
//! 2. Drop rows whose converted message is empty (e.g. a bare `[deleted]`)
//! 3. Parse the timestamp to Unix seconds, substituting 0 when unparseable
//! 4. Resolve the author's account handle, synthesizing `cw_<name>` on a
//!    roster miss
//! 5. Sort surviving rows by timestamp and write them out
//!
//! Output quoting uses backslash-escaped embedded quotes rather than doubled
//! quotes, matching what the downstream import tooling expects.

use crate::converter::convert;
use crate::directory::UserDirectory;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::io;
use std::sync::LazyLock;

/// `ChatWork`'s home timezone; export timestamps are JST wall-clock times.
static JST: LazyLock<FixedOffset> = LazyLock::new(|| FixedOffset::east_opt(9 * 3600).unwrap());

/// Local date-time layouts seen in `ChatWork` exports.
const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Error type for export conversion failures.
#[derive(Debug, Snafu)]
pub enum ExportError {
    /// Failed to read or parse an input CSV row.
    #[snafu(display("failed to read CSV row: {source}"))]
    ReadRow {
        /// The underlying CSV error.
        source: csv::Error,
    },

    /// Failed to write an output CSV row.
    #[snafu(display("failed to write CSV row: {source}"))]
    WriteRow {
        /// The underlying CSV error.
        source: csv::Error,
    },

    /// Failed to flush the output writer.
    #[snafu(display("failed to flush output: {source}"))]
    Flush {
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// One input row of a `ChatWork` export file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatRecord {
    /// The human-readable export timestamp.
    pub timestamp: String,
    /// The author's display name.
    pub name: String,
    /// The raw message markup.
    pub message: String,
}

/// One output row of a converted `Slack` import file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackRecord {
    /// Unix seconds; 0 when the export timestamp was unparseable.
    pub timestamp: i64,
    /// The numeric room id derived from the source filename.
    pub room: String,
    /// The resolved (or synthesized `cw_`-prefixed) account handle.
    pub account: String,
    /// The converted message text.
    pub message: String,
}

/// Parses a human-readable export timestamp into Unix seconds.
///
/// Accepts RFC 3339 as well as the local `YYYY-MM-DD HH:MM[:SS]` and
/// `YYYY/MM/DD HH:MM[:SS]` forms, interpreted in JST. Returns `None` for
/// anything else; the row pipeline substitutes 0 rather than failing the
/// record.
///
/// # Example
///
/// ```
/// use cw2slack::record::normalize_timestamp;
///
/// assert_eq!(normalize_timestamp("1970-01-01 09:00:00"), Some(0));
/// assert_eq!(normalize_timestamp("yesterday"), None);
/// ```
#[must_use]
pub fn normalize_timestamp(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(instant.timestamp());
    }

    LOCAL_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(trimmed, format)
            .ok()
            .and_then(|naive| JST.from_local_datetime(&naive).single())
            .map(|local| local.timestamp())
    })
}

/// Resolves a display name to a `Slack` account handle, synthesizing a
/// `cw_`-prefixed fallback when the roster has no entry.
#[must_use]
pub fn slack_account(name: &str, directory: &UserDirectory) -> String {
    directory
        .handle_for_name(name)
        .map_or_else(|| format!("cw_{name}"), str::to_owned)
}

/// Converts one export file's rows from a reader to a writer.
///
/// Reads headerless `timestamp, name, message` rows, converts every
/// message, drops rows whose converted message is empty, sorts the
/// survivors by timestamp, and writes headerless
/// `timestamp, room, account, message` rows. Returns the number of rows
/// written.
///
/// # Arguments
///
/// * `input` - The export CSV content
/// * `output` - Where converted CSV rows are written
/// * `room` - The room id recorded on every output row
/// * `directory` - The shared user roster
///
/// # Errors
///
/// Returns an error if a CSV row cannot be read or written. Message
/// content itself never fails conversion.
///
/// # Example
///
/// ```
/// use cw2slack::directory::UserDirectory;
/// use cw2slack::record::convert_export;
///
/// let input = "2013-09-24 16:47:19,Sato,hello\n";
/// let mut output = Vec::new();
///
/// let written =
///     convert_export(input.as_bytes(), &mut output, "14", &UserDirectory::default()).unwrap();
///
/// assert_eq!(written, 1);
/// assert_eq!(output, b"1380008839,14,cw_Sato,hello\n");
/// ```
pub fn convert_export<R: io::Read, W: io::Write>(
    input: R,
    output: W,
    room: &str,
    directory: &UserDirectory,
) -> Result<usize, ExportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(input);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .double_quote(false)
        .from_writer(output);

    let mut rows = Vec::new();
    for row in reader.deserialize::<ChatRecord>() {
        let row = row.context(ReadRowSnafu)?;
        let message = convert(&row.message, directory);
        if message.is_empty() {
            continue;
        }
        rows.push(SlackRecord {
            timestamp: normalize_timestamp(&row.timestamp).unwrap_or(0),
            room: room.to_owned(),
            account: slack_account(&row.name, directory),
            message,
        });
    }
    rows.sort_by_key(|row| row.timestamp);

    for row in &rows {
        writer.serialize(row).context(WriteRowSnafu)?;
    }
    writer.flush().context(FlushSnafu)?;

    Ok(rows.len())
}
