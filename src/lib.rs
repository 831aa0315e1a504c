// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Convert `ChatWork` chat exports to `Slack`-formatted text.
//!
//! This crate provides conversion functionality for transforming `ChatWork`'s
//! `BBCode`-like message markup into `Slack`'s plain-text markup, along with the
//! record plumbing to run whole export files through the converter.
//!
//! # Overview
//!
//! `ChatWork` exports chat logs as CSV files whose message column uses a
//! tag dialect (`[info]`, `[To:id]`, `[code]`, emoticons). This crate:
//!
//! 1. Normalizes shorthand tag attributes into a canonical quoted form
//! 2. Replaces emoticon shorthands with `Slack` emoji codes
//! 3. Resolves self-closing tags (mentions, quote headers) against a user
//!    roster
//! 4. Expands block tags (quotes, code fences, tasks) into `Slack` markup
//!
//! # Example
//!
//! ```
//! use cw2slack::converter;
//! use cw2slack::directory::UserDirectory;
//!
//! let directory = UserDirectory::default();
//! let slack = converter::convert("[info][title]Rules[/title]Be kind[/info]", &directory);
//!
//! assert!(slack.contains("> *Rules*"));
//! assert!(slack.contains("> Be kind"));
//! ```
//!
//! # Modules
//!
//! - [`converter`]: the markup translation engine (tag and emoji rewriting)
//! - [`directory`]: user roster parsing and id/name/account lookups
//! - [`record`]: CSV record layer for whole export files

#![deny(missing_docs)]

pub mod converter;
pub mod directory;
pub mod record;
