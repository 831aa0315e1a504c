// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! The `ChatWork` to `Slack` markup translation engine.
//!
//! This module transforms one exported message string at a time. `ChatWork`
//! messages use a `BBCode`-like dialect: paired block tags (`[info]...[/info]`,
//! `[code]...[/code]`), self-closing tags carrying attributes (`[To:363]`,
//! `[qtmeta aid=363 time=...]`), emoticon shorthands (`(y)`, `:)`), plus
//! HTML `<br>` tokens and entity escapes left over from the web client.
//!
//! # Pipeline
//!
//! [`convert`] runs four stages in fixed order:
//!
//! 1. [`normalize_attributes`]: canonicalize shorthand/unquoted attributes
//! 2. [`substitute_emoji`]: rewrite emoticons to `Slack` emoji codes
//! 3. [`resolve_single_tags`]: replace self-closing tags via roster lookups
//! 4. [`expand_block_tags`]: render paired tags and clean up HTML leftovers
//!
//! The stages assume this order: both tag stages rely on normalized
//! attribute syntax, and block expansion consumes what single-tag resolution
//! leaves behind. Malformed markup never fails a conversion; every stage
//! passes unrecognized text through unchanged.
//!
//! # Example
//!
//! ```
//! use cw2slack::converter::convert;
//! use cw2slack::directory::{UserDirectory, parse_users};
//!
//! let roster = r#"[{ "id": 363, "name": "Sato", "account": "sato" }]"#;
//! let directory = UserDirectory::from_records(parse_users(roster).unwrap());
//!
//! let out = convert("[To:363] please review[code]let x = 1;[/code]", &directory);
//! assert!(out.starts_with("<@sato> "));
//! assert!(out.contains("```\nlet x = 1;\n```"));
//! ```

use crate::directory::UserDirectory;
use chrono::{DateTime, FixedOffset};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A bracket-delimited tag span: first `[` to the next `]`, non-nested.
static TAG_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*?\]").unwrap());

/// The `[name:value]` shorthand opener.
static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\w+):").unwrap());

/// An unquoted `key=value` run. Chained `=` stay in one run so the rewrite
/// can split at the last one.
static KEY_VALUE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+(?:=[\w,-]+)+").unwrap());

/// The tag name at the start of a span.
static TAG_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[(\w+)").unwrap());

/// A canonical `key="value"` attribute, value possibly holding escaped quotes.
static QUOTED_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="((?:\\"|[\w,-])+)""#).unwrap());

/// A close tag span.
static CLOSE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[/(\w+)\]$").unwrap());

/// An HTML line-break token, with optional spacing and self-closing slash.
static LINE_BREAK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\s*br\s*/?\s*>").unwrap());

/// The three HTML entities `ChatWork` escapes in message bodies.
static HTML_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&(?:amp|lt|gt);").unwrap());

/// A run of two or more newlines.
static LINE_BREAK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());

/// `ChatWork`'s home timezone; export timestamps are JST wall-clock times.
static JST: LazyLock<FixedOffset> = LazyLock::new(|| FixedOffset::east_opt(9 * 3600).unwrap());

/// `ChatWork` emoticon literals and their `Slack` replacements.
///
/// Substitution walks this table in order and each replacement is final:
/// `]:)` is never seen whole because `:)` rewrites first, and `(^^;)` loses
/// its tail to `;)` the same way. The order is part of the contract.
const EMOTICONS: [(&str, &str); 42] = [
    (":)", ":slightly_smiling_face:"),
    (":(", ":disappointed:"),
    (":D", ":smiley:"),
    ("8-)", ":sunglasses:"),
    (":o", ":hushed:"),
    (";)", ":wink:"),
    (";(", ":cry:"),
    ("(sweat)", ":sweat:"),
    (":|", ":neutral_face:"),
    (":*", ":kissing_heart:"),
    (":p", ":yum:"),
    ("(blush)", ":blush:"),
    (":^)", ":thinking_face:"),
    ("|-)", ":sleeping:"),
    ("(inlove)", ":heart_eyes:"),
    ("]:)", ":laughing:"),
    ("(talk)", ":speech_balloon:"),
    ("(yawn)", ":sleepy:"),
    ("(puke)", ":weary:"),
    ("(emo)", ":smirk:"),
    ("8-|", ":nerd:"),
    (":#)", ":grin:"),
    ("(nod)", ":thumbsup:"),
    ("(shake)", ":confused:"),
    ("(^^;)", ":sweat_smile:"),
    ("(whew)", ":sweat_smile:"),
    ("(clap)", ":clap:"),
    ("(bow)", ":bow:"),
    ("(roger)", ":chatwork-roger:"),
    ("(flex)", ":muscle:"),
    ("(dance)", ":chatwork-dance:"),
    ("(:/)", ":scream:"),
    ("(devil)", ":smiling_imp:"),
    ("(*)", ":star:"),
    ("(h)", ":heart:"),
    ("(F)", ":blossom:"),
    ("(cracker)", ":tada:"),
    ("(^)", ":birthday:"),
    ("(coffee)", ":coffee:"),
    ("(beer)", ":beer:"),
    ("(handshake)", "🤝"),
    ("(y)", ":thumbsup:"),
];

/// Converts one `ChatWork` message to `Slack` markup.
///
/// This is the main entry point. It runs the fixed four-stage pipeline over
/// the input: attribute normalization, emoticon substitution, single-tag
/// resolution, block-tag expansion. Each stage's full output feeds the next.
///
/// The conversion never fails: unknown tags, unterminated blocks, and
/// unresolvable user ids all fall back to defined pass-through text.
///
/// # Arguments
///
/// * `input` - The raw message text from a `ChatWork` export
/// * `directory` - The shared user roster for mention and name lookups
///
/// # Example
///
/// ```
/// use cw2slack::converter::convert;
/// use cw2slack::directory::UserDirectory;
///
/// let directory = UserDirectory::default();
/// let out = convert("[title]Hi[/title](y)", &directory);
/// assert_eq!(out, "*Hi*\n :thumbsup: ");
/// ```
#[must_use]
pub fn convert(input: &str, directory: &UserDirectory) -> String {
    let normalized = normalize_attributes(input);
    let with_emoji = substitute_emoji(&normalized);
    let resolved = resolve_single_tags(&with_emoji, directory);
    expand_block_tags(&resolved)
}

/// Rewrites shorthand and unquoted tag attributes into canonical
/// `key="value"` form, per bracket span.
///
/// `[To:363]` becomes `[To attr="363"]`; `[qtmeta aid=363 time=99]` becomes
/// `[qtmeta aid="363" time="99"]`. Commas in values map to underscores and
/// embedded double quotes are escaped. Spans with no recognizable attribute
/// syntax pass through unchanged.
#[must_use]
pub fn normalize_attributes(input: &str) -> String {
    TAG_SPAN
        .replace_all(input, |span: &Captures| {
            let shorthand = SHORTHAND.replace(&span[0], "[$1 attr=");
            KEY_VALUE_RUN
                .replace_all(&shorthand, |run: &Captures| quote_value(&run[0]))
                .into_owned()
        })
        .into_owned()
}

/// Quotes one `key=value` run, splitting at the last `=` so a chained
/// `attr=aid=5` keeps `aid` as the key: `attr=aid="5"`.
fn quote_value(run: &str) -> String {
    match run.rsplit_once('=') {
        Some((key, value)) => {
            let escaped = value.replace(',', "_").replace('"', "\\\"");
            format!("{key}=\"{escaped}\"")
        }
        None => run.to_owned(),
    }
}

/// Replaces every emoticon literal with its space-padded `Slack` emoji token.
///
/// Runs over the whole input, including tag bodies and attribute values, in
/// the fixed table order documented on [`EMOTICONS`].
#[must_use]
pub fn substitute_emoji(input: &str) -> String {
    let mut out = input.to_owned();
    for (emoticon, emoji) in EMOTICONS {
        if out.contains(emoticon) {
            out = out.replace(emoticon, &format!(" {emoji} "));
        }
    }
    out
}

/// Transient attribute set parsed out of one tag occurrence.
type TagAttributes = HashMap<String, String>;

/// Parses all `key="value"` pairs in a span, unescaping embedded quotes.
/// Duplicate keys keep the last value.
fn parse_attributes(span: &str) -> TagAttributes {
    QUOTED_ATTRIBUTE
        .captures_iter(span)
        .map(|pair| (pair[1].to_owned(), pair[2].replace("\\\"", "\"")))
        .collect()
}

/// Render signature for self-closing tags: captured trailing content, parsed
/// attributes, and the shared lookup context.
type SingleTagRender = fn(&str, &TagAttributes, &UserDirectory) -> String;

/// One self-closing tag kind.
struct SingleTagSpec {
    /// Tag name, matched case-sensitively.
    name: &'static str,
    /// Whether the tag consumes the literal text run following its span (up
    /// to the next `[` or newline) as render content.
    captures_content: bool,
    render: SingleTagRender,
}

static SINGLE_TAGS: [SingleTagSpec; 8] = [
    SingleTagSpec {
        name: "qtmeta",
        captures_content: false,
        render: render_quote_header,
    },
    SingleTagSpec {
        name: "hr",
        captures_content: false,
        render: render_rule,
    },
    SingleTagSpec {
        name: "To",
        captures_content: true,
        render: render_mention,
    },
    SingleTagSpec {
        name: "rp",
        captures_content: false,
        render: render_reply,
    },
    SingleTagSpec {
        name: "dtext",
        captures_content: true,
        render: render_system_text,
    },
    SingleTagSpec {
        name: "preview",
        captures_content: false,
        render: render_nothing,
    },
    SingleTagSpec {
        name: "piconname",
        captures_content: true,
        render: render_icon_name,
    },
    SingleTagSpec {
        name: "deleted",
        captures_content: false,
        render: render_nothing,
    },
];

fn single_tag(name: &str) -> Option<&'static SingleTagSpec> {
    SINGLE_TAGS.iter().find(|spec| spec.name == name)
}

/// `[qtmeta aid="..." time="..."]`: the said-by/date header above a quote.
fn render_quote_header(
    _content: &str,
    attributes: &TagAttributes,
    directory: &UserDirectory,
) -> String {
    let id = attributes
        .get("aid")
        .or_else(|| attributes.get("attr"))
        .map_or("", String::as_str);
    let name = directory.display_name(id).unwrap_or(id);
    let date = attributes
        .get("time")
        .map_or_else(String::new, |time| format_quote_date(time));
    format!("Said: {name}\nDate: {date}\n")
}

/// Formats a Unix-seconds string as a Japanese long-form date in JST.
/// Values that don't parse pass through as-is.
fn format_quote_date(time: &str) -> String {
    time.parse::<i64>()
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .map_or_else(
            || time.to_owned(),
            |utc| {
                utc.with_timezone(&*JST)
                    .format("%Y年%-m月%-d日 %H:%M")
                    .to_string()
            },
        )
}

/// `[hr]`: a horizontal rule.
fn render_rule(_content: &str, _attributes: &TagAttributes, _directory: &UserDirectory) -> String {
    "\n- - - - -\n".to_owned()
}

/// `[To attr="..."]`: a mention by account id. Unresolvable ids fall back to
/// the plain content plus a trailing space.
fn render_mention(content: &str, attributes: &TagAttributes, directory: &UserDirectory) -> String {
    let id = attributes.get("attr").map_or("", String::as_str);
    directory.mention_handle(id).map_or_else(
        || format!("{content} "),
        |handle| format!("<@{handle}> {content}"),
    )
}

/// `[rp aid="..."]`: a reply marker.
fn render_reply(_content: &str, attributes: &TagAttributes, directory: &UserDirectory) -> String {
    let id = attributes.get("aid").map_or("", String::as_str);
    directory
        .mention_handle(id)
        .map_or_else(|| "Reply: ".to_owned(), |handle| format!("<@{handle}> "))
}

/// `[dtext attr="..."]`: fixed system-message vocabulary.
fn render_system_text(
    content: &str,
    attributes: &TagAttributes,
    _directory: &UserDirectory,
) -> String {
    let key = attributes.get("attr").map_or("", String::as_str);
    system_phrase(key).map_or_else(|| content.to_owned(), |phrase| format!("{phrase}{content}"))
}

/// Maps a `dtext` key to its notification phrase. The vocabulary is
/// `ChatWork`'s own system-message wording and stays in Japanese.
fn system_phrase(key: &str) -> Option<&'static str> {
    match key {
        "task_added" => Some("タスク追加"),
        "file_uploaded" => Some(" 📤 ファイルアップロード"),
        "chatroom_chat_edited" => Some("チャット変更"),
        "chatroom_member_is" => Some("メンバー "),
        "chatroom_priv_changed" => Some(" を管理者にしました"),
        "chatroom_added" => Some(" が入室しました"),
        "chatroom_deleted" => Some(" が退室しました"),
        "chatroom_chatname_is" => Some("チャット名を\n"),
        "chatroom_description_is" => Some("説明文を\n"),
        "chatroom_changed" => Some("\nに変更しました"),
        "chatroom_set" => Some("\nに設定しました"),
        "chatroom_groupchat_created" => Some("チャット作成"),
        "task_done" => Some("タスク終了"),
        "nickname_suffix" => Some(" さん"),
        "chatroom_over_groupchatnum" => Some(" は，制限により入室できません"),
        _ => None,
    }
}

/// `[preview]` and `[deleted]`: suppressed entirely.
const fn render_nothing(
    _content: &str,
    _attributes: &TagAttributes,
    _directory: &UserDirectory,
) -> String {
    String::new()
}

/// `[piconname attr="..."]`: an inline user-icon name.
fn render_icon_name(
    content: &str,
    attributes: &TagAttributes,
    directory: &UserDirectory,
) -> String {
    let id = attributes.get("attr").map_or("", String::as_str);
    directory
        .display_name(id)
        .map_or_else(|| content.to_owned(), |name| format!(" {name} {content}"))
}

/// Resolves self-closing tags against the user directory.
///
/// Each bracket span whose tag name is in the single-tag registry is
/// replaced by its render output; unknown spans pass through unchanged.
/// Lookups that miss never fail, they take the tag's fallback text.
#[must_use]
pub fn resolve_single_tags(input: &str, directory: &UserDirectory) -> String {
    let mut out = String::with_capacity(input.len());
    let mut position = 0;

    while let Some(span) = TAG_SPAN.find_at(input, position) {
        out.push_str(&input[position..span.start()]);

        let name = TAG_NAME
            .captures(span.as_str())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        let Some(spec) = name.and_then(single_tag) else {
            out.push_str(span.as_str());
            position = span.end();
            continue;
        };

        let attributes = parse_attributes(span.as_str());
        let (content, consumed) = if spec.captures_content {
            let tail = &input[span.end()..];
            let stop = tail.find(['[', '\n']).unwrap_or(tail.len());
            (&tail[..stop], span.end() + stop)
        } else {
            ("", span.end())
        };

        out.push_str(&(spec.render)(content, &attributes, directory));
        position = consumed;
    }

    out.push_str(&input[position..]);
    out
}

/// Render signature for paired tags: the (possibly recursively rendered)
/// body and the open tag's attributes.
type BlockTagRender = fn(&str, &TagAttributes) -> String;

/// One paired open/close tag kind.
struct TagSpec {
    /// Tag name, matched case-sensitively.
    name: &'static str,
    /// Whether tag syntax inside the body is parsed. When false the body
    /// renders verbatim.
    allows_nested_tags: bool,
    /// Whether runs of newlines in the body collapse to one before render.
    collapses_line_breaks: bool,
    /// Whether newlines in the body are dropped before render.
    suppresses_own_line_breaks: bool,
    render: BlockTagRender,
}

/// Default block-tag flags; entries override what they need.
const fn tag(name: &'static str, render: BlockTagRender) -> TagSpec {
    TagSpec {
        name,
        allows_nested_tags: true,
        collapses_line_breaks: false,
        suppresses_own_line_breaks: false,
        render,
    }
}

static BLOCK_TAGS: [TagSpec; 6] = [
    tag("download", render_download),
    tag("info", render_info),
    TagSpec {
        name: "code",
        allows_nested_tags: false,
        collapses_line_breaks: false,
        suppresses_own_line_breaks: false,
        render: render_code,
    },
    tag("title", render_title),
    tag("task", render_task),
    tag("qt", render_quote_block),
];

/// `[download attr="id"]filename[/download]`: an uploaded-file marker.
fn render_download(content: &str, attributes: &TagAttributes) -> String {
    let file_id = attributes.get("attr").map_or("", String::as_str);
    format!("\n*FileName* : {file_id}_{content}\n")
}

/// `[info]`: a plain block quote.
fn render_info(content: &str, _attributes: &TagAttributes) -> String {
    format!("\n{}\n", quote_lines(content))
}

/// `[code]`: a fenced code block, body verbatim.
fn render_code(content: &str, _attributes: &TagAttributes) -> String {
    format!("\n```\n{content}\n```\n")
}

/// `[title]`: bolded text.
fn render_title(content: &str, _attributes: &TagAttributes) -> String {
    format!("*{content}*\n")
}

/// `[task]`: a labeled block quote.
fn render_task(content: &str, _attributes: &TagAttributes) -> String {
    format!("\n> Task:\n{}\n", quote_lines(content))
}

/// `[qt]`: a labeled block quote for quoted messages.
fn render_quote_block(content: &str, _attributes: &TagAttributes) -> String {
    format!("\n> QT:\n{}\n", quote_lines(content))
}

/// Prefixes every line with the `Slack` quote marker, substituting a
/// zero-width non-joiner on empty lines so the marker still renders.
fn quote_lines(content: &str) -> String {
    content
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                "> \u{200c}".to_owned()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Expands paired block tags into `Slack` markup and cleans up HTML leftovers.
///
/// The tag tree renders children before parents; tags that forbid nesting
/// keep their body verbatim. Unknown tags and unterminated opens stay as
/// literal text. After rendering, `<br>` variants become real newlines and
/// the entities `&amp; &lt; &gt;` unescape in a single non-re-entrant pass.
#[must_use]
pub fn expand_block_tags(input: &str) -> String {
    let rendered = render_tag_tree(input);
    let unbroken = LINE_BREAK_TAG.replace_all(&rendered, "\n");
    HTML_ENTITY
        .replace_all(&unbroken, |entity: &Captures| {
            match &entity[0] {
                "&amp;" => "&",
                "&lt;" => "<",
                "&gt;" => ">",
                other => other,
            }
            .to_owned()
        })
        .into_owned()
}

/// Renders one level of the tag tree, recursing into nestable bodies.
fn render_tag_tree(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut position = 0;

    while let Some(span) = TAG_SPAN.find_at(input, position) {
        out.push_str(&input[position..span.start()]);

        let Some((spec, attributes)) = open_block_tag(span.as_str()) else {
            out.push_str(span.as_str());
            position = span.end();
            continue;
        };

        let Some((body_end, close_end)) = find_closing_tag(input, span.end(), spec) else {
            // Unterminated: the open tag stays literal.
            out.push_str(span.as_str());
            position = span.end();
            continue;
        };

        let raw_body = &input[span.end()..body_end];
        let body = if spec.allows_nested_tags {
            render_tag_tree(raw_body)
        } else {
            raw_body.to_owned()
        };
        let body = apply_line_break_flags(body, spec);

        out.push_str(&(spec.render)(&body, &attributes));
        position = close_end;
    }

    out.push_str(&input[position..]);
    out
}

/// Identifies a span as a registered open tag, returning its spec and
/// parsed attributes.
fn open_block_tag(span: &str) -> Option<(&'static TagSpec, TagAttributes)> {
    let name = TAG_NAME.captures(span)?.get(1)?.as_str();
    let spec = BLOCK_TAGS.iter().find(|spec| spec.name == name)?;
    Some((spec, parse_attributes(span)))
}

/// Finds the matching close tag, honoring same-name nesting for nestable
/// tags. Returns the body end and the scan position after the close tag.
fn find_closing_tag(input: &str, from: usize, spec: &TagSpec) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut position = from;

    while let Some(span) = TAG_SPAN.find_at(input, position) {
        if is_closing_tag(span.as_str(), spec.name) {
            depth -= 1;
            if depth == 0 {
                return Some((span.start(), span.end()));
            }
        } else if spec.allows_nested_tags && is_opening_tag(span.as_str(), spec.name) {
            depth += 1;
        }
        position = span.end();
    }

    None
}

fn is_closing_tag(span: &str, name: &str) -> bool {
    CLOSE_TAG.captures(span).is_some_and(|caps| &caps[1] == name)
}

fn is_opening_tag(span: &str, name: &str) -> bool {
    TAG_NAME.captures(span).is_some_and(|caps| &caps[1] == name)
}

/// Applies the per-tag line-break flags to a rendered body. No entry in the
/// current registry sets either flag.
fn apply_line_break_flags(body: String, spec: &TagSpec) -> String {
    if spec.suppresses_own_line_breaks {
        body.replace('\n', "")
    } else if spec.collapses_line_breaks {
        LINE_BREAK_RUN.replace_all(&body, "\n").into_owned()
    } else {
        body
    }
}
