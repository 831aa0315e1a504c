// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Integration tests for cw2slack conversion and the export pipeline.

use cw2slack::converter::convert;
use cw2slack::directory::{UserDirectory, parse_users};
use cw2slack::record::convert_export;

fn sample_directory() -> UserDirectory {
    let roster = r#"[
        { "id": 363, "name": "Sato", "account": "Sato.Y" },
        { "id": "504", "name": "Tanaka", "account": "TANAKA" },
        { "id": 615, "name": "Suzuki", "account": "suzuki" }
    ]"#;
    UserDirectory::from_records(parse_users(roster).expect("roster should parse"))
}

/// Converts a realistic multi-tag message end to end.
#[test]
fn converts_full_message() {
    let input = "[To:363]Sato\n\
                 See the notes:[info][title]Standup[/title]10:00 every day (y)[/info]\
                 [code]cargo test[/code]";

    let output = convert(input, &sample_directory());

    assert_eq!(
        output,
        "<@sato.y> Sato\nSee the notes:\n> *Standup*\n> 10:00 every day  :thumbsup: \n\n```\ncargo test\n```\n"
    );
}

/// Quoted replies carry the said-by header, mention, and nested quote.
#[test]
fn converts_quoted_reply() {
    let input = "[rp aid=504 to=14-504][qt][qtmeta aid=504 time=1500000000]ship it[/qt]";

    let output = convert(input, &sample_directory());

    assert_eq!(
        output,
        "<@tanaka> \n> QT:\n> Said: Tanaka\n> Date: 2017年7月14日 11:40\n> ship it\n"
    );
}

/// System notifications resolve through the dtext vocabulary and the roster.
#[test]
fn converts_member_notification() {
    let input = "[dtext:chatroom_member_is][piconname:615][dtext:nickname_suffix][dtext:chatroom_added]";

    let output = convert(input, &sample_directory());

    assert_eq!(output, "メンバー  Suzuki  さん が入室しました");
}

/// Messages reduced to nothing convert to the empty string.
#[test]
fn deleted_message_converts_to_nothing() {
    assert_eq!(convert("[deleted]", &sample_directory()), "");
}

/// Markup the converter has never seen passes through untouched.
#[test]
fn unknown_markup_passes_through() {
    let input = "[blink]hello[/blink] [strong]hm[/strong";
    assert_eq!(convert(input, &sample_directory()), input);
}

/// Full pipeline: export CSV in, sorted and enriched Slack CSV out.
#[test]
fn converts_export_file() {
    let input = "\
2017-07-14 11:41:00,Tanaka,done (clap)
2017-07-14 11:40:00,Sato,[To:504]please review
2017-07-14 11:42:00,Yamada,[deleted]
";

    let mut output = Vec::new();
    let written = convert_export(input.as_bytes(), &mut output, "14", &sample_directory())
        .expect("conversion should succeed");
    let output = String::from_utf8(output).expect("output should be UTF-8");

    assert_eq!(written, 2);
    assert_eq!(
        output,
        "1500000000,14,sato.y,<@tanaka> please review\n1500000060,14,tanaka,done  :clap: \n"
    );
}

/// Authors missing from the roster get a synthesized account handle.
#[test]
fn unknown_author_gets_synthesized_account() {
    let input = "2017-07-14 11:40:00,Yamada,hello\n";

    let mut output = Vec::new();
    convert_export(input.as_bytes(), &mut output, "7", &sample_directory())
        .expect("conversion should succeed");
    let output = String::from_utf8(output).expect("output should be UTF-8");

    assert_eq!(output, "1500000000,7,cw_Yamada,hello\n");
}

/// An empty roster is valid; every lookup takes its fallback path.
#[test]
fn converts_without_roster() {
    let directory = UserDirectory::default();

    assert_eq!(convert("[To:363]Sato, ping", &directory), "Sato, ping ");

    let mut output = Vec::new();
    convert_export(
        &b"2017-07-14 11:40:00,Sato,hi\n"[..],
        &mut output,
        "1",
        &directory,
    )
    .expect("conversion should succeed");

    assert_eq!(output, b"1500000000,1,cw_Sato,hi\n");
}

/// Multi-line messages survive the CSV round trip quoted.
#[test]
fn multiline_message_is_quoted() {
    let input = "2017-07-14 11:40:00,Sato,\"[info]a\n\nb[/info]\"\n";

    let mut output = Vec::new();
    convert_export(input.as_bytes(), &mut output, "1", &sample_directory())
        .expect("conversion should succeed");
    let output = String::from_utf8(output).expect("output should be UTF-8");

    assert_eq!(
        output,
        "1500000000,1,sato.y,\"\n> a\n> \u{200c}\n> b\n\"\n"
    );
}
