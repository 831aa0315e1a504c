// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for cw2slack.
//!
//! This binary provides the `cw2slack` command for converting `ChatWork`
//! export CSV files to `Slack`-formatted CSV.

use cw2slack::directory::{self, UserDirectory};
use cw2slack::record;
use lexopt::prelude::*;
use snafu::{OptionExt, ensure, prelude::*};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where to write the converted output.
#[derive(Clone)]
enum OutputTarget {
    /// Write each file to the specified directory.
    Directory(PathBuf),
    /// Write to stdout.
    Stdout,
}

struct Cli {
    input: Vec<PathBuf>,
    output: OutputTarget,
    users: Option<PathBuf>,
    quiet: bool,
    dry_run: bool,
    force: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("at least one input file or directory is required"))]
    NoInputFiles,

    #[snafu(display("cannot output multiple files to stdout"))]
    MultipleFilesToStdout,

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadRoster {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse {}: {source}", path.display()))]
    ParseRoster {
        path: PathBuf,
        source: directory::RosterError,
    },

    #[snafu(display("failed to create output directory: {source}"))]
    CreateOutputDir { source: std::io::Error },

    #[snafu(display("invalid input filename {}: no leading room id", path.display()))]
    NoRoomId { path: PathBuf },

    #[snafu(display("failed to open {}: {source}", path.display()))]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to convert {}: {source}", path.display()))]
    ConvertFile {
        path: PathBuf,
        source: record::ExportError,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert ChatWork chat exports to Slack-formatted CSV

Usage: {name} [OPTIONS] <INPUT>...

Arguments:
  <INPUT>...  Input CSV files or directories containing exports

Options:
  -o, --output <OUTPUT>  Output directory (default: converted, or - for stdout)
  -u, --users <FILE>     User roster JSON for mention and account lookups
  -q, --quiet            Suppress progress messages
  -n, --dry-run          Show what would be processed without writing
  -f, --force            Overwrite existing output files
  -h, --help             Print help
  -V, --version          Print version",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut input = Vec::new();
    let mut output = OutputTarget::Directory(PathBuf::from("converted"));
    let mut users = None;
    let mut quiet = false;
    let mut dry_run = false;
    let mut force = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::Directory(val)
                };
            }
            Short('u') | Long("users") => users = Some(parser.value()?.parse()?),
            Short('q') | Long("quiet") => quiet = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('f') | Long("force") => force = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => input.push(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input,
        output,
        users,
        quiet,
        dry_run,
        force,
    })
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;

    ensure!(!cli.input.is_empty(), NoInputFilesSnafu);

    let directory = load_directory(cli.users.as_deref())?;

    // Collect all input files first
    let files = collect_input_files(&cli.input);
    ensure!(!files.is_empty(), NoInputFilesSnafu);

    match &cli.output {
        OutputTarget::Stdout => {
            // Only one file's rows can go to stdout
            ensure!(files.len() == 1, MultipleFilesToStdoutSnafu);
            process_to_stdout(&files[0], &directory, &cli)?;
        }
        OutputTarget::Directory(dir) => {
            if !cli.dry_run {
                std::fs::create_dir_all(dir).context(CreateOutputDirSnafu)?;
            }
            for file in &files {
                process_file(file, dir, &directory, &cli)?;
            }
        }
    }

    Ok(())
}

/// Loads the user roster, or an empty directory when none was given.
fn load_directory(users: Option<&Path>) -> Result<UserDirectory, Error> {
    let Some(path) = users else {
        return Ok(UserDirectory::default());
    };

    let json = std::fs::read_to_string(path).context(ReadRosterSnafu { path })?;
    let records = directory::parse_users(&json).context(ParseRosterSnafu { path })?;
    Ok(UserDirectory::from_records(records))
}

/// Collects all CSV files from the given inputs (files and directories).
fn collect_input_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "csv"))
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// Extracts the room id from an input filename: its leading decimal digits.
fn room_id(input: &Path) -> Result<String, Error> {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .context(NoRoomIdSnafu { path: input })?;

    let digits: String = stem.chars().take_while(char::is_ascii_digit).collect();
    ensure!(!digits.is_empty(), NoRoomIdSnafu { path: input });
    Ok(digits)
}

/// Processes a single file and outputs to stdout.
fn process_to_stdout(input: &Path, directory: &UserDirectory, cli: &Cli) -> Result<(), Error> {
    let room = room_id(input)?;

    if cli.dry_run {
        eprintln!("Would output {}", input.display());
        return Ok(());
    }

    let reader = std::fs::File::open(input).context(OpenFileSnafu { path: input })?;
    record::convert_export(reader, std::io::stdout().lock(), &room, directory)
        .context(ConvertFileSnafu { path: input })?;

    Ok(())
}

/// Processes a single file and writes to the output directory.
fn process_file(
    input: &Path,
    out_dir: &Path,
    directory: &UserDirectory,
    cli: &Cli,
) -> Result<(), Error> {
    let room = room_id(input)?;
    let out_name = input.file_name().context(NoRoomIdSnafu { path: input })?;
    let out_path = out_dir.join(out_name);

    // Handle dry-run mode
    if cli.dry_run {
        eprintln!("Would write {}", out_path.display());
        return Ok(());
    }

    // Check if output exists and handle overwrite
    if out_path.exists() && !cli.force {
        eprintln!(
            "Skipping {} (already exists, use --force to overwrite)",
            out_path.display()
        );
        return Ok(());
    }

    let reader = std::fs::File::open(input).context(OpenFileSnafu { path: input })?;
    let writer = std::fs::File::create(&out_path).context(WriteFileSnafu { path: &out_path })?;

    let written = record::convert_export(reader, writer, &room, directory)
        .context(ConvertFileSnafu { path: input })?;

    if !cli.quiet {
        eprintln!("Wrote {} ({written} rows)", out_path.display());
    }
    Ok(())
}
