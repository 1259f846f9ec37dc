//! Purpose: `csvmodel` CLI entry point.
//! Role: Binary crate root; parses args, builds the model, emits JSON or text on stdout.
//! Invariants: Row output is JSON Lines on stdout; diagnostics and logs go to stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal, Write};

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod model_json;

use csvmodel::api::{Error, ErrorKind, ModelOptions, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();

    let color_mode = cli.color;
    let options = model_options(&cli);
    let result = command_dispatch::dispatch_command(cli.command, options, color_mode);

    result
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "csvmodel",
    version,
    about = "Infer a relational model from delimited files and query it",
    long_about = r#"Infer a relational model from a set of delimited text files.

Each file becomes a table, each header cell a column. Columns named after
another table plus `id` become relations in both directions."#,
    after_help = r#"EXAMPLES
  $ csvmodel schema data/*.csv
  $ csvmodel rows data/*.csv --table books --limit 5 --relations
  $ csvmodel lookup data/*.csv --table authors --column id --value 1 2

LOGGING
  Set RUST_LOG (e.g. RUST_LOG=debug) to see inference details on stderr."#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_parser = parse_delimiter,
        help = "Field delimiter for every file (default: detected per file); use `tab` for TAB"
    )]
    delimiter: Option<u8>,
    #[arg(
        long,
        global = true,
        help = "Skip files that are not structurally valid delimited files"
    )]
    ignore_invalid: bool,
    #[arg(long, global = true, help = "Do not infer relations between tables")]
    no_relations: bool,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics (always also pretty-prints JSON): auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Print the inferred tables, columns and relations",
        after_help = r#"EXAMPLES
  $ csvmodel schema data/*.csv
  $ csvmodel schema 'data/**/*.csv' --json"#
    )]
    Schema {
        #[arg(required = true, help = "Files or glob patterns", value_hint = ValueHint::FilePath)]
        files: Vec<String>,
        #[arg(long, help = "Emit the model as JSON")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Emit the rows of one table as JSON Lines",
        after_help = r#"EXAMPLES
  $ csvmodel rows data/*.csv --table books
  $ csvmodel rows data/*.csv --table books --limit 10 --relations"#
    )]
    Rows {
        #[arg(required = true, help = "Files or glob patterns", value_hint = ValueHint::FilePath)]
        files: Vec<String>,
        #[arg(long, help = "Table symbolic name (see `csvmodel schema`)")]
        table: String,
        #[arg(long, help = "Stop after N rows")]
        limit: Option<usize>,
        #[arg(long, help = "Include related rows under a `relations` object")]
        relations: bool,
        #[arg(long, help = "Stream rows from disk instead of caching them")]
        no_cache: bool,
        #[arg(long, help = "Do not share equal field values between rows")]
        no_intern: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Emit rows whose column matches any of the given values",
        after_help = r#"EXAMPLES
  $ csvmodel lookup data/*.csv --table authors --column id --value 1 2"#
    )]
    Lookup {
        #[arg(
            required = true,
            num_args = 1..,
            help = "Files or glob patterns",
            value_hint = ValueHint::FilePath
        )]
        files: Vec<String>,
        #[arg(long, help = "Table symbolic name")]
        table: String,
        #[arg(long, help = "Column symbolic name")]
        column: String,
        #[arg(long = "value", required = true, num_args = 1.., help = "Values to match exactly")]
        values: Vec<String>,
        #[arg(long, help = "Include related rows under a `relations` object")]
        relations: bool,
    },
    #[command(
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ csvmodel completion bash > ~/.local/share/bash-completion/completions/csvmodel
  $ csvmodel completion zsh > ~/.zfunc/_csvmodel"#
    )]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn model_options(cli: &Cli) -> ModelOptions {
    ModelOptions::new()
        .with_delimiter(cli.delimiter)
        .with_ignore_invalid_files(cli.ignore_invalid)
        .with_detect_relations(!cli.no_relations)
}

fn parse_delimiter(input: &str) -> Result<u8, String> {
    match input {
        "tab" | "\\t" | "\t" => return Ok(b'\t'),
        _ => {}
    }
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii() && ch != '"' && ch != '\n' && ch != '\r' => Ok(ch as u8),
        _ => Err(format!(
            "delimiter must be a single ASCII character other than a quote or newline, got `{input}`"
        )),
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Io => err.with_hint("I/O error. Check the path and file permissions."),
        ErrorKind::Parse => err.with_hint(
            "The file is not valid delimited text. Pass --delimiter, or --ignore-invalid to skip it.",
        ),
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share command/context if it persists.",
    )
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let pretty = is_tty || color_mode.use_color(is_tty);
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

/// One compact JSON value per line, regardless of terminal.
fn emit_json_line(out: &mut impl Write, value: &Value) -> Result<(), Error> {
    serde_json::to_writer(&mut *out, value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("json encode failed")
            .with_source(err)
    })?;
    writeln!(out).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write output")
            .with_source(err)
    })
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Parse => "malformed delimited data".to_string(),
        ErrorKind::NameCollisionExhausted => "no unique name available".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(line) = err.line() {
        inner.insert("line".to_string(), json!(line));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(line) = err.line() {
        lines.push(format!(
            "{} {line}",
            colorize_label("line:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `csvmodel --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "csvmodel") else {
        return "Try `csvmodel --help`.".to_string();
    };

    let mut parts = Vec::new();
    for token in tokens.iter().skip(pos + 1) {
        if token.starts_with('-') || token.starts_with('<') || token.starts_with('[') {
            break;
        }
        parts.push(*token);
    }

    if parts.is_empty() {
        return "Try `csvmodel --help`.".to_string();
    }
    format!("Try `csvmodel {} --help`.", parts.join(" "))
}
