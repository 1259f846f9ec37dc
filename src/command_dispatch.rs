//! Purpose: Hold top-level CLI command dispatch for `csvmodel`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `rows` and `lookup` write one JSON object per line to stdout.

use super::model_json::{database_json, database_text, row_json};
use super::*;
use csvmodel::api::{Context, ContextOptions, ContextTable, build_model};

pub(super) fn dispatch_command(
    command: Command,
    options: ModelOptions,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "csvmodel", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Schema { files, json } => {
            let db = build_model(&files, &options)?;
            if json {
                emit_json(database_json(&db), color_mode);
            } else {
                println!("{}", database_text(&db));
            }
            Ok(RunOutcome::ok())
        }
        Command::Rows {
            files,
            table,
            limit,
            relations,
            no_cache,
            no_intern,
        } => {
            let db = build_model(&files, &options)?;
            let context_options = ContextOptions::new()
                .with_cache(!no_cache)
                .with_intern(!no_intern);
            let context = Context::new(db, context_options);
            let target = resolve_table(&context, &table)?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            let rows = target.enumerate()?;
            for row in rows.take(limit.unwrap_or(usize::MAX)) {
                let row = row?;
                emit_json_line(&mut out, &row_json(&context, target, &row, relations)?)?;
            }
            Ok(RunOutcome::ok())
        }
        Command::Lookup {
            files,
            table,
            column,
            values,
            relations,
        } => {
            let db = build_model(&files, &options)?;
            let context = Context::new(db, ContextOptions::new());
            let target = resolve_table(&context, &table)?;

            let values = values.iter().map(String::as_str).collect::<Vec<_>>();
            let matches = target.lookup(&column, &values)?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            for row in &matches {
                emit_json_line(&mut out, &row_json(&context, target, row, relations)?)?;
            }
            Ok(RunOutcome::ok())
        }
    }
}

fn resolve_table<'a>(context: &'a Context, name: &str) -> Result<&'a ContextTable, Error> {
    context.table(name).ok_or_else(|| {
        let known = context
            .tables()
            .iter()
            .map(|table| table.schema().code_name.as_str())
            .collect::<Vec<_>>();
        let hint = if known.is_empty() {
            "No tables were found. Check the file arguments.".to_string()
        } else {
            format!("Known tables: {}.", known.join(", "))
        };
        Error::new(ErrorKind::NotFound)
            .with_message(format!("table `{name}` not found"))
            .with_hint(hint)
    })
}
