//! Command parsing and execution

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use arrow::util::pretty::pretty_format_batches;
use tracing::warn;

use ab_core::plot::{histogram, PlotData, HISTOGRAM_BINS};
use ab_core::RecordClass;
use ab_data::hmm::{DEFAULT_MAP_STEP, DEFAULT_MAP_THRESHOLD};
use ab_data::sources::{import_csv, load_experiment};
use ab_data::schema::SchemaDetector;
use ab_data::{AppConfig, FilterInput, Session, SqliteStore};

/// One `abada` invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Tables,
    Search { table: String, filter: FilterInput },
    Insert { table: String, values: Vec<Option<String>> },
    Delete { table: String, filter: FilterInput, confirmed: bool },
    Query { text: String },
    SavedFiles,
    ImportCsv { path: PathBuf, table: String },
    Hmm { path: PathBuf, name: String },
    Plot { experiment: PathBuf, class: RecordClass, x: String, y: String, exclusions: Option<PathBuf> },
    Export { experiment: PathBuf },
}

fn arg<'a>(args: &'a [String], idx: usize, what: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires {}", args[0], what))
}

/// `COLUMN=TEXT` pairs; the text may itself contain `=`
fn parse_filter(pairs: &[String]) -> Result<FilterInput> {
    let mut filter = FilterInput::new();
    for pair in pairs {
        let (column, text) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected COLUMN=TEXT, got '{}'", pair))?;
        filter.set(column.trim(), text);
    }
    Ok(filter)
}

fn parse_class(text: &str) -> Result<RecordClass> {
    match text {
        "event" | "events" => Ok(RecordClass::Event),
        "segment" | "segments" => Ok(RecordClass::Segment),
        other => bail!("Unknown record class '{}', expected 'event' or 'segment'", other),
    }
}

impl Command {
    /// Parse from the command word onwards
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some(name) = args.first() else {
            bail!("Missing command");
        };
        let command = match name.as_str() {
            "tables" => Command::Tables,
            "search" => Command::Search {
                table: arg(args, 1, "TABLE")?.to_string(),
                filter: parse_filter(&args[2..])?,
            },
            "insert" => Command::Insert {
                table: arg(args, 1, "TABLE")?.to_string(),
                values: args[2..]
                    .iter()
                    .map(|v| if v.is_empty() { None } else { Some(v.clone()) })
                    .collect(),
            },
            "delete" => {
                let table = arg(args, 1, "TABLE")?.to_string();
                let confirmed = args[2..].iter().any(|a| a == "--yes");
                let pairs: Vec<String> = args[2..].iter().filter(|a| *a != "--yes").cloned().collect();
                Command::Delete { table, filter: parse_filter(&pairs)?, confirmed }
            }
            "query" => Command::Query { text: args[1..].join(" ") },
            "saved-files" => Command::SavedFiles,
            "import-csv" => Command::ImportCsv {
                path: PathBuf::from(arg(args, 1, "PATH")?),
                table: arg(args, 2, "TABLE")?.to_string(),
            },
            "hmm" => Command::Hmm {
                path: PathBuf::from(arg(args, 1, "PATH")?),
                name: args.get(2).cloned().unwrap_or_else(|| "Test HMM".to_string()),
            },
            "plot" => Command::Plot {
                experiment: PathBuf::from(arg(args, 1, "EXPERIMENT.json")?),
                class: parse_class(arg(args, 2, "a record class")?)?,
                x: arg(args, 3, "X_AXIS")?.to_string(),
                y: arg(args, 4, "Y_AXIS")?.to_string(),
                exclusions: args.get(5).map(PathBuf::from),
            },
            "export" => Command::Export {
                experiment: PathBuf::from(arg(args, 1, "EXPERIMENT.json")?),
            },
            other => bail!("Unknown command '{}'", other),
        };
        if let Command::Query { text } = &command {
            if text.trim().is_empty() {
                bail!("query requires a SELECT statement");
            }
        }
        Ok(command)
    }
}

/// Run `command` in a fresh session and return what should be printed
pub fn execute(command: Command, store: SqliteStore, config: AppConfig) -> Result<String> {
    let mut session = Session::new(store, config);
    let mut out = String::new();

    match command {
        Command::Tables => {
            for table in session.browser().tables()? {
                writeln!(out, "{}", table)?;
            }
        }
        Command::Search { table, filter } => {
            let browser = session.browser_mut();
            browser.select_table(&table)?;
            let rows = browser.search(filter)?.len();
            writeln!(out, "{}", pretty_format_batches(&[browser.record_batch()?])?)?;
            write!(out, "{} row(s)", rows)?;
        }
        Command::Insert { table, values } => {
            let browser = session.browser_mut();
            browser.select_table(&table)?;
            browser.insert(values)?;
            write!(out, "Inserted 1 row into '{}'", table)?;
        }
        Command::Delete { table, filter, confirmed } => {
            let browser = session.browser_mut();
            browser.select_table(&table)?;
            let preview = browser.delete_preview(&filter)?;
            if !confirmed {
                writeln!(out, "{}", preview.message())?;
                write!(out, "Re-run with --yes to delete.")?;
            } else {
                let removed = browser.delete_confirmed(&filter)?;
                if removed != preview.count {
                    warn!(expected = preview.count, removed, "Table changed between preview and delete");
                }
                write!(out, "Deleted {} row(s) from '{}'", removed, table)?;
            }
        }
        Command::Query { text } => {
            let result = session.browser().run_query(&text)?;
            writeln!(out, "{}", result.columns.join("\t"))?;
            for row in &result.rows {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                writeln!(out, "{}", cells.join("\t"))?;
            }
            write!(out, "{} row(s){}", result.rows.len(), if result.truncated { " (truncated)" } else { "" })?;
        }
        Command::SavedFiles => {
            let source = session
                .config()
                .database
                .source_table
                .clone()
                .ok_or_else(|| anyhow!("database.source_table is not configured"))?;
            session.browser_mut().select_table(&source)?;
            for file in session.save_files()? {
                writeln!(out, "{}", file)?;
            }
        }
        Command::ImportCsv { path, table } => {
            let store = session.browser().store();
            let imported = import_csv(store, &path, &table, &SchemaDetector::new())
                .with_context(|| format!("Failed to import {}", path.display()))?;
            write!(out, "Created '{}' with {} column(s)", imported.name, imported.columns.len())?;
        }
        Command::Hmm { path, name } => {
            let model = session.import_hmm(&name, &path)?;
            let cells = model.probability_map(DEFAULT_MAP_STEP, DEFAULT_MAP_THRESHOLD)?;
            writeln!(out, "{}: {} state(s)", model.name, model.len())?;
            for (index, distribution) in model.distributions.iter().enumerate() {
                let drawn = cells.iter().filter(|c| c.index == index).count();
                writeln!(out, "  {:>3} {:<26} {} cell(s) above {}", index, distribution.kind(), drawn, DEFAULT_MAP_THRESHOLD)?;
            }
        }
        Command::Plot { experiment, class, x, y, exclusions } => {
            session.load_experiment(load_experiment(&experiment)?);
            if let Some(path) = exclusions {
                session.load_exclusions(&path)?;
            }
            let data = session.plot(class, &x, &y)?;
            write!(out, "{}", describe_plot(&data))?;
        }
        Command::Export { experiment } => {
            session.load_experiment(load_experiment(&experiment)?);
            let summary = session.export_csv()?;
            let export = &session.config().export;
            write!(
                out,
                "Wrote {} event(s) to {} and {} segment(s) to {}",
                summary.events,
                export.event_csv.display(),
                summary.segments,
                export.segment_csv.display()
            )?;
        }
    }

    Ok(out)
}

fn range(values: &[f64]) -> Option<(f64, f64)> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    finite.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn describe_plot(data: &PlotData) -> String {
    let span = |values: &[f64]| match range(values) {
        Some((lo, hi)) => format!("[{}, {}]", lo, hi),
        None => "no finite values".to_string(),
    };
    match data {
        PlotData::Histogram { orientation, axis, values } => {
            let mut out =
                format!("{:?} histogram of {}: {} value(s) in {}", orientation, axis, values.len(), span(values));
            for bin in histogram(values, HISTOGRAM_BINS).iter().filter(|b| b.count > 0) {
                out.push_str(&format!("\n  [{:.3}, {:.3}): {}", bin.start, bin.end, bin.count));
            }
            out
        }
        PlotData::Scatter { x_axis, y_axis, x, y } => {
            format!("Scatter {} vs {}: {} point(s), x in {}, y in {}", x_axis, y_axis, x.len(), span(x), span(y))
        }
    }
}
