mod render;
mod serve;

use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use localdb_config::{Backend, Settings};
use localdb_core::{ChangeNotifier, NoticeLevel, Request, Response, Row, Value};
use localdb_sqlite::{Session, TablePanel};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::render::OutputFormat;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Table,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(fmt: CliOutputFormat) -> Self {
        match fmt {
            CliOutputFormat::Json => Self::Json,
            CliOutputFormat::Table => Self::Table,
        }
    }
}

/// CLI-specific backend enum; maps onto the settings backend.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliBackend {
    Native,
    Buffered,
}

impl From<CliBackend> for Backend {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Native => Self::Native,
            CliBackend::Buffered => Self::Buffered,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "localdb")]
#[command(about = "Browse, query and edit a local SQLite database")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Database file to open; skips autodetection.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Settings file (default: <project>/.localdb.yml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Project root used for autodetection and relative settings paths.
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,
    /// Storage backend, overriding the settings file.
    #[arg(long, global = true)]
    backend: Option<CliBackend>,
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the user tables.
    Tables,
    /// Show the columns of one table.
    Columns(ColumnsArgs),
    /// Print the table/column tree.
    Tree(TreeArgs),
    /// Run SQL from an argument, a file, or stdin.
    Query(QueryArgs),
    /// Show the editing window of a table.
    View(ViewArgs),
    /// Save edited rows of a table from a JSON file.
    Edit(EditArgs),
    /// Insert one row, prompting for each column when no values are given.
    AddRow(AddRowArgs),
    /// Answer JSON-line requests on stdin until end of input.
    Serve,
    /// Watch a seed file and reprint the tree whenever it changes.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
struct ColumnsArgs {
    /// Table name.
    table: String,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct TreeArgs {
    /// Include the column leaves of every table.
    #[arg(long)]
    expand: bool,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// SQL text; read from --file or stdin when omitted.
    sql: Option<String>,
    /// File containing SQL text.
    #[arg(long, conflicts_with = "sql")]
    file: Option<PathBuf>,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ViewArgs {
    /// Table name.
    table: String,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct EditArgs {
    /// Table name.
    table: String,
    /// JSON array with every row of the window, in display order.
    #[arg(long)]
    data: PathBuf,
}

#[derive(Debug, Args)]
struct AddRowArgs {
    /// Table name.
    table: String,
    /// Column values in column order; an empty value inserts NULL.
    #[arg(long = "value")]
    values: Vec<String>,
}

#[derive(Debug, Args)]
struct WatchArgs {
    /// File to watch (default: watch_path from the settings file).
    path: Option<PathBuf>,
    /// Polling interval in milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let result = match cli.command {
        Command::Tables => run_tables(&cli.global),
        Command::Columns(args) => run_columns(&cli.global, args),
        Command::Tree(args) => run_tree(&cli.global, args),
        Command::Query(args) => run_query(&cli.global, args),
        Command::View(args) => run_view(&cli.global, args),
        Command::Edit(args) => run_edit(&cli.global, args),
        Command::AddRow(args) => run_add_row(&cli.global, args),
        Command::Serve => run_serve(&cli.global),
        Command::Watch(args) => run_watch(&cli.global, args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn load_settings(global: &GlobalArgs) -> Result<Settings, String> {
    let mut settings = match &global.config {
        Some(path) => Settings::load(path)
            .map_err(|err| format!("Failed to load settings '{}': {err}", path.display()))?,
        None => Settings::for_project(&global.project).map_err(|e| e.to_string())?,
    };
    if let Some(backend) = global.backend {
        settings.backend = backend.into();
    }
    Ok(settings)
}

fn open_session(global: &GlobalArgs) -> Result<Session, String> {
    let settings = load_settings(global)?;
    let mut session = Session::new(settings);
    match &global.db {
        Some(path) => session.open(path).map_err(|e| e.to_string())?,
        None => {
            let path = session
                .open_configured(&global.project)
                .map_err(|e| e.to_string())?;
            info!(path = %path.display(), "autodetected database");
        }
    }
    Ok(session)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|err| format!("Failed to serialize output: {err}"))?;
    println!("{raw}");
    Ok(())
}

fn run_tables(global: &GlobalArgs) -> Result<(), String> {
    let session = open_session(global)?;
    let tables = session.tables().map_err(|e| e.to_string())?;
    print!("{}", render::tables_to_text(&tables));
    Ok(())
}

fn run_columns(global: &GlobalArgs, args: ColumnsArgs) -> Result<(), String> {
    let session = open_session(global)?;
    let columns = session.columns(&args.table).map_err(|e| e.to_string())?;
    let format: OutputFormat = args.format.into();
    match format {
        OutputFormat::Json => print_json(&columns),
        OutputFormat::Table => {
            print!("{}", render::columns_to_text(&columns));
            Ok(())
        }
    }
}

fn run_tree(global: &GlobalArgs, args: TreeArgs) -> Result<(), String> {
    let session = open_session(global)?;
    print_tree(&session, args.expand, args.format.into())
}

fn print_tree(session: &Session, expand: bool, format: OutputFormat) -> Result<(), String> {
    let nodes = if expand {
        session.expand_tree().map_err(|e| e.to_string())?
    } else {
        session
            .tree_children(None)
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|node| (node, Vec::new()))
            .collect()
    };
    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = nodes
                .iter()
                .map(|(table, columns)| {
                    serde_json::json!({
                        "node": table,
                        "children": columns,
                    })
                })
                .collect();
            print_json(&json)
        }
        OutputFormat::Table => {
            print!("{}", render::tree_to_text(&nodes));
            Ok(())
        }
    }
}

fn read_sql(args: &QueryArgs) -> Result<String, String> {
    if let Some(sql) = &args.sql {
        return Ok(sql.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .map_err(|err| format!("Failed to read '{}': {err}", path.display()));
    }
    let mut sql = String::new();
    io::stdin()
        .read_to_string(&mut sql)
        .map_err(|err| format!("Failed to read SQL from stdin: {err}"))?;
    Ok(sql)
}

fn run_query(global: &GlobalArgs, args: QueryArgs) -> Result<(), String> {
    let sql = read_sql(&args)?;
    if sql.trim().is_empty() {
        return Err("No SQL given; pass it as an argument, with --file, or on stdin".to_string());
    }
    let mut session = open_session(global)?;
    let outcome = session.run_query(&sql).map_err(|e| e.to_string())?;

    let format: OutputFormat = args.format.into();
    match format {
        OutputFormat::Json => print_json(&Response::query_result(outcome.result)),
        OutputFormat::Table => {
            print!(
                "{}",
                render::rows_to_table(&outcome.result.columns, &outcome.result.rows)
            );
            if outcome.result.truncated {
                eprintln!(
                    "Result truncated to {} rows.",
                    session.settings().query_row_limit
                );
            }
            Ok(())
        }
    }
}

fn run_view(global: &GlobalArgs, args: ViewArgs) -> Result<(), String> {
    let session = open_session(global)?;
    let panel = TablePanel::open(&session, &args.table).map_err(|e| e.to_string())?;
    let format: OutputFormat = args.format.into();
    match format {
        OutputFormat::Json => print_json(&panel.render()),
        OutputFormat::Table => {
            let window = panel.window();
            print!("{}", render::rows_to_table(&window.column_names(), &window.rows));
            Ok(())
        }
    }
}

fn run_edit(global: &GlobalArgs, args: EditArgs) -> Result<(), String> {
    let raw = fs::read_to_string(&args.data)
        .map_err(|err| format!("Failed to read '{}': {err}", args.data.display()))?;
    let data: Vec<Row> = serde_json::from_str(&raw)
        .map_err(|err| format!("Failed to parse '{}': {err}", args.data.display()))?;

    let mut session = open_session(global)?;
    let mut panel = TablePanel::open(&session, &args.table).map_err(|e| e.to_string())?;
    let replies = panel.handle(&mut session, Request::SaveData { data });

    let mut failure = None;
    for reply in replies {
        if let Response::Notice { level, message } = reply {
            match level {
                NoticeLevel::Info => println!("{message}"),
                NoticeLevel::Error => failure = Some(message),
            }
        }
    }
    match failure {
        Some(message) => Err(message),
        None => Ok(()),
    }
}

fn prompt_values(session: &Session, table: &str) -> Result<Vec<Value>, String> {
    let columns = session.columns(table).map_err(|e| e.to_string())?;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut values = Vec::with_capacity(columns.len());

    for column in &columns {
        let hint = if column.declared_type.is_empty() {
            String::new()
        } else {
            format!(" ({})", column.declared_type)
        };
        eprint!("Enter value for {}{hint}: ", column.name);
        io::stderr().flush().map_err(|e| e.to_string())?;

        let answer = match lines.next() {
            Some(line) => line.map_err(|err| format!("Failed to read answer: {err}"))?,
            None => return Err(format!("Input ended before a value for '{}'", column.name)),
        };
        values.push(Value::from_prompt(answer.trim_end_matches('\r')));
    }
    Ok(values)
}

fn run_add_row(global: &GlobalArgs, args: AddRowArgs) -> Result<(), String> {
    let mut session = open_session(global)?;
    let values = if args.values.is_empty() {
        prompt_values(&session, &args.table)?
    } else {
        args.values.iter().map(|v| Value::from_prompt(v)).collect()
    };
    let rowid = session
        .add_row(&args.table, values)
        .map_err(|e| e.to_string())?;
    println!("Inserted row {rowid} into {}.", args.table);
    Ok(())
}

fn run_serve(global: &GlobalArgs) -> Result<(), String> {
    let mut session = open_session(global)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let handled = serve::serve(&mut session, stdin.lock(), stdout.lock())
        .map_err(|err| format!("Message loop failed: {err}"))?;
    info!(handled, "input closed");
    session.close().map_err(|e| e.to_string())
}

fn watch_target(global: &GlobalArgs, args: &WatchArgs, settings: &Settings) -> Option<PathBuf> {
    let configured = args.path.clone().or_else(|| settings.watch_path.clone())?;
    if configured.is_absolute() || args.path.is_some() {
        Some(configured)
    } else {
        Some(global.project.join(configured))
    }
}

fn run_watch(global: &GlobalArgs, args: WatchArgs) -> Result<(), String> {
    let mut session = open_session(global)?;
    let target = watch_target(global, &args, session.settings()).ok_or_else(|| {
        "No file to watch; pass a path or set watch_path in the settings file".to_string()
    })?;
    let interval =
        Duration::from_millis(args.interval.unwrap_or(session.settings().watch_interval_ms));

    print_tree(&session, false, OutputFormat::Table)?;
    eprintln!("Watching '{}' for changes...", target.display());

    let (tx, rx) = mpsc::channel();
    let _watcher = ChangeNotifier::new(&target).spawn(interval, move || {
        let _ = tx.send(());
    });

    for () in rx {
        if let Err(err) = reload(&mut session, &target) {
            warn!(error = %err, "reload after change failed");
            eprintln!("error: {err}");
            continue;
        }
        print_tree(&session, false, OutputFormat::Table)?;
    }
    Ok(())
}

fn reload(session: &mut Session, changed: &Path) -> Result<(), String> {
    info!(path = %changed.display(), "watched file changed, reloading");
    session.reload().map_err(|e| e.to_string())
}
