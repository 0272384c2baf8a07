//! fmsql — SQL against the FileMaker Data API
//!
//! # Usage
//!
//! ```bash
//! # Run a query
//! fmsql "SELECT t0.name FROM Contacts t0 WHERE t0.city = ?" --bind Leeds
//!
//! # One --bind per placeholder; values may contain commas
//! fmsql "UPDATE Contacts SET name = ? WHERE id = ?" -b "Smith, Ann" -b 007
//!
//! # Dry run (show the Data API request only)
//! fmsql "DELETE FROM Contacts WHERE id = ?" --bind 42 --dry-run
//!
//! # Run a script and print its result
//! fmsql script Contacts "Tidy Up" --param all
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use fmsql::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fmsql")]
#[command(version)]
#[command(about = "SQL over the FileMaker Data API", long_about = None)]
#[command(after_help = "EXAMPLES:
    fmsql 'SELECT * FROM Contacts'
    fmsql 'SELECT t0.name FROM Contacts t0 WHERE t0.city IN (?, ?)' -b Leeds -b York
    fmsql 'UPDATE Contacts SET name = ? WHERE id = ?' -b 'Smith, Ann' -b 7 --dry-run")]
struct Cli {
    /// The SQL statement to run
    query: Option<String>,

    /// Don't send anything, just show the Data API request
    #[arg(short, long)]
    dry_run: bool,

    /// Positional parameter value; repeat once per placeholder
    #[arg(short, long)]
    bind: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Connection config file
    #[arg(short, long, env = "FMSQL_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the Data API request(s) a statement translates to
    Explain {
        /// The SQL statement to explain
        query: String,
    },
    /// Run a FileMaker script and print its result
    Script {
        layout: String,
        name: String,
        /// Script parameter
        #[arg(short, long, default_value = "")]
        param: String,
        /// Run on this record id instead of the layout
        #[arg(short, long)]
        record: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Some(Commands::Explain { query }) => explain_query(query, &cli),
        Some(Commands::Script {
            layout,
            name,
            param,
            record,
        }) => run_script(layout, name, param, record.as_deref(), &cli).await,
        None => match &cli.query {
            Some(query) => execute_query(query, &cli).await,
            None => {
                println!("{}", "fmsql — SQL over the FileMaker Data API".cyan().bold());
                println!();
                println!("Usage: fmsql <SQL> [OPTIONS]");
                println!();
                println!("Try: fmsql --help");
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fmsql=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Plain decimal text that reads back unchanged as a number. Ids with a
/// leading zero such as `007` are not numbers.
fn numeric(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let whole = digits.split('.').next().unwrap_or_default();
    !whole.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
        && !(whole.len() > 1 && whole.starts_with('0'))
}

/// Bound values: numbers, `true`/`false` and `null` are typed, the rest is text.
fn bindings(raw: &[String]) -> Vec<Param> {
    raw.iter()
        .map(|b| {
            if numeric(b) {
                if let Ok(n) = b.parse::<i64>() {
                    return Param::Int(n);
                }
                if let Ok(f) = b.parse::<f64>() {
                    return Param::Float(f);
                }
            }
            match b.as_str() {
                "true" => Param::Bool(true),
                "false" => Param::Bool(false),
                "null" | "NULL" => Param::Null,
                _ => Param::Text(b.clone()),
            }
        })
        .collect()
}

fn load_config(cli: &Cli) -> Result<ConnectionConfig> {
    let path = cli
        .config
        .clone()
        .or_else(ConnectionConfig::default_path)
        .context("No config directory on this system. Use --config")?;
    if !path.exists() {
        anyhow::bail!(
            "{} not found. Use --config or set FMSQL_CONFIG",
            path.display()
        );
    }
    Ok(ConnectionConfig::load(&path)?)
}

fn metadata(cli: &Cli) -> StaticMetadata {
    load_config(cli)
        .map(|c| c.metadata())
        .unwrap_or_default()
}

async fn execute_query(query: &str, cli: &Cli) -> Result<()> {
    if cli.verbose {
        println!("{} {}", "Input:".dimmed(), query.yellow());
    }

    let params = bindings(&cli.bind);

    if cli.dry_run {
        let (_, plan) = fmsql::engine::prepare(query, &params, &metadata(cli))?;
        print_plan(&plan);
        return Ok(());
    }

    let config = load_config(cli)?;
    if cli.verbose {
        println!("{} {}", "Connecting to:".dimmed(), config.base_url());
    }
    let mut conn = Connection::connect(config).await?;

    match conn.execute(query, &params).await? {
        Outcome::Completed(mut rows) => {
            if matches!(parse(query)?, Statement::Select(_)) {
                format_output(&rows.fetch_all(), &cli.format);
            } else {
                println!("{} {} record(s) affected", "✓".green(), rows.row_count());
            }
        }
        Outcome::Queued(n) => println!("{} queued as statement {}", "✓".green(), n),
    }

    Ok(())
}

async fn run_script(
    layout: &str,
    name: &str,
    param: &str,
    record: Option<&str>,
    cli: &Cli,
) -> Result<()> {
    let mut conn = Connection::connect(load_config(cli)?).await?;
    match conn.run_script(layout, record, name, param, true).await? {
        ScriptOutput::Result(result) => {
            let code = if result.error == "0" {
                result.error.green()
            } else {
                result.error.red()
            };
            println!("{} {}", "Script error:".dimmed(), code);
            println!("{} {}", "Result:".dimmed(), result.result.white());
        }
        ScriptOutput::Record(fields) => {
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
    }
    Ok(())
}

fn explain_query(query: &str, cli: &Cli) -> Result<()> {
    println!("{}", "fmsql Statement Explanation".cyan().bold());
    println!();
    println!("{} {}", "Query:".dimmed(), query.yellow());
    println!();

    let params = bindings(&cli.bind);
    let (stmt, plan) = fmsql::engine::prepare(query, &params, &metadata(cli))?;
    println!("{}", "Parsed Structure:".green().bold());
    println!("  {} {}", "Statement:".dimmed(), stmt.kind().cyan());
    println!("  {} {}", "Layout:".dimmed(), stmt.layout().white());
    if let Statement::Select(select) = &stmt {
        if let Some(page) = select.page {
            println!(
                "  {} offset {} limit {}",
                "Window:".dimmed(),
                page.offset,
                page.limit
            );
        }
    }
    println!();
    print_plan(&plan);
    Ok(())
}

fn print_request(label: &str, req: &TranslatedRequest) {
    println!("  {} {} {}", label.dimmed(), req.method.to_string().cyan(), req.uri().white());
    if let Some(body) = &req.body {
        println!("    {}", body.to_string().yellow());
    }
}

fn print_plan(plan: &Plan) {
    println!("{}", "Data API Request:".green().bold());
    match plan {
        Plan::Request(req) => print_request("Send:", req),
        Plan::ByRecordId { lookup, target } => {
            print_request("Lookup:", lookup);
            print_request("Then:", &target.request("{recordId}"));
        }
    }
}

fn format_output(results: &[Row], format: &OutputFormat) {
    if results.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).unwrap_or_default());
        }
        OutputFormat::Table => {
            let columns: Vec<&String> = results[0].keys().collect();

            let widths: Vec<usize> = columns
                .iter()
                .map(|c| {
                    results
                        .iter()
                        .filter_map(|row| row.get(*c))
                        .map(|v| val_to_string(v).chars().count())
                        .fold(c.chars().count(), usize::max)
                })
                .collect();

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in results {
                let cells: Vec<String> = columns
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| {
                        let val = row.get(*c).map(val_to_string).unwrap_or_default();
                        format!("{:width$}", val, width = *w)
                    })
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", results.len().to_string().cyan());
        }
    }
}

fn val_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}
