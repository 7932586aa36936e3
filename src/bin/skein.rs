#![forbid(unsafe_code)]

//! Binary entry point for the `skein` command-line tool.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use skein::config::GraphConfig;
use skein::connector::GraphClient;
use skein::graph::PropValue;
use skein::location::{ClientLocation, NodeLocation};
use skein::logging::init_logging;
use skein::matching::ResultSet;
use skein::net::SessionCache;
use skein::topology::{Topology, TopologySummary};

#[derive(Parser, Debug)]
#[command(
    name = "skein",
    version,
    about = "Query a network of graph services with path patterns",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "SKEIN_CONFIG",
        help = "Path to a config.toml (defaults to the user config dir)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "SKEIN_LOG",
        help = "Log filter directive, e.g. warn or skein::net=debug"
    )]
    log_level: Option<String>,

    #[arg(
        long,
        value_enum,
        global = true,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a topology file and print its summary.
    Check(CheckCmd),
    /// Run a pattern query against a topology.
    Query(QueryCmd),
}

#[derive(Args, Debug)]
struct CheckCmd {
    #[arg(value_name = "TOPOLOGY", help = "Topology TOML file")]
    topology: PathBuf,
}

#[derive(Args, Debug)]
struct QueryCmd {
    #[arg(value_name = "TOPOLOGY", help = "Topology TOML file")]
    topology: PathBuf,

    #[arg(long, value_name = "FILE", help = "JSON pattern file")]
    pattern: PathBuf,

    #[arg(long, value_name = "SERVICE.CLIENT.NODE", help = "Start node")]
    from: NodeLocation,

    #[arg(long = "as", value_name = "SERVICE.CLIENT", help = "Client identity to query as")]
    identity: ClientLocation,

    #[arg(
        long = "param",
        value_name = "JSON",
        help = "Positional parameter bound to $0, $1, ... (repeatable)"
    )]
    params: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct Row {
    count: usize,
    bindings: serde_json::Map<String, serde_json::Value>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = GraphConfig::load_or_default(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level)?;

    match &cli.command {
        Command::Check(cmd) => {
            let summary = Topology::load(&cmd.topology)?.summary()?;
            print_summary(cli.format, &summary)
        }
        Command::Query(cmd) => {
            let results = run_query(cmd, &config)?;
            print_results(cli.format, &results)
        }
    }
}

fn run_query(cmd: &QueryCmd, config: &GraphConfig) -> Result<ResultSet, Box<dyn Error>> {
    let network = Topology::load(&cmd.topology)?.build(config)?;
    let expression = fs::read_to_string(&cmd.pattern)?;
    let params = cmd
        .params
        .iter()
        .map(|raw| -> Result<PropValue, Box<dyn Error>> {
            let json: serde_json::Value = serde_json::from_str(raw)?;
            Ok(PropValue::try_from(json)?)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sessions = SessionCache::new(network.transport(), config.session_cache_capacity);
    let client = GraphClient::new(Arc::new(sessions));
    let conn = client.connect_as(cmd.identity.service(), cmd.identity.client());
    Ok(conn.query(&cmd.from, &expression, &params)?)
}

fn print_summary(format: OutputFormat, summary: &TopologySummary) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => {
            println!("services:       {}", summary.services);
            println!("clients:        {}", summary.clients);
            println!("nodes:          {}", summary.nodes);
            println!("edges:          {}", summary.edges);
            println!("dangling edges: {}", summary.dangling_edges);
        }
    }
    Ok(())
}

fn print_results(format: OutputFormat, results: &ResultSet) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => {
            let mut rows: Vec<Row> = results
                .entries()
                .map(|(binding, count)| Row {
                    count,
                    bindings: binding
                        .iter()
                        .map(|(name, value)| {
                            let json = value.map_or(serde_json::Value::Null, PropValue::to_json);
                            (name.to_owned(), json)
                        })
                        .collect(),
                })
                .collect();
            rows.sort_by_cached_key(|row| serde_json::Value::Object(row.bindings.clone()).to_string());
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            let mut lines: Vec<String> = results
                .entries()
                .map(|(binding, count)| format!("{count} x {binding}"))
                .collect();
            lines.sort();
            for line in lines {
                println!("{line}");
            }
        }
    }
    Ok(())
}
