use anyhow::{anyhow, bail, Context, Result};
use redtrib::cluster::{balance_report, BalanceReport, ClusterNode, ClusterNodes};
use redtrib::config::Config;
use redtrib::observability::{init_logging, LogConfig};
use redtrib::{Talker, TalkerConfig};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Subcommands; all of them are read-only
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Ping,
    Nodes,
    Info,
    Check,
    Plan,
}

impl Action {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ping" => Some(Self::Ping),
            "nodes" => Some(Self::Nodes),
            "info" => Some(Self::Info),
            "check" => Some(Self::Check),
            "plan" => Some(Self::Plan),
            _ => None,
        }
    }
}

/// Command line arguments structure
#[derive(Default)]
struct CliArgs {
    config_path: Option<String>,
    timeout: Option<u64>,
    weights: Vec<(String, f64)>,
    json: bool,
    log_level: Option<String>,
    action: Option<Action>,
    address: Option<String>,
    show_help: bool,
    show_version: bool,
}

fn print_help() {
    println!("redtrib v{} - Redis Cluster inspection and rebalance planning", VERSION);
    println!();
    println!("USAGE:");
    println!("    redtrib [OPTIONS] <COMMAND> <HOST:PORT>");
    println!();
    println!("COMMANDS:");
    println!("    ping     Send PING to the node");
    println!("    nodes    Print the parsed CLUSTER NODES of the node");
    println!("    info     Print the parsed CLUSTER INFO of the node");
    println!("    check    Query CLUSTER INFO on every master the node knows about");
    println!("    plan     Print the slot migrations that would rebalance the masters");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>       Path to configuration file (TOML format)");
    println!("    -t, --timeout <SECS>      Connect and I/O timeout, 0 for no I/O timeout");
    println!("    -w, --weight <ID>=<W>     Weight for a node id or host:port (repeatable)");
    println!("    -l, --log-level <LEVEL>   trace, debug, info, warn, error");
    println!("        --json                Print results as JSON");
    println!("    -h, --help                Print help information");
    println!("    -v, --version             Print version information");
    println!();
    println!("EXAMPLES:");
    println!("    redtrib ping 127.0.0.1:7000");
    println!("    redtrib --json nodes 127.0.0.1:7000");
    println!("    redtrib -w 127.0.0.1:7002=2 plan 127.0.0.1:7000");
}

fn print_version() {
    println!("redtrib {}", VERSION);
}

/// Parse `<id>=<weight>`
fn parse_weight(arg: &str) -> Result<(String, f64)> {
    let (key, weight) = arg
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("invalid weight '{}', expected <ID>=<WEIGHT>", arg))?;
    let weight = weight
        .parse::<f64>()
        .with_context(|| format!("invalid weight value in '{}'", arg))?;
    Ok((key.to_string(), weight))
}

/// Split `host:port`, accepting a bracketed IPv6 host.
fn parse_address(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("invalid address '{}', expected HOST:PORT", addr))?;
    let port = port
        .parse::<u16>()
        .with_context(|| format!("invalid port in address '{}'", addr))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        bail!("invalid address '{}', expected HOST:PORT", addr);
    }
    Ok((host.to_string(), port))
}

/// Parse command line arguments
fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .ok_or_else(|| anyhow!("{} requires an argument", args[i]))
        };
        match args[i].as_str() {
            "-h" | "--help" => {
                cli.show_help = true;
                return Ok(cli);
            }
            "-v" | "--version" => {
                cli.show_version = true;
                return Ok(cli);
            }
            "-c" | "--config" => {
                cli.config_path = Some(value(i)?.clone());
                i += 1;
            }
            "-t" | "--timeout" => {
                let secs = value(i)?;
                cli.timeout = Some(
                    secs.parse()
                        .with_context(|| format!("invalid timeout '{}'", secs))?,
                );
                i += 1;
            }
            "-w" | "--weight" => {
                cli.weights.push(parse_weight(value(i)?)?);
                i += 1;
            }
            "-l" | "--log-level" => {
                cli.log_level = Some(value(i)?.clone());
                i += 1;
            }
            "--json" => cli.json = true,
            arg if arg.starts_with('-') => {
                bail!("unknown option '{}'. Use --help for usage.", arg)
            }
            arg if cli.action.is_none() => {
                cli.action = Some(
                    Action::parse(arg)
                        .ok_or_else(|| anyhow!("unknown command '{}'. Use --help for usage.", arg))?,
                );
            }
            arg if cli.address.is_none() => cli.address = Some(arg.to_string()),
            arg => bail!("unexpected argument '{}'. Use --help for usage.", arg),
        }
        i += 1;
    }

    Ok(cli)
}

/// Load configuration from file and merge with CLI arguments
fn load_config(cli: &CliArgs) -> Result<Config> {
    let mut config = match cli.config_path {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };

    // CLI arguments override config file
    if let Some(secs) = cli.timeout {
        config.talker.io_timeout_secs = secs;
        if secs > 0 {
            config.talker.connect_timeout_secs = secs;
        }
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    for (key, weight) in &cli.weights {
        config.balance.weights.insert(key.clone(), *weight);
    }

    Ok(config)
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn print_nodes(nodes: &[ClusterNode]) {
    for node in nodes {
        let ranges: Vec<String> = node.slot_ranges().iter().map(|r| r.to_string()).collect();
        println!(
            "{} {} {}{} slots={} {}",
            node.node_id(),
            node.addr(),
            node.role(),
            node.master_id()
                .map(|m| format!(" of {}", m))
                .unwrap_or_default(),
            node.slot_count(),
            ranges.join(",")
        );
    }
}

fn print_report(report: &BalanceReport<'_>) {
    for alloc in &report.allocations {
        println!(
            "{} {} weight={} slots={} target={} after={}",
            alloc.node.node_id(),
            alloc.node.addr(),
            alloc.weight,
            alloc.origin,
            alloc.target,
            alloc.planned
        );
    }
    if report.is_balanced() {
        println!("cluster is balanced");
        return;
    }
    for migration in &report.plan {
        println!(
            "move {} slots {} -> {}",
            migration.slot_count,
            migration.source.addr(),
            migration.destination.addr()
        );
    }
    println!("{} slots in {} migrations", report.slots_moved(), report.plan.len());
}

#[derive(Serialize)]
struct CheckResult {
    node_id: String,
    addr: String,
    state: Option<String>,
    slots_assigned: Option<u64>,
    error: Option<String>,
}

/// Ask every master for its own view of the cluster, one talker per thread.
fn check_masters(nodes: &ClusterNodes, talker_config: &TalkerConfig) -> Vec<CheckResult> {
    let masters = nodes.masters();
    std::thread::scope(|scope| {
        let handles: Vec<_> = masters
            .iter()
            .map(|node| {
                scope.spawn(move || {
                    Talker::connect_with(node.host(), node.port(), talker_config)
                        .and_then(|mut talker| {
                            let info = talker.cluster_info();
                            talker.close()?;
                            info
                        })
                })
            })
            .collect();

        masters
            .iter()
            .zip(handles)
            .map(|(node, handle)| {
                let outcome = handle
                    .join()
                    .map_err(|_| anyhow!("check thread panicked"))
                    .and_then(|r| r.map_err(anyhow::Error::from));
                let (state, slots_assigned, error) = match outcome {
                    Ok(info) => (Some(info.state().to_string()), info.slots_assigned(), None),
                    Err(e) => {
                        warn!(addr = %node.addr(), error = %e, "check failed");
                        (None, None, Some(e.to_string()))
                    }
                };
                CheckResult {
                    node_id: node.node_id().to_string(),
                    addr: node.addr(),
                    state,
                    slots_assigned,
                    error,
                }
            })
            .collect()
    })
}

fn run(cli: &CliArgs, config: &Config) -> Result<()> {
    let action = cli
        .action
        .ok_or_else(|| anyhow!("missing command. Use --help for usage."))?;
    let address = cli
        .address
        .as_deref()
        .ok_or_else(|| anyhow!("missing node address. Use --help for usage."))?;
    let (host, port) = parse_address(address)?;

    let talker_config = config.talker.to_talker_config();
    let mut talker = Talker::connect_with(&host, port, &talker_config)?;
    debug!(?action, host = %host, port, "running");

    match action {
        Action::Ping => {
            talker.ping()?;
            emit(cli.json, &"PONG", |s| println!("{}", s))?;
        }
        Action::Info => {
            let info = talker.cluster_info()?;
            emit(cli.json, &info, |info| {
                println!("cluster_state: {}", info.state());
                for (label, value) in [
                    ("slots_assigned", info.slots_assigned()),
                    ("slots_ok", info.slots_ok()),
                    ("slots_pfail", info.slots_pfail()),
                    ("slots_fail", info.slots_fail()),
                    ("known_nodes", info.known_nodes()),
                    ("size", info.size()),
                    ("current_epoch", info.current_epoch()),
                ] {
                    if let Some(value) = value {
                        println!("{}: {}", label, value);
                    }
                }
            })?;
        }
        Action::Nodes => {
            let nodes = talker.cluster_nodes()?;
            if let Err(e) = nodes.validate() {
                warn!(error = %e, "inconsistent cluster view");
            }
            emit(cli.json, &nodes.nodes(), |nodes| print_nodes(nodes))?;
        }
        Action::Check => {
            let nodes = talker.cluster_nodes()?;
            let results = check_masters(&nodes, &talker_config);
            emit(cli.json, &results, |results| {
                for r in results {
                    match (&r.state, &r.error) {
                        (Some(state), _) => println!(
                            "{} {} state={} slots_assigned={}",
                            r.node_id,
                            r.addr,
                            state,
                            r.slots_assigned.map(|n| n.to_string()).unwrap_or_default()
                        ),
                        (None, Some(error)) => println!("{} {} error: {}", r.node_id, r.addr, error),
                        (None, None) => println!("{} {}", r.node_id, r.addr),
                    }
                }
            })?;
            if results.iter().any(|r| r.error.is_some()) {
                bail!("some masters could not be checked");
            }
        }
        Action::Plan => {
            let nodes = talker.cluster_nodes()?;
            nodes.validate().context("refusing to plan over an inconsistent cluster view")?;
            let weights = config.balance.to_weight_table();
            let report = balance_report(nodes.nodes(), &weights)?;
            emit(cli.json, &report, print_report)?;
        }
    }

    talker.close()?;
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Handle help and version
    if cli.show_help {
        print_help();
        return;
    }
    if cli.show_version {
        print_version();
        return;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let log_config = match config.logging.to_log_config() {
        Ok(log_config) => log_config,
        Err(e) => {
            eprintln!("Warning: {}, using defaults", e);
            LogConfig::default()
        }
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = run(&cli, &config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
