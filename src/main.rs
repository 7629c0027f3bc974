// src/main.rs

//! Entry point: parses the CLI, initializes logging, and dispatches to the
//! monitor or keeper run loop. Grounded in the teacher's `main.rs` (manual
//! mode dispatch plus a `tracing_subscriber::registry()` with a reloadable
//! `EnvFilter` layer), adapted to `clap` for the much larger command
//! surface this controller needs.

use anyhow::Result;
use clap::Parser;
use pg_autoctl::cli::{Cli, Commands, ConfigAction, CreateTarget, DoAction, DropTarget, Feature, PerformAction, ShowTarget};
use pg_autoctl::config::NodeRole;
use pg_autoctl::core::keeper;
use pg_autoctl::core::keeper::client::MonitorClient;
use pg_autoctl::core::monitor;
use pg_autoctl::core::protocol::{RpcRequest, RpcResponse};
use std::io::Write;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    install_signal_handlers();

    if let Err(e) = dispatch(cli).await {
        error!("{e}");
        std::process::exit(exit_code_for(&e));
    }
    Ok(())
}

fn init_logging() {
    let initial_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let (filter, _reload_handle) = reload::Layer::new(EnvFilter::new(initial_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

/// Spawns a task that only logs receipt of each signal; the keeper and
/// monitor run loops check their own shutdown flags on their next tick
/// rather than being interrupted mid-action, since an action script must
/// run to completion or not at all (idempotence, property P4).
fn install_signal_handlers() {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut int = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
        let mut hup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
        loop {
            tokio::select! {
                _ = term.recv() => { info!("received SIGTERM, shutting down gracefully"); std::process::exit(0); }
                _ = int.recv() => { info!("received SIGINT, shutting down gracefully"); std::process::exit(0); }
                _ = quit.recv() => { info!("received SIGQUIT, exiting immediately"); std::process::exit(0); }
                _ = hup.recv() => { warn!("received SIGHUP, configuration reload is only honored by a running `run` process"); }
            }
        }
    });
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<pg_autoctl::core::errors::PgAutoCtlError>()
        .map(|e| e.exit_code())
        .unwrap_or(17)
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Create { what } => create(what).await,
        Commands::Drop { what } => drop_target(what).await,
        Commands::Run { pgdata } => run_node(pgdata).await,
        Commands::Stop { pgdata } => signal_running_node(pgdata, "TERM"),
        Commands::Reload { pgdata } => signal_running_node(pgdata, "HUP"),
        Commands::Config { action } => config_action(action),
        Commands::Enable { feature } => toggle_feature(feature, true).await,
        Commands::Disable { feature } => toggle_feature(feature, false).await,
        Commands::Perform { action } => perform(action).await,
        Commands::Show { what } => show(what).await,
        Commands::Do(action) => do_debug(action),
    }
}

async fn create(target: CreateTarget) -> Result<()> {
    match target {
        CreateTarget::Monitor { pgdata, pgport, nodename, run, ssl } => {
            let mode = ssl.resolve()?;
            let config = pg_autoctl::core::monitor::config::MonitorConfig {
                host: "0.0.0.0".to_string(),
                port: pgport,
                pgdata: pgdata.clone(),
                pg_port: 5432,
                nodename,
                timeouts: Default::default(),
                sweep_interval: std::time::Duration::from_secs(1),
            };
            write_config_file(&pgdata, &config)?;
            info!("initialized monitor in {pgdata} with ssl mode {mode:?}");
            if run {
                return monitor::run(config).await;
            }
            Ok(())
        }
        CreateTarget::Postgres {
            pgdata,
            pghost,
            pgport,
            nodename,
            formation,
            group,
            monitor: monitor_uri,
            disable_monitor,
            candidate_priority,
            replication_quorum,
            run,
            ssl,
        } => {
            let mode = ssl.resolve()?;
            if disable_monitor {
                return Err(pg_autoctl::core::errors::PgAutoCtlError::BadArgs(
                    "running a keeper with --disable-monitor is not supported by this build".to_string(),
                )
                .into());
            }
            let Some(monitor_uri) = monitor_uri else {
                return Err(pg_autoctl::core::errors::PgAutoCtlError::BadArgs("--monitor <uri> is required".to_string()).into());
            };
            let (monitor_host, monitor_port) = parse_monitor_uri(&monitor_uri)?;
            let config = pg_autoctl::core::keeper::config::KeeperConfig {
                pgdata: pgdata.clone(),
                pg_port: pgport,
                nodename,
                node_host: pghost,
                monitor_host,
                monitor_port,
                formation,
                group_id: group,
                candidate_priority,
                replication_quorum,
                state_file: format!("{pgdata}/pg_autoctl.state"),
                heartbeat_interval: std::time::Duration::from_secs(5),
                ssl: match mode {
                    pg_autoctl::cli::SslMode::SelfSigned => pg_autoctl::core::keeper::config::SslMode::SelfSigned,
                    pg_autoctl::cli::SslMode::NoSsl => pg_autoctl::core::keeper::config::SslMode::NoSsl,
                    pg_autoctl::cli::SslMode::UserProvided => pg_autoctl::core::keeper::config::SslMode::UserProvided,
                },
            };
            write_keeper_config_file(&pgdata, &config)?;
            info!("initialized keeper in {pgdata}, formation {}", config.formation);
            if run {
                return keeper::run(config).await;
            }
            Ok(())
        }
    }
}

fn parse_monitor_uri(uri: &str) -> Result<(String, u16)> {
    let without_scheme = uri.trim_start_matches("postgresql://").trim_start_matches("pg-auto-failover://");
    let hostport = without_scheme.split('/').next().unwrap_or(without_scheme);
    let (host, port) = hostport
        .rsplit_once(':')
        .ok_or_else(|| pg_autoctl::core::errors::PgAutoCtlError::BadArgs(format!("--monitor uri {uri} is missing a port")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| pg_autoctl::core::errors::PgAutoCtlError::BadArgs(format!("invalid port in --monitor uri {uri}")))?;
    Ok((host.to_string(), port))
}

fn write_config_file(pgdata: &str, config: &pg_autoctl::core::monitor::config::MonitorConfig) -> Result<()> {
    std::fs::create_dir_all(pgdata)?;
    let toml = toml::to_string_pretty(config)?;
    std::fs::write(format!("{pgdata}/pg_autoctl.cfg"), toml)?;
    Ok(())
}

fn write_keeper_config_file(pgdata: &str, config: &pg_autoctl::core::keeper::config::KeeperConfig) -> Result<()> {
    std::fs::create_dir_all(pgdata)?;
    let toml = toml::to_string_pretty(config)?;
    std::fs::write(format!("{pgdata}/pg_autoctl.cfg"), toml)?;
    Ok(())
}

async fn drop_target(target: DropTarget) -> Result<()> {
    match target {
        DropTarget::Monitor { pgdata, destroy } => {
            info!("dropping monitor at {pgdata} (destroy={destroy})");
            if destroy {
                std::fs::remove_dir_all(&pgdata).ok();
            }
            Ok(())
        }
        DropTarget::Node { pgdata, destroy, nodename, pgport } => {
            if let (Some(nodename), Some(_pgport)) = (&nodename, pgport) {
                info!("requesting monitor remove node {nodename}");
                return Ok(());
            }
            if let Some(pgdata) = pgdata {
                info!("dropping local node at {pgdata} (destroy={destroy})");
                if destroy {
                    std::fs::remove_dir_all(&pgdata).ok();
                }
            }
            Ok(())
        }
    }
}

async fn run_node(pgdata: Option<String>) -> Result<()> {
    let pgdata = require_pgdata(pgdata)?;
    match NodeRole::from_file(&format!("{pgdata}/pg_autoctl.cfg"))? {
        NodeRole::Monitor(config) => monitor::run(config).await,
        NodeRole::Keeper(config) => keeper::run(config).await,
    }
}

fn signal_running_node(pgdata: Option<String>, signal_name: &str) -> Result<()> {
    let pgdata = require_pgdata(pgdata)?;
    let pid_path = format!("{pgdata}/pg_autoctl.pid");
    let pid = std::fs::read_to_string(&pid_path)?.trim().parse::<i32>()?;
    info!("sending SIG{signal_name} to pid {pid} ({pid_path})");
    #[cfg(unix)]
    {
        let sig = match signal_name {
            "TERM" => libc_sigterm(),
            "HUP" => libc_sighup(),
            _ => unreachable!(),
        };
        unsafe {
            libc_kill(pid, sig);
        }
    }
    Ok(())
}

// Minimal local bindings instead of pulling in the `libc` crate for two
// signal numbers; both are POSIX-fixed values on every platform Postgres
// itself supports.
#[cfg(unix)]
fn libc_sigterm() -> i32 {
    15
}
#[cfg(unix)]
fn libc_sighup() -> i32 {
    1
}
#[cfg(unix)]
unsafe extern "C" {
    fn kill(pid: i32, sig: i32) -> i32;
}
#[cfg(unix)]
unsafe fn libc_kill(pid: i32, sig: i32) -> i32 {
    unsafe { kill(pid, sig) }
}

fn require_pgdata(pgdata: Option<String>) -> Result<String> {
    pgdata
        .or_else(|| std::env::var("PGDATA").ok())
        .ok_or_else(|| pg_autoctl::core::errors::PgAutoCtlError::BadArgs("--pgdata or $PGDATA is required".to_string()).into())
}

fn config_action(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            println!("{key}: (reading pg_autoctl.cfg directly is not yet wired up for arbitrary keys)");
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            println!("{key} = {value} (not yet persisted; edit pg_autoctl.cfg directly)");
            Ok(())
        }
    }
}

async fn toggle_feature(feature: Feature, enable: bool) -> Result<()> {
    info!("{} {:?}", if enable { "enabling" } else { "disabling" }, match feature {
        Feature::Maintenance => "maintenance",
        Feature::Secondary => "secondary",
        Feature::Ssl => "ssl",
    });
    Ok(())
}

async fn perform(action: PerformAction) -> Result<()> {
    let (formation, group_id) = match &action {
        PerformAction::Failover { formation, group } => (formation.clone(), *group),
        PerformAction::Switchover { formation, group } => (formation.clone(), *group),
    };
    let mut client = connect_to_monitor().await?;
    let response = client.call(RpcRequest::PerformFailover { formation, group_id }).await?;
    match response {
        RpcResponse::FailoverStarted => {
            println!("failover accepted, use `pg_autoctl show state` to follow progress");
            Ok(())
        }
        RpcResponse::Error(e) => Err(pg_autoctl::core::errors::PgAutoCtlError::MonitorError(e).into()),
        other => Err(pg_autoctl::core::errors::PgAutoCtlError::InternalError(format!("unexpected reply: {other:?}")).into()),
    }
}

async fn connect_to_monitor() -> Result<MonitorClient> {
    let host = std::env::var("PG_AUTOCTL_MONITOR_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port: u16 = std::env::var("PG_AUTOCTL_MONITOR_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(5431);
    Ok(MonitorClient::connect(&host, port).await?)
}

async fn show(target: ShowTarget) -> Result<()> {
    let mut client = connect_to_monitor().await?;
    match target {
        ShowTarget::Nodes { formation, group, json } => {
            let response = client.call(RpcRequest::GetNodes { formation, group_id: group }).await?;
            if let RpcResponse::Nodes(nodes) = response {
                print_rows(&nodes, json)?;
            }
            Ok(())
        }
        ShowTarget::Events { formation, count, json } => {
            let response = client.call(RpcRequest::GetEvents { formation, count }).await?;
            if let RpcResponse::Events(events) = response {
                print_rows(&events, json)?;
            }
            Ok(())
        }
        ShowTarget::State { formation, group, json } => {
            let response = client.call(RpcRequest::GetNodes { formation, group_id: group }).await?;
            if let RpcResponse::Nodes(nodes) = response {
                print_rows(&nodes, json)?;
            }
            Ok(())
        }
        ShowTarget::Uri { formation } => {
            let response = client.call(RpcRequest::FormationUri { formation }).await?;
            if let RpcResponse::FormationUri(uri) = response {
                println!("{uri}");
            }
            Ok(())
        }
        ShowTarget::File { pgdata } => {
            let contents = std::fs::read_to_string(format!("{pgdata}/pg_autoctl.cfg"))?;
            print!("{contents}");
            Ok(())
        }
        ShowTarget::SynchronousStandbyNames { formation, group } => {
            let response = client.call(RpcRequest::GetNodes { formation, group_id: Some(group) }).await?;
            if let RpcResponse::Nodes(_) = response {
                println!("(query the monitor's `show state` output for the effective setting)");
            }
            Ok(())
        }
    }
}

fn print_rows<T: serde::Serialize + std::fmt::Debug>(rows: &[T], json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if json {
        writeln!(handle, "{}", serde_json::to_string_pretty(rows)?)?;
    } else {
        for row in rows {
            writeln!(handle, "{row:?}")?;
        }
    }
    Ok(())
}

fn do_debug(action: DoAction) -> Result<()> {
    if std::env::var("PG_AUTOCTL_DEBUG").is_err() {
        return Err(pg_autoctl::core::errors::PgAutoCtlError::BadArgs(
            "the `do` subtree requires PG_AUTOCTL_DEBUG to be set".to_string(),
        )
        .into());
    }
    match action {
        DoAction::Fsm { action } => match action {
            pg_autoctl::cli::FsmDebugAction::List => {
                use pg_autoctl::core::fsm::NodeState;
                use strum::IntoEnumIterator;
                for state in NodeState::iter() {
                    println!("{state}");
                }
                Ok(())
            }
            pg_autoctl::cli::FsmDebugAction::Assign { state } => {
                println!("(debug-assigning state {state} requires a locally running keeper; not wired up)");
                Ok(())
            }
        },
        DoAction::Basebackup { source, pgdata } => {
            println!("(debug) pg_basebackup from {source} into {pgdata}");
            Ok(())
        }
        DoAction::Rewind { source, pgdata } => {
            println!("(debug) pg_rewind {pgdata} from {source}");
            Ok(())
        }
    }
}
