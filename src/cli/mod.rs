// src/cli/mod.rs

//! The `pg_autoctl` command-line surface (spec.md §6). Built with `clap`
//! derive enums, the same shape the pack's `kimberlite-cli` uses for a
//! comparable multi-subcommand operator tool, generalized from a database
//! CLI's command tree to this controller's.

mod ssl;

pub use ssl::SslMode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pg_autoctl")]
#[command(author, version, about = "A high-availability controller for a Postgres cluster.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize and register a monitor node.
    Create {
        #[command(subcommand)]
        what: CreateTarget,
    },

    /// Drop a monitor or a keeper node.
    Drop {
        #[command(subcommand)]
        what: DropTarget,
    },

    /// Run the node described by `--pgdata`'s config file until stopped.
    Run {
        #[arg(long, env = "PGDATA")]
        pgdata: Option<String>,
    },

    /// Signal a running node to stop gracefully.
    Stop {
        #[arg(long, env = "PGDATA")]
        pgdata: Option<String>,
    },

    /// Signal a running node to reload its configuration file.
    Reload {
        #[arg(long, env = "PGDATA")]
        pgdata: Option<String>,
    },

    /// Read or write a single configuration key.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Enable a per-node feature.
    Enable {
        #[command(subcommand)]
        feature: Feature,
    },

    /// Disable a per-node feature.
    Disable {
        #[command(subcommand)]
        feature: Feature,
    },

    /// Ask the monitor to perform a failover or switchover for a group.
    Perform {
        #[command(subcommand)]
        action: PerformAction,
    },

    /// Query the monitor or a local node for status.
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Diagnostic subtree, gated on `PG_AUTOCTL_DEBUG` being set.
    #[command(subcommand)]
    Do(DoAction),
}

#[derive(Subcommand)]
pub enum CreateTarget {
    Monitor {
        #[arg(long, env = "PGDATA")]
        pgdata: String,
        #[arg(long, default_value_t = 5431)]
        pgport: u16,
        #[arg(long)]
        nodename: String,
        #[arg(long)]
        run: bool,
        #[command(flatten)]
        ssl: ssl::SslArgs,
    },
    Postgres {
        #[arg(long, env = "PGDATA")]
        pgdata: String,
        #[arg(long, default_value = "localhost")]
        pghost: String,
        #[arg(long, default_value_t = 5432)]
        pgport: u16,
        #[arg(long)]
        nodename: String,
        #[arg(long, default_value = "default")]
        formation: String,
        #[arg(long, default_value_t = 0)]
        group: i32,
        #[arg(long)]
        monitor: Option<String>,
        #[arg(long)]
        disable_monitor: bool,
        #[arg(long, default_value_t = 50)]
        candidate_priority: u8,
        #[arg(long, default_value_t = true)]
        replication_quorum: bool,
        #[arg(long)]
        run: bool,
        #[command(flatten)]
        ssl: ssl::SslArgs,
    },
}

#[derive(Subcommand)]
pub enum DropTarget {
    Monitor {
        #[arg(long, env = "PGDATA")]
        pgdata: String,
        #[arg(long)]
        destroy: bool,
    },
    Node {
        #[arg(long, env = "PGDATA")]
        pgdata: Option<String>,
        #[arg(long)]
        destroy: bool,
        #[arg(long)]
        nodename: Option<String>,
        #[arg(long)]
        pgport: Option<u16>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Get { key: String },
    Set { key: String, value: String },
}

#[derive(Subcommand)]
pub enum Feature {
    Maintenance,
    Secondary,
    Ssl,
}

#[derive(Subcommand)]
pub enum PerformAction {
    Failover {
        #[arg(long, default_value = "default")]
        formation: String,
        #[arg(long, default_value_t = 0)]
        group: i32,
    },
    Switchover {
        #[arg(long, default_value = "default")]
        formation: String,
        #[arg(long, default_value_t = 0)]
        group: i32,
    },
}

#[derive(Subcommand)]
pub enum ShowTarget {
    State {
        #[arg(long, default_value = "default")]
        formation: String,
        #[arg(long)]
        group: Option<i32>,
        #[arg(long)]
        json: bool,
    },
    Events {
        #[arg(long, default_value = "default")]
        formation: String,
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long)]
        json: bool,
    },
    Nodes {
        #[arg(long, default_value = "default")]
        formation: String,
        #[arg(long)]
        group: Option<i32>,
        #[arg(long)]
        json: bool,
    },
    Uri {
        #[arg(long, default_value = "default")]
        formation: String,
    },
    File {
        #[arg(long, env = "PGDATA")]
        pgdata: String,
    },
    SynchronousStandbyNames {
        #[arg(long, default_value = "default")]
        formation: String,
        #[arg(long, default_value_t = 0)]
        group: i32,
    },
}

/// `do ...`: direct, low-level operations bypassing the monitor, useful for
/// debugging a keeper's FSM transitions by hand. Only surfaced in `--help`
/// when `PG_AUTOCTL_DEBUG` is set (checked in `main`, not here, since clap
/// has no notion of an env-gated subtree).
#[derive(Subcommand)]
pub enum DoAction {
    Fsm {
        #[command(subcommand)]
        action: FsmDebugAction,
    },
    Basebackup {
        #[arg(long)]
        source: String,
        #[arg(long, env = "PGDATA")]
        pgdata: String,
    },
    Rewind {
        #[arg(long)]
        source: String,
        #[arg(long, env = "PGDATA")]
        pgdata: String,
    },
}

#[derive(Subcommand)]
pub enum FsmDebugAction {
    Assign {
        #[arg(long)]
        state: String,
    },
    List,
}
