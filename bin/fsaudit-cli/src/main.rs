//! fsaudit CLI - Filesystem metadata and quota audit
//!
//! This binary resolves paths and inodes, summarizes directories and checks
//! reported quota usage against a recomputed walk of the namespace.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fsaudit_client::fs::check_fs_selector;
use fsaudit_client::quota::{QuotaCheckRow, QuotaUsageRow, humanize_quota, ibytes};
use fsaudit_client::{FsSelector, GrpcTransport, MetaClient};
use fsaudit_common::{Config, Error, FsId, InodeId, Quota, ROOT_INODE_ID};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fsaudit")]
#[command(about = "Filesystem metadata and quota audit tool")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "/etc/fsaudit/fsaudit.toml")]
    config: String,

    /// MDS addresses, comma separated (overrides config file)
    #[arg(long, value_delimiter = ',', global = true)]
    mds_addr: Option<Vec<String>>,

    /// Per-attempt RPC timeout in milliseconds (overrides config file)
    #[arg(long, global = true)]
    rpc_timeout_ms: Option<u64>,

    /// RPC retries after the first attempt (overrides config file)
    #[arg(long, global = true)]
    rpc_retry_times: Option<u32>,

    /// Log every RPC and print cache statistics
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log level
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Filesystem selection, by id or by name
#[derive(clap::Args, Debug)]
struct FsArgs {
    /// Filesystem ID
    #[arg(long)]
    fsid: Option<u32>,

    /// Filesystem name
    #[arg(long)]
    fsname: Option<String>,
}

impl FsArgs {
    fn selector(&self) -> fsaudit_common::Result<FsSelector> {
        check_fs_selector(self.fsid, self.fsname.as_deref())
    }
}

/// Directory selection; the root when neither is given
#[derive(clap::Args, Debug)]
struct DirArgs {
    /// Directory path
    #[arg(long, conflicts_with = "inode")]
    path: Option<String>,

    /// Directory inode ID
    #[arg(long)]
    inode: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Filesystem operations
    Fs {
        #[command(subcommand)]
        action: FsCommands,
    },
    /// Path operations
    Path {
        #[command(subcommand)]
        action: PathCommands,
    },
    /// Inode operations
    Inode {
        #[command(subcommand)]
        action: InodeCommands,
    },
    /// Directory operations
    Dir {
        #[command(subcommand)]
        action: DirCommands,
    },
    /// Quota operations
    Quota {
        #[command(subcommand)]
        action: QuotaCommands,
    },
}

#[derive(Subcommand, Debug)]
enum FsCommands {
    /// Show filesystem id and name
    Info {
        #[command(flatten)]
        fs: FsArgs,
    },
}

#[derive(Subcommand, Debug)]
enum PathCommands {
    /// Resolve a directory path to its inode ID
    Inode {
        #[command(flatten)]
        fs: FsArgs,
        /// Directory path
        #[arg(long)]
        path: String,
    },
}

#[derive(Subcommand, Debug)]
enum InodeCommands {
    /// Resolve an inode ID to its absolute path
    Path {
        #[command(flatten)]
        fs: FsArgs,
        /// Inode ID
        #[arg(long)]
        inode: u64,
    },
}

#[derive(Subcommand, Debug)]
enum DirCommands {
    /// Total file size and inode count below a directory
    Summary {
        #[command(flatten)]
        fs: FsArgs,
        #[command(flatten)]
        dir: DirArgs,
    },
}

#[derive(Subcommand, Debug)]
enum QuotaCommands {
    /// Show a directory quota, or the filesystem quota without --path
    Get {
        #[command(flatten)]
        fs: FsArgs,
        /// Directory path
        #[arg(long)]
        path: Option<String>,
    },
    /// Compare reported quota usage with a recomputed walk
    Check {
        #[command(flatten)]
        fs: FsArgs,
        /// Directory path; the whole filesystem when omitted
        #[arg(long)]
        path: Option<String>,
    },
}

/// Load the config file if present, then apply command line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if Path::new(&args.config).exists() {
        let content = std::fs::read_to_string(&args.config)
            .with_context(|| format!("Failed to read config file {}", args.config))?;
        Config::from_toml(&content)?
    } else {
        debug!("Config file {} not found, using defaults", args.config);
        Config::default()
    };

    if let Some(addrs) = &args.mds_addr {
        config.mds.addrs.clone_from(addrs);
    }
    if let Some(timeout_ms) = args.rpc_timeout_ms {
        config.rpc.timeout_ms = timeout_ms;
    }
    if let Some(retry_times) = args.rpc_retry_times {
        config.rpc.retry_times = retry_times;
    }
    if args.verbose {
        config.rpc.verbose = true;
    }

    config.validate()?;
    Ok(config)
}

/// Print one row under a header, each column as wide as its widest cell
fn print_table(header: &[&str], row: &[&str]) {
    let widths: Vec<usize> = header
        .iter()
        .zip(row)
        .map(|(h, c)| h.len().max(c.len()) + 2)
        .collect();

    let line = |cells: &[&str]| {
        cells
            .iter()
            .zip(widths.iter().copied())
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<String>()
    };
    println!("{}", line(header).trim_end());
    println!("{}", "-".repeat(widths.iter().sum()));
    println!("{}", line(row).trim_end());
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct QuotaReport<'a> {
    fs_id: FsId,
    path: &'a str,
    quota: Quota,
    usage: QuotaUsageRow,
}

async fn resolve_dir(client: &MetaClient, fs_id: FsId, dir: &DirArgs) -> Result<InodeId> {
    Ok(match (&dir.path, dir.inode) {
        (Some(path), _) => client.path_to_inode(fs_id, path).await?,
        (None, Some(inode)) => InodeId::new(inode),
        (None, None) => ROOT_INODE_ID,
    })
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(&args)?;
    info!("MDS addresses: {}", config.mds.addrs.join(","));

    let transport = Arc::new(GrpcTransport::from_config(&config)?);
    let client = MetaClient::new(transport, &config);
    let mut code = ExitCode::SUCCESS;

    match args.command {
        Commands::Fs { action } => match action {
            FsCommands::Info { fs } => {
                let info = client.fs_info(&fs.selector()?).await?;
                if args.json {
                    print_json(&info)?;
                } else {
                    print_table(&["FS ID", "FS NAME"], &[&info.fs_id.to_string(), &info.fs_name]);
                }
            }
        },
        Commands::Path { action } => match action {
            PathCommands::Inode { fs, path } => {
                let fs_id = client.resolve_fs_id(&fs.selector()?).await?;
                let inode = client.path_to_inode(fs_id, &path).await?;
                if args.json {
                    print_json(&serde_json::json!({ "fs_id": fs_id, "path": path, "inode_id": inode }))?;
                } else {
                    println!("{inode}");
                }
            }
        },
        Commands::Inode { action } => match action {
            InodeCommands::Path { fs, inode } => {
                let fs_id = client.resolve_fs_id(&fs.selector()?).await?;
                let inode = InodeId::new(inode);
                let path = client.inode_to_path(fs_id, inode).await?;
                if args.json {
                    print_json(&serde_json::json!({ "fs_id": fs_id, "inode_id": inode, "path": path }))?;
                } else {
                    match path {
                        Some(path) => println!("{path}"),
                        None => println!("inode {inode} is not currently resolvable to a path"),
                    }
                }
            }
        },
        Commands::Dir { action } => match action {
            DirCommands::Summary { fs, dir } => {
                let fs_id = client.resolve_fs_id(&fs.selector()?).await?;
                let inode = resolve_dir(&client, fs_id, &dir).await?;
                let summary = client.summarize_directory(fs_id, inode).await?;
                if args.json {
                    print_json(&summary)?;
                } else {
                    print_table(
                        &["INODE", "LENGTH", "SIZE", "INODES"],
                        &[
                            &inode.to_string(),
                            &summary.length.to_string(),
                            &ibytes(summary.length),
                            &summary.inodes.to_string(),
                        ],
                    );
                }
            }
        },
        Commands::Quota { action } => match action {
            QuotaCommands::Get { fs, path } => {
                let fs_id = client.resolve_fs_id(&fs.selector()?).await?;
                let quota = match &path {
                    Some(path) => {
                        let dir = client.path_to_inode(fs_id, path).await?;
                        client.get_dir_quota(fs_id, dir).await?
                    }
                    None => client.get_fs_quota(fs_id).await?,
                };
                let usage = humanize_quota(
                    quota.max_bytes,
                    quota.used_bytes,
                    quota.max_inodes,
                    quota.used_inodes,
                );
                if args.json {
                    print_json(&QuotaReport {
                        fs_id,
                        path: path.as_deref().unwrap_or("/"),
                        quota,
                        usage,
                    })?;
                } else {
                    print_table(&QuotaUsageRow::HEADER, &usage.cells());
                }
            }
            QuotaCommands::Check { fs, path } => {
                let fs_id = client.resolve_fs_id(&fs.selector()?).await?;
                let check = match &path {
                    Some(path) => client.check_dir_quota(fs_id, path).await?,
                    None => client.check_fs_quota(fs_id).await?,
                };
                if args.json {
                    print_json(&check)?;
                } else {
                    print_table(&QuotaCheckRow::HEADER, &check.row.cells());
                }
                if !check.consistent {
                    code = ExitCode::FAILURE;
                }
            }
        },
    }

    if args.verbose {
        let stats = client.cache_stats();
        eprintln!(
            "topology cache: partitions {}/{} copysets {}/{} leaders {}/{} (hits/misses)",
            stats.partitions.hits,
            stats.partitions.misses,
            stats.copysets.hits,
            stats.copysets.misses,
            stats.leaders.hits,
            stats.leaders.misses,
        );
    }

    Ok(code)
}

/// Exit status for a failed command: the errno of the underlying error
fn exit_status(err: &anyhow::Error) -> u8 {
    let errno = err.downcast_ref::<Error>().map_or(1, Error::errno);
    u8::try_from(errno).unwrap_or(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}
