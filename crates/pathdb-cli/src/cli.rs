use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pathdb_types::MetaFlags;

#[derive(Parser)]
#[command(
    name = "pathdb",
    about = "pathdb: hierarchical object metadata over an ordered key-value store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store file; overrides `data_path` from the config file
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// TOML server configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the RPC service and the HTTP gateway
    Serve(ServeArgs),
    /// Store an object
    Put(PutArgs),
    /// Fetch an object
    Get(GetArgs),
    /// Delete objects
    Rm(RmArgs),
    /// List a directory
    Ls(LsArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// HTTP gateway address
    #[arg(long)]
    pub http: Option<SocketAddr>,
    /// RPC service address
    #[arg(long)]
    pub rpc: Option<SocketAddr>,
}

#[derive(Args)]
pub struct PutArgs {
    pub path: String,
    /// Inline value; read from `--file` or stdin when absent
    pub value: Option<String>,
    #[arg(short, long, conflicts_with = "value")]
    pub file: Option<PathBuf>,
    /// Custom attribute as `name=value`; repeatable
    #[arg(long = "meta", value_parser = parse_key_value)]
    pub meta: Vec<(String, String)>,
}

#[derive(Args)]
pub struct GetArgs {
    pub path: String,
    /// Print metadata instead of the value
    #[arg(long)]
    pub stat: bool,
}

#[derive(Args)]
pub struct RmArgs {
    #[arg(required = true)]
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct LsArgs {
    /// Directory to list; the whole store when absent
    pub prefix: Option<String>,
    #[arg(short, long)]
    pub recursive: bool,
    /// Page size used while following cursors
    #[arg(short = 'n', long, default_value = "0")]
    pub limit: usize,
    #[arg(long)]
    pub start_after: Option<String>,
    /// Attributes to show, e.g. `size,modified`
    #[arg(long, default_value = "none")]
    pub flags: MetaFlags,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {s:?}"))?;
    if key.is_empty() {
        return Err("attribute name is empty".into());
    }
    Ok((key.to_lowercase(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["pathdb", "serve", "--http", "0.0.0.0:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.http, Some("0.0.0.0:8080".parse().unwrap()));
            assert!(args.rpc.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_put_with_meta() {
        let cli = Cli::try_parse_from([
            "pathdb", "put", "a/b", "hello", "--meta", "Owner=ops",
        ])
        .unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.path, "a/b");
            assert_eq!(args.value.as_deref(), Some("hello"));
            assert_eq!(args.meta, vec![("owner".to_string(), "ops".to_string())]);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn put_value_and_file_conflict() {
        assert!(Cli::try_parse_from(["pathdb", "put", "a", "v", "--file", "x"]).is_err());
    }

    #[test]
    fn bad_meta_is_rejected() {
        assert!(Cli::try_parse_from(["pathdb", "put", "a", "v", "--meta", "novalue"]).is_err());
    }

    #[test]
    fn parse_ls() {
        let cli = Cli::try_parse_from(["pathdb", "ls", "a/b", "-r", "--flags", "size,modified"]).unwrap();
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.prefix.as_deref(), Some("a/b"));
            assert!(args.recursive);
            assert_eq!(args.flags, MetaFlags::SIZE | MetaFlags::MODIFIED);
            assert_eq!(args.limit, 0);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_rm_requires_path() {
        assert!(Cli::try_parse_from(["pathdb", "rm"]).is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "pathdb", "--data", "/tmp/x.db", "--format", "json", "-v", "ls",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/x.db")));
    }
}
