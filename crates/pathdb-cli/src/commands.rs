use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use pathdb_meta::{CancellationToken, ListRequest, MetaStore};
use pathdb_server::{PathdbServer, ServerConfig};
use pathdb_store::FileOrderedStore;
use pathdb_types::{Entry, MetaFlags, ObjectMeta, Path};
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args),
        Command::Put(args) => with_store(&config, |meta, out| cmd_put(meta, args, format, out)),
        Command::Get(args) => with_store(&config, |meta, out| cmd_get(meta, args, format, out)),
        Command::Rm(args) => with_store(&config, |meta, out| cmd_rm(meta, args, format, out)),
        Command::Ls(args) => with_store(&config, |meta, out| cmd_ls(meta, args, format, out)),
    }
}

fn with_store<F>(config: &ServerConfig, run: F) -> anyhow::Result<()>
where
    F: FnOnce(&MetaStore, &mut dyn Write) -> anyhow::Result<()>,
{
    let meta = open_store(config)?;
    let mut out = std::io::stdout().lock();
    run(&meta, &mut out)?;
    out.flush()?;
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(data) = &cli.data {
        config.data_path = data.clone();
    }
    Ok(config)
}

fn open_store(config: &ServerConfig) -> anyhow::Result<MetaStore> {
    let backend = FileOrderedStore::open(&config.data_path, config.store.clone())
        .with_context(|| format!("opening {}", config.data_path.display()))?;
    Ok(MetaStore::with_config(Arc::new(backend), config.meta.clone()))
}

fn parse_path(text: &str) -> anyhow::Result<Path> {
    Path::parse(text).with_context(|| format!("invalid path {text:?}"))
}

fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(http) = args.http {
        config.http_addr = http;
    }
    if let Some(rpc) = args.rpc {
        config.rpc_addr = rpc;
    }
    println!(
        "pathdb serving {} (http {}, rpc {})",
        config.data_path.display().to_string().bold(),
        config.http_addr.to_string().cyan(),
        config.rpc_addr.to_string().cyan()
    );

    let server = PathdbServer::open(config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let shutdown = CancellationToken::new();
        let on_signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                on_signal.cancel();
            }
        });
        server.serve(shutdown).await
    })?;
    Ok(())
}

pub(crate) fn cmd_put(
    meta: &MetaStore,
    args: PutArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let path = parse_path(&args.path)?;
    let value = match (args.value, args.file) {
        (Some(value), _) => value.into_bytes(),
        (None, Some(file)) => {
            std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?
        }
        (None, None) => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    let custom: BTreeMap<String, String> = args.meta.into_iter().collect();
    meta.put_with(&path, &value, custom)?;

    match format {
        OutputFormat::Text => writeln!(out, "{} {} ({} bytes)", "✓".green().bold(), path, value.len())?,
        OutputFormat::Json => writeln!(out, "{}", json!({ "path": path.to_string(), "size": value.len() }))?,
    }
    Ok(())
}

pub(crate) fn cmd_get(
    meta: &MetaStore,
    args: GetArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let path = parse_path(&args.path)?;
    let object = meta.get(&path)?;
    if !args.stat {
        out.write_all(&object.value)?;
        return Ok(());
    }
    match format {
        OutputFormat::Text => {
            writeln!(out, "{}", object.path.to_string().bold())?;
            write_meta(out, &object.meta)?;
        }
        OutputFormat::Json => {
            writeln!(out, "{}", meta_json(&object.path, false, Some(&object.meta)))?;
        }
    }
    Ok(())
}

pub(crate) fn cmd_rm(
    meta: &MetaStore,
    args: RmArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    for raw in &args.paths {
        let path = parse_path(raw)?;
        meta.delete(&path)?;
        match format {
            OutputFormat::Text => writeln!(out, "{} {}", "deleted".red(), path)?,
            OutputFormat::Json => writeln!(out, "{}", json!({ "deleted": path.to_string() }))?,
        }
    }
    Ok(())
}

pub(crate) fn cmd_ls(
    meta: &MetaStore,
    args: LsArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let prefix = match &args.prefix {
        Some(text) => parse_path(text)?,
        None => Path::root(),
    };
    let mut request = ListRequest::new(prefix, args.recursive)
        .limit(args.limit)
        .flags(args.flags);
    if let Some(after) = &args.start_after {
        request = request.start_after(parse_path(after)?);
    }
    let entries = meta.list_all(&request)?;

    match format {
        OutputFormat::Text => {
            for entry in &entries {
                write_entry(out, entry, args.flags)?;
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = entries
                .iter()
                .map(|e| meta_json(&e.path, e.is_prefix, e.meta.as_ref()))
                .collect();
            writeln!(out, "{}", serde_json::Value::Array(rows))?;
        }
    }
    Ok(())
}

fn write_entry(out: &mut dyn Write, entry: &Entry, flags: MetaFlags) -> std::io::Result<()> {
    if entry.is_prefix {
        return writeln!(out, "{} {}/", "PRE".blue().bold(), entry.path);
    }
    let mut line = entry.path.to_string();
    if let Some(meta) = &entry.meta {
        if flags.contains(MetaFlags::SIZE) {
            line = format!("{:>10}  {line}", meta.size);
        }
        if flags.contains(MetaFlags::MODIFIED) {
            line = format!("{:>13}  {line}", meta.modified_ms);
        }
        if let Some(hex) = meta.checksum_hex() {
            line = format!("{line}  {}", hex.dimmed());
        }
    }
    writeln!(out, "{line}")
}

fn write_meta(out: &mut dyn Write, meta: &ObjectMeta) -> std::io::Result<()> {
    writeln!(out, "  size:     {}", meta.size)?;
    writeln!(out, "  modified: {}", meta.modified_ms)?;
    if let Some(hex) = meta.checksum_hex() {
        writeln!(out, "  checksum: {}", hex.yellow())?;
    }
    for (name, value) in &meta.custom {
        writeln!(out, "  {}: {value}", name.cyan())?;
    }
    Ok(())
}

fn meta_json(path: &Path, is_prefix: bool, meta: Option<&ObjectMeta>) -> serde_json::Value {
    let mut row = json!({ "path": path.to_string(), "is_prefix": is_prefix });
    if let Some(meta) = meta {
        row["size"] = json!(meta.size);
        row["modified_ms"] = json!(meta.modified_ms);
        row["checksum"] = json!(meta.checksum_hex());
        row["custom"] = json!(meta.custom);
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathdb_store::InMemoryOrderedStore;

    fn store() -> MetaStore {
        colored::control::set_override(false);
        MetaStore::new(Arc::new(InMemoryOrderedStore::new()))
    }

    fn put(meta: &MetaStore, path: &str, value: &str) {
        let args = PutArgs {
            path: path.into(),
            value: Some(value.into()),
            file: None,
            meta: vec![],
        };
        cmd_put(meta, args, OutputFormat::Text, &mut Vec::new()).unwrap();
    }

    fn ls(meta: &MetaStore, prefix: Option<&str>, recursive: bool, limit: usize) -> String {
        let args = LsArgs {
            prefix: prefix.map(String::from),
            recursive,
            limit,
            start_after: None,
            flags: MetaFlags::NONE,
        };
        let mut out = Vec::new();
        cmd_ls(meta, args, OutputFormat::Text, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn ls_marks_directories() {
        let meta = store();
        for path in ["a/b/c", "a/b/d", "a/x"] {
            put(&meta, path, "v");
        }
        assert_eq!(ls(&meta, Some("a"), false, 0), "PRE a/b/\na/x\n");
        assert_eq!(ls(&meta, Some("a"), true, 0), "a/b/c\na/b/d\na/x\n");
    }

    #[test]
    fn ls_follows_every_page() {
        let meta = store();
        for i in 0..7 {
            put(&meta, &format!("logs/{i}"), "v");
        }
        let out = ls(&meta, Some("logs"), true, 2);
        assert_eq!(out.lines().count(), 7);
    }

    #[test]
    fn get_writes_raw_value() {
        let meta = store();
        put(&meta, "k", "hello");
        let mut out = Vec::new();
        let args = GetArgs { path: "k".into(), stat: false };
        cmd_get(&meta, args, OutputFormat::Text, &mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn get_stat_json() {
        let meta = store();
        put(&meta, "k", "hello");
        let mut out = Vec::new();
        let args = GetArgs { path: "k".into(), stat: true };
        cmd_get(&meta, args, OutputFormat::Json, &mut out).unwrap();
        let row: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(row["size"], 5);
        assert_eq!(row["is_prefix"], false);
    }

    #[test]
    fn get_missing_fails() {
        let meta = store();
        let args = GetArgs { path: "missing/path".into(), stat: false };
        let err = cmd_get(&meta, args, OutputFormat::Text, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn rm_is_idempotent() {
        let meta = store();
        put(&meta, "k", "v");
        for _ in 0..2 {
            let args = RmArgs { paths: vec!["k".into()] };
            cmd_rm(&meta, args, OutputFormat::Text, &mut Vec::new()).unwrap();
        }
        assert_eq!(ls(&meta, None, true, 0), "");
    }

    #[test]
    fn data_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("cli.db");
        let cli = <Cli as clap::Parser>::try_parse_from([
            "pathdb",
            "--data",
            data.to_str().unwrap(),
            "ls",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.data_path, data);
        let meta = open_store(&config).unwrap();
        put(&meta, "x/y", "z");
        assert_eq!(ls(&meta, Some("x"), false, 0), "x/y\n");
    }
}
