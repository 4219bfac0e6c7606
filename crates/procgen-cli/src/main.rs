//! procgen CLI
//!
//! Reads a JSON catalog snapshot, gathers and assembles the stored-procedure
//! model, and writes:
//! - the proto3 schema (`<idl_package>.proto`),
//! - Rust call wrappers (`<idl_package>.rs`),
//! - per-function smoke-call fixtures (`fixtures/*.json`).
//!
//! `procgen model` stops after assembly and dumps the frozen model as JSON.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use procgen_assemble::{Assembled, Gatherer, RunSummary};
use procgen_codegen::{emit_all, Artifact};
use procgen_ingest_catalog::{NameFilter, SnapshotCatalog};
use procgen_model::{Annotation, AnnotationKind, GenConfig};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(name = "procgen")]
#[command(
    author,
    version,
    about = "procgen: stored-procedure metadata to typed call layers"
)]
struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the proto schema, Rust wrappers and fixtures.
    Generate {
        #[command(flatten)]
        run: RunArgs,
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Assemble the model and print it as JSON.
    Model {
        #[command(flatten)]
        run: RunArgs,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Clone, Debug, Default)]
struct RunArgs {
    /// Catalog snapshot (JSON)
    #[arg(short, long)]
    snapshot: PathBuf,
    /// Generator config (JSON); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Only objects whose `package.object` matches (LIKE-style, `%` wildcard)
    #[arg(long)]
    pattern: Option<String>,
    /// Comma-separated `package.object` names to leave out
    #[arg(long, value_delimiter = ',')]
    except: Vec<String>,
    /// Replace directive, `pkg.a=>b` (repeatable)
    #[arg(long = "replace")]
    replace: Vec<String>,
    /// Render numbers as strings
    #[arg(long)]
    number_as_string: bool,
    /// Abort on unresolvable types instead of skipping the function
    #[arg(long)]
    no_skip_missing: bool,
    /// Default collection cap
    #[arg(long)]
    max_table_size: Option<u32>,
    /// Directive marker (repeatable; replaces the configured ones)
    #[arg(long = "marker")]
    markers: Vec<String>,
    /// Concurrent catalog lookups
    #[arg(long)]
    workers: Option<usize>,
    /// Gathering deadline in seconds
    #[arg(long)]
    deadline: Option<u64>,
    /// Package of the generated schema
    #[arg(long)]
    idl_package: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate { run, out } => {
            let written = cmd_generate(&run, &out).await?;
            eprintln!(
                "{} {} files in {}",
                "wrote".green().bold(),
                written.len(),
                out.display().to_string().bold()
            );
        }
        Commands::Model { run, out } => cmd_model(&run, out.as_deref()).await?,
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_generate(run: &RunArgs, out: &Path) -> Result<Vec<PathBuf>> {
    let config = load_config(run)?;
    let assembled = assemble(run, &config).await?;
    print_summary(&assembled.summary);

    let artifacts = emit_all(&assembled.model, &config).context("code generation failed")?;
    write_artifacts(out, &artifacts)
}

async fn cmd_model(run: &RunArgs, out: Option<&Path>) -> Result<()> {
    let config = load_config(run)?;
    let assembled = assemble(run, &config).await?;
    print_summary(&assembled.summary);

    let json = serde_json::to_string_pretty(&assembled.model)?;
    match out {
        Some(path) => {
            fs::write(path, json + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn assemble(run: &RunArgs, config: &GenConfig) -> Result<Assembled> {
    let catalog = SnapshotCatalog::from_path(&run.snapshot)
        .with_context(|| format!("failed to load snapshot {}", run.snapshot.display()))?;
    let mut gatherer = Gatherer::new(Arc::new(catalog), config.clone())
        .with_annotations(replace_rules(&run.replace)?);
    if let Some(filter) = name_filter(run.pattern.as_deref(), &run.except)? {
        gatherer = gatherer.with_filter(filter);
    }
    gatherer.run().await.context("assembly failed")
}

fn write_artifacts(out: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = out.join(&artifact.path);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::write(&path, &artifact.contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}

fn print_summary(summary: &RunSummary) {
    eprintln!(
        "{} {} functions, {} composite types, {} directives, {} type fetches",
        "assembled".green().bold(),
        summary.functions,
        summary.composite_types,
        summary.directives,
        summary.type_fetches
    );
    for skipped in &summary.skipped {
        eprintln!(
            "  {} {} ({})",
            "skipped".yellow(),
            skipped.function,
            skipped.reason
        );
    }
    for warning in &summary.warnings {
        eprintln!("  {} {}", "warning:".yellow().bold(), warning);
    }
}

// ============================================================================
// Options
// ============================================================================

fn load_config(run: &RunArgs) -> Result<GenConfig> {
    let mut config = match &run.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            GenConfig::from_json(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => GenConfig::default(),
    };
    if run.number_as_string {
        config.number_as_string = true;
    }
    if run.no_skip_missing {
        config.skip_missing_table_of = false;
    }
    if let Some(size) = run.max_table_size {
        config.max_table_size = size;
    }
    if !run.markers.is_empty() {
        config.markers = run.markers.clone();
    }
    if let Some(workers) = run.workers {
        config.workers = workers;
    }
    if let Some(secs) = run.deadline {
        config.deadline_secs = secs;
    }
    if let Some(package) = &run.idl_package {
        config.idl_package = package.clone();
    }
    Ok(config)
}

/// `pkg.a=>b` into a `replace` directive on package `pkg`.
fn replace_rules(rules: &[String]) -> Result<Vec<Annotation>> {
    rules
        .iter()
        .map(|rule| {
            let (target, other) = rule
                .split_once("=>")
                .ok_or_else(|| anyhow!("replace rule {rule:?}: expected pkg.a=>b"))?;
            let (package, name) = target
                .trim()
                .split_once('.')
                .ok_or_else(|| anyhow!("replace rule {rule:?}: expected pkg.a=>b"))?;
            let other = other.trim();
            if package.is_empty() || name.is_empty() || other.is_empty() {
                return Err(anyhow!("replace rule {rule:?}: empty name"));
            }
            Ok(Annotation::new(package, AnnotationKind::Replace, name).with_other(other))
        })
        .collect()
}

/// SQL `LIKE` as a regex: `%` is any run, `_` any one character.
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).with_context(|| format!("bad pattern {pattern:?}"))
}

fn name_filter(pattern: Option<&str>, except: &[String]) -> Result<Option<NameFilter>> {
    let like = pattern.map(like_regex).transpose()?;
    let except: Vec<String> = except
        .iter()
        .map(|e| e.trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    if like.is_none() && except.is_empty() {
        return Ok(None);
    }
    let filter: NameFilter = Arc::new(move |name: &str| {
        let lower = name.to_ascii_lowercase();
        let object = lower.rsplit('.').next().unwrap_or(&lower);
        if except.iter().any(|e| *e == lower || e == object) {
            return false;
        }
        like.as_ref().map_or(true, |re| re.is_match(name))
    });
    Ok(Some(filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "arguments": [
            {"owner": "APP", "package": "DB_WEB", "object": "GET_USER", "sequence": 1,
             "argument_name": "P_ID", "direction": "IN", "data_kind": "NUMBER", "precision": 9},
            {"owner": "APP", "package": "DB_WEB", "object": "GET_USER", "sequence": 2,
             "argument_name": "P_NAME", "direction": "OUT", "data_kind": "VARCHAR2"},
            {"owner": "APP", "package": "DB_WEB", "object": "PING", "sequence": 1},
            {"owner": "APP", "package": "DB_WEB", "object": "LEGACY", "sequence": 1,
             "argument_name": "P_X", "direction": "IN", "data_kind": "DATE"}
        ],
        "sources": {
            "DB_WEB": "PACKAGE db_web IS\n  -- Look up one user.\n  PROCEDURE get_user(p_id IN NUMBER, p_name OUT VARCHAR2);\nEND;"
        }
    }"#;

    fn run_args(dir: &Path) -> RunArgs {
        let snapshot = dir.join("snapshot.json");
        fs::write(&snapshot, SNAPSHOT).expect("write snapshot");
        RunArgs {
            snapshot,
            ..RunArgs::default()
        }
    }

    #[test]
    fn like_patterns() {
        let re = like_regex("db_web.get%").expect("regex");
        assert!(re.is_match("DB_WEB.GET_USER"));
        assert!(!re.is_match("DB_WEB.PING"));
        assert!(like_regex("a+b%").expect("regex").is_match("A+B.C"));
    }

    #[test]
    fn filters_combine_pattern_and_exclusions() {
        let filter = name_filter(Some("DB_WEB.%"), &["legacy".into()])
            .expect("filter")
            .expect("some filter");
        assert!(filter("DB_WEB.GET_USER"));
        assert!(!filter("DB_WEB.LEGACY"));
        assert!(!filter("OTHER.GET_USER"));
        assert!(name_filter(None, &[]).expect("filter").is_none());
    }

    #[test]
    fn replace_rules_parse() {
        let rules = replace_rules(&["db_web.get_user => get_user_json".into()]).expect("rules");
        assert_eq!(rules[0].package, "db_web");
        assert_eq!(rules[0].kind, AnnotationKind::Replace);
        assert_eq!(rules[0].other.as_deref(), Some("get_user_json"));
        assert!(replace_rules(&["get_user=>x".into()]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("config.json");
        fs::write(&config, r#"{"max_table_size": 50, "idl_package": "web"}"#).expect("write");
        let run = RunArgs {
            config: Some(config),
            number_as_string: true,
            max_table_size: Some(70),
            ..run_args(dir.path())
        };
        let cfg = load_config(&run).expect("config");
        assert_eq!(cfg.max_table_size, 70);
        assert_eq!(cfg.idl_package, "web");
        assert!(cfg.number_as_string);
        assert!(cfg.skip_missing_table_of);
    }

    #[tokio::test]
    async fn generate_writes_every_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out");
        let run = RunArgs {
            except: vec!["legacy".into()],
            ..run_args(dir.path())
        };
        let written = cmd_generate(&run, &out).await.expect("generate");
        assert_eq!(written.len(), 4);

        let proto = fs::read_to_string(out.join("procgen.proto")).expect("proto");
        assert!(proto.contains("service DbWeb {"));
        assert!(proto.contains("  // Look up one user.\n  rpc GetUser"));
        assert!(proto.contains("  rpc Ping (DbWeb__Ping__Request) returns (DbWeb__Ping__Response) {}"));
        assert!(!proto.contains("Legacy"));
        assert!(out.join("procgen.rs").exists());
        assert!(out.join("fixtures/db_web__get_user.json").exists());
        assert!(out.join("fixtures/db_web__ping.json").exists());
    }

    #[tokio::test]
    async fn model_dump_is_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("model.json");
        let run = RunArgs {
            pattern: Some("%.GET%".into()),
            ..run_args(dir.path())
        };
        cmd_model(&run, Some(&target)).await.expect("model");
        let model: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&target).expect("read")).expect("json");
        let functions = model["functions"].as_array().expect("functions");
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0]["name"], "GET_USER");
    }
}
