//=====================================================
// File: main.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: splice CLI entry point
// Objective: Run TOML application manifests through the module loader and
//            expose path resolution and version qualification for debugging
//=====================================================

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::json;
use splice_loader::config::Platform;
use splice_loader::manifest::Manifest;
use splice_loader::modules::{LoadReport, block_on};
use splice_loader::path::PathResolver;
use splice_loader::registry::{RecordSnapshot, RecordStatus};
use splice_loader::version::{ActiveConfiguration, VersionQualifier, qualifies};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "splice", about = "Dependency-aware module loader")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and execute the application described by a manifest.
    Run(RunArgs),
    /// Resolve a resource identifier against a base context.
    Resolve(ResolveArgs),
    /// Check whether a qualifier accepts an active version.
    Qualify(QualifyArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Path to the TOML manifest.
    pub manifest: PathBuf,

    /// Print the report and registry as JSON.
    #[arg(long = "json")]
    pub json: bool,

    /// Enable debug logging.
    #[arg(long = "debug")]
    pub debug: bool,

    /// Fail when any record is left unprocessed.
    #[arg(long = "strict")]
    pub strict: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ResolveArgs {
    pub identifier: String,

    /// Application base context.
    #[arg(long = "base", default_value = "/")]
    pub base: String,

    /// Resource the identifier is relative to; defaults to the base.
    #[arg(long = "from")]
    pub from: Option<String>,

    #[arg(long = "platform", default_value = "WEB")]
    pub platform: String,

    /// Path variable as `name=value`; may be repeated.
    #[arg(long = "var")]
    pub vars: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct QualifyArgs {
    /// Qualifier, e.g. `WEB:1.0-2.0`.
    pub qualifier: String,

    /// Active version, e.g. `WEB:2.1.0`.
    #[arg(long = "version")]
    pub version: Option<String>,

    #[arg(long = "platform", default_value = "WEB")]
    pub platform: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run(cmd) => run_manifest(cmd),
        Command::Resolve(cmd) => {
            install_tracing(false);
            resolve_identifier(cmd)
        }
        Command::Qualify(cmd) => {
            install_tracing(false);
            qualify(cmd)
        }
    }
}

fn install_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if debug {
        if let Ok(directive) = "splice_loader=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_manifest(args: RunArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    install_tracing(args.debug || manifest.config.debug);

    let (mut loader, fetcher) = manifest
        .loader()
        .with_context(|| format!("configuring loader from {}", args.manifest.display()))?;
    let report = block_on(loader.run_application())
        .context("starting async runtime")?
        .context("running application")?;
    let records = loader.list_all();

    if args.json {
        let output = json!({
            "report": report,
            "records": records,
            "fetches": fetcher.total_fetches(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(&report, &records);
    }

    if args.strict && !report.is_clean() {
        bail!("{} record(s) were not processed", report.pending.len());
    }
    Ok(())
}

fn print_report(report: &LoadReport, records: &[RecordSnapshot]) {
    for record in records {
        let status = match &record.status {
            RecordStatus::Requested => "requested".to_string(),
            RecordStatus::Loaded => "loaded".to_string(),
            RecordStatus::Processed => "processed".to_string(),
            RecordStatus::Failed(reason) => format!("failed ({reason})"),
        };
        println!("{status:<12} {}", record.id);
    }
    for cycle in &report.execution.cycles {
        let members: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
        println!("cycle        {}", members.join(" -> "));
    }
    println!(
        "{} processed, {} pending, {} round(s)",
        report.execution.processed.len(),
        report.pending.len(),
        report.rounds
    );
}

fn resolve_identifier(args: ResolveArgs) -> Result<()> {
    let platform: Platform = args.platform.parse()?;
    let mut paths = PathResolver::new(platform, &args.base)?;
    for var in &args.vars {
        let Some((name, value)) = var.split_once('=') else {
            bail!("path variable '{var}' must be written as name=value");
        };
        paths.set_path_variable(name, value)?;
    }
    let context = match args.from.as_deref() {
        Some(from) => paths.context(from),
        None => paths.app_context().clone(),
    };
    match paths.resolve(&args.identifier, &context)? {
        Some(id) => println!("{id}"),
        None => bail!("identifier is empty"),
    }
    Ok(())
}

fn qualify(args: QualifyArgs) -> Result<()> {
    let platform: Platform = args.platform.parse()?;
    let active = ActiveConfiguration::new(platform, args.version.as_deref())?;
    let candidate = VersionQualifier::parse(&args.qualifier, true)?;
    let accepted = qualifies(&candidate, active.qualifier());
    println!("{}", if accepted { "accepted" } else { "rejected" });
    Ok(())
}
