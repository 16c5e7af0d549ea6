use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use glint_shader::{disassemble, BlobCache, CacheLookupSource, ShaderProgram, Target};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::CliConfig;

/// File extension for assembled blobs.
const BLOB_EXTENSION: &str = "glsb";

#[derive(Parser, Debug)]
#[command(
    name = "glint",
    about = "Assemble shader programs for glint targets and disassemble the resulting blobs."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble JSON shader programs into target blobs
    Asm {
        /// Program files (JSON)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target to assemble for (defaults to $GLINT_TARGET, then "generic")
        #[arg(short, long)]
        target: Option<Target>,

        /// Output path; only valid with a single input (defaults to "<input stem>.glsb")
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Disassemble a blob into a listing
    Disasm {
        /// Blob file
        input: PathBuf,

        /// Target the blob was assembled for (defaults to $GLINT_TARGET, then "generic")
        #[arg(short, long)]
        target: Option<Target>,

        /// Print the listing as JSON
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,

        /// Fail if the blob does not decode completely
        #[arg(long, action = clap::ArgAction::SetTrue)]
        strict: bool,
    },
    /// List supported targets
    Targets,
}

fn main() -> anyhow::Result<()> {
    let config = CliConfig::from_env().context("read configuration from environment")?;
    init_tracing(&config)?;
    run(Args::parse(), &config)
}

fn init_tracing(config: &CliConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .with_context(|| format!("invalid log filter {:?}", config.log_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn run(args: Args, config: &CliConfig) -> anyhow::Result<()> {
    match args.command {
        Command::Asm {
            inputs,
            target,
            output,
        } => asm(&inputs, target.unwrap_or(config.target), output, config),
        Command::Disasm {
            input,
            target,
            json,
            strict,
        } => disasm(&input, target.unwrap_or(config.target), json, strict),
        Command::Targets => targets(),
    }
}

fn asm(
    inputs: &[PathBuf],
    target: Target,
    output: Option<PathBuf>,
    config: &CliConfig,
) -> anyhow::Result<()> {
    if output.is_some() && inputs.len() > 1 {
        bail!("--output can only be used with a single input");
    }

    // Identical programs in a batch are assembled once.
    let mut cache = BlobCache::new(config.cache_capacity);
    for input in inputs {
        let program = read_program(input)?;
        let lookup = cache
            .get_or_assemble(target, &program)
            .with_context(|| format!("assemble {} for {target}", input.display()))?;

        let out_path = output
            .clone()
            .unwrap_or_else(|| input.with_extension(BLOB_EXTENSION));
        fs::write(&out_path, lookup.as_bytes())
            .with_context(|| format!("write {}", out_path.display()))?;

        debug!(
            input = %input.display(),
            cached = lookup.source == CacheLookupSource::Memory,
            "assembled program"
        );
        info!(
            output = %out_path.display(),
            bytes = lookup.len(),
            instructions = program.instructions.len(),
            backend = %target,
            "wrote blob"
        );
    }
    Ok(())
}

fn read_program(path: &Path) -> anyhow::Result<ShaderProgram> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse program {}", path.display()))
}

fn disasm(input: &Path, target: Target, json: bool, strict: bool) -> anyhow::Result<()> {
    let bytes = fs::read(input).with_context(|| format!("read {}", input.display()))?;
    let listing = disassemble(&bytes, target)
        .with_context(|| format!("disassemble {} as {target}", input.display()))?;

    let mut stdout = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &listing).context("serialize listing")?;
        writeln!(stdout)?;
    } else {
        write!(stdout, "{listing}")?;
    }
    stdout.flush()?;

    if strict {
        if let Some(m) = listing.malformed {
            return Err(m)
                .with_context(|| format!("{} does not decode completely", input.display()));
        }
    }
    Ok(())
}

fn targets() -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    for target in Target::ALL {
        let model = target.model();
        writeln!(
            stdout,
            "{:<8} id={} opcodes={} predicates={}",
            target.name(),
            target.id(),
            model.rules.len(),
            model.limits.predicate,
        )?;
    }
    Ok(())
}
