use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use cpv_core::builder::{self, BuildOutcome};
use cpv_core::config::{self, CpvConfig};
use cpv_core::copy_verify::copy_verify;
use cpv_core::diff::{self, DiffSummary};
use cpv_core::hasher::HashAlgorithm;
use cpv_core::manifest::{LineSyntax, Manifest, ManifestEntry, SOURCE_MANIFEST_NAME};
use cpv_core::reuse::ReuseIndex;
use cpv_core::verify::{verify, VerifyReport};
use cpv_core::CpvError;

mod logging;

const EXIT_MISMATCH: u8 = 1;
const EXIT_ERROR: u8 = 2;
const EXIT_ALREADY_COMPLETE: u8 = 3;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Algo {
    Blake3,
    Sha256,
}

impl From<Algo> for HashAlgorithm {
    fn from(a: Algo) -> Self {
        match a {
            Algo::Blake3 => HashAlgorithm::Blake3,
            Algo::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    /// `<checksum> *<path>` lines with a `;` header
    Teracopy,
}

#[derive(Parser)]
#[command(
    name = "cpv",
    version,
    about = "Copy a directory tree and verify it with checksum manifests"
)]
struct Cli {
    /// Config file (default: <config dir>/cpv/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More log output on stderr (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args, Clone, Debug, Default)]
struct HashArgs {
    /// Checksum algorithm (default: the one an existing manifest uses, else blake3)
    #[arg(long, value_enum)]
    algorithm: Option<Algo>,
    /// Glob of relative paths to leave out of manifests (repeatable)
    #[arg(long)]
    exclude: Vec<String>,
    /// Do not delete .DS_Store and ._* files before hashing
    #[arg(long)]
    keep_sidecars: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Write or extend the source manifest of a directory
    Checksum {
        dir: PathBuf,
        /// Hash every file and replace the manifest instead of appending
        #[arg(long)]
        rehash: bool,
        /// Take checksums from this manifest (sha256sum, TeraCopy, cpv) for
        /// files with a matching name instead of hashing them
        #[arg(long, value_name = "FILE")]
        reuse: Option<PathBuf>,
        #[command(flatten)]
        hash: HashArgs,
    },
    /// Copy SOURCE into TARGET/<name of SOURCE> and verify the copy
    CopyVerify {
        source: PathBuf,
        target: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        hash: HashArgs,
    },
    /// Re-hash a directory and compare it to its saved source manifest
    Verify {
        dir: PathBuf,
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        hash: HashArgs,
    },
    /// List entries of LEFT that have no exact match in RIGHT
    Diff {
        left: PathBuf,
        right: PathBuf,
        /// Write the entries here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Read sha256sum/TeraCopy-style input (`*` markers, `./` prefixes,
        /// backslash separators)
        #[arg(long)]
        lenient: bool,
    },
    /// Convert a cpv manifest to another tool's checksum file format
    Export {
        manifest: PathBuf,
        /// Target format
        #[arg(long, value_enum, default_value_t = ExportFormat::Teracopy)]
        format: ExportFormat,
        /// Write here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e.downcast_ref::<CpvError>().map(CpvError::exit_code);
            ExitCode::from(code.unwrap_or(EXIT_ERROR))
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let file_cfg = config::load(cli.config.as_deref())?;
    match cli.cmd {
        Cmd::Checksum { dir, rehash, reuse, hash } => {
            let mut cfg = apply_overrides(file_cfg, &hash);
            cfg.rehash |= rehash;
            checksum(&dir, &cfg, reuse.as_deref())
        }
        Cmd::CopyVerify { source, target, json, hash } => {
            let cfg = apply_overrides(file_cfg, &hash);
            let rep = copy_verify(&source, &target, &cfg.build_options()?)?;
            if !json {
                if rep.source_manifest == BuildOutcome::AlreadyComplete {
                    println!("Source manifest already complete; reused");
                }
                println!(
                    "Copied {} file(s), {} byte(s) to {}",
                    rep.copied.files,
                    rep.copied.bytes,
                    rep.destination.display()
                );
            }
            report_verify("copy-verify", &rep.verify, json)
        }
        Cmd::Verify { dir, json, hash } => {
            let cfg = apply_overrides(file_cfg, &hash);
            let rep = verify(&dir, &cfg.build_options()?)?;
            report_verify("verify", &rep, json)
        }
        Cmd::Diff { left, right, output, lenient } => {
            let syntax = if lenient { LineSyntax::Lenient } else { LineSyntax::Native };
            diff_cmd(&left, &right, output.as_deref(), syntax)
        }
        Cmd::Export { manifest, format, output } => export(&manifest, format, output.as_deref()),
        Cmd::Config => {
            print!("{}", toml::to_string_pretty(&file_cfg).context("serialize config")?);
            Ok(0)
        }
    }
}

fn apply_overrides(mut cfg: CpvConfig, args: &HashArgs) -> CpvConfig {
    if let Some(a) = args.algorithm {
        cfg.algorithm = Some(a.into());
    }
    cfg.exclude.extend(args.exclude.iter().cloned());
    if args.keep_sidecars {
        cfg.clean_sidecars = false;
    }
    cfg
}

fn checksum(dir: &Path, cfg: &CpvConfig, reuse: Option<&Path>) -> Result<u8> {
    let manifest = dir.join(SOURCE_MANIFEST_NAME);
    let mut opts = cfg.build_options()?;
    if let Some(path) = reuse {
        opts.reuse = Some(Arc::new(ReuseIndex::read(path)?));
    }
    let built = builder::build_manifest(dir, SOURCE_MANIFEST_NAME, &opts)?;
    let code = match built.outcome {
        BuildOutcome::Written(n) => {
            let noun = if n == 1 { "entry" } else { "entries" };
            println!("Wrote {n} {noun} ({}) to {}", built.algorithm, manifest.display());
            0
        }
        BuildOutcome::AlreadyComplete => {
            println!("Nothing to do: {} already lists every file", manifest.display());
            EXIT_ALREADY_COMPLETE
        }
    };
    if built.rejected.is_empty() {
        return Ok(code);
    }
    println!(
        "FAILED: {} file(s) match no reused checksum and were not recorded",
        built.rejected.len()
    );
    for p in &built.rejected {
        println!("  {p}");
    }
    Ok(EXIT_MISMATCH)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    command: &'a str,
    directory: &'a Path,
    report: &'a Path,
    clean: bool,
    differences: Vec<String>,
    summary: &'a DiffSummary,
    checked_utc: String,
}

fn report_verify(command: &str, rep: &VerifyReport, json: bool) -> Result<u8> {
    if json {
        let out = JsonReport {
            command,
            directory: &rep.directory,
            report: &rep.report_path,
            clean: rep.is_clean(),
            differences: rep.diff.iter().map(ManifestEntry::to_string).collect(),
            summary: &rep.summary,
            checked_utc: chrono::Utc::now().to_rfc3339(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let s = &rep.summary;
        if rep.is_clean() {
            println!("OK: {} file(s) match ({})", s.matched, rep.report_path.display());
        } else {
            println!("BAD: {} entr(ies) differ ({})", rep.diff.len(), rep.report_path.display());
            for p in &s.changed {
                println!("  changed: {p}");
            }
            for p in &s.missing {
                println!("  missing: {p}");
            }
        }
        for p in &s.unexpected {
            println!("  not in source manifest: {p}");
        }
    }
    Ok(if rep.is_clean() { 0 } else { EXIT_MISMATCH })
}

fn diff_cmd(left: &Path, right: &Path, output: Option<&Path>, syntax: LineSyntax) -> Result<u8> {
    let entries = match output {
        Some(out) => diff::diff_files(left, right, out, syntax)?,
        None => {
            let left = Manifest::read_with(left, syntax)?;
            let right = Manifest::read_with(right, syntax)?;
            let entries = diff::diff(&left, &right);
            for e in &entries {
                println!("{e}");
            }
            entries
        }
    };
    Ok(if entries.is_empty() { 0 } else { EXIT_MISMATCH })
}

fn export(manifest: &Path, format: ExportFormat, output: Option<&Path>) -> Result<u8> {
    let mf = Manifest::read(manifest)?;
    match (format, output) {
        (ExportFormat::Teracopy, Some(out)) => {
            let f = File::create(out).with_context(|| format!("create {}", out.display()))?;
            mf.write_teracopy(BufWriter::new(f))
                .with_context(|| format!("write {}", out.display()))?;
            tracing::info!(output = %out.display(), entries = mf.len(), "exported");
        }
        (ExportFormat::Teracopy, None) => {
            mf.write_teracopy(io::stdout().lock()).context("write to stdout")?;
        }
    }
    Ok(0)
}
