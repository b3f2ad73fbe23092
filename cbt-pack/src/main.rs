#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::fs::create_dir_all;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cbt::{is_comic, repack, Excluder};
use clap::Parser;
use tracing::{debug, error};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[clap(about, author, version)]
pub struct Args {
    /// A comic archive file or a directory tree of archives to convert
    pub source: Utf8PathBuf,
    /// Destination directory, defaults to the source's parent directory
    pub outdir: Option<Utf8PathBuf>,
    /// Disable the low-digit-count exclusion rule
    /// (keyword and denylist rules still apply)
    #[clap(long, action)]
    pub exclude_off: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let excluder = Excluder::new(args.exclude_off);
    let outdir = match &args.outdir {
        Some(outdir) => outdir.clone(),
        None => args
            .source
            .parent()
            .unwrap_or(Utf8Path::new("."))
            .to_owned(),
    };

    let start = Instant::now();

    if args.source.is_file() {
        if is_tar_based(&args.source) {
            bail!("{} is already tar-based, nothing to convert", args.source);
        }

        repack(&args.source, &outdir, &excluder)
            .with_context(|| format!("convert failed, file: {}", args.source))?;
        println!("cost: {:?}", start.elapsed());

        return Ok(());
    }

    if !args.source.is_dir() {
        bail!("source path is invalid: {}", args.source);
    }

    create_dir_all(&outdir).with_context(|| format!("creating destination {outdir}"))?;

    convert_tree(&args.source, &outdir, &excluder)?;

    println!("cost: {:?}", start.elapsed());

    Ok(())
}

/// Walks the source tree, mirrors its directories under `outdir` and
/// converts every comic archive in place. Per-file conversion failures are
/// logged and skipped; walk and mirroring failures abort the run.
fn convert_tree(source: &Utf8Path, outdir: &Utf8Path, excluder: &Excluder) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.with_context(|| format!("walking {source}"))?;
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            error!("{:?} is not a valid utf-8 path", entry.path());
            continue;
        };
        let rel = path.strip_prefix(source).unwrap_or(path);

        if entry.file_type().is_dir() {
            if rel.as_str().is_empty() {
                continue;
            }
            let mirrored = outdir.join(rel);
            create_dir_all(&mirrored).with_context(|| format!("creating {mirrored}"))?;
            continue;
        }

        if !is_comic(path.as_str()) {
            continue;
        }
        if is_tar_based(path) {
            debug!("already tar-based, skipping: {path}");
            continue;
        }

        let target_dir = match rel.parent() {
            Some(parent) => outdir.join(parent),
            None => outdir.to_owned(),
        };
        if let Err(err) = repack(path, &target_dir, excluder) {
            error!("convert failed, file: {path}, error: {err}");
        }
    }

    Ok(())
}

fn is_tar_based(path: &Utf8Path) -> bool {
    matches!(
        path.extension().map(str::to_lowercase).as_deref(),
        Some("cbt" | "tar")
    )
}
