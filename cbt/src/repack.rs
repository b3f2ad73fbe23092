use std::fs::OpenOptions;
use std::io::{self, ErrorKind};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{error, info};

use crate::errors::{Error, Result};
use crate::exclude::Excluder;
use crate::is_image;
use crate::source::{open_source, ArchiveEntry};

/// Tar mode bits applied to every page entry.
const PAGE_MODE: u32 = 0o666;

/// Converts one comic archive into `<stem>.cbt` inside `target_dir` and
/// returns the target path.
///
/// # Errors
///
/// Same failure modes as [`repack_archive`], plus a source path without a
/// file name.
pub fn repack(src: &Utf8Path, target_dir: &Utf8Path, excluder: &Excluder) -> Result<Utf8PathBuf> {
    info!("convert: {src}");

    let stem = src
        .file_stem()
        .ok_or_else(|| Error::NoFileName(src.to_owned()))?;
    let target = target_dir.join(format!("{stem}.cbt"));

    repack_archive(src, &target, excluder)?;

    Ok(target)
}

/// Streams the source archive into a tar file at `target`, dropping junk
/// pages into loose backup files beside it.
///
/// Accepted entries keep their container order, so the output is always a
/// subsequence of the source. The lookback window feeding the classifier
/// advances only when an entry is accepted.
///
/// # Errors
///
/// Fails when the source cannot be opened, when `target` already exists
/// (exclusive create, no overwrite), or when a tar write fails mid-stream.
/// A failed backup write is logged and skipped instead.
pub fn repack_archive(src: &Utf8Path, target: &Utf8Path, excluder: &Excluder) -> Result<()> {
    let mut source = open_source(src)?;

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .map_err(|err| {
            if err.kind() == ErrorKind::AlreadyExists {
                Error::TargetExists(target.to_owned())
            } else {
                err.into()
            }
        })?;
    let mut writer = tar::Builder::new(file);

    let mut previous_name = String::new();
    let mut previous_time: Option<i64> = None;

    while let Some(entry) = source.next_entry()? {
        if entry.is_directory || !is_image(&entry.name) {
            continue;
        }

        if excluder.is_excluded(&entry.name, &previous_name, entry.mod_time, previous_time) {
            if let Err(err) = write_backup(target, &entry) {
                error!("backup excluded file failed: {}, error: {err}", entry.name);
            }
            continue;
        }

        let mut header = tar::Header::new_gnu();
        header.set_mode(PAGE_MODE);
        header.set_size(entry.content.len() as u64);
        header.set_mtime(
            entry
                .mod_time
                .and_then(|seconds| u64::try_from(seconds).ok())
                .unwrap_or(0),
        );
        writer
            .append_data(&mut header, &entry.name, entry.content.as_slice())
            .map_err(|err| Error::CbtWrite {
                file: src.to_owned(),
                name: entry.name.clone(),
                source: err,
            })?;

        previous_name = entry.name;
        previous_time = entry.mod_time;
    }

    writer.finish()?;

    Ok(())
}

/// Writes an excluded entry to `<target-stem>_<entry-name>` so it survives
/// for manual review. Name collisions get a numeric suffix.
fn write_backup(target: &Utf8Path, entry: &ArchiveEntry) -> io::Result<()> {
    let stem = target.with_extension("");

    let mut backup = Utf8PathBuf::from(format!("{stem}_{}", entry.name));
    let mut attempt = 0u32;
    while backup.exists() {
        attempt += 1;
        backup = Utf8PathBuf::from(format!("{stem}_{}.{attempt}", entry.name));
    }

    std::fs::write(&backup, &entry.content)
}
