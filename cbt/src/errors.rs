use std::{io, result};

use camino::Utf8PathBuf;
use zip::result::ZipError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error {0}")]
    IO(#[from] io::Error),

    #[error("Zip error {0}")]
    Zip(#[from] ZipError),

    #[error("Rar error {0}")]
    Rar(#[from] unrar::error::UnrarError),

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(Utf8PathBuf),

    #[error("{0} has no file name")]
    NoFileName(Utf8PathBuf),

    #[error("target file already exists: {0}")]
    TargetExists(Utf8PathBuf),

    #[error("write .cbt entry failed, file: {file}, name: {name}, error: {source}")]
    CbtWrite {
        file: Utf8PathBuf,
        name: String,
        source: io::Error,
    },
}

pub type Result<T, E = Error> = result::Result<T, E>;
