#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use camino::Utf8Path;
use tracing::trace;

pub use crate::errors::{Error, Result};
pub use crate::exclude::{Excluder, DEFAULT_DENYLIST};
pub use crate::repack::{repack, repack_archive};
pub use crate::source::{open_source, ArchiveEntry, EntrySource};

pub mod errors;
pub mod exclude;
pub mod repack;
pub mod source;

/// Returns true when the lowercased extension is one of the page image
/// formats. Extension only, no content sniffing.
#[must_use]
pub fn is_image(name: &str) -> bool {
    let Some(extension) = Utf8Path::new(name).extension() else {
        return false;
    };

    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" | "png" | "webp" => true,
        "bmp" | "gif" | "tga" => {
            // Rare in the wild, worth surfacing when auditing a conversion
            trace!("uncommon page image format: {name}");
            true
        }
        _ => false,
    }
}

/// Returns true when the lowercased extension marks a comic container.
#[must_use]
pub fn is_comic(name: &str) -> bool {
    let Some(extension) = Utf8Path::new(name).extension() else {
        return false;
    };

    matches!(
        extension.to_lowercase().as_str(),
        "cbr" | "cbz" | "cbt" | "rar" | "zip" | "tar"
    )
}
