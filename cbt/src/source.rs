use std::fs::File;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use time::{Date, Month, PrimitiveDateTime, Time};
use tracing::error;
use unrar::{Archive, CursorBeforeHeader, OpenArchive, Process};
use zip::ZipArchive;

use crate::errors::{Error, Result};

/// One item pulled out of a source container. Lives for a single iteration
/// step of the repack loop and is never stored beyond it.
#[derive(Debug)]
pub struct ArchiveEntry {
    /// Base filename, any leading path stripped.
    pub name: String,
    /// Modification time in unix seconds, `None` when the container did not
    /// record a usable timestamp.
    pub mod_time: Option<i64>,
    pub content: Vec<u8>,
    /// Some backends never emit directory entries; consumers must treat
    /// "all entries are files" as valid.
    pub is_directory: bool,
}

/// Sequential entry source over an archive container. Entries come back in
/// container order, which the junk classifier's lookback window depends on.
pub trait EntrySource {
    /// Pulls the next entry, or `None` at end of archive.
    ///
    /// # Errors
    ///
    /// Fails when the container itself is corrupt or unreadable; a failure
    /// to read one entry's content is handled per implementation (see
    /// `ZipEntrySource` and `RarEntrySource`).
    fn next_entry(&mut self) -> Result<Option<ArchiveEntry>>;
}

/// Opens the entry source matching the path's container extension.
///
/// # Errors
///
/// Fails when the extension is not a supported comic container or the
/// archive cannot be opened.
pub fn open_source(path: &Utf8Path) -> Result<Box<dyn EntrySource>> {
    let extension = path
        .extension()
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "cbz" | "zip" => Ok(Box::new(ZipEntrySource::open(path)?)),
        "cbr" | "rar" => Ok(Box::new(RarEntrySource::open(path)?)),
        _ => Err(Error::UnsupportedFormat(path.to_owned())),
    }
}

/// ZIP-backed source, also used for `.cbz`. Iterates by index, which
/// follows the central directory and therefore the container order.
pub struct ZipEntrySource {
    archive: ZipArchive<File>,
    index: usize,
    path: Utf8PathBuf,
}

impl ZipEntrySource {
    /// # Errors
    ///
    /// Fails when the file cannot be opened or is not a valid zip archive.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)?;

        Ok(Self {
            archive,
            index: 0,
            path: path.to_owned(),
        })
    }
}

impl EntrySource for ZipEntrySource {
    fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        // A single unreadable entry is logged and skipped; the rest of the
        // archive is still worth converting.
        while self.index < self.archive.len() {
            let index = self.index;
            self.index += 1;

            let mut file = match self.archive.by_index(index) {
                Ok(file) => file,
                Err(err) => {
                    error!("read entry {index} failed in {}, error: {err}", self.path);
                    continue;
                }
            };

            let name = base_name(file.name());
            let is_directory = file.is_dir();
            let mod_time = file
                .last_modified()
                .to_time()
                .ok()
                .map(time::OffsetDateTime::unix_timestamp);

            let mut content = Vec::new();
            if !is_directory {
                if let Err(err) = file.read_to_end(&mut content) {
                    error!("read file {name} failed in {}, error: {err}", self.path);
                    continue;
                }
            }

            return Ok(Some(ArchiveEntry {
                name,
                mod_time,
                content,
                is_directory,
            }));
        }

        Ok(None)
    }
}

/// RAR-backed source, also used for `.cbr`. The unrar processing cursor is
/// consumed by each read, so a failed content read ends the whole archive;
/// the stream cannot be resumed past it.
pub struct RarEntrySource {
    archive: Option<OpenArchive<Process, CursorBeforeHeader>>,
}

impl RarEntrySource {
    /// # Errors
    ///
    /// Fails when the archive cannot be opened for processing.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let archive = Archive::new(path.as_std_path()).open_for_processing()?;

        Ok(Self {
            archive: Some(archive),
        })
    }
}

impl EntrySource for RarEntrySource {
    fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        let Some(archive) = self.archive.take() else {
            return Ok(None);
        };

        let Some(cursor) = archive.read_header()? else {
            return Ok(None);
        };

        let header = cursor.entry();
        let name = base_name(&header.filename.to_string_lossy());
        let mod_time = dos_time_to_unix(header.file_time);
        let is_directory = header.is_directory();

        if is_directory {
            self.archive = Some(cursor.skip()?);

            return Ok(Some(ArchiveEntry {
                name,
                mod_time,
                content: Vec::new(),
                is_directory,
            }));
        }

        let (content, rest) = cursor.read()?;
        self.archive = Some(rest);

        Ok(Some(ArchiveEntry {
            name,
            mod_time,
            content,
            is_directory,
        }))
    }
}

fn base_name(name: &str) -> String {
    Utf8Path::new(name)
        .file_name()
        .unwrap_or(name)
        .to_string()
}

/// Decodes the MS-DOS date/time field carried by rar headers.
fn dos_time_to_unix(dos: u32) -> Option<i64> {
    if dos == 0 {
        return None;
    }

    let year = 1980 + i32::try_from((dos >> 25) & 0x7f).ok()?;
    let month = Month::try_from(u8::try_from((dos >> 21) & 0x0f).ok()?).ok()?;
    let day = u8::try_from((dos >> 16) & 0x1f).ok()?;
    let hour = u8::try_from((dos >> 11) & 0x1f).ok()?;
    let minute = u8::try_from((dos >> 5) & 0x3f).ok()?;
    let second = u8::try_from((dos & 0x1f) * 2).ok()?;

    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;

    Some(PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp())
}
