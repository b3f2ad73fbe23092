use std::fs::File;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use cbt::{repack, repack_archive, Error, Excluder};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// 2023-05-01 12:00:00 UTC, the mtime written for minute offset 0.
const BASE_UNIX: u64 = 1_682_942_400;

fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

/// Builds a zip fixture; every entry gets a close, monotonically increasing
/// modification time unless a day offset is given.
fn write_zip(path: &Utf8Path, entries: &[(&str, u32)]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());

    for (name, day_offset) in entries {
        let day = u8::try_from(1 + day_offset).unwrap();
        let minute = u8::try_from(entries.iter().position(|e| e.0 == *name).unwrap()).unwrap();
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::from_date_and_time(2023, 5, day, 12, minute, 0).unwrap());

        if name.ends_with('/') {
            writer.add_directory(name.trim_end_matches('/'), options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(name.as_bytes()).unwrap();
        }
    }

    writer.finish().unwrap();
}

fn tar_names(path: &Utf8Path) -> Vec<String> {
    let mut archive = tar::Archive::new(File::open(path).unwrap());
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            entry
                .unwrap()
                .path()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

#[test]
fn junk_pages_are_filtered_into_backups() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    write_zip(
        &src,
        &[("001.jpg", 0), ("002.jpg", 0), ("ad.jpg", 0), ("003.jpg", 0)],
    );

    let target = repack(&src, &dir, &Excluder::default()).unwrap();

    assert_eq!(target, dir.join("vol1.cbt"));
    assert_eq!(tar_names(&target), ["001.jpg", "002.jpg", "003.jpg"]);

    let backup = dir.join("vol1_ad.jpg");
    assert_eq!(std::fs::read(backup).unwrap(), b"ad.jpg");
}

#[test]
fn entry_mtimes_survive_the_transcode() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    write_zip(&src, &[("001.jpg", 0)]);

    let target = repack(&src, &dir, &Excluder::default()).unwrap();

    let mut archive = tar::Archive::new(File::open(target).unwrap());
    let entry = archive.entries().unwrap().next().unwrap().unwrap();
    assert_eq!(entry.header().mtime().unwrap(), BASE_UNIX);
    assert_eq!(entry.header().mode().unwrap(), 0o666);
}

#[test]
fn nested_paths_are_flattened_and_directories_skipped() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    write_zip(
        &src,
        &[("pages/", 0), ("pages/010.jpg", 0), ("pages/011.jpg", 0)],
    );

    let target = repack(&src, &dir, &Excluder::default()).unwrap();

    assert_eq!(tar_names(&target), ["010.jpg", "011.jpg"]);
}

#[test]
fn non_images_never_reach_the_output() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    write_zip(&src, &[("info.txt", 0), ("012.jpg", 0), ("013.jpg", 0)]);

    let target = repack(&src, &dir, &Excluder::default()).unwrap();

    assert_eq!(tar_names(&target), ["012.jpg", "013.jpg"]);
    // Non-image rejections are not junk pages, no backup is written.
    assert!(!dir.join("vol1_info.txt").exists());
}

#[test]
fn large_mod_time_gap_excludes_the_later_page() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    // 29 days after the first page, well past the 20 day window.
    write_zip(&src, &[("011.jpg", 0), ("012.jpg", 29)]);

    let target = repack(&src, &dir, &Excluder::default()).unwrap();

    assert_eq!(tar_names(&target), ["011.jpg"]);
    assert!(dir.join("vol1_012.jpg").exists());
}

#[test]
fn lookback_window_tracks_only_accepted_entries() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    // The middle entry is excluded by the length rule. If the lookback
    // window advanced on it, 013.jpg would be compared against the long
    // name and rejected too.
    write_zip(
        &src,
        &[("012.jpg", 0), ("bonus-pinup-0123.jpg", 0), ("013.jpg", 0)],
    );

    let target = repack(&src, &dir, &Excluder::default()).unwrap();

    assert_eq!(tar_names(&target), ["012.jpg", "013.jpg"]);
    assert!(dir.join("vol1_bonus-pinup-0123.jpg").exists());
}

#[test]
fn backup_name_collisions_get_a_numeric_suffix() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    write_zip(&src, &[("ad.jpg", 0), ("extras/ad.jpg", 0), ("034.jpg", 0)]);

    repack(&src, &dir, &Excluder::default()).unwrap();

    assert!(dir.join("vol1_ad.jpg").exists());
    assert!(dir.join("vol1_ad.jpg.1").exists());
}

#[test]
fn keyword_junk_is_excluded_despite_digits_and_close_times() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    write_zip(&src, &[("021.jpg", 0), ("zzz-filler-022.jpg", 0), ("023.jpg", 0)]);

    let target = repack(&src, &dir, &Excluder::default()).unwrap();

    assert_eq!(tar_names(&target), ["021.jpg", "023.jpg"]);
    assert!(dir.join("vol1_zzz-filler-022.jpg").exists());
}

#[test]
fn existing_target_is_never_overwritten() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    write_zip(&src, &[("001.jpg", 0)]);
    std::fs::write(dir.join("vol1.cbt"), b"do not clobber").unwrap();

    let err = repack(&src, &dir, &Excluder::default()).unwrap_err();

    assert!(matches!(err, Error::TargetExists(_)));
    assert_eq!(std::fs::read(dir.join("vol1.cbt")).unwrap(), b"do not clobber");
}

#[test]
fn missing_source_is_a_file_level_error() {
    let (_guard, dir) = utf8_tempdir();

    let err = repack(&dir.join("nope.cbz"), &dir, &Excluder::default()).unwrap_err();

    assert!(matches!(err, Error::IO(_)));
}

#[test]
fn unsupported_container_extension_is_rejected() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.7z");
    std::fs::write(&src, b"whatever").unwrap();

    let err = repack_archive(&src, &dir.join("vol1.cbt"), &Excluder::default()).unwrap_err();

    assert!(matches!(err, Error::UnsupportedFormat(_)));
}

#[test]
fn exclude_off_keeps_low_digit_pages() {
    let (_guard, dir) = utf8_tempdir();
    let src = dir.join("vol1.cbz");
    write_zip(&src, &[("cover.jpg", 0), ("012.jpg", 0), ("013.jpg", 0)]);

    let target = repack(&src, &dir, &Excluder::new(true)).unwrap();

    assert_eq!(tar_names(&target), ["cover.jpg", "012.jpg", "013.jpg"]);
}
