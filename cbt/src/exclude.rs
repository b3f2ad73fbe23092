use camino::Utf8Path;
use tracing::debug;

/// Junk filenames and release-group signatures observed in scanned comic
/// archives. Matched as lowercased substrings of the entry name.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "zzz-nahga-empire.jpg",
    "page.jpg",
    "page (newcomic.org).jpg",
    "zzz LDK6 zzz",
    "zzz K6 V1 zzz",
    "z_pitt",
    "zzZone2",
    "zSoU-Nerd",
    "zzzDQzzz",
    "zWater",
    "zzzNeverAngel-Empire",
];

/// Two consecutive pages from the same release are never this far apart.
const MAX_MOD_TIME_GAP_SECONDS: i64 = 20 * 24 * 3600;

/// Legitimate pages are numbered, so their stems carry at least this many
/// decimal digits.
const MIN_STEM_DIGITS: usize = 2;

/// Heuristic junk-page classifier.
///
/// Owns its denylist and the sensitivity flag so both can be swapped out in
/// tests; there is no process-global state. Decisions depend only on the
/// candidate name and timestamp plus the lookback pair supplied by the
/// caller, which must reflect the last *accepted* entry.
#[derive(Debug, Clone)]
pub struct Excluder {
    denylist: Vec<String>,
    exclude_off: bool,
}

impl Default for Excluder {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Excluder {
    #[must_use]
    pub fn new(exclude_off: bool) -> Self {
        Self::with_denylist(DEFAULT_DENYLIST.iter().copied(), exclude_off)
    }

    #[must_use]
    pub fn with_denylist<I, S>(denylist: I, exclude_off: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            denylist: denylist
                .into_iter()
                .map(|junk| junk.as_ref().to_lowercase())
                .collect(),
            exclude_off,
        }
    }

    /// Returns true when the entry should be dropped from the output
    /// archive. Rules are checked in order, first match wins; the
    /// thresholds are tuned against real scanned releases.
    #[must_use]
    pub fn is_excluded(
        &self,
        name: &str,
        previous_name: &str,
        mod_time: Option<i64>,
        previous_time: Option<i64>,
    ) -> bool {
        let stem = Utf8Path::new(name).file_stem().unwrap_or(name);
        let lowered = name.to_lowercase();
        let lowered_stem = Utf8Path::new(&lowered).file_stem().unwrap_or(&lowered);

        // Known junk-naming conventions from release groups.
        if lowered.starts_with("zz")
            || lowered.starts_with("z_")
            || lowered.starts_with("xxxx")
            || lowered_stem.ends_with("tag")
        {
            return true;
        }

        if self.denylist.iter().any(|junk| lowered.contains(junk)) {
            return true;
        }

        if !self.exclude_off {
            let digits = stem.bytes().filter(u8::is_ascii_digit).count();
            if digits < MIN_STEM_DIGITS {
                return true;
            }
        }

        // Nothing accepted yet, nothing to compare against.
        let Some(previous_time) = previous_time else {
            return false;
        };

        if let Some(mod_time) = mod_time {
            if (mod_time - previous_time).abs() > MAX_MOD_TIME_GAP_SECONDS {
                debug!("modification time gap over 20 days: {name}");
                return true;
            }
        }

        if previous_name.is_empty() {
            return false;
        }

        // Sequential pages have near-identical filename lengths.
        let length_delta = name.len().abs_diff(previous_name.len());
        if length_delta < 2 {
            return false;
        }
        if length_delta > 5 {
            return true;
        }

        let stem = stem.as_bytes();
        if stem.len() >= 2 {
            let last = stem[stem.len() - 1];
            let second_last = stem[stem.len() - 2];
            // A digit in one of the last two stem characters marks a numbered
            // page. The length guard deliberately binds to the second check
            // only.
            if last.is_ascii_digit() || (second_last.is_ascii_digit() && length_delta < 7) {
                return false;
            }
        }

        false
    }
}
