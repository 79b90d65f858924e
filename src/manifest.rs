//! Manifest Builder
//!
//! Enumerates `<root>/<year>/<month>/<day>/<symbol-file>` into a day-ordered
//! file manifest. Only directory listings are read, never file contents.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::IngestError;

/// Day identifier → files for that day, ascending by day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayManifest {
    days: BTreeMap<String, Vec<PathBuf>>,
}

impl DayManifest {
    /// Scan `<root>/<year>/<month>`.
    ///
    /// Every subdirectory of the month is a day. A day's files are its plain
    /// files plus the files inside any symbol subdirectory, sorted by path.
    pub fn scan(root: impl AsRef<Path>, year: &str, month: &str) -> Result<Self, IngestError> {
        let month_path = root.as_ref().join(year).join(month);
        if !month_path.is_dir() {
            return Err(IngestError::DirectoryNotFound(month_path));
        }

        let mut days = BTreeMap::new();
        for entry in list_dir(&month_path)? {
            if !entry.is_dir() {
                debug!("skipping non-directory {}", entry.display());
                continue;
            }
            let Some(day) = entry.file_name().and_then(|n| n.to_str()) else {
                debug!("skipping non-UTF-8 day directory {}", entry.display());
                continue;
            };
            let day = day.to_string();

            let mut files = Vec::new();
            for item in list_dir(&entry)? {
                if item.is_dir() {
                    files.extend(list_dir(&item)?.into_iter().filter(|p| p.is_file()));
                } else if item.is_file() {
                    files.push(item);
                }
            }
            files.sort();

            debug!("day {}: {} files", day, files.len());
            days.insert(day, files);
        }

        Ok(Self { days })
    }

    /// Build directly from a map, mostly for tests and replays.
    pub fn from_days(days: BTreeMap<String, Vec<PathBuf>>) -> Self {
        Self { days }
    }

    /// Keep only the listed days. Unknown days are ignored.
    pub fn retain_days(&mut self, wanted: &[String]) {
        self.days.retain(|day, _| wanted.iter().any(|w| w == day));
    }

    pub fn days(&self) -> impl Iterator<Item = &str> {
        self.days.keys().map(String::as_str)
    }

    pub fn files(&self, day: &str) -> Option<&[PathBuf]> {
        self.days.get(day).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.days.iter().map(|(d, f)| (d.as_str(), f.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_files(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }
}

/// Directory entries, dot-files excluded.
fn list_dir(path: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let scan_err = |source| IngestError::Scan {
        path: path.to_path_buf(),
        source,
    };

    let mut out = Vec::new();
    for entry in fs::read_dir(path).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        out.push(entry.path());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "header\n").unwrap();
    }

    #[test]
    fn test_missing_month_is_directory_not_found() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("2016")).unwrap();

        let err = DayManifest::scan(dir.path(), "2016", "04").unwrap_err();
        assert!(matches!(err, IngestError::DirectoryNotFound(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_days_ordered_and_files_collected() {
        let dir = TempDir::new().unwrap();
        let month = dir.path().join("2016").join("04");
        touch(&month.join("05").join("sz000002.csv"));
        touch(&month.join("01").join("sh600000.csv"));
        touch(&month.join("01").join("sh000003.csv"));
        touch(&month.join("12").join("sz000001").join("part1.csv"));
        fs::create_dir_all(month.join("20")).unwrap();
        touch(&month.join("notes.txt"));
        touch(&month.join("01").join(".DS_Store"));

        let manifest = DayManifest::scan(dir.path(), "2016", "04").unwrap();

        assert_eq!(manifest.days().collect::<Vec<_>>(), vec!["01", "05", "12", "20"]);
        assert_eq!(manifest.total_files(), 4);

        let day1 = manifest.files("01").unwrap();
        assert_eq!(
            day1,
            &[month.join("01").join("sh000003.csv"), month.join("01").join("sh600000.csv")]
        );
        assert_eq!(
            manifest.files("12").unwrap(),
            &[month.join("12").join("sz000001").join("part1.csv")]
        );
        assert!(manifest.files("20").unwrap().is_empty());
    }

    #[test]
    fn test_retain_days() {
        let dir = TempDir::new().unwrap();
        let month = dir.path().join("2016").join("04");
        touch(&month.join("01").join("a.csv"));
        touch(&month.join("02").join("b.csv"));

        let mut manifest = DayManifest::scan(dir.path(), "2016", "04").unwrap();
        manifest.retain_days(&["02".to_string(), "31".to_string()]);

        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.days().next(), Some("02"));
    }
}
