// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Recognition of macOS default screenshot filenames
//!
//! Only names like `Screenshot 2024-03-05 at 10.15.42 PM.png` are picked up.
//! Other locales and naming schemes are ignored.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn screenshot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^Screenshot [0-9]{4}-[0-9]{2}-[0-9]{2}",
            r" at [0-9]{1,2}\.[0-9]{2}\.[0-9]{2}\s(?:AM|PM)\.png$",
        ))
        .expect("screenshot pattern is valid")
    })
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]{4})-([0-9]{2})-([0-9]{2})").expect("date pattern is valid")
    })
}

/// Check if a filename follows the default screenshot naming convention
pub fn is_screenshot_name(name: &str) -> bool {
    screenshot_pattern().is_match(name)
}

/// Capture date as `YYMMDD`, or an empty string if the name carries no date
pub fn extract_date(name: &str) -> String {
    match date_pattern().captures(name) {
        Some(caps) => format!("{}{}{}", &caps[1][2..], &caps[2], &caps[3]),
        None => String::new(),
    }
}

/// A discovered screenshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotFile {
    pub path: PathBuf,
    /// Full filename, e.g. `Screenshot 2024-03-05 at 10.15.42 PM.png`
    pub file_name: String,
    /// Filename without extension
    pub stem: String,
    /// Extension including the leading dot, or empty
    pub extension: String,
    /// `YYMMDD`, possibly empty
    pub capture_date: String,
}

impl ScreenshotFile {
    /// Returns `None` when the path is not a recognised screenshot
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if !is_screenshot_name(file_name) {
            return None;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        Some(Self {
            path: path.to_path_buf(),
            file_name: file_name.to_string(),
            stem,
            extension,
            capture_date: extract_date(file_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_default_names() {
        assert!(is_screenshot_name("Screenshot 2024-03-05 at 10.15.42 PM.png"));
        assert!(is_screenshot_name("Screenshot 2024-03-05 at 9.05.01 AM.png"));
        // Recent macOS puts a narrow no-break space before the meridiem
        assert!(is_screenshot_name("Screenshot 2024-03-05 at 9.05.01\u{202f}AM.png"));
    }

    #[test]
    fn test_rejects_deviations() {
        let rejected = [
            "Screenshot 2024-03-05 10.15.42 PM.png",
            "Screenshot 2024-03-05 at 10.15.42.png",
            "Screenshot 2024-03-05 at 10.15.42 PM.jpg",
            "Screenshot 2024-3-5 at 10.15.42 PM.png",
            "Screenshot 2024-03-05 at 10:15:42 PM.png",
            "Screen Shot 2024-03-05 at 10.15.42 PM.png",
            "Screenshot 2024-03-05 at 10.15.42 PM.png.part",
            ".Screenshot 2024-03-05 at 10.15.42 PM.png",
            "240305-terminal.png",
            "",
        ];
        for name in rejected {
            assert!(!is_screenshot_name(name), "{name:?} should not match");
        }
    }

    #[test]
    fn test_extract_date() {
        assert_eq!(extract_date("Screenshot 2024-03-05 at 10.15.42 PM.png"), "240305");
        assert_eq!(extract_date("Screenshot 1999-12-31 at 1.00.00 AM.png"), "991231");
        assert_eq!(extract_date("no date here.png"), "");
    }

    #[test]
    fn test_screenshot_file_attributes() {
        let path = Path::new("/Users/me/Desktop/Screenshot 2024-03-05 at 10.15.42 AM.png");
        let file = ScreenshotFile::from_path(path).unwrap();

        assert_eq!(file.file_name, "Screenshot 2024-03-05 at 10.15.42 AM.png");
        assert_eq!(file.stem, "Screenshot 2024-03-05 at 10.15.42 AM");
        assert_eq!(file.extension, ".png");
        assert_eq!(file.capture_date, "240305");

        assert!(ScreenshotFile::from_path(Path::new("/Users/me/Desktop/notes.txt")).is_none());
    }
}
