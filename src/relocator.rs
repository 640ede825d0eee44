// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Backup and collision-safe relocation of classified screenshots

use std::path::{Path, PathBuf};
use tracing::info;

use crate::classifier::ClassificationResult;
use crate::config::{Categories, Settings};
use crate::matcher::ScreenshotFile;
use crate::{Result, ShotsortError};

/// Name of the backup folder inside the output directory
pub const ORIGINALS_DIR: &str = "original";

/// Moves screenshots into the output tree
pub struct Relocator {
    out_dir: PathBuf,
    originals_dir: PathBuf,
    categories: Vec<String>,
}

impl Relocator {
    pub fn new(out_dir: &Path, categories: &Categories) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            originals_dir: out_dir.join(ORIGINALS_DIR),
            categories: categories.keys().cloned().collect(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.out_dir, &settings.categories)
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn originals_dir(&self) -> &Path {
        &self.originals_dir
    }

    /// Create the output folder, one folder per category and the backup folder
    pub fn prepare(&self) -> Result<()> {
        let dirs = std::iter::once(self.out_dir.clone())
            .chain(self.categories.iter().map(|c| self.out_dir.join(c)))
            .chain(std::iter::once(self.originals_dir.clone()));

        for dir in dirs {
            if !dir.is_dir() {
                std::fs::create_dir_all(&dir)?;
                info!("Created folder: {:?}", dir);
            }
        }

        Ok(())
    }

    /// Where a classified screenshot should go, before collision handling
    pub fn destination(
        &self,
        file: &ScreenshotFile,
        classification: &ClassificationResult,
    ) -> PathBuf {
        let dir = match classification.category.as_deref() {
            Some(category) if !category.is_empty() && self.is_category(category) => {
                self.out_dir.join(category)
            }
            _ => self.out_dir.clone(),
        };

        dir.join(format!(
            "{}-{}{}",
            file.capture_date, classification.filename, file.extension
        ))
    }

    fn is_category(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c == name)
    }

    /// Copy the untouched screenshot into the backup folder
    ///
    /// A backup with the same name is replaced.
    pub async fn backup(&self, file: &ScreenshotFile) -> Result<PathBuf> {
        let target = self.originals_dir.join(&file.file_name);
        tokio::fs::copy(&file.path, &target).await?;
        Ok(target)
    }

    /// Back up, then move the screenshot to its final, non-clobbering path
    pub async fn relocate(
        &self,
        file: &ScreenshotFile,
        classification: &ClassificationResult,
    ) -> Result<PathBuf> {
        self.backup(file).await.map_err(|e| {
            ShotsortError::Relocation(format!("Error backing up {:?}: {}", file.path, e))
        })?;

        let target = unique_path(&self.destination(file, classification), false);

        match tokio::fs::rename(&file.path, &target).await {
            Ok(()) => {
                info!("File renamed to {:?}", target);
                Ok(target)
            }
            Err(e) => Err(ShotsortError::Relocation(format!(
                "Error renaming {:?} to {:?}: {}",
                file.path, target, e
            ))),
        }
    }
}

/// First free path among `name.ext`, `name-1.ext`, `name-2.ext`, ...
///
/// With `overwrite` the path is returned unchanged. The probe has no upper
/// bound.
pub fn unique_path(path: &Path, overwrite: bool) -> PathBuf {
    if overwrite || !path.exists() {
        return path.to_path_buf();
    }

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut count: u64 = 0;
    loop {
        count += 1;
        let candidate = dir.join(format!("{}-{}{}", stem, count, ext));
        if !candidate.exists() {
            return candidate;
        }
    }
}
