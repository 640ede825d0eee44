// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Per-file processing: match, classify, relocate

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::classifier::Classifier;
use crate::matcher::ScreenshotFile;
use crate::relocator::Relocator;
use crate::Result;

/// What happened to a queued path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not a screenshot, or no longer there, left alone
    Skipped,
    /// Moved to its new location
    Relocated(PathBuf),
}

/// Work performed for every queued path
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    async fn process(&self, path: &Path) -> Result<Outcome>;
}

/// The screenshot pipeline
pub struct Pipeline {
    classifier: Classifier,
    relocator: Relocator,
}

impl Pipeline {
    pub fn new(classifier: Classifier, relocator: Relocator) -> Self {
        Self { classifier, relocator }
    }
}

#[async_trait]
impl Processor for Pipeline {
    async fn process(&self, path: &Path) -> Result<Outcome> {
        let Some(file) = ScreenshotFile::from_path(path) else {
            debug!("Not a screenshot, skipping: {:?}", path);
            return Ok(Outcome::Skipped);
        };

        // Queued twice, e.g. by the startup scan and the watcher
        if !tokio::fs::try_exists(&file.path).await.unwrap_or(false) {
            debug!("Already gone, skipping: {:?}", path);
            return Ok(Outcome::Skipped);
        }

        let classification = self.classifier.classify(&file.path).await;
        let new_path = self.relocator.relocate(&file, &classification).await?;

        Ok(Outcome::Relocated(new_path))
    }
}
