//! Results of past billing runs, keyed by report file name.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::invoice::InvoiceSummary;

#[derive(Debug)]
pub struct ResultsLedger {
    path: PathBuf,
    entries: BTreeMap<String, InvoiceSummary>,
}

/// What `record` did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerUpdate {
    Added,
    Unchanged,
    /// An earlier run for the same report produced different figures.
    Changed,
}

impl ResultsLedger {
    /// Load the ledger at `path`, or start an empty one if it does not exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, report_file_name: &str) -> Option<&InvoiceSummary> {
        self.entries.get(report_file_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, summary: InvoiceSummary) -> LedgerUpdate {
        let update = match self.entries.get(&summary.report_file_name) {
            None => LedgerUpdate::Added,
            Some(prev) if prev.fingerprint == summary.fingerprint => LedgerUpdate::Unchanged,
            Some(prev) => {
                tracing::warn!(
                    report = %summary.report_file_name,
                    previous_volume = prev.volume,
                    volume = summary.volume,
                    "billing figures differ from an earlier run"
                );
                LedgerUpdate::Changed
            }
        };
        self.entries.insert(summary.report_file_name.clone(), summary);
        update
    }

    /// Write the ledger atomically (temp file + rename).
    pub fn save(&self) -> Result<()> {
        let temp_path = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(&self.entries)?;

        fs::write(&temp_path, content).with_context(|| format!("writing {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path).with_context(|| format!("replacing {}", self.path.display()))?;

        Ok(())
    }
}
