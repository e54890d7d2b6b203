use std::{fs, path::Path};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Billing runs are batch jobs, so nothing is
/// served; the rendering is written out with [`write_textfile`] at the end.
pub fn init() -> Result<()> {
    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus metrics recorder")?;

    // Ignore error if the handle was already set; this should only be called once.
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

/// Write the current metrics in text exposition format for the node_exporter
/// textfile collector.
pub fn write_textfile(path: &Path) -> Result<()> {
    let Some(handle) = PROM_HANDLE.get() else {
        anyhow::bail!("Prometheus recorder not initialized");
    };

    let temp_path = path.with_extension("prom.tmp");
    fs::write(&temp_path, handle.render()).with_context(|| format!("writing {}", temp_path.display()))?;
    fs::rename(&temp_path, path).with_context(|| format!("replacing {}", path.display()))?;
    tracing::debug!(path = %path.display(), "metrics written");
    Ok(())
}
