use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "invoice_form=debug";

/// Installs a plain-text tracing subscriber that appends to `path`.
/// The terminal belongs to the form, so logs never go to stdout or stderr.
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_tracing_unwritable_path_errors() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("no_such_dir").join("form.log");
        let err = init_tracing(&missing).unwrap_err();
        assert!(err.to_string().contains("failed to open log file"));
    }
}
