use crate::data::AppSettings;
use anyhow::Result;

/// Writes the default settings to config.yaml in the data directory.
pub fn run() -> Result<()> {
    let dir = crate::data::persistence::get_data_dir()?;
    AppSettings::default().save()?;
    println!("Settings written to {}", dir.join("config.yaml").display());
    Ok(())
}
