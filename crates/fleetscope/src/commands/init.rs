use std::path::Path;

use anyhow::bail;
use fleetscope_core::ScopeConfig;

pub fn init(path: &Path, manifest: &str) -> anyhow::Result<()> {
    let output = path.join("fleetscope.toml");
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    let config = ScopeConfig::scaffold(manifest);
    std::fs::write(&output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
