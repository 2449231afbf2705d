use std::path::PathBuf;

use fulfil_engine::EngineConfig;

pub fn show(config: &EngineConfig) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

pub fn init(path: Option<PathBuf>) -> anyhow::Result<()> {
    EngineConfig::default().save(path)?;
    Ok(())
}
