pub mod defaults;
pub mod types;

use anyhow::{Context, Result};
use std::path::Path;

pub use types::{Config, DomainGroup, GroupPolicy, LogConfig};

/// 读取 YAML 配置；未给出路径时使用内置默认值
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    // 空文件等价于全部使用默认值
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yml::from_str(content)?)
}
