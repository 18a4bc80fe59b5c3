mod config;

use std::path::PathBuf;

use anyhow::Result;

use aurora_engine::logging::{init_logging, LoggingConfig};
use aurora_engine::window::Runtime;

use config::HeroConfig;

/// Config path from the first argument, else `AURORA_CONFIG`.
fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("AURORA_CONFIG"))
        .map(PathBuf::from)
}

fn main() -> Result<()> {
    let config = match config_path() {
        Some(path) => HeroConfig::load(&path)?,
        None => HeroConfig::default(),
    };

    init_logging(LoggingConfig {
        env_filter: config.log_filter.clone(),
        ..LoggingConfig::default()
    });

    let fragment_source = config.fragment_source()?;
    if let Some(path) = &config.shader_path {
        log::info!("using fragment shader {}", path.display());
    }

    Runtime::run(config.runtime_config(fragment_source), config.gpu_init())
}
