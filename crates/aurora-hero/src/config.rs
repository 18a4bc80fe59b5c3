use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use winit::dpi::LogicalSize;

use aurora_engine::device::GpuInit;
use aurora_engine::input::MovementPolicy;
use aurora_engine::shader::DEFAULT_FRAGMENT_SOURCE;
use aurora_engine::window::RuntimeConfig;

/// Settings read from the optional TOML file. Every key may be omitted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeroConfig {
    pub title: String,
    pub width: f64,
    pub height: f64,

    /// WGSL fragment stage; the built-in clouds when absent. Relative paths
    /// resolve against the config file.
    pub shader_path: Option<PathBuf>,
    pub movement: MovementSetting,

    /// `env_logger` filter; `RUST_LOG` applies when absent.
    pub log_filter: Option<String>,

    /// Linear RGBA.
    pub clear_color: [f64; 4],
    pub vsync: bool,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementSetting {
    #[default]
    ResetPerFrame,
    Accumulate,
}

impl Default for HeroConfig {
    fn default() -> Self {
        Self {
            title: "aurora".to_string(),
            width: 1280.0,
            height: 720.0,
            shader_path: None,
            movement: MovementSetting::default(),
            log_filter: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: true,
        }
    }
}

impl From<MovementSetting> for MovementPolicy {
    fn from(setting: MovementSetting) -> Self {
        match setting {
            MovementSetting::ResetPerFrame => MovementPolicy::ResetPerFrame,
            MovementSetting::Accumulate => MovementPolicy::Accumulate,
        }
    }
}

impl HeroConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        if let (Some(shader), Some(dir)) = (&config.shader_path, path.parent()) {
            if shader.is_relative() {
                config.shader_path = Some(dir.join(shader));
            }
        }
        Ok(config)
    }

    /// Reads the configured fragment source.
    pub fn fragment_source(&self) -> Result<String> {
        match &self.shader_path {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read shader {}", path.display())),
            None => Ok(DEFAULT_FRAGMENT_SOURCE.to_string()),
        }
    }

    pub fn runtime_config(&self, fragment_source: String) -> RuntimeConfig {
        let [r, g, b, a] = self.clear_color;
        RuntimeConfig {
            title: self.title.clone(),
            initial_size: LogicalSize::new(self.width, self.height),
            fragment_source,
            movement_policy: self.movement.into(),
            clear_color: wgpu::Color { r, g, b, a },
        }
    }

    pub fn gpu_init(&self) -> GpuInit {
        let present_mode = if self.vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        GpuInit {
            present_mode,
            ..GpuInit::default()
        }
    }
}
