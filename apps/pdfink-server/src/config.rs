//! Optional TOML configuration for the server
//!
//! Only render defaults live here; network settings come from the command
//! line.
//!
//! ```toml
//! [render]
//! fault_policy = "skip"
//! compress_images = true
//! preview_zoom = 2.0
//! ```

use std::fs;
use std::path::Path;

use anyhow::Context;
use pdfink_core::RenderOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Defaults for every render; requests may override the fault policy
    pub render: RenderOptions,
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        let zoom = config.render.preview_zoom;
        if !zoom.is_finite() || zoom <= 0.0 {
            anyhow::bail!(
                "render.preview_zoom must be a positive number (got {})",
                zoom
            );
        }
        Ok(config)
    }
}
