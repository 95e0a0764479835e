// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Renderer configuration, loadable from JSON.

use crate::math::Extent2D;
use crate::renderer::TextureFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// How the runtime orders submissions that target different queue kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueSubmission {
    /// Wait for the previous batch's fence before switching queue kind.
    #[default]
    Serialized,
    /// Submit every batch immediately; passes synchronise themselves.
    Unordered,
}

/// Global settings for the render graph runtime.
///
/// Every field is optional in the serialized form and falls back to
/// [`RendererConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Initial size of the backbuffer.
    pub backbuffer: Extent2D,
    /// Format of the backbuffer.
    pub backbuffer_format: TextureFormat,
    /// If `true`, transients whose lifetimes do not overlap share backend objects within a frame.
    pub alias_transients: bool,
    /// Number of frames a pooled transient may stay unused before it is destroyed.
    ///
    /// Zero is valid: an object is then destroyed at the end of the first
    /// frame that does not use it, after the work that did use it completed.
    pub transient_max_idle_frames: u32,
    /// Cross-queue submission policy.
    pub queue_submission: QueueSubmission,
    /// Upper bound for any fence wait performed by the runtime. `None` waits forever.
    pub fence_timeout_ms: Option<u64>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backbuffer: Extent2D::new(1280, 720),
            backbuffer_format: TextureFormat::Bgra8UnormSrgb,
            alias_transients: true,
            transient_max_idle_frames: 3,
            queue_submission: QueueSubmission::Serialized,
            fence_timeout_ms: None,
        }
    }
}

impl RendererConfig {
    /// Parses a configuration from a JSON string and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&text)
    }

    /// Checks the configuration for values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backbuffer.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "backbuffer must be non-empty, got {}",
                self.backbuffer
            )));
        }
        if self.backbuffer_format.is_depth() {
            return Err(ConfigError::Invalid(
                "backbuffer_format must be a color format".to_string(),
            ));
        }
        Ok(())
    }

    /// The fence timeout as a [`Duration`], if one is configured.
    pub fn fence_timeout(&self) -> Option<Duration> {
        self.fence_timeout_ms.map(Duration::from_millis)
    }
}

/// An error raised while loading a [`RendererConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The contents were not valid JSON for the configuration.
    Parse(serde_json::Error),
    /// The configuration parsed but holds unusable values.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read renderer config: {e}"),
            ConfigError::Parse(e) => write!(f, "Failed to parse renderer config: {e}"),
            ConfigError::Invalid(msg) => write!(f, "Invalid renderer config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = RendererConfig::from_json_str(r#"{ "alias_transients": false }"#)
            .expect("valid config");
        assert!(!config.alias_transients);
        assert_eq!(config.backbuffer, RendererConfig::default().backbuffer);
        assert_eq!(config.queue_submission, QueueSubmission::Serialized);
        assert_eq!(config.fence_timeout(), None);
    }

    #[test]
    fn full_config_parses() {
        let json = r#"{
            "backbuffer": { "width": 800, "height": 600 },
            "backbuffer_format": "rgba8_unorm",
            "transient_max_idle_frames": 1,
            "queue_submission": "unordered",
            "fence_timeout_ms": 250
        }"#;
        let config = RendererConfig::from_json_str(json).expect("valid config");
        assert_eq!(config.backbuffer, Extent2D::new(800, 600));
        assert_eq!(config.backbuffer_format, TextureFormat::Rgba8Unorm);
        assert_eq!(config.queue_submission, QueueSubmission::Unordered);
        assert_eq!(config.fence_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn zero_sized_backbuffer_is_rejected() {
        let err = RendererConfig::from_json_str(r#"{ "backbuffer": { "width": 0, "height": 600 } }"#)
            .expect_err("empty backbuffer");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_idle_frames_is_accepted() {
        let config = RendererConfig::from_json_str(r#"{ "transient_max_idle_frames": 0 }"#)
            .expect("valid config");
        assert_eq!(config.transient_max_idle_frames, 0);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = RendererConfig::from_json_str("{ not json").expect_err("bad json");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RendererConfig::load("/nonexistent/ember/renderer.json").expect_err("no file");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
