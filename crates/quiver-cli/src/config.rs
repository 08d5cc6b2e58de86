//! Configuration loading and validation

use anyhow::{Context, Result};
use glam::{DQuat, DVec3, EulerRot};
use quiver_core::{FrameTree, Isometry, Stamp};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default, rename = "frame")]
    pub frames: Vec<FrameConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Frame all arrows are drawn in
    #[serde(default = "default_fixed_frame")]
    pub fixed_frame: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fixed_frame: default_fixed_frame(),
        }
    }
}

fn default_fixed_frame() -> String {
    "map".to_string()
}

/// One parent link of the frame tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    pub name: String,
    pub parent: String,
    /// Offset of the frame origin in the parent, meters
    #[serde(default)]
    pub translation: [f64; 3],
    /// Orientation quaternion (x, y, z, w); takes precedence over `rpy`
    #[serde(default)]
    pub rotation: Option<[f64; 4]>,
    /// Orientation as roll, pitch, yaw in radians
    #[serde(default)]
    pub rpy: Option<[f64; 3]>,
    /// Time the link becomes valid, seconds; omitted for static links
    #[serde(default)]
    pub stamp: Option<f64>,
}

impl FrameConfig {
    pub fn isometry(&self) -> Isometry {
        let rotation = match (self.rotation, self.rpy) {
            (Some([x, y, z, w]), _) => DQuat::from_xyzw(x, y, z, w),
            (None, Some([roll, pitch, yaw])) => DQuat::from_euler(EulerRot::ZYX, yaw, pitch, roll),
            (None, None) => DQuat::IDENTITY,
        };
        Isometry::new(DVec3::from_array(self.translation), rotation)
    }

    pub fn stamp(&self) -> Stamp {
        self.stamp.map(Stamp::from_secs_f64).unwrap_or(Stamp::ZERO)
    }
}

impl Config {
    /// Build the frame tree described by the `[[frame]]` entries
    pub fn to_frame_tree(&self) -> Result<FrameTree> {
        let mut tree = FrameTree::new();
        for frame in &self.frames {
            if let Some([x, y, z, w]) = frame.rotation {
                if x == 0.0 && y == 0.0 && z == 0.0 && w == 0.0 {
                    anyhow::bail!("Frame [{}] has a zero rotation quaternion", frame.name);
                }
            }
            tree.set_transform(&frame.name, &frame.parent, frame.stamp(), frame.isometry())
                .with_context(|| format!("Invalid frame entry [{}]", frame.name))?;
        }
        Ok(tree)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), frames = config.frames.len(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        display: DisplayConfig::default(),
        frames: vec![
            FrameConfig {
                name: "odom".to_string(),
                parent: "map".to_string(),
                translation: [0.0, 0.0, 0.0],
                rotation: None,
                rpy: None,
                stamp: None,
            },
            FrameConfig {
                name: "base_link".to_string(),
                parent: "odom".to_string(),
                translation: [1.0, 0.5, 0.0],
                rotation: None,
                rpy: Some([0.0, 0.0, std::f64::consts::FRAC_PI_2]),
                stamp: None,
            },
        ],
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::PointTransformer;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("quiver.toml")).unwrap();
        assert_eq!(config.display.fixed_frame, "map");
        assert!(config.frames.is_empty());
    }

    #[test]
    fn test_default_config_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("quiver.toml");
        save_default_config(&path).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.frames.len(), 2);

        let tree = config.to_frame_tree().unwrap();
        let p = tree
            .transform_point("map", "base_link", Stamp::ZERO, DVec3::X)
            .unwrap();
        assert!(p.abs_diff_eq(DVec3::new(1.0, 1.5, 0.0), 1e-9));
    }

    #[test]
    fn test_parse_frames() {
        let config: Config = toml::from_str(
            r#"
[display]
fixed_frame = "odom"

[[frame]]
name = "camera"
parent = "odom"
translation = [0.0, 0.0, 1.0]
rotation = [0.0, 0.0, 0.0, 1.0]
stamp = 12.5
"#,
        )
        .unwrap();

        assert_eq!(config.display.fixed_frame, "odom");
        let frame = &config.frames[0];
        assert_eq!(frame.stamp(), Stamp::new(12, 500_000_000));
        assert_eq!(frame.isometry().translation, DVec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_zero_rotation_rejected() {
        let config: Config = toml::from_str(
            r#"
[[frame]]
name = "camera"
parent = "odom"
rotation = [0.0, 0.0, 0.0, 0.0]
"#,
        )
        .unwrap();
        assert!(config.to_frame_tree().is_err());
    }

    #[test]
    fn test_self_parent_rejected() {
        let config: Config = toml::from_str(
            r#"
[[frame]]
name = "odom"
parent = "odom"
"#,
        )
        .unwrap();
        let err = config.to_frame_tree().unwrap_err();
        assert!(err.to_string().contains("odom"));
    }
}
