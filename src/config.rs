//! Configuration file support for operator settings

use crate::error::{MeshError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the weld operator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeldSettings {
    /// Points closer than this are merged
    ///
    /// Linear Euclidean distance in position units, not squared.
    pub max_point_distance: f32,
}

impl Default for WeldSettings {
    fn default() -> Self {
        Self {
            max_point_distance: 0.001,
        }
    }
}

impl WeldSettings {
    /// Create weld settings with a custom merge distance
    pub fn new(max_point_distance: f32) -> Self {
        Self { max_point_distance }
    }
}

/// Settings for the chamfer operator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChamferSettings {
    /// Fraction of the smallest edge height around a point by which the
    /// edge planes are pushed inward
    pub bevel_ratio: f32,
}

impl Default for ChamferSettings {
    fn default() -> Self {
        Self { bevel_ratio: 0.5 }
    }
}

fn default_true() -> bool {
    true
}

/// Post-processing steps run by [`Mesh::process`](crate::mesh::Mesh::process)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessFlags {
    /// Lay out point corners, sort fans and build edges
    #[serde(default = "default_true")]
    pub build_edges: bool,

    #[serde(default = "default_true")]
    pub compute_polygon_normals: bool,

    #[serde(default = "default_true")]
    pub compute_polygon_centroids: bool,

    #[serde(default = "default_true")]
    pub compute_smooth_point_normals: bool,

    /// Planar texture coordinates for polygons lacking them
    #[serde(default = "default_true")]
    pub generate_texture_coordinates: bool,

    #[serde(default)]
    pub compute_tangents: bool,

    /// Dump the whole mesh at trace level
    #[serde(default)]
    pub debug_trace: bool,
}

impl Default for ProcessFlags {
    fn default() -> Self {
        Self {
            build_edges: true,
            compute_polygon_normals: true,
            compute_polygon_centroids: true,
            compute_smooth_point_normals: true,
            generate_texture_coordinates: true,
            compute_tangents: false,
            debug_trace: false,
        }
    }
}

impl ProcessFlags {
    /// Every step enabled, tracing excluded
    pub fn all() -> Self {
        Self {
            compute_tangents: true,
            ..Self::default()
        }
    }

    /// Only connectivity
    pub fn connectivity_only() -> Self {
        Self {
            build_edges: true,
            compute_polygon_normals: false,
            compute_polygon_centroids: false,
            compute_smooth_point_normals: false,
            generate_texture_coordinates: false,
            compute_tangents: false,
            debug_trace: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    #[serde(default)]
    pub weld: WeldSettings,

    #[serde(default)]
    pub chamfer: ChamferSettings,

    /// Steps run on generated shapes
    #[serde(default)]
    pub process: ProcessFlags,
}

impl GeometryConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MeshError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| MeshError::ConfigError(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MeshError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| MeshError::ConfigError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject settings no operator can work with
    pub fn validate(&self) -> Result<()> {
        let distance = self.weld.max_point_distance;
        if distance.is_nan() || distance < 0.0 {
            return Err(MeshError::ConfigError(format!(
                "weld.max_point_distance must be non-negative, got {}",
                distance
            )));
        }
        let ratio = self.chamfer.bevel_ratio;
        if ratio.is_nan() || ratio <= 0.0 || ratio > 1.0 {
            return Err(MeshError::ConfigError(format!(
                "chamfer.bevel_ratio must be in (0, 1], got {}",
                ratio
            )));
        }
        Ok(())
    }
}
