use serde::{Deserialize, Serialize};

use crate::error::RulesError;

pub const CUT_RANDOMNESS_FACTOR: f32 = 0.12;
pub const CUT_RANDOMNESS_MAX: f32 = 0.3;
pub const WAYPOINT_OFFSET_RANGE: f32 = 0.25;
pub const WAYPOINT_OFFSET_MAX: f32 = 0.4;
pub const MIN_DEPTH_RATIO_DEFAULT: f32 = 0.12;
pub const MAX_DEPTH_RATIO_DEFAULT: f32 = 0.22;
pub const DEPTH_RATIO_LIMIT: f32 = 0.45;
pub const CAVITY_CAP_REL: f32 = 0.3;
pub const CAVITY_CAP_EDGE_FRACTION: f32 = 0.35;

pub const BASE_TOLERANCE_DEFAULT: f32 = 144.0;
pub const PROFILE_TOLERANCE_DEFAULT: f32 = 100.0;
pub const COARSE_RADIUS_MULTIPLIER: f32 = 1.5;
pub const NEIGHBOR_TOLERANCE_DEFAULT: f32 = 2.0;
pub const ZOOM_MIN: f32 = 0.05;
pub const ZOOM_MAX: f32 = 20.0;

pub const ROTATION_STEP_DEG: f32 = 90.0;
pub const SCATTER_MARGIN_RATIO_DEFAULT: f32 = 0.05;
pub const WORKSPACE_SCALE_DEFAULT: f32 = 2.2;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(default)]
pub struct ShapeSettings {
    pub min_depth_ratio: f32,
    pub max_depth_ratio: f32,
    pub cut_randomness: f32,
    pub waypoint_offset_range: f32,
    pub cavity_cap_rel: f32,
    pub cavity_cap_edge_fraction: f32,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            min_depth_ratio: MIN_DEPTH_RATIO_DEFAULT,
            max_depth_ratio: MAX_DEPTH_RATIO_DEFAULT,
            cut_randomness: CUT_RANDOMNESS_FACTOR,
            waypoint_offset_range: WAYPOINT_OFFSET_RANGE,
            cavity_cap_rel: CAVITY_CAP_REL,
            cavity_cap_edge_fraction: CAVITY_CAP_EDGE_FRACTION,
        }
    }
}

impl ShapeSettings {
    pub fn sanitized(&self) -> Self {
        let min_depth_ratio = self.min_depth_ratio.clamp(0.0, DEPTH_RATIO_LIMIT);
        let max_depth_ratio = self.max_depth_ratio.clamp(min_depth_ratio, DEPTH_RATIO_LIMIT);
        Self {
            min_depth_ratio,
            max_depth_ratio,
            cut_randomness: self.cut_randomness.clamp(0.0, CUT_RANDOMNESS_MAX),
            waypoint_offset_range: self.waypoint_offset_range.clamp(0.0, WAYPOINT_OFFSET_MAX),
            cavity_cap_rel: self.cavity_cap_rel.clamp(0.0, 1.0),
            cavity_cap_edge_fraction: self.cavity_cap_edge_fraction.clamp(0.0, 1.0),
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(default)]
pub struct MatchRules {
    /// Squared screen-pixel distance each aligned waypoint may be off by.
    pub base_tolerance: f32,
    /// Allowed spread between the largest and smallest squared waypoint distance.
    pub profile_tolerance: f32,
    pub profile_check: bool,
    pub coarse_radius_multiplier: f32,
    /// World distance under which two shared corners count as touching.
    pub neighbor_tolerance: f32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            base_tolerance: BASE_TOLERANCE_DEFAULT,
            profile_tolerance: PROFILE_TOLERANCE_DEFAULT,
            profile_check: true,
            coarse_radius_multiplier: COARSE_RADIUS_MULTIPLIER,
            neighbor_tolerance: NEIGHBOR_TOLERANCE_DEFAULT,
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(default)]
pub struct PuzzleRules {
    pub shape: ShapeSettings,
    pub matching: MatchRules,
    pub rotation_enabled: bool,
    pub rotation_step_deg: f32,
    pub scatter_margin_ratio: f32,
    /// Workspace size relative to the image when scattering.
    pub workspace_scale: f32,
    pub cascade_snaps: bool,
}

impl Default for PuzzleRules {
    fn default() -> Self {
        Self {
            shape: ShapeSettings::default(),
            matching: MatchRules::default(),
            rotation_enabled: true,
            rotation_step_deg: ROTATION_STEP_DEG,
            scatter_margin_ratio: SCATTER_MARGIN_RATIO_DEFAULT,
            workspace_scale: WORKSPACE_SCALE_DEFAULT,
            cascade_snaps: true,
        }
    }
}

impl PuzzleRules {
    pub fn from_toml_str(raw: &str) -> Result<Self, RulesError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml_string(&self) -> Result<String, RulesError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let rules = PuzzleRules::from_toml_str(
            r#"
            rotation_enabled = false

            [matching]
            base_tolerance = 64.0
            "#,
        )
        .unwrap();
        assert!(!rules.rotation_enabled);
        assert_eq!(rules.matching.base_tolerance, 64.0);
        assert_eq!(rules.matching.profile_tolerance, PROFILE_TOLERANCE_DEFAULT);
        assert_eq!(rules.shape, ShapeSettings::default());
    }

    #[test]
    fn toml_round_trip() {
        let rules = PuzzleRules::default();
        let raw = rules.to_toml_string().unwrap();
        assert_eq!(PuzzleRules::from_toml_str(&raw).unwrap(), rules);
    }

    #[test]
    fn sanitized_orders_depth_range() {
        let settings = ShapeSettings {
            min_depth_ratio: 0.3,
            max_depth_ratio: 0.1,
            cut_randomness: 4.0,
            ..ShapeSettings::default()
        }
        .sanitized();
        assert_eq!(settings.max_depth_ratio, 0.3);
        assert_eq!(settings.cut_randomness, CUT_RANDOMNESS_MAX);
    }
}
