//! Generation settings: material, lighting and composition directives.
//!
//! Every job captures a [`GenerationConfig`] snapshot at submission time.
//! Range-limited values are validated newtypes so an out-of-range angle or
//! percentage cannot be constructed or deserialized.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Elevations at or below this percentage are treated as grounded.
pub const GROUNDED_ELEVATION_MAX: u8 = 5;

/// Upper bound (inclusive) for a shadow angle in degrees.
pub const MAX_SHADOW_ANGLE: u16 = 360;

/// Width of a shadow-angle bucket used by the preference profile.
pub const ANGLE_BUCKET_DEGREES: u16 = 45;

// ---------------------------------------------------------------------------
// Percentage
// ---------------------------------------------------------------------------

/// An integer percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);

    /// Validate and wrap a percentage value.
    pub fn new(value: u8) -> Result<Self, CoreError> {
        if value > 100 {
            return Err(CoreError::Validation(format!(
                "Percentage must be between 0 and 100, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Percentage {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for u8 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// ---------------------------------------------------------------------------
// Shadow angle
// ---------------------------------------------------------------------------

/// Direction in which the cast shadow falls, in degrees `0..=360`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct ShadowAngle(u16);

impl ShadowAngle {
    pub fn new(degrees: u16) -> Result<Self, CoreError> {
        if degrees > MAX_SHADOW_ANGLE {
            return Err(CoreError::Validation(format!(
                "Shadow angle must be between 0 and {MAX_SHADOW_ANGLE}, got {degrees}"
            )));
        }
        Ok(Self(degrees))
    }

    pub fn degrees(self) -> u16 {
        self.0
    }

    /// The key light sits opposite the shadow: `(angle + 180) mod 360`.
    pub fn light_source_degrees(self) -> u16 {
        (self.0 + 180) % 360
    }

    /// Snap to the nearest multiple of [`ANGLE_BUCKET_DEGREES`], wrapping
    /// 360 back to 0.
    pub fn bucket(self) -> u16 {
        let half = ANGLE_BUCKET_DEGREES / 2;
        ((self.0 + half) / ANGLE_BUCKET_DEGREES * ANGLE_BUCKET_DEGREES) % 360
    }
}

impl TryFrom<u16> for ShadowAngle {
    type Error = CoreError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShadowAngle> for u16 {
    fn from(value: ShadowAngle) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Shadow rendering category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowIntensity {
    Soft,
    Hard,
    Long,
}

impl ShadowIntensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShadowIntensity::Soft => "soft",
            ShadowIntensity::Hard => "hard",
            ShadowIntensity::Long => "long",
        }
    }
}

/// How much the material treatment varies across the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationTier {
    Subtle,
    #[default]
    Standard,
    Extreme,
}

impl VariationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariationTier::Subtle => "subtle",
            VariationTier::Standard => "standard",
            VariationTier::Extreme => "extreme",
        }
    }
}

/// Output aspect ratio understood by the image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
        }
    }
}

/// Output resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResolutionTier {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::OneK => "1K",
            ResolutionTier::TwoK => "2K",
            ResolutionTier::FourK => "4K",
        }
    }
}

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

/// Material treatment applied to the product.
///
/// Each variant carries only the parameters that make sense for it.
/// Unknown tags (e.g. from an older preset file) deserialize as
/// [`Material::Standard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Material {
    Metal {
        patina_intensity: Percentage,
        #[serde(default)]
        variation: VariationTier,
    },
    Silver {
        tarnish_intensity: Percentage,
        #[serde(default)]
        variation: VariationTier,
    },
    Patina {
        coverage: Percentage,
        #[serde(default)]
        variation: VariationTier,
    },
    AmmoniaFuming {
        fuming_depth: Percentage,
        #[serde(default)]
        variation: VariationTier,
    },
    Stone {
        roughness: Percentage,
        #[serde(default)]
        variation: VariationTier,
    },
    Fabric {
        texture_roughness: Percentage,
        #[serde(default)]
        variation: VariationTier,
    },
    #[default]
    #[serde(other)]
    Standard,
}

impl Material {
    pub fn kind(&self) -> MaterialKind {
        match self {
            Material::Standard => MaterialKind::Standard,
            Material::Metal { .. } => MaterialKind::Metal,
            Material::Silver { .. } => MaterialKind::Silver,
            Material::Patina { .. } => MaterialKind::Patina,
            Material::AmmoniaFuming { .. } => MaterialKind::AmmoniaFuming,
            Material::Stone { .. } => MaterialKind::Stone,
            Material::Fabric { .. } => MaterialKind::Fabric,
        }
    }
}

/// Parameter-free discriminant of [`Material`], used for preference
/// statistics and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Standard,
    Metal,
    Silver,
    Patina,
    AmmoniaFuming,
    Stone,
    Fabric,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Standard => "standard",
            MaterialKind::Metal => "metal",
            MaterialKind::Silver => "silver",
            MaterialKind::Patina => "patina",
            MaterialKind::AmmoniaFuming => "ammonia_fuming",
            MaterialKind::Stone => "stone",
            MaterialKind::Fabric => "fabric",
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

/// Full set of rendering directives for one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub material: Material,
    pub shadow_angle: ShadowAngle,
    pub shadow_intensity: ShadowIntensity,
    /// Distance between product and background, as a percentage.
    pub elevation: Percentage,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub resolution: ResolutionTier,
    #[serde(default)]
    pub enhanced_lighting: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            material: Material::Standard,
            shadow_angle: ShadowAngle(45),
            shadow_intensity: ShadowIntensity::Soft,
            elevation: Percentage::ZERO,
            aspect_ratio: AspectRatio::default(),
            resolution: ResolutionTier::default(),
            enhanced_lighting: false,
        }
    }
}

impl GenerationConfig {
    /// Whether the product hovers above the background.
    pub fn is_floating(&self) -> bool {
        self.elevation.value() > GROUNDED_ELEVATION_MAX
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
