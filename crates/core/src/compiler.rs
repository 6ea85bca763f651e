//! Directive compiler: turns a job's settings and the user's preference
//! profile into the text payload sent to the image model.
//!
//! [`compile`] is pure. Identical inputs produce byte-identical output, and
//! nothing in the output depends on iteration order of hashed collections.
//!
//! Every setting is explicit, so the preference block can never override
//! one. A hint is emitted only when it agrees with the job's own setting,
//! where it reinforces that choice; a hint that disagrees is dropped.

use serde::Serialize;

use crate::preference::PreferenceProfile;
use crate::settings::{
    AspectRatio, GenerationConfig, Material, Percentage, ResolutionTier, ShadowIntensity,
    VariationTier,
};

// ---------------------------------------------------------------------------
// Fixed blocks
// ---------------------------------------------------------------------------

const CLEANUP_DIRECTIVE: &str = "\
CLEANUP
- Remove every existing shadow, reflection and background artifact from the source photo.
- Remove compression noise and halo edges around the product.
- Place the product on a seamless, neutral studio background.";

const NEGATIVE_CONSTRAINTS: &str = "\
AVOID
- Do not change the product's shape, proportions, colour, logos or printed text.
- No additional objects, props, people, hands or watermarks.
- No multiple or contradictory shadows, no floating halos, no cut-out edges.";

/// Intensity bands used to put a percentage into words.
const LIGHT_BAND_MAX: u8 = 33;
const MODERATE_BAND_MAX: u8 = 66;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Compiled payload for one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub resolution: ResolutionTier,
}

/// Compile settings and preferences into a generation request.
pub fn compile(config: &GenerationConfig, profile: &PreferenceProfile) -> GenerationRequest {
    let mut blocks = vec![
        CLEANUP_DIRECTIVE.to_string(),
        lighting_block(config),
        material_block(&config.material),
    ];
    if let Some(block) = preference_block(config, profile) {
        blocks.push(block);
    }
    blocks.push(camera_block(config));
    blocks.push(NEGATIVE_CONSTRAINTS.to_string());

    GenerationRequest {
        prompt: blocks.join("\n\n"),
        aspect_ratio: config.aspect_ratio,
        resolution: config.resolution,
    }
}

// ---------------------------------------------------------------------------
// Lighting
// ---------------------------------------------------------------------------

fn lighting_block(config: &GenerationConfig) -> String {
    let shadow_deg = config.shadow_angle.degrees();
    let light_deg = config.shadow_angle.light_source_degrees();

    let mut lines = vec![
        "LIGHTING".to_string(),
        format!(
            "- Key light positioned at {light_deg}\u{b0}, so the cast shadow falls toward {shadow_deg}\u{b0}."
        ),
        format!(
            "- {}",
            shadow_directive(config.shadow_intensity, config.enhanced_lighting, shadow_deg)
        ),
    ];

    if config.is_floating() {
        lines.push(format!(
            "- The product floats {} above the background. Detach the shadow from the base and \
             offset it along the light direction in proportion to that height; widen and lighten \
             it accordingly. No contact shadow.",
            config.elevation
        ));
    } else {
        lines.push(
            "- The product rests on the surface. Anchor it with a tight, dark contact shadow at the base."
                .to_string(),
        );
    }

    lines.join("\n")
}

fn shadow_directive(intensity: ShadowIntensity, enhanced: bool, shadow_deg: u16) -> String {
    match (intensity, enhanced) {
        (ShadowIntensity::Soft, false) => "Soft shadow from a large diffused source: wide penumbra, \
             gradual falloff, low-contrast edges."
            .to_string(),
        (ShadowIntensity::Soft, true) => "Soft shadow from a large softbox with bounce fill: very \
             wide penumbra, smooth inverse-square falloff, subtle ambient occlusion where the \
             product meets the surface, gentle light wrapping around the product edges."
            .to_string(),
        (ShadowIntensity::Hard, false) => "Hard shadow from a small point-like source: narrow \
             penumbra, crisp edges, high contrast."
            .to_string(),
        (ShadowIntensity::Hard, true) => "Hard shadow from direct sunlight: near-zero penumbra at \
             the contact point that widens slightly with distance, deep but not crushed shadow \
             core, specular highlights consistent with the light direction."
            .to_string(),
        (ShadowIntensity::Long, false) => format!(
            "Long shadow from a low-angle source: elongated to about three times the product \
             height toward {shadow_deg}\u{b0}, fading with distance."
        ),
        (ShadowIntensity::Long, true) => format!(
            "Long shadow from low golden-hour light: elongated to about four times the product \
             height toward {shadow_deg}\u{b0}, penumbra widening and density fading along its \
             length, warm rim light on the lit edges."
        ),
    }
}

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

fn material_block(material: &Material) -> String {
    match *material {
        Material::Standard => "\
MATERIAL: STANDARD (PBR)
- Preserve the product's existing materials with physically based rendering.
- Accurate albedo, roughness and metalness; keep the original colour and finish."
            .to_string(),
        Material::Metal {
            patina_intensity,
            variation,
        } => format!(
            "MATERIAL: METAL\n\
             - Base: polished metal with physically accurate reflections and anisotropic highlights.\n\
             - Patina: {} patina at {patina_intensity} coverage, settling first in recesses and along edges.\n\
             - Variation: {}.",
            band(patina_intensity),
            variation_directive(variation)
        ),
        Material::Silver {
            tarnish_intensity,
            variation,
        } => format!(
            "MATERIAL: SILVER\n\
             - Base: bright sterling silver with soft, cool reflections.\n\
             - Tarnish: {} tarnish at {tarnish_intensity}, shifting from warm gold to blue-black in crevices; \
             raised areas stay polished.\n\
             - Variation: {}.",
            band(tarnish_intensity),
            variation_directive(variation)
        ),
        Material::Patina {
            coverage,
            variation,
        } => format!(
            "MATERIAL: VERDIGRIS PATINA\n\
             - Coverage: {} blue-green copper patina over {coverage} of the surface, matte and crystalline.\n\
             - Worn high points reveal the bronze underneath.\n\
             - Variation: {}.",
            band(coverage),
            variation_directive(variation)
        ),
        Material::AmmoniaFuming {
            fuming_depth,
            variation,
        } => format!(
            "MATERIAL: AMMONIA-FUMED WOOD\n\
             - Fuming depth: {} darkening at {fuming_depth}, deepening the tannins toward rich brown.\n\
             - Grain and ray fleck remain legible; satin oil finish.\n\
             - Variation: {}.",
            band(fuming_depth),
            variation_directive(variation)
        ),
        Material::Stone {
            roughness,
            variation,
        } => format!(
            "MATERIAL: STONE\n\
             - Surface roughness: {} ({roughness}), with mineral grain, micro-pitting and diffuse reflection.\n\
             - Edges slightly softened as if honed.\n\
             - Variation: {}.",
            band(roughness),
            variation_directive(variation)
        ),
        Material::Fabric {
            texture_roughness,
            variation,
        } => format!(
            "MATERIAL: FABRIC / TEXTURE\n\
             - Texture roughness: {} ({texture_roughness}), with a visible weave and fibre fuzz catching the light.\n\
             - Folds keep soft, self-shadowed creases.\n\
             - Variation: {}.",
            band(texture_roughness),
            variation_directive(variation)
        ),
    }
}

fn band(value: Percentage) -> &'static str {
    match value.value() {
        0..=LIGHT_BAND_MAX => "light",
        v if v <= MODERATE_BAND_MAX => "moderate",
        _ => "heavy",
    }
}

fn variation_directive(tier: VariationTier) -> &'static str {
    match tier {
        VariationTier::Subtle => "subtle, uniform treatment with only slight tonal drift",
        VariationTier::Standard => "natural, moderate variation across the surface",
        VariationTier::Extreme => "strongly uneven treatment with pronounced local differences",
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Hints derived from past ratings. A hint that disagrees with the
/// explicit configuration is dropped; `None` when nothing remains.
fn preference_block(config: &GenerationConfig, profile: &PreferenceProfile) -> Option<String> {
    if profile.is_empty() {
        return None;
    }

    let mut hints = Vec::new();

    if profile.shadow_intensity == Some(config.shadow_intensity) {
        hints.push(format!(
            "- Highly rated results used {} shadows; match their edge quality when blending the penumbra.",
            config.shadow_intensity.as_str()
        ));
    }
    if profile.material == Some(config.material.kind()) {
        hints.push(format!(
            "- Highly rated results used a {} finish; match their level of surface detail.",
            config.material.kind().as_str()
        ));
    }
    if profile.enhanced_lighting == Some(config.enhanced_lighting) {
        hints.push(if config.enhanced_lighting {
            "- Where a choice remains, favour rich, dimensional fill and rim light.".to_string()
        } else {
            "- Where a choice remains, favour clean, unembellished fill light.".to_string()
        });
    }
    if profile.floating == Some(config.is_floating()) {
        hints.push(if config.is_floating() {
            "- Where a choice remains, favour a clearly visible gap between product and shadow."
                .to_string()
        } else {
            "- Where a choice remains, favour a firmly anchored contact shadow.".to_string()
        });
    }
    if profile.shadow_angle_bucket == Some(config.shadow_angle.bucket()) {
        hints.push(format!(
            "- Place fill light so the {}\u{b0} shadow direction stays clearly readable.",
            config.shadow_angle.bucket()
        ));
    }

    if hints.is_empty() {
        return None;
    }

    let mut block = vec![
        "USER PREFERENCES (secondary; the settings above always take precedence)".to_string(),
    ];
    block.extend(hints);
    Some(block.join("\n"))
}

// ---------------------------------------------------------------------------
// Camera / output
// ---------------------------------------------------------------------------

fn camera_block(config: &GenerationConfig) -> String {
    format!(
        "CAMERA & OUTPUT\n\
         - Keep the original framing, perspective and focal length; the product stays centred.\n\
         - Photorealistic studio product photograph, 85mm lens look, f/8, neutral colour grading.\n\
         - Aspect ratio {}, resolution {}.",
        config.aspect_ratio.as_str(),
        config.resolution.as_str()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
