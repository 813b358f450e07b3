//! Bake job configuration: jobs, pairs and passes.
//!
//! This is the validated, read-only input handed over by the configuration
//! layer (UI or project JSON). The orchestrator never mutates it; anything
//! resolved at bake time (effective flags, accumulation state) lives in
//! per-run state instead.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::document::spec::DocumentSpec;
use crate::naming;

/// Renderer engine selector. The two engines have disjoint configuration
/// surfaces; see `bake::engine` for the per-engine settings they consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Raytrace,
    Scanline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum AaFactor {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "2x")]
    X2,
    #[serde(rename = "4x")]
    X4,
}

impl AaFactor {
    pub fn factor(self) -> u32 {
        match self {
            AaFactor::None => 1,
            AaFactor::X2 => 2,
            AaFactor::X4 => 4,
        }
    }

    pub fn enabled(self) -> bool {
        !matches!(self, AaFactor::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Exr,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Exr => "exr",
        }
    }
}

/// Texture blend mode assigned when baked maps are reapplied to the lowpoly
/// material: additive for direct light components, multiplicative for
/// occlusion/shadow/color components, mix otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    Mix,
    Add,
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalSpace {
    Tangent,
    Object,
}

/// One axis a normal-map channel can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

/// RGB-channel-to-axis mapping for normal passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Swizzle {
    pub r: Axis,
    pub g: Axis,
    pub b: Axis,
}

impl Default for Swizzle {
    fn default() -> Self {
        Swizzle {
            r: Axis::PosX,
            g: Axis::PosY,
            b: Axis::PosZ,
        }
    }
}

/// Which geometry, beyond the pair itself, participates in a bake.
///
/// `Scene` keeps the full cloned scene and never prunes; the other three
/// prune everything that was not explicitly pulled in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentPolicy {
    Scene,
    Isolated,
    AllHighpoly,
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighpolyRef {
    Object(String),
    Group(String),
}

impl HighpolyRef {
    pub fn name(&self) -> &str {
        match self {
            HighpolyRef::Object(n) | HighpolyRef::Group(n) => n,
        }
    }
}

/// Ray projection control: per-vertex extrusion distance or an explicit
/// cage mesh. Mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    Extrusion(f32),
    Cage(String),
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Extrusion(0.5)
    }
}

impl Projection {
    pub fn cage(&self) -> Option<&str> {
        match self {
            Projection::Cage(name) => Some(name),
            Projection::Extrusion(_) => None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BakePair {
    #[serde(default = "default_true")]
    pub activated: bool,
    pub lowpoly: String,
    #[serde(default)]
    pub highpoly: Option<HighpolyRef>,
    #[serde(default)]
    pub projection: Projection,
    #[serde(default = "default_true")]
    pub use_highpoly: bool,
}

impl BakePair {
    /// A pair without a highpoly reference degrades to lowpoly-only baking.
    /// The configuration itself stays untouched.
    pub fn effective_use_highpoly(&self) -> bool {
        self.use_highpoly && self.highpoly.is_some()
    }
}

/// Semantic bake kind; one kind per output map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Combined,
    MaterialId,
    Shadow,
    Ao,
    Normal,
    Uv,
    Emit,
    Environment,
    DiffuseDirect,
    DiffuseIndirect,
    DiffuseColor,
    GlossyDirect,
    GlossyIndirect,
    GlossyColor,
    TransmissionDirect,
    TransmissionIndirect,
    TransmissionColor,
    SubsurfaceDirect,
    SubsurfaceIndirect,
    SubsurfaceColor,
}

/// Base pass type understood by the ray-traced engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayPassType {
    Combined,
    Diffuse,
    Glossy,
    Transmission,
    Subsurface,
    Shadow,
    Ao,
    Normal,
    Uv,
    Emit,
    Environment,
}

/// Light-path component selected into a ray-traced bake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    None,
    Ao,
    Emit,
    Direct,
    Indirect,
    Color,
    Diffuse,
    Glossy,
    Transmission,
    Subsurface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassFilter {
    pub pass_type: RayPassType,
    pub components: &'static [Component],
}

impl PassKind {
    /// Base pass type plus component filter for the ray-traced engine.
    pub fn filter(self) -> PassFilter {
        use Component as C;
        use RayPassType as T;
        let (pass_type, components): (T, &'static [C]) = match self {
            PassKind::Combined => (
                T::Combined,
                &[
                    C::Ao,
                    C::Emit,
                    C::Direct,
                    C::Indirect,
                    C::Diffuse,
                    C::Glossy,
                    C::Transmission,
                    C::Subsurface,
                ],
            ),
            // Material-id maps flatten every material to its base color and
            // bake the diffuse color component of the result.
            PassKind::MaterialId => (T::Diffuse, &[C::Color]),
            PassKind::Shadow => (T::Shadow, &[C::None]),
            PassKind::Ao => (T::Ao, &[C::None]),
            PassKind::Normal => (T::Normal, &[C::None]),
            PassKind::Uv => (T::Uv, &[C::None]),
            PassKind::Emit => (T::Emit, &[C::None]),
            PassKind::Environment => (T::Environment, &[C::None]),
            PassKind::DiffuseDirect => (T::Diffuse, &[C::Direct]),
            PassKind::DiffuseIndirect => (T::Diffuse, &[C::Indirect]),
            PassKind::DiffuseColor => (T::Diffuse, &[C::Color]),
            PassKind::GlossyDirect => (T::Glossy, &[C::Direct]),
            PassKind::GlossyIndirect => (T::Glossy, &[C::Indirect]),
            PassKind::GlossyColor => (T::Glossy, &[C::Color]),
            PassKind::TransmissionDirect => (T::Transmission, &[C::Direct]),
            PassKind::TransmissionIndirect => (T::Transmission, &[C::Indirect]),
            PassKind::TransmissionColor => (T::Transmission, &[C::Color]),
            PassKind::SubsurfaceDirect => (T::Subsurface, &[C::Direct]),
            PassKind::SubsurfaceIndirect => (T::Subsurface, &[C::Indirect]),
            PassKind::SubsurfaceColor => (T::Subsurface, &[C::Color]),
        };
        PassFilter {
            pass_type,
            components,
        }
    }

    pub fn blend_mode(self) -> BlendMode {
        match self {
            PassKind::DiffuseColor
            | PassKind::GlossyColor
            | PassKind::TransmissionColor
            | PassKind::SubsurfaceColor
            | PassKind::Shadow
            | PassKind::Ao => BlendMode::Multiply,
            PassKind::DiffuseDirect
            | PassKind::GlossyDirect
            | PassKind::TransmissionDirect
            | PassKind::SubsurfaceDirect => BlendMode::Add,
            _ => BlendMode::Mix,
        }
    }

    pub fn default_suffix(self) -> &'static str {
        match self {
            PassKind::Combined => "combined",
            PassKind::MaterialId => "material_id",
            PassKind::Shadow => "shadow",
            PassKind::Ao => "ao",
            PassKind::Normal => "normal",
            PassKind::Uv => "uv",
            PassKind::Emit => "emit",
            PassKind::Environment => "environment",
            PassKind::DiffuseDirect => "diffuse_direct",
            PassKind::DiffuseIndirect => "diffuse_indirect",
            PassKind::DiffuseColor => "diffuse_color",
            PassKind::GlossyDirect => "glossy_direct",
            PassKind::GlossyIndirect => "glossy_indirect",
            PassKind::GlossyColor => "glossy_color",
            PassKind::TransmissionDirect => "transmission_direct",
            PassKind::TransmissionIndirect => "transmission_indirect",
            PassKind::TransmissionColor => "transmission_color",
            PassKind::SubsurfaceDirect => "subsurface_direct",
            PassKind::SubsurfaceIndirect => "subsurface_indirect",
            PassKind::SubsurfaceColor => "subsurface_color",
        }
    }

    /// Canonical order in which maps are layered back onto the lowpoly
    /// material: base lighting first, masks and data maps last.
    pub fn reapply_order(self) -> usize {
        const ORDER: [PassKind; 20] = [
            PassKind::Combined,
            PassKind::DiffuseIndirect,
            PassKind::DiffuseDirect,
            PassKind::DiffuseColor,
            PassKind::GlossyDirect,
            PassKind::GlossyIndirect,
            PassKind::GlossyColor,
            PassKind::TransmissionDirect,
            PassKind::TransmissionIndirect,
            PassKind::TransmissionColor,
            PassKind::SubsurfaceDirect,
            PassKind::SubsurfaceIndirect,
            PassKind::SubsurfaceColor,
            PassKind::Environment,
            PassKind::Emit,
            PassKind::Ao,
            PassKind::Shadow,
            PassKind::Normal,
            PassKind::Uv,
            PassKind::MaterialId,
        ];
        ORDER.iter().position(|k| *k == self).unwrap_or(ORDER.len())
    }

    pub fn drives_diffuse_color(self) -> bool {
        matches!(
            self,
            PassKind::DiffuseDirect
                | PassKind::DiffuseIndirect
                | PassKind::DiffuseColor
                | PassKind::Combined
                | PassKind::Shadow
                | PassKind::Ao
        )
    }

    pub fn drives_emit(self) -> bool {
        matches!(self, PassKind::Emit)
    }

    pub fn drives_specular(self) -> bool {
        matches!(
            self,
            PassKind::GlossyDirect | PassKind::GlossyIndirect | PassKind::GlossyColor
        )
    }

    pub fn drives_normal(self) -> bool {
        matches!(self, PassKind::Normal)
    }
}

fn default_samples() -> u32 {
    1
}

fn default_ao_distance() -> f32 {
    10.0
}

fn default_influence() -> f32 {
    1.0
}

fn default_engine() -> Engine {
    Engine::Raytrace
}

fn default_environment() -> EnvironmentPolicy {
    EnvironmentPolicy::Scene
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BakePass {
    #[serde(default = "default_true")]
    pub activated: bool,
    #[serde(default = "default_engine")]
    pub engine: Engine,
    pub kind: PassKind,
    #[serde(default = "default_samples")]
    pub samples: u32,
    #[serde(default = "default_ao_distance")]
    pub ao_distance: f32,
    #[serde(default = "default_influence")]
    pub influence: f32,
    /// File-name suffix; empty means "derive from the pass kind".
    #[serde(default)]
    pub suffix: String,
    #[serde(default = "default_environment")]
    pub environment: EnvironmentPolicy,
    #[serde(default)]
    pub normal_space: Option<NormalSpace>,
    #[serde(default)]
    pub swizzle: Swizzle,
}

impl BakePass {
    pub fn output_suffix(&self) -> &str {
        if self.suffix.is_empty() {
            self.kind.default_suffix()
        } else {
            &self.suffix
        }
    }

    pub fn normal_space(&self) -> NormalSpace {
        self.normal_space.unwrap_or(NormalSpace::Tangent)
    }

    pub fn file_name(&self, job: &BakeJob) -> String {
        let mut name = naming::atlas_name(job);
        let suffix = self.output_suffix();
        if !suffix.is_empty() {
            name.push('_');
            name.push_str(suffix);
        }
        name.push('.');
        name.push_str(job.format.extension());
        name
    }

    pub fn file_path(&self, job: &BakeJob) -> PathBuf {
        job.output.join(self.file_name(job))
    }
}

fn default_resolution() -> [u32; 2] {
    [1024, 1024]
}

fn default_aa() -> AaFactor {
    AaFactor::None
}

fn default_aa_sharpness() -> f32 {
    0.5
}

fn default_margin() -> u32 {
    16
}

fn default_output() -> PathBuf {
    PathBuf::from("textures")
}

fn default_format() -> OutputFormat {
    OutputFormat::Png
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BakeJob {
    #[serde(default = "default_true")]
    pub activated: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
    #[serde(default = "default_aa")]
    pub antialiasing: AaFactor,
    #[serde(default = "default_aa_sharpness")]
    pub aa_sharpness: f32,
    #[serde(default = "default_margin")]
    pub margin: u32,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_format")]
    pub format: OutputFormat,
    /// Explicit shared-atlas name; overrides the job name for output files.
    #[serde(default)]
    pub atlas: Option<String>,
    /// UV channel all lowpoly objects bake through (shared-atlas mode).
    #[serde(default)]
    pub uv_channel: Option<String>,
    #[serde(default)]
    pub pairs: Vec<BakePair>,
    #[serde(default)]
    pub passes: Vec<BakePass>,
}

impl BakeJob {
    /// The render target is oversized by the anti-aliasing factor and
    /// downsampled back during compositing.
    pub fn render_resolution(&self) -> [u32; 2] {
        let f = self.antialiasing.factor();
        [self.resolution[0] * f, self.resolution[1] * f]
    }

    pub fn active_pairs(&self) -> impl Iterator<Item = &BakePair> {
        self.pairs.iter().filter(|p| p.activated)
    }

    pub fn active_passes(&self) -> impl Iterator<Item = &BakePass> {
        self.passes.iter().filter(|p| p.activated)
    }
}

/// A full headless project: document description plus job queue.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Project {
    pub document: DocumentSpec,
    #[serde(default)]
    pub jobs: Vec<BakeJob>,
}

pub fn load_project_from_path(path: impl AsRef<Path>) -> Result<Project> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read project json at {}", path.display()))?;
    let project: Project =
        serde_json::from_str(&text).context("failed to parse project json")?;
    Ok(project)
}
