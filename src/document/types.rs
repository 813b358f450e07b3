//! Plain records for the host document contract.
//!
//! These mirror the host's persistent data blocks at the granularity the
//! orchestrator needs: enough to drive visibility/selection, material
//! rewrites and reference-counted teardown, and nothing more.

use std::path::PathBuf;

use glam::Mat4;

use crate::bake::engine::BakeSettings;
use crate::config::BlendMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Object,
    Mesh,
    Material,
    Texture,
    Image,
    Group,
    World,
    Scene,
}

/// Per-category entity counts, used to assert that a sandbox clone/destroy
/// cycle leaks nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetCounts {
    pub objects: usize,
    pub meshes: usize,
    pub materials: usize,
    pub textures: usize,
    pub images: usize,
    pub groups: usize,
    pub worlds: usize,
    pub scenes: usize,
}

/// Ledger of every entity created by one deep scene copy. Teardown frees
/// exactly what is listed here instead of scanning the document by name.
#[derive(Debug, Clone, Default)]
pub struct SceneCopy {
    pub scene: String,
    pub objects: Vec<String>,
    pub meshes: Vec<String>,
    pub materials: Vec<String>,
    pub textures: Vec<String>,
    pub images: Vec<String>,
    pub groups: Vec<String>,
    pub worlds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    /// Owns (a reference to) a mesh data block.
    Mesh { mesh: String },
    /// Proxy that instances a whole group; realized into per-object copies
    /// inside the sandbox before baking.
    Instance { group: String },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UvChannel {
    pub name: String,
    /// Image assigned to this channel; how the scanline engine picks its
    /// bake target.
    pub target_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub name: String,
    /// Side-channel tag holding the pre-copy name, set before a deep copy.
    pub origin: Option<String>,
    pub data: ObjectData,
    pub transform: Mat4,
    pub hide: bool,
    pub hide_select: bool,
    pub hide_render: bool,
    pub selected: bool,
    pub material_slots: Vec<Option<String>>,
    pub active_material: Option<usize>,
    pub uv_channels: Vec<UvChannel>,
    pub active_uv: Option<usize>,
}

impl ObjectRecord {
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        ObjectRecord {
            name: name.into(),
            origin: None,
            data,
            transform: Mat4::IDENTITY,
            hide: false,
            hide_select: false,
            hide_render: false,
            selected: false,
            material_slots: Vec::new(),
            active_material: None,
            uv_channels: Vec::new(),
            active_uv: None,
        }
    }

    pub fn has_any_material(&self) -> bool {
        self.material_slots.iter().any(|s| s.is_some())
    }

    /// Make the object visible, selectable and selected for rendering.
    pub fn show_and_select(&mut self) {
        self.hide = false;
        self.hide_select = false;
        self.hide_render = false;
        self.selected = true;
    }

    pub fn uv_channel_mut(&mut self, name: &str) -> Option<&mut UvChannel> {
        self.uv_channels.iter_mut().find(|c| c.name == name)
    }
}

/// Mesh data block. Reference-counted: several objects may link the same
/// data, and the block is only deleted once no object references it.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRecord {
    pub name: String,
    pub origin: Option<String>,
    pub users: u32,
}

impl MeshRecord {
    pub fn new(name: impl Into<String>) -> Self {
        MeshRecord {
            name: name.into(),
            origin: None,
            users: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaterialNode {
    ImageTexture {
        image: String,
        uv_channel: Option<String>,
    },
    DiffuseBsdf {
        color: [f32; 4],
    },
    OutputSurface,
}

/// Link between two nodes, by index. Single implicit port per side; the
/// orchestrator only ever builds linear shader chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLink {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeTree {
    pub nodes: Vec<(String, MaterialNode)>,
    pub links: Vec<NodeLink>,
    pub active: Option<usize>,
}

impl NodeTree {
    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|(n, _)| n == name)
    }

    /// Insert or retarget a named image node and make it the active node
    /// (the one the renderer bakes into).
    pub fn set_active_image_node(
        &mut self,
        name: &str,
        image: impl Into<String>,
        uv_channel: Option<String>,
    ) {
        let node = MaterialNode::ImageTexture {
            image: image.into(),
            uv_channel,
        };
        match self.find(name) {
            Some(idx) => {
                self.nodes[idx].1 = node;
                self.active = Some(idx);
            }
            None => {
                self.nodes.push((name.to_string(), node));
                self.active = Some(self.nodes.len() - 1);
            }
        }
    }
}

/// One texture slot on a scanline-engine material, as rebuilt by the final
/// map reapplication step.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSlot {
    pub texture: String,
    pub blend: BlendMode,
    pub use_map_color: bool,
    pub color_factor: f32,
    pub use_map_emit: bool,
    pub emit_factor: f32,
    pub use_map_specular: bool,
    pub specular_factor: f32,
    pub use_map_normal: bool,
    pub normal_factor: f32,
}

impl TextureSlot {
    pub fn new(texture: impl Into<String>, blend: BlendMode) -> Self {
        TextureSlot {
            texture: texture.into(),
            blend,
            use_map_color: false,
            color_factor: 1.0,
            use_map_emit: false,
            emit_factor: 1.0,
            use_map_specular: false,
            specular_factor: 1.0,
            use_map_normal: false,
            normal_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    pub name: String,
    pub origin: Option<String>,
    pub diffuse_color: [f32; 3],
    pub use_nodes: bool,
    pub tree: NodeTree,
    pub shadeless: bool,
    pub texture_slots: Vec<Option<TextureSlot>>,
}

impl MaterialRecord {
    pub fn new(name: impl Into<String>) -> Self {
        MaterialRecord {
            name: name.into(),
            origin: None,
            diffuse_color: [0.8, 0.8, 0.8],
            use_nodes: false,
            tree: NodeTree::default(),
            shadeless: false,
            texture_slots: Vec::new(),
        }
    }

    /// Replace the whole shader graph with a flat diffuse colored from the
    /// material's base color. Used by material-id passes so the renderer
    /// produces a flat id map instead of the shaded result.
    pub fn flatten_to_diffuse(&mut self) {
        let c = self.diffuse_color;
        self.use_nodes = true;
        self.tree = NodeTree {
            nodes: vec![
                (
                    "diffuse".to_string(),
                    MaterialNode::DiffuseBsdf {
                        color: [c[0], c[1], c[2], 1.0],
                    },
                ),
                ("output".to_string(), MaterialNode::OutputSurface),
            ],
            links: vec![NodeLink { from: 0, to: 1 }],
            active: None,
        };
    }

    pub fn first_empty_slot(&mut self) -> usize {
        match self.texture_slots.iter().position(|s| s.is_none()) {
            Some(idx) => idx,
            None => {
                self.texture_slots.push(None);
                self.texture_slots.len() - 1
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureRecord {
    pub name: String,
    pub origin: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Generated,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub name: String,
    pub origin: Option<String>,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
    pub source: ImageSource,
}

impl ImageRecord {
    /// Blank generated image, transparent black, as the renderer expects a
    /// fresh bake target to be.
    pub fn new_generated(name: impl Into<String>, width: u32, height: u32) -> Self {
        ImageRecord {
            name: name.into(),
            origin: None,
            width,
            height,
            pixels: vec![[0.0; 4]; (width * height) as usize],
            source: ImageSource::Generated,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRecord {
    pub name: String,
    pub origin: Option<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldRecord {
    pub name: String,
    pub origin: Option<String>,
    pub ao_distance: f32,
}

impl WorldRecord {
    pub fn new(name: impl Into<String>) -> Self {
        WorldRecord {
            name: name.into(),
            origin: None,
            ao_distance: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneRecord {
    pub name: String,
    pub objects: Vec<String>,
    pub world: Option<String>,
    pub active_object: Option<String>,
    /// Engine bake settings pushed by `Engine::configure` before each pass.
    pub bake: Option<BakeSettings>,
}

impl SceneRecord {
    pub fn new(name: impl Into<String>) -> Self {
        SceneRecord {
            name: name.into(),
            objects: Vec::new(),
            world: None,
            active_object: None,
            bake: None,
        }
    }
}
