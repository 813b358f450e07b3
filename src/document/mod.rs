//! Host document contract.
//!
//! The orchestrator never touches a host scene graph directly; everything
//! goes through the [`Document`] trait: create/clone/rename/delete plus
//! typed record access. [`memory::MemoryDocument`] is the in-memory
//! implementation used by the headless binary and the test suite; a host
//! integration implements the same contract over the real document.
//!
//! Submodules:
//! - `types`: plain records shared by every implementation
//! - `memory`: in-memory reference implementation
//! - `spec`: serde description a `MemoryDocument` can be built from

pub mod memory;
pub mod spec;
pub mod types;

use std::path::Path;

use anyhow::Result;

pub use memory::MemoryDocument;
pub use types::{
    AssetCounts, AssetKind, GroupRecord, ImageRecord, ImageSource, MaterialNode, MaterialRecord,
    MeshRecord, NodeLink, NodeTree, ObjectData, ObjectRecord, SceneCopy, SceneRecord,
    TextureRecord, TextureSlot, UvChannel, WorldRecord,
};

pub trait Document {
    // --- scene context ---

    fn active_scene(&self) -> &str;
    fn set_active_scene(&mut self, name: &str) -> Result<()>;

    // --- scenes ---

    fn create_scene(&mut self, name: &str) -> Result<()>;
    fn scene(&self, name: &str) -> Result<&SceneRecord>;
    fn scene_mut(&mut self, name: &str) -> Result<&mut SceneRecord>;
    /// Delete the scene container. Fails while the scene still links
    /// objects: callers must unlink/delete objects first, which is what
    /// keeps the object -> data block -> container teardown order honest.
    fn delete_scene(&mut self, name: &str) -> Result<()>;
    /// Deep copy of a scene and everything it references (objects, data
    /// blocks, materials, textures, images, groups, world). Copies receive
    /// unique placeholder names and inherit the origin tags; the returned
    /// ledger lists every created entity.
    fn full_copy_scene(&mut self, source: &str, copy_name: &str) -> Result<SceneCopy>;

    // --- objects ---

    fn object(&self, name: &str) -> Result<&ObjectRecord>;
    fn object_mut(&mut self, name: &str) -> Result<&mut ObjectRecord>;
    /// Link a new object into a scene. Mesh-data references must already
    /// exist; their user count is bumped.
    fn add_object(&mut self, scene: &str, record: ObjectRecord) -> Result<()>;
    /// Unlink the object from the scene and delete it; deletes its mesh
    /// data block too once no other object references it.
    fn unlink_and_delete_object(&mut self, scene: &str, name: &str) -> Result<()>;

    // --- data blocks and assets ---

    fn add_mesh(&mut self, record: MeshRecord) -> Result<()>;
    fn add_material(&mut self, record: MaterialRecord) -> Result<()>;
    fn material(&self, name: &str) -> Result<&MaterialRecord>;
    fn material_mut(&mut self, name: &str) -> Result<&mut MaterialRecord>;
    fn add_texture(&mut self, record: TextureRecord) -> Result<()>;
    fn add_image(&mut self, record: ImageRecord) -> Result<()>;
    fn image(&self, name: &str) -> Result<&ImageRecord>;
    fn image_mut(&mut self, name: &str) -> Result<&mut ImageRecord>;
    /// Load an image file into the document, keyed by file name. Any image
    /// already occupying that name (stale cache from an earlier run) is
    /// evicted and reloaded rather than silently reused.
    fn load_image(&mut self, path: &Path) -> Result<String>;
    fn add_group(&mut self, record: GroupRecord) -> Result<()>;
    fn group(&self, name: &str) -> Result<&GroupRecord>;
    fn group_mut(&mut self, name: &str) -> Result<&mut GroupRecord>;
    fn add_world(&mut self, record: WorldRecord) -> Result<()>;
    fn world_mut(&mut self, name: &str) -> Result<&mut WorldRecord>;

    // --- generic by-kind operations (sandbox lifecycle) ---

    fn exists(&self, kind: AssetKind, name: &str) -> bool;
    fn names(&self, kind: AssetKind) -> Vec<String>;
    /// Rename an entity and rewrite every reference to it.
    fn rename(&mut self, kind: AssetKind, from: &str, to: &str) -> Result<()>;
    /// Remove a non-scene entity. Objects are unlinked from every scene
    /// first; dangling references in other records are cleared.
    fn remove(&mut self, kind: AssetKind, name: &str) -> Result<()>;
    /// Stamp every entity's origin tag with its current name, ahead of a
    /// deep copy.
    fn tag_origins(&mut self);
    fn origin(&self, kind: AssetKind, name: &str) -> Option<String>;

    fn counts(&self) -> AssetCounts;
}
