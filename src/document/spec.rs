//! Serde description of a document, for headless runs.
//!
//! The binary loads a project JSON (document + jobs) and builds a
//! [`MemoryDocument`] from this spec; a host integration ignores it and
//! adapts the live document instead.

use anyhow::{Context, Result, bail};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use super::Document;
use super::memory::MemoryDocument;
use super::types::{
    GroupRecord, MaterialRecord, MeshRecord, ObjectData, ObjectRecord, UvChannel, WorldRecord,
};

fn default_scene_name() -> String {
    "Scene".to_string()
}

fn default_ao_distance() -> f32 {
    10.0
}

fn default_diffuse() -> [f32; 3] {
    [0.8, 0.8, 0.8]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentSpec {
    #[serde(default = "default_scene_name")]
    pub scene: String,
    #[serde(default)]
    pub world: Option<WorldSpec>,
    #[serde(default)]
    pub materials: Vec<MaterialSpec>,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldSpec {
    #[serde(default = "default_ao_distance")]
    pub ao_distance: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaterialSpec {
    pub name: String,
    #[serde(default = "default_diffuse")]
    pub diffuse_color: [f32; 3],
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectSpec {
    pub name: String,
    /// Group this object instances; mutually exclusive with `mesh`.
    #[serde(default)]
    pub instance_of: Option<String>,
    /// Mesh data block name; defaults to `<name>-mesh`. Several objects may
    /// name the same block to share data.
    #[serde(default)]
    pub mesh: Option<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub position: Option<[f32; 3]>,
    #[serde(default)]
    pub uv_channels: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupSpec {
    pub name: String,
    pub members: Vec<String>,
}

pub fn build_document(spec: &DocumentSpec) -> Result<MemoryDocument> {
    let mut doc = MemoryDocument::new(&spec.scene);

    if let Some(world) = &spec.world {
        let mut record = WorldRecord::new("World");
        record.ao_distance = world.ao_distance;
        doc.add_world(record)?;
        doc.scene_mut(&spec.scene)?.world = Some("World".to_string());
    }

    for material in &spec.materials {
        let mut record = MaterialRecord::new(&material.name);
        record.diffuse_color = material.diffuse_color;
        doc.add_material(record)
            .with_context(|| format!("material '{}'", material.name))?;
    }

    for object in &spec.objects {
        let data = match (&object.instance_of, &object.mesh) {
            (Some(_), Some(_)) => {
                bail!(
                    "object '{}' declares both a mesh and an instanced group",
                    object.name
                )
            }
            (Some(group), None) => ObjectData::Instance {
                group: group.clone(),
            },
            (None, mesh) => {
                let mesh = mesh
                    .clone()
                    .unwrap_or_else(|| format!("{}-mesh", object.name));
                if !doc.exists(super::types::AssetKind::Mesh, &mesh) {
                    doc.add_mesh(MeshRecord::new(&mesh))?;
                }
                ObjectData::Mesh { mesh }
            }
        };

        let mut record = ObjectRecord::new(&object.name, data);
        if let Some(pos) = object.position {
            record.transform = Mat4::from_translation(Vec3::from_array(pos));
        }
        for material in &object.materials {
            if !doc.exists(super::types::AssetKind::Material, material) {
                bail!(
                    "object '{}' references unknown material '{material}'",
                    object.name
                );
            }
            record.material_slots.push(Some(material.clone()));
        }
        if !record.material_slots.is_empty() {
            record.active_material = Some(0);
        }
        let channels = if object.uv_channels.is_empty() {
            vec!["uv0".to_string()]
        } else {
            object.uv_channels.clone()
        };
        record.uv_channels = channels
            .into_iter()
            .map(|name| UvChannel {
                name,
                target_image: None,
            })
            .collect();
        record.active_uv = Some(0);
        record.hide = object.hidden;
        record.hide_render = object.hidden;
        doc.add_object(&spec.scene, record)
            .with_context(|| format!("object '{}'", object.name))?;
    }

    for group in &spec.groups {
        for member in &group.members {
            if !doc.exists(super::types::AssetKind::Object, member) {
                bail!(
                    "group '{}' references unknown object '{member}'",
                    group.name
                );
            }
        }
        doc.add_group(GroupRecord {
            name: group.name.clone(),
            origin: None,
            members: group.members.clone(),
        })?;
    }

    // Instanced groups must resolve after all objects exist.
    for object in &spec.objects {
        if let Some(group) = &object.instance_of
            && !doc.exists(super::types::AssetKind::Group, group)
        {
            bail!(
                "object '{}' instances unknown group '{group}'",
                object.name
            );
        }
    }

    Ok(doc)
}
