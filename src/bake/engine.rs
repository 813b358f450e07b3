//! Per-engine renderer configuration and the renderer contract.
//!
//! The two engines expose disjoint bake settings; both are written through
//! the uniform [`Engine::configure`]/[`Engine::attach_target`] operations so
//! nothing downstream ever branches on engine identity.

use anyhow::Result;

use crate::compositor::{CompositeOutput, CompositorGraph};
use crate::config::{
    BakeJob, BakePass, Engine, NormalSpace, PassFilter, PassKind, Projection, Swizzle,
};
use crate::document::types::UvChannel;
use crate::document::{Document, SceneRecord};
use crate::naming;

/// Settings the ray-traced engine reads at bake time.
#[derive(Debug, Clone, PartialEq)]
pub struct RaytraceBakeSettings {
    pub filter: PassFilter,
    pub samples: u32,
    pub ao_distance: f32,
}

/// Settings the scanline engine reads at bake time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanlineBakeSettings {
    pub kind: PassKind,
    pub samples: u32,
    pub margin: u32,
    pub normal_space: NormalSpace,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BakeSettings {
    Raytrace(RaytraceBakeSettings),
    Scanline(ScanlineBakeSettings),
}

impl Engine {
    /// Push pass parameters into the scene's renderer configuration.
    pub fn configure(self, scene: &mut SceneRecord, job: &BakeJob, pass: &BakePass) {
        scene.bake = Some(match self {
            Engine::Raytrace => BakeSettings::Raytrace(RaytraceBakeSettings {
                filter: pass.kind.filter(),
                samples: pass.samples,
                ao_distance: pass.ao_distance,
            }),
            Engine::Scanline => BakeSettings::Scanline(ScanlineBakeSettings {
                kind: pass.kind,
                samples: pass.samples,
                margin: job.margin,
                normal_space: pass.normal_space(),
            }),
        });
    }

    /// Point every material on the lowpoly object at the shared render
    /// target: an image-sampling node for the node-based engine, a
    /// per-UV-channel image assignment for the scanline engine.
    pub fn attach_target<D: Document>(
        self,
        doc: &mut D,
        lowpoly: &str,
        uv_channel: Option<&str>,
        target: &str,
    ) -> Result<()> {
        match self {
            Engine::Raytrace => {
                let slots: Vec<String> = doc
                    .object(lowpoly)?
                    .material_slots
                    .iter()
                    .flatten()
                    .cloned()
                    .collect();
                for name in slots {
                    let material = doc.material_mut(&name)?;
                    material.use_nodes = true;
                    material.tree.set_active_image_node(
                        naming::TARGET_NODE,
                        target,
                        uv_channel.map(str::to_string),
                    );
                }
            }
            Engine::Scanline => {
                let object = doc.object_mut(lowpoly)?;
                let channel_name = uv_channel
                    .map(str::to_string)
                    .or_else(|| {
                        object
                            .active_uv
                            .and_then(|i| object.uv_channels.get(i))
                            .map(|c| c.name.clone())
                    })
                    .unwrap_or_else(|| "uv0".to_string());
                match object.uv_channel_mut(&channel_name) {
                    Some(channel) => channel.target_image = Some(target.to_string()),
                    None => object.uv_channels.push(UvChannel {
                        name: channel_name,
                        target_image: Some(target.to_string()),
                    }),
                }
            }
        }
        Ok(())
    }
}

/// One renderer bake invocation, fully resolved to sandbox entity names.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeRequest {
    pub target: String,
    pub width: u32,
    pub height: u32,
    pub kind: PassKind,
    /// Transfer detail from the selected highpoly set onto the active
    /// lowpoly object; false bakes the lowpoly's own surface.
    pub use_selected_to_active: bool,
    pub projection: Projection,
    pub normal_space: NormalSpace,
    pub swizzle: Swizzle,
    /// Clear the target before writing. True only for the first pair of a
    /// pass; later pairs accumulate into the shared atlas.
    pub clear: bool,
}

/// The external rendering/compositing engine.
///
/// The orchestrator decides *what* is rendered and hands over; it never
/// inspects renderer internals, and a failure here aborts the whole run.
pub trait Renderer<D: Document> {
    fn bake(&mut self, doc: &mut D, scene: &str, request: &BakeRequest) -> Result<()>;

    fn composite(
        &mut self,
        doc: &mut D,
        scene: &str,
        graph: &CompositorGraph,
        output: &CompositeOutput,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AaFactor, EnvironmentPolicy};
    use crate::document::types::{MaterialRecord, MeshRecord, ObjectData, ObjectRecord};
    use crate::document::{Document, MemoryDocument};

    fn pass(engine: Engine, kind: PassKind) -> BakePass {
        BakePass {
            activated: true,
            engine,
            kind,
            samples: 64,
            ao_distance: 2.5,
            influence: 1.0,
            suffix: String::new(),
            environment: EnvironmentPolicy::Scene,
            normal_space: None,
            swizzle: Swizzle::default(),
        }
    }

    fn job() -> BakeJob {
        let mut job: BakeJob = serde_json::from_str(r#"{ "name": "t" }"#).unwrap();
        job.margin = 8;
        job.antialiasing = AaFactor::None;
        job
    }

    #[test]
    fn engines_write_disjoint_settings() {
        let mut scene = SceneRecord::new("s");
        Engine::Raytrace.configure(&mut scene, &job(), &pass(Engine::Raytrace, PassKind::Ao));
        match scene.bake {
            Some(BakeSettings::Raytrace(ref s)) => {
                assert_eq!(s.samples, 64);
                assert_eq!(s.ao_distance, 2.5);
            }
            ref other => panic!("unexpected settings: {other:?}"),
        }

        Engine::Scanline.configure(&mut scene, &job(), &pass(Engine::Scanline, PassKind::Normal));
        match scene.bake {
            Some(BakeSettings::Scanline(ref s)) => {
                assert_eq!(s.margin, 8);
                assert_eq!(s.normal_space, NormalSpace::Tangent);
            }
            ref other => panic!("unexpected settings: {other:?}"),
        }
    }

    #[test]
    fn raytrace_target_wires_node_into_every_material() {
        let mut doc = MemoryDocument::new("Scene");
        doc.add_mesh(MeshRecord::new("m")).unwrap();
        doc.add_material(MaterialRecord::new("a")).unwrap();
        doc.add_material(MaterialRecord::new("b")).unwrap();
        let mut obj = ObjectRecord::new(
            "low",
            ObjectData::Mesh {
                mesh: "m".to_string(),
            },
        );
        obj.material_slots = vec![Some("a".to_string()), Some("b".to_string())];
        doc.add_object("Scene", obj).unwrap();

        Engine::Raytrace
            .attach_target(&mut doc, "low", None, "target-img")
            .unwrap();
        for name in ["a", "b"] {
            let material = doc.material(name).unwrap();
            assert!(material.use_nodes);
            let idx = material.tree.find(naming::TARGET_NODE).unwrap();
            assert_eq!(material.tree.active, Some(idx));
        }
    }

    #[test]
    fn scanline_target_assigns_uv_channel_image() {
        let mut doc = MemoryDocument::new("Scene");
        doc.add_mesh(MeshRecord::new("m")).unwrap();
        let mut obj = ObjectRecord::new(
            "low",
            ObjectData::Mesh {
                mesh: "m".to_string(),
            },
        );
        obj.uv_channels = vec![UvChannel {
            name: "atlas-uv".to_string(),
            target_image: None,
        }];
        obj.active_uv = Some(0);
        doc.add_object("Scene", obj).unwrap();

        Engine::Scanline
            .attach_target(&mut doc, "low", Some("atlas-uv"), "target-img")
            .unwrap();
        let obj = doc.object("low").unwrap();
        assert_eq!(
            obj.uv_channels[0].target_image.as_deref(),
            Some("target-img")
        );
    }
}
