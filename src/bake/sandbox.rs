//! Sandbox scene lifecycle: isolated deep copy in, guaranteed teardown out.
//!
//! Every pair bake runs inside a full copy of the source scene. Copies are
//! renamed to their original name plus the reserved suffix (injective and
//! reversible via the origin tag), group-instance proxies are realized into
//! individually-owned objects, and teardown frees exactly the entities the
//! copy ledger lists: objects first, then data blocks, then the container.

use anyhow::{Result, anyhow, bail};

use crate::config::{BakePair, HighpolyRef};
use crate::document::types::{AssetKind, ObjectData, SceneCopy};
use crate::document::Document;
use crate::naming;

/// Nested instancing deeper than this is a cycle, not a scene.
const MAX_INSTANCE_DEPTH: usize = 1000;

pub struct Sandbox {
    scene: String,
    source_scene: String,
    highpoly_group: Option<String>,
    ledger: SceneCopy,
}

impl Sandbox {
    /// Duplicate `source_scene` into a fresh sandbox for one pair bake.
    pub fn clone_from<D: Document>(
        doc: &mut D,
        source_scene: &str,
        pair: &BakePair,
    ) -> Result<Sandbox> {
        // Stamp originals with their own names so every copy can be told
        // apart from its source afterwards.
        doc.tag_origins();
        let ledger = doc.full_copy_scene(source_scene, naming::SANDBOX_SCENE)?;
        doc.set_active_scene(naming::SANDBOX_SCENE)?;

        let mut sandbox = Sandbox {
            scene: naming::SANDBOX_SCENE.to_string(),
            source_scene: source_scene.to_string(),
            highpoly_group: match &pair.highpoly {
                Some(HighpolyRef::Group(group)) => Some(naming::sandbox_name(group)),
                _ => None,
            },
            ledger,
        };

        let mut prepared = sandbox.apply_suffixes(doc);
        if prepared.is_ok() {
            prepared = sandbox.realize_instances(doc);
        }
        if let Err(e) = prepared {
            // A half-built sandbox must not outlive the failed clone.
            let _ = sandbox.destroy(doc);
            return Err(e);
        }
        Ok(sandbox)
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    pub fn source_scene(&self) -> &str {
        &self.source_scene
    }

    pub fn highpoly_group(&self) -> Option<&str> {
        self.highpoly_group.as_deref()
    }

    /// Register a material created inside the sandbox (e.g. the lowpoly
    /// placeholder) so teardown reclaims it.
    pub fn track_material(&mut self, name: String) {
        self.ledger.materials.push(name);
    }

    /// Rename every copied entity whose name now differs from its origin
    /// tag to `origin + suffix`; the world gets its single canonical name.
    fn apply_suffixes<D: Document>(&mut self, doc: &mut D) -> Result<()> {
        fn suffix_all<D: Document>(
            doc: &mut D,
            kind: AssetKind,
            names: &mut [String],
        ) -> Result<()> {
            for name in names {
                let origin = doc
                    .origin(kind, name)
                    .ok_or_else(|| anyhow!("copied {kind:?} '{name}' has no origin tag"))?;
                if *name != origin {
                    let target = naming::sandbox_name(&origin);
                    doc.rename(kind, name, &target)?;
                    *name = target;
                }
            }
            Ok(())
        }

        suffix_all(doc, AssetKind::Object, &mut self.ledger.objects)?;
        suffix_all(doc, AssetKind::Mesh, &mut self.ledger.meshes)?;
        suffix_all(doc, AssetKind::Material, &mut self.ledger.materials)?;
        suffix_all(doc, AssetKind::Texture, &mut self.ledger.textures)?;
        suffix_all(doc, AssetKind::Image, &mut self.ledger.images)?;
        suffix_all(doc, AssetKind::Group, &mut self.ledger.groups)?;

        // Only one world is active at a time, so the copy takes one
        // canonical temporary name instead of a per-original suffix.
        for name in &mut self.ledger.worlds {
            doc.rename(AssetKind::World, name, naming::SANDBOX_WORLD)?;
            *name = naming::SANDBOX_WORLD.to_string();
        }
        Ok(())
    }

    /// Convert group-instance proxies into real, individually-owned object
    /// copies, recursively, composing transforms through nested instancing.
    /// Realized objects whose ancestor instance sits inside the active
    /// highpoly group inherit that group membership.
    fn realize_instances<D: Document>(&mut self, doc: &mut D) -> Result<()> {
        for _ in 0..MAX_INSTANCE_DEPTH {
            let instance = doc
                .scene(&self.scene)?
                .objects
                .iter()
                .find_map(|name| {
                    let object = doc.object(name).ok()?;
                    match &object.data {
                        ObjectData::Instance { group } => {
                            Some((name.clone(), group.clone(), object.transform))
                        }
                        _ => None,
                    }
                });
            let Some((instance_name, group_name, instance_transform)) = instance else {
                return Ok(());
            };

            let members = doc.group(&group_name)?.members.clone();
            let in_highpoly = match &self.highpoly_group {
                Some(hp) => doc.group(hp)?.members.iter().any(|m| *m == instance_name),
                None => false,
            };

            for member in members {
                let realized = format!("{instance_name}/{member}");
                let mut record = doc.object(&member)?.clone();
                record.name = realized.clone();
                record.transform = instance_transform * record.transform;
                doc.add_object(&self.scene, record)?;
                if in_highpoly
                    && let Some(hp) = self.highpoly_group.clone()
                {
                    doc.group_mut(&hp)?.members.push(realized.clone());
                }
                self.ledger.objects.push(realized);
            }

            doc.unlink_and_delete_object(&self.scene, &instance_name)?;
        }
        bail!("group instance expansion did not converge (cyclic groups?)");
    }

    /// Tear the sandbox down. Deletion order matters for the host's
    /// reference-counted model: objects before data blocks before the scene
    /// container. Entities already pruned by pass preparation are skipped.
    pub fn destroy<D: Document>(self, doc: &mut D) -> Result<()> {
        // The active scene may have been switched externally while the bake
        // ran; re-acquire context so deletion targets the right document.
        doc.set_active_scene(&self.source_scene)?;

        for name in &self.ledger.objects {
            if doc.exists(AssetKind::Object, name) {
                doc.unlink_and_delete_object(&self.scene, name)?;
            }
        }
        for name in &self.ledger.meshes {
            if doc.exists(AssetKind::Mesh, name) {
                doc.remove(AssetKind::Mesh, name)?;
            }
        }
        for name in &self.ledger.materials {
            if doc.exists(AssetKind::Material, name) {
                doc.remove(AssetKind::Material, name)?;
            }
        }
        for name in &self.ledger.textures {
            if doc.exists(AssetKind::Texture, name) {
                doc.remove(AssetKind::Texture, name)?;
            }
        }
        for name in &self.ledger.images {
            if doc.exists(AssetKind::Image, name) {
                doc.remove(AssetKind::Image, name)?;
            }
        }
        for name in &self.ledger.groups {
            if doc.exists(AssetKind::Group, name) {
                doc.remove(AssetKind::Group, name)?;
            }
        }
        for name in &self.ledger.worlds {
            if doc.exists(AssetKind::World, name) {
                doc.remove(AssetKind::World, name)?;
            }
        }
        doc.delete_scene(&self.scene)?;
        log::debug!("[sandbox] torn down, context back on '{}'", self.source_scene);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Projection;
    use crate::document::types::{
        GroupRecord, MaterialRecord, MeshRecord, ObjectRecord, WorldRecord,
    };
    use crate::document::MemoryDocument;
    use glam::{Mat4, Vec3};

    fn pair(lowpoly: &str, highpoly: Option<HighpolyRef>) -> BakePair {
        BakePair {
            activated: true,
            lowpoly: lowpoly.to_string(),
            highpoly,
            projection: Projection::default(),
            use_highpoly: true,
        }
    }

    fn mesh_object(name: &str, mesh: &str) -> ObjectRecord {
        ObjectRecord::new(
            name,
            ObjectData::Mesh {
                mesh: mesh.to_string(),
            },
        )
    }

    fn base_doc() -> MemoryDocument {
        let mut doc = MemoryDocument::new("Scene");
        doc.add_world(WorldRecord::new("World")).unwrap();
        doc.scene_mut("Scene").unwrap().world = Some("World".to_string());
        doc.add_mesh(MeshRecord::new("low-mesh")).unwrap();
        doc.add_mesh(MeshRecord::new("high-mesh")).unwrap();
        doc.add_material(MaterialRecord::new("paint")).unwrap();
        doc.add_object("Scene", mesh_object("low", "low-mesh"))
            .unwrap();
        let mut high = mesh_object("high", "high-mesh");
        high.material_slots = vec![Some("paint".to_string())];
        doc.add_object("Scene", high).unwrap();
        doc
    }

    #[test]
    fn clone_applies_reserved_suffixes() {
        let mut doc = base_doc();
        let sandbox =
            Sandbox::clone_from(&mut doc, "Scene", &pair("low", None)).unwrap();

        assert!(doc.exists(AssetKind::Object, &naming::sandbox_name("low")));
        assert!(doc.exists(AssetKind::Object, &naming::sandbox_name("high")));
        assert!(doc.exists(AssetKind::Material, &naming::sandbox_name("paint")));
        assert!(doc.exists(AssetKind::World, naming::SANDBOX_WORLD));
        // Originals untouched.
        assert!(doc.exists(AssetKind::Object, "low"));
        assert!(doc.exists(AssetKind::Material, "paint"));

        sandbox.destroy(&mut doc).unwrap();
    }

    #[test]
    fn clone_destroy_is_count_idempotent() {
        let mut doc = base_doc();
        let before = doc.counts();
        for _ in 0..3 {
            let sandbox =
                Sandbox::clone_from(&mut doc, "Scene", &pair("low", None)).unwrap();
            sandbox.destroy(&mut doc).unwrap();
            assert_eq!(doc.counts(), before);
        }
        assert_eq!(doc.active_scene(), "Scene");
    }

    #[test]
    fn instances_are_realized_with_composed_transforms() {
        let mut doc = base_doc();
        doc.add_group(GroupRecord {
            name: "rocks".to_string(),
            origin: None,
            members: vec!["high".to_string()],
        })
        .unwrap();
        let mut proxy = ObjectRecord::new(
            "proxy",
            ObjectData::Instance {
                group: "rocks".to_string(),
            },
        );
        proxy.transform = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
        doc.add_object("Scene", proxy).unwrap();

        let before = doc.counts();
        let sandbox =
            Sandbox::clone_from(&mut doc, "Scene", &pair("low", None)).unwrap();

        let scene = doc.scene(naming::SANDBOX_SCENE).unwrap();
        assert!(
            scene
                .objects
                .iter()
                .all(|o| !matches!(doc.object(o).unwrap().data, ObjectData::Instance { .. })),
            "no instance proxies may survive realization"
        );
        let realized = format!(
            "{}/{}",
            naming::sandbox_name("proxy"),
            naming::sandbox_name("high")
        );
        let record = doc.object(&realized).unwrap();
        assert_eq!(record.transform.w_axis.x, 2.0);

        sandbox.destroy(&mut doc).unwrap();
        assert_eq!(doc.counts(), before);
    }

    #[test]
    fn realized_members_join_the_active_highpoly_group() {
        let mut doc = base_doc();
        doc.add_group(GroupRecord {
            name: "rocks".to_string(),
            origin: None,
            members: vec!["high".to_string()],
        })
        .unwrap();
        let proxy = ObjectRecord::new(
            "proxy",
            ObjectData::Instance {
                group: "rocks".to_string(),
            },
        );
        doc.add_object("Scene", proxy).unwrap();
        doc.add_group(GroupRecord {
            name: "hp-set".to_string(),
            origin: None,
            members: vec!["proxy".to_string()],
        })
        .unwrap();

        let sandbox = Sandbox::clone_from(
            &mut doc,
            "Scene",
            &pair("low", Some(HighpolyRef::Group("hp-set".to_string()))),
        )
        .unwrap();

        let hp = doc.group(&naming::sandbox_name("hp-set")).unwrap();
        let realized = format!(
            "{}/{}",
            naming::sandbox_name("proxy"),
            naming::sandbox_name("high")
        );
        assert!(hp.members.contains(&realized));

        sandbox.destroy(&mut doc).unwrap();
    }
}
