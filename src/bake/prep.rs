//! Per-pass scene preparation inside the sandbox.
//!
//! Ordering matters: renderer settings first, then selection/visibility
//! resolution for the pair, then environment pulls, then the prune that
//! isolates the sandbox to exactly what the pass needs, then pass-specific
//! material rewrites.

use anyhow::Result;

use crate::config::{BakeJob, BakePair, BakePass, EnvironmentPolicy, HighpolyRef, PassKind};
use crate::document::Document;
use crate::naming;

use super::sandbox::Sandbox;

/// Flags resolved at prepare time. The pair configuration itself is
/// read-only; graceful degradation lands here instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedPair {
    pub use_highpoly: bool,
}

/// Sandbox object names making up a highpoly reference (the object itself,
/// or the group's members).
pub fn highpoly_members<D: Document>(doc: &D, highpoly: &HighpolyRef) -> Result<Vec<String>> {
    match highpoly {
        HighpolyRef::Object(name) => Ok(vec![naming::sandbox_name(name)]),
        HighpolyRef::Group(name) => {
            Ok(doc.group(&naming::sandbox_name(name))?.members.clone())
        }
    }
}

fn select_highpoly<D: Document>(doc: &mut D, highpoly: &HighpolyRef) -> Result<()> {
    for name in highpoly_members(doc, highpoly)? {
        doc.object_mut(&name)?.show_and_select();
    }
    Ok(())
}

pub fn prepare<D: Document>(
    doc: &mut D,
    sandbox: &Sandbox,
    job: &BakeJob,
    pass: &BakePass,
    pair: &BakePair,
) -> Result<PreparedPair> {
    // 1) Push pass parameters into the sandbox's renderer configuration.
    let scene = doc.scene_mut(sandbox.scene())?;
    pass.engine.configure(scene, job, pass);
    let world = scene.world.clone();
    if let Some(world) = world {
        doc.world_mut(&world)?.ao_distance = pass.ao_distance;
    }

    // 2) Clear all selection state.
    let objects = doc.scene(sandbox.scene())?.objects.clone();
    for name in &objects {
        doc.object_mut(name)?.selected = false;
    }

    // 3) Highpoly visibility/selection; a pair without highpoly falls back
    // to lowpoly-only baking.
    let use_highpoly = pair.effective_use_highpoly();
    if let Some(highpoly) = &pair.highpoly {
        select_highpoly(doc, highpoly)?;
    }

    // 4) Lowpoly is visible, selected and active.
    let lowpoly = naming::sandbox_name(&pair.lowpoly);
    doc.object_mut(&lowpoly)?.show_and_select();
    doc.scene_mut(sandbox.scene())?.active_object = Some(lowpoly);

    // 5) The cage must exist for the bake call to reference, but never
    // appear in the output.
    let cage = pair
        .projection
        .cage()
        .map(|name| naming::sandbox_name(name));
    if let Some(cage) = &cage {
        let object = doc.object_mut(cage)?;
        object.hide = true;
        object.hide_render = true;
    }

    // 6) Environment pulls beyond the pair itself.
    match &pass.environment {
        EnvironmentPolicy::Scene | EnvironmentPolicy::Isolated => {}
        EnvironmentPolicy::AllHighpoly => {
            for other in job.active_pairs() {
                if let Some(highpoly) = &other.highpoly {
                    select_highpoly(doc, highpoly)?;
                }
            }
        }
        EnvironmentPolicy::Group(group) => {
            let members = doc.group(&naming::sandbox_name(group))?.members.clone();
            for name in members {
                doc.object_mut(&name)?.show_and_select();
            }
        }
    }

    // 7) Prune everything left unselected, but only when the pass asked
    // for an environment policy that removes something. A pass with no
    // environment request keeps the full scene.
    if pass.environment != EnvironmentPolicy::Scene {
        let objects = doc.scene(sandbox.scene())?.objects.clone();
        for name in objects {
            if cage.as_deref() == Some(name.as_str()) {
                continue;
            }
            if !doc.object(&name)?.selected {
                doc.unlink_and_delete_object(sandbox.scene(), &name)?;
            }
        }
    }

    // 8) Material-id passes flatten every highpoly material to its base
    // diffuse color so the bake yields a flat id map.
    if pass.kind == PassKind::MaterialId
        && let Some(highpoly) = &pair.highpoly
    {
        for name in highpoly_members(doc, highpoly)? {
            let slots: Vec<String> = doc
                .object(&name)?
                .material_slots
                .iter()
                .flatten()
                .cloned()
                .collect();
            for slot in slots {
                doc.material_mut(&slot)?.flatten_to_diffuse();
            }
        }
    }

    Ok(PreparedPair { use_highpoly })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AaFactor, Engine, Projection, Swizzle};
    use crate::document::types::{
        AssetKind, GroupRecord, MaterialNode, MaterialRecord, MeshRecord, ObjectData, ObjectRecord,
        WorldRecord,
    };
    use crate::document::MemoryDocument;

    fn mesh_object(name: &str, mesh: &str) -> ObjectRecord {
        ObjectRecord::new(
            name,
            ObjectData::Mesh {
                mesh: mesh.to_string(),
            },
        )
    }

    fn doc_with(objects: &[&str]) -> MemoryDocument {
        let mut doc = MemoryDocument::new("Scene");
        doc.add_world(WorldRecord::new("World")).unwrap();
        doc.scene_mut("Scene").unwrap().world = Some("World".to_string());
        doc.add_material(MaterialRecord::new("paint")).unwrap();
        for name in objects {
            let mesh = format!("{name}-mesh");
            doc.add_mesh(MeshRecord::new(&mesh)).unwrap();
            let mut object = mesh_object(name, &mesh);
            object.material_slots = vec![Some("paint".to_string())];
            doc.add_object("Scene", object).unwrap();
        }
        doc
    }

    fn pair(lowpoly: &str, highpoly: Option<HighpolyRef>) -> BakePair {
        BakePair {
            activated: true,
            lowpoly: lowpoly.to_string(),
            highpoly,
            projection: Projection::default(),
            use_highpoly: true,
        }
    }

    fn pass(kind: PassKind, environment: EnvironmentPolicy) -> BakePass {
        BakePass {
            activated: true,
            engine: Engine::Raytrace,
            kind,
            samples: 4,
            ao_distance: 1.0,
            influence: 1.0,
            suffix: String::new(),
            environment,
            normal_space: None,
            swizzle: Swizzle::default(),
        }
    }

    fn job(pairs: Vec<BakePair>) -> BakeJob {
        let mut job: BakeJob = serde_json::from_str(r#"{ "name": "t" }"#).unwrap();
        job.antialiasing = AaFactor::None;
        job.pairs = pairs;
        job
    }

    #[test]
    fn scene_policy_never_prunes() {
        let mut doc = doc_with(&["low", "high", "bystander"]);
        let pair = pair("low", Some(HighpolyRef::Object("high".to_string())));
        let job = job(vec![pair.clone()]);
        let sandbox = Sandbox::clone_from(&mut doc, "Scene", &pair).unwrap();

        prepare(
            &mut doc,
            &sandbox,
            &job,
            &pass(PassKind::Normal, EnvironmentPolicy::Scene),
            &pair,
        )
        .unwrap();

        assert!(doc.exists(AssetKind::Object, &naming::sandbox_name("bystander")));
        sandbox.destroy(&mut doc).unwrap();
    }

    #[test]
    fn isolated_policy_prunes_everything_unselected() {
        let mut doc = doc_with(&["low", "high", "bystander"]);
        let pair = pair("low", Some(HighpolyRef::Object("high".to_string())));
        let job = job(vec![pair.clone()]);
        let sandbox = Sandbox::clone_from(&mut doc, "Scene", &pair).unwrap();

        prepare(
            &mut doc,
            &sandbox,
            &job,
            &pass(PassKind::Normal, EnvironmentPolicy::Isolated),
            &pair,
        )
        .unwrap();

        assert!(!doc.exists(AssetKind::Object, &naming::sandbox_name("bystander")));
        assert!(doc.exists(AssetKind::Object, &naming::sandbox_name("low")));
        assert!(doc.exists(AssetKind::Object, &naming::sandbox_name("high")));
        sandbox.destroy(&mut doc).unwrap();
    }

    #[test]
    fn cage_is_hidden_and_survives_pruning() {
        let mut doc = doc_with(&["low", "high", "cage"]);
        let mut pair = pair("low", Some(HighpolyRef::Object("high".to_string())));
        pair.projection = Projection::Cage("cage".to_string());
        let job = job(vec![pair.clone()]);
        let sandbox = Sandbox::clone_from(&mut doc, "Scene", &pair).unwrap();

        prepare(
            &mut doc,
            &sandbox,
            &job,
            &pass(PassKind::Normal, EnvironmentPolicy::Isolated),
            &pair,
        )
        .unwrap();

        let cage = doc.object(&naming::sandbox_name("cage")).unwrap();
        assert!(cage.hide);
        assert!(cage.hide_render);
        sandbox.destroy(&mut doc).unwrap();
    }

    #[test]
    fn all_highpoly_policy_pulls_other_pairs() {
        let mut doc = doc_with(&["low-a", "high-a", "low-b", "high-b"]);
        let pair_a = pair("low-a", Some(HighpolyRef::Object("high-a".to_string())));
        let pair_b = pair("low-b", Some(HighpolyRef::Object("high-b".to_string())));
        let job = job(vec![pair_a.clone(), pair_b]);
        let sandbox = Sandbox::clone_from(&mut doc, "Scene", &pair_a).unwrap();

        prepare(
            &mut doc,
            &sandbox,
            &job,
            &pass(PassKind::Ao, EnvironmentPolicy::AllHighpoly),
            &pair_a,
        )
        .unwrap();

        // The other pair's highpoly stays for occlusion context; its lowpoly
        // is pruned.
        assert!(doc.exists(AssetKind::Object, &naming::sandbox_name("high-b")));
        assert!(!doc.exists(AssetKind::Object, &naming::sandbox_name("low-b")));
        sandbox.destroy(&mut doc).unwrap();
    }

    #[test]
    fn material_id_flattens_highpoly_materials() {
        let mut doc = doc_with(&["low", "high"]);
        doc.material_mut("paint").unwrap().diffuse_color = [0.2, 0.4, 0.6];
        let pair = pair("low", Some(HighpolyRef::Object("high".to_string())));
        let job = job(vec![pair.clone()]);
        let sandbox = Sandbox::clone_from(&mut doc, "Scene", &pair).unwrap();

        prepare(
            &mut doc,
            &sandbox,
            &job,
            &pass(PassKind::MaterialId, EnvironmentPolicy::Scene),
            &pair,
        )
        .unwrap();

        let material = doc.material(&naming::sandbox_name("paint")).unwrap();
        assert!(material.use_nodes);
        match material.tree.nodes.first() {
            Some((_, MaterialNode::DiffuseBsdf { color })) => {
                assert_eq!(&color[..3], &[0.2, 0.4, 0.6]);
            }
            other => panic!("expected flat diffuse graph, got {other:?}"),
        }
        // The original material is untouched.
        assert!(!doc.material("paint").unwrap().use_nodes);
        sandbox.destroy(&mut doc).unwrap();
    }

    #[test]
    fn group_environment_policy_keeps_members() {
        let mut doc = doc_with(&["low", "high", "env-a", "env-b", "stray"]);
        doc.add_group(GroupRecord {
            name: "env".to_string(),
            origin: None,
            members: vec!["env-a".to_string(), "env-b".to_string()],
        })
        .unwrap();
        let pair = pair("low", Some(HighpolyRef::Object("high".to_string())));
        let job = job(vec![pair.clone()]);
        let sandbox = Sandbox::clone_from(&mut doc, "Scene", &pair).unwrap();

        prepare(
            &mut doc,
            &sandbox,
            &job,
            &pass(
                PassKind::Combined,
                EnvironmentPolicy::Group("env".to_string()),
            ),
            &pair,
        )
        .unwrap();

        assert!(doc.exists(AssetKind::Object, &naming::sandbox_name("env-a")));
        assert!(doc.exists(AssetKind::Object, &naming::sandbox_name("env-b")));
        assert!(!doc.exists(AssetKind::Object, &naming::sandbox_name("stray")));
        sandbox.destroy(&mut doc).unwrap();
    }

    #[test]
    fn missing_highpoly_degrades_to_lowpoly_only() {
        let mut doc = doc_with(&["low"]);
        let pair = pair("low", None);
        let job = job(vec![pair.clone()]);
        let sandbox = Sandbox::clone_from(&mut doc, "Scene", &pair).unwrap();

        let prepared = prepare(
            &mut doc,
            &sandbox,
            &job,
            &pass(PassKind::Normal, EnvironmentPolicy::Scene),
            &pair,
        )
        .unwrap();

        assert!(!prepared.use_highpoly);
        // Config stays untouched.
        assert!(pair.use_highpoly);
        sandbox.destroy(&mut doc).unwrap();
    }
}
