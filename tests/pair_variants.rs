//! Pair configuration variants driven end-to-end through the headless run.

use bake_forge::bake::RunStatus;
use bake_forge::config::BakeJob;
use bake_forge::document::types::{
    GroupRecord, MaterialRecord, MeshRecord, ObjectData, ObjectRecord,
};
use bake_forge::document::{Document, MemoryDocument};
use bake_forge::progress::NullProgress;
use bake_forge::{HeadlessRenderer, run_jobs};

fn base_doc() -> MemoryDocument {
    let mut doc = MemoryDocument::new("Scene");
    doc.add_material(MaterialRecord::new("paint")).unwrap();
    for name in ["low", "high"] {
        let mesh = format!("{name}-mesh");
        doc.add_mesh(MeshRecord::new(&mesh)).unwrap();
        let mut object = ObjectRecord::new(name, ObjectData::Mesh { mesh });
        object.material_slots = vec![Some("paint".to_string())];
        doc.add_object("Scene", object).unwrap();
    }
    doc
}

fn job_json(output: &std::path::Path, pairs: &str) -> BakeJob {
    serde_json::from_str(&format!(
        r#"{{
            "name": "variant",
            "resolution": [16, 16],
            "margin": 1,
            "output": "{}",
            "pairs": [{pairs}],
            "passes": [{{ "kind": "emit" }}]
        }}"#,
        output.display()
    ))
    .unwrap()
}

#[test]
fn lowpoly_only_pair_bakes_its_own_surface() {
    let output = std::env::temp_dir().join("bake-forge-variant-lowonly");
    let _ = std::fs::remove_dir_all(&output);
    let mut doc = base_doc();
    let mut renderer = HeadlessRenderer::new();
    let job = job_json(&output, r#"{ "lowpoly": "low" }"#);

    let report = run_jobs(&mut doc, &mut renderer, &[job], &NullProgress).unwrap();
    assert_eq!(report.status, RunStatus::Finished);
    // No highpoly: selected-to-active transfer is off, config untouched.
    assert!(!renderer.invocations()[0].use_selected_to_active);
    assert!(output.join("variant_emit.png").exists());
}

#[test]
fn instanced_group_highpoly_realizes_and_cleans_up() {
    let output = std::env::temp_dir().join("bake-forge-variant-instanced");
    let _ = std::fs::remove_dir_all(&output);

    let mut doc = base_doc();
    doc.add_group(GroupRecord {
        name: "detail".to_string(),
        origin: None,
        members: vec!["high".to_string()],
    })
    .unwrap();
    let proxy = ObjectRecord::new(
        "detail-proxy",
        ObjectData::Instance {
            group: "detail".to_string(),
        },
    );
    doc.add_object("Scene", proxy).unwrap();
    doc.add_group(GroupRecord {
        name: "hp".to_string(),
        origin: None,
        members: vec!["high".to_string(), "detail-proxy".to_string()],
    })
    .unwrap();

    let counts_before = doc.counts();
    let mut renderer = HeadlessRenderer::new();
    let job = job_json(
        &output,
        r#"{ "lowpoly": "low", "highpoly": { "group": "hp" } }"#,
    );

    let report = run_jobs(&mut doc, &mut renderer, &[job], &NullProgress).unwrap();
    assert_eq!(report.status, RunStatus::Finished);
    assert!(renderer.invocations()[0].use_selected_to_active);

    // The instance proxy still exists in the source scene; all realized
    // sandbox copies are gone.
    assert!(doc.object("detail-proxy").is_ok());
    assert_eq!(doc.counts().objects, counts_before.objects);
    assert_eq!(doc.counts().groups, counts_before.groups);
    assert_eq!(doc.counts().scenes, counts_before.scenes);
}
