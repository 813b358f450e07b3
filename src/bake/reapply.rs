//! Rebuild lowpoly materials from the baked maps.
//!
//! The only persistent mutation the whole run makes outside the output
//! files: each lowpoly object's material is cleared and re-filled with one
//! texture slot per pass, in canonical layer order, with blend mode and
//! influence derived from the pass semantics.

use anyhow::{Context, Result};

use crate::config::{BakeJob, BakePass};
use crate::document::Document;
use crate::document::types::{AssetKind, TextureRecord, TextureSlot};

pub fn apply_baked_maps<D: Document>(doc: &mut D, job: &BakeJob) -> Result<()> {
    let mut passes: Vec<&BakePass> = job.active_passes().collect();
    passes.sort_by_key(|p| p.kind.reapply_order());

    let mut done: Vec<&str> = Vec::new();
    for pair in job.active_pairs() {
        if done.contains(&pair.lowpoly.as_str()) {
            continue;
        }
        done.push(&pair.lowpoly);

        // Reuse the object's first material, or give it one.
        let material_name = match doc
            .object(&pair.lowpoly)?
            .material_slots
            .iter()
            .flatten()
            .next()
            .cloned()
        {
            Some(name) => name,
            None => {
                let name = format!("{}-baked", pair.lowpoly);
                if !doc.exists(AssetKind::Material, &name) {
                    doc.add_material(crate::document::types::MaterialRecord::new(&name))?;
                }
                let object = doc.object_mut(&pair.lowpoly)?;
                object.material_slots.push(Some(name.clone()));
                object.active_material = Some(object.material_slots.len() - 1);
                name
            }
        };

        {
            let material = doc.material_mut(&material_name)?;
            material.diffuse_color = [0.0, 0.0, 0.0];
            material.shadeless = true;
            material.texture_slots.clear();
        }

        for pass in &passes {
            let path = pass.file_path(job);
            let image = doc
                .load_image(&path)
                .with_context(|| format!("baked map for pass '{}'", pass.output_suffix()))?;

            let texture_name = pass.file_name(job);
            if !doc.exists(AssetKind::Texture, &texture_name) {
                doc.add_texture(TextureRecord {
                    name: texture_name.clone(),
                    origin: None,
                    image: Some(image),
                })?;
            }

            let mut slot = TextureSlot::new(texture_name, pass.kind.blend_mode());
            if pass.kind.drives_diffuse_color() {
                slot.use_map_color = true;
                slot.color_factor = pass.influence;
            }
            if pass.kind.drives_emit() {
                slot.use_map_emit = true;
                slot.emit_factor = pass.influence;
            }
            if pass.kind.drives_specular() {
                slot.use_map_specular = true;
                slot.specular_factor = pass.influence;
            }
            if pass.kind.drives_normal() {
                slot.use_map_normal = true;
                slot.normal_factor = pass.influence;
            }

            let material = doc.material_mut(&material_name)?;
            let idx = material.first_empty_slot();
            material.texture_slots[idx] = Some(slot);
        }

        log::debug!(
            "[reapply] '{}' now references {} baked map(s)",
            pair.lowpoly,
            passes.len()
        );
    }
    Ok(())
}
