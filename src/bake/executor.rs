//! One pair, one renderer invocation into the shared target.

use anyhow::Result;

use crate::config::{BakeJob, BakePair, BakePass, Engine, Projection};
use crate::document::Document;
use crate::document::types::MaterialRecord;
use crate::naming;

use super::engine::{BakeRequest, Renderer};
use super::prep::PreparedPair;
use super::sandbox::Sandbox;

/// Accumulation state for one pass. The shared target is cleared by the
/// first pair and accumulated into by every later one; the driver creates a
/// fresh state per pass, so the counter is zero exactly at pass start.
#[derive(Debug, Default)]
pub struct PassRunState {
    pairs_baked: u32,
}

impl PassRunState {
    pub fn first_pair(&self) -> bool {
        self.pairs_baked == 0
    }

    pub fn pairs_baked(&self) -> u32 {
        self.pairs_baked
    }

    fn record_pair(&mut self) {
        self.pairs_baked += 1;
    }
}

pub fn bake_pair<D: Document, R: Renderer<D>>(
    doc: &mut D,
    renderer: &mut R,
    sandbox: &mut Sandbox,
    job: &BakeJob,
    pass: &BakePass,
    pair: &BakePair,
    prepared: &PreparedPair,
    state: &mut PassRunState,
) -> Result<()> {
    let lowpoly = naming::sandbox_name(&pair.lowpoly);

    // The bake needs at least one material slot on the lowpoly to hook the
    // target into; node-enabled only for the node-based engine.
    if !doc.object(&lowpoly)?.has_any_material() {
        let mut placeholder = MaterialRecord::new(naming::PLACEHOLDER_MATERIAL);
        placeholder.use_nodes = pass.engine == Engine::Raytrace;
        doc.add_material(placeholder)?;
        let object = doc.object_mut(&lowpoly)?;
        object
            .material_slots
            .push(Some(naming::PLACEHOLDER_MATERIAL.to_string()));
        object.active_material = Some(object.material_slots.len() - 1);
        sandbox.track_material(naming::PLACEHOLDER_MATERIAL.to_string());
    }

    pass.engine.attach_target(
        doc,
        &lowpoly,
        job.uv_channel.as_deref(),
        naming::TARGET_IMAGE,
    )?;

    // The cage reference must point at the sandbox copy.
    let projection = match &pair.projection {
        Projection::Cage(cage) => Projection::Cage(naming::sandbox_name(cage)),
        Projection::Extrusion(distance) => Projection::Extrusion(*distance),
    };

    let clear = state.first_pair();
    state.record_pair();

    let [width, height] = job.render_resolution();
    let request = BakeRequest {
        target: naming::TARGET_IMAGE.to_string(),
        width,
        height,
        kind: pass.kind,
        use_selected_to_active: prepared.use_highpoly,
        projection,
        normal_space: pass.normal_space(),
        swizzle: pass.swizzle,
        clear,
    };
    // Failure is fatal for the whole run: a partially accumulated atlas
    // cannot be re-attempted per object.
    renderer.bake(doc, sandbox.scene(), &request)
}
