//! Post-process stage: resolve margins/anti-aliasing and write the map.
//!
//! Runs once per pass, after every pair has baked into the shared target.
//! The compositing scene is as throwaway as the bake sandbox and must be
//! gone before the next pass starts.

use std::path::PathBuf;

use anyhow::Result;

use crate::compositor::{self, CompositeOutput};
use crate::config::{BakeJob, BakePass};
use crate::document::Document;
use crate::naming;

use super::engine::Renderer;

pub fn resolve<D: Document, R: Renderer<D>>(
    doc: &mut D,
    renderer: &mut R,
    job: &BakeJob,
    pass: &BakePass,
) -> Result<PathBuf> {
    let path = pass.file_path(job);

    doc.create_scene(naming::COMPOSITE_SCENE)?;
    let graph = compositor::build_margin_graph(job, naming::TARGET_IMAGE);
    let output = CompositeOutput {
        path: path.clone(),
        format: job.format,
        resolution: job.resolution,
        compression: 0,
    };
    let result = renderer.composite(doc, naming::COMPOSITE_SCENE, &graph, &output);
    // The throwaway compositing scene must not outlive the pass, also when
    // the render failed.
    doc.delete_scene(naming::COMPOSITE_SCENE)?;
    result?;

    log::debug!("[compo] resolved pass '{}' to {}", pass.output_suffix(), path.display());
    Ok(path)
}
