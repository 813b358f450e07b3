//! Compositor graph handed to the renderer after each pass.
//!
//! The orchestrator only *describes* the post-process: a margin dilation to
//! pad UV island borders, and, when anti-aliasing is on, a 4-tap
//! supersample average built from four transform branches mixed pairwise at
//! 0.5. Executing the graph is the renderer's job.

use std::path::PathBuf;

use crate::config::{BakeJob, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleFilter {
    Bilinear,
    Bicubic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompositorNode {
    /// Source image by document name.
    Image { image: String },
    /// Extend opaque pixel content outward by `distance` pixels.
    Inpaint { distance: u32 },
    /// Scale about the canvas center with a sub-pixel offset, resampling
    /// with the given filter.
    Transform {
        scale: f32,
        offset: [f32; 2],
        filter: ResampleFilter,
    },
    /// Blend the two inputs; `factor` weights the second input.
    Mix { factor: f32 },
    /// Terminal node; whatever arrives here is written to disk.
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphLink {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompositorGraph {
    pub nodes: Vec<(String, CompositorNode)>,
    pub links: Vec<GraphLink>,
}

impl CompositorGraph {
    pub fn add(&mut self, name: &str, node: CompositorNode) {
        self.nodes.push((name.to_string(), node));
    }

    pub fn link(&mut self, from: &str, to: &str) {
        self.links.push(GraphLink {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    pub fn node(&self, name: &str) -> Option<&CompositorNode> {
        self.nodes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    /// Upstream node names feeding `name`, in link order.
    pub fn inputs_of(&self, name: &str) -> Vec<&str> {
        self.links
            .iter()
            .filter(|l| l.to == name)
            .map(|l| l.from.as_str())
            .collect()
    }
}

/// What the renderer writes after evaluating the graph.
#[derive(Debug, Clone)]
pub struct CompositeOutput {
    pub path: PathBuf,
    pub format: OutputFormat,
    /// Final canvas size (the job resolution, already downsampled).
    pub resolution: [u32; 2],
    /// Zero: baked maps must not lose data to the encoder.
    pub compression: u8,
}

/// Build the margin/anti-alias graph for one pass of a job.
///
/// The working buffer is oversized by the AA factor, so the dilation margin
/// scales with it; the transform branches scale back down by its inverse.
/// Without AA the graph degenerates to image -> inpaint -> output.
pub fn build_margin_graph(job: &BakeJob, target_image: &str) -> CompositorGraph {
    let factor = job.antialiasing.factor();
    let margin = job.margin * factor;

    let mut graph = CompositorGraph::default();
    graph.add(
        "image",
        CompositorNode::Image {
            image: target_image.to_string(),
        },
    );
    graph.add("inpaint", CompositorNode::Inpaint { distance: margin });
    graph.link("image", "inpaint");

    if job.antialiasing.enabled() {
        let scale = 1.0 / factor as f32;
        let w = (1.0 - job.aa_sharpness) / 2.0;
        let offsets = [[-w, w], [w, w], [-w, -w], [w, -w]];
        for (i, offset) in offsets.into_iter().enumerate() {
            let name = format!("tf{}", i + 1);
            graph.add(
                &name,
                CompositorNode::Transform {
                    scale,
                    offset,
                    filter: ResampleFilter::Bicubic,
                },
            );
            graph.link("inpaint", &name);
        }
        graph.add("mix1", CompositorNode::Mix { factor: 0.5 });
        graph.add("mix2", CompositorNode::Mix { factor: 0.5 });
        graph.add("mix3", CompositorNode::Mix { factor: 0.5 });
        graph.link("tf1", "mix1");
        graph.link("tf2", "mix1");
        graph.link("tf3", "mix2");
        graph.link("tf4", "mix2");
        graph.link("mix1", "mix3");
        graph.link("mix2", "mix3");
        graph.add("output", CompositorNode::Output);
        graph.link("mix3", "output");
    } else {
        graph.add("output", CompositorNode::Output);
        graph.link("inpaint", "output");
    }

    graph
}
