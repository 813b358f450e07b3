//! Headless reference renderer.
//!
//! Stands in for the host's rendering/compositing engine in the binary and
//! the test suite: bakes are deterministic flat fills keyed on pass kind
//! and source object, composites interpret the node graph naively on CPU
//! buffers. Every bake invocation is recorded so tests can assert the
//! clear/accumulate protocol without inspecting pixels.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Result, anyhow, bail};
use xxhash_rust::xxh3::xxh3_64;

use crate::bake::engine::{BakeRequest, Renderer};
use crate::compositor::{CompositeOutput, CompositorGraph, CompositorNode};
use crate::config::OutputFormat;
use crate::document::Document;

#[derive(Default)]
pub struct HeadlessRenderer {
    invocations: Vec<BakeRequest>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        HeadlessRenderer::default()
    }

    /// Every bake request seen so far, in order.
    pub fn invocations(&self) -> &[BakeRequest] {
        &self.invocations
    }
}

impl<D: Document> Renderer<D> for HeadlessRenderer {
    fn bake(&mut self, doc: &mut D, scene: &str, request: &BakeRequest) -> Result<()> {
        let active = doc
            .scene(scene)?
            .active_object
            .clone()
            .ok_or_else(|| anyhow!("bake invoked without an active object"))?;

        let image = doc.image_mut(&request.target)?;
        if image.width != request.width || image.height != request.height {
            bail!(
                "bake target is {}x{}, request wants {}x{}",
                image.width,
                image.height,
                request.width,
                request.height
            );
        }

        // Flat color derived from (pass kind, active object): stable across
        // runs, distinct across pairs.
        let seed = xxh3_64(format!("{:?}/{active}", request.kind).as_bytes());
        let color = [
            ((seed >> 16) & 0xff) as f32 / 255.0,
            ((seed >> 8) & 0xff) as f32 / 255.0,
            (seed & 0xff) as f32 / 255.0,
        ];

        if request.clear {
            image.pixels.fill([0.0; 4]);
        }
        for pixel in &mut image.pixels {
            pixel[0] += color[0];
            pixel[1] += color[1];
            pixel[2] += color[2];
            pixel[3] = 1.0;
        }

        self.invocations.push(request.clone());
        log::debug!(
            "[headless] baked {:?} for '{active}' (clear={})",
            request.kind,
            request.clear
        );
        Ok(())
    }

    fn composite(
        &mut self,
        doc: &mut D,
        _scene: &str,
        graph: &CompositorGraph,
        output: &CompositeOutput,
    ) -> Result<()> {
        let terminal = graph
            .nodes
            .iter()
            .find(|(_, node)| matches!(node, CompositorNode::Output))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| anyhow!("compositor graph has no output node"))?;

        let mut memo: HashMap<String, Buffer> = HashMap::new();
        let buffer = eval_node(doc, graph, &terminal, output.resolution, &mut memo)?;
        if [buffer.width, buffer.height] != output.resolution {
            bail!(
                "composited buffer is {}x{}, expected {}x{}",
                buffer.width,
                buffer.height,
                output.resolution[0],
                output.resolution[1]
            );
        }

        write_buffer(&buffer, output)?;
        log::debug!("[headless] wrote {}", output.path.display());
        Ok(())
    }
}

#[derive(Clone)]
struct Buffer {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl Buffer {
    fn get(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width as usize + x]
    }

    fn sample_bilinear(&self, x: f32, y: f32) -> [f32; 4] {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let mut out = [0.0f32; 4];
        for c in 0..4 {
            let top = self.get(x0, y0)[c] * (1.0 - fx) + self.get(x0 + 1, y0)[c] * fx;
            let bottom = self.get(x0, y0 + 1)[c] * (1.0 - fx) + self.get(x0 + 1, y0 + 1)[c] * fx;
            out[c] = top * (1.0 - fy) + bottom * fy;
        }
        out
    }
}

fn eval_node<D: Document>(
    doc: &D,
    graph: &CompositorGraph,
    name: &str,
    canvas: [u32; 2],
    memo: &mut HashMap<String, Buffer>,
) -> Result<Buffer> {
    if let Some(cached) = memo.get(name) {
        return Ok(cached.clone());
    }
    let node = graph
        .node(name)
        .ok_or_else(|| anyhow!("compositor graph references unknown node '{name}'"))?;
    let inputs = graph.inputs_of(name);
    let mut input_buffer = |index: usize| -> Result<Buffer> {
        let upstream = inputs
            .get(index)
            .ok_or_else(|| anyhow!("node '{name}' is missing input {index}"))?;
        eval_node(doc, graph, upstream, canvas, memo)
    };

    let buffer = match node {
        CompositorNode::Image { image } => {
            let record = doc.image(image)?;
            Buffer {
                width: record.width,
                height: record.height,
                pixels: record.pixels.clone(),
            }
        }
        CompositorNode::Inpaint { distance } => dilate(input_buffer(0)?, *distance),
        CompositorNode::Transform { scale, offset, .. } => {
            let input = input_buffer(0)?;
            let [width, height] = canvas;
            let mut pixels = Vec::with_capacity((width * height) as usize);
            let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
            let (icx, icy) = (input.width as f32 / 2.0, input.height as f32 / 2.0);
            for y in 0..height {
                for x in 0..width {
                    let sx = (x as f32 + 0.5 - cx) / scale + icx - offset[0] - 0.5;
                    let sy = (y as f32 + 0.5 - cy) / scale + icy - offset[1] - 0.5;
                    pixels.push(input.sample_bilinear(sx, sy));
                }
            }
            Buffer {
                width,
                height,
                pixels,
            }
        }
        CompositorNode::Mix { factor } => {
            let a = input_buffer(0)?;
            let b = input_buffer(1)?;
            if (a.width, a.height) != (b.width, b.height) {
                bail!("mix node '{name}' inputs differ in size");
            }
            let pixels = a
                .pixels
                .iter()
                .zip(&b.pixels)
                .map(|(pa, pb)| {
                    let mut out = [0.0f32; 4];
                    for c in 0..4 {
                        out[c] = pa[c] * (1.0 - factor) + pb[c] * factor;
                    }
                    out
                })
                .collect();
            Buffer {
                width: a.width,
                height: a.height,
                pixels,
            }
        }
        CompositorNode::Output => input_buffer(0)?,
    };

    memo.insert(name.to_string(), buffer.clone());
    Ok(buffer)
}

/// Grow opaque content outward one pixel per iteration, `distance` times.
fn dilate(mut buffer: Buffer, distance: u32) -> Buffer {
    let (width, height) = (buffer.width as i64, buffer.height as i64);
    for _ in 0..distance {
        let source = buffer.pixels.clone();
        let read = |x: i64, y: i64| -> Option<[f32; 4]> {
            if x < 0 || y < 0 || x >= width || y >= height {
                return None;
            }
            let p = source[(y * width + x) as usize];
            (p[3] > 0.0).then_some(p)
        };
        let mut grew = false;
        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) as usize;
                if source[idx][3] > 0.0 {
                    continue;
                }
                let mut sum = [0.0f32; 4];
                let mut hits = 0u32;
                for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                    if let Some(p) = read(x + dx, y + dy) {
                        for c in 0..3 {
                            sum[c] += p[c];
                        }
                        hits += 1;
                    }
                }
                if hits > 0 {
                    let n = hits as f32;
                    buffer.pixels[idx] = [sum[0] / n, sum[1] / n, sum[2] / n, 1.0];
                    grew = true;
                }
            }
        }
        if !grew {
            break;
        }
    }
    buffer
}

fn write_buffer(buffer: &Buffer, output: &CompositeOutput) -> Result<()> {
    match output.format {
        OutputFormat::Png => {
            let data: Vec<u8> = buffer
                .pixels
                .iter()
                .flat_map(|p| p.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
                .collect();
            let img = image::RgbaImage::from_raw(buffer.width, buffer.height, data)
                .ok_or_else(|| anyhow!("rgba buffer size mismatch"))?;
            img.save(&output.path)?;
        }
        OutputFormat::Jpeg => {
            let data: Vec<u8> = buffer
                .pixels
                .iter()
                .flat_map(|p| {
                    [p[0], p[1], p[2]].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
                })
                .collect();
            let img = image::RgbImage::from_raw(buffer.width, buffer.height, data)
                .ok_or_else(|| anyhow!("rgb buffer size mismatch"))?;
            img.save(&output.path)?;
        }
        OutputFormat::Exr => {
            let data: Vec<f32> = buffer.pixels.iter().flat_map(|p| *p).collect();
            let img = image::Rgba32FImage::from_raw(buffer.width, buffer.height, data)
                .ok_or_else(|| anyhow!("float buffer size mismatch"))?;
            img.save(&output.path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::build_margin_graph;
    use crate::config::AaFactor;
    use crate::document::types::ImageRecord;
    use crate::document::{Document, MemoryDocument};

    fn doc_with_target(width: u32, height: u32) -> MemoryDocument {
        let mut doc = MemoryDocument::new("Scene");
        let mut image = ImageRecord::new_generated("target", width, height);
        // A single opaque pixel so dilation has something to grow.
        image.pixels[(height / 2 * width + width / 2) as usize] = [1.0, 0.5, 0.25, 1.0];
        doc.add_image(image).unwrap();
        doc
    }

    fn job(aa: AaFactor, resolution: u32) -> crate::config::BakeJob {
        let mut job: crate::config::BakeJob =
            serde_json::from_str(r#"{ "name": "t" }"#).unwrap();
        job.resolution = [resolution, resolution];
        job.antialiasing = aa;
        job.margin = 2;
        job
    }

    #[test]
    fn passthrough_composite_writes_canvas_sized_file() {
        let mut doc = doc_with_target(32, 32);
        let mut renderer = HeadlessRenderer::new();
        let graph = build_margin_graph(&job(AaFactor::None, 32), "target");
        let dir = std::env::temp_dir().join("bake-forge-headless");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("passthrough.png");
        let output = CompositeOutput {
            path: path.clone(),
            format: OutputFormat::Png,
            resolution: [32, 32],
            compression: 0,
        };
        Renderer::<MemoryDocument>::composite(&mut renderer, &mut doc, "Scene", &graph, &output)
            .unwrap();

        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (32, 32));
    }

    #[test]
    fn aa_composite_downsamples_to_job_resolution() {
        let mut doc = doc_with_target(64, 64);
        let mut renderer = HeadlessRenderer::new();
        let graph = build_margin_graph(&job(AaFactor::X2, 32), "target");
        let dir = std::env::temp_dir().join("bake-forge-headless");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("downsampled.png");
        let output = CompositeOutput {
            path: path.clone(),
            format: OutputFormat::Png,
            resolution: [32, 32],
            compression: 0,
        };
        Renderer::<MemoryDocument>::composite(&mut renderer, &mut doc, "Scene", &graph, &output)
            .unwrap();

        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (32, 32));
    }

    #[test]
    fn dilation_grows_opaque_content() {
        let mut buffer = Buffer {
            width: 5,
            height: 5,
            pixels: vec![[0.0; 4]; 25],
        };
        buffer.pixels[12] = [1.0, 1.0, 1.0, 1.0];
        let grown = dilate(buffer, 2);
        // Manhattan distance 2 from the center is now opaque.
        assert!(grown.pixels[2][3] > 0.0);
        // Corners (distance 4) stay transparent.
        assert_eq!(grown.pixels[0][3], 0.0);
    }

    #[test]
    fn clear_then_accumulate_fill_semantics() {
        let mut doc = doc_with_target(4, 4);
        doc.scene_mut("Scene").unwrap().active_object = Some("obj".to_string());
        let mut renderer = HeadlessRenderer::new();
        let request = BakeRequest {
            target: "target".to_string(),
            width: 4,
            height: 4,
            kind: crate::config::PassKind::Normal,
            use_selected_to_active: true,
            projection: crate::config::Projection::Extrusion(0.5),
            normal_space: crate::config::NormalSpace::Tangent,
            swizzle: crate::config::Swizzle::default(),
            clear: true,
        };
        Renderer::<MemoryDocument>::bake(&mut renderer, &mut doc, "Scene", &request).unwrap();
        let first = doc.image("target").unwrap().pixels[0];

        let again = BakeRequest {
            clear: false,
            ..request
        };
        Renderer::<MemoryDocument>::bake(&mut renderer, &mut doc, "Scene", &again).unwrap();
        let second = doc.image("target").unwrap().pixels[0];

        assert!((second[0] - first[0] * 2.0).abs() < 1e-6);
        assert_eq!(renderer.invocations().len(), 2);
    }
}
