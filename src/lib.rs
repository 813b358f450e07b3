//! Batch texture-bake orchestration.
//!
//! Jobs pair lowpoly and highpoly meshes with a queue of render passes;
//! each pass bakes pair-by-pair into a shared atlas target inside an
//! isolated sandbox copy of the scene, resolves margins/anti-aliasing
//! through a compositor graph, writes the map to disk, and finally rebuilds
//! the lowpoly materials from the results.
//!
//! The host scene graph sits behind [`document::Document`]; the renderer
//! behind [`bake::Renderer`]. [`headless`] provides in-memory
//! implementations of both sides for tests and script runs.

pub mod bake;
pub mod compositor;
pub mod config;
pub mod document;
pub mod headless;
pub mod naming;
pub mod progress;

pub use bake::{BakeReport, RunStatus, run_jobs};
pub use config::{BakeJob, BakePair, BakePass, Project, load_project_from_path};
pub use document::{Document, MemoryDocument};
pub use headless::HeadlessRenderer;
