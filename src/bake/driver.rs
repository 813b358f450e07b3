//! Job driver: jobs -> passes -> pairs, with validation gates up front and
//! material reassignment at the end.
//!
//! Strictly sequential; the shared-target accumulation protocol depends on
//! pair N-1 having fully completed (including sandbox teardown) before pair
//! N starts.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;

use crate::config::{BakeJob, BakePair, BakePass};
use crate::document::Document;
use crate::document::types::{AssetKind, ImageRecord};
use crate::naming;
use crate::progress::{ProgressEvent, ProgressSink};

use super::engine::Renderer;
use super::executor::{self, PassRunState};
use super::sandbox::Sandbox;
use super::{BakeReport, RunStatus, composite, prep, reapply, validation};

pub fn run_jobs<D: Document, R: Renderer<D>>(
    doc: &mut D,
    renderer: &mut R,
    jobs: &[BakeJob],
    progress: &dyn ProgressSink,
) -> Result<BakeReport> {
    let started = Instant::now();
    let mut messages = Vec::new();

    // Validation gates: nothing in the document is touched until the whole
    // configuration checks out.
    let problems = validation::preflight(doc, jobs);
    if !problems.is_empty() {
        for problem in &problems {
            log::warn!("[driver] {problem}");
        }
        messages.extend(problems);
        let report = BakeReport {
            status: RunStatus::Cancelled,
            messages,
            elapsed: started.elapsed(),
        };
        progress.event(&ProgressEvent::RunFinished {
            status: report.status,
            elapsed: report.elapsed,
        });
        return Ok(report);
    }

    let source_scene = doc.active_scene().to_string();
    let active_jobs: Vec<&BakeJob> = jobs.iter().filter(|j| j.activated).collect();
    progress.event(&ProgressEvent::RunStarted {
        jobs: active_jobs.len(),
    });

    for (job_index, job) in active_jobs.iter().enumerate() {
        let job_label = naming::atlas_name(job);
        progress.event(&ProgressEvent::JobStarted {
            job: job_label.clone(),
            index: job_index,
            total: active_jobs.len(),
        });

        let passes: Vec<&BakePass> = job.active_passes().collect();
        let pairs: Vec<&BakePair> = job.active_pairs().collect();
        for (pass_index, pass) in passes.iter().enumerate() {
            progress.event(&ProgressEvent::PassStarted {
                job: job_label.clone(),
                pass: pass.output_suffix().to_string(),
                index: pass_index,
                total: passes.len(),
            });

            let pass_result = bake_one_pass(
                doc,
                renderer,
                job,
                pass,
                &pairs,
                &source_scene,
                &job_label,
                progress,
            );
            // The shared target never outlives its pass, also on failure.
            if doc.exists(AssetKind::Image, naming::TARGET_IMAGE) {
                doc.remove(AssetKind::Image, naming::TARGET_IMAGE)?;
            }
            let path = pass_result?;

            messages.push(format!("wrote {}", path.display()));
            progress.event(&ProgressEvent::PassWritten {
                job: job_label.clone(),
                pass: pass.output_suffix().to_string(),
                path,
            });
        }

        progress.event(&ProgressEvent::JobFinished {
            job: job_label.clone(),
        });
    }

    // Final material reassignment, once every job's maps are on disk. The
    // lowpoly materials are the run's only persistent document mutation.
    for job in &active_jobs {
        reapply::apply_baked_maps(doc, job)?;
    }

    let report = BakeReport {
        status: RunStatus::Finished,
        messages,
        elapsed: started.elapsed(),
    };
    progress.event(&ProgressEvent::RunFinished {
        status: report.status,
        elapsed: report.elapsed,
    });
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn bake_one_pass<D: Document, R: Renderer<D>>(
    doc: &mut D,
    renderer: &mut R,
    job: &BakeJob,
    pass: &BakePass,
    pairs: &[&BakePair],
    source_scene: &str,
    job_label: &str,
    progress: &dyn ProgressSink,
) -> Result<PathBuf> {
    let [width, height] = job.render_resolution();
    doc.add_image(ImageRecord::new_generated(
        naming::TARGET_IMAGE,
        width,
        height,
    ))?;

    let mut state = PassRunState::default();
    for (pair_index, pair) in pairs.iter().enumerate() {
        let mut sandbox = Sandbox::clone_from(doc, source_scene, pair)?;
        let baked = match prep::prepare(doc, &sandbox, job, pass, pair) {
            Ok(prepared) => executor::bake_pair(
                doc, renderer, &mut sandbox, job, pass, pair, &prepared, &mut state,
            ),
            Err(e) => Err(e),
        };
        // Teardown always runs; only then may a bake failure abort the run.
        sandbox.destroy(doc)?;
        baked?;

        progress.event(&ProgressEvent::PairBaked {
            job: job_label.to_string(),
            pass: pass.output_suffix().to_string(),
            lowpoly: pair.lowpoly.clone(),
            index: pair_index,
            total: pairs.len(),
        });
    }
    debug_assert_eq!(state.pairs_baked() as usize, pairs.len());

    composite::resolve(doc, renderer, job, pass)
}
