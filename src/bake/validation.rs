//! Pre-flight validation gates.
//!
//! Everything here runs before any scene is cloned. Problems are collected
//! into one aggregated report; any problem cancels the run cleanly with the
//! host document untouched.

use crate::config::{BakeJob, EnvironmentPolicy, HighpolyRef};
use crate::document::Document;
use crate::document::types::AssetKind;
use crate::naming;

/// Returns every configuration problem found; an empty list means the run
/// may proceed. Output directories are created as a side effect (their
/// creation failing is itself a gate).
pub fn preflight<D: Document>(doc: &D, jobs: &[BakeJob]) -> Vec<String> {
    let mut problems = Vec::new();

    let active: Vec<&BakeJob> = jobs.iter().filter(|j| j.activated).collect();
    if active.is_empty() {
        problems.push("no activated bake jobs".to_string());
        return problems;
    }

    for job in active {
        let label = naming::atlas_name(job);
        if job.active_pairs().next().is_none() {
            problems.push(format!("job '{label}': no activated pairs"));
        }
        if job.active_passes().next().is_none() {
            problems.push(format!("job '{label}': no activated passes"));
        }
        if let Err(e) = std::fs::create_dir_all(&job.output) {
            problems.push(format!(
                "job '{label}': cannot create output directory {}: {e}",
                job.output.display()
            ));
        }

        for pair in job.active_pairs() {
            if !doc.exists(AssetKind::Object, &pair.lowpoly) {
                problems.push(format!(
                    "job '{label}': unknown lowpoly object '{}'",
                    pair.lowpoly
                ));
            }
            if let Some(cage) = pair.projection.cage()
                && !doc.exists(AssetKind::Object, cage)
            {
                problems.push(format!("job '{label}': unknown cage object '{cage}'"));
            }
            match &pair.highpoly {
                None => {}
                Some(HighpolyRef::Object(name)) => {
                    if !doc.exists(AssetKind::Object, name) {
                        problems.push(format!(
                            "job '{label}': unknown highpoly object '{name}'"
                        ));
                    } else {
                        check_materials(doc, &label, std::slice::from_ref(name), &mut problems);
                    }
                }
                Some(HighpolyRef::Group(name)) => match doc.group(name) {
                    Err(_) => problems.push(format!(
                        "job '{label}': unknown highpoly group '{name}'"
                    )),
                    Ok(group) => {
                        check_materials(doc, &label, &group.members, &mut problems);
                    }
                },
            }
        }

        for pass in job.active_passes() {
            if let EnvironmentPolicy::Group(group) = &pass.environment
                && !doc.exists(AssetKind::Group, group)
            {
                problems.push(format!(
                    "job '{label}': unknown environment group '{group}'"
                ));
            }
        }
    }

    problems
}

/// An unmaterialled highpoly bakes as empty/garbage, so every referenced
/// member must own at least one material before anything is cloned.
/// Instance proxies carry no materials themselves; their instanced group's
/// members are checked instead.
fn check_materials<D: Document>(
    doc: &D,
    job_label: &str,
    members: &[String],
    problems: &mut Vec<String>,
) {
    for name in members {
        check_member(doc, job_label, name, problems, 0);
    }
}

fn check_member<D: Document>(
    doc: &D,
    job_label: &str,
    name: &str,
    problems: &mut Vec<String>,
    depth: usize,
) {
    if depth > 64 {
        problems.push(format!(
            "job '{job_label}': instance nesting too deep at '{name}'"
        ));
        return;
    }
    match doc.object(name) {
        Err(_) => problems.push(format!(
            "job '{job_label}': unknown highpoly object '{name}'"
        )),
        Ok(object) => match &object.data {
            crate::document::types::ObjectData::Instance { group } => match doc.group(group) {
                Ok(group) => {
                    for member in group.members.clone() {
                        check_member(doc, job_label, &member, problems, depth + 1);
                    }
                }
                Err(_) => problems.push(format!(
                    "job '{job_label}': object '{name}' instances unknown group '{group}'"
                )),
            },
            _ => {
                if !object.has_any_material() {
                    problems.push(format!(
                        "job '{job_label}': highpoly object '{name}' has no material"
                    ));
                }
            }
        },
    }
}
