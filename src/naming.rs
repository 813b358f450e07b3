//! Reserved names for sandbox entities and deterministic output naming.
//!
//! Every entity duplicated into a bake sandbox is renamed to its original
//! name plus [`RESERVED_SUFFIX`]. The document layer refuses to create user
//! entities whose name carries the marker, so a suffixed name can never
//! collide with an unsuffixed original, and the original name is always
//! recoverable by stripping the suffix.

use xxhash_rust::xxh3::xxh3_64;

use crate::config::BakeJob;

/// Appended to every asset duplicated into a bake sandbox.
pub const RESERVED_SUFFIX: &str = ".bake-tmp";

/// Canonical name of the sandbox scene (one sandbox exists at a time).
pub const SANDBOX_SCENE: &str = "sys.bake.sandbox";

/// Canonical name of the sandbox world (only one world is active at a time).
pub const SANDBOX_WORLD: &str = "sys.bake.world";

/// Throwaway scene used to run the margin/anti-alias compositing graph.
pub const COMPOSITE_SCENE: &str = "sys.bake.compo";

/// Shared render target image, created fresh per pass.
pub const TARGET_IMAGE: &str = "sys.bake.target";

/// Image-sampling node wired into lowpoly materials to receive the bake.
pub const TARGET_NODE: &str = "sys.bake.target-node";

/// Placeholder material for lowpoly objects that own no material slot.
pub const PLACEHOLDER_MATERIAL: &str = "sys.bake.placeholder";

/// Names the host may never hand out to user entities.
pub fn is_reserved(name: &str) -> bool {
    name.contains(RESERVED_SUFFIX) || name.starts_with("sys.bake.")
}

pub fn sandbox_name(original: &str) -> String {
    format!("{original}{RESERVED_SUFFIX}")
}

pub fn is_sandbox_name(name: &str) -> bool {
    name.ends_with(RESERVED_SUFFIX)
}

/// Recover the original name from a sandbox-suffixed one.
pub fn origin_of(name: &str) -> Option<&str> {
    name.strip_suffix(RESERVED_SUFFIX)
}

/// Deterministic atlas name for a job's output files.
///
/// An explicit shared-atlas name wins, then the job name; with neither, the
/// name is derived from the content: an xxh3 hash of the concatenated
/// activated lowpoly names, so re-running the same pairing yields the same
/// files.
pub fn atlas_name(job: &BakeJob) -> String {
    if let Some(atlas) = job.atlas.as_deref()
        && !atlas.is_empty()
    {
        return atlas.to_string();
    }
    if !job.name.is_empty() {
        return job.name.clone();
    }
    let mut joined = String::new();
    for pair in job.pairs.iter().filter(|p| p.activated) {
        joined.push_str(&pair.lowpoly);
        joined.push('\n');
    }
    format!("atlas-{:016x}", xxh3_64(joined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn suffix_roundtrip() {
        assert_eq!(origin_of(&sandbox_name("Cube")), Some("Cube"));
        assert!(is_sandbox_name(&sandbox_name("Cube")));
        assert!(!is_sandbox_name("Cube"));
    }

    #[test]
    fn canonical_names_are_reserved() {
        for name in [
            SANDBOX_SCENE,
            SANDBOX_WORLD,
            COMPOSITE_SCENE,
            TARGET_IMAGE,
            PLACEHOLDER_MATERIAL,
        ] {
            assert!(is_reserved(name), "{name} must be reserved");
        }
    }

    proptest! {
        // Distinct originals must map to distinct sandbox names, and a
        // sandbox name must never equal any legal (unreserved) original.
        #[test]
        fn suffixing_is_collision_free(a in "[A-Za-z0-9 ._-]{1,24}", b in "[A-Za-z0-9 ._-]{1,24}") {
            prop_assume!(!is_reserved(&a) && !is_reserved(&b));
            if a != b {
                prop_assert_ne!(sandbox_name(&a), sandbox_name(&b));
            }
            prop_assert_ne!(sandbox_name(&a), b.clone());
            let sandboxed_a = sandbox_name(&a);
            prop_assert_eq!(origin_of(&sandboxed_a), Some(a.as_str()));
        }
    }
}
