//! Build identity, stamped by `build.rs`.

/// Crate version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const GIT_BRANCH: Option<&str> = option_env!("VERGEN_GIT_BRANCH");
const GIT_SHA: Option<&str> = option_env!("VERGEN_GIT_SHA");
const GIT_DIRTY: Option<&str> = option_env!("VERGEN_GIT_DIRTY");

/// Short commit hash, if the build ran inside a git checkout.
pub fn commit() -> Option<&'static str> {
    GIT_SHA.map(|sha| &sha[..sha.len().min(7)])
}

/// Version shown in logs: `0.1.0+main.abc1234`, with `.dirty` appended for
/// uncommitted trees. Tarball builds report just the crate version.
pub fn version_string() -> String {
    match (GIT_BRANCH, commit()) {
        (Some(branch), Some(sha)) => {
            let dirty = if GIT_DIRTY == Some("true") { ".dirty" } else { "" };
            format!("{PKG_VERSION}+{branch}.{sha}{dirty}")
        }
        _ => PKG_VERSION.to_string(),
    }
}
