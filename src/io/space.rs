/// Free disk space lookup
use std::path::Path;

/// Bytes available to unprivileged users on the filesystem holding `path`.
///
/// Walks up to the nearest existing ancestor so a not-yet-created output
/// directory can be checked. Returns `None` if the value cannot be determined.
pub fn available_space(path: &Path) -> Option<u64> {
    let existing = path.ancestors().find(|p| !p.as_os_str().is_empty() && p.exists())?;
    query(existing)
}

#[cfg(unix)]
fn query(path: &Path) -> Option<u64> {
    match nix::sys::statvfs::statvfs(path) {
        Ok(stat) => {
            let blocks = stat.blocks_available() as u64;
            let fragment = stat.fragment_size() as u64;
            Some(blocks.saturating_mul(fragment))
        }
        Err(errno) => {
            tracing::debug!(path = %path.display(), error = %errno, "statvfs failed");
            None
        }
    }
}

#[cfg(not(unix))]
fn query(_path: &Path) -> Option<u64> {
    None
}
