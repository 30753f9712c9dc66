// Atomic file writes: write to a temp file, sync, then rename over the destination
//
// The destination is either the old content or the new content, never a
// partially written file. A crash can leave a stray temp file behind, which
// `is_temp_file_name` recognises for cleanup.

use super::is_cross_device;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const TEMP_SUFFIX: &str = "tmp";
const RANDOM_LEN: usize = 6;

/// `<name>.<epoch-ms>.<random>.tmp`
pub fn temp_file_name(destination: &Path) -> String {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let millis = chrono::Utc::now().timestamp_millis();
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_LEN)
        .map(char::from)
        .collect();

    format!("{}.{}.{}.{}", name, millis, random, TEMP_SUFFIX)
}

/// Temp path for a destination, staged in `temp_dir` or next to the destination
pub fn temp_path_for(destination: &Path, temp_dir: Option<&Path>) -> PathBuf {
    let dir = match temp_dir {
        Some(dir) => dir.to_path_buf(),
        None => destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    dir.join(temp_file_name(destination))
}

/// Recognise names produced by `temp_file_name`
pub fn is_temp_file_name(name: &str) -> bool {
    let mut parts = name.rsplitn(4, '.');
    let (Some(suffix), Some(random), Some(millis), Some(stem)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    suffix == TEMP_SUFFIX
        && !stem.is_empty()
        && random.len() == RANDOM_LEN
        && random.chars().all(|c| c.is_ascii_alphanumeric())
        && !millis.is_empty()
        && millis.chars().all(|c| c.is_ascii_digit())
}

/// Write `content` to `destination` atomically
pub async fn write_atomic(destination: &Path, temp_dir: Option<&Path>, content: &[u8]) -> io::Result<()> {
    let temp = temp_path_for(destination, temp_dir);
    if let Some(dir) = temp.parent() {
        fs::create_dir_all(dir).await?;
    }

    let result = write_and_commit(&temp, destination, content).await;
    if result.is_err() {
        remove_quietly(&temp).await;
    }
    result
}

async fn write_and_commit(temp: &Path, destination: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(temp).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    match fs::rename(temp, destination).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            // Temp dir lives on another filesystem, stage a second copy beside the destination
            tracing::debug!(
                temp = %temp.display(),
                destination = %destination.display(),
                "Cross-device rename, staging next to destination"
            );
            let sibling = temp_path_for(destination, None);
            let staged = async {
                fs::copy(temp, &sibling).await?;
                fs::rename(&sibling, destination).await
            }
            .await;
            if staged.is_err() {
                remove_quietly(&sibling).await;
            }
            remove_quietly(temp).await;
            staged
        }
        Err(e) => Err(e),
    }
}

/// Best-effort removal, missing files are fine
pub async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::debug!(path = %path.display(), error = %e, "Failed to remove temp file");
        }
    }
}
