use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// On-disk layout of the working area for one source/destination pair.
///
/// Directory names are derived from stable content hashes of the repository
/// locations so that distinct pairs never collide and re-runs find their
/// state again. The hash is a naming device, nothing more.
#[derive(Debug, Clone)]
pub struct WorkArea {
    pub root: PathBuf,
    pub mirror_dir: PathBuf,
    pub worker_dir: PathBuf,
    pub lock_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub map_snapshot: PathBuf,
}

impl WorkArea {
    pub fn new(root: &Path, source: &str, destination: &str) -> WorkArea {
        let source_digest = digest16(source.as_bytes());
        let pair_digest = digest16(format!("{source}\n{destination}").as_bytes());
        WorkArea {
            root: root.to_path_buf(),
            mirror_dir: root.join(format!("source-{source_digest}")),
            worker_dir: root.join(format!("worker-{pair_digest}")),
            lock_path: root.join(format!("worker-{pair_digest}.lock")),
            scratch_dir: root.join(format!("worker-{pair_digest}.filter-branch")),
            map_snapshot: root.join(format!("worker-{pair_digest}.map")),
        }
    }

    /// Create the working-area root and return a layout rooted at its
    /// canonical path. Everything here is later handed to git subprocesses
    /// running in other directories, so relative roots must be resolved
    /// up front.
    pub fn create(root: &Path, source: &str, destination: &str) -> io::Result<WorkArea> {
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        Ok(WorkArea::new(&root, source, destination))
    }

    /// Remove the per-rewrite transient files (engine scratch directory and
    /// mapping snapshot). The engine refuses to start when its scratch
    /// directory already exists.
    pub fn clear_transients(&self) -> io::Result<()> {
        if self.scratch_dir.exists() {
            fs::remove_dir_all(&self.scratch_dir)?;
        }
        if self.map_snapshot.exists() {
            fs::remove_file(&self.map_snapshot)?;
        }
        Ok(())
    }
}

/// Stable 128-bit content hash, hex-encoded (SHA-256 truncated to 16
/// bytes). Stability across toolchain versions matters because the digest
/// names persistent directories.
fn digest16(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    let mut out = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
