//! Per-job working sets.
//!
//! A [`WorkingSet`] owns one directory under the configured work root,
//! named after the job id. Everything a run creates (downloads, stage
//! outputs, frame directories, transform files, caption documents) lives
//! inside it, so cleanup is a single recursive removal when the set is
//! dropped. Only [`WorkingSet::promote`] moves a file out, into the output
//! directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rf_core::{JobId, StageKind};
use tempfile::{TempDir, TempPath};

/// Working set for one pipeline run.
///
/// # Example
///
/// ```no_run
/// use rf_av::WorkingSet;
/// use rf_core::JobId;
/// use std::path::Path;
///
/// let ws = WorkingSet::create(Path::new("/tmp/reelforge"), Path::new("./output"), JobId::new())?;
/// let intermediate = ws.file("stabilize", "mp4");
/// // ... a tool writes `intermediate` ...
/// let delivered = ws.promote(&intermediate)?;
/// # Ok::<(), rf_core::Error>(())
/// ```
pub struct WorkingSet {
    job_id: JobId,
    dir: TempDir,
    output_dir: PathBuf,
    counter: AtomicUsize,
    fetched: Mutex<HashMap<String, PathBuf>>,
}

impl WorkingSet {
    /// Create the job directory `<root>/<job_id>-XXXX` and make sure the
    /// output directory exists.
    pub fn create(root: &Path, output_dir: &Path, job_id: JobId) -> rf_core::Result<Self> {
        // Tools run with the job directory as cwd, so every path we hand
        // out must be absolute.
        let root = std::path::absolute(root)?;
        let output_dir = std::path::absolute(output_dir)?;
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(&output_dir)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{job_id}-"))
            .tempdir_in(&root)
            .map_err(|e| {
                rf_core::Error::Internal(format!(
                    "failed to create job directory in {}: {e}",
                    root.display()
                ))
            })?;

        tracing::debug!("job {job_id}: working directory {}", dir.path().display());

        Ok(Self {
            job_id,
            dir,
            output_dir,
            counter: AtomicUsize::new(0),
            fetched: Mutex::new(HashMap::new()),
        })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// The job directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// A fresh, unused path `<dir>/<stem>_<n>.<ext>`. Nothing is created.
    pub fn file(&self, stem: &str, ext: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.dir.path().join(format!("{stem}_{n}.{ext}"))
    }

    /// Output path for a stage's intermediate video.
    pub fn stage_output(&self, stage: StageKind) -> PathBuf {
        self.file(stage.as_str(), "mp4")
    }

    /// Create a fresh frame directory; it is removed when the returned
    /// handle is dropped.
    pub fn frame_dir(&self, label: &str) -> rf_core::Result<TempDir> {
        tempfile::Builder::new()
            .prefix(&format!("{label}_frames_"))
            .tempdir_in(self.dir.path())
            .map_err(Into::into)
    }

    /// Reserve a stabilization transform file; it is removed when the
    /// returned handle is dropped.
    pub fn transform_file(&self) -> rf_core::Result<TempPath> {
        let file = tempfile::Builder::new()
            .prefix("stabilize_transform_")
            .suffix(".trf")
            .tempfile_in(self.dir.path())?;
        Ok(file.into_temp_path())
    }

    /// Whether `path` lives inside this working set.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(self.dir.path())
    }

    /// Delete a member of the working set as soon as it is no longer needed.
    ///
    /// Paths outside the working set (caller-owned inputs) are left alone.
    pub fn release(&self, path: &Path) {
        if !self.contains(path) || path == self.dir.path() {
            return;
        }

        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };

        match result {
            Ok(()) => tracing::debug!("released {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to release {}: {e}", path.display()),
        }
    }

    /// Previously fetched local copy of `reference`, if any.
    pub fn fetched(&self, reference: &str) -> Option<PathBuf> {
        self.fetched.lock().get(reference).cloned()
    }

    /// Remember that `reference` was fetched to `path`.
    pub fn remember_fetch(&self, reference: &str, path: &Path) {
        self.fetched
            .lock()
            .insert(reference.to_string(), path.to_path_buf());
    }

    /// Move the final artifact to `<output_dir>/<job_id>.<ext>`.
    ///
    /// Members of the working set are moved (rename, falling back to
    /// copy+remove across filesystems). Anything else, i.e. a caller-owned
    /// input that no stage touched, is copied so the caller's file survives.
    pub fn promote(&self, path: &Path) -> rf_core::Result<PathBuf> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("mp4");
        let dest = self.output_dir.join(format!("{}.{ext}", self.job_id));

        if !path.is_file() {
            return Err(rf_core::Error::Internal(format!(
                "final output does not exist: {}",
                path.display()
            )));
        }

        if self.contains(path) {
            if let Err(rename_err) = std::fs::rename(path, &dest) {
                tracing::debug!("rename failed ({rename_err}); copying instead");
                std::fs::copy(path, &dest)?;
                self.release(path);
            }
        } else {
            std::fs::copy(path, &dest)?;
        }

        tracing::info!("job {}: delivered {}", self.job_id, dest.display());
        Ok(dest)
    }

    /// Remove the job directory now, logging instead of failing.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!("Failed to remove job directory {}: {e}", path.display());
        }
    }
}

impl std::fmt::Debug for WorkingSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingSet")
            .field("job_id", &self.job_id)
            .field("dir", &self.dir.path())
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}
