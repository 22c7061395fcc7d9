//! Output directory allocation
//!
//! Every run gets its own directory under the output root:
//!
//! ```text
//! <root>/<name>                       (no suffix, reused if present)
//! <root>/<name>.<suffix>              (first attempt)
//! <root>/<name>.<suffix>+1, +2, ...   (after collisions)
//! ```
//!
//! The suffix is `j<job-id>` under a PBS or SLURM scheduler and a
//! minute-resolution local timestamp otherwise, so jobs launched in the same
//! minute collide and fall through to the `+<n>` retries.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_MAX_SUFFIX_ATTEMPTS, DEFAULT_OUTPUT_ROOT};
use crate::{Error, Result};

/// Scheduler job-id variables, in priority order.
pub const JOB_ID_VARS: [&str; 2] = ["PBS_JOBID", "SLURM_JOBID"];

/// Timestamp suffix format (minute resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// File name stem of the copied parameter file.
pub const PARAM_FILE_COPY: &str = "paramfile";

/// Derive the directory suffix from an environment lookup and a clock reading.
pub fn derive_suffix<F>(lookup: F, now: DateTime<Local>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    JOB_ID_VARS
        .iter()
        .find_map(|var| lookup(var))
        .map_or_else(
            || now.format(TIMESTAMP_FORMAT).to_string(),
            |job_id| {
                let job_no = job_id.split('.').next().unwrap_or_default();
                format!("j{job_no}")
            },
        )
}

/// Suffix for the current process environment and local time.
#[must_use]
pub fn current_suffix() -> String {
    derive_suffix(|var| std::env::var(var).ok(), Local::now())
}

/// One allocation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest<'a> {
    /// Experiment name; may contain `/` to nest under the root.
    pub base_name: &'a str,
    /// `Some(suffix)` to allocate a fresh suffixed directory, `None` to reuse `<root>/<base_name>`.
    pub suffix: Option<String>,
    /// Parameter file to copy into the directory.
    pub param_file: Option<&'a Path>,
}

/// Allocates collision-free output directories under a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirectoryAllocator {
    root: PathBuf,
    max_attempts: u32,
}

impl Default for OutputDirectoryAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_ROOT)
    }
}

impl OutputDirectoryAllocator {
    /// Allocator rooted at `root` with the default retry cap.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_attempts: DEFAULT_MAX_SUFFIX_ATTEMPTS,
        }
    }

    /// Set the maximum number of creation attempts for suffixed directories.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a directory for `base_name`, deriving the suffix from the
    /// environment when `with_suffix` is set.
    ///
    /// # Errors
    ///
    /// See [`OutputDirectoryAllocator::allocate_request`].
    pub fn allocate(
        &self,
        base_name: &str,
        with_suffix: bool,
        param_file: Option<&Path>,
    ) -> Result<PathBuf> {
        self.allocate_request(&AllocationRequest {
            base_name,
            suffix: with_suffix.then(current_suffix),
            param_file,
        })
    }

    /// Allocate a directory for an explicit request.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an empty base name or one that would
    /// escape the output root, `Io` for creation
    /// failures other than an existing directory, and `DirectoryExhausted`
    /// when every suffixed candidate up to the retry cap already exists.
    pub fn allocate_request(&self, request: &AllocationRequest<'_>) -> Result<PathBuf> {
        if request.base_name.is_empty() {
            return Err(Error::Configuration(
                "experiment name must not be empty".to_string(),
            ));
        }
        let stays_under_root = Path::new(request.base_name)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !stays_under_root {
            return Err(Error::Configuration(format!(
                "experiment name '{}' must be a relative path below the output root",
                request.base_name
            )));
        }

        let dir = match &request.suffix {
            None => self.create_shared(request.base_name)?,
            Some(suffix) => self.create_unique(request.base_name, suffix)?,
        };
        info!(path = %dir.display(), "allocated output directory");

        if let Some(param_file) = request.param_file {
            copy_param_file(param_file, &dir);
        }
        Ok(dir)
    }

    fn create_shared(&self, base_name: &str) -> Result<PathBuf> {
        let dir = self.root.join(base_name);
        match fs::create_dir_all(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(dir),
            Err(e) => Err(e.into()),
        }
    }

    fn create_unique(&self, base_name: &str, suffix: &str) -> Result<PathBuf> {
        let base = self.root.join(format!("{base_name}.{suffix}"));
        if let Some(parent) = base.parent() {
            fs::create_dir_all(parent)?;
        }

        for attempt in 0..self.max_attempts {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                with_counter(&base, attempt)
            };

            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %candidate.display(), attempt, "output directory exists, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::DirectoryExhausted {
            base,
            attempts: self.max_attempts,
        })
    }
}

fn with_counter(base: &Path, counter: u32) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_os_string();
    name.push(format!("+{counter}"));
    PathBuf::from(name)
}

fn copy_param_file(param_file: &Path, dir: &Path) {
    let mut target = PathBuf::from(PARAM_FILE_COPY);
    if let Some(ext) = param_file.extension() {
        target.set_extension(ext);
    }
    let target = dir.join(target);

    if let Err(e) = fs::copy(param_file, &target) {
        warn!(
            source = %param_file.display(),
            target = %target.display(),
            error = %e,
            "could not copy parameter file into output directory"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 12, 5, 0).unwrap()
    }

    #[test]
    fn test_suffix_prefers_pbs_job_id() {
        let suffix = derive_suffix(
            |var| match var {
                "PBS_JOBID" => Some("4711.cluster.example.org".to_string()),
                "SLURM_JOBID" => Some("99".to_string()),
                _ => None,
            },
            noon(),
        );
        assert_eq!(suffix, "j4711");
    }

    #[test]
    fn test_suffix_uses_slurm_job_id() {
        let suffix = derive_suffix(
            |var| (var == "SLURM_JOBID").then(|| "123456".to_string()),
            noon(),
        );
        assert_eq!(suffix, "j123456");
    }

    #[test]
    fn test_suffix_falls_back_to_timestamp() {
        assert_eq!(derive_suffix(|_| None, noon()), "2024-03-09-12-05");
    }

    #[test]
    fn test_same_name_twice_gives_distinct_dirs() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputDirectoryAllocator::new(root.path());
        let request = AllocationRequest {
            base_name: "bars",
            suffix: Some("j42".to_string()),
            param_file: None,
        };

        let first = allocator.allocate_request(&request).unwrap();
        let second = allocator.allocate_request(&request).unwrap();
        let third = allocator.allocate_request(&request).unwrap();

        assert_eq!(first, root.path().join("bars.j42"));
        assert_eq!(second, root.path().join("bars.j42+1"));
        assert_eq!(third, root.path().join("bars.j42+2"));
        assert!(first.is_dir() && second.is_dir() && third.is_dir());
    }

    #[test]
    fn test_without_suffix_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputDirectoryAllocator::new(root.path());

        let a = allocator.allocate("toy", false, None).unwrap();
        let b = allocator.allocate("toy", false, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, root.path().join("toy"));
    }

    #[test]
    fn test_without_suffix_fails_on_file_in_the_way() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("toy"), b"not a directory").unwrap();

        let allocator = OutputDirectoryAllocator::new(root.path());
        assert!(matches!(
            allocator.allocate("toy", false, None),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_retry_cap_exhausted() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputDirectoryAllocator::new(root.path()).with_max_attempts(2);
        let request = AllocationRequest {
            base_name: "crowded",
            suffix: Some("2024-03-09-12-05".to_string()),
            param_file: None,
        };

        allocator.allocate_request(&request).unwrap();
        allocator.allocate_request(&request).unwrap();
        let err = allocator.allocate_request(&request).unwrap_err();
        assert!(matches!(err, Error::DirectoryExhausted { attempts: 2, .. }));
    }

    #[test]
    fn test_nested_base_name_and_param_copy() {
        let root = tempfile::tempdir().unwrap();
        let params = root.path().join("param-mnist-200.json");
        fs::write(&params, "{}").unwrap();

        let allocator = OutputDirectoryAllocator::new(root.path().join("output"));
        let dir = allocator
            .allocate_request(&AllocationRequest {
                base_name: "params/param-mnist-200.json",
                suffix: Some("j7".to_string()),
                param_file: Some(&params),
            })
            .unwrap();

        assert_eq!(dir, root.path().join("output/params/param-mnist-200.json.j7"));
        assert_eq!(fs::read_to_string(dir.join("paramfile.json")).unwrap(), "{}");
    }

    #[test]
    fn test_missing_param_file_is_not_fatal() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputDirectoryAllocator::new(root.path());
        let dir = allocator
            .allocate("toy", false, Some(Path::new("/nonexistent/params.json")))
            .unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join("paramfile.json").exists());
    }

    #[test]
    fn test_escaping_names_rejected() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputDirectoryAllocator::new(root.path().join("output"));
        for name in ["/tmp/abs", "../sibling", "a/../../b"] {
            assert!(
                matches!(allocator.allocate(name, true, None), Err(Error::Configuration(_))),
                "accepted {name}"
            );
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputDirectoryAllocator::new(root.path());
        assert!(matches!(
            allocator.allocate("", true, None),
            Err(Error::Configuration(_))
        ));
    }
}
