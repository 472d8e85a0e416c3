use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use vl_contracts::{Provenance, Settings};

pub const TEMP_DIR_NAME: &str = "mcp-vl-auto";

const MAX_NAME_ATTEMPTS: u32 = 64;

/// Raw image bytes on disk, tagged with where they came from.
///
/// Temporary images are owned by [`TempArtifacts`]; handing one to
/// [`TempArtifacts::release`] consumes it, so a file is removed at most once.
#[derive(Debug)]
pub struct AcquiredImage {
    path: PathBuf,
    provenance: Provenance,
    temporary: bool,
}

impl AcquiredImage {
    /// A caller-supplied file. Never deleted by the pipeline.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            provenance: Provenance::File,
            temporary: false,
        }
    }

    pub(crate) fn temporary(path: PathBuf, provenance: Provenance) -> Self {
        Self {
            path,
            provenance,
            temporary: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }
}

/// The dedicated temp directory holding clipboard captures and downloads.
///
/// The directory only ever gains new, uniquely named files until
/// [`TempArtifacts::purge`] removes it wholesale.
#[derive(Debug, Clone)]
pub struct TempArtifacts {
    root: PathBuf,
}

impl TempArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn system() -> Self {
        Self::new(std::env::temp_dir().join(TEMP_DIR_NAME))
    }

    /// `VL_TEMP_DIR` names the parent; the artifacts always get their own
    /// `mcp-vl-auto` subdirectory inside it.
    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.temp_dir {
            Some(parent) => Self::new(parent.join(TEMP_DIR_NAME)),
            None => Self::system(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the directory with mode 0755 on unix. An existing directory
    /// is used as-is and its permissions are never touched.
    pub fn ensure_dir(&self) -> io::Result<()> {
        if self.root.is_dir() {
            return Ok(());
        }
        if let Some(parent) = self.root.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut builder = DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        match builder.create(&self.root) {
            Ok(()) => {
                // DirBuilder's mode is filtered through the umask.
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(&self.root, fs::Permissions::from_mode(0o755))?;
                }
                log::debug!("created temp directory {}", self.root.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists && self.root.is_dir() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Reserves `<prefix>_<millis>[_<tag>].<ext>` by creating it empty.
    ///
    /// `create_new` makes the reservation atomic; a name already taken in the
    /// same millisecond gets a `-<n>` counter appended.
    pub fn allocate(&self, prefix: &str, tag: Option<&str>, ext: &str) -> io::Result<PathBuf> {
        self.ensure_dir()?;
        let stamp = chrono::Utc::now().timestamp_millis();
        let tag = tag.map(|value| format!("_{value}")).unwrap_or_default();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{prefix}_{stamp}{tag}.{ext}")
            } else {
                format!("{prefix}_{stamp}{tag}-{attempt}.{ext}")
            };
            let path = self.root.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(path),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("could not reserve a unique {prefix} file in {}", self.root.display()),
        ))
    }

    /// Removes a partial file left by a failed acquisition.
    pub fn discard(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => log::debug!("discarded partial artifact {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => log::warn!("failed to discard {}: {err}", path.display()),
        }
    }

    /// Deletes a temporary image once the pipeline is done with it. Failures
    /// are logged and otherwise ignored.
    pub fn release(&self, image: AcquiredImage) {
        if !image.temporary {
            return;
        }
        match fs::remove_file(&image.path) {
            Ok(()) => log::info!(
                "cleaned up {} artifact {}",
                image.provenance.as_str(),
                image.path.display()
            ),
            Err(err) => log::warn!(
                "failed to clean up temp file {}: {err}",
                image.path.display()
            ),
        }
    }

    /// Removes the whole temp directory. Returns whether anything was removed.
    ///
    /// Only a directory named `mcp-vl-auto` is ever removed.
    pub fn purge(&self) -> bool {
        if self.root.file_name().and_then(|name| name.to_str()) != Some(TEMP_DIR_NAME) {
            log::warn!(
                "refusing to remove {}: not a {TEMP_DIR_NAME} directory",
                self.root.display()
            );
            return false;
        }
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                log::info!("removed temp directory {}", self.root.display());
                true
            }
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => {
                log::warn!("failed to remove temp directory {}: {err}", self.root.display());
                false
            }
        }
    }
}
