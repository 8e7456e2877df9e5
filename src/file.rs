//! The file-location source, used for both static files and dynamic
//! locations.
//!
//! Locations are resolved against the accumulating properties before they
//! touch the filesystem, so a location may reference earlier layers:
//! `conf-${profile}.yaml`. Relative paths are joined with the working
//! directory. Missing files are skipped silently, which is what makes
//! optional per-profile files work; every other failure propagates.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::ConfError;
use crate::props::Properties;

/// An ordered collection of property file locations.
pub struct PropertySources {
    work_dir: Option<PathBuf>,
    locations: Vec<Vec<String>>,
}

impl PropertySources {
    pub(crate) fn new() -> Self {
        PropertySources {
            work_dir: None,
            locations: Vec::new(),
        }
    }

    pub(crate) fn set_work_dir(&mut self, dir: &Path) {
        self.work_dir = Some(dir.to_path_buf());
    }

    /// Append a group of locations, applied in the given order.
    pub fn add<I, S>(&mut self, locations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations
            .push(locations.into_iter().map(Into::into).collect());
    }

    /// Remove all locations.
    pub fn clear(&mut self) {
        self.locations.clear();
    }

    pub(crate) fn copy_to(&self, out: &mut Properties) -> Result<(), ConfError> {
        let work_dir = match &self.work_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_default(),
        };
        for group in &self.locations {
            for location in group {
                let filename = out.resolve(location)?;
                let mut path = PathBuf::from(&filename);
                if path.is_relative() {
                    path = work_dir.join(path);
                }
                let loaded = match Properties::from_file(&path) {
                    Ok(loaded) => loaded,
                    Err(ConfError::Io { source, .. })
                        if source.kind() == io::ErrorKind::NotFound =>
                    {
                        log::debug!("skipping missing config file {}", path.display());
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                log::debug!("loaded config file {}", path.display());
                for (key, value) in loaded.data() {
                    out.set(&key, value)?;
                }
            }
        }
        Ok(())
    }
}
