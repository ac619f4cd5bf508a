//! Sequence file selection for `-mc file`.

use std::io;
use std::path::{Path, PathBuf};

use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use palaser_core::{Error, SequenceLocator};
use tracing::debug;

use crate::config::SequenceConfig;

/// Finds sequence files in the configured directory, asking the user to
/// pick one when no name is given.
pub struct FileLocator {
    directory: PathBuf,
    default_file: String,
    interactive: bool,
}

impl FileLocator {
    pub fn new(config: &SequenceConfig, interactive: bool) -> Self {
        Self {
            directory: config.directory.clone(),
            default_file: config.default_file.clone(),
            interactive,
        }
    }

    /// A name that exists as given is used directly, otherwise it is looked
    /// up in the sequence directory.
    fn resolve(&self, requested: &Path) -> PathBuf {
        if requested.is_absolute() || requested.exists() {
            requested.to_path_buf()
        } else {
            self.directory.join(requested)
        }
    }

    /// `*.txt` files in the sequence directory, sorted by name.
    fn candidates(&self) -> io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn default_index(&self, files: &[PathBuf]) -> usize {
        files
            .iter()
            .position(|f| f.file_name().is_some_and(|name| name == self.default_file.as_str()))
            .unwrap_or(0)
    }

    fn choose(&self) -> palaser_core::Result<PathBuf> {
        let files = self.candidates()?;
        if files.is_empty() {
            return Err(Error::NoSequenceSelected);
        }

        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap_or_default().to_string_lossy().into_owned())
            .collect();

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select sequence file")
            .items(&names)
            .default(self.default_index(&files))
            .interact_opt()
            .map_err(io::Error::other)?;

        selection.map(|idx| files[idx].clone()).ok_or(Error::NoSequenceSelected)
    }
}

impl SequenceLocator for FileLocator {
    fn locate(&mut self, requested: Option<&Path>) -> palaser_core::Result<PathBuf> {
        let path = match requested {
            Some(name) => self.resolve(name),
            None if self.interactive => self.choose()?,
            None => self.directory.join(&self.default_file),
        };
        debug!(?path, "Sequence file located");
        Ok(path)
    }
}
