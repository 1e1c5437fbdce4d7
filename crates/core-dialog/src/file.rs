use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

/// Default extension for source files.
pub const SOURCE_EXTENSION: &str = "lds";

/// File operation failure. A cancelled picker is not an error: it surfaces as `Ok(None)` or
/// `Ok(false)`.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("{op} failed for {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Opaque open/save service used by file actions.
pub trait FileService {
    /// Start an empty, untitled document.
    fn create_new(&mut self) -> Result<String, FileError>;
    fn open(&mut self) -> Result<Option<String>, FileError>;
    /// Save to the current path, falling back to `save_as` for untitled documents.
    fn save(&mut self, text: &str) -> Result<bool, FileError>;
    fn save_as(&mut self, text: &str) -> Result<bool, FileError>;
    fn terminate(&mut self);
    fn current_path(&self) -> Option<&Path>;
}

/// Chooses paths for open and save-as. `None` means the user cancelled.
pub trait PathPicker {
    fn pick_open(&mut self) -> Option<PathBuf>;
    fn pick_save(&mut self, suggested: Option<&Path>) -> Option<PathBuf>;
}

/// Picker fed ahead of time: the UI collects a path, stores it, then runs the file action.
#[derive(Debug, Default)]
pub struct PresetPicker {
    next: Option<PathBuf>,
}

impl PresetPicker {
    pub fn set(&mut self, path: impl Into<PathBuf>) {
        self.next = Some(path.into());
    }
}

impl PathPicker for PresetPicker {
    fn pick_open(&mut self) -> Option<PathBuf> {
        self.next.take()
    }
    fn pick_save(&mut self, _suggested: Option<&Path>) -> Option<PathBuf> {
        self.next.take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    Crlf,
}

/// Detect the dominant line ending and return LF-only text.
pub fn normalize_line_endings(input: &str) -> (String, LineEnding) {
    let crlf = input.matches("\r\n").count();
    let lf = input.matches('\n').count() - crlf;
    let ending = if crlf > lf { LineEnding::Crlf } else { LineEnding::Lf };
    (input.replace("\r\n", "\n"), ending)
}

/// Filesystem-backed service. Paths without an extension get `.lds`.
#[derive(Debug)]
pub struct FsFileService<P: PathPicker> {
    picker: P,
    current: Option<PathBuf>,
    line_ending: LineEnding,
    terminated: bool,
}

impl<P: PathPicker> FsFileService<P> {
    pub fn new(picker: P) -> Self {
        Self {
            picker,
            current: None,
            line_ending: LineEnding::Lf,
            terminated: false,
        }
    }

    /// Start with `path` as the current document (CLI argument). Missing files are fine: they are
    /// created on first save.
    pub fn with_path(picker: P, path: impl Into<PathBuf>) -> Self {
        let mut svc = Self::new(picker);
        svc.current = Some(with_default_extension(path.into()));
        svc
    }

    /// Read the current path, if it exists.
    pub fn load_current(&mut self) -> Result<Option<String>, FileError> {
        let Some(path) = self.current.clone() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        self.read(&path).map(Some)
    }

    pub fn picker_mut(&mut self) -> &mut P {
        &mut self.picker
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn read(&mut self, path: &Path) -> Result<String, FileError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            error!(target: "io", path = %path.display(), error = %source, "file_open_error");
            FileError::Io {
                op: "open",
                path: path.to_path_buf(),
                source,
            }
        })?;
        let (text, ending) = normalize_line_endings(&content);
        self.line_ending = ending;
        info!(target: "io", path = %path.display(), text_len = text.len(), ?ending, "file_opened");
        Ok(text)
    }

    fn write(&mut self, path: &Path, text: &str) -> Result<(), FileError> {
        let content = match self.line_ending {
            LineEnding::Lf => text.to_string(),
            LineEnding::Crlf => text.replace('\n', "\r\n"),
        };
        std::fs::write(path, content.as_bytes()).map_err(|source| {
            error!(target: "io", path = %path.display(), error = %source, "file_write_error");
            FileError::Io {
                op: "save",
                path: path.to_path_buf(),
                source,
            }
        })?;
        info!(target: "io", path = %path.display(), text_len = text.len(), "file_saved");
        Ok(())
    }
}

impl<P: PathPicker> FileService for FsFileService<P> {
    fn create_new(&mut self) -> Result<String, FileError> {
        self.current = None;
        self.line_ending = LineEnding::Lf;
        info!(target: "io", "file_new");
        Ok(String::new())
    }

    fn open(&mut self) -> Result<Option<String>, FileError> {
        let Some(path) = self.picker.pick_open() else {
            info!(target: "io", "open_cancelled");
            return Ok(None);
        };
        let path = with_default_extension(path);
        let text = self.read(&path)?;
        self.current = Some(path);
        Ok(Some(text))
    }

    fn save(&mut self, text: &str) -> Result<bool, FileError> {
        match self.current.clone() {
            Some(path) => self.write(&path, text).map(|()| true),
            None => self.save_as(text),
        }
    }

    fn save_as(&mut self, text: &str) -> Result<bool, FileError> {
        let Some(path) = self.picker.pick_save(self.current.as_deref()) else {
            info!(target: "io", "save_as_cancelled");
            return Ok(false);
        };
        let path = with_default_extension(path);
        self.write(&path, text)?;
        self.current = Some(path);
        Ok(true)
    }

    fn terminate(&mut self) {
        self.terminated = true;
        info!(target: "io", "terminate_requested");
    }

    fn current_path(&self) -> Option<&Path> {
        self.current.as_deref()
    }
}

fn with_default_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(SOURCE_EXTENSION)
    }
}
