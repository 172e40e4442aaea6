//! Program discovery and loading
//!
//! Programs live in one directory per program under an I/O root:
//!
//! ```text
//! <io_root>/<name>/<name>.s    source
//! <io_root>/<name>/<name>.o    object code, rebuilt when stale
//! <io_root>/<name>/<name>.in   optional input words
//! ```
//!
//! Discovery is sorted by name. A program whose source fails to assemble,
//! or whose image cannot be placed in memory, is logged and skipped; the
//! rest of the batch still loads.

use crate::Kernel;
use assembler::{assemble, parse_object_code, write_object_code, ObjectCodeError};
use core_types::{ProcessId, Word};
use kernel_api::{KernelError, Machine};
use services_logger::{LogEntry, LogLevel};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Object code and input of one program, ready to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub name: String,
    pub object_code: Vec<Word>,
    pub input: Vec<Word>,
}

impl ProgramImage {
    pub fn new(name: impl Into<String>, object_code: Vec<Word>) -> Self {
        Self {
            name: name.into(),
            object_code,
            input: Vec::new(),
        }
    }

    pub fn with_input(mut self, input: Vec<Word>) -> Self {
        self.input = input;
        self
    }
}

/// Loader errors
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Cannot list programs in {}: {message}", path.display())]
    Discovery { path: PathBuf, message: String },

    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Bad object code for {name}: {source}")]
    ObjectCode {
        name: String,
        #[source]
        source: ObjectCodeError,
    },

    #[error("Invalid input for {name}: '{token}'")]
    Input { name: String, token: String },

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

fn io_error(path: &Path, err: std::io::Error) -> LoaderError {
    LoaderError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Reads programs from an I/O root
#[derive(Debug, Clone)]
pub struct Loader {
    io_root: PathBuf,
}

impl Loader {
    pub fn new(io_root: impl Into<PathBuf>) -> Self {
        Self {
            io_root: io_root.into(),
        }
    }

    pub fn io_root(&self) -> &Path {
        &self.io_root
    }

    /// `<io_root>/<name>/<name>.<extension>`
    pub fn program_file(&self, name: &str, extension: &str) -> PathBuf {
        self.io_root
            .join(name)
            .join(format!("{}.{}", name, extension))
    }

    /// Names of every directory holding a `<name>.s`, sorted
    pub fn discover(&self) -> Result<Vec<String>, LoaderError> {
        let entries = fs::read_dir(&self.io_root).map_err(|e| LoaderError::Discovery {
            path: self.io_root.clone(),
            message: e.to_string(),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LoaderError::Discovery {
                path: self.io_root.clone(),
                message: e.to_string(),
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if self.program_file(&name, "s").is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Builds the image of one program
    ///
    /// Reassembles the source when the object file is missing or older.
    /// The outer error is environmental; the inner one is an assembly
    /// failure the caller may skip.
    pub fn prepare(
        &self,
        name: &str,
    ) -> Result<Result<ProgramImage, assembler::AssembleError>, LoaderError> {
        let source_path = self.program_file(name, "s");
        let object_path = self.program_file(name, "o");

        let object_code = if is_stale(&object_path, &source_path)? {
            let source = fs::read_to_string(&source_path).map_err(|e| io_error(&source_path, e))?;
            let words = match assemble(&source) {
                Ok(words) => words,
                Err(err) => return Ok(Err(err)),
            };
            fs::write(&object_path, write_object_code(&words))
                .map_err(|e| io_error(&object_path, e))?;
            words
        } else {
            let text = fs::read_to_string(&object_path).map_err(|e| io_error(&object_path, e))?;
            parse_object_code(&text).map_err(|source| LoaderError::ObjectCode {
                name: name.to_string(),
                source,
            })?
        };

        let input = self.read_input(name)?;
        Ok(Ok(ProgramImage::new(name, object_code).with_input(input)))
    }

    fn read_input(&self, name: &str) -> Result<Vec<Word>, LoaderError> {
        let path = self.program_file(name, "in");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        text.split_whitespace()
            .map(|token| {
                token.parse::<Word>().map_err(|_| LoaderError::Input {
                    name: name.to_string(),
                    token: token.to_string(),
                })
            })
            .collect()
    }

    /// Discovers, prepares and loads every program in name order
    ///
    /// Returns the ids of the processes that were loaded.
    pub fn load_all<M: Machine>(
        &self,
        kernel: &mut Kernel<M>,
    ) -> Result<Vec<ProcessId>, LoaderError> {
        let mut loaded = Vec::new();
        for name in self.discover()? {
            match self.prepare(&name)? {
                Ok(image) => match kernel.load_image(image) {
                    Ok(id) => loaded.push(id),
                    Err(err @ (KernelError::Load(_) | KernelError::Memory(_))) => kernel.log(
                        LogEntry::new(LogLevel::Error, "load failed, skipping")
                            .with_source(name.as_str())
                            .with_field("error", err),
                    ),
                    Err(err) => return Err(err.into()),
                },
                Err(err) => kernel.log(
                    LogEntry::new(LogLevel::Error, "assembly failed, skipping")
                        .with_source(name.as_str())
                        .with_field("error", err),
                ),
            }
        }
        Ok(loaded)
    }
}

fn is_stale(object: &Path, source: &Path) -> Result<bool, LoaderError> {
    let Ok(object_meta) = fs::metadata(object) else {
        return Ok(true);
    };
    let source_meta = fs::metadata(source).map_err(|e| io_error(source, e))?;
    match (object_meta.modified(), source_meta.modified()) {
        (Ok(object_time), Ok(source_time)) => Ok(object_time < source_time),
        _ => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedMachine;
    use crate::KernelConfig;
    use services_logger::MemoryLogSink;
    use std::fs;

    fn write_program(root: &Path, name: &str, source: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.s", name)), source).unwrap();
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_program(dir.path(), "zeta", "halt\n");
        write_program(dir.path(), "alpha", "halt\n");
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::write(dir.path().join("os.out"), "").unwrap();

        let loader = Loader::new(dir.path());
        assert_eq!(loader.discover().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Loader::new(dir.path().join("nope"));
        assert!(matches!(
            loader.discover(),
            Err(LoaderError::Discovery { .. })
        ));
    }

    #[test]
    fn test_prepare_assembles_and_writes_object() {
        let dir = tempfile::tempdir().unwrap();
        write_program(dir.path(), "echo", "read 0\nwrite 0\nhalt\n");
        fs::write(dir.path().join("echo").join("echo.in"), "5 -6\n7").unwrap();

        let loader = Loader::new(dir.path());
        let image = loader.prepare("echo").unwrap().unwrap();
        assert_eq!(image.object_code.len(), 3);
        assert_eq!(image.input, vec![5, -6, 7]);

        let object = fs::read_to_string(loader.program_file("echo", "o")).unwrap();
        assert_eq!(parse_object_code(&object).unwrap(), image.object_code);
    }

    #[test]
    fn test_prepare_uses_current_object() {
        let dir = tempfile::tempdir().unwrap();
        write_program(dir.path(), "p", "halt\n");
        let loader = Loader::new(dir.path());
        // Object newer than source: taken as is
        fs::write(loader.program_file("p", "o"), "1\n2\n").unwrap();

        let image = loader.prepare("p").unwrap().unwrap();
        assert_eq!(image.object_code, vec![1, 2]);
    }

    #[test]
    fn test_load_all_skips_programs_that_fail_to_assemble() {
        let dir = tempfile::tempdir().unwrap();
        write_program(dir.path(), "bad", "frobnicate 1\n");
        write_program(dir.path(), "good", "halt\n");

        let logs = MemoryLogSink::new();
        let mut kernel = Kernel::new(ScriptedMachine::new(32), KernelConfig::default())
            .with_log_sink(logs.clone());
        let loaded = Loader::new(dir.path()).load_all(&mut kernel).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(kernel.process(loaded[0]).unwrap().name(), "good");
        assert_eq!(
            logs.count(|e| e.level == LogLevel::Error && e.source.as_deref() == Some("bad")),
            1
        );
    }

    #[test]
    fn test_load_all_skips_programs_that_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        write_program(dir.path(), "a_empty", "! only a comment\n");
        write_program(dir.path(), "b_huge", &"noop\n".repeat(40));
        write_program(dir.path(), "c_good", "halt\n");

        let logs = MemoryLogSink::new();
        let mut kernel = Kernel::new(ScriptedMachine::new(32), KernelConfig::default())
            .with_log_sink(logs.clone());
        let loaded = Loader::new(dir.path()).load_all(&mut kernel).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(kernel.process(loaded[0]).unwrap().name(), "c_good");
        for name in ["a_empty", "b_huge"] {
            assert_eq!(
                logs.count(|e| e.level == LogLevel::Error && e.source.as_deref() == Some(name)),
                1,
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_bad_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_program(dir.path(), "p", "halt\n");
        fs::write(dir.path().join("p").join("p.in"), "1 two").unwrap();

        let result = Loader::new(dir.path()).prepare("p");
        assert!(matches!(result, Err(LoaderError::Input { token, .. }) if token == "two"));
    }
}
