use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::access::{FileAccess, OutputSink, SubmissionFile};
use crate::error::{IngestError, Result};

/// Files under `<input_root>/<project_key>/`.
///
/// Reports go to `<output_root>/<project_key>/`, falling back to the input
/// root when no output root is configured.
#[derive(Debug, Clone)]
pub struct LocalFileAccess {
    input_root: PathBuf,
    output_root: Option<PathBuf>,
}

impl LocalFileAccess {
    pub fn new(input_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: None,
        }
    }

    #[must_use]
    pub fn with_output_root(mut self, output_root: Option<PathBuf>) -> Self {
        self.output_root = output_root;
        self
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn project_dir(&self, project_key: &str) -> PathBuf {
        self.input_root.join(project_key)
    }

    pub fn output_dir(&self, project_key: &str) -> PathBuf {
        self.output_root
            .as_ref()
            .unwrap_or(&self.input_root)
            .join(project_key)
    }
}

impl FileAccess for LocalFileAccess {
    fn list(&self, project_key: &str, pattern: &Regex) -> Result<Vec<SubmissionFile>> {
        let dir = self.project_dir(project_key);
        if !dir.is_dir() {
            return Err(IngestError::DirectoryNotFound { path: dir });
        }

        let entries = fs::read_dir(&dir).map_err(|source| IngestError::DirectoryRead {
            path: dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| IngestError::DirectoryRead {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if pattern.is_match(name) {
                files.push(SubmissionFile::new(name, path.display().to_string()));
            }
        }

        files.sort();
        tracing::debug!(
            project = project_key,
            pattern = pattern.as_str(),
            files = files.len(),
            "listed project files"
        );
        Ok(files)
    }

    fn open_raw(&self, file: &SubmissionFile) -> Result<Box<dyn Read + Send>> {
        let path = PathBuf::from(&file.location);
        let handle = File::open(&path).map_err(|source| IngestError::FileOpen { path, source })?;
        Ok(Box::new(BufReader::new(handle)))
    }

    fn create(&self, project_key: &str, file_name: &str) -> Result<OutputSink> {
        let dir = self.output_dir(project_key);
        fs::create_dir_all(&dir).map_err(|source| IngestError::FileCreate {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(file_name);
        let handle = File::create(&path).map_err(|source| IngestError::FileCreate {
            path: path.clone(),
            source,
        })?;
        Ok(OutputSink {
            location: path.display().to_string(),
            writer: Box::new(BufWriter::new(handle)),
        })
    }
}
