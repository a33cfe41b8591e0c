use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use regex::Regex;

use crate::access::{FileAccess, OutputSink, SubmissionFile};
use crate::error::{IngestError, Result};

type ProjectFiles = BTreeMap<String, Arc<[u8]>>;

/// File access over contents held in memory.
///
/// Written outputs are kept and can be read back with [`output`](Self::output).
#[derive(Debug, Default)]
pub struct InMemoryFileAccess {
    inputs: RwLock<BTreeMap<String, ProjectFiles>>,
    outputs: RwLock<BTreeMap<(String, String), Arc<Mutex<Vec<u8>>>>>,
}

impl InMemoryFileAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file. Names ending in `.gz` must hold gzip data.
    pub fn insert(&self, project_key: &str, file_name: &str, contents: impl Into<Vec<u8>>) {
        self.inputs
            .write()
            .entry(project_key.to_string())
            .or_default()
            .insert(file_name.to_string(), Arc::from(contents.into()));
    }

    #[must_use]
    pub fn with_file(self, project_key: &str, file_name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(project_key, file_name, contents);
        self
    }

    /// Bytes written so far to an output file.
    pub fn output(&self, project_key: &str, file_name: &str) -> Option<Vec<u8>> {
        self.outputs
            .read()
            .get(&(project_key.to_string(), file_name.to_string()))
            .map(|buffer| buffer.lock().clone())
    }

    pub fn has_output(&self, project_key: &str, file_name: &str) -> bool {
        self.outputs
            .read()
            .contains_key(&(project_key.to_string(), file_name.to_string()))
    }
}

impl FileAccess for InMemoryFileAccess {
    fn list(&self, project_key: &str, pattern: &Regex) -> Result<Vec<SubmissionFile>> {
        let inputs = self.inputs.read();
        let files = inputs
            .get(project_key)
            .ok_or_else(|| IngestError::ProjectNotFound {
                project_key: project_key.to_string(),
            })?;
        Ok(files
            .keys()
            .filter(|name| pattern.is_match(name))
            .map(|name| SubmissionFile::new(name.clone(), format!("memory://{project_key}/{name}")))
            .collect())
    }

    fn open_raw(&self, file: &SubmissionFile) -> Result<Box<dyn Read + Send>> {
        let (project_key, file_name) = file
            .location
            .strip_prefix("memory://")
            .and_then(|rest| rest.split_once('/'))
            .unwrap_or_default();
        let contents = self
            .inputs
            .read()
            .get(project_key)
            .and_then(|files| files.get(file_name))
            .cloned()
            .ok_or_else(|| IngestError::FileNotFound {
                project_key: project_key.to_string(),
                file_name: file.name.clone(),
            })?;
        Ok(Box::new(Cursor::new(contents)))
    }

    fn create(&self, project_key: &str, file_name: &str) -> Result<OutputSink> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        self.outputs.write().insert(
            (project_key.to_string(), file_name.to_string()),
            Arc::clone(&buffer),
        );
        Ok(OutputSink {
            location: format!("memory://{project_key}/{file_name}"),
            writer: Box::new(SharedBuffer(buffer)),
        })
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
