//! Serialized dictionary format.
//!
//! Fields are referenced by name; [`crate::resolve`] maps them to indices.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::error::{DictionaryError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DictionaryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    pub files: Vec<FileTypeDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileTypeDocument {
    pub name: String,
    /// File-name regex; defaults to `^<name>(\..*)?\.txt(\.gz)?$`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub fields: Vec<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationDocument {
    /// Referenced file type.
    pub other: String,
    /// Local fields, in the referenced type's primary-key order.
    pub fields: Vec<String>,
    #[serde(default)]
    pub surjective: bool,
    #[serde(default)]
    pub complex: bool,
    #[serde(default)]
    pub optional: bool,
}

/// Dictionary serialization, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryFormat {
    Json,
    Toml,
}

impl DictionaryFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

impl DictionaryDocument {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn from_toml_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let format =
            DictionaryFormat::from_path(path).ok_or_else(|| DictionaryError::UnsupportedFormat {
                path: path.to_path_buf(),
            })?;
        let text = fs::read_to_string(path).map_err(|source| DictionaryError::io(path, source))?;
        match format {
            DictionaryFormat::Json => {
                Self::from_json_str(&text).map_err(|source| DictionaryError::Json {
                    path: path.to_path_buf(),
                    source,
                })
            }
            DictionaryFormat::Toml => {
                Self::from_toml_str(&text).map_err(|source| DictionaryError::Toml {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// SHA-256 over the canonical JSON form.
    ///
    /// Independent of the source format and of whitespace, so a JSON and a
    /// TOML rendering of the same dictionary share one fingerprint.
    pub fn fingerprint(&self) -> String {
        sha256_json(self)
    }
}

pub(crate) fn sha256_json<T: Serialize>(value: &T) -> String {
    let canonical = serde_json::to_vec(value).unwrap_or_default();
    hex::encode(sha2::Sha256::digest(&canonical))
}
