//! Dictionary loading for the key validation engine.
//!
//! A dictionary document names fields; resolution turns it into a
//! [`refcheck_model::SubmissionSchema`] plus its dependency order, and the
//! [`SchemaRegistry`] keeps one resolved instance per release.

pub mod document;
pub mod error;
pub mod registry;
pub mod resolve;

pub use document::{DictionaryDocument, DictionaryFormat, FileTypeDocument, RelationDocument};
pub use error::{DictionaryError, Result};
pub use registry::SchemaRegistry;
pub use resolve::{ResolvedSchema, resolve};
