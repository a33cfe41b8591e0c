use thiserror::Error;

/// A schema that cannot be used for key validation.
///
/// Raised before any submission file is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema declares no file types")]
    Empty,

    #[error("duplicate file type: {name}")]
    DuplicateFileType { name: String },

    #[error("file type {file_type} declares no fields")]
    NoFields { file_type: String },

    #[error("file type {file_type} declares field {field} more than once")]
    DuplicateField { file_type: String, field: String },

    #[error("file type {file_type}: {role} index {index} is out of range ({field_count} fields)")]
    IndexOutOfRange {
        file_type: String,
        role: &'static str,
        index: usize,
        field_count: usize,
    },

    #[error("file type {file_type}: {role} repeats field index {index}")]
    RepeatedIndex {
        file_type: String,
        role: &'static str,
        index: usize,
    },

    #[error("file type {file_type} references unknown file type {referenced}")]
    UnknownReference {
        file_type: String,
        referenced: String,
    },

    #[error("file type {file_type} references {referenced}, which has no primary key")]
    ReferencedWithoutPrimaryKey {
        file_type: String,
        referenced: String,
    },

    #[error(
        "file type {file_type}: foreign key to {referenced} has {fk_arity} field(s), \
         primary key has {pk_arity}"
    )]
    KeyArityMismatch {
        file_type: String,
        referenced: String,
        fk_arity: usize,
        pk_arity: usize,
    },

    #[error("file type {file_type}: complex relation to {referenced} must require surjection")]
    ComplexWithoutSurjection {
        file_type: String,
        referenced: String,
    },

    #[error("file type {file_type} has an invalid file name pattern: {message}")]
    InvalidPattern { file_type: String, message: String },

    #[error("file type {file_type} declares unknown field {field}")]
    UnknownField { file_type: String, field: String },

    #[error("relation cycle detected: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    #[error("unknown file type: {name}")]
    UnknownFileType { name: String },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
