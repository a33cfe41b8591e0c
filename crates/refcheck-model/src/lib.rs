pub mod error;
pub mod key;
pub mod report;
pub mod schema;
pub mod violation;

pub use error::{Result, SchemaError};
pub use key::KeyTuple;
pub use report::SubmissionReport;
pub use schema::{FileTypeSchema, ForeignKeySpec, SubmissionSchema};
pub use violation::{
    COMPLEX_SURJECTION_LINE, FileErrorCollection, RowError, SIMPLE_SURJECTION_LINE, ViolationKind,
};
