pub mod error;
pub mod io;
pub mod mapping;
pub mod record;
pub mod schema;
pub mod split;

pub use crate::error::DomainError;
pub use crate::io::{ExportFormat, JsonExporter, RecordExporter};
pub use crate::mapping::{FieldMapping, MappingEntry, MappingTarget};
pub use crate::record::{AudioSample, PreparedRecord, RecordId, SourceExample};
pub use crate::schema::{
    AnnotationSchema, FieldDefinition, QuestionDefinition, QuestionKind, DEFAULT_GUIDELINES,
};
pub use crate::split::SplitSelector;
