use serde::{Deserialize, Serialize};

use crate::{AnnotationSchema, DomainError};

/// Where a mapped record value lands in the annotation dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingTarget<'a> {
    Field(&'a str),
    /// Questions receive the value as a pre-filled suggestion.
    Question(&'a str),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingEntry {
    pub source: String,
    pub target: String,
}

/// Ordered table from record keys to schema field or question names.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<MappingEntry>,
}

impl FieldMapping {
    pub fn new<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(source, target)| MappingEntry {
                    source: source.into(),
                    target: target.into(),
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Check every target against the schema and that all required fields
    /// receive a value.
    pub fn validate_against(&self, schema: &AnnotationSchema) -> Result<(), DomainError> {
        for entry in &self.entries {
            if schema.field(&entry.target).is_none() && schema.question(&entry.target).is_none() {
                return Err(DomainError::validation(format!(
                    "mapping target `{}` is neither a field nor a question",
                    entry.target
                )));
            }
        }
        for field in schema.fields().iter().filter(|field| field.required) {
            if !self.entries.iter().any(|entry| entry.target == field.name) {
                return Err(DomainError::validation(format!(
                    "required field `{}` is not mapped",
                    field.name
                )));
            }
        }
        Ok(())
    }

    pub fn resolve<'a>(
        &'a self,
        schema: &'a AnnotationSchema,
    ) -> impl Iterator<Item = (&'a str, MappingTarget<'a>)> + 'a {
        self.entries.iter().filter_map(move |entry| {
            let target = if schema.field(&entry.target).is_some() {
                MappingTarget::Field(entry.target.as_str())
            } else if schema.question(&entry.target).is_some() {
                MappingTarget::Question(entry.target.as_str())
            } else {
                return None;
            };
            Some((entry.source.as_str(), target))
        })
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::new([
            ("audio", "audio"),
            ("original_transcription", "original_transcription"),
            ("corrected_transcription", "corrected_transcription"),
        ])
    }
}
