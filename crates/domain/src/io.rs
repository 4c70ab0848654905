use serde::{Deserialize, Serialize};

use crate::{error::DomainError, record::PreparedRecord};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    JsonLines,
}

pub trait RecordExporter {
    fn export(
        &self,
        records: &[PreparedRecord],
        format: ExportFormat,
    ) -> Result<Vec<u8>, DomainError>;
}

/// Serializes prepared records for local inspection (dry runs).
pub struct JsonExporter;

impl RecordExporter for JsonExporter {
    fn export(
        &self,
        records: &[PreparedRecord],
        format: ExportFormat,
    ) -> Result<Vec<u8>, DomainError> {
        match format {
            ExportFormat::Json => serde_json::to_vec_pretty(records)
                .map_err(|err| DomainError::Serialization(err.to_string())),
            ExportFormat::JsonLines => {
                let mut out = Vec::new();
                for record in records {
                    serde_json::to_writer(&mut out, record)
                        .map_err(|err| DomainError::Serialization(err.to_string()))?;
                    out.push(b'\n');
                }
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordId;

    fn records() -> Vec<PreparedRecord> {
        vec![
            PreparedRecord::new(RecordId::Index(0), "<audio></audio>", "salam"),
            PreparedRecord::new(RecordId::Index(1), "<audio></audio>", "labas"),
        ]
    }

    #[test]
    fn exports_json() {
        let bytes = JsonExporter.export(&records(), ExportFormat::Json).unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("\"original_transcription\": \"salam\""));
    }

    #[test]
    fn exports_one_line_per_record() {
        let bytes = JsonExporter
            .export(&records(), ExportFormat::JsonLines)
            .unwrap();
        let output = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: PreparedRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.id, RecordId::Index(1));
        assert_eq!(parsed.corrected_transcription, "labas");
    }
}
