use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a dataset row. The uploader assigns positional indices;
/// string keys are accepted when records come from elsewhere.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum RecordId {
    Index(u64),
    Key(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Index(index) => write!(f, "{index}"),
            RecordId::Key(key) => f.write_str(key),
        }
    }
}

impl From<u64> for RecordId {
    fn from(index: u64) -> Self {
        RecordId::Index(index)
    }
}

impl From<usize> for RecordId {
    fn from(index: usize) -> Self {
        RecordId::Index(index as u64)
    }
}

impl From<&str> for RecordId {
    fn from(key: &str) -> Self {
        RecordId::Key(key.to_string())
    }
}

impl From<String> for RecordId {
    fn from(key: String) -> Self {
        RecordId::Key(key)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AudioSample {
    pub array: Vec<f32>,
    pub sampling_rate: u32,
}

impl AudioSample {
    pub fn new(array: Vec<f32>, sampling_rate: u32) -> Self {
        Self {
            array,
            sampling_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sampling_rate == 0 {
            return 0.0;
        }
        self.array.len() as f64 / self.sampling_rate as f64
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SourceExample {
    pub id: RecordId,
    pub audio: AudioSample,
    pub transcription: String,
}

impl SourceExample {
    pub fn new(
        id: impl Into<RecordId>,
        audio: AudioSample,
        transcription: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            audio,
            transcription: transcription.into(),
        }
    }
}

/// The unit uploaded to the annotation platform.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PreparedRecord {
    pub id: RecordId,
    /// HTML snippet embedding the staged audio file.
    pub audio: String,
    pub original_transcription: String,
    /// Pre-filled with the original text until a correction is supplied.
    pub corrected_transcription: String,
}

impl PreparedRecord {
    pub fn new(
        id: RecordId,
        audio_html: impl Into<String>,
        transcription: impl Into<String>,
    ) -> Self {
        let transcription = transcription.into();
        Self {
            id,
            audio: audio_html.into(),
            corrected_transcription: transcription.clone(),
            original_transcription: transcription,
        }
    }

    pub fn with_correction(mut self, corrected: impl Into<String>) -> Self {
        self.corrected_transcription = corrected.into();
        self
    }

    pub fn has_correction(&self) -> bool {
        self.corrected_transcription != self.original_transcription
    }

    /// Value stored under a record key, as referenced by a field mapping.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        match key {
            "audio" => Some(&self.audio),
            "original_transcription" => Some(&self.original_transcription),
            "corrected_transcription" => Some(&self.corrected_transcription),
            _ => None,
        }
    }
}
