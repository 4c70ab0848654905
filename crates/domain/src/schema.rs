use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Upper bound of the rating scale accepted by the annotation platform.
pub const MAX_RATING_VALUE: u8 = 10;

pub const DEFAULT_GUIDELINES: &str = "\
Annotation Guidelines:

1. Transcription Quality:
   - Rate the quality of the transcription based on the following scale:
     • 0: Incorrect – The transcription does not accurately represent the spoken content.
     • 1: Partially Correct – The transcription is mostly correct but contains minor
       misspellings or errors.
     • 2: Totally Correct – The transcription is exactly as spoken.

2. Corrected Transcription:
   - If the transcription quality is rated as 0 or 1, please provide the corrected transcription.
   - This field is pre-filled with the original transcription. Only modify it if
     corrections are needed.

3. Speaker Gender:
   - Select the gender of the speaker as perceived from the audio.
   - Options: Male, Female.

4. Emotion / Sentiment:
   - Assess the emotional tone or sentiment expressed in the audio.
   - Options: Very Positive, Positive, Neutral, Negative, Very Negative, Other.

5. Utterance Intent:
   - Identify the intent behind the utterance.
   - Options: Question, Informative/Statement, Command, Other.

6. Background Noise Level:
   - Evaluate the level of background noise present in the audio.
   - Options: None, Low, Moderate, High.

7. Speaker Clarity:
   - Determine how clear the speaker's voice is.
   - Options: Clear, Somewhat Clear, Muffled/Unclear.

8. Speaker Count:
   - Indicate whether the audio contains a single speaker or multiple speakers.
   - Options: Single Speaker, Multiple Speakers.

Please listen carefully to the audio and use the structured options to ensure
consistent annotations.
";

fn default_true() -> bool {
    true
}

/// A text field shown to annotators alongside the questions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub use_markdown: bool,
}

impl FieldDefinition {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            required: true,
            use_markdown: false,
        }
    }

    pub fn markdown(name: impl Into<String>) -> Self {
        Self {
            use_markdown: true,
            ..Self::text(name)
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Text {
        #[serde(default)]
        use_markdown: bool,
    },
    Rating {
        values: Vec<u8>,
    },
    Label {
        labels: Vec<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionDefinition {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl QuestionDefinition {
    pub fn text(name: impl Into<String>, title: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: None,
            required,
            kind: QuestionKind::Text {
                use_markdown: false,
            },
        }
    }

    pub fn rating(name: impl Into<String>, title: impl Into<String>, values: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: None,
            required: true,
            kind: QuestionKind::Rating { values },
        }
    }

    pub fn label<I, S>(name: impl Into<String>, title: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            title: title.into(),
            description: None,
            required: true,
            kind: QuestionKind::Label {
                labels: labels.into_iter().map(Into::into).collect(),
            },
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        match &self.kind {
            QuestionKind::Text { .. } => Ok(()),
            QuestionKind::Rating { values } => {
                if values.is_empty() {
                    return Err(DomainError::validation(format!(
                        "rating question `{}` has no values",
                        self.name
                    )));
                }
                if let Some(value) = values.iter().find(|v| **v > MAX_RATING_VALUE) {
                    return Err(DomainError::validation(format!(
                        "rating question `{}` value {} exceeds {}",
                        self.name, value, MAX_RATING_VALUE
                    )));
                }
                let unique: HashSet<_> = values.iter().collect();
                if unique.len() != values.len() {
                    return Err(DomainError::validation(format!(
                        "rating question `{}` repeats a value",
                        self.name
                    )));
                }
                Ok(())
            }
            QuestionKind::Label { labels } => {
                if labels.is_empty() {
                    return Err(DomainError::validation(format!(
                        "label question `{}` has an empty label set",
                        self.name
                    )));
                }
                let mut seen = HashSet::new();
                for label in labels {
                    if label.trim().is_empty() {
                        return Err(DomainError::validation(format!(
                            "label question `{}` has a blank label",
                            self.name
                        )));
                    }
                    if !seen.insert(label.as_str()) {
                        return Err(DomainError::validation(format!(
                            "label question `{}` repeats label `{}`",
                            self.name, label
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDefinition {
    #[serde(default)]
    guidelines: Option<String>,
    fields: Vec<FieldDefinition>,
    #[serde(default)]
    questions: Vec<QuestionDefinition>,
}

/// Field and question layout of an annotation dataset.
///
/// Only constructible through [`AnnotationSchema::new`] (or deserialization,
/// which runs the same checks), so a held value is always valid.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "SchemaDefinition")]
pub struct AnnotationSchema {
    guidelines: Option<String>,
    fields: Vec<FieldDefinition>,
    questions: Vec<QuestionDefinition>,
}

impl AnnotationSchema {
    pub fn new(
        guidelines: Option<String>,
        fields: Vec<FieldDefinition>,
        questions: Vec<QuestionDefinition>,
    ) -> Result<Self, DomainError> {
        if fields.is_empty() {
            return Err(DomainError::validation(
                "schema requires at least one field",
            ));
        }
        let mut names = HashSet::new();
        let all_names = fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(questions.iter().map(|q| q.name.as_str()));
        for name in all_names {
            if name.trim().is_empty() {
                return Err(DomainError::validation("schema names cannot be empty"));
            }
            if !names.insert(name) {
                return Err(DomainError::validation(format!(
                    "schema name `{name}` is defined twice"
                )));
            }
        }
        for question in &questions {
            question.validate()?;
        }
        Ok(Self {
            guidelines,
            fields,
            questions,
        })
    }

    /// The transcription review layout: the audio player and the original
    /// text, plus quality, correction and speaker/recording attributes.
    pub fn transcription_review(guidelines: Option<String>) -> Result<Self, DomainError> {
        let fields = vec![
            FieldDefinition::markdown("audio"),
            FieldDefinition::text("original_transcription"),
        ];
        let questions = vec![
            QuestionDefinition::rating(
                "transcription_quality",
                concat!(
                    "How good is the transcription? \n",
                    "(0: Incorrect, 1: Partially Correct, 2: Totally Correct)",
                ),
                vec![0, 1, 2],
            ),
            QuestionDefinition::text(
                "corrected_transcription",
                "Provide the correct transcription if needed (only required if rating is 0 or 1)",
                false,
            ),
            QuestionDefinition::label("speaker_gender", "Speaker Gender", ["Male", "Female"]),
            QuestionDefinition::label(
                "emotion_sentiment",
                "Emotion / Sentiment",
                [
                    "Very Positive",
                    "Positive",
                    "Neutral",
                    "Negative",
                    "Very Negative",
                    "Other",
                ],
            ),
            QuestionDefinition::label(
                "intent",
                "Utterance Intent",
                ["Question", "Informative/Statement", "Command", "Other"],
            ),
            QuestionDefinition::label(
                "background_noise",
                "Background Noise Level",
                ["None", "Low", "Moderate", "High"],
            ),
            QuestionDefinition::label(
                "speaker_clarity",
                "Speaker Clarity",
                ["Clear", "Somewhat Clear", "Muffled/Unclear"],
            ),
            QuestionDefinition::label(
                "speaker_count",
                "Speaker Count",
                ["Single Speaker", "Multiple Speakers"],
            ),
        ];
        Self::new(guidelines, fields, questions)
    }

    pub fn from_yaml(source: &str) -> Result<Self, DomainError> {
        serde_yaml::from_str(source).map_err(|err| DomainError::Serialization(err.to_string()))
    }

    pub fn with_guidelines(mut self, guidelines: impl Into<String>) -> Self {
        self.guidelines = Some(guidelines.into());
        self
    }

    pub fn guidelines(&self) -> Option<&str> {
        self.guidelines.as_deref()
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn questions(&self) -> &[QuestionDefinition] {
        &self.questions
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn question(&self, name: &str) -> Option<&QuestionDefinition> {
        self.questions.iter().find(|question| question.name == name)
    }
}

impl TryFrom<SchemaDefinition> for AnnotationSchema {
    type Error = DomainError;

    fn try_from(definition: SchemaDefinition) -> Result<Self, Self::Error> {
        Self::new(definition.guidelines, definition.fields, definition.questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_is_valid() {
        let schema =
            AnnotationSchema::transcription_review(Some(DEFAULT_GUIDELINES.into())).unwrap();
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.questions().len(), 8);
        assert!(schema.field("audio").unwrap().use_markdown);
        assert!(!schema.question("corrected_transcription").unwrap().required);
        assert!(schema.guidelines().unwrap().contains("Speaker Count"));
        match &schema.question("transcription_quality").unwrap().kind {
            QuestionKind::Rating { values } => assert_eq!(values, &vec![0, 1, 2]),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_label_set() {
        let result = AnnotationSchema::new(
            None,
            vec![FieldDefinition::markdown("audio")],
            vec![QuestionDefinition::label(
                "speaker_gender",
                "Speaker Gender",
                Vec::<String>::new(),
            )],
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn rejects_duplicate_names_across_fields_and_questions() {
        let result = AnnotationSchema::new(
            None,
            vec![FieldDefinition::text("audio")],
            vec![QuestionDefinition::text("audio", "Audio", true)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_rating_scales() {
        let fields = vec![FieldDefinition::text("text")];
        assert!(AnnotationSchema::new(
            None,
            fields.clone(),
            vec![QuestionDefinition::rating("q", "Q", vec![])]
        )
        .is_err());
        assert!(AnnotationSchema::new(
            None,
            fields.clone(),
            vec![QuestionDefinition::rating("q", "Q", vec![1, 11])]
        )
        .is_err());
        assert!(AnnotationSchema::new(
            None,
            fields,
            vec![QuestionDefinition::rating("q", "Q", vec![1, 1])]
        )
        .is_err());
    }

    #[test]
    fn rejects_schema_without_fields() {
        assert!(AnnotationSchema::new(None, vec![], vec![]).is_err());
    }

    #[test]
    fn yaml_schema_goes_through_validation() {
        let valid = r#"
guidelines: Listen first.
fields:
  - name: audio
    use_markdown: true
questions:
  - name: noise
    title: Noise
    type: label
    labels: [None, High]
  - name: quality
    title: Quality
    type: rating
    values: [1, 2, 3]
"#;
        let schema = AnnotationSchema::from_yaml(valid).unwrap();
        assert_eq!(schema.guidelines(), Some("Listen first."));
        assert!(schema.field("audio").unwrap().required);
        assert_eq!(schema.questions().len(), 2);

        let invalid = r#"
fields:
  - name: audio
questions:
  - name: noise
    title: Noise
    type: label
    labels: []
"#;
        let err = AnnotationSchema::from_yaml(invalid).unwrap_err();
        assert!(err.to_string().contains("empty label set"));
    }
}
