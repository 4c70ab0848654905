use std::collections::HashSet;
use std::fs;

use tracing::{debug, info, instrument, warn};

use vocalabel_audio::{audio_to_html, AudioMaterializer, EmbedMode, EmbedOptions};
use vocalabel_domain::{PreparedRecord, SourceExample};

use crate::config::Settings;
use crate::PipelineError;

/// Turns source examples into annotation-ready records: stage the audio,
/// embed it as an HTML player, pair it with the transcription.
#[derive(Clone, Debug)]
pub struct RecordPreparationPipeline {
    materializer: AudioMaterializer,
    embed: EmbedOptions,
    remove_after_embed: bool,
}

impl RecordPreparationPipeline {
    pub fn new(materializer: AudioMaterializer, embed: EmbedOptions) -> Self {
        Self {
            materializer,
            embed,
            remove_after_embed: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let materializer = AudioMaterializer::new(&settings.audio_dir)
            .with_codec(settings.codec)
            .with_policy(settings.file_policy);
        Self::new(materializer, settings.embed.clone()).with_cleanup(settings.remove_after_embed)
    }

    /// Delete staged files once embedded. Only honoured for inline embeds,
    /// since a reference snippet needs the file to stay.
    pub fn with_cleanup(mut self, remove_after_embed: bool) -> Self {
        if remove_after_embed && self.embed.mode == EmbedMode::Reference {
            warn!("remove_after_embed ignored for reference embeds");
            self.remove_after_embed = false;
        } else {
            self.remove_after_embed = remove_after_embed;
        }
        self
    }

    pub fn materializer(&self) -> &AudioMaterializer {
        &self.materializer
    }

    /// A pipeline staging into its own subdirectory of the audio dir.
    pub fn scoped(&self, name: &str) -> Self {
        Self {
            materializer: self.materializer.scoped(name),
            ..self.clone()
        }
    }

    #[instrument(skip(self, example), fields(id = %example.id))]
    pub fn prepare(&self, example: &SourceExample) -> Result<PreparedRecord, PipelineError> {
        debug!(seconds = example.audio.duration_secs(), "staging clip");
        let staged = self.materializer.materialize(
            &example.id,
            &example.audio.array,
            example.audio.sampling_rate,
        )?;
        let html = audio_to_html(&staged.path, &self.embed)?;
        if self.remove_after_embed {
            fs::remove_file(&staged.path).map_err(|source| PipelineError::Io {
                path: staged.path.clone(),
                source,
            })?;
            debug!(path = %staged.path.display(), "removed staged audio");
        }
        Ok(PreparedRecord::new(
            example.id.clone(),
            html,
            example.transcription.clone(),
        ))
    }

    pub fn prepare_all(
        &self,
        examples: &[SourceExample],
    ) -> Result<Vec<PreparedRecord>, PipelineError> {
        self.prepare_all_with(examples, |_, _| {})
    }

    /// Prepare in order, stopping at the first failure. `on_progress`
    /// receives `(completed, total)` after each record.
    pub fn prepare_all_with<F>(
        &self,
        examples: &[SourceExample],
        mut on_progress: F,
    ) -> Result<Vec<PreparedRecord>, PipelineError>
    where
        F: FnMut(usize, usize),
    {
        // Checked on staged paths, so two ids can never share a file.
        let mut seen = HashSet::with_capacity(examples.len());
        if let Some(duplicate) = examples
            .iter()
            .find(|example| !seen.insert(self.materializer.path_for(&example.id)))
        {
            return Err(PipelineError::DuplicateId(duplicate.id.clone()));
        }

        let total = examples.len();
        let mut records = Vec::with_capacity(total);
        for example in examples {
            records.push(self.prepare(example)?);
            on_progress(records.len(), total);
        }
        info!(count = records.len(), dir = %self.materializer.dir().display(), "prepared records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocalabel_audio::{AudioError, ExistingFilePolicy};
    use vocalabel_domain::{AudioSample, RecordId};

    fn example(id: u64, text: &str) -> SourceExample {
        SourceExample::new(id, AudioSample::new(vec![0.0, 0.1, -0.1], 16_000), text)
    }

    fn pipeline(dir: &std::path::Path) -> RecordPreparationPipeline {
        RecordPreparationPipeline::new(AudioMaterializer::new(dir), EmbedOptions::default())
    }

    #[test]
    fn prepares_reference_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let record = pipeline(dir.path()).prepare(&example(3, "salam")).unwrap();

        assert_eq!(record.id, RecordId::Index(3));
        assert!(record.audio.contains("audio_3.wav"));
        assert!(record.audio.starts_with("<audio"));
        assert_eq!(record.original_transcription, "salam");
        assert_eq!(record.corrected_transcription, "salam");
        assert!(dir.path().join("audio_3.wav").is_file());
    }

    #[test]
    fn prepare_all_keeps_order_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let examples: Vec<_> = (0..5).map(|i| example(i, &format!("t{i}"))).collect();
        let mut progress = Vec::new();
        let records = pipeline(dir.path())
            .prepare_all_with(&examples, |done, total| progress.push((done, total)))
            .unwrap();

        assert_eq!(records.len(), 5);
        for (record, example) in records.iter().zip(&examples) {
            assert_eq!(record.id, example.id);
            assert_eq!(record.original_transcription, example.transcription);
        }
        assert_eq!(progress.last(), Some(&(5, 5)));
    }

    #[test]
    fn duplicate_ids_are_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let examples = vec![example(1, "a"), example(1, "b")];
        let result = pipeline(dir.path()).prepare_all(&examples);
        assert!(matches!(result, Err(PipelineError::DuplicateId(RecordId::Index(1)))));
        assert!(!dir.path().join("audio_1.wav").exists());
    }

    #[test]
    fn similar_string_keys_get_their_own_audio() {
        let dir = tempfile::tempdir().unwrap();
        let examples = vec![
            SourceExample::new("a b", AudioSample::new(vec![0.5; 64], 16_000), "first"),
            SourceExample::new("a_b", AudioSample::new(vec![-0.5; 64], 16_000), "second"),
            SourceExample::new(3u64, AudioSample::new(vec![0.25; 64], 16_000), "index"),
            SourceExample::new("3", AudioSample::new(vec![-0.25; 64], 16_000), "key"),
        ];
        let records = pipeline(dir.path()).prepare_all(&examples).unwrap();

        let snippets: HashSet<_> = records.iter().map(|record| record.audio.as_str()).collect();
        assert_eq!(snippets.len(), 4);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn scoped_pipeline_stages_under_dataset_dir() {
        let dir = tempfile::tempdir().unwrap();
        let record = pipeline(dir.path())
            .scoped("Darija")
            .prepare(&example(0, "x"))
            .unwrap();
        assert!(record.audio.contains("audio_0.wav"));
        assert!(dir.path().join("Darija").join("audio_0.wav").is_file());
    }

    #[test]
    fn bad_audio_aborts_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let examples = vec![
            example(0, "ok"),
            SourceExample::new(1u64, AudioSample::new(vec![], 16_000), "empty"),
            example(2, "never reached"),
        ];
        let result = pipeline(dir.path()).prepare_all(&examples);
        assert!(matches!(
            result,
            Err(PipelineError::Audio(AudioError::InvalidWaveform(_)))
        ));
        assert!(!dir.path().join("audio_2.wav").exists());
    }

    #[test]
    fn rerun_reuses_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = AudioMaterializer::new(dir.path()).with_policy(ExistingFilePolicy::Skip);
        let pipeline = RecordPreparationPipeline::new(materializer, EmbedOptions::default());
        let first = pipeline.prepare(&example(4, "x")).unwrap();
        let second = pipeline.prepare(&example(4, "x")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cleanup_removes_inline_sources_only() {
        let dir = tempfile::tempdir().unwrap();
        let inline = pipeline(dir.path()).with_cleanup(true);
        let record = inline.prepare(&example(8, "x")).unwrap();
        assert!(record.audio.contains("base64,"));
        assert!(!dir.path().join("audio_8.wav").exists());

        let reference = RecordPreparationPipeline::new(
            AudioMaterializer::new(dir.path()),
            EmbedOptions {
                mode: EmbedMode::Reference,
                ..Default::default()
            },
        )
        .with_cleanup(true);
        reference.prepare(&example(9, "y")).unwrap();
        assert!(dir.path().join("audio_9.wav").is_file());
    }
}
