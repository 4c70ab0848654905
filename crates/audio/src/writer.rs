use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use vocalabel_domain::RecordId;

use crate::dsp::{to_pcm16, validate_waveform, PeakLevel};
use crate::AudioError;

const PARTIAL_SUFFIX: &str = "partial";

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// 16-bit integer PCM WAV.
    #[default]
    Pcm16,
    /// 32-bit float WAV.
    Float32,
}

impl AudioCodec {
    fn spec(self, sample_rate: u32) -> hound::WavSpec {
        let (bits_per_sample, sample_format) = match self {
            AudioCodec::Pcm16 => (16, hound::SampleFormat::Int),
            AudioCodec::Float32 => (32, hound::SampleFormat::Float),
        };
        hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// What to do when the staged file for an identifier already exists.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExistingFilePolicy {
    #[default]
    Skip,
    Overwrite,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterializedAudio {
    pub path: PathBuf,
    /// False when an existing file was kept.
    pub written: bool,
}

/// Stages waveforms as `<dir>/audio_<id>.wav`, one file per identifier.
#[derive(Clone, Debug)]
pub struct AudioMaterializer {
    dir: PathBuf,
    codec: AudioCodec,
    policy: ExistingFilePolicy,
}

impl AudioMaterializer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            codec: AudioCodec::default(),
            policy: ExistingFilePolicy::default(),
        }
    }

    pub fn with_codec(mut self, codec: AudioCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_policy(mut self, policy: ExistingFilePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Same settings, staging into `<dir>/<name>`. Keeps datasets whose row
    /// indices overlap from sharing files.
    pub fn scoped(&self, name: &str) -> Self {
        Self {
            dir: self.dir.join(encode_component(name)),
            ..self.clone()
        }
    }

    pub fn path_for(&self, id: &RecordId) -> PathBuf {
        self.dir.join(format!("audio_{}.wav", file_stem(id)))
    }

    #[instrument(skip(self, samples), fields(samples = samples.len()))]
    pub fn materialize(
        &self,
        id: &RecordId,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<MaterializedAudio, AudioError> {
        validate_waveform(samples, sample_rate)?;
        let path = self.path_for(id);
        if self.policy == ExistingFilePolicy::Skip && path.is_file() {
            debug!(path = %path.display(), "staged audio already present");
            return Ok(MaterializedAudio {
                path,
                written: false,
            });
        }

        fs::create_dir_all(&self.dir).map_err(|err| AudioError::io(&self.dir, err))?;
        // A file at `path` is always complete; partial writes live beside it.
        let partial = path.with_extension(format!("wav.{PARTIAL_SUFFIX}"));
        self.write_wav(&partial, samples, sample_rate)?;
        fs::rename(&partial, &path).map_err(|err| AudioError::io(&path, err))?;
        debug!(path = %path.display(), sample_rate, "wrote staged audio");
        Ok(MaterializedAudio {
            path,
            written: true,
        })
    }

    fn write_wav(&self, path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
        let encode_err = |source| AudioError::Encode {
            path: path.to_path_buf(),
            source,
        };
        let mut writer =
            hound::WavWriter::create(path, self.codec.spec(sample_rate)).map_err(encode_err)?;
        match self.codec {
            AudioCodec::Pcm16 => {
                let peak = PeakLevel::measure(samples);
                if peak.exceeds_unity() {
                    warn!(
                        max = peak.max,
                        min = peak.min,
                        path = %path.display(),
                        "samples clamped to [-1, 1]"
                    );
                }
                for sample in to_pcm16(samples) {
                    writer.write_sample(sample).map_err(encode_err)?;
                }
            }
            AudioCodec::Float32 => {
                for sample in samples {
                    writer.write_sample(*sample).map_err(encode_err)?;
                }
            }
        }
        writer.finalize().map_err(encode_err)
    }
}

/// Distinct ids always map to distinct stems: indices stay bare, string keys
/// get a `k` prefix and percent-encode every byte outside `[A-Za-z0-9_-]`.
fn file_stem(id: &RecordId) -> String {
    match id {
        RecordId::Index(index) => index.to_string(),
        RecordId::Key(key) => format!("k{}", encode_component(key)),
    }
}

fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CLIP: [f32; 3] = [0.0, 0.1, -0.1];

    #[test]
    fn writes_file_named_after_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = AudioMaterializer::new(dir.path());
        let staged = materializer
            .materialize(&RecordId::Index(3), &CLIP, 16_000)
            .unwrap();
        assert!(staged.written);
        assert!(staged.path.is_file());
        assert_eq!(staged.path, dir.path().join("audio_3.wav"));

        let reader = hound::WavReader::open(&staged.path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.len(), 3);
    }

    #[test]
    fn second_call_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = AudioMaterializer::new(dir.path());
        let first = materializer
            .materialize(&RecordId::Index(3), &CLIP, 16_000)
            .unwrap();
        let modified = fs::metadata(&first.path).unwrap().modified().unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let second = materializer
            .materialize(&RecordId::Index(3), &[0.5; 32], 8_000)
            .unwrap();
        assert!(!second.written);
        assert_eq!(second.path, first.path);
        assert_eq!(fs::metadata(&second.path).unwrap().modified().unwrap(), modified);
        assert_eq!(hound::WavReader::open(&second.path).unwrap().len(), 3);
    }

    #[test]
    fn overwrite_policy_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let materializer =
            AudioMaterializer::new(dir.path()).with_policy(ExistingFilePolicy::Overwrite);
        materializer
            .materialize(&RecordId::Index(1), &CLIP, 16_000)
            .unwrap();
        let again = materializer
            .materialize(&RecordId::Index(1), &[0.2; 10], 16_000)
            .unwrap();
        assert!(again.written);
        assert_eq!(hound::WavReader::open(&again.path).unwrap().len(), 10);
    }

    #[test]
    fn float_codec_preserves_samples() {
        let dir = tempfile::tempdir().unwrap();
        let staged = AudioMaterializer::new(dir.path())
            .with_codec(AudioCodec::Float32)
            .materialize(&RecordId::Index(0), &CLIP, 22_050)
            .unwrap();
        let mut reader = hound::WavReader::open(&staged.path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(samples, CLIP.to_vec());
    }

    #[test]
    fn loud_samples_are_clamped_to_full_scale() {
        let dir = tempfile::tempdir().unwrap();
        let staged = AudioMaterializer::new(dir.path())
            .materialize(&RecordId::Index(4), &[1.5, -2.0, 0.5], 16_000)
            .unwrap();
        let mut reader = hound::WavReader::open(&staged.path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX, 16_384]);
    }

    #[test]
    fn invalid_waveform_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = AudioMaterializer::new(dir.path());
        let empty = materializer.materialize(&RecordId::Index(9), &[], 16_000);
        assert!(matches!(empty, Err(AudioError::InvalidWaveform(_))));
        let zero_rate = materializer.materialize(&RecordId::Index(9), &CLIP, 0);
        assert!(matches!(zero_rate, Err(AudioError::InvalidWaveform(_))));
        assert!(!materializer.path_for(&RecordId::Index(9)).exists());
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("staging").join("clips");
        let staged = AudioMaterializer::new(&nested)
            .materialize(&RecordId::Index(2), &CLIP, 16_000)
            .unwrap();
        assert!(staged.path.starts_with(&nested));
    }

    #[test]
    fn unwritable_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();
        let result =
            AudioMaterializer::new(&blocker).materialize(&RecordId::Index(1), &CLIP, 16_000);
        assert!(matches!(result, Err(AudioError::Io { .. })));
    }

    #[test]
    fn string_identifiers_are_encoded() {
        let materializer = AudioMaterializer::new("staging");
        let path = materializer.path_for(&RecordId::from("../clips/a b"));
        assert_eq!(
            path,
            PathBuf::from("staging").join("audio_k%2E%2E%2Fclips%2Fa%20b.wav")
        );
    }

    #[test]
    fn distinct_ids_never_share_a_file() {
        let materializer = AudioMaterializer::new("staging");
        let ids = [
            RecordId::from("a b"),
            RecordId::from("a_b"),
            RecordId::from("a%20b"),
            RecordId::Index(3),
            RecordId::from("3"),
            RecordId::from("k3"),
        ];
        let paths: std::collections::HashSet<_> =
            ids.iter().map(|id| materializer.path_for(id)).collect();
        assert_eq!(paths.len(), ids.len());
    }

    #[test]
    fn scoped_materializers_keep_overlapping_ids_apart() {
        let dir = tempfile::tempdir().unwrap();
        let base = AudioMaterializer::new(dir.path());
        let first = base
            .scoped("dataset-a")
            .materialize(&RecordId::Index(0), &[0.5; 8], 16_000)
            .unwrap();
        let second = base
            .scoped("dataset-b")
            .materialize(&RecordId::Index(0), &[-0.5; 8], 16_000)
            .unwrap();
        assert!(second.written);
        assert_ne!(first.path, second.path);
        assert_eq!(second.path, dir.path().join("dataset-b").join("audio_0.wav"));
        assert_eq!(base.scoped("../x").dir(), dir.path().join("%2E%2E%2Fx"));
    }
}
