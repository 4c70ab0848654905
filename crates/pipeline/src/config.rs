use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use vocalabel_audio::{AudioCodec, EmbedOptions, ExistingFilePolicy};
use vocalabel_domain::{AnnotationSchema, SplitSelector, DEFAULT_GUIDELINES};
use vocalabel_services::{HubRequest, DEFAULT_HUB_ENDPOINT};

use crate::upload::ExistingDatasetPolicy;
use crate::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "vocalabel.yaml";
pub const DEFAULT_DATASET: &str = "atlasia/Youtube-Commons-Morocco-Darija-35h";
pub const DEFAULT_SPLIT: &str = "train[:10]";

/// Settings read from the YAML file, all optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dataset_list: Vec<String>,
    #[serde(rename = "UPLOAD_SPLIT")]
    pub upload_split: SplitSelector,
    #[serde(rename = "ANNOTATION_GUIDELINES")]
    pub annotation_guidelines: Option<String>,
    pub audio_dir: PathBuf,
    pub hub_config: String,
    pub audio_column: String,
    pub transcription_column: String,
    pub workspace: Option<String>,
    pub existing_dataset: ExistingDatasetPolicy,
    pub file_policy: ExistingFilePolicy,
    pub codec: AudioCodec,
    pub embed: EmbedOptions,
    pub remove_after_embed: bool,
    pub schema: Option<AnnotationSchema>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dataset_list: vec![DEFAULT_DATASET.to_string()],
            upload_split: DEFAULT_SPLIT
                .parse()
                .unwrap_or_else(|_| SplitSelector::whole("train")),
            annotation_guidelines: None,
            audio_dir: PathBuf::from("audio"),
            hub_config: "default".into(),
            audio_column: "audio".into(),
            transcription_column: "transcription".into(),
            workspace: None,
            existing_dataset: ExistingDatasetPolicy::default(),
            file_policy: ExistingFilePolicy::default(),
            codec: AudioCodec::default(),
            embed: EmbedOptions::default(),
            remove_after_embed: false,
            schema: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PlatformCredentials {
    pub api_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Everything the uploader needs, resolved from file and environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: Settings,
    /// Absent only when the platform was not required (dry runs).
    pub platform: Option<PlatformCredentials>,
    pub hub_token: Option<String>,
    pub hub_endpoint: String,
}

fn first_var(env: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env(*key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

impl AppConfig {
    /// Load settings from `path` (defaults when `None`) and apply the
    /// environment on top. Platform credentials are required when
    /// `require_platform` is set.
    pub fn load(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        require_platform: bool,
    ) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::read_settings(path)?,
            None => Settings::default(),
        };

        if let Some(list) = first_var(&env, &["DATASET_LIST"]) {
            settings.dataset_list = list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(split) = first_var(&env, &["UPLOAD_SPLIT"]) {
            settings.upload_split = split
                .parse()
                .map_err(|err| ConfigError::invalid("UPLOAD_SPLIT", format!("{err}")))?;
        }
        if let Some(guidelines) = first_var(&env, &["ANNOTATION_GUIDELINES"]) {
            settings.annotation_guidelines = Some(guidelines);
        }
        if settings.dataset_list.is_empty() {
            return Err(ConfigError::invalid("dataset_list", "no datasets to process"));
        }

        let api_url = first_var(&env, &["ARGILLA_API_URL"]);
        let api_key = first_var(&env, &["ARGILLA_API_KEY", "ARGILLA_KEY"]);
        let platform = match (api_url, api_key) {
            (Some(api_url), Some(api_key)) => Some(PlatformCredentials { api_url, api_key }),
            (None, _) if require_platform => return Err(ConfigError::Missing("ARGILLA_API_URL")),
            (_, None) if require_platform => return Err(ConfigError::Missing("ARGILLA_API_KEY")),
            _ => None,
        };

        Ok(Self {
            settings,
            platform,
            hub_token: first_var(&env, &["HF_TOKEN", "HF_API_KEY"]),
            hub_endpoint: first_var(&env, &["HUB_ENDPOINT"])
                .unwrap_or_else(|| DEFAULT_HUB_ENDPOINT.to_string()),
        })
    }

    pub fn from_process_env(
        path: Option<&Path>,
        require_platform: bool,
    ) -> Result<Self, ConfigError> {
        Self::load(path, |key| std::env::var(key).ok(), require_platform)
    }

    fn read_settings(path: &Path) -> Result<Settings, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "read configuration file");
        if raw.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The configured schema, or the built-in transcription review schema.
    /// Guidelines come from the schema itself, then `ANNOTATION_GUIDELINES`,
    /// then the built-in text.
    pub fn schema(&self) -> Result<AnnotationSchema, ConfigError> {
        let guidelines = self
            .settings
            .annotation_guidelines
            .clone()
            .unwrap_or_else(|| DEFAULT_GUIDELINES.to_string());
        match &self.settings.schema {
            Some(schema) if schema.guidelines().is_some() => Ok(schema.clone()),
            Some(schema) => Ok(schema.clone().with_guidelines(guidelines)),
            None => AnnotationSchema::transcription_review(Some(guidelines))
                .map_err(|err| ConfigError::invalid("schema", err.to_string())),
        }
    }

    pub fn hub_request(&self, dataset: &str) -> HubRequest {
        HubRequest {
            dataset: dataset.to_string(),
            config: self.settings.hub_config.clone(),
            split: self.settings.upload_split.clone(),
            audio_column: self.settings.audio_column.clone(),
            transcription_column: self.settings.transcription_column.clone(),
        }
    }
}
