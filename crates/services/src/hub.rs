use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use vocalabel_audio::AudioDecoder;
use vocalabel_domain::{AudioSample, RecordId, SourceExample, SplitSelector};

use crate::error::{check_status, ServiceError};

pub const DEFAULT_HUB_ENDPOINT: &str = "https://datasets-server.huggingface.co";
/// Largest page the rows endpoint serves.
pub const MAX_PAGE_ROWS: u64 = 100;

/// What to read from the hub: one split slice, two columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubRequest {
    pub dataset: String,
    pub config: String,
    pub split: SplitSelector,
    pub audio_column: String,
    pub transcription_column: String,
}

impl HubRequest {
    pub fn new(dataset: impl Into<String>, split: SplitSelector) -> Self {
        Self {
            dataset: dataset.into(),
            config: "default".into(),
            split,
            audio_column: "audio".into(),
            transcription_column: "transcription".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RowsPage {
    pub rows: Vec<HubRow>,
    #[serde(default)]
    pub num_rows_total: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct HubRow {
    pub row_idx: u64,
    pub row: Map<String, Value>,
}

/// Audio cell of a hub row.
#[derive(Clone, Debug, PartialEq)]
pub enum AudioPayload {
    /// Decoded samples, `{"array": [...], "sampling_rate": n}`.
    Inline(AudioSample),
    /// An asset URL, `[{"src": "...", "type": "audio/wav"}]`.
    Remote { src: String, mime: Option<String> },
}

impl AudioPayload {
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(asset) = value.as_array().and_then(|assets| assets.first()) {
            return Self::from_value(asset);
        }
        let object = value.as_object()?;
        if let Some(src) = object.get("src").and_then(Value::as_str) {
            return Some(Self::Remote {
                src: src.to_string(),
                mime: object
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        let sample: AudioSample = serde_json::from_value(Value::Object(object.clone())).ok()?;
        Some(Self::Inline(sample))
    }
}

fn extension_hint(mime: Option<&str>, src: &str) -> Option<String> {
    let from_mime = mime.and_then(|mime| match mime {
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    });
    if let Some(ext) = from_mime {
        return Some(ext.to_string());
    }
    let path = src.split(['?', '#']).next().unwrap_or(src);
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.contains('/'))
}

/// Client for the dataset hub's rows API.
#[derive(Clone)]
pub struct HubClient {
    endpoint: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl HubClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|token| !token.trim().is_empty());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fetch the selected rows in hub order; the row index becomes the id.
    #[instrument(skip(self, request), fields(dataset = %request.dataset, split = %request.split))]
    pub async fn fetch_examples(
        &self,
        request: &HubRequest,
    ) -> Result<Vec<SourceExample>, ServiceError> {
        let mut examples = Vec::new();
        if request.split.is_empty() {
            return Ok(examples);
        }
        let mut offset = request.split.start;
        loop {
            let wanted = request
                .split
                .end
                .map_or(MAX_PAGE_ROWS, |end| (end - offset).min(MAX_PAGE_ROWS));
            let page = self.fetch_page(request, offset, wanted).await?;
            let end = match page.num_rows_total {
                Some(total) => request.split.bounded_end(total),
                None => request.split.end.unwrap_or(u64::MAX),
            };
            let received = page.rows.len() as u64;
            for row in page.rows {
                if row.row_idx >= end {
                    break;
                }
                examples.push(self.to_example(request, row).await?);
            }
            offset += received;
            debug!(offset, end, "fetched rows page");
            if received == 0 || offset >= end {
                break;
            }
        }
        info!(count = examples.len(), "loaded examples from hub");
        Ok(examples)
    }

    async fn fetch_page(
        &self,
        request: &HubRequest,
        offset: u64,
        length: u64,
    ) -> Result<RowsPage, ServiceError> {
        let url = format!("{}/rows", self.endpoint);
        let offset = offset.to_string();
        let length = length.to_string();
        let builder = self.http.get(&url).query(&[
            ("dataset", request.dataset.as_str()),
            ("config", request.config.as_str()),
            ("split", request.split.name.as_str()),
            ("offset", offset.as_str()),
            ("length", length.as_str()),
        ]);
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|err| ServiceError::transport(&url, err))?;
        let response = check_status(&url, response).await?;
        response
            .json::<RowsPage>()
            .await
            .map_err(|err| ServiceError::decode(format!("rows page: {err}")))
    }

    async fn to_example(
        &self,
        request: &HubRequest,
        row: HubRow,
    ) -> Result<SourceExample, ServiceError> {
        let transcription = row
            .row
            .get(&request.transcription_column)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::decode(format!(
                    "row {} has no text column `{}`",
                    row.row_idx, request.transcription_column
                ))
            })?
            .to_string();
        let payload = row
            .row
            .get(&request.audio_column)
            .and_then(AudioPayload::from_value)
            .ok_or_else(|| ServiceError::Audio {
                row: row.row_idx,
                message: format!("missing or unrecognized column `{}`", request.audio_column),
            })?;
        let audio = self.resolve_audio(row.row_idx, payload).await?;
        Ok(SourceExample::new(
            RecordId::Index(row.row_idx),
            audio,
            transcription,
        ))
    }

    async fn resolve_audio(
        &self,
        row: u64,
        payload: AudioPayload,
    ) -> Result<AudioSample, ServiceError> {
        let (src, mime) = match payload {
            AudioPayload::Inline(sample) => return Ok(sample),
            AudioPayload::Remote { src, mime } => (src, mime),
        };
        let response = self
            .authorize(self.http.get(&src))
            .send()
            .await
            .map_err(|err| ServiceError::transport(&src, err))?;
        let bytes = check_status(&src, response)
            .await?
            .bytes()
            .await
            .map_err(|err| ServiceError::transport(&src, err))?;
        let extension = extension_hint(mime.as_deref(), &src);
        let decoded = AudioDecoder::decode_bytes(bytes.to_vec(), extension.as_deref())
            .map_err(|err| ServiceError::Audio {
                row,
                message: format!("{err:#}"),
            })?;
        let sample_rate = decoded.sample_rate;
        Ok(AudioSample::new(decoded.into_mono(), sample_rate))
    }
}
