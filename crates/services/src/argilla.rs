use std::collections::HashMap;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use vocalabel_domain::{
    AnnotationSchema, FieldDefinition, FieldMapping, MappingTarget, PreparedRecord,
    QuestionDefinition, QuestionKind,
};

use crate::error::{check_status, ServiceError};

pub const API_KEY_HEADER: &str = "X-Argilla-Api-Key";
/// Records sent per bulk request.
pub const RECORDS_BATCH_SIZE: usize = 256;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RemoteDataset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Items<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RemoteQuestion {
    id: String,
    name: String,
}

/// A dataset on the platform with the ids of its questions, which records
/// need to attach suggestions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetHandle {
    pub id: String,
    pub name: String,
    question_ids: HashMap<String, String>,
}

impl DatasetHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            question_ids: HashMap::new(),
        }
    }

    pub fn with_question(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.question_ids.insert(name.into(), id.into());
        self
    }

    pub fn question_id(&self, name: &str) -> Option<&str> {
        self.question_ids.get(name).map(String::as_str)
    }
}

pub fn dataset_payload(name: &str, workspace_id: &str, schema: &AnnotationSchema) -> Value {
    let mut payload = json!({
        "name": name,
        "workspace_id": workspace_id,
        "allow_extra_metadata": false,
        "distribution": {"strategy": "overlap", "min_submitted": 1},
    });
    if let Some(guidelines) = schema.guidelines() {
        payload["guidelines"] = Value::String(guidelines.to_string());
    }
    payload
}

pub fn field_payload(field: &FieldDefinition) -> Value {
    json!({
        "name": field.name,
        "title": field.display_title(),
        "required": field.required,
        "settings": {"type": "text", "use_markdown": field.use_markdown},
    })
}

pub fn question_payload(question: &QuestionDefinition) -> Value {
    let settings = match &question.kind {
        QuestionKind::Text { use_markdown } => json!({
            "type": "text",
            "use_markdown": use_markdown,
        }),
        QuestionKind::Rating { values } => json!({
            "type": "rating",
            "options": values.iter().map(|value| json!({"value": value})).collect::<Vec<_>>(),
        }),
        QuestionKind::Label { labels } => json!({
            "type": "label_selection",
            "options": labels
                .iter()
                .map(|label| json!({"value": label, "text": label}))
                .collect::<Vec<_>>(),
        }),
    };
    let mut payload = json!({
        "name": question.name,
        "title": question.title,
        "required": question.required,
        "settings": settings,
    });
    if let Some(description) = &question.description {
        payload["description"] = Value::String(description.clone());
    }
    payload
}

/// Build one bulk item: mapped fields under `fields`, mapped questions as
/// pre-filled suggestions. Empty suggestion values are left out.
pub fn record_payload(
    record: &PreparedRecord,
    mapping: &FieldMapping,
    schema: &AnnotationSchema,
    dataset: &DatasetHandle,
) -> Result<Value, ServiceError> {
    let mut fields = Map::new();
    let mut suggestions = Vec::new();
    for (source, target) in mapping.resolve(schema) {
        let value = record.value_of(source).ok_or_else(|| {
            ServiceError::decode(format!("record has no value named `{source}`"))
        })?;
        match target {
            MappingTarget::Field(name) => {
                fields.insert(name.to_string(), Value::String(value.to_string()));
            }
            MappingTarget::Question(name) => {
                if value.is_empty() {
                    continue;
                }
                let question_id = dataset.question_id(name).ok_or_else(|| {
                    ServiceError::decode(format!(
                        "dataset `{}` has no question `{name}`",
                        dataset.name
                    ))
                })?;
                suggestions.push(json!({"question_id": question_id, "value": value}));
            }
        }
    }
    Ok(json!({
        "external_id": record.id.to_string(),
        "fields": fields,
        "suggestions": suggestions,
    }))
}

/// Client for the annotation platform's REST API.
#[derive(Clone)]
pub struct ArgillaClient {
    api_url: String,
    api_key: String,
    bearer_token: Option<String>,
    http: reqwest::Client,
}

impl ArgillaClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            bearer_token: None,
            http: reqwest::Client::new(),
        }
    }

    /// Extra `Authorization: Bearer` header, needed when the platform runs in
    /// a private hub Space.
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|token| !token.trim().is_empty());
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ServiceError> {
        let url = format!("{}{}", self.api_url, path);
        let mut builder = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, &self.api_key);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| ServiceError::transport(&url, err))?;
        check_status(&url, response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ServiceError> {
        self.send(method, path, body)
            .await?
            .json::<T>()
            .await
            .map_err(|err| ServiceError::decode(format!("{path}: {err}")))
    }

    pub async fn workspaces(&self) -> Result<Vec<Workspace>, ServiceError> {
        let page: Items<Workspace> = self
            .send_json(Method::GET, "/api/v1/me/workspaces", None)
            .await?;
        Ok(page.items)
    }

    /// The named workspace, or the first one visible to the API key.
    pub async fn resolve_workspace(&self, name: Option<&str>) -> Result<Workspace, ServiceError> {
        let workspaces = self.workspaces().await?;
        let found = match name {
            Some(name) => workspaces.into_iter().find(|ws| ws.name == name),
            None => workspaces.into_iter().next(),
        };
        found.ok_or_else(|| {
            ServiceError::NotFound(format!("workspace {}", name.unwrap_or("<any>")))
        })
    }

    pub async fn find_dataset(
        &self,
        name: &str,
        workspace_id: &str,
    ) -> Result<Option<RemoteDataset>, ServiceError> {
        let page: Items<RemoteDataset> = self
            .send_json(Method::GET, "/api/v1/me/datasets", None)
            .await?;
        Ok(page.items.into_iter().find(|dataset| {
            dataset.name == name
                && dataset
                    .workspace_id
                    .as_deref()
                    .map_or(true, |id| id == workspace_id)
        }))
    }

    /// Create, configure and publish a dataset. An existing dataset with the
    /// same name yields [`ServiceError::Conflict`]. If configuring fails the
    /// half-built dataset is deleted again before the error is returned.
    #[instrument(skip(self, schema))]
    pub async fn create_dataset(
        &self,
        name: &str,
        workspace_id: &str,
        schema: &AnnotationSchema,
    ) -> Result<DatasetHandle, ServiceError> {
        let created: Created = self
            .send_json(
                Method::POST,
                "/api/v1/datasets",
                Some(&dataset_payload(name, workspace_id, schema)),
            )
            .await?;
        let handle = DatasetHandle::new(created.id, name);

        match self.configure_dataset(handle.clone(), schema).await {
            Ok(handle) => {
                info!(id = %handle.id, "created annotation dataset");
                Ok(handle)
            }
            Err(err) => {
                if let Err(cleanup) = self.delete_dataset(&handle.id).await {
                    warn!(
                        id = %handle.id,
                        error = %cleanup,
                        "could not remove incomplete dataset"
                    );
                }
                Err(err)
            }
        }
    }

    async fn configure_dataset(
        &self,
        mut handle: DatasetHandle,
        schema: &AnnotationSchema,
    ) -> Result<DatasetHandle, ServiceError> {
        for field in schema.fields() {
            self.send(
                Method::POST,
                &format!("/api/v1/datasets/{}/fields", handle.id),
                Some(&field_payload(field)),
            )
            .await?;
        }
        for question in schema.questions() {
            let created: Created = self
                .send_json(
                    Method::POST,
                    &format!("/api/v1/datasets/{}/questions", handle.id),
                    Some(&question_payload(question)),
                )
                .await?;
            handle = handle.with_question(question.name.clone(), created.id);
        }
        self.send(
            Method::PUT,
            &format!("/api/v1/datasets/{}/publish", handle.id),
            None,
        )
        .await?;
        Ok(handle)
    }

    /// Load question ids of an existing dataset.
    pub async fn open_dataset(
        &self,
        dataset: &RemoteDataset,
    ) -> Result<DatasetHandle, ServiceError> {
        let questions: Items<RemoteQuestion> = self
            .send_json(
                Method::GET,
                &format!("/api/v1/datasets/{}/questions", dataset.id),
                None,
            )
            .await?;
        Ok(questions
            .items
            .into_iter()
            .fold(DatasetHandle::new(&dataset.id, &dataset.name), |handle, q| {
                handle.with_question(q.name, q.id)
            }))
    }

    pub async fn delete_dataset(&self, id: &str) -> Result<(), ServiceError> {
        self.send(Method::DELETE, &format!("/api/v1/datasets/{id}"), None)
            .await?;
        info!(id, "deleted annotation dataset");
        Ok(())
    }

    /// Upsert records in batches, keyed by their identifier.
    #[instrument(skip_all, fields(dataset = %dataset.name, records = records.len()))]
    pub async fn log_records(
        &self,
        dataset: &DatasetHandle,
        records: &[PreparedRecord],
        mapping: &FieldMapping,
        schema: &AnnotationSchema,
    ) -> Result<usize, ServiceError> {
        let path = format!("/api/v1/datasets/{}/records/bulk", dataset.id);
        for batch in records.chunks(RECORDS_BATCH_SIZE) {
            let items = batch
                .iter()
                .map(|record| record_payload(record, mapping, schema, dataset))
                .collect::<Result<Vec<_>, _>>()?;
            self.send(Method::PUT, &path, Some(&json!({ "items": items })))
                .await?;
            debug!(batch = batch.len(), "logged record batch");
        }
        Ok(records.len())
    }
}
