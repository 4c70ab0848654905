use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use vocalabel_domain::{
    AnnotationSchema, ExportFormat, FieldMapping, JsonExporter, PreparedRecord, RecordExporter,
};
use vocalabel_services::{ArgillaClient, DatasetHandle, ServiceError, Workspace};

/// Where prepared records end up.
#[async_trait]
pub trait AnnotationSink: Send + Sync {
    async fn find_dataset(&self, name: &str) -> Result<Option<DatasetHandle>, ServiceError>;

    async fn create_dataset(
        &self,
        name: &str,
        schema: &AnnotationSchema,
    ) -> Result<DatasetHandle, ServiceError>;

    async fn delete_dataset(&self, dataset: &DatasetHandle) -> Result<(), ServiceError>;

    async fn log_records(
        &self,
        dataset: &DatasetHandle,
        records: &[PreparedRecord],
        mapping: &FieldMapping,
        schema: &AnnotationSchema,
    ) -> Result<usize, ServiceError>;
}

/// The annotation platform, scoped to one workspace.
pub struct ArgillaSink {
    client: ArgillaClient,
    workspace: Workspace,
}

impl ArgillaSink {
    pub fn new(client: ArgillaClient, workspace: Workspace) -> Self {
        Self { client, workspace }
    }

    /// Resolve the workspace (named, or the first available) and bind to it.
    pub async fn connect(
        client: ArgillaClient,
        workspace: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let workspace = client.resolve_workspace(workspace).await?;
        info!(
            workspace = %workspace.name,
            url = %client.api_url(),
            "connected to annotation platform"
        );
        Ok(Self::new(client, workspace))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }
}

#[async_trait]
impl AnnotationSink for ArgillaSink {
    async fn find_dataset(&self, name: &str) -> Result<Option<DatasetHandle>, ServiceError> {
        match self.client.find_dataset(name, &self.workspace.id).await? {
            Some(remote) => Ok(Some(self.client.open_dataset(&remote).await?)),
            None => Ok(None),
        }
    }

    async fn create_dataset(
        &self,
        name: &str,
        schema: &AnnotationSchema,
    ) -> Result<DatasetHandle, ServiceError> {
        self.client
            .create_dataset(name, &self.workspace.id, schema)
            .await
    }

    async fn delete_dataset(&self, dataset: &DatasetHandle) -> Result<(), ServiceError> {
        self.client.delete_dataset(&dataset.id).await
    }

    async fn log_records(
        &self,
        dataset: &DatasetHandle,
        records: &[PreparedRecord],
        mapping: &FieldMapping,
        schema: &AnnotationSchema,
    ) -> Result<usize, ServiceError> {
        self.client
            .log_records(dataset, records, mapping, schema)
            .await
    }
}

/// Writes records to `<dir>/<dataset>.jsonl` instead of uploading them.
pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, dataset: &str) -> PathBuf {
        self.dir.join(format!("{dataset}.jsonl"))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> ServiceError {
    ServiceError::decode(format!("{}: {err}", path.display()))
}

#[async_trait]
impl AnnotationSink for JsonlSink {
    async fn find_dataset(&self, _name: &str) -> Result<Option<DatasetHandle>, ServiceError> {
        Ok(None)
    }

    async fn create_dataset(
        &self,
        name: &str,
        schema: &AnnotationSchema,
    ) -> Result<DatasetHandle, ServiceError> {
        fs::create_dir_all(&self.dir).map_err(|err| io_error(&self.dir, err))?;
        let path = self.path_for(name);
        fs::write(&path, b"").map_err(|err| io_error(&path, err))?;
        let handle = schema
            .questions()
            .iter()
            .fold(DatasetHandle::new(path.display().to_string(), name), |handle, q| {
                handle.with_question(q.name.clone(), q.name.clone())
            });
        Ok(handle)
    }

    async fn delete_dataset(&self, dataset: &DatasetHandle) -> Result<(), ServiceError> {
        let path = self.path_for(&dataset.name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path, err)),
        }
    }

    async fn log_records(
        &self,
        dataset: &DatasetHandle,
        records: &[PreparedRecord],
        _mapping: &FieldMapping,
        _schema: &AnnotationSchema,
    ) -> Result<usize, ServiceError> {
        let path = self.path_for(&dataset.name);
        let bytes = JsonExporter
            .export(records, ExportFormat::JsonLines)
            .map_err(|err| ServiceError::decode(err.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| io_error(&path, err))?;
        file.write_all(&bytes).map_err(|err| io_error(&path, err))?;
        info!(path = %path.display(), records = records.len(), "wrote records locally");
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocalabel_domain::RecordId;

    #[tokio::test]
    async fn jsonl_sink_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path());
        let schema = AnnotationSchema::transcription_review(None).unwrap();
        let handle = sink.create_dataset("Darija", &schema).await.unwrap();
        assert_eq!(
            handle.question_id("corrected_transcription"),
            Some("corrected_transcription")
        );

        let records = vec![
            PreparedRecord::new(RecordId::Index(0), "<audio></audio>", "a"),
            PreparedRecord::new(RecordId::Index(1), "<audio></audio>", "b"),
        ];
        let written = sink
            .log_records(&handle, &records, &FieldMapping::default(), &schema)
            .await
            .unwrap();
        assert_eq!(written, 2);

        let contents = fs::read_to_string(sink.path_for("Darija")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let first: PreparedRecord = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(first, records[0]);

        sink.delete_dataset(&handle).await.unwrap();
        assert!(!sink.path_for("Darija").exists());
        sink.delete_dataset(&handle).await.unwrap();
    }
}
