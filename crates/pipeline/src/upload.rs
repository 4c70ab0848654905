use serde::Deserialize;
use tracing::{info, instrument, warn};

use vocalabel_domain::{AnnotationSchema, FieldMapping};
use vocalabel_services::{DatasetHandle, HubRequest};

use crate::sink::AnnotationSink;
use crate::source::DatasetSource;
use crate::{PipelineError, RecordPreparationPipeline};

/// What to do when the target annotation dataset already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingDatasetPolicy {
    /// Log into the existing dataset; records upsert by external id.
    #[default]
    Reuse,
    Recreate,
    Fail,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReport {
    pub dataset: String,
    pub target: String,
    pub records: usize,
}

/// `atlasia/Youtube-Commons` becomes `Youtube-Commons`.
pub fn target_dataset_name(hub_name: &str) -> &str {
    hub_name
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(hub_name)
}

pub struct Uploader<S, K> {
    source: S,
    sink: K,
    pipeline: RecordPreparationPipeline,
    schema: AnnotationSchema,
    mapping: FieldMapping,
    policy: ExistingDatasetPolicy,
}

impl<S, K> Uploader<S, K>
where
    S: DatasetSource,
    K: AnnotationSink,
{
    pub fn new(
        source: S,
        sink: K,
        pipeline: RecordPreparationPipeline,
        schema: AnnotationSchema,
        mapping: FieldMapping,
    ) -> Result<Self, PipelineError> {
        mapping.validate_against(&schema)?;
        Ok(Self {
            source,
            sink,
            pipeline,
            schema,
            mapping,
            policy: ExistingDatasetPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: ExistingDatasetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub async fn upload(&self, request: &HubRequest) -> Result<UploadReport, PipelineError> {
        self.upload_with(request, |_, _| {}).await
    }

    /// Fetch one hub dataset, prepare every example and log the records.
    /// Nothing is sent to the sink until all records are prepared.
    #[instrument(
        skip(self, request, on_progress),
        fields(dataset = %request.dataset, split = %request.split)
    )]
    pub async fn upload_with<F>(
        &self,
        request: &HubRequest,
        on_progress: F,
    ) -> Result<UploadReport, PipelineError>
    where
        F: FnMut(usize, usize),
    {
        let target = target_dataset_name(&request.dataset);
        let examples = self.source.load(request).await?;
        info!(examples = examples.len(), "loaded examples");
        // Row indices restart per dataset, so each stages into its own dir.
        let records = self
            .pipeline
            .scoped(target)
            .prepare_all_with(&examples, on_progress)?;

        let handle = self.ensure_dataset(target).await?;
        let logged = self
            .sink
            .log_records(&handle, &records, &self.mapping, &self.schema)
            .await?;
        info!(target, records = logged, "logged records");

        Ok(UploadReport {
            dataset: request.dataset.clone(),
            target: target.to_string(),
            records: logged,
        })
    }

    async fn ensure_dataset(&self, name: &str) -> Result<DatasetHandle, PipelineError> {
        match self.policy {
            ExistingDatasetPolicy::Reuse => {
                if let Some(existing) = self.sink.find_dataset(name).await? {
                    info!(name, "reusing existing dataset");
                    return Ok(existing);
                }
                Ok(self.sink.create_dataset(name, &self.schema).await?)
            }
            ExistingDatasetPolicy::Recreate => {
                if let Some(existing) = self.sink.find_dataset(name).await? {
                    if let Err(err) = self.sink.delete_dataset(&existing).await {
                        warn!(name, error = %err, "could not delete existing dataset");
                    }
                }
                Ok(self.sink.create_dataset(name, &self.schema).await?)
            }
            ExistingDatasetPolicy::Fail => {
                if self.sink.find_dataset(name).await?.is_some() {
                    return Err(PipelineError::DatasetExists(name.to_string()));
                }
                self.sink
                    .create_dataset(name, &self.schema)
                    .await
                    .map_err(|err| {
                        if err.is_conflict() {
                            PipelineError::DatasetExists(name.to_string())
                        } else {
                            err.into()
                        }
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_name_is_last_segment() {
        assert_eq!(
            target_dataset_name("atlasia/Youtube-Commons-Morocco-Darija-35h"),
            "Youtube-Commons-Morocco-Darija-35h"
        );
        assert_eq!(target_dataset_name("plain"), "plain");
        assert_eq!(target_dataset_name("org/"), "org/");
    }

    #[test]
    fn policy_parses_lowercase() {
        let policy: ExistingDatasetPolicy = serde_yaml::from_str("recreate").unwrap();
        assert_eq!(policy, ExistingDatasetPolicy::Recreate);
        assert_eq!(ExistingDatasetPolicy::default(), ExistingDatasetPolicy::Reuse);
    }
}
