pub mod config;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod upload;

pub use config::{AppConfig, PlatformCredentials, Settings, DEFAULT_CONFIG_FILE};
pub use error::{ConfigError, PipelineError};
pub use pipeline::RecordPreparationPipeline;
pub use sink::{AnnotationSink, ArgillaSink, JsonlSink};
pub use source::DatasetSource;
pub use upload::{target_dataset_name, ExistingDatasetPolicy, UploadReport, Uploader};
