use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vocalabel_domain::{AnnotationSchema, FieldMapping};
use vocalabel_pipeline::{
    AnnotationSink, AppConfig, ArgillaSink, JsonlSink, RecordPreparationPipeline, Uploader,
    DEFAULT_CONFIG_FILE,
};
use vocalabel_services::{ArgillaClient, HubClient};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Push hub audio datasets into the annotation platform for transcription review"
)]
struct Args {
    /// YAML settings file (defaults to ./vocalabel.yaml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Prepare records and write them as JSON lines next to the staged audio
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config_path = args.config.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.is_file().then_some(default)
    });
    let config = AppConfig::from_process_env(config_path.as_deref(), !args.dry_run)
        .context("failed to load configuration")?;
    let schema = config.schema().context("invalid annotation schema")?;

    let hub = HubClient::new(config.hub_endpoint.clone()).with_token(config.hub_token.clone());
    let pipeline = RecordPreparationPipeline::from_settings(&config.settings);

    if args.dry_run {
        let sink = JsonlSink::new(&config.settings.audio_dir);
        return run(&config, hub, sink, pipeline, schema).await;
    }

    let platform = config
        .platform
        .as_ref()
        .context("annotation platform credentials are not configured")?;
    let client = ArgillaClient::new(platform.api_url.clone(), platform.api_key.clone())
        .with_bearer_token(config.hub_token.clone());
    let sink = ArgillaSink::connect(client, config.settings.workspace.as_deref())
        .await
        .context("failed to connect to the annotation platform")?;
    run(&config, hub, sink, pipeline, schema).await
}

async fn run<K: AnnotationSink>(
    config: &AppConfig,
    hub: HubClient,
    sink: K,
    pipeline: RecordPreparationPipeline,
    schema: AnnotationSchema,
) -> Result<()> {
    let uploader = Uploader::new(hub, sink, pipeline, schema, FieldMapping::default())?
        .with_policy(config.settings.existing_dataset);

    let style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed_precise})")?
        .progress_chars("#>-");

    let mut total = 0;
    for dataset in &config.settings.dataset_list {
        println!("Processing dataset: {dataset}");
        let request = config.hub_request(dataset);

        let progress = ProgressBar::new(0);
        progress.set_style(style.clone());
        progress.set_message("preparing");
        let report = uploader
            .upload_with(&request, |done, len| {
                progress.set_length(len as u64);
                progress.set_position(done as u64);
            })
            .await
            .with_context(|| format!("failed to upload {dataset}"))?;
        progress.finish_and_clear();

        println!(
            "Uploaded {} records from {} to dataset {}",
            report.records, report.dataset, report.target
        );
        total += report.records;
    }

    info!(datasets = config.settings.dataset_list.len(), records = total, "upload complete");
    Ok(())
}
