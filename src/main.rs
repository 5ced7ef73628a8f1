use std::{process, sync::Arc};

use platter::{
    application::{
        error::{AppError, RenderError},
        render::{BatchRenderer, Collection, RenderOptions, RenderResult},
    },
    cache::{CacheClient, CacheConfig, MemoryCache},
    config::{self, RenderArgs},
    domain::documents::{Document, DocumentSerializer, parse_documents},
    infra::{error::InfraError, telemetry},
};
use serde_json::Value;
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const MAX_PASSES: usize = 16;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Render(args) => run_render(settings, *args).await,
    }
}

async fn run_render(settings: config::Settings, args: RenderArgs) -> Result<(), AppError> {
    let input = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|err| InfraError::read(&args.file, err))?;
    let documents = parse_documents(&input)?;
    let options = parse_render_options(&args.options)?;

    let mut serializer = DocumentSerializer::new().with_caching(!args.no_cache);
    if let Some(fields) = args.fields.clone() {
        serializer = serializer.with_fields(fields);
    }

    let cache_config = CacheConfig::from(&settings.cache);
    let store = Arc::new(MemoryCache::new(&cache_config));
    let collection = Collection::from_members(&documents);
    let passes = clamp_passes(args.passes);

    info!(
        target = "platter::render",
        file = %args.file.display(),
        documents = documents.len(),
        versioned = collection.is_versioned(),
        passes,
        "Starting render"
    );

    let output = render_passes(
        store.clone(),
        cache_config,
        &collection,
        &serializer,
        &options,
        passes,
    )
    .await?;
    info!(
        target = "platter::render",
        rendered = output.len(),
        cached_entries = store.len(),
        "Render complete"
    );

    let json = serde_json::to_string_pretty(&output)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{json}");

    Ok(())
}

fn clamp_passes(requested: usize) -> usize {
    requested.clamp(1, MAX_PASSES)
}

/// Render the collection `passes` times through one cache and keep the last output.
///
/// A failed write-back still yields the values it carries.
async fn render_passes(
    client: Arc<dyn CacheClient>,
    cache_config: CacheConfig,
    collection: &Collection<'_, Document>,
    serializer: &DocumentSerializer,
    options: &RenderOptions,
    passes: usize,
) -> Result<RenderResult, AppError> {
    let renderer = BatchRenderer::new(client, cache_config);
    let mut output = Vec::new();
    for pass in 1..=passes {
        output = match renderer.render(collection, serializer, options).await {
            Ok(values) => values,
            Err(error @ RenderError::WriteBack { .. }) => {
                warn!(error = %error, pass, "Continuing with rendered output");
                error.into_values()?
            }
            Err(error) => return Err(error.into()),
        };
        debug!(
            target = "platter::render",
            pass,
            rendered = output.len(),
            "Render pass complete"
        );
    }
    Ok(output)
}

fn parse_render_options(raw: &[String]) -> Result<RenderOptions, AppError> {
    raw.iter()
        .map(|assignment| {
            let (name, value) = assignment.split_once('=').ok_or_else(|| {
                AppError::validation(format!("render option `{assignment}` must be NAME=VALUE"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::validation(format!(
                    "render option `{assignment}` has an empty name"
                )));
            }
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
            Ok((name.to_string(), value))
        })
        .collect()
}
