use std::sync::Arc;

use folio_api::ApiServer;
use folio_config::ServiceConfig;
use folio_document::{
    HttpTranslator, LopdfToolkit, PopplerRasterizer, SofficeConverter, TesseractOcr,
    UnconfiguredTranslator,
};
use folio_jobs::{JobRunner, Toolbox, Translator};
use folio_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use folio_workarea::WorkAreaAllocator;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

const BUILD_SHA: &str = match option_env!("FOLIO_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Dependencies required to bootstrap the service.
pub(crate) struct BootstrapDependencies {
    config: ServiceConfig,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            ServiceConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self { config, telemetry })
    }
}

/// Entry point for the service boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, storage preparation, or serving fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies { config, telemetry } = dependencies;
    let logging = LoggingConfig {
        level: &config.log.level,
        format: LogFormat::from_setting(config.log.format.as_deref()),
        build_sha: BUILD_SHA,
    };
    folio_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("bootstrap");

    info!(
        temp_root = %config.temp_root.display(),
        conversion_timeout_secs = config.conversion_timeout.as_secs(),
        "Folio bootstrap starting"
    );

    let allocator = prepare_storage(&config)?;
    let tools = build_toolbox(&config)?;
    let runner = JobRunner::new(allocator, tools, telemetry.clone());
    let api = ApiServer::new(runner, telemetry, &config)
        .map_err(|err| AppError::api_server("api_server.new", err))?;

    info!(addr = %config.bind_addr, "Launching API listener");
    api.serve(config.bind_addr)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

/// Create the temp root and drop work areas left behind by a previous run.
fn prepare_storage(config: &ServiceConfig) -> AppResult<WorkAreaAllocator> {
    let allocator = WorkAreaAllocator::new(&config.temp_root)
        .map_err(|err| AppError::storage("allocator.new", err))?;
    let removed = allocator.sweep_stale(config.stale_area_age);
    if removed > 0 {
        info!(
            removed,
            max_age_secs = config.stale_area_age.as_secs(),
            "stale work areas removed"
        );
    }
    Ok(allocator)
}

fn build_toolbox(config: &ServiceConfig) -> AppResult<Toolbox> {
    Ok(Toolbox::new(
        Arc::new(LopdfToolkit::new()),
        Arc::new(SofficeConverter::new(&config.tools.soffice)),
        Arc::new(PopplerRasterizer::new(&config.tools.pdftoppm)),
        Arc::new(TesseractOcr::new(&config.tools.tesseract)),
        build_translator(config)?,
        config.conversion_timeout,
    ))
}

fn build_translator(config: &ServiceConfig) -> AppResult<Arc<dyn Translator>> {
    match &config.translate_url {
        Some(url) => {
            let translator = HttpTranslator::new(url, config.conversion_timeout)
                .map_err(|err| AppError::collaborator("translator.new", err))?;
            info!(url = %url, "translation endpoint configured");
            Ok(Arc::new(translator))
        }
        None => {
            warn!("no translation endpoint configured; translation requests will be annotated as failed");
            Ok(Arc::new(UnconfiguredTranslator))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config_for(root: &std::path::Path, translate_url: Option<&str>) -> anyhow::Result<ServiceConfig> {
        let temp_root = root.to_string_lossy().into_owned();
        let translate_url = translate_url.map(str::to_string);
        Ok(ServiceConfig::from_lookup(|name| match name {
            "TEMP_FILES_DIR" => Some(temp_root.clone()),
            "FOLIO_TRANSLATE_URL" => translate_url.clone(),
            _ => None,
        })?)
    }

    #[test]
    fn prepare_storage_sweeps_leftover_areas() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let leftover = temp.path().join("6f1c1f7e-6a52-4d1e-9a55-0d6a2b8f4c11");
        std::fs::create_dir_all(&leftover)?;
        std::fs::write(leftover.join("input.pdf"), b"%PDF")?;
        std::fs::create_dir_all(temp.path().join("keep-me"))?;

        let mut config = config_for(temp.path(), None)?;
        config.stale_area_age = Duration::ZERO;
        let allocator = prepare_storage(&config)?;

        assert!(!leftover.exists());
        assert!(temp.path().join("keep-me").exists());
        assert_eq!(allocator.active_areas(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_translation_endpoint_uses_the_unconfigured_translator() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let translator = build_translator(&config_for(temp.path(), None)?)?;
        assert!(translator.translate("hello", "es", "eng").await.is_err());

        let configured = build_translator(&config_for(temp.path(), Some("http://127.0.0.1:9"))?);
        assert!(configured.is_ok());
        Ok(())
    }

    #[test]
    fn toolbox_carries_the_conversion_timeout() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = config_for(temp.path(), None)?;
        let tools = build_toolbox(&config)?;
        assert_eq!(tools.timeout(), config.conversion_timeout);
        Ok(())
    }
}
