use std::path::PathBuf;

use hf_hub::api::tokio::{Api, ApiBuilder, ApiRepo};
use tracing::{debug, info};

use crate::config::ModelType;
use crate::error::{AnimeSearchError, Result};

/// Default HuggingFace Hub endpoint
const DEFAULT_HF_ENDPOINT: &str = "https://huggingface.co";

/// Paths to the required model files
pub struct ModelFiles {
    /// Path to config.json
    pub config: PathBuf,
    /// Path to model.safetensors
    pub weights: PathBuf,
    /// Path to tokenizer.json
    pub tokenizer: PathBuf,
}

/// Resolve the model files through the HuggingFace cache, downloading any
/// that are missing.
///
/// Supported environment variables:
/// - `HF_ENDPOINT`: custom Hub endpoint URL (e.g. an Artifactory mirror)
/// - `HF_HOME`: custom cache directory (default: `~/.cache/huggingface/`)
/// - `HF_TOKEN`: authentication token for private mirrors
pub fn resolve_model_files(model_type: &ModelType) -> Result<ModelFiles> {
    if is_cached(model_type) {
        debug!(model = %model_type.display_name(), "model found in HuggingFace cache");
    } else {
        info!(
            model = %model_type.display_name(),
            "model not cached, downloading from HuggingFace Hub"
        );
    }

    let endpoint =
        std::env::var("HF_ENDPOINT").unwrap_or_else(|_| DEFAULT_HF_ENDPOINT.to_string());
    let api: Api = ApiBuilder::from_env()
        .with_endpoint(endpoint)
        .with_progress(true)
        .build()
        .map_err(|e| {
            AnimeSearchError::ModelDownload(format!(
                "Failed to initialize HuggingFace Hub API: {e}"
            ))
        })?;
    let repo = api.model(model_type.hf_repo_id().to_string());

    Ok(ModelFiles {
        config: fetch(&repo, "config.json", model_type)?,
        weights: fetch(&repo, "model.safetensors", model_type)?,
        tokenizer: fetch(&repo, "tokenizer.json", model_type)?,
    })
}

/// Check if all required model files are already cached
pub fn is_cached(model_type: &ModelType) -> bool {
    let cache = hf_hub::Cache::default();
    let cache_repo = cache.model(model_type.hf_repo_id().to_string());
    ["config.json", "model.safetensors", "tokenizer.json"]
        .iter()
        .all(|f| cache_repo.get(f).is_some())
}

fn fetch(repo: &ApiRepo, filename: &str, model_type: &ModelType) -> Result<PathBuf> {
    debug!(file = %filename, "fetching model file");

    // hf-hub's API is async; bridge from whichever context called us.
    let fetched = if let Ok(handle) = tokio::runtime::Handle::try_current() {
        tokio::task::block_in_place(|| handle.block_on(repo.get(filename)))
    } else {
        let runtime = tokio::runtime::Runtime::new().map_err(|e| {
            AnimeSearchError::ModelDownload(format!(
                "Failed to create runtime for model download: {e}"
            ))
        })?;
        runtime.block_on(repo.get(filename))
    };

    fetched.map_err(|e| {
        AnimeSearchError::ModelDownload(format!(
            "Failed to download '{filename}' for {}: {e}\n\
             Ensure you have internet access or the model is already cached.",
            model_type.display_name()
        ))
    })
}
