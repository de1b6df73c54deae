use tokenizers::Tokenizer;

use crate::config::ModelType;
use crate::embedding::model::EmbeddingModel;
use crate::embedding::{hub, QueryEmbedder};
use crate::error::{AnimeSearchError, Result};

pub struct Embedder {
    model: EmbeddingModel,
    tokenizer: Tokenizer,
    model_type: ModelType,
}

impl Embedder {
    /// Resolve model files (local HuggingFace cache, else hub download)
    /// and load the model plus its tokenizer.
    pub fn load(model_type: ModelType) -> Result<Self> {
        let files = hub::resolve_model_files(&model_type)?;
        let model = EmbeddingModel::load(&files.config, &files.weights)?;
        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| AnimeSearchError::ModelLoad(format!("Failed to load tokenizer: {e}")))?;

        Ok(Self {
            model,
            tokenizer,
            model_type,
        })
    }

    /// Embed catalog passages in batch (auto-adds "passage: " prefix for
    /// E5 models).
    pub fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.model_type.requires_prefix() {
            let prefixed: Vec<String> = texts.iter().map(|t| format!("passage: {t}")).collect();
            self.embed_batch(&prefixed)
        } else {
            self.embed_batch(texts)
        }
    }

    /// Embed a single text (raw, no prefix added)
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| AnimeSearchError::Embedding(format!("Tokenization failed: {e}")))?;

        let token_ids = encoding.get_ids().to_vec();
        let attention_mask = encoding.get_attention_mask().to_vec();
        let embeddings = self.model.embed_batch(&[token_ids], &[attention_mask])?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AnimeSearchError::Embedding("No embedding generated".to_string()))
    }

    /// Embed multiple texts in batch (raw, no prefix added)
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| AnimeSearchError::Embedding(format!("Batch tokenization failed: {e}")))?;

        let token_ids: Vec<Vec<u32>> = encodings.iter().map(|e| e.get_ids().to_vec()).collect();
        let attention_masks: Vec<Vec<u32>> = encodings
            .iter()
            .map(|e| e.get_attention_mask().to_vec())
            .collect();

        self.model.embed_batch(&token_ids, &attention_masks)
    }
}

impl QueryEmbedder for Embedder {
    /// Embed a search query (auto-adds "query: " prefix for E5 models)
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if self.model_type.requires_prefix() {
            self.embed(&format!("query: {text}"))
        } else {
            self.embed(text)
        }
    }
}
