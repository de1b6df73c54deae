use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};

use crate::error::{AnimeSearchError, Result};

pub struct EmbeddingModel {
    model: BertModel,
    device: Device,
}

impl EmbeddingModel {
    /// Select the best available device (GPU -> CPU fallback)
    fn select_device() -> Device {
        #[cfg(feature = "cuda")]
        {
            match Device::new_cuda(0) {
                Ok(device) => {
                    tracing::info!("Using CUDA GPU for embeddings");
                    return device;
                }
                Err(e) => {
                    tracing::warn!("CUDA GPU unavailable ({e}), falling back to CPU");
                }
            }
        }

        #[cfg(feature = "accelerate")]
        tracing::info!("Using CPU with Apple Accelerate framework");
        #[cfg(not(feature = "accelerate"))]
        tracing::info!("Using CPU for embeddings");

        Device::Cpu
    }

    /// Load a BERT-family sentence-transformer from its config and
    /// safetensors weights.
    pub fn load(config_path: &Path, weights_path: &Path) -> Result<Self> {
        let device = Self::select_device();

        let config_str = std::fs::read_to_string(config_path).map_err(|e| {
            AnimeSearchError::ModelLoad(format!(
                "Failed to read model config {}: {e}",
                config_path.display()
            ))
        })?;
        let config: Config = serde_json::from_str(&config_str)
            .map_err(|e| AnimeSearchError::ModelLoad(format!("Failed to parse model config: {e}")))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config).map_err(|e| {
            AnimeSearchError::ModelLoad(format!(
                "Failed to load model weights {}: {e}",
                weights_path.display()
            ))
        })?;

        Ok(Self { model, device })
    }

    /// Embed a tokenized batch: forward pass, attention-masked mean
    /// pooling, then L2 normalization. Sequences are padded to the longest
    /// one in the batch; the mask keeps padding out of the pooled mean.
    pub fn embed_batch(
        &self,
        token_ids: &[Vec<u32>],
        attention_masks: &[Vec<u32>],
    ) -> Result<Vec<Vec<f32>>> {
        let batch_size = token_ids.len();
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let max_len = token_ids.iter().map(Vec::len).max().unwrap_or(0);

        let mut padded_ids = Vec::with_capacity(batch_size * max_len);
        let mut padded_mask = Vec::with_capacity(batch_size * max_len);
        for (ids, mask) in token_ids.iter().zip(attention_masks) {
            for i in 0..max_len {
                padded_ids.push(ids.get(i).copied().unwrap_or(0));
                padded_mask.push(mask.get(i).copied().unwrap_or(0));
            }
        }

        let ids = Tensor::from_vec(padded_ids, (batch_size, max_len), &self.device)?;
        let token_type_ids = ids.zeros_like()?;
        let attention_mask = Tensor::from_vec(padded_mask, (batch_size, max_len), &self.device)?;

        let hidden = self
            .model
            .forward(&ids, &token_type_ids, Some(&attention_mask))?;

        // Mean pooling over real tokens via matmul:
        // (batch, 1, seq) x (batch, seq, hidden) -> (batch, hidden),
        // divided by the per-sequence token count.
        let mask = attention_mask.to_dtype(DType::F32)?;
        let summed = mask.unsqueeze(1)?.matmul(&hidden)?.squeeze(1)?;
        let counts = mask.sum(1)?.clamp(1.0f64, f64::MAX)?.unsqueeze(1)?;
        let pooled = summed.broadcast_div(&counts)?;

        // L2 normalize
        let norms = pooled
            .sqr()?
            .sum(1)?
            .sqrt()?
            .clamp(1e-12f64, f64::MAX)?
            .unsqueeze(1)?;
        let normalized = pooled.broadcast_div(&norms)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}
