pub mod embed;
pub mod hub;
pub mod model;

pub use embed::Embedder;
pub use hub::{resolve_model_files, ModelFiles};

use crate::error::Result;

/// Seam between the ranking pipeline and model inference. Tests substitute
/// fixture vectors through this trait.
pub trait QueryEmbedder: Send + Sync {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
