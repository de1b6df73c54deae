use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One catalog row. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeEntry {
    pub title: String,
    pub synopsis: String,
    pub genres: Vec<String>,
    pub main_pic: String,
}

/// Row-aligned catalog and embedding matrix, produced offline by
/// `preprocess` and loaded read-only at startup. Row counts are expected
/// to match; a mismatched file is a corrupted artifact.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnimeCatalog {
    pub entries: Vec<AnimeEntry>,
    pub embeddings: Vec<Vec<f32>>,
}

impl AnimeCatalog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let catalog = bincode::deserialize_from(reader)?;
        Ok(catalog)
    }
}
