use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::catalog::{AnimeCatalog, AnimeEntry};
use crate::embedding::Embedder;
use crate::error::{AnimeSearchError, Result};

/// One record of the source dataset. `combined_text` is the only field
/// that gets embedded; rows without it are dropped.
#[derive(Debug, Deserialize)]
struct DatasetRecord {
    title: String,
    synopsis: String,
    genres: Vec<String>,
    main_pic: String,
    #[serde(default)]
    combined_text: Option<String>,
}

#[derive(Debug)]
pub struct PreprocessSummary {
    pub total_rows: usize,
    pub dropped_rows: usize,
    pub embedded_rows: usize,
    pub dimension: usize,
}

/// Parse the dataset and split it into catalog entries plus the texts to
/// embed, dropping rows with missing combined text.
fn load_dataset(path: &Path) -> Result<(Vec<AnimeEntry>, Vec<String>, usize)> {
    info!(path = %path.display(), "loading dataset");
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let records: Vec<DatasetRecord> = serde_json::from_reader(reader).map_err(|e| {
        AnimeSearchError::Dataset(format!(
            "Failed to parse dataset: {e} \
             (required fields: title, synopsis, genres, main_pic, combined_text)"
        ))
    })?;
    let total = records.len();
    info!(rows = total, "dataset loaded");

    let mut entries = Vec::with_capacity(total);
    let mut texts = Vec::with_capacity(total);
    for record in records {
        let text = match record.combined_text {
            Some(text) if !text.trim().is_empty() => text,
            _ => continue,
        };
        entries.push(AnimeEntry {
            title: record.title,
            synopsis: record.synopsis,
            genres: record.genres,
            main_pic: record.main_pic,
        });
        texts.push(text);
    }

    let dropped = total - entries.len();
    if dropped > 0 {
        warn!(dropped, "dropped rows with missing 'combined_text'");
    }
    if entries.is_empty() {
        return Err(AnimeSearchError::Dataset(
            "No rows with 'combined_text' left to embed".to_string(),
        ));
    }

    Ok((entries, texts, dropped))
}

/// Offline batch job: read the dataset, embed every row's combined text,
/// persist the row-aligned (catalog, matrix) pair, and verify it reloads.
pub fn run(
    input: &Path,
    output: &Path,
    embedder: &Embedder,
    batch_size: usize,
) -> Result<PreprocessSummary> {
    let (entries, texts, dropped_rows) = load_dataset(input)?;
    let total_rows = entries.len() + dropped_rows;

    info!(rows = entries.len(), batch_size, "generating embeddings");
    let mut embeddings = Vec::with_capacity(texts.len());
    for (batch_index, batch) in texts.chunks(batch_size.max(1)).enumerate() {
        embeddings.extend(embedder.embed_passages(batch)?);
        info!(
            embedded = embeddings.len(),
            total = texts.len(),
            batch = batch_index + 1,
            "embedding progress"
        );
    }
    let dimension = embeddings.first().map_or(0, Vec::len);

    let catalog = AnimeCatalog {
        entries,
        embeddings,
    };
    info!(path = %output.display(), "saving embeddings file");
    catalog.save(output)?;

    // Verify the artifact actually loads before calling the run done.
    let reloaded = AnimeCatalog::load(output)?;
    info!(
        entries = reloaded.len(),
        dimension,
        "verified saved embeddings file"
    );

    Ok(PreprocessSummary {
        total_rows,
        dropped_rows,
        embedded_rows: reloaded.len(),
        dimension,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_dataset(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn rows_without_combined_text_are_dropped() {
        let (_dir, path) = write_dataset(
            r#"[
                {"title": "Kino no Tabi", "synopsis": "A traveler.", "genres": ["Adventure"],
                 "main_pic": "https://cdn.example/kino.webp", "combined_text": "a traveler visits countries"},
                {"title": "Broken Row", "synopsis": "n/a", "genres": [],
                 "main_pic": "https://cdn.example/none.webp", "combined_text": "   "},
                {"title": "Missing Row", "synopsis": "n/a", "genres": [],
                 "main_pic": "https://cdn.example/none.webp"}
            ]"#,
        );

        let (entries, texts, dropped) = load_dataset(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Kino no Tabi");
        assert_eq!(texts, vec!["a traveler visits countries"]);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn missing_required_field_fails_the_load() {
        let (_dir, path) = write_dataset(
            r#"[{"synopsis": "no title", "genres": [], "main_pic": "x", "combined_text": "y"}]"#,
        );

        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, AnimeSearchError::Dataset(_)));
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn all_rows_dropped_is_an_error() {
        let (_dir, path) = write_dataset(
            r#"[{"title": "Empty", "synopsis": "n/a", "genres": [], "main_pic": "x"}]"#,
        );

        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, AnimeSearchError::Dataset(_)));
    }

    #[test]
    fn missing_dataset_file_is_an_io_error() {
        let err = load_dataset(Path::new("no-such-dataset.json")).unwrap_err();
        assert!(matches!(err, AnimeSearchError::Io(_)));
    }
}
