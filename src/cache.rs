use std::collections::{HashMap, VecDeque};

use crate::error::Result;

/// Bounded query-vector cache with FIFO eviction.
///
/// Eviction follows insertion order, never access order: a hit does not
/// refresh an entry's position, so the oldest-inserted key is always the
/// one to go.
#[derive(Debug)]
pub struct QueryVectorCache {
    max_size: usize,
    vectors: HashMap<String, Vec<f32>>,
    insertion_order: VecDeque<String>,
}

impl QueryVectorCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            vectors: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, query: &str) -> bool {
        self.vectors.contains_key(query)
    }

    /// Return the cached vector for `query`, or run `compute`, store the
    /// result, and evict the oldest entry if the cache is over capacity.
    pub fn get_or_compute<F>(&mut self, query: &str, compute: F) -> Result<Vec<f32>>
    where
        F: FnOnce(&str) -> Result<Vec<f32>>,
    {
        if let Some(vector) = self.vectors.get(query) {
            tracing::debug!(query, "query cache hit");
            return Ok(vector.clone());
        }

        let vector = compute(query)?;
        self.insert(query.to_string(), vector.clone());
        Ok(vector)
    }

    fn insert(&mut self, query: String, vector: Vec<f32>) {
        self.vectors.insert(query.clone(), vector);
        self.insertion_order.push_back(query);

        if self.vectors.len() > self.max_size {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.vectors.remove(&oldest);
                tracing::debug!(query = %oldest, "query cache full, evicted oldest entry");
            }
        }
    }
}
