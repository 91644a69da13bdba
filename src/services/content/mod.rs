//! Item-to-item similarity from descriptive text.
//!
//! Every item's text features are turned into a TF-IDF vector over the whole
//! catalog vocabulary. Rows are L2-normalized and multiplied by their transpose
//! in one dense pass, which yields the full cosine similarity matrix.

use std::collections::HashMap;

use ndarray::{Array2, Axis};

use crate::{
    error::{EngineError, EngineResult},
    models::{Item, ItemId},
};

pub mod stopwords;
pub mod tfidf;

pub use tfidf::TfidfVectorizer;

/// Knobs for building the content index
#[derive(Debug, Clone, Copy)]
pub struct ContentOptions {
    /// Drop English stop words before weighting
    pub stop_words: bool,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self { stop_words: true }
    }
}

/// Immutable TF-IDF vectors and pairwise cosine similarities for one catalog version
#[derive(Debug)]
pub struct ContentSimilarityIndex {
    item_ids: Vec<ItemId>,
    positions: HashMap<ItemId, usize>,
    vectorizer: TfidfVectorizer,
    tfidf: Array2<f64>,
    similarity: Array2<f64>,
}

impl ContentSimilarityIndex {
    /// Builds the index; duplicate item ids abort construction.
    pub fn build(catalog: &[Item], options: ContentOptions) -> EngineResult<Self> {
        let mut positions = HashMap::with_capacity(catalog.len());
        for (position, item) in catalog.iter().enumerate() {
            if positions.insert(item.id, position).is_some() {
                return Err(EngineError::DataIntegrity(format!(
                    "item {} appears more than once in the catalog",
                    item.id
                )));
            }
        }

        let documents: Vec<&str> = catalog.iter().map(|item| item.text_features.as_str()).collect();
        let mut vectorizer = TfidfVectorizer::new(options.stop_words);
        let tfidf = vectorizer.fit_transform(&documents);
        let similarity = cosine_similarity(&tfidf);

        tracing::info!(
            items = catalog.len(),
            vocabulary = vectorizer.vocabulary_size(),
            "Built content similarity index"
        );

        Ok(Self {
            item_ids: catalog.iter().map(|item| item.id).collect(),
            positions,
            vectorizer,
            tfidf,
            similarity,
        })
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.positions.contains_key(&item_id)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.vocabulary_size()
    }

    /// Raw (unnormalized) TF-IDF weights of one item
    pub fn vector(&self, item_id: ItemId) -> EngineResult<Vec<f64>> {
        let position = self.position(item_id)?;
        Ok(self.tfidf.row(position).to_vec())
    }

    pub fn similarity(&self, a: ItemId, b: ItemId) -> EngineResult<f64> {
        Ok(self.similarity[[self.position(a)?, self.position(b)?]])
    }

    /// The `k` items most similar to `item_id`, most similar first.
    ///
    /// The item itself is never returned, even when another item has identical text.
    /// Equal similarities keep catalog order.
    pub fn similar_items(&self, item_id: ItemId, k: usize) -> EngineResult<Vec<ItemId>> {
        let position = self.position(item_id)?;

        let mut scored: Vec<(usize, f64)> = self
            .similarity
            .row(position)
            .iter()
            .copied()
            .enumerate()
            .filter(|&(other, _)| other != position)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(other, _)| self.item_ids[other])
            .collect())
    }

    fn position(&self, item_id: ItemId) -> EngineResult<usize> {
        self.positions
            .get(&item_id)
            .copied()
            .ok_or(EngineError::NotFound(item_id))
    }
}

/// Cosine similarity between every pair of rows.
///
/// Zero rows stay zero after normalization; the diagonal is pinned to 1 and the
/// lower triangle mirrors the upper one so the result is exactly symmetric.
fn cosine_similarity(matrix: &Array2<f64>) -> Array2<f64> {
    let mut normalized = matrix.clone();
    for mut row in normalized.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }

    let mut similarity = normalized.dot(&normalized.t());
    let n = similarity.nrows();
    for i in 0..n {
        similarity[[i, i]] = 1.0;
        for j in (i + 1)..n {
            let value = similarity[[i, j]].clamp(0.0, 1.0);
            similarity[[i, j]] = value;
            similarity[[j, i]] = value;
        }
    }
    similarity
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn catalog() -> Vec<Item> {
        vec![
            Item::new(1, "Alien", "horror space alien crew ship"),
            Item::new(2, "Aliens", "action space alien marines ship"),
            Item::new(3, "Heat", "crime heist los angeles detective"),
            Item::new(4, "Ronin", "crime heist paris chase"),
            Item::new(5, "Untitled", ""),
        ]
    }

    fn index() -> ContentSimilarityIndex {
        ContentSimilarityIndex::build(&catalog(), ContentOptions::default()).unwrap()
    }

    #[test]
    fn test_self_similarity_is_one() {
        let index = index();
        for item in catalog() {
            assert_eq!(index.similarity(item.id, item.id).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_similar_items_ranks_shared_terms_first() {
        let index = index();
        assert_eq!(index.similar_items(1, 1).unwrap(), vec![2]);
        assert_eq!(index.similar_items(3, 1).unwrap(), vec![4]);
    }

    #[test]
    fn test_similar_items_excludes_self_and_limits_count() {
        let index = index();
        let similar = index.similar_items(1, 10).unwrap();
        assert_eq!(similar.len(), 4);
        assert!(!similar.contains(&1));
        assert_eq!(index.similar_items(1, 2).unwrap().len(), 2);
        assert!(index.similar_items(1, 0).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_item_is_not_found() {
        let index = index();
        assert_eq!(index.similar_items(99, 3), Err(EngineError::NotFound(99)));
        assert_eq!(index.similarity(1, 99), Err(EngineError::NotFound(99)));
    }

    #[test]
    fn test_empty_text_is_dissimilar_to_everything_else() {
        let index = index();
        assert!(index.vector(5).unwrap().iter().all(|&w| w == 0.0));
        for other in 1..=4 {
            assert_eq!(index.similarity(5, other).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let items = vec![
            Item::new(10, "Seed", "western"),
            Item::new(30, "C", "drama"),
            Item::new(20, "B", "comedy"),
            Item::new(40, "D", "musical"),
        ];
        let index = ContentSimilarityIndex::build(&items, ContentOptions::default()).unwrap();
        assert_eq!(index.similar_items(10, 3).unwrap(), vec![30, 20, 40]);
    }

    #[test]
    fn test_identical_text_has_similarity_one() {
        let items = vec![
            Item::new(1, "A", "space pirates treasure"),
            Item::new(2, "B", "space pirates treasure"),
            Item::new(3, "C", "courtroom drama"),
        ];
        let index = ContentSimilarityIndex::build(&items, ContentOptions::default()).unwrap();
        assert!((index.similarity(1, 2).unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(index.similar_items(1, 1).unwrap(), vec![2]);
        assert_eq!(index.similar_items(2, 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_duplicate_ids_abort_build() {
        let items = vec![Item::new(1, "A", "x y"), Item::new(1, "B", "z w")];
        let result = ContentSimilarityIndex::build(&items, ContentOptions::default());
        assert!(matches!(result, Err(EngineError::DataIntegrity(_))));
    }

    #[test]
    fn test_stop_words_do_not_create_similarity() {
        let items = vec![
            Item::new(1, "A", "the and of dragons"),
            Item::new(2, "B", "the and of lawyers"),
        ];
        let with = ContentSimilarityIndex::build(&items, ContentOptions { stop_words: true }).unwrap();
        let without =
            ContentSimilarityIndex::build(&items, ContentOptions { stop_words: false }).unwrap();
        assert_eq!(with.similarity(1, 2).unwrap(), 0.0);
        assert!(without.similarity(1, 2).unwrap() > 0.0);
    }

    #[test]
    fn test_empty_catalog_builds() {
        let index = ContentSimilarityIndex::build(&[], ContentOptions::default()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.similar_items(1, 5), Err(EngineError::NotFound(1)));
    }

    proptest! {
        #[test]
        fn prop_similarity_is_symmetric_with_unit_diagonal(
            texts in prop::collection::vec("[a-e]{2,3}( [a-e]{2,3}){0,4}", 1..8)
        ) {
            let items: Vec<Item> = texts
                .iter()
                .enumerate()
                .map(|(i, text)| Item::new(i as ItemId, format!("t{i}"), text.clone()))
                .collect();
            let index = ContentSimilarityIndex::build(&items, ContentOptions { stop_words: false }).unwrap();

            for a in &items {
                prop_assert_eq!(index.similarity(a.id, a.id).unwrap(), 1.0);
                for b in &items {
                    let ab = index.similarity(a.id, b.id).unwrap();
                    prop_assert_eq!(ab, index.similarity(b.id, a.id).unwrap());
                    prop_assert!((0.0..=1.0).contains(&ab));
                }
            }
        }

        #[test]
        fn prop_similar_items_sizes(n_items in 1usize..8, k in 0usize..10) {
            let items: Vec<Item> = (0..n_items)
                .map(|i| Item::new(i as ItemId, format!("t{i}"), format!("genre{} shared", i % 3)))
                .collect();
            let index = ContentSimilarityIndex::build(&items, ContentOptions::default()).unwrap();

            let similar = index.similar_items(0, k).unwrap();
            prop_assert_eq!(similar.len(), k.min(n_items - 1));
            prop_assert!(!similar.contains(&0));
        }
    }
}
