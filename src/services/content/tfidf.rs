use std::collections::{BTreeMap, BTreeSet, HashMap};

use ndarray::Array2;

use super::stopwords::is_stop_word;

/// Splits text into lowercase alphanumeric tokens of at least two characters
pub fn tokenize(text: &str, drop_stop_words: bool) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|token| !(drop_stop_words && is_stop_word(token)))
        .collect()
}

/// Term-frequency / inverse-document-frequency vectorizer
///
/// ```text
/// tfidf(t, d) = tf(t, d) × idf(t)
/// tf(t, d)    = count of t in d
/// idf(t)      = ln((1 + n) / (1 + df(t))) + 1
/// ```
///
/// Columns follow the lexicographic order of the vocabulary.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    drop_stop_words: bool,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(drop_stop_words: bool) -> Self {
        Self {
            drop_stop_words,
            ..Self::default()
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn column(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.column(term).map(|col| self.idf[col])
    }

    /// Learns vocabulary and IDF weights, then returns the raw TF-IDF matrix
    /// (`n_documents × vocabulary_size`, rows not normalized).
    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Array2<f64> {
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| tokenize(doc.as_ref(), self.drop_stop_words))
            .collect();

        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let unique: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let n_docs = documents.len() as f64;
        self.vocabulary = doc_freq
            .keys()
            .enumerate()
            .map(|(col, term)| (term.to_string(), col))
            .collect();
        self.idf = doc_freq
            .values()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let mut matrix = Array2::<f64>::zeros((tokenized.len(), self.vocabulary.len()));
        for (row, tokens) in tokenized.iter().enumerate() {
            for token in tokens {
                if let Some(&col) = self.vocabulary.get(token) {
                    matrix[[row, col]] += 1.0;
                }
            }
            for (col, idf) in self.idf.iter().enumerate() {
                matrix[[row, col]] *= idf;
            }
        }

        matrix
    }
}
