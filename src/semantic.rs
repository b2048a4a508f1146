use std::collections::{HashMap, HashSet};

use anyhow::{bail, Context, Result};
use regex::Regex;

pub const DEFAULT_VECTORIZER_ID: &str = "tfidf-en-384-v1";

// Scikit-learn's built-in English stop word list, kept verbatim so fitted
// vocabularies line up with exports produced by the earlier tooling.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
    "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together",
    "too", "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up",
    "upon", "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when",
    "whence", "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon",
    "wherever", "whether", "which", "while", "whither", "who", "whoever", "whole", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your",
    "yours", "yourself", "yourselves",
];

fn token_regex() -> Result<Regex> {
    Regex::new(r"\b\w\w+\b").context("failed to compile tf-idf token regex")
}

fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.binary_search(&term).is_ok()
}

/// Term-frequency / inverse-document-frequency vectorizer over chunk text.
/// Vocabulary is capped at `max_features` terms by corpus count (ties broken
/// alphabetically) and stored in alphabetical order, so two fits over the same
/// chunks produce identical vectors.
#[derive(Debug)]
pub struct TfIdfVectorizer {
    token: Regex,
    vocabulary: Vec<String>,
    idf: Vec<f32>,
}

impl TfIdfVectorizer {
    pub fn fit(documents: &[String], max_features: usize) -> Result<Self> {
        let token = token_regex()?;

        let mut corpus_counts = HashMap::<String, usize>::new();
        let mut document_frequency = HashMap::<String, usize>::new();

        for document in documents {
            let lowered = document.to_lowercase();
            let mut seen = HashSet::<&str>::new();

            for found in token.find_iter(&lowered) {
                let term = found.as_str();
                if is_stop_word(term) {
                    continue;
                }
                *corpus_counts.entry(term.to_string()).or_insert(0) += 1;
                seen.insert(found.as_str());
            }

            for term in seen {
                *document_frequency.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        let mut ranked = corpus_counts.into_iter().collect::<Vec<(String, usize)>>();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let mut vocabulary = ranked
            .into_iter()
            .map(|(term, _)| term)
            .collect::<Vec<String>>();
        vocabulary.sort();

        let document_count = documents.len() as f32;
        let idf = vocabulary
            .iter()
            .map(|term| {
                let frequency = document_frequency.get(term).copied().unwrap_or(0) as f32;
                ((1.0 + document_count) / (1.0 + frequency)).ln() + 1.0
            })
            .collect();

        Ok(Self {
            token,
            vocabulary,
            idf,
        })
    }

    pub fn from_parts(vocabulary: Vec<String>, idf: Vec<f32>) -> Result<Self> {
        if vocabulary.len() != idf.len() {
            bail!(
                "vectorizer vocabulary has {} terms but {} idf values",
                vocabulary.len(),
                idf.len()
            );
        }
        Ok(Self {
            token: token_regex()?,
            vocabulary,
            idf,
        })
    }

    pub fn transform(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.vocabulary.len()];
        let lowered = text.to_lowercase();

        for found in self.token.find_iter(&lowered) {
            let lookup = self
                .vocabulary
                .binary_search_by(|term| term.as_str().cmp(found.as_str()));
            if let Ok(index) = lookup {
                vector[index] += 1.0;
            }
        }

        for (value, idf) in vector.iter_mut().zip(&self.idf) {
            *value *= idf;
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

pub fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        bail!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        );
    }

    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documents(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|text| text.to_string()).collect()
    }

    #[test]
    fn stop_word_list_is_sorted_for_binary_search() {
        assert!(STOP_WORDS.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn fit_excludes_stop_words_and_single_char_tokens() {
        let corpus = documents(&["the cable for a keyboard", "the keyboard x"]);

        let vectorizer = TfIdfVectorizer::fit(&corpus, 384).expect("fit");

        assert_eq!(vectorizer.vocabulary(), ["cable", "keyboard"]);
    }

    #[test]
    fn fit_caps_vocabulary_by_corpus_count_with_alphabetical_ties() {
        let corpus = documents(&["alpha alpha alpha beta beta gamma", "alpha beta delta"]);

        let vectorizer = TfIdfVectorizer::fit(&corpus, 3).expect("fit");

        // alpha (4) and beta (3) outrank the tie between delta and gamma,
        // which resolves alphabetically.
        assert_eq!(vectorizer.vocabulary(), ["alpha", "beta", "delta"]);
    }

    #[test]
    fn fit_computes_smoothed_idf() {
        let corpus = documents(&["alpha beta", "alpha gamma"]);

        let vectorizer = TfIdfVectorizer::fit(&corpus, 384).expect("fit");

        assert_eq!(vectorizer.vocabulary(), ["alpha", "beta", "gamma"]);
        let idf = vectorizer.idf();
        assert!((idf[0] - 1.0).abs() < 1e-6);
        let rare = (3.0f32 / 2.0).ln() + 1.0;
        assert!((idf[1] - rare).abs() < 1e-6);
        assert!((idf[2] - rare).abs() < 1e-6);
    }

    #[test]
    fn transform_produces_unit_vectors() {
        let corpus = documents(&["usb cable charging", "magic keyboard folio"]);
        let vectorizer = TfIdfVectorizer::fit(&corpus, 384).expect("fit");

        let vector = vectorizer.transform("usb cable");
        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn transform_of_unknown_text_is_zero() {
        let corpus = documents(&["usb cable charging"]);
        let vectorizer = TfIdfVectorizer::fit(&corpus, 384).expect("fit");

        let vector = vectorizer.transform("zzz qqq");

        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn matching_text_scores_higher_than_unrelated_text() {
        let corpus = documents(&[
            "usb cable charging syncing devices",
            "magic keyboard folio protective case",
        ]);
        let vectorizer = TfIdfVectorizer::fit(&corpus, 384).expect("fit");

        let cable = vectorizer.transform(&corpus[0]);
        let keyboard = vectorizer.transform(&corpus[1]);
        let query = vectorizer.transform("charging cable");

        assert!(cosine_similarity(&query, &cable) > cosine_similarity(&query, &keyboard));
    }

    #[test]
    fn fit_is_deterministic() {
        let corpus = documents(&["usb cable charging", "magic keyboard folio", "usb adapter"]);

        let first = TfIdfVectorizer::fit(&corpus, 4).expect("fit");
        let second = TfIdfVectorizer::fit(&corpus, 4).expect("fit");

        assert_eq!(first.vocabulary(), second.vocabulary());
        assert_eq!(first.idf(), second.idf());
        assert_eq!(first.transform("usb cable"), second.transform("usb cable"));
    }

    #[test]
    fn from_parts_rejects_mismatched_lengths() {
        let result = TfIdfVectorizer::from_parts(vec!["alpha".to_string()], vec![1.0, 2.0]);

        assert!(result.is_err());
    }

    #[test]
    fn embedding_blob_round_trips() {
        let embedding = vec![0.25f32, -1.5, 0.0, 3.125];

        let blob = embedding_to_blob(&embedding);
        let decoded = blob_to_embedding(&blob).expect("decode");

        assert_eq!(decoded, embedding);
        assert!(blob_to_embedding(&blob[..5]).is_err());
    }
}
