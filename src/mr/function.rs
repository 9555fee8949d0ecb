//! Hard-coded map/reduce application functions. A future version could load
//! these from a dynamically-linked shared library instead; for now word
//! count is the only application wired into the worker.

/// Word count application.
pub mod wc {
    /// Emits `(word, "1")` for every whitespace-separated token.
    pub fn map(input: &str) -> Vec<(String, String)> {
        input
            .split_whitespace()
            .map(|word| (word.to_string(), "1".to_string()))
            .collect()
    }

    /// Sums the `"1"` markers emitted by `map` for a single key.
    pub fn reduce(_key: &str, values: Vec<String>) -> String {
        values.len().to_string()
    }
}

// TODO: Add more applications here (e.g. inverted index, top-k) once the
// worker supports selecting one at startup instead of hard-coding word count.

#[cfg(test)]
mod tests {
    use super::wc;

    #[test]
    fn map_counts_each_token_once() {
        let pairs = wc::map("a b a");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "1".to_string()),
                ("a".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn reduce_sums_occurrences() {
        let ones: Vec<String> = vec!["1".into(), "1".into(), "1".into()];
        assert_eq!(wc::reduce("a", ones), "3");
    }

    #[test]
    fn map_of_empty_input_is_empty() {
        assert!(wc::map("").is_empty());
        assert!(wc::map("   ").is_empty());
    }
}
