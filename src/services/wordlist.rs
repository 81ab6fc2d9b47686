use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::config::Settings;
use crate::utils::unique_everseen;

/// Builds candidate hostnames from a configured base word list plus an
/// optional bounded sample of a larger external wordlist. Output is
/// deterministic for a given configuration.
pub struct WordlistGenerator {
    base_words: Vec<String>,
    extra_wordlist: Option<PathBuf>,
    sample_limit: usize,
}

impl WordlistGenerator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            base_words: settings
                .bruteforce_words
                .iter()
                .map(|word| word.trim().to_lowercase())
                .filter(|word| !word.is_empty())
                .collect(),
            extra_wordlist: settings.extra_wordlist.as_ref().map(PathBuf::from),
            sample_limit: settings.wordlist_sample_limit,
        }
    }

    pub fn generate(&self, domain: &str, include_bruteforce: bool) -> Vec<String> {
        let mut words = self.base_words.clone();
        if include_bruteforce {
            words.extend(self.extra_words());
        }
        unique_everseen(words)
            .into_iter()
            .map(|word| format!("{word}.{domain}"))
            .collect()
    }

    fn extra_words(&self) -> Vec<String> {
        let Some(ref path) = self.extra_wordlist else {
            return Vec::new();
        };
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "wordlist unreadable");
                return Vec::new();
            }
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .map(|line| line.trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .take(self.sample_limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn generator(extra: Option<PathBuf>, limit: usize) -> WordlistGenerator {
        WordlistGenerator {
            base_words: vec!["www".to_string(), "api".to_string()],
            extra_wordlist: extra,
            sample_limit: limit,
        }
    }

    #[test]
    fn base_only_without_bruteforce() {
        let generated = generator(None, 500).generate("example.com", false);
        assert_eq!(generated, vec!["www.example.com", "api.example.com"]);
    }

    #[test]
    fn generation_is_deterministic() {
        let generator = generator(None, 500);
        assert_eq!(
            generator.generate("example.com", true),
            generator.generate("example.com", true)
        );
    }

    #[test]
    fn external_wordlist_is_sampled_and_bounded() {
        let dir = std::env::temp_dir().join("subscope-wordlist-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("words.txt");
        let mut file = File::create(&path).unwrap();
        for i in 0..10 {
            writeln!(file, "word{i}").unwrap();
        }

        let generated = generator(Some(path), 3).generate("example.com", true);
        assert_eq!(
            generated,
            vec![
                "www.example.com",
                "api.example.com",
                "word0.example.com",
                "word1.example.com",
                "word2.example.com",
            ]
        );
    }

    #[test]
    fn missing_wordlist_degrades_to_base_words() {
        let generated =
            generator(Some(PathBuf::from("/nonexistent/words.txt")), 500).generate("example.com", true);
        assert_eq!(generated, vec!["www.example.com", "api.example.com"]);
    }

    #[test]
    fn duplicate_words_collapse() {
        let generator = WordlistGenerator {
            base_words: vec!["www".to_string(), "www".to_string()],
            extra_wordlist: None,
            sample_limit: 500,
        };
        assert_eq!(generator.generate("example.com", true), vec!["www.example.com"]);
    }
}
