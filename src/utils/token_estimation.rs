// Token estimation for token-window chunking
//
// Heuristic counts only; no tokenizer model is loaded.

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimator;

impl TokenEstimator {
    /// Average characters per token for Latin-script source text
    const CHARS_PER_TOKEN: f64 = 4.0;

    /// Average characters per token for CJK text
    const CJK_CHARS_PER_TOKEN: f64 = 2.0;

    const WORDS_PER_TOKEN_MULTIPLIER: f64 = 1.3;

    /// Hybrid formula weights
    const CHAR_WEIGHT: f64 = 0.6;
    const WORD_WEIGHT: f64 = 0.4;

    pub fn new() -> Self {
        Self
    }

    /// Character-based estimate using the script-appropriate ratio.
    pub fn estimate_string(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars_per_token = if self.contains_cjk(text) {
            Self::CJK_CHARS_PER_TOKEN
        } else {
            Self::CHARS_PER_TOKEN
        };
        // chars, not bytes
        (text.chars().count() as f64 / chars_per_token).ceil() as usize
    }

    pub fn estimate_words(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 * Self::WORDS_PER_TOKEN_MULTIPLIER).ceil() as usize
    }

    /// 0.6 * char estimate + 0.4 * word estimate
    pub fn estimate_string_hybrid(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let char_based = self.estimate_string(text) as f64;
        let word_based = self.estimate_words(text) as f64;
        (char_based * Self::CHAR_WEIGHT + word_based * Self::WORD_WEIGHT).ceil() as usize
    }

    /// Per-line estimates; a non-empty line always counts at least one token.
    pub fn estimate_lines(&self, lines: &[&str]) -> Vec<usize> {
        lines
            .iter()
            .map(|line| {
                let estimate = self.estimate_string_hybrid(line);
                if estimate == 0 && !line.is_empty() {
                    1
                } else {
                    estimate
                }
            })
            .collect()
    }

    pub fn contains_cjk(&self, text: &str) -> bool {
        text.chars().any(|ch| {
            let code = ch as u32;
            (0x4E00..=0x9FFF).contains(&code) // CJK Unified Ideographs
                || (0x3400..=0x4DBF).contains(&code) // Extension A
                || (0x3040..=0x30FF).contains(&code) // Hiragana and Katakana
                || (0xAC00..=0xD7AF).contains(&code) // Hangul Syllables
        })
    }
}
