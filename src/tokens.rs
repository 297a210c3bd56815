//! Token counting
//!
//! Token budgets throughout the crate are measured in whitespace-delimited
//! words. This is not a real tokenizer; it is the unit every budget,
//! prompt count and stored `token_usage` is expressed in, so it must stay
//! stable.

/// Counts tokens in `text` as the number of whitespace-delimited words
///
/// # Examples
///
/// ```
/// use metaretrieval::tokens::count_tokens;
///
/// assert_eq!(count_tokens(""), 0);
/// assert_eq!(count_tokens("What is rust?"), 3);
/// assert_eq!(count_tokens("  spaced\tout\n words "), 3);
/// ```
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Sums [`count_tokens`] over a sequence of texts
pub fn count_tokens_in<'a, I>(texts: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    texts.into_iter().map(count_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_blank_text() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("   \n\t  "), 0);
    }

    #[test]
    fn test_counts_words_not_characters() {
        assert_eq!(count_tokens("hello"), 1);
        assert_eq!(count_tokens("hello world"), 2);
        assert_eq!(count_tokens("a-b c.d e,f"), 3);
    }

    #[test]
    fn test_unicode_whitespace_separates_words() {
        assert_eq!(count_tokens("eins\u{00A0}zwei drei"), 3);
    }

    #[test]
    fn test_deterministic() {
        let text = "the quick brown fox jumps over the lazy dog";
        assert_eq!(count_tokens(text), count_tokens(text));
        assert_eq!(count_tokens(text), 9);
    }

    #[test]
    fn test_count_tokens_in_sums_each_text() {
        // Summing per text differs from joining without a separator.
        assert_eq!(count_tokens_in(["one two", "three"]), 3);
        assert_eq!(count_tokens_in(Vec::<&str>::new()), 0);
    }
}
