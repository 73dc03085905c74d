//! Splitting a finished answer into stream fragments.
//!
//! Providers that compute the full answer before emitting it (full-then-chunk)
//! use this to produce a stream. Whitespace following a word stays attached
//! to that word's fragment, so joining the fragments gives back the input
//! byte for byte.

/// Words per fragment used by the bundled providers.
pub const DEFAULT_WORDS_PER_FRAGMENT: usize = 2;

/// Split `text` into fragments of `words_per_fragment` words each.
///
/// `words_per_fragment` of zero is treated as one. Empty input yields no
/// fragments.
pub fn split_fragments(text: &str, words_per_fragment: usize) -> Vec<String> {
    let per_fragment = words_per_fragment.max(1);
    let mut fragments = Vec::new();
    let mut start = 0;
    let mut words = 0;
    let mut in_word = false;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if in_word {
                words += 1;
                in_word = false;
            }
        } else {
            if !in_word && words == per_fragment {
                fragments.push(text[start..idx].to_string());
                start = idx;
                words = 0;
            }
            in_word = true;
        }
    }

    if start < text.len() {
        fragments.push(text[start..].to_string());
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_words_per_fragment() {
        let fragments = split_fragments("This is the predefined answer about C.", 2);
        assert_eq!(
            fragments,
            vec!["This is ", "the predefined ", "answer about ", "C."]
        );
    }

    #[test]
    fn test_concatenation_reproduces_input() {
        let text = "  Leading space,\ttabs\n\nand   runs of   whitespace  ";
        for per in 1..5 {
            let joined: String = split_fragments(text, per).concat();
            assert_eq!(joined, text);
        }
    }

    #[test]
    fn test_empty_text_has_no_fragments() {
        assert!(split_fragments("", 2).is_empty());
    }

    #[test]
    fn test_zero_words_treated_as_one() {
        assert_eq!(split_fragments("a b", 0), vec!["a ", "b"]);
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "céu é azul 🎮 sim";
        let fragments = split_fragments(text, 2);
        assert_eq!(fragments.concat(), text);
        assert_eq!(fragments[0], "céu é ");
    }
}
