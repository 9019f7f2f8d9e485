//! Sequence alignment
//!
//! Computes a minimum-cost edit script between the target passage ("source")
//! and the typed text ("target") using unit-cost edit distance over a full
//! dynamic-programming table.
//!
//! Backtracking runs from `(n, m)` to `(0, 0)` and takes the first applicable
//! step in the order `Match > Substitute > Delete > Insert`, so every input pair
//! has exactly one script. Word alignment uses the same table over
//! whitespace-delimited tokens; a word differing by one character is a single
//! `Substitute`.

use crate::types::{AlignmentResult, Granularity, Op, OpKind};
use unicode_segmentation::UnicodeSegmentation;

/// Alignment engine for passage/typed pairs
pub struct AlignmentEngine;

impl AlignmentEngine {
    /// Align at the given granularity
    pub fn align(granularity: Granularity, source: &str, target: &str) -> AlignmentResult {
        let source_tokens = tokenize(granularity, source);
        let target_tokens = tokenize(granularity, target);
        let ops = align_tokens(&source_tokens, &target_tokens);
        let distance = ops.iter().filter(|op| op.kind != OpKind::Match).count();

        AlignmentResult {
            granularity,
            ops,
            distance,
        }
    }

    /// Align grapheme by grapheme
    pub fn align_characters(source: &str, target: &str) -> AlignmentResult {
        Self::align(Granularity::Character, source, target)
    }

    /// Align word by word
    pub fn align_words(source: &str, target: &str) -> AlignmentResult {
        Self::align(Granularity::Word, source, target)
    }

    /// Produce the character and word results for one trial.
    ///
    /// Logs a warning when either side exceeds `max_tokens_warning` graphemes;
    /// the alignment still runs.
    pub fn align_both(
        source: &str,
        target: &str,
        max_tokens_warning: usize,
    ) -> (AlignmentResult, AlignmentResult) {
        let longest = source.graphemes(true).count().max(target.graphemes(true).count());
        if longest > max_tokens_warning {
            log::warn!(
                "Aligning {} characters (warning threshold {}); table holds {} cells",
                longest,
                max_tokens_warning,
                (longest + 1) * (longest + 1)
            );
        }

        (
            Self::align_characters(source, target),
            Self::align_words(source, target),
        )
    }
}

/// Split text into tokens for the given granularity
pub fn tokenize(granularity: Granularity, text: &str) -> Vec<&str> {
    match granularity {
        Granularity::Character => text.graphemes(true).collect(),
        Granularity::Word => text.split_whitespace().collect(),
    }
}

/// Canonical minimum-cost edit script between two token sequences
pub fn align_tokens(source: &[&str], target: &[&str]) -> Vec<Op> {
    let n = source.len();
    let m = target.len();
    let width = m + 1;
    let at = |i: usize, j: usize| i * width + j;

    // cost[i][j] = edit distance between source[..i] and target[..j]
    let mut cost = vec![0usize; (n + 1) * width];
    for i in 0..=n {
        cost[at(i, 0)] = i;
    }
    for j in 0..=m {
        cost[at(0, j)] = j;
    }
    for i in 1..=n {
        for j in 1..=m {
            let diagonal = cost[at(i - 1, j - 1)] + usize::from(source[i - 1] != target[j - 1]);
            let up = cost[at(i - 1, j)] + 1;
            let left = cost[at(i, j - 1)] + 1;
            cost[at(i, j)] = diagonal.min(up).min(left);
        }
    }

    let mut ops = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let here = cost[at(i, j)];

        if i > 0 && j > 0 {
            let diagonal = cost[at(i - 1, j - 1)];
            if source[i - 1] == target[j - 1] && diagonal == here {
                ops.push(step(OpKind::Match, source, target, i - 1, j - 1));
                i -= 1;
                j -= 1;
                continue;
            }
            if diagonal + 1 == here {
                ops.push(step(OpKind::Substitute, source, target, i - 1, j - 1));
                i -= 1;
                j -= 1;
                continue;
            }
        }

        if i > 0 && cost[at(i - 1, j)] + 1 == here {
            ops.push(step(OpKind::Delete, source, target, i - 1, j));
            i -= 1;
            continue;
        }

        debug_assert!(j > 0 && cost[at(i, j - 1)] + 1 == here);
        ops.push(step(OpKind::Insert, source, target, i, j - 1));
        j -= 1;
    }

    ops.reverse();
    ops
}

fn step(kind: OpKind, source: &[&str], target: &[&str], i: usize, j: usize) -> Op {
    let source_token = match kind {
        OpKind::Insert => None,
        _ => Some(source[i].to_string()),
    };
    let target_token = match kind {
        OpKind::Delete => None,
        _ => Some(target[j].to_string()),
    };

    Op {
        kind,
        source_token,
        target_token,
        source_index: i,
        target_index: j,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn op(kind: OpKind, src: Option<&str>, tgt: Option<&str>, i: usize, j: usize) -> Op {
        Op {
            kind,
            source_token: src.map(str::to_string),
            target_token: tgt.map(str::to_string),
            source_index: i,
            target_index: j,
        }
    }

    /// Deterministic pseudo-random pairs over a small alphabet
    fn sample_pairs() -> Vec<(String, String)> {
        let alphabet: Vec<char> = "ab cdé".chars().collect();
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        let mut pairs = vec![
            ("the quick brown fox".to_string(), "teh quick brwn fox".to_string()),
            ("".to_string(), "".to_string()),
            ("abc".to_string(), "".to_string()),
            ("".to_string(), "abc".to_string()),
        ];
        let size = alphabet.len() as u64;
        for _ in 0..200 {
            let a_len = (next() % 9) as usize;
            let b_len = (next() % 9) as usize;
            let a: String = (0..a_len)
                .map(|_| alphabet[(next() % size) as usize])
                .collect();
            let b: String = (0..b_len)
                .map(|_| alphabet[(next() % size) as usize])
                .collect();
            pairs.push((a, b));
        }
        pairs
    }

    #[test]
    fn test_empty_typed_is_all_delete() {
        let result = AlignmentEngine::align_characters("cat", "");
        assert_eq!(
            result.ops,
            vec![
                op(OpKind::Delete, Some("c"), None, 0, 0),
                op(OpKind::Delete, Some("a"), None, 1, 0),
                op(OpKind::Delete, Some("t"), None, 2, 0),
            ]
        );
        assert_eq!(result.distance, 3);
    }

    #[test]
    fn test_empty_passage_is_all_insert() {
        let result = AlignmentEngine::align_characters("", "hi");
        assert_eq!(
            result.ops,
            vec![
                op(OpKind::Insert, None, Some("h"), 0, 0),
                op(OpKind::Insert, None, Some("i"), 0, 1),
            ]
        );
    }

    #[test]
    fn test_identical_is_all_match() {
        let result = AlignmentEngine::align_characters("cat", "cat");
        assert_eq!(result.ops.len(), 3);
        assert!(result.ops.iter().all(|op| op.kind == OpKind::Match));
        assert_eq!(result.distance, 0);
    }

    #[test]
    fn test_both_empty() {
        let result = AlignmentEngine::align_characters("", "");
        assert!(result.ops.is_empty());
        assert_eq!(result.distance, 0);
    }

    #[test]
    fn test_substitution() {
        let result = AlignmentEngine::align_characters("cat", "cot");
        assert_eq!(
            result.ops,
            vec![
                op(OpKind::Match, Some("c"), Some("c"), 0, 0),
                op(OpKind::Substitute, Some("a"), Some("o"), 1, 1),
                op(OpKind::Match, Some("t"), Some("t"), 2, 2),
            ]
        );
    }

    #[test]
    fn test_insertion_and_deletion() {
        let inserted = AlignmentEngine::align_characters("cat", "cart");
        assert_eq!(inserted.count(OpKind::Insert), 1);
        assert_eq!(inserted.count(OpKind::Match), 3);

        let deleted = AlignmentEngine::align_characters("cart", "cat");
        assert_eq!(deleted.count(OpKind::Delete), 1);
        assert_eq!(deleted.count(OpKind::Match), 3);
    }

    #[test]
    fn test_substitute_preferred_over_insert_delete_pair() {
        // "ab" -> "ba" costs 2 either way; the canonical script substitutes twice
        let result = AlignmentEngine::align_characters("ab", "ba");
        assert_eq!(result.count(OpKind::Substitute), 2);
        assert_eq!(result.count(OpKind::Insert), 0);
        assert_eq!(result.count(OpKind::Delete), 0);
    }

    #[test]
    fn test_word_granularity_substitutes_whole_word() {
        let result = AlignmentEngine::align_words("the cat sat", "the cot sat");
        assert_eq!(
            result.ops,
            vec![
                op(OpKind::Match, Some("the"), Some("the"), 0, 0),
                op(OpKind::Substitute, Some("cat"), Some("cot"), 1, 1),
                op(OpKind::Match, Some("sat"), Some("sat"), 2, 2),
            ]
        );
    }

    #[test]
    fn test_word_granularity_ignores_whitespace_runs() {
        let result = AlignmentEngine::align_words("a  b\tc", " a b c ");
        assert_eq!(result.distance, 0);
        assert_eq!(result.ops.len(), 3);
    }

    #[test]
    fn test_graphemes_are_single_tokens() {
        // "e" + combining acute accent is one grapheme
        let result = AlignmentEngine::align_characters("cafe\u{301}", "cafe");
        assert_eq!(result.ops.len(), 4);
        assert_eq!(result.count(OpKind::Substitute), 1);
        assert_eq!(result.ops[3].source_token.as_deref(), Some("e\u{301}"));
    }

    #[test]
    fn test_roundtrip_both_directions() {
        for (source, target) in sample_pairs() {
            let result = AlignmentEngine::align_characters(&source, &target);
            let rebuilt_source: String = result.source_tokens().concat();
            let rebuilt_target: String = result.target_tokens().concat();
            assert_eq!(rebuilt_source, source);
            assert_eq!(rebuilt_target, target);

            let words = AlignmentEngine::align_words(&source, &target);
            assert_eq!(
                words.source_tokens().join(" "),
                tokenize(Granularity::Word, &source).join(" ")
            );
            assert_eq!(
                words.target_tokens().join(" "),
                tokenize(Granularity::Word, &target).join(" ")
            );
        }
    }

    #[test]
    fn test_monotonic_indices() {
        for (source, target) in sample_pairs() {
            let chars = AlignmentEngine::align_characters(&source, &target);
            let words = AlignmentEngine::align_words(&source, &target);
            for result in [chars, words] {
                for pair in result.ops.windows(2) {
                    assert!(pair[0].source_index <= pair[1].source_index);
                    assert!(pair[0].target_index <= pair[1].target_index);
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        for (source, target) in sample_pairs() {
            let first = AlignmentEngine::align_characters(&source, &target);
            let second = AlignmentEngine::align_characters(&source, &target);
            assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );

            let first = AlignmentEngine::align_words(&source, &target);
            let second = AlignmentEngine::align_words(&source, &target);
            assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );
        }
    }

    #[test]
    fn test_distance_is_minimal() {
        // Classic pair with known edit distance
        let result = AlignmentEngine::align_characters("kitten", "sitting");
        assert_eq!(result.distance, 3);
    }

    #[test]
    fn test_align_both_returns_each_granularity() {
        let (chars, words) = AlignmentEngine::align_both("hello world", "hello word", 1);
        assert_eq!(chars.granularity, Granularity::Character);
        assert_eq!(words.granularity, Granularity::Word);
        assert_eq!(chars.distance, 1);
        assert_eq!(words.distance, 1);
    }
}
