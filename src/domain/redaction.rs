//! Synopsis redaction and progressive reveal.
//!
//! A description is split into word and non-word tokens so the segments can
//! be concatenated back into the cleaned text without loss. Title mentions
//! are always masked; the remaining quota is filled with a shuffle seeded by
//! the media id so every replica masks the same words.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use super::error::DomainError;
use super::types::MediaId;

/// Placeholder rendered for words that are still hidden.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

pub const DEFAULT_MASK_RATIO: f64 = 0.7;
pub const DEFAULT_REVEAL_LEVELS: [f64; 6] = [0.2, 0.35, 0.5, 0.65, 0.8, 1.0];

static BREAK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid line-break pattern"));
static MARKUP_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid markup pattern"));
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#(?P<dec>[0-9]+);?|#[xX](?P<hex>[0-9a-fA-F]+);?|[A-Za-z][A-Za-z0-9]*;)")
        .expect("valid entity pattern")
});
static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+|[^\w\s]+|\w+(?:'\w+)?").expect("valid token pattern"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+(?:'\w+)?").expect("valid word pattern"));
static WHOLE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+(?:'\w+)?$").expect("valid whole-word pattern"));

/// Tunables for the mask quota and the reveal ladder.
#[derive(Debug, Clone, PartialEq)]
pub struct RedactionConfig {
    mask_ratio: f64,
    reveal_levels: Vec<f64>,
}

impl RedactionConfig {
    pub fn new(mask_ratio: f64, reveal_levels: Vec<f64>) -> Result<Self, DomainError> {
        if !(mask_ratio > 0.0 && mask_ratio <= 1.0) {
            return Err(DomainError::validation(format!(
                "mask ratio must be within (0, 1], got {mask_ratio}"
            )));
        }
        if reveal_levels.is_empty() {
            return Err(DomainError::validation("reveal levels must not be empty"));
        }
        if reveal_levels.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(DomainError::validation(
                "reveal levels must be strictly ascending",
            ));
        }
        Ok(Self {
            mask_ratio,
            reveal_levels,
        })
    }

    pub fn mask_ratio(&self) -> f64 {
        self.mask_ratio
    }

    pub fn reveal_levels(&self) -> &[f64] {
        &self.reveal_levels
    }
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            mask_ratio: DEFAULT_MASK_RATIO,
            reveal_levels: DEFAULT_REVEAL_LEVELS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactedSegment {
    pub text: String,
    pub masked: bool,
}

/// Output of [`redact`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Redaction {
    /// Cleaned description, trimmed.
    pub clean_text: String,
    pub segments: Vec<RedactedSegment>,
    /// Segment indices of masked words in reveal order: filler words first,
    /// title words last.
    pub masked_word_indices: Vec<usize>,
    pub masked_words: Vec<String>,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynopsisLevel {
    pub ratio: f64,
    pub text: String,
}

/// Replace line breaks with newlines, drop remaining tags and decode entities.
pub fn strip_markup(text: &str) -> String {
    let with_breaks = BREAK_TAG.replace_all(text, "\n");
    let without_tags = MARKUP_TAG.replace_all(&with_breaks, " ");
    unescape_entities(&without_tags)
}

fn unescape_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |captures: &Captures<'_>| {
            let reference = &captures[0];
            if let Some(digits) = captures.name("dec") {
                return numeric_reference(digits.as_str().parse().ok());
            }
            if let Some(digits) = captures.name("hex") {
                return numeric_reference(u32::from_str_radix(digits.as_str(), 16).ok());
            }
            html_escape::decode_html_entities(reference).into_owned()
        })
        .into_owned()
}

/// Numeric references may omit the trailing semicolon; code points that
/// cannot be represented decode to U+FFFD.
fn numeric_reference(code: Option<u32>) -> String {
    code.filter(|code| *code != 0)
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
        .to_string()
}

/// Split text into tokens, returning the tokens and the indices of word tokens.
fn tokenize(text: &str) -> (Vec<&str>, Vec<usize>) {
    let mut tokens = Vec::new();
    let mut word_indices = Vec::new();
    for found in TOKEN.find_iter(text) {
        let token = found.as_str();
        if WHOLE_WORD.is_match(token) {
            word_indices.push(tokens.len());
        }
        tokens.push(token);
    }
    (tokens, word_indices)
}

/// Segment indices covered by any title variant, matched as whole word runs.
///
/// Longer variants are scanned first; a match resumes the scan after its
/// last word.
fn title_indices(tokens: &[&str], word_indices: &[usize], variants: &[&str]) -> HashSet<usize> {
    let mut masked = HashSet::new();
    if variants.is_empty() || word_indices.is_empty() {
        return masked;
    }

    let words: Vec<String> = word_indices
        .iter()
        .map(|index| tokens[*index].to_lowercase())
        .collect();

    let mut ordered: Vec<&str> = variants.to_vec();
    ordered.sort_by(|left, right| {
        right
            .chars()
            .count()
            .cmp(&left.chars().count())
            .then_with(|| left.cmp(right))
    });
    ordered.dedup();

    for variant in ordered {
        let needle: Vec<String> = WORD
            .find_iter(variant)
            .map(|word| word.as_str().to_lowercase())
            .collect();
        if needle.is_empty() || needle.len() > words.len() {
            continue;
        }
        let mut start = 0;
        while start + needle.len() <= words.len() {
            if words[start..start + needle.len()] == needle[..] {
                masked.extend(word_indices[start..start + needle.len()].iter().copied());
                start += needle.len();
            } else {
                start += 1;
            }
        }
    }
    masked
}

/// Number of words to hide: the ratio quota, never fewer than the title
/// words, and leaving one word visible unless titles cover everything.
fn mask_target(word_count: usize, must_mask: usize, ratio: f64) -> usize {
    if word_count == 1 {
        return 1;
    }
    let quota = (word_count as f64 * ratio).ceil() as usize;
    let mut desired = quota.max(must_mask);
    if word_count > 1 {
        desired = if must_mask < word_count {
            desired.min(word_count - 1)
        } else {
            word_count
        };
    }
    desired.min(word_count).max(1)
}

fn shuffle_seed(media_id: MediaId) -> u64 {
    let digest = Sha256::digest(format!("synopsis:{media_id}").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Redact `description`, masking every title mention plus a seeded sample of
/// other words up to the configured ratio.
pub fn redact(
    description: Option<&str>,
    media_id: MediaId,
    title_variants: &[&str],
    config: &RedactionConfig,
) -> Redaction {
    let Some(description) = description.filter(|value| !value.is_empty()) else {
        return Redaction::default();
    };

    let clean = strip_markup(description);
    let (tokens, word_indices) = tokenize(&clean);
    if tokens.is_empty() {
        return Redaction::default();
    }

    let title_masked = title_indices(&tokens, &word_indices, title_variants);
    let mut masked: HashSet<usize> = title_masked.clone();
    let word_count = word_indices.len();
    let target = mask_target(word_count, masked.len(), config.mask_ratio);

    if masked.len() < target {
        let mut remaining: Vec<usize> = word_indices
            .iter()
            .copied()
            .filter(|index| !masked.contains(index))
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(shuffle_seed(media_id));
        remaining.shuffle(&mut rng);
        let needed = target - masked.len();
        masked.extend(remaining.into_iter().take(needed));
    }

    let mut filler: Vec<usize> = masked
        .iter()
        .copied()
        .filter(|index| !title_masked.contains(index))
        .collect();
    filler.sort_unstable();
    let mut titles: Vec<usize> = title_masked.into_iter().collect();
    titles.sort_unstable();
    let masked_word_indices: Vec<usize> = filler.into_iter().chain(titles).collect();

    let segments: Vec<RedactedSegment> = tokens
        .iter()
        .enumerate()
        .map(|(index, token)| RedactedSegment {
            text: (*token).to_string(),
            masked: masked.contains(&index),
        })
        .collect();
    let masked_words = masked_word_indices
        .iter()
        .map(|index| segments[*index].text.clone())
        .collect();

    Redaction {
        clean_text: clean.trim().to_string(),
        segments,
        masked_word_indices,
        masked_words,
        word_count,
    }
}

/// Build the reveal ladder for `ratios`.
///
/// Each level reveals a prefix of `masked_word_indices` at least one word
/// longer than the previous level. A level that renders the same text as its
/// predecessor is skipped.
pub fn generate_levels(
    segments: &[RedactedSegment],
    masked_word_indices: &[usize],
    ratios: &[f64],
) -> Vec<SynopsisLevel> {
    if segments.is_empty() {
        return Vec::new();
    }

    let total = masked_word_indices.len();
    let mut levels: Vec<SynopsisLevel> = Vec::new();
    let mut last_count = 0usize;

    for &level in ratios {
        let ratio = level.clamp(0.0, 1.0);
        let count = if total == 0 || ratio <= 0.0 {
            0
        } else if ratio >= 1.0 {
            total
        } else {
            let target = ((total as f64 * ratio).ceil() as usize).max(1);
            if target <= last_count {
                total.min(last_count + 1)
            } else {
                total.min(target)
            }
        };

        let revealed: HashSet<usize> = masked_word_indices[..count].iter().copied().collect();
        let text: String = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                if segment.masked && !revealed.contains(&index) {
                    REDACTED_PLACEHOLDER
                } else {
                    segment.text.as_str()
                }
            })
            .collect::<String>()
            .trim()
            .to_string();

        last_count = count;
        if levels.last().is_some_and(|previous| previous.text == text) {
            continue;
        }
        levels.push(SynopsisLevel { ratio, text });
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(redaction: &Redaction) -> String {
        redaction
            .segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect()
    }

    fn masked_texts(redaction: &Redaction) -> Vec<&str> {
        redaction
            .segments
            .iter()
            .filter(|segment| segment.masked)
            .map(|segment| segment.text.as_str())
            .collect()
    }

    #[test]
    fn strip_markup_handles_breaks_tags_and_entities() {
        let cleaned = strip_markup("Line one<br/>Line <i>two</i> &amp; &#39;three&#x27;<BR>end &bogus;");
        assert_eq!(cleaned, "Line one\nLine  two  & 'three'\nend &bogus;");
    }

    #[test]
    fn named_and_unterminated_references_are_decoded() {
        let cleaned = strip_markup("Caf&eacute; &hearts; &frac12; &#39 done &#x2014 &#0;");
        assert_eq!(cleaned, "Caf\u{e9} \u{2665} \u{bd} ' done \u{2014} \u{fffd}");
    }

    #[test]
    fn accented_words_stay_whole() {
        let redaction = redact(Some("Caf&eacute; night"), MediaId(3), &[], &RedactionConfig::default());
        assert_eq!(redaction.word_count, 2);
        assert_eq!(redaction.clean_text, "Caf\u{e9} night");
    }

    #[test]
    fn segments_round_trip_the_clean_text() {
        let description = "  <b>Don't</b> panic!  It's only   the end, 100% sure... ";
        let redaction = redact(
            Some(description),
            MediaId(9),
            &["Panic"],
            &RedactionConfig::default(),
        );
        assert_eq!(joined(&redaction), strip_markup(description));
        assert_eq!(redaction.clean_text, strip_markup(description).trim());
    }

    #[test]
    fn title_mentions_are_always_masked() {
        let description =
            "Mystery Story follows a clever detective who solves every Mystery Story in town.";
        let redaction = redact(
            Some(description),
            MediaId(101),
            &["Mystery Story"],
            &RedactionConfig::default(),
        );

        let title_positions: Vec<usize> = redaction
            .segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| segment.text == "Mystery" || segment.text == "Story")
            .map(|(index, _)| index)
            .collect();
        assert_eq!(title_positions.len(), 4);
        for index in &title_positions {
            assert!(redaction.segments[*index].masked, "title word {index} visible");
        }

        assert_eq!(redaction.word_count, 13);
        let masked = masked_texts(&redaction).len();
        assert!(masked >= 10, "masked {masked} of 13");
        assert!(masked as f64 / redaction.word_count as f64 >= 0.65);
        assert!(masked < redaction.word_count);

        let tail: Vec<usize> = redaction.masked_word_indices[masked - 4..].to_vec();
        assert_eq!(tail, title_positions);
    }

    #[test]
    fn masking_is_deterministic_per_media() {
        let description = "A quiet town hides a secret that only the youngest sibling notices.";
        let config = RedactionConfig::default();
        let first = redact(Some(description), MediaId(5), &[], &config);
        let second = redact(Some(description), MediaId(5), &[], &config);
        assert_eq!(first, second);
        assert_eq!(first.masked_word_indices.len(), 9);
    }

    #[test]
    fn longer_variants_win_over_their_prefixes() {
        let (tokens, words) = tokenize("Attack on Titan and Attack");
        let masked = title_indices(&tokens, &words, &["Attack", "Attack on Titan"]);
        let mut sorted: Vec<usize> = masked.into_iter().collect();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 2, 4, 8]);
    }

    #[test]
    fn single_word_is_masked() {
        let redaction = redact(Some("Hello"), MediaId(1), &[], &RedactionConfig::default());
        assert_eq!(masked_texts(&redaction), vec!["Hello"]);
    }

    #[test]
    fn titles_covering_everything_mask_everything() {
        let redaction = redact(
            Some("Clannad Clannad"),
            MediaId(1),
            &["Clannad"],
            &RedactionConfig::default(),
        );
        assert_eq!(masked_texts(&redaction).len(), 2);
    }

    #[test]
    fn missing_description_yields_empty_redaction() {
        let redaction = redact(None, MediaId(1), &["x"], &RedactionConfig::default());
        assert_eq!(redaction, Redaction::default());
        assert!(generate_levels(&redaction.segments, &[], DEFAULT_REVEAL_LEVELS.as_slice()).is_empty());
    }

    #[test]
    fn levels_reveal_monotonically_and_skip_duplicates() {
        let description = "One two three four five six seven eight nine ten eleven twelve";
        let redaction = redact(Some(description), MediaId(3), &[], &RedactionConfig::default());
        let levels = generate_levels(
            &redaction.segments,
            &redaction.masked_word_indices,
            DEFAULT_REVEAL_LEVELS.as_slice(),
        );

        assert!(!levels.is_empty());
        let hidden: Vec<usize> = levels
            .iter()
            .map(|level| level.text.matches(REDACTED_PLACEHOLDER).count())
            .collect();
        for pair in hidden.windows(2) {
            assert!(pair[1] < pair[0], "hidden counts {hidden:?}");
        }
        for pair in levels.windows(2) {
            assert_ne!(pair[0].text, pair[1].text);
        }
        let last = levels.last().expect("final level");
        assert_eq!(last.ratio, 1.0);
        assert_eq!(last.text, redaction.clean_text);
    }

    #[test]
    fn stalled_ratios_still_advance_by_one() {
        let segments: Vec<RedactedSegment> = ["a", " ", "b", " ", "c"]
            .iter()
            .map(|text| RedactedSegment {
                text: (*text).to_string(),
                masked: *text != " ",
            })
            .collect();
        let levels = generate_levels(&segments, &[0, 2, 4], &[0.1, 0.2, 0.3]);
        let texts: Vec<&str> = levels.iter().map(|level| level.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "a [REDACTED] [REDACTED]",
                "a b [REDACTED]",
                "a b c"
            ]
        );
    }

    #[test]
    fn unmasked_text_collapses_to_one_level() {
        let segments = vec![RedactedSegment {
            text: "...".to_string(),
            masked: false,
        }];
        let levels = generate_levels(&segments, &[], &[0.2, 0.5, 1.0]);
        assert_eq!(
            levels,
            vec![SynopsisLevel {
                ratio: 0.2,
                text: "...".to_string()
            }]
        );
    }

    #[test]
    fn config_rejects_unordered_levels() {
        assert!(RedactionConfig::new(0.7, vec![0.5, 0.2]).is_err());
        assert!(RedactionConfig::new(0.0, vec![0.5]).is_err());
        assert!(RedactionConfig::new(0.5, vec![0.2, 1.0]).is_ok());
    }
}
