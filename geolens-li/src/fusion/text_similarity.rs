//! Keyword-tier text scoring
//!
//! OCR text is scored by substring containment against two keyword tiers:
//! tier 1 names specific target-region landmarks and historical identifiers,
//! tier 2 carries broader regional terms. A tier-1 hit is strong enough to
//! confirm the region on its own; tier-2 hits only raise the score.

/// Target city for region confirmation
pub const TARGET_CITY: &str = "荆州市";

/// Tier-1 keywords: landmark names and historical identifiers specific to
/// the target region
const TIER1: &[&str] = &[
    "荆州古城",
    "荆州古城墙",
    "荆州博物馆",
    "张居正故居",
    "章华寺",
    "楚王车马阵",
    "江陵",
    "沙市",
    "纪南城",
    "楚都",
    "郢都",
    "荆州",
];

/// Tier-2 keywords: surrounding county-level cities and broad regional terms
const TIER2: &[&str] = &[
    "仙桃", "天门", "潜江", "洪湖", "监利", "石首", "松滋", "公安", "荆门", "古城", "城墙",
    "楚", "三国", "湖北",
];

const TIER1_WEIGHT: f32 = 0.4;
const TIER2_WEIGHT: f32 = 0.15;

/// Case-insensitive containment match
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Two-tier keyword matcher for OCR text
#[derive(Debug, Clone, Default)]
pub struct KeywordTiers;

impl KeywordTiers {
    pub fn new() -> Self {
        Self
    }

    /// Score a set of text fragments against both tiers.
    ///
    /// Each distinct keyword counts at most once regardless of how many
    /// fragments contain it; the total is clamped to 1.0.
    pub fn score(&self, texts: &[String]) -> f32 {
        let tier1_hits = TIER1
            .iter()
            .filter(|kw| texts.iter().any(|t| contains_ci(t, kw)))
            .count();
        let tier2_hits = TIER2
            .iter()
            .filter(|kw| texts.iter().any(|t| contains_ci(t, kw)))
            .count();

        (tier1_hits as f32 * TIER1_WEIGHT + tier2_hits as f32 * TIER2_WEIGHT).min(1.0)
    }

    /// Whether any fragment contains a tier-1 keyword
    pub fn has_tier1_hit(&self, texts: &[String]) -> bool {
        texts.iter().any(|t| self.contains_tier1(t))
    }

    /// Whether a single string contains a tier-1 keyword
    pub fn contains_tier1(&self, text: &str) -> bool {
        TIER1.iter().any(|kw| contains_ci(text, kw))
    }

    /// Keywords (from either tier) contained in the given string, used to
    /// score POI name relevance
    pub fn matched_keywords(&self, text: &str) -> Vec<&'static str> {
        TIER1
            .iter()
            .chain(TIER2.iter())
            .filter(|kw| contains_ci(text, kw))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier1_scores_higher_than_tier2() {
        let tiers = KeywordTiers::new();
        let tier1 = tiers.score(&["荆州博物馆欢迎您".to_string()]);
        let tier2 = tiers.score(&["湖北风光".to_string()]);
        assert!(tier1 > tier2);
        assert!(tier2 > 0.0);
    }

    #[test]
    fn test_score_clamped_to_one() {
        let tiers = KeywordTiers::new();
        let text = TIER1
            .iter()
            .chain(TIER2.iter())
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        assert_eq!(tiers.score(&text), 1.0);
    }

    #[test]
    fn test_keyword_counted_once_across_fragments() {
        let tiers = KeywordTiers::new();
        let once = tiers.score(&["章华寺".to_string()]);
        let thrice = tiers.score(&[
            "章华寺".to_string(),
            "章华寺山门".to_string(),
            "章华寺大殿".to_string(),
        ]);
        assert_eq!(once, thrice);
    }

    #[test]
    fn test_no_match_scores_zero() {
        let tiers = KeywordTiers::new();
        assert_eq!(tiers.score(&["hello world".to_string()]), 0.0);
        assert!(!tiers.has_tier1_hit(&["hello".to_string()]));
    }

    #[test]
    fn test_substring_containment() {
        let tiers = KeywordTiers::new();
        // "荆州古城墙" contains the tier-1 keyword "荆州古城"
        assert!(tiers.contains_tier1("欢迎来到荆州古城墙景区"));
    }
}
