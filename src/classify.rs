//! Free-text query classification.
//!
//! Maps raw user input to a tagged [`QueryIntent`]. Structural rules are an
//! explicit ordered list evaluated first-match-wins; trivial conversational
//! intents and continue phrases are detected separately by the orchestrator
//! before the structural rules ever run.
//!
//! All matching happens on the diacritic-folded form of the input, so "kaç"
//! and "kac" or "Fatır" and "fatir" behave identically.

use std::sync::LazyLock;

use regex::Regex;

use crate::canon;
use crate::models::QueryIntent;

type Rule = (&'static str, fn(&str, &str) -> Option<QueryIntent>);

/// Structural rules in priority order. Earlier rules win; a rule that
/// declines returns `None` and evaluation falls through. Each rule sees the
/// folded text for matching and the raw text for payloads.
static RULES: &[Rule] = &[
    ("history_summary", history_summary),
    ("ayah_range", ayah_range),
    ("single_ayah", single_ayah),
    ("bare_sura", bare_sura),
    ("sura_summary", sura_summary),
];

pub fn classify(raw: &str) -> QueryIntent {
    let raw = raw.trim();
    let folded = canon::fold(raw);

    for (name, rule) in RULES {
        if let Some(intent) = rule(&folded, raw) {
            tracing::debug!(rule = name, "classified query");
            return intent;
        }
    }

    QueryIntent::SemanticSearch {
        query: raw.to_string(),
    }
}

static HISTORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"gecmisi\s*hatirla|neler\s*konustuk|daha\s*once\s*ne\s*sordum|konusulanlar|konusma\s*ozeti",
    )
    .unwrap()
});

fn history_summary(folded: &str, _raw: &str) -> Option<QueryIntent> {
    HISTORY_RE
        .is_match(folded)
        .then_some(QueryIntent::HistorySummary)
}

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<sura>[\p{L}\d]+)\s+(?:suresi|sure)?\s*(?P<start>\d+)\.?\s*ayet(?:ten|den|dan)?\s*(?P<end>\d+)\.?\s*ayete\s*kadar",
    )
    .unwrap()
});

fn ayah_range(folded: &str, _raw: &str) -> Option<QueryIntent> {
    let caps = RANGE_RE.captures(folded)?;
    let sura = caps.name("sura")?.as_str().trim().to_string();
    let start: u32 = caps.name("start")?.as_str().parse().ok()?;
    let end: u32 = caps.name("end")?.as_str().parse().ok()?;

    // Malformed ranges never construct an AyahRange; fall through.
    if end <= start {
        return None;
    }

    Some(QueryIntent::AyahRange { sura, start, end })
}

static SINGLE_AYAH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<sura>[\p{L}\d]+)\s+(?:suresi|sure)?\s*(?P<ayah>\d+)\.?\s*ayet").unwrap()
});

static ALPHA_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{L}{3,}").unwrap());

fn single_ayah(folded: &str, _raw: &str) -> Option<QueryIntent> {
    let caps = SINGLE_AYAH_RE.captures(folded)?;
    let token = caps.name("sura")?.as_str().trim();
    let ayah: u32 = caps.name("ayah")?.as_str().parse().ok()?;

    if let Some(sura) = canon::resolve_sura(token) {
        // A sura-qualified single verse is the degenerate range.
        return Some(QueryIntent::AyahRange {
            sura: sura.to_string(),
            start: ayah,
            end: ayah,
        });
    }

    // "111. ayet" style: the slot before the number carries no real word, so
    // this is a global, sura-agnostic verse lookup.
    if !ALPHA_RUN_RE.is_match(token) {
        return Some(QueryIntent::SingleAyah { ayah });
    }

    None
}

static BARE_SURA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?P<sura>[\p{L}]+)\s*(?:suresi|sure)?\s*$").unwrap());

fn bare_sura(folded: &str, raw: &str) -> Option<QueryIntent> {
    let caps = BARE_SURA_RE.captures(folded)?;
    let token = caps.name("sura")?.as_str();

    match canon::resolve_sura(token) {
        Some(sura) => Some(QueryIntent::FullSuraPaginated {
            sura: sura.to_string(),
        }),
        // Bare but non-canonical: let retrieval plus generation handle it.
        None => Some(QueryIntent::SemanticSearch {
            query: raw.to_string(),
        }),
    }
}

static SUMMARY_KEYWORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"ne\s*anlatir|tamami|ozeti|tum\s*ayetleri|ilk\s*ayetleri|ilk\s*\d+\s*ayet|hakkinda|kac\s*ayetten\s*olusmaktadir",
    )
    .unwrap()
});

/// A canonical sura name tied to a summary-style question is answered by the
/// generative stage over retrieved context, not by a structural dump.
fn sura_summary(folded: &str, raw: &str) -> Option<QueryIntent> {
    if !SUMMARY_KEYWORDS_RE.is_match(folded) {
        return None;
    }

    let mentions_sura = folded
        .split(|c: char| !c.is_alphanumeric())
        .any(canon::is_canonical);

    mentions_sura.then_some(QueryIntent::SemanticSearch {
        query: raw.to_string(),
    })
}

/// True when the query asks for more than a bare number ("Bakara kaç ayet ve
/// ne anlatır?"). Such count questions still go through generation, with the
/// canonical count injected as a context hint instead of a direct reply.
pub fn wants_broader_answer(raw: &str) -> bool {
    SUMMARY_KEYWORDS_RE.is_match(&canon::fold(raw))
}

/// Full intent resolution in orchestrator order: trivial phrases, then pure
/// count questions, then continue phrases, then the structural rules.
pub fn resolve(raw: &str) -> QueryIntent {
    if let Some(trivial) = detect_trivial(raw) {
        return trivial;
    }
    if canon::detect_count_query(raw).is_some() && !wants_broader_answer(raw) {
        return QueryIntent::CanonicalCountQuery;
    }
    if is_continue_phrase(raw) {
        return QueryIntent::ContinuePrevious;
    }
    classify(raw)
}

// --- Pre-classifier phrase sets ---------------------------------------------

static FAREWELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"gule\s*gule|hosca\s*kal|hoscakal|allaha\s*ismarladik|bay\s*bay|\bbb\b|gorusuruz")
        .unwrap()
});

static THANKS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"tesekkur|sagol|saol|eline\s*saglik|\btsk\b").unwrap()
});

static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(selamun\s*aleykum|selamunaleykum|selam|merhaba|mrb|iyi\s*gunler|iyi\s*aksamlar|sa\b|slm|naber|ne\s*haber|nasilsin|ne\s*var\s*ne\s*yok)",
    )
    .unwrap()
});

/// Greeting/farewell/thanks detection, checked before anything else. These
/// always clear the pagination cursor.
pub fn detect_trivial(raw: &str) -> Option<QueryIntent> {
    let folded = canon::fold(raw.trim());

    if FAREWELL_RE.is_match(&folded) {
        return Some(QueryIntent::Farewell);
    }
    if THANKS_RE.is_match(&folded) {
        return Some(QueryIntent::Thanks);
    }
    if GREETING_RE.is_match(&folded) {
        return Some(QueryIntent::Greeting);
    }

    None
}

static CONTINUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"devam\s*et|daha\s*fazla|sonrakini\s*goster|\bevet\b|\bhihi\b|\bhi\b|aciklamaya\s*devam|\bdevam\b",
    )
    .unwrap()
});

pub fn is_continue_phrase(raw: &str) -> bool {
    CONTINUE_RE.is_match(&canon::fold(raw.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_canonical_sura_paginates() {
        assert_eq!(
            classify("Bakara"),
            QueryIntent::FullSuraPaginated {
                sura: "bakara".to_string()
            }
        );
        assert_eq!(
            classify("Yasin suresi"),
            QueryIntent::FullSuraPaginated {
                sura: "yasin".to_string()
            }
        );
    }

    #[test]
    fn bare_non_canonical_name_falls_to_semantic() {
        assert!(matches!(
            classify("Zaferiye"),
            QueryIntent::SemanticSearch { .. }
        ));
    }

    #[test]
    fn range_phrasing_parses() {
        assert_eq!(
            classify("Fatiha 3. ayetten 5. ayete kadar yaz"),
            QueryIntent::AyahRange {
                sura: "fatiha".to_string(),
                start: 3,
                end: 5
            }
        );
    }

    #[test]
    fn malformed_range_never_constructs_range_intent() {
        // end == start and end < start both fail the range rule.
        for query in [
            "Fatiha 5. ayetten 5. ayete kadar yaz",
            "Fatiha 5. ayetten 3. ayete kadar yaz",
        ] {
            if let QueryIntent::AyahRange { start, end, .. } = classify(query) {
                assert!(end >= start, "classifier produced inverted range");
                assert_eq!(start, end, "only the degenerate fallback is allowed");
            }
        }
    }

    #[test]
    fn sura_qualified_single_verse_becomes_degenerate_range() {
        assert_eq!(
            classify("Bakara suresi 255. ayet"),
            QueryIntent::AyahRange {
                sura: "bakara".to_string(),
                start: 255,
                end: 255
            }
        );
    }

    #[test]
    fn global_single_verse_without_sura_name() {
        // No alphabetic run of length >= 3 in the sura slot: sura-agnostic.
        assert_eq!(
            classify("12 111. ayet"),
            QueryIntent::SingleAyah { ayah: 111 }
        );
    }

    #[test]
    fn named_but_unknown_sura_with_verse_falls_to_semantic() {
        assert!(matches!(
            classify("Zaferiye suresi 3. ayet nedir acaba"),
            QueryIntent::SemanticSearch { .. }
        ));
    }

    #[test]
    fn summary_keywords_demote_to_semantic() {
        assert!(matches!(
            classify("Nas suresi ne anlatır"),
            QueryIntent::SemanticSearch { .. }
        ));
        assert!(matches!(
            classify("Bakara hakkında bilgi ver"),
            QueryIntent::SemanticSearch { .. }
        ));
    }

    #[test]
    fn history_phrasing_wins_over_everything() {
        assert_eq!(
            classify("şimdiye kadar neler konuştuk?"),
            QueryIntent::HistorySummary
        );
        assert_eq!(classify("konuşma özeti"), QueryIntent::HistorySummary);
    }

    #[test]
    fn trivial_phrases_are_detected_before_classification() {
        assert_eq!(detect_trivial("Selamün aleyküm"), Some(QueryIntent::Greeting));
        assert_eq!(detect_trivial("çok teşekkür ederim"), Some(QueryIntent::Thanks));
        assert_eq!(detect_trivial("hoşça kal"), Some(QueryIntent::Farewell));
        assert_eq!(detect_trivial("Bakara suresi"), None);
    }

    #[test]
    fn continue_phrases() {
        assert!(is_continue_phrase("devam et"));
        assert!(is_continue_phrase("Evet"));
        assert!(is_continue_phrase("daha fazla göster"));
        assert!(!is_continue_phrase("Fatiha suresi"));
    }

    #[test]
    fn resolve_covers_the_pre_classifier_intents() {
        assert_eq!(resolve("merhaba"), QueryIntent::Greeting);
        assert_eq!(resolve("Bakara kaç ayet?"), QueryIntent::CanonicalCountQuery);
        assert_eq!(resolve("devam et"), QueryIntent::ContinuePrevious);
        assert_eq!(
            resolve("Bakara"),
            QueryIntent::FullSuraPaginated {
                sura: "bakara".to_string()
            }
        );
        // Breadth keywords demote the count to a hint; the intent itself is
        // whatever the structural rules say.
        assert!(matches!(
            resolve("Bakara kaç ayetten oluşmaktadır?"),
            QueryIntent::SemanticSearch { .. }
        ));
    }

    #[test]
    fn default_is_semantic_search_with_raw_text() {
        assert_eq!(
            classify("Kuranda güzel söz söylemek"),
            QueryIntent::SemanticSearch {
                query: "Kuranda güzel söz söylemek".to_string()
            }
        );
    }
}
