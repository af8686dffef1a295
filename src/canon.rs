//! Canonical sura/ayah numbers.
//!
//! A fixed table of the 114 suras with their standard ayah counts, plus the
//! two hardcoded totals. Lookups go through a diacritic fold so transliterated
//! spellings ("Fatır", "fatir", "FATIR") all resolve to the same key.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

pub const TOTAL_SURA_COUNT: u32 = 114;
pub const TOTAL_AYAH_COUNT: u32 = 6236;

/// Standard Turkish transliteration, standard ayah counts.
pub static SURA_VERSE_COUNTS: &[(&str, u32)] = &[
    ("fatiha", 7),
    ("bakara", 286),
    ("ali imran", 200),
    ("nisa", 176),
    ("maide", 120),
    ("enam", 165),
    ("araf", 206),
    ("enfal", 75),
    ("tevbe", 129),
    ("yunus", 109),
    ("hud", 123),
    ("yusuf", 111),
    ("rad", 43),
    ("ibrahim", 52),
    ("hicr", 99),
    ("nahl", 128),
    ("isra", 111),
    ("kehf", 110),
    ("meryem", 98),
    ("taha", 135),
    ("enbiya", 112),
    ("hac", 78),
    ("muminun", 118),
    ("nur", 64),
    ("furkan", 77),
    ("suara", 227),
    ("neml", 93),
    ("kasas", 88),
    ("ankebut", 69),
    ("rum", 60),
    ("lokman", 34),
    ("secde", 30),
    ("ahzab", 73),
    ("sebe", 54),
    ("fatır", 45),
    ("yasin", 83),
    ("saffat", 182),
    ("sad", 88),
    ("zumer", 75),
    ("mumin", 85),
    ("fussilet", 54),
    ("sura", 53),
    ("zuhruf", 89),
    ("duhan", 59),
    ("casiye", 37),
    ("ahkaf", 35),
    ("muhammed", 38),
    ("fetih", 29),
    ("hucurat", 18),
    ("kaf", 45),
    ("zariyat", 60),
    ("tur", 49),
    ("necm", 62),
    ("kamer", 55),
    ("rahman", 78),
    ("vakia", 96),
    ("hadid", 29),
    ("mucadele", 22),
    ("haşr", 24),
    ("mumtehine", 13),
    ("saff", 14),
    ("cuma", 11),
    ("munafikun", 11),
    ("tegabun", 18),
    ("talak", 12),
    ("tahrim", 12),
    ("mulk", 30),
    ("kalem", 52),
    ("hakka", 52),
    ("mearic", 44),
    ("nuh", 28),
    ("cin", 28),
    ("muzzemmil", 20),
    ("muddessir", 56),
    ("kiyame", 40),
    ("insan", 31),
    ("murselat", 50),
    ("nebe", 40),
    ("naziat", 46),
    ("abese", 42),
    ("tekvir", 29),
    ("infitar", 19),
    ("mutaffifin", 36),
    ("inşikak", 25),
    ("buruc", 22),
    ("tarık", 17),
    ("ala", 19),
    ("gaşiye", 26),
    ("fecr", 30),
    ("beled", 20),
    ("şems", 15),
    ("leyl", 21),
    ("duha", 11),
    ("inşirah", 8),
    ("tin", 8),
    ("alak", 19),
    ("kadr", 5),
    ("beyyine", 8),
    ("zilzal", 8),
    ("adiyat", 11),
    ("karia", 11),
    ("tekasur", 8),
    ("asr", 3),
    ("humeze", 9),
    ("fil", 5),
    ("kureyş", 4),
    ("maun", 7),
    ("kevser", 3),
    ("kafirun", 6),
    ("nasr", 3),
    ("mesed", 5),
    ("ihlas", 4),
    ("felak", 5),
    ("nas", 6),
];

static FOLDED_INDEX: LazyLock<HashMap<String, (&'static str, u32)>> = LazyLock::new(|| {
    let mut map = HashMap::with_capacity(SURA_VERSE_COUNTS.len());
    for &(name, count) in SURA_VERSE_COUNTS {
        map.insert(fold(name), (name, count));
    }
    map
});

/// Lowercases and strips Turkish diacritics so variant transliterations
/// compare equal ("İnşirah" -> "insirah").
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'ç' | 'Ç' => out.push('c'),
            'ğ' | 'Ğ' => out.push('g'),
            'ı' | 'İ' => out.push('i'),
            'ö' | 'Ö' => out.push('o'),
            'ş' | 'Ş' => out.push('s'),
            'ü' | 'Ü' => out.push('u'),
            'â' | 'Â' => out.push('a'),
            'î' | 'Î' => out.push('i'),
            'û' | 'Û' => out.push('u'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Resolves a captured sura token to its canonical key. The match is
/// word-boundary tolerant: "imran" resolves to "ali imran".
pub fn resolve_sura(token: &str) -> Option<&'static str> {
    let folded = fold(token.trim());
    if folded.is_empty() {
        return None;
    }

    if let Some(&(name, _)) = FOLDED_INDEX.get(&folded) {
        return Some(name);
    }

    SURA_VERSE_COUNTS
        .iter()
        .find(|(name, _)| fold(name).split_whitespace().any(|word| word == folded))
        .map(|&(name, _)| name)
}

pub fn verse_count(sura: &str) -> Option<u32> {
    resolve_sura(sura).and_then(|name| FOLDED_INDEX.get(&fold(name)).map(|&(_, count)| count))
}

pub fn is_canonical(token: &str) -> bool {
    resolve_sura(token).is_some()
}

/// "ali imran" -> "Ali Imran", for user-facing replies.
pub fn display_name(sura: &str) -> String {
    sura.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A count question answerable straight from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountQuery {
    Totals,
    Sura { name: &'static str, count: u32 },
}

static TOTAL_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(toplam|kac)\s*sure\s*(sayisi|var)|ayet\s*ve\s*sure\s*sayisi").unwrap()
});

static SURA_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(kac|sayisi|adedi)\s*(ayet)?\s*var|kac\s*ayet").unwrap());

/// Detects canonical-count phrasing. Works on the folded query so "kaç" and
/// "kac" both match.
pub fn detect_count_query(query: &str) -> Option<CountQuery> {
    let folded = fold(query);

    if TOTAL_COUNT_RE.is_match(&folded) {
        return Some(CountQuery::Totals);
    }

    if SURA_COUNT_RE.is_match(&folded) {
        for &(name, count) in SURA_VERSE_COUNTS {
            let key = fold(name);
            let word_hit = folded
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == key);
            if word_hit {
                return Some(CountQuery::Sura { name, count });
            }
        }
    }

    None
}

impl CountQuery {
    /// The fixed reply used when the count question is answered without a
    /// generation call.
    pub fn direct_answer(&self) -> String {
        match self {
            CountQuery::Totals => format!(
                "Net bilgi: Kur'an-ı Kerim'de **{TOTAL_SURA_COUNT} mübarek sure** ve \
                 **{TOTAL_AYAH_COUNT} ayet-i kerime** bulunmaktadır. Bu sayılar, koca bir \
                 evrenin rehberi gibi. Başka bir sayıyı merak ediyor musunuz? 🤔"
            ),
            CountQuery::Sura { name, count } => format!(
                "Sorduğunuz üzere **{} Suresi**'nde standart kabul edilen sayıma göre \
                 **{count} ayet-i kerime** bulunmaktadır. O suredeki hangi vibe'ı \
                 yakalamak istersiniz? 🧐",
                display_name(name)
            ),
        }
    }

    /// The context-header hint injected when the count rides along with a
    /// broader question that still goes through generation.
    pub fn context_hint(&self) -> String {
        match self {
            CountQuery::Totals => format!(
                "[ÖNEMLİ KANONİK BİLGİ: Kur'an-ı Kerim'de toplam {TOTAL_SURA_COUNT} sure ve \
                 {TOTAL_AYAH_COUNT} ayet vardır. Cevabında bu sayıları kullan. 💡]\n"
            ),
            CountQuery::Sura { name, count } => format!(
                "[ÖNEMLİ KANONİK BİLGİ: {} Suresi {count} ayetten oluşur. Cevabında bu sayıyı \
                 kullan. 💡]\n",
                display_name(name)
            ),
        }
    }
}
