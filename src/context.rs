//! Context assembly: turns a classified intent into the passage block fed to
//! the generation stage, plus the pagination cursor for the next turn.
//!
//! Structural intents read straight from the in-memory corpus; semantic ones
//! go through the retriever. Some outcomes never reach the model at all and
//! are returned as terminal answers.

use crate::canon;
use crate::corpus::CorpusStore;
use crate::error::RetrievalError;
use crate::models::{ConversationState, QueryIntent, VerseDocument};
use crate::pagination::{self, Advance};
use crate::retrieval::SemanticRetriever;

/// Result of assembling one turn's context.
#[derive(Debug)]
pub enum Assembled {
    /// A finished answer; skip retrieval and generation entirely.
    Terminal(String),
    /// Context ready for the generation stage.
    Ready {
        /// Focus instruction injected into the prompt ahead of the passages.
        focus: String,
        documents: Vec<VerseDocument>,
        updated_state: Option<ConversationState>,
        /// Appended verbatim after the generated answer (continuation offer).
        suffix: Option<String>,
    },
}

pub async fn assemble(
    intent: &QueryIntent,
    raw_query: &str,
    corpus: &CorpusStore,
    retriever: &dyn SemanticRetriever,
) -> Assembled {
    match intent {
        QueryIntent::FullSuraPaginated { sura } => full_sura_start(corpus, sura),
        QueryIntent::AyahRange { sura, start, end } => {
            match canon::resolve_sura(sura) {
                Some(canonical) => ayah_range(corpus, canonical, *start, *end),
                None => {
                    // An unknown sura token in a range request is almost
                    // always a misparse; fall through to semantic search.
                    tracing::warn!(sura = %sura, "range request names unknown sura, demoting to semantic search");
                    semantic(raw_query, retriever).await
                }
            }
        }
        QueryIntent::SingleAyah { ayah } => single_ayah(corpus, *ayah),
        QueryIntent::SemanticSearch { query } => semantic(query, retriever).await,
        other => {
            tracing::debug!(?other, "non-structural intent reached assembly, using semantic search");
            semantic(raw_query, retriever).await
        }
    }
}

/// First page of a sequential sura read-through.
fn full_sura_start(corpus: &CorpusStore, sura: &str) -> Assembled {
    let Some(max_ayah) = canon::verse_count(sura) else {
        return not_found_sura(sura);
    };

    match pagination::page_window(sura, 1, max_ayah) {
        Advance::Page {
            sura, start, end, next,
        } => assemble_page(corpus, &sura, start, end, next),
        // Unreachable for a canonical sura starting at ayah 1, but keep the
        // terminal answer rather than panicking.
        _ => not_found_sura(sura),
    }
}

/// One pagination page, used both for the first page and for continues.
pub fn assemble_page(
    corpus: &CorpusStore,
    sura: &str,
    start: u32,
    end: u32,
    next: Option<ConversationState>,
) -> Assembled {
    let documents = corpus.translation_slice(sura, start, end);
    let display = canon::display_name(sura);

    if documents.is_empty() {
        return Assembled::Terminal(format!(
            "Üzgünüm, {display} Suresi'nin {start}-{end}. ayetlerine ait kayıt bulamadım. 🙏"
        ));
    }

    let mut focus = format!(
        "Kullanıcı {display} Suresi'ni sırayla okumak istiyor. Aşağıdaki bağlamda \
         {start}. ayetten {end}. ayete kadar olan mealler var; bunları sırasıyla, \
         ayet numaralarıyla birlikte sun."
    );
    if next.is_none() {
        focus.push_str(" Bu bölümle sure tamamlanıyor; bunu kullanıcıya belirt.");
    }

    let suffix = next.as_ref().map(|state| {
        format!(
            "\n\n{}. ayetten itibaren devam edeyim mi? 🙂",
            state.next_start_ayah
        )
    });

    Assembled::Ready {
        focus,
        documents,
        updated_state: next,
        suffix,
    }
}

fn ayah_range(corpus: &CorpusStore, sura: &'static str, start: u32, end: u32) -> Assembled {
    let (start, end, clamped) = pagination::clamp_range(start, end);
    let documents = corpus.translation_slice(sura, start, end);
    let display = canon::display_name(sura);

    if documents.is_empty() {
        return Assembled::Terminal(format!(
            "Üzgünüm, {display} Suresi'nde {start}. ile {end}. ayetler arasında kayıt bulamadım. 🙏"
        ));
    }

    let mut focus = format!(
        "Kullanıcı {display} Suresi'nin {start}. ayetinden {end}. ayetine kadar olan \
         bölümü istiyor. Bağlamdaki mealleri ayet numaralarıyla sırasıyla sun."
    );
    if clamped {
        focus.push_str(&format!(
            " İstek tek seferde en fazla {} ayetle sınırlandı; bunu kullanıcıya nazikçe belirt.",
            pagination::MAX_RANGE_SPAN
        ));
    }

    Assembled::Ready {
        focus,
        documents,
        updated_state: None,
        suffix: None,
    }
}

/// Global single-ayah lookup: every sura that carries this ayah number is a
/// candidate, and the model disambiguates from the conversation.
fn single_ayah(corpus: &CorpusStore, ayah: u32) -> Assembled {
    let documents = corpus.translations_by_ayah(ayah);

    if documents.is_empty() {
        return Assembled::Terminal(format!(
            "Üzgünüm, {ayah}. ayet numarasına ait bir kayıt bulamadım. 🙏"
        ));
    }

    let focus = format!(
        "Kullanıcı sure adı vermeden {ayah}. ayeti sordu. Bağlamda bu ayet numarasını \
         taşıyan surelerin mealleri var; sohbetin gidişatından hangi sureyi kastettiğini \
         kestir, emin değilsen seçenekleri kısaca sırala."
    );

    Assembled::Ready {
        focus,
        documents,
        updated_state: None,
        suffix: None,
    }
}

async fn semantic(query: &str, retriever: &dyn SemanticRetriever) -> Assembled {
    match retriever.search(query).await {
        Ok(documents) => Assembled::Ready {
            focus: "Soruyu yalnızca aşağıdaki bağlamdaki ayet mealleri ve tefsir \
                    pasajlarına dayanarak yanıtla."
                .to_string(),
            documents,
            updated_state: None,
            suffix: None,
        },
        Err(RetrievalError::Unavailable(reason)) => {
            tracing::error!(%reason, "semantic retrieval unavailable");
            Assembled::Terminal(
                "Üzgünüm, arama hizmetine şu anda ulaşamıyorum. Lütfen biraz sonra \
                 tekrar dener misiniz? 🙏"
                    .to_string(),
            )
        }
    }
}

fn not_found_sura(sura: &str) -> Assembled {
    Assembled::Terminal(format!(
        "Üzgünüm, \"{sura}\" adında bir sure bulamadım. 🙏"
    ))
}

/// Renders the passage block exactly as the generation prompt expects it.
pub fn format_documents(documents: &[VerseDocument]) -> String {
    let mut out = String::new();
    for doc in documents {
        out.push_str(&format!(
            "[Kaynak: {}], Sûre: {}, Ayet: {} (İçerik):\n{}\n---\n",
            doc.kind.as_str(),
            canon::display_name(&doc.sura_name),
            doc.ayah_number,
            doc.content
        ));
    }
    out
}
