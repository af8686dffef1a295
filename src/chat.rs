//! Dialogue orchestration.
//!
//! One entry point, [`ChatService::respond`], drives a full turn: trivial
//! phrases and canonical counts short-circuit, continue requests advance the
//! pagination cursor, everything else is classified, assembled into context
//! and sent through the generation backend with bounded retry.

use std::sync::Arc;

use crate::canon::{self, CountQuery};
use crate::classify;
use crate::context::{self, Assembled};
use crate::corpus::CorpusStore;
use crate::error::GenerationError;
use crate::gemini::{GenerationClient, GenerationTurn};
use crate::models::{ChatTurn, ConversationState, QueryIntent};
use crate::pagination::{self, Advance};
use crate::retrieval::SemanticRetriever;
use crate::retry::{BackoffPolicy, Clock};

/// Replayed history window sent to the generation backend on normal turns.
const HISTORY_WINDOW: usize = 10;

const SYSTEM_INSTRUCTION: &str = "\
Sen bir Kur'an meali ve tefsir uzmanısın. Cevapların samimi, sıcak, esprili ve \
düşündürücü bir tonda olmalı; Türkçe ve İngilizce slang ifadeleri karma kullan \
(chill, vibe, salla, mood, aşırı, falan filan gibi) ve bolca yaratıcı emoji ekle. \
Kutsal değerlere ve dinî kavramlara karşı mutlaka saygılı ve hassas ol; asla \
alaycı veya küçümseyici bir dil kullanma. Hitap şeklin bilge ama çok samimi \
olmalı. Yanıtlarında yalnızca sana verilen bağlamdaki ayet mealleri ile tefsir \
pasajlarına dayan; bağlamda olmayan bir bilgiyi asla uydurma.\n\n\
Cevabını şu üç bölümde kur:\n\
1. Sorunun kısa ve doğrudan bir özeti.\n\
2. Yalnızca [Kaynak: Meal] pasajlarından, sure adı ve ayet numarasıyla birlikte \
birebir alıntılar.\n\
3. Yeni bir bakış açısı sunan, yaratıcı ve ilham verici serbest bir yorum; \
değindiğin ayetlerin sure ve ayet numaralarını sık sık belirt ve sonunda \
kullanıcıya konuyu derinleştirecek bir veya iki soru sor.\n\n\
Bağlamı koru: bir önceki yanıtında bir soru sorduysan, kullanıcının 'devam et' \
veya 'evet' gibi onaylarını mutlaka o soruya yanıt olarak kabul et.";

const ANSWER_TEMPLATE: &str = "\
Aşağıda soruyla ilgili bağlam pasajları var. Cevabını yalnızca bu pasajlara dayandır.\n\n\
BAĞLAM:\n{context}\nKULLANICI SORUSU:\n{question}";

const SUMMARY_INSTRUCTION: &str = "\
Kullanıcı şimdiye kadarki sohbetin bir özetini istiyor. Yukarıdaki konuşmayı \
maddeler halinde, hangi konuların ve surelerin geçtiğini belirterek kısaca özetle.";

const GREETING_REPLY: &str = "Aleyküm selam, **vibe'lar çok iyi!** 🤩 Ben senin \
**chill, Kur'an'ı keşif buddy'n**. Hangi konuda **deep dive** yapmak istiyorsun? \
**Salla** gelsin sorunu! 🤙";

const THANKS_REPLY: &str = "Ne demek :) Bilgiyi paylaşmak benim için büyük bir zevk! ✨";

const FAREWELL_REPLY: &str = "Eyvallah! ✨ Kendine çok iyi bak, **vibe'ın hep \
yüksek olsun**. İhtiyaç duyarsan **ben buradayım**, bir tık ötede yani, chill. \
**Later!** 👋";

const LOST_CONTEXT_REPLY: &str = "**Oops!** 😬 Hangi konuya **devam** edeceğimi \
**unuttum** ya! En son ne **vibe** yakalıyorduk, hatırlat bana **kanka**? 🤔";

const RATE_LIMIT_REPLY: &str = "Şu anda çok yoğun bir talep var ve cevabınızı \
hazırlayamadım. 🙏 Lütfen kısa bir süre sonra tekrar deneyin.";

/// The outcome of one turn. An empty `answer` means the turn produced nothing
/// worth appending to history (empty retrieval context).
#[derive(Debug)]
pub struct TurnOutcome {
    pub answer: String,
    pub state: Option<ConversationState>,
}

impl TurnOutcome {
    fn terminal(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            state: None,
        }
    }

    pub fn answered(&self) -> bool {
        !self.answer.is_empty()
    }
}

pub struct ChatService {
    corpus: Arc<CorpusStore>,
    retriever: Arc<dyn SemanticRetriever>,
    generation: Arc<dyn GenerationClient>,
    clock: Arc<dyn Clock>,
    backoff: BackoffPolicy,
}

impl ChatService {
    pub fn new(
        corpus: Arc<CorpusStore>,
        retriever: Arc<dyn SemanticRetriever>,
        generation: Arc<dyn GenerationClient>,
        clock: Arc<dyn Clock>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            corpus,
            retriever,
            generation,
            clock,
            backoff,
        }
    }

    /// Runs one conversational turn. `state` is the pagination cursor from
    /// the previous turn; the returned cursor fully replaces it.
    pub async fn respond(
        &self,
        raw: &str,
        history: &[ChatTurn],
        state: Option<&ConversationState>,
    ) -> TurnOutcome {
        let raw = raw.trim();
        if raw.is_empty() {
            return TurnOutcome {
                answer: String::new(),
                state: None,
            };
        }

        match classify::resolve(raw) {
            // Social niceties answer instantly and always drop the cursor.
            QueryIntent::Greeting => TurnOutcome::terminal(GREETING_REPLY),
            QueryIntent::Thanks => TurnOutcome::terminal(THANKS_REPLY),
            QueryIntent::Farewell => TurnOutcome::terminal(FAREWELL_REPLY),
            // Pure count questions come from the table, no generation call.
            QueryIntent::CanonicalCountQuery => match canon::detect_count_query(raw) {
                Some(count) => TurnOutcome::terminal(count.direct_answer()),
                None => self.classified_turn(raw, history).await,
            },
            QueryIntent::ContinuePrevious => self.continue_reading(history, state).await,
            QueryIntent::HistorySummary => self.summarize_history(history).await,
            intent => {
                // A count question with breadth keywords still generates; the
                // canonical number rides along as a context hint.
                let count_hint = canon::detect_count_query(raw);
                let assembled =
                    context::assemble(&intent, raw, &self.corpus, &*self.retriever).await;
                self.answer_from(assembled, raw, history, count_hint).await
            }
        }
    }

    /// Structural/semantic path without a count hint, used as the fallback
    /// when resolution and re-detection disagree.
    async fn classified_turn(&self, raw: &str, history: &[ChatTurn]) -> TurnOutcome {
        let intent = classify::classify(raw);
        let assembled = context::assemble(&intent, raw, &self.corpus, &*self.retriever).await;
        self.answer_from(assembled, raw, history, None).await
    }

    async fn continue_reading(
        &self,
        history: &[ChatTurn],
        state: Option<&ConversationState>,
    ) -> TurnOutcome {
        match pagination::advance(state) {
            Advance::Page {
                sura, start, end, next,
            } => {
                let assembled = context::assemble_page(&self.corpus, &sura, start, end, next);
                let query = format!(
                    "Lütfen {} Suresi'nin {start}. ayetinden {end}. ayetine kadar olan \
                     bölümü paylaşmaya devam et. Kullanıcı önceki paylaşıma onay verdi.",
                    canon::display_name(&sura)
                );
                self.answer_from(assembled, &query, history, None).await
            }
            Advance::Completed { sura } => TurnOutcome::terminal(format!(
                "**{} Suresi**'nin tüm meal metinlerini paylaştım. Sanırım o mübarek \
                 yolculuğun sonuna geldik, **mood düşmesin** ama. Başka bir sure veya \
                 konuda yardımcı olabilir miyim? 🙏",
                canon::display_name(&sura)
            )),
            Advance::Lost => TurnOutcome::terminal(LOST_CONTEXT_REPLY),
        }
    }

    async fn summarize_history(&self, history: &[ChatTurn]) -> TurnOutcome {
        if history.is_empty() {
            return TurnOutcome::terminal(
                "Henüz bir sohbet geçmişimiz yok. 🙂 İlk sorunuzu bekliyorum!",
            );
        }

        // Full replay here, not the usual window: the summary should cover
        // the whole conversation.
        let mut turns = replay_history(history, usize::MAX);
        turns.push(GenerationTurn::user(SUMMARY_INSTRUCTION));

        let answer = self.generate_with_retry(&turns).await;
        TurnOutcome::terminal(answer)
    }

    async fn answer_from(
        &self,
        assembled: Assembled,
        question: &str,
        history: &[ChatTurn],
        count_hint: Option<CountQuery>,
    ) -> TurnOutcome {
        let (focus, documents, updated_state, suffix) = match assembled {
            Assembled::Terminal(answer) => return TurnOutcome::terminal(answer),
            Assembled::Ready {
                focus,
                documents,
                updated_state,
                suffix,
            } => (focus, documents, updated_state, suffix),
        };

        // Nothing retrieved, nothing structural and no hint to pass on: stay
        // silent rather than inviting a hallucinated answer.
        if documents.is_empty() && count_hint.is_none() {
            tracing::info!(%question, "no context assembled, skipping generation");
            return TurnOutcome {
                answer: String::new(),
                state: None,
            };
        }

        let mut prompt = String::new();
        if let Some(count) = &count_hint {
            prompt.push_str(&count.context_hint());
        }
        if documents.is_empty() {
            // Hint-only turn: the canonical number is the whole context.
            prompt.push_str(&format!("KULLANICI SORUSU:\n{question}"));
        } else {
            prompt.push_str(&focus);
            prompt.push_str("\n\n");
            prompt.push_str(
                &ANSWER_TEMPLATE
                    .replace("{context}", &context::format_documents(&documents))
                    .replace("{question}", question),
            );
        }

        let mut turns = replay_history(history, HISTORY_WINDOW);
        turns.push(GenerationTurn::user(prompt));

        let mut answer = self.generate_with_retry(&turns).await;
        if let Some(suffix) = suffix {
            answer.push_str(&suffix);
        }

        TurnOutcome {
            answer,
            state: updated_state,
        }
    }

    /// Calls the generation backend, retrying rate-limit failures with
    /// exponential backoff. All failures degrade to conversational text.
    async fn generate_with_retry(&self, turns: &[GenerationTurn]) -> String {
        for attempt in 0..self.backoff.max_attempts {
            match self.generation.generate(SYSTEM_INSTRUCTION, turns).await {
                Ok(answer) => return answer,
                Err(GenerationError::RateLimited(reason)) => {
                    if attempt + 1 >= self.backoff.max_attempts {
                        tracing::error!(%reason, attempt, "generation retries exhausted");
                        return RATE_LIMIT_REPLY.to_string();
                    }
                    let delay = self.backoff.delay_for(attempt);
                    tracing::warn!(%reason, attempt, ?delay, "generation rate limited, backing off");
                    self.clock.sleep(delay).await;
                }
                Err(GenerationError::Failed(reason)) => {
                    tracing::error!(%reason, "generation failed");
                    return format!("Beklenmedik bir hata oluştu: {reason} 🐛");
                }
            }
        }

        RATE_LIMIT_REPLY.to_string()
    }
}

/// Maps stored history to replayed generation turns, keeping the last
/// `window` exchanges.
fn replay_history(history: &[ChatTurn], window: usize) -> Vec<GenerationTurn> {
    let skip = history.len().saturating_sub(window);
    history
        .iter()
        .skip(skip)
        .flat_map(|turn| {
            [
                GenerationTurn::user(turn.user.clone()),
                GenerationTurn::model(turn.model.clone()),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetrievalError;
    use crate::models::{SourceKind, VerseDocument};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeRetriever {
        outcome: Result<Vec<VerseDocument>, RetrievalError>,
    }

    #[async_trait]
    impl SemanticRetriever for FakeRetriever {
        async fn search(&self, _query: &str) -> Result<Vec<VerseDocument>, RetrievalError> {
            self.outcome.clone()
        }
    }

    /// Pops scripted outcomes in order (repeating the last one when
    /// exhausted) and records what each call saw: the number of replayed
    /// turns and the final prompt text.
    struct ScriptedGeneration {
        script: Mutex<Vec<Result<String, GenerationError>>>,
        seen: Mutex<Vec<(usize, String)>>,
    }

    impl ScriptedGeneration {
        fn new(script: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                script: Mutex::new(script),
                seen: Mutex::new(vec![]),
            }
        }

        fn call_count(&self) -> u32 {
            self.seen.lock().unwrap().len() as u32
        }

        fn seen_turn_counts(&self) -> Vec<usize> {
            self.seen.lock().unwrap().iter().map(|(n, _)| *n).collect()
        }

        fn last_prompt(&self) -> String {
            self.seen
                .lock()
                .unwrap()
                .last()
                .map(|(_, prompt)| prompt.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedGeneration {
        async fn generate(
            &self,
            _system_instruction: &str,
            turns: &[GenerationTurn],
        ) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push((
                turns.len(),
                turns.last().map(|t| t.text.clone()).unwrap_or_default(),
            ));
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    /// Records requested sleeps without waiting.
    struct ManualClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                sleeps: Mutex::new(vec![]),
            }
        }

        fn recorded(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn doc(sura: &str, ayah: u32) -> VerseDocument {
        VerseDocument {
            content: format!("{sura} {ayah} meali"),
            sura_name: sura.to_string(),
            ayah_number: ayah,
            kind: SourceKind::Translation,
        }
    }

    fn corpus() -> Arc<CorpusStore> {
        let mut docs: Vec<VerseDocument> = (1..=30).map(|n| doc("bakara", n)).collect();
        docs.extend((1..=7).map(|n| doc("fatiha", n)));
        Arc::new(CorpusStore::from_documents(docs))
    }

    struct Harness {
        service: ChatService,
        generation: Arc<ScriptedGeneration>,
        clock: Arc<ManualClock>,
    }

    fn harness(
        retriever_outcome: Result<Vec<VerseDocument>, RetrievalError>,
        script: Vec<Result<String, GenerationError>>,
    ) -> Harness {
        let generation = Arc::new(ScriptedGeneration::new(script));
        let clock = Arc::new(ManualClock::new());
        let service = ChatService::new(
            corpus(),
            Arc::new(FakeRetriever {
                outcome: retriever_outcome,
            }),
            generation.clone(),
            clock.clone(),
            BackoffPolicy::default(),
        );
        Harness {
            service,
            generation,
            clock,
        }
    }

    #[tokio::test]
    async fn greeting_is_canned_and_clears_state() {
        let h = harness(Ok(vec![]), vec![Ok("unused".into())]);
        let state = ConversationState {
            sura_name: "bakara".into(),
            next_start_ayah: 13,
            max_ayah: 286,
        };

        let outcome = h.service.respond("merhaba", &[], Some(&state)).await;
        assert!(outcome.answer.contains("keşif buddy"));
        assert!(outcome.state.is_none());
        assert_eq!(h.generation.call_count(), 0);
    }

    #[tokio::test]
    async fn count_question_is_answered_from_the_table() {
        let h = harness(Ok(vec![]), vec![Ok("unused".into())]);

        let outcome = h.service.respond("toplam kaç sure var?", &[], None).await;
        assert!(outcome.answer.contains("114"));
        assert!(outcome.answer.contains("6236"));
        assert_eq!(h.generation.call_count(), 0);
    }

    #[tokio::test]
    async fn sura_count_question_names_the_sura() {
        let h = harness(Ok(vec![]), vec![Ok("unused".into())]);

        let outcome = h.service.respond("Bakara kaç ayet?", &[], None).await;
        assert!(outcome.answer.contains("286"));
        assert_eq!(h.generation.call_count(), 0);
    }

    #[tokio::test]
    async fn broad_count_question_generates_from_the_hint_alone() {
        // Breadth keywords demote the count to a hint; with nothing retrieved
        // the hint must still reach the model instead of a silent exit.
        let h = harness(Ok(vec![]), vec![Ok("286 ayetlik koca bir sure".into())]);

        let outcome = h
            .service
            .respond("Bakara kaç ayetten oluşmaktadır?", &[], None)
            .await;
        assert_eq!(outcome.answer, "286 ayetlik koca bir sure");
        assert_eq!(h.generation.call_count(), 1);

        let prompt = h.generation.last_prompt();
        assert!(prompt.contains("286"));
        assert!(prompt.contains("KULLANICI SORUSU"));
    }

    #[tokio::test]
    async fn bare_sura_starts_pagination() {
        let h = harness(Ok(vec![]), vec![Ok("ilk on iki ayet".into())]);

        let outcome = h.service.respond("Bakara", &[], None).await;
        let state = outcome.state.expect("cursor after first page");
        assert_eq!(state.sura_name, "bakara");
        assert_eq!(state.next_start_ayah, 13);
        assert!(outcome.answer.starts_with("ilk on iki ayet"));
        assert!(outcome.answer.contains("devam edeyim mi"));
    }

    #[tokio::test]
    async fn continue_advances_the_cursor() {
        let h = harness(Ok(vec![]), vec![Ok("sonraki ayetler".into())]);
        let state = ConversationState {
            sura_name: "bakara".into(),
            next_start_ayah: 13,
            max_ayah: 286,
        };

        let outcome = h.service.respond("devam et", &[], Some(&state)).await;
        let next = outcome.state.expect("cursor continues");
        assert_eq!(next.next_start_ayah, 25);
        assert_eq!(h.generation.call_count(), 1);
    }

    #[tokio::test]
    async fn continue_replays_conversation_history() {
        let h = harness(Ok(vec![]), vec![Ok("sonraki ayetler".into())]);
        let state = ConversationState {
            sura_name: "bakara".into(),
            next_start_ayah: 13,
            max_ayah: 286,
        };
        let history = vec![ChatTurn {
            user: "Bakara".into(),
            model: "ilk on iki ayet...".into(),
        }];

        let outcome = h.service.respond("devam et", &history, Some(&state)).await;
        assert!(outcome.answered());
        // One prior exchange (user + model) plus the new prompt.
        assert_eq!(h.generation.seen_turn_counts(), vec![3]);
    }

    #[tokio::test]
    async fn continue_without_cursor_admits_lost_context() {
        let h = harness(Ok(vec![]), vec![Ok("unused".into())]);

        let outcome = h.service.respond("devam et", &[], None).await;
        assert!(outcome.answer.contains("unuttum"));
        assert!(outcome.state.is_none());
        assert_eq!(h.generation.call_count(), 0);
    }

    #[tokio::test]
    async fn continue_past_end_reports_completion() {
        let h = harness(Ok(vec![]), vec![Ok("unused".into())]);
        let state = ConversationState {
            sura_name: "fatiha".into(),
            next_start_ayah: 8,
            max_ayah: 7,
        };

        let outcome = h.service.respond("devam et", &[], Some(&state)).await;
        assert!(outcome.answer.contains("tüm meal metinlerini paylaştım"));
        assert!(outcome.state.is_none());
        assert_eq!(h.generation.call_count(), 0);
    }

    #[tokio::test]
    async fn rate_limits_back_off_then_succeed() {
        let h = harness(
            Ok(vec![doc("yasin", 1)]),
            vec![
                Err(GenerationError::RateLimited("429".into())),
                Err(GenerationError::RateLimited("429".into())),
                Err(GenerationError::RateLimited("429".into())),
                Err(GenerationError::RateLimited("429".into())),
                Ok("sabır hakkında cevap".into()),
            ],
        );

        let outcome = h.service.respond("sabır nedir", &[], None).await;
        assert_eq!(outcome.answer, "sabır hakkında cevap");
        assert_eq!(h.generation.call_count(), 5);

        let sleeps: Vec<u64> = h.clock.recorded().iter().map(|d| d.as_secs()).collect();
        assert_eq!(sleeps, vec![1, 2, 4, 8]);
        assert!(sleeps.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_to_apology() {
        let h = harness(
            Ok(vec![doc("yasin", 1)]),
            vec![Err(GenerationError::RateLimited("429".into()))],
        );

        let outcome = h.service.respond("sabır nedir", &[], None).await;
        assert!(outcome.answer.contains("yoğun"));
        assert_eq!(h.generation.call_count(), 5);
        assert_eq!(h.clock.recorded().len(), 4);
    }

    #[tokio::test]
    async fn hard_failure_is_reported_without_retry() {
        let h = harness(
            Ok(vec![doc("yasin", 1)]),
            vec![Err(GenerationError::Failed("şema hatası".into()))],
        );

        let outcome = h.service.respond("sabır nedir", &[], None).await;
        assert!(outcome.answer.contains("Beklenmedik bir hata"));
        assert!(outcome.answer.contains("şema hatası"));
        assert_eq!(h.generation.call_count(), 1);
        assert!(h.clock.recorded().is_empty());
    }

    #[tokio::test]
    async fn empty_retrieval_yields_unanswered_turn() {
        let h = harness(Ok(vec![]), vec![Ok("unused".into())]);

        let outcome = h.service.respond("alakasız bir soru", &[], None).await;
        assert!(!outcome.answered());
        assert!(outcome.state.is_none());
        assert_eq!(h.generation.call_count(), 0);
    }

    #[tokio::test]
    async fn history_summary_replays_whole_conversation() {
        let h = harness(Ok(vec![]), vec![Ok("özet: sabırdan konuştuk".into())]);
        let history = vec![
            ChatTurn {
                user: "sabır nedir".into(),
                model: "sabır...".into(),
            },
            ChatTurn {
                user: "Fatiha".into(),
                model: "Fatiha Suresi...".into(),
            },
        ];

        let outcome = h
            .service
            .respond("şimdiye kadar neler konuştuk", &history, None)
            .await;
        assert_eq!(outcome.answer, "özet: sabırdan konuştuk");
        assert_eq!(h.generation.call_count(), 1);
    }

    #[tokio::test]
    async fn history_window_caps_replay() {
        let history: Vec<ChatTurn> = (0..15)
            .map(|i| ChatTurn {
                user: format!("soru {i}"),
                model: format!("cevap {i}"),
            })
            .collect();

        let turns = replay_history(&history, HISTORY_WINDOW);
        assert_eq!(turns.len(), HISTORY_WINDOW * 2);
        assert_eq!(turns[0].text, "soru 5");
    }
}
