use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use lapadvisor_config::{DialogueArtifacts, FunnelSettings, MatchRule, QuestionSpec};
use lapadvisor_intent::{Intent, QueryShape, Topic};

use crate::session::{
    AnswerOutcome, BatchStart, FunnelError, FunnelOutcome, Preference, QuestionCard, Scenario,
    Session, SessionSnapshot, StartedSession, option_by_id,
};

/// Owns every funnel session and all mutation of them.
///
/// Sessions live in a process-local map; each one is a single-writer
/// resource behind its own mutex, so answers to the same session serialize
/// while distinct sessions proceed concurrently. Expiry is checked on every
/// operation and additionally by the background sweeper.
pub struct FunnelController {
    features: IndexMap<String, QuestionSpec>,
    priorities: IndexMap<String, Vec<String>>,
    vague_triggers: Vec<String>,
    scenario_keywords: Vec<(Scenario, Vec<String>)>,
    lifestyle_topics: Vec<Topic>,
    ttl: chrono::Duration,
    shuffle_lead: bool,
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl FunnelController {
    pub fn new(artifacts: &DialogueArtifacts, settings: &FunnelSettings) -> Self {
        let funnel = &artifacts.funnel;

        let mut scenario_keywords = Vec::new();
        for (key, keywords) in &funnel.scenario_keywords {
            match Scenario::from_key(key) {
                Some(scenario) => {
                    let lowered = keywords.iter().map(|k| k.to_lowercase()).collect();
                    scenario_keywords.push((scenario, lowered));
                }
                None => warn!(scenario = %key, "ignoring unknown scenario in keyword map"),
            }
        }

        let mut lifestyle_topics = Vec::new();
        for key in &funnel.lifestyle_topics {
            match Topic::from_key(key) {
                Some(topic) => lifestyle_topics.push(topic),
                None => warn!(topic = %key, "ignoring unknown lifestyle topic"),
            }
        }

        Self {
            features: funnel.features.clone(),
            priorities: funnel.priorities.clone(),
            vague_triggers: funnel
                .trigger_keywords
                .vague
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            scenario_keywords,
            lifestyle_topics,
            ttl: chrono::Duration::hours(settings.session_ttl_hours as i64),
            shuffle_lead: settings.shuffle_lead_questions,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    // ── activation ───────────────────────────────────────────────────────────

    /// Decide whether this query should open a funnel, and under which
    /// scenario. Queries that name a known SKU or series never funnel, even
    /// with vague wording; queries citing a concrete (if unknown) series
    /// token are left for the router's unknown-series reply.
    pub fn should_activate(&self, query: &str, intent: &Intent) -> Option<Scenario> {
        if intent.shape != QueryShape::Unknown {
            return None;
        }
        if contains_series_like_token(query) {
            return None;
        }

        let lowered = query.to_lowercase();
        let vague = self.vague_triggers.iter().any(|t| lowered.contains(t.as_str()));
        let aimless = matches!(intent.topic, Topic::General | Topic::Unclear);
        let lifestyle = self.lifestyle_topics.contains(&intent.topic);

        if vague || aimless || lifestyle {
            Some(self.pick_scenario(&lowered))
        } else {
            None
        }
    }

    fn pick_scenario(&self, lowered_query: &str) -> Scenario {
        for (scenario, keywords) in &self.scenario_keywords {
            if keywords.iter().any(|k| lowered_query.contains(k.as_str())) {
                return *scenario;
            }
        }
        Scenario::General
    }

    // ── stepwise path ────────────────────────────────────────────────────────

    pub async fn start(&self, query: &str) -> Result<StartedSession, FunnelError> {
        let (session, first) = self.create_session(query)?;
        let started = StartedSession {
            session_id: session.id.clone(),
            scenario: session.scenario,
            question: first,
            step_index: 0,
            total_steps: session.question_order.len(),
        };

        info!(
            session = %session.id,
            scenario = session.scenario.as_str(),
            steps = session.question_order.len(),
            "funnel session started"
        );
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), Arc::new(Mutex::new(session)));
        Ok(started)
    }

    /// Record one answer. `step` guards against stale submissions: when it
    /// is present and does not match the session's current step, the current
    /// question is re-emitted and nothing changes.
    pub async fn answer(
        &self,
        session_id: &str,
        option_id: &str,
        step: Option<usize>,
    ) -> Result<AnswerOutcome, FunnelError> {
        let handle = self.live_session(session_id).await?;
        let mut session = handle.lock().await;

        if self.is_expired(&session) {
            drop(session);
            self.remove(session_id).await;
            info!(session = %session_id, "funnel session expired");
            return Err(FunnelError::SessionExpired(session_id.to_string()));
        }

        let total = session.question_order.len();
        let feature_id = session
            .current_feature()
            .ok_or_else(|| FunnelError::SessionNotFound(session_id.to_string()))?
            .to_string();
        let spec = &self.features[&feature_id];
        let card = QuestionCard::from_spec(&feature_id, spec);

        if let Some(step) = step {
            if step != session.step_index {
                return Ok(AnswerOutcome::Repeat {
                    question: card,
                    step_index: session.step_index,
                    total_steps: total,
                    note: None,
                });
            }
        }

        if option_by_id(spec, option_id).is_none() {
            return Ok(AnswerOutcome::Repeat {
                question: card,
                step_index: session.step_index,
                total_steps: total,
                note: Some(format!("`{option_id}` is not an option for this question")),
            });
        }

        session.answers.insert(feature_id.clone(), option_id.to_string());
        session.step_index += 1;
        session.updated_at = Utc::now();
        info!(
            session = %session_id,
            feature = %feature_id,
            option = %option_id,
            step = session.step_index,
            "funnel answer recorded"
        );

        if session.is_terminal() {
            let outcome = self.build_outcome(&session);
            drop(session);
            self.remove(session_id).await;
            info!(session = %session_id, "funnel session complete");
            return Ok(AnswerOutcome::Complete(outcome));
        }

        let next_id = session.current_feature().unwrap_or_default().to_string();
        let next = QuestionCard::from_spec(&next_id, &self.features[&next_id]);
        Ok(AnswerOutcome::Next {
            question: next,
            step_index: session.step_index,
            total_steps: total,
        })
    }

    // ── one-shot path ────────────────────────────────────────────────────────

    /// Hand out every question at once; the caller replies with a single
    /// feature → option map.
    pub async fn start_batch(&self, query: &str) -> Result<BatchStart, FunnelError> {
        let (session, _) = self.create_session(query)?;
        let questions = session
            .question_order
            .iter()
            .map(|id| QuestionCard::from_spec(id, &self.features[id]))
            .collect();
        let batch = BatchStart {
            session_id: session.id.clone(),
            scenario: session.scenario,
            questions,
        };

        info!(
            session = %session.id,
            scenario = session.scenario.as_str(),
            steps = session.question_order.len(),
            "funnel batch session started"
        );
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), Arc::new(Mutex::new(session)));
        Ok(batch)
    }

    /// Submit the whole answer map. Semantics match the stepwise path: a
    /// missing or invalid entry re-emits the offending question unchanged.
    pub async fn answer_batch(
        &self,
        session_id: &str,
        answers: &HashMap<String, String>,
    ) -> Result<AnswerOutcome, FunnelError> {
        let handle = self.live_session(session_id).await?;
        let mut session = handle.lock().await;

        if self.is_expired(&session) {
            drop(session);
            self.remove(session_id).await;
            info!(session = %session_id, "funnel session expired");
            return Err(FunnelError::SessionExpired(session_id.to_string()));
        }

        let total = session.question_order.len();
        for (index, feature_id) in session.question_order.iter().enumerate() {
            let spec = &self.features[feature_id];
            let reject = |note: String| AnswerOutcome::Repeat {
                question: QuestionCard::from_spec(feature_id, spec),
                step_index: index,
                total_steps: total,
                note: Some(note),
            };
            match answers.get(feature_id) {
                None => return Ok(reject(format!("missing an answer for `{feature_id}`"))),
                Some(option_id) if option_by_id(spec, option_id).is_none() => {
                    return Ok(reject(format!(
                        "`{option_id}` is not an option for `{feature_id}`"
                    )));
                }
                Some(_) => {}
            }
        }

        for feature_id in session.question_order.clone() {
            let option_id = answers[&feature_id].clone();
            session.answers.insert(feature_id, option_id);
        }
        session.step_index = total;
        session.updated_at = Utc::now();

        let outcome = self.build_outcome(&session);
        drop(session);
        self.remove(session_id).await;
        info!(session = %session_id, "funnel session complete");
        Ok(AnswerOutcome::Complete(outcome))
    }

    // ── inspection & expiry ──────────────────────────────────────────────────

    /// The question the session is currently waiting on, with its position.
    /// Used by transports that received a `FunnelStart` notification.
    pub async fn question_at(
        &self,
        session_id: &str,
    ) -> Result<(QuestionCard, usize, usize), FunnelError> {
        let handle = self.live_session(session_id).await?;
        let session = handle.lock().await;
        if self.is_expired(&session) {
            drop(session);
            self.remove(session_id).await;
            return Err(FunnelError::SessionExpired(session_id.to_string()));
        }
        let feature_id = session
            .current_feature()
            .ok_or_else(|| FunnelError::SessionNotFound(session_id.to_string()))?;
        let card = QuestionCard::from_spec(feature_id, &self.features[feature_id]);
        Ok((card, session.step_index, session.question_order.len()))
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, FunnelError> {
        let handle = self.live_session(session_id).await?;
        let session = handle.lock().await;
        if self.is_expired(&session) {
            drop(session);
            self.remove(session_id).await;
            return Err(FunnelError::SessionExpired(session_id.to_string()));
        }
        Ok(SessionSnapshot {
            session_id: session.id.clone(),
            scenario: session.scenario,
            step_index: session.step_index,
            total_steps: session.question_order.len(),
            answers: session.answers.clone(),
        })
    }

    /// Drop every expired session; returns how many were removed. Sessions
    /// currently being answered hold their lock and are by definition alive.
    pub async fn sweep(&self) -> usize {
        let mut map = self.sessions.write().await;
        let before = map.len();
        let mut keep = HashMap::with_capacity(before);
        for (id, handle) in map.drain() {
            let expired = match handle.try_lock() {
                Ok(session) => self.is_expired(&session),
                Err(_) => false,
            };
            if expired {
                info!(session = %id, "funnel session expired");
            } else {
                keep.insert(id, handle);
            }
        }
        let removed = before - keep.len();
        *map = keep;
        removed
    }

    /// Periodic sweep task. Holds only a weak reference so dropping the
    /// controller stops the task.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(controller) => {
                        let removed = controller.sweep().await;
                        if removed > 0 {
                            info!(removed, "session sweep evicted expired sessions");
                        }
                    }
                    None => break,
                }
            }
        })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn create_session(&self, query: &str) -> Result<(Session, QuestionCard), FunnelError> {
        let scenario = self.pick_scenario(&query.to_lowercase());
        let id = Uuid::new_v4().to_string();

        let configured = self
            .priorities
            .get(scenario.as_str())
            .or_else(|| self.priorities.get("general"));
        let mut seen = std::collections::HashSet::new();
        let mut order: Vec<String> = match configured {
            Some(order) => order
                .iter()
                .filter(|f| self.features.contains_key(f.as_str()) && seen.insert(f.as_str()))
                .cloned()
                .collect(),
            None => self.features.keys().cloned().collect(),
        };
        if order.is_empty() {
            return Err(FunnelError::NoQuestions(scenario.as_str()));
        }
        if self.shuffle_lead {
            apply_lead_shuffle(&mut order, session_seed(&id));
        }

        let now = Utc::now();
        let first = QuestionCard::from_spec(&order[0], &self.features[&order[0]]);
        let session = Session {
            id,
            original_query: query.to_string(),
            scenario,
            question_order: order,
            step_index: 0,
            answers: IndexMap::new(),
            created_at: now,
            updated_at: now,
        };
        Ok((session, first))
    }

    async fn live_session(&self, session_id: &str) -> Result<Arc<Mutex<Session>>, FunnelError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| FunnelError::SessionNotFound(session_id.to_string()))
    }

    async fn remove(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    fn is_expired(&self, session: &Session) -> bool {
        Utc::now() - session.updated_at > self.ttl
    }

    fn build_outcome(&self, session: &Session) -> FunnelOutcome {
        let mut preferences = Vec::new();
        let mut filters: Vec<(String, MatchRule)> = Vec::new();

        for feature_id in &session.question_order {
            let Some(option_id) = session.answers.get(feature_id) else { continue };
            let spec = &self.features[feature_id];
            let Some(option) = option_by_id(spec, option_id) else { continue };

            preferences.push(Preference {
                feature_id: feature_id.clone(),
                question: spec.question.clone(),
                option_id: option.option_id.clone(),
                label: option.label.clone(),
            });
            for (field, rule) in &option.filter {
                filters.push((field.clone(), rule.clone()));
            }
        }

        let labels: Vec<&str> = preferences.iter().map(|p| p.label.as_str()).collect();
        let enhanced_query = if labels.is_empty() {
            session.original_query.clone()
        } else {
            format!("{} (偏好: {})", session.original_query, labels.join("、"))
        };

        FunnelOutcome {
            session_id: session.id.clone(),
            scenario: session.scenario,
            preferences,
            filters,
            enhanced_query,
            original_query: session.original_query.clone(),
        }
    }
}

/// Shuffle the first three questions in place, seeded so the same session id
/// always yields the same order.
fn apply_lead_shuffle(order: &mut [String], seed: u64) {
    let lead = order.len().min(3);
    if lead < 2 {
        return;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    order[..lead].shuffle(&mut rng);
}

fn session_seed(session_id: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in session_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// True when the query cites any run of three or more ASCII digits — a
/// series-shaped token, whether or not it names a real series.
fn contains_series_like_token(query: &str) -> bool {
    let mut run = 0usize;
    for ch in query.chars() {
        if ch.is_ascii_digit() {
            run += 1;
            if run >= 3 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use regex::Regex;

    use lapadvisor_config::{
        DialogueArtifacts, EntityPatterns, FunnelArtifact, OptionSpec, TriggerKeywords,
    };
    use lapadvisor_intent::QueryShape;

    use super::*;

    fn question(text: &str, options: &[(&str, &str)]) -> QuestionSpec {
        QuestionSpec {
            question: text.to_string(),
            options: options
                .iter()
                .map(|(id, label)| OptionSpec {
                    option_id: id.to_string(),
                    label: label.to_string(),
                    description: String::new(),
                    filter: IndexMap::new(),
                })
                .collect(),
        }
    }

    fn artifacts() -> DialogueArtifacts {
        let mut features = IndexMap::new();
        features.insert("cpu".to_string(), question("算力需求？", &[("basic", "文書"), ("power", "重度")]));
        features.insert("weight".to_string(), question("重量要求？", &[("light", "輕薄"), ("any", "不限")]));
        features.insert("price".to_string(), question("預算？", &[("low", "兩萬內"), ("high", "不限")]));

        let mut priorities = IndexMap::new();
        priorities.insert("business".to_string(), vec!["weight".into(), "cpu".into(), "ghost".into()]);
        priorities.insert("general".to_string(), vec!["cpu".into(), "weight".into(), "price".into()]);

        let mut scenario_keywords = IndexMap::new();
        scenario_keywords.insert("gaming".to_string(), vec!["遊戲".to_string(), "電競".to_string()]);
        scenario_keywords.insert("business".to_string(), vec!["辦公".to_string(), "商務".to_string()]);
        scenario_keywords.insert("study".to_string(), vec!["上課".to_string()]);
        scenario_keywords.insert("creation".to_string(), vec!["剪輯".to_string()]);

        DialogueArtifacts {
            intent_keywords: IndexMap::new(),
            entity_patterns: EntityPatterns {
                model_name: vec![Regex::new(r"[A-Z]{2,4}\d{3}").unwrap()],
                series_key: vec![Regex::new(r"\d{3}").unwrap()],
            },
            funnel: FunnelArtifact {
                features,
                priorities,
                trigger_keywords: TriggerKeywords {
                    vague: vec!["推薦".into(), "適合".into()],
                    comparison: vec!["比較".into()],
                    list_all: vec![],
                },
                scenario_keywords,
                lifestyle_topics: vec!["portability".into()],
            },
            prompt_template: "{context} {query}".to_string(),
        }
    }

    fn controller() -> FunnelController {
        FunnelController::new(&artifacts(), &FunnelSettings::default())
    }

    fn vague_intent(topic: Topic) -> Intent {
        Intent {
            model_names: vec![],
            series_keys: vec![],
            topic,
            shape: QueryShape::Unknown,
        }
    }

    #[test]
    fn vague_query_activates_with_scenario_from_keywords() {
        let c = controller();
        let scenario = c.should_activate("我想要一台適合辦公的筆電", &vague_intent(Topic::General));
        assert_eq!(scenario, Some(Scenario::Business));
    }

    #[test]
    fn named_model_bypasses_even_with_vague_words() {
        let c = controller();
        let intent = Intent {
            model_names: vec!["AG958".to_string()],
            series_keys: vec!["958".to_string()],
            topic: Topic::General,
            shape: QueryShape::SpecificModel,
        };
        assert_eq!(c.should_activate("推薦 AG958 嗎", &intent), None);
    }

    #[test]
    fn lifestyle_topic_activates_without_vague_words() {
        let c = controller();
        let scenario = c.should_activate("想找很輕的機器", &vague_intent(Topic::Portability));
        assert_eq!(scenario, Some(Scenario::General));
    }

    #[test]
    fn concrete_topic_without_entities_does_not_activate() {
        let c = controller();
        assert_eq!(c.should_activate("cpu 的時脈怎麼看", &vague_intent(Topic::Cpu)), None);
    }

    #[test]
    fn series_like_token_never_funnels() {
        let c = controller();
        assert_eq!(c.should_activate("777 系列有哪些？", &vague_intent(Topic::General)), None);
    }

    #[tokio::test]
    async fn start_uses_the_scenario_priority_order() {
        let c = controller();
        let started = c.start("適合辦公的筆電").await.unwrap();
        assert_eq!(started.scenario, Scenario::Business);
        // `ghost` is not a configured feature and is skipped.
        assert_eq!(started.total_steps, 2);
        assert_eq!(started.question.feature_id, "weight");
    }

    #[tokio::test]
    async fn full_walk_yields_next_then_complete() {
        let c = controller();
        let started = c.start("推薦一台筆電").await.unwrap();
        assert_eq!(started.total_steps, 3);

        let step1 = c.answer(&started.session_id, "basic", Some(0)).await.unwrap();
        let AnswerOutcome::Next { question, step_index, .. } = step1 else {
            panic!("expected next question");
        };
        assert_eq!(question.feature_id, "weight");
        assert_eq!(step_index, 1);

        let step2 = c.answer(&started.session_id, "light", Some(1)).await.unwrap();
        assert!(matches!(step2, AnswerOutcome::Next { .. }));

        let step3 = c.answer(&started.session_id, "low", Some(2)).await.unwrap();
        let AnswerOutcome::Complete(outcome) = step3 else {
            panic!("expected completion");
        };
        let chosen: Vec<&str> = outcome.preferences.iter().map(|p| p.feature_id.as_str()).collect();
        assert_eq!(chosen, ["cpu", "weight", "price"]);
        assert!(outcome.enhanced_query.contains("文書"));
        assert!(outcome.enhanced_query.contains("推薦一台筆電"));

        // Completed sessions are cleaned up.
        assert_eq!(c.session_count().await, 0);
    }

    #[tokio::test]
    async fn invalid_option_repeats_without_mutation() {
        let c = controller();
        let started = c.start("推薦").await.unwrap();

        let outcome = c.answer(&started.session_id, "nope", None).await.unwrap();
        let AnswerOutcome::Repeat { question, step_index, note, .. } = outcome else {
            panic!("expected repeat");
        };
        assert_eq!(step_index, 0);
        assert_eq!(question.feature_id, "cpu");
        assert!(note.is_some());

        let snapshot = c.snapshot(&started.session_id).await.unwrap();
        assert_eq!(snapshot.step_index, 0);
        assert!(snapshot.answers.is_empty());
    }

    #[tokio::test]
    async fn stale_step_repeats_without_a_note() {
        let c = controller();
        let started = c.start("推薦").await.unwrap();
        c.answer(&started.session_id, "basic", Some(0)).await.unwrap();

        let outcome = c.answer(&started.session_id, "power", Some(0)).await.unwrap();
        let AnswerOutcome::Repeat { step_index, note, .. } = outcome else {
            panic!("expected repeat");
        };
        assert_eq!(step_index, 1);
        assert!(note.is_none());
    }

    #[tokio::test]
    async fn unknown_session_is_reported() {
        let c = controller();
        let result = c.answer("missing", "basic", None).await;
        assert!(matches!(result, Err(FunnelError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn expired_session_is_evicted_on_access() {
        let settings = FunnelSettings { session_ttl_hours: 0, ..FunnelSettings::default() };
        let c = FunnelController::new(&artifacts(), &settings);
        let started = c.start("推薦").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = c.answer(&started.session_id, "basic", None).await;
        assert!(matches!(result, Err(FunnelError::SessionExpired(_))));
        assert_eq!(c.session_count().await, 0);
    }

    #[tokio::test]
    async fn sweep_removes_expired_sessions() {
        let settings = FunnelSettings { session_ttl_hours: 0, ..FunnelSettings::default() };
        let c = FunnelController::new(&artifacts(), &settings);
        c.start("推薦").await.unwrap();
        c.start("適合上課").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(c.sweep().await, 2);
        assert_eq!(c.session_count().await, 0);
    }

    #[tokio::test]
    async fn batch_round_trip_completes_directly() {
        let c = controller();
        let batch = c.start_batch("推薦").await.unwrap();
        assert_eq!(batch.questions.len(), 3);

        let mut answers = HashMap::new();
        answers.insert("cpu".to_string(), "power".to_string());
        answers.insert("weight".to_string(), "light".to_string());
        answers.insert("price".to_string(), "high".to_string());

        let outcome = c.answer_batch(&batch.session_id, &answers).await.unwrap();
        let AnswerOutcome::Complete(outcome) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(outcome.preferences.len(), 3);
        assert_eq!(c.session_count().await, 0);
    }

    #[tokio::test]
    async fn batch_with_missing_answer_repeats_that_question() {
        let c = controller();
        let batch = c.start_batch("推薦").await.unwrap();

        let mut answers = HashMap::new();
        answers.insert("cpu".to_string(), "power".to_string());

        let outcome = c.answer_batch(&batch.session_id, &answers).await.unwrap();
        let AnswerOutcome::Repeat { question, note, .. } = outcome else {
            panic!("expected repeat");
        };
        assert_eq!(question.feature_id, "weight");
        assert!(note.is_some());
        // Session is untouched and can still complete.
        assert_eq!(c.session_count().await, 1);
    }

    #[test]
    fn lead_shuffle_is_reproducible_per_seed() {
        let base: Vec<String> = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let mut first = base.clone();
        let mut second = base.clone();
        apply_lead_shuffle(&mut first, 42);
        apply_lead_shuffle(&mut second, 42);
        assert_eq!(first, second);
        // Tail is never shuffled.
        assert_eq!(first[3], "d");
    }

    #[test]
    fn series_like_tokens_are_detected() {
        assert!(contains_series_like_token("777 系列"));
        assert!(contains_series_like_token("AG958"));
        assert!(!contains_series_like_token("i7 處理器"));
    }
}
