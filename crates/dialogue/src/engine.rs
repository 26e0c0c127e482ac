//! The dialogue engine: one turn in, one reply out.
//!
//! Every step of a turn runs sequentially here: routing, retrieval, the
//! single LLM call, parsing, shaping. Any failure past routing is absorbed
//! into a `Direct` reply; the transport never sees an error it has to
//! interpret, only the two session error kinds it can act on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use lapadvisor_catalog::CatalogStore;
use lapadvisor_config::{AppConfig, DialogueArtifacts};
use lapadvisor_funnel::{AnswerOutcome, FunnelController, FunnelError, FunnelOutcome};
use lapadvisor_intent::{Intent, IntentExtractor};
use lapadvisor_llm::{CompletionBackend, LlmError, complete_within};
use lapadvisor_prompt::{PromptInputs, build_prompt, parse_reply};
use lapadvisor_retrieval::{PlanError, RetrievalPlanner};
use lapadvisor_vector::VectorStore;

use crate::reply::{DirectReply, ErrorKind, Reply, TurnInput};
use crate::router::{RouteDecision, Router};
use crate::shaper;

pub struct DialogueEngine {
    template: String,
    display_width: usize,
    one_shot: bool,
    catalog: Arc<CatalogStore>,
    extractor: IntentExtractor,
    funnel: Arc<FunnelController>,
    planner: RetrievalPlanner,
    router: Router,
    backend: Arc<dyn CompletionBackend>,
}

impl DialogueEngine {
    pub fn new(
        config: &AppConfig,
        artifacts: &DialogueArtifacts,
        catalog: Arc<CatalogStore>,
        vector: Option<Arc<VectorStore>>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        let extractor =
            IntentExtractor::new(artifacts, catalog.shared_names(), catalog.shared_series());
        let funnel = Arc::new(FunnelController::new(artifacts, &config.funnel));
        let planner =
            RetrievalPlanner::new(Arc::clone(&catalog), vector, config.retrieval.clone());
        let router = Router::new(
            &artifacts.funnel.trigger_keywords.list_all,
            catalog.shared_series(),
        );

        Self {
            template: artifacts.prompt_template.clone(),
            display_width: config.display.cell_width,
            one_shot: config.funnel.one_shot,
            catalog,
            extractor,
            funnel,
            planner,
            router,
            backend,
        }
    }

    /// The session store owner, exposed so the process can start the
    /// background expiry sweeper.
    pub fn funnel(&self) -> &Arc<FunnelController> {
        &self.funnel
    }

    pub fn display_width(&self) -> usize {
        self.display_width
    }

    /// Handle one turn with no caller deadline.
    pub async fn handle_turn(&self, input: TurnInput) -> Reply {
        self.turn(input, None).await
    }

    /// Handle one turn under a deadline. The LLM call gets whatever budget
    /// remains when the pipeline reaches it; past-deadline calls are skipped
    /// and the fallback answers instead.
    pub async fn handle_turn_within(&self, input: TurnInput, budget: Duration) -> Reply {
        self.turn(input, Some(budget)).await
    }

    /// The question a freshly started funnel is waiting on. Transports call
    /// this after receiving [`Reply::FunnelStart`].
    pub async fn next_question(&self, session_id: &str) -> Reply {
        match self.funnel.question_at(session_id).await {
            Ok((question, step_index, total_steps)) => Reply::FunnelQuestion {
                session_id: session_id.to_string(),
                step_index,
                total_steps,
                question,
                note: None,
            },
            Err(error) => funnel_error_reply(error),
        }
    }

    async fn turn(&self, input: TurnInput, budget: Option<Duration>) -> Reply {
        let started = Instant::now();
        match input {
            TurnInput::Query { text } => self.query_turn(&text, budget, started).await,
            TurnInput::FunnelAnswer { session_id, option_id, step } => {
                let outcome = self.funnel.answer(&session_id, &option_id, step).await;
                self.funnel_step(&session_id, outcome, budget, started).await
            }
            TurnInput::FunnelBatchAnswer { session_id, answers } => {
                let outcome = self.funnel.answer_batch(&session_id, &answers).await;
                self.funnel_step(&session_id, outcome, budget, started).await
            }
        }
    }

    async fn query_turn(&self, text: &str, budget: Option<Duration>, started: Instant) -> Reply {
        let intent = self.extractor.extract(text);

        match self.router.route(text, &intent, &self.funnel) {
            RouteDecision::ListAll => {
                let names: Vec<String> = self.catalog.names().iter().cloned().collect();
                let series: Vec<String> = self.catalog.series().iter().cloned().collect();
                Reply::Direct(shaper::catalog_listing(&names, &series))
            }
            RouteDecision::Funnel(_) => {
                if self.one_shot {
                    match self.funnel.start_batch(text).await {
                        Ok(batch) => Reply::FunnelBatch {
                            session_id: batch.session_id,
                            questions: batch.questions,
                        },
                        Err(error) => funnel_error_reply(error),
                    }
                } else {
                    match self.funnel.start(text).await {
                        Ok(session) => Reply::FunnelStart {
                            session_id: session.session_id,
                            message: format!(
                                "為了找到最適合的機型，我會依序問 {} 個問題。",
                                session.total_steps
                            ),
                        },
                        Err(error) => funnel_error_reply(error),
                    }
                }
            }
            RouteDecision::UnknownSeries(tokens) => {
                let known: Vec<String> = self.catalog.series().iter().cloned().collect();
                Reply::Direct(shaper::unknown_series(&tokens, &known))
            }
            RouteDecision::Direct => {
                let reply = self.answer_from_catalog(&intent, None, text, budget, started).await;
                Reply::Direct(reply)
            }
        }
    }

    async fn funnel_step(
        &self,
        session_id: &str,
        outcome: Result<AnswerOutcome, FunnelError>,
        budget: Option<Duration>,
        started: Instant,
    ) -> Reply {
        match outcome {
            Ok(AnswerOutcome::Next { question, step_index, total_steps }) => {
                Reply::FunnelQuestion {
                    session_id: session_id.to_string(),
                    step_index,
                    total_steps,
                    question,
                    note: None,
                }
            }
            Ok(AnswerOutcome::Repeat { question, step_index, total_steps, note }) => {
                Reply::FunnelQuestion {
                    session_id: session_id.to_string(),
                    step_index,
                    total_steps,
                    question,
                    note,
                }
            }
            Ok(AnswerOutcome::Complete(outcome)) => {
                self.complete_funnel(outcome, budget, started).await
            }
            Err(error) => funnel_error_reply(error),
        }
    }

    async fn complete_funnel(
        &self,
        outcome: FunnelOutcome,
        budget: Option<Duration>,
        started: Instant,
    ) -> Reply {
        let intent = self.extractor.extract(&outcome.original_query);
        let enhanced = outcome.enhanced_query.clone();
        let reply = self
            .answer_from_catalog(&intent, Some(&outcome), &enhanced, budget, started)
            .await;
        Reply::FunnelComplete {
            session_id: outcome.session_id,
            preferences: outcome.preferences,
            reply,
        }
    }

    /// The retrieval → prompt → LLM → parse → shape pipeline shared by the
    /// direct path and the funnel-completion path.
    async fn answer_from_catalog(
        &self,
        intent: &Intent,
        funnel: Option<&FunnelOutcome>,
        query: &str,
        budget: Option<Duration>,
        started: Instant,
    ) -> DirectReply {
        let plan = match self.planner.plan(intent, funnel, query) {
            Ok(plan) => plan,
            Err(PlanError::DataUnavailable { field, names }) => {
                info!(source = "data-unavailable", field, "reply shaped without llm");
                return shaper::data_unavailable(field, &names);
            }
            Err(PlanError::NoRows) => {
                warn!(source = "no-rows", "reply shaped without llm");
                return shaper::service_unavailable();
            }
        };

        let prompt = build_prompt(&PromptInputs {
            template: &self.template,
            query,
            intent,
            rows: &plan.rows,
            target_names: &plan.target_names,
            preferences: funnel.map(|f| f.preferences.as_slice()).unwrap_or(&[]),
        });

        match self.complete(&prompt, budget, started).await {
            Ok(raw) => match parse_reply(&raw, &plan.target_names) {
                Ok(parsed) => {
                    info!(source = "llm", rows = parsed.table.len(), "reply shaped");
                    shaper::from_parsed(parsed)
                }
                Err(error) => {
                    warn!(source = "fallback", %error, "model reply unusable, shaping from catalog");
                    shaper::fallback_from_rows(intent.topic, &plan.rows, &plan.target_names)
                }
            },
            Err(error) => {
                warn!(source = "fallback", %error, "llm call failed, shaping from catalog");
                shaper::fallback_from_rows(intent.topic, &plan.rows, &plan.target_names)
            }
        }
    }

    async fn complete(
        &self,
        prompt: &str,
        budget: Option<Duration>,
        started: Instant,
    ) -> Result<String, LlmError> {
        let call_started = Instant::now();
        let result = match budget {
            Some(total) => match total.checked_sub(started.elapsed()) {
                Some(remaining) if !remaining.is_zero() => {
                    complete_within(self.backend.as_ref(), prompt, remaining).await
                }
                _ => Err(LlmError::Timeout),
            },
            None => self.backend.complete(prompt).await,
        };

        let latency_ms = call_started.elapsed().as_millis() as u64;
        match &result {
            Ok(text) => info!(latency_ms, chars = text.len(), outcome = "ok", "llm call finished"),
            Err(error) => warn!(latency_ms, %error, outcome = "error", "llm call failed"),
        }
        result
    }
}

fn funnel_error_reply(error: FunnelError) -> Reply {
    let kind = match error {
        FunnelError::SessionNotFound(_) => ErrorKind::SessionNotFound,
        FunnelError::SessionExpired(_) => ErrorKind::SessionExpired,
        FunnelError::NoQuestions(_) => ErrorKind::Internal,
    };
    Reply::Error { kind, message: error.to_string() }
}
