pub mod decision;
pub mod prompts;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ResearchConfig;
use crate::error::{ResearchError, ServiceError, Stage};
use crate::llm::Completion;
use crate::search::WebSearch;

use decision::Decision;
use prompts::{AnalysisFields, DecisionFields, SynthesisFields};

/// Why a turn stopped searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model said no more searching is needed.
    Satisfied,
    /// The model asked for more but gave no usable keywords.
    NoKeywords,
    /// The decision reply could not be parsed.
    MalformedDecision,
    /// The round cap was reached.
    IterationCap,
}

/// What happened in one round.
#[derive(Debug, Clone)]
pub struct RoundRecord {
    /// 1-based.
    pub round: u32,
    pub search_query: String,
    pub analysis: String,
    /// `None` when the decision reply was malformed.
    pub decision: Option<Decision>,
    /// Cumulative keywords after this round's decision was applied.
    pub cumulative_keywords: String,
}

pub struct ResearchResponse {
    pub answer: String,
    pub rounds: Vec<RoundRecord>,
    pub stop_reason: StopReason,
    pub full_analysis: String,
    pub cumulative_keywords: String,
}

/// Mutable state of one research turn.
#[derive(Debug, Default)]
struct RoundState {
    cumulative_keywords: String,
    full_analysis: String,
    iteration: u32,
}

impl RoundState {
    fn round(&self) -> u32 {
        self.iteration + 1
    }

    fn search_query(&self, query: &str) -> String {
        if self.cumulative_keywords.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, self.cumulative_keywords)
        }
    }

    fn record_analysis(&mut self, analysis: &str) {
        self.full_analysis
            .push_str(&format!("\n반복 {} 분석:\n{}\n", self.round(), analysis));
    }

    fn advance(&mut self, keywords: &str) {
        if !self.cumulative_keywords.is_empty() {
            self.cumulative_keywords.push_str(", ");
        }
        self.cumulative_keywords.push_str(keywords);
        self.iteration += 1;
    }
}

enum Phase {
    Searching,
    Deciding,
    Synthesizing(StopReason),
}

pub struct ResearchEngine {
    llm: Arc<dyn Completion>,
    search: Arc<dyn WebSearch>,
    max_iterations: u32,
    service_timeout: Duration,
}

impl ResearchEngine {
    pub fn new(llm: Arc<dyn Completion>, search: Arc<dyn WebSearch>, config: &ResearchConfig) -> Self {
        Self {
            llm,
            search,
            max_iterations: config.max_iterations.max(1),
            service_timeout: config.service_timeout,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run search → analyze → decide rounds for `query`, then synthesize an answer.
    ///
    /// Any service failure aborts the whole turn.
    pub async fn query(&self, query: &str) -> Result<ResearchResponse, ResearchError> {
        info!(query, max_iterations = self.max_iterations, "Research started");

        let mut state = RoundState::default();
        let mut rounds: Vec<RoundRecord> = Vec::new();
        let mut phase = Phase::Searching;

        loop {
            phase = match phase {
                Phase::Searching => {
                    let round = state.round();
                    let search_query = state.search_query(query);

                    // Search with the original query plus everything accumulated so far
                    let search_result = self
                        .call(Stage::Search { round }, self.search.search(&search_query))
                        .await?;
                    debug!(round, search_query = %search_query, result_len = search_result.len(), "Search done");

                    // Analyze this round's results
                    let prompt = prompts::analysis(&AnalysisFields {
                        query,
                        keywords: &state.cumulative_keywords,
                        search_result: &search_result,
                    });
                    let analysis = self
                        .call(Stage::Analysis { round }, self.llm.complete(&prompt))
                        .await?;
                    debug!(round, analysis_len = analysis.len(), "Analysis done");

                    state.record_analysis(&analysis);
                    rounds.push(RoundRecord {
                        round,
                        search_query,
                        analysis,
                        decision: None,
                        cumulative_keywords: state.cumulative_keywords.clone(),
                    });
                    Phase::Deciding
                }
                Phase::Deciding => {
                    let round = state.round();
                    let prompt = prompts::decision(&DecisionFields {
                        query,
                        current_analysis: &state.full_analysis,
                    });
                    let raw = self
                        .call(Stage::Decision { round }, self.llm.complete(&prompt))
                        .await?;

                    // Malformed verdicts fail safe toward stopping
                    let parsed = match Decision::parse(&raw) {
                        Ok(d) => Some(d),
                        Err(e) => {
                            warn!(round, error = %e, raw = %raw, "Malformed decision, stopping search");
                            None
                        }
                    };
                    let decision = parsed.clone().unwrap_or_else(Decision::stop);
                    info!(
                        round,
                        needs_more = decision.needs_more,
                        keywords = %decision.keywords,
                        "Decision"
                    );

                    let next = if parsed.is_none() {
                        Phase::Synthesizing(StopReason::MalformedDecision)
                    } else if !decision.needs_more {
                        Phase::Synthesizing(StopReason::Satisfied)
                    } else if !decision.wants_another_round() {
                        Phase::Synthesizing(StopReason::NoKeywords)
                    } else if round == self.max_iterations {
                        // Keywords from the capped round are never searched, so they are dropped
                        Phase::Synthesizing(StopReason::IterationCap)
                    } else {
                        state.advance(&decision.keywords);
                        debug!(cumulative_keywords = %state.cumulative_keywords, "Keywords extended");
                        Phase::Searching
                    };

                    // Backfill the round record now that the verdict is known
                    if let Some(record) = rounds.last_mut() {
                        record.decision = parsed;
                        record.cumulative_keywords = state.cumulative_keywords.clone();
                    }
                    next
                }
                Phase::Synthesizing(stop_reason) => {
                    let prompt = prompts::synthesis(&SynthesisFields {
                        query,
                        full_analysis: &state.full_analysis,
                    });
                    let answer = self.call(Stage::Synthesis, self.llm.complete(&prompt)).await?;

                    info!(
                        rounds = rounds.len(),
                        ?stop_reason,
                        answer_len = answer.len(),
                        "Research complete"
                    );
                    return Ok(ResearchResponse {
                        answer,
                        rounds,
                        stop_reason,
                        full_analysis: state.full_analysis,
                        cumulative_keywords: state.cumulative_keywords,
                    });
                }
            };
        }
    }

    /// Await one service call under the configured timeout.
    async fn call<F>(&self, stage: Stage, fut: F) -> Result<String, ResearchError>
    where
        F: Future<Output = Result<String, ServiceError>>,
    {
        match tokio::time::timeout(self.service_timeout, fut).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ResearchError::new(stage, e)),
            Err(_) => Err(ResearchError::new(stage, ServiceError::Timeout)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedLlm, ScriptedSearch};
    use super::*;

    const YES_X: &str = "필요여부: Yes\n키워드: x";

    fn engine(llm: Arc<ScriptedLlm>, search: Arc<ScriptedSearch>, max_iterations: u32) -> ResearchEngine {
        let config = ResearchConfig {
            max_iterations,
            service_timeout: Duration::from_secs(5),
        };
        ResearchEngine::new(llm, search, &config)
    }

    #[tokio::test]
    async fn test_round_cap() {
        let llm = Arc::new(ScriptedLlm::always(YES_X, 10));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm.clone(), search.clone(), 3).query("q").await.unwrap();

        assert_eq!(result.rounds.len(), 3);
        assert_eq!(result.stop_reason, StopReason::IterationCap);
        assert_eq!(search.queries().len(), 3);
        assert_eq!(result.answer, "final answer");
        // 3 analyses + 3 decisions + 1 synthesis
        assert_eq!(llm.prompts().len(), 7);
        // The capped round's keywords are not accumulated.
        assert_eq!(result.cumulative_keywords, "x, x");
    }

    #[tokio::test]
    async fn test_stops_on_no() {
        let llm = Arc::new(ScriptedLlm::always("필요여부: NO\n키워드: y", 10));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm, search.clone(), 3).query("q").await.unwrap();

        assert_eq!(result.rounds.len(), 1);
        assert_eq!(result.stop_reason, StopReason::Satisfied);
        assert_eq!(result.cumulative_keywords, "");
    }

    #[tokio::test]
    async fn test_stops_on_sentinel_keywords() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(YES_X.to_string()),
            Ok("필요여부: Yes\n키워드: 없음".to_string()),
        ]));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm, search, 5).query("q").await.unwrap();

        assert_eq!(result.rounds.len(), 2);
        assert_eq!(result.stop_reason, StopReason::Satisfied);
        assert_eq!(result.rounds[1].decision, Some(Decision::stop()));
    }

    #[tokio::test]
    async fn test_yes_without_keywords_stops() {
        let llm = Arc::new(ScriptedLlm::always("필요여부: Yes\n키워드:", 10));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm, search, 3).query("q").await.unwrap();

        assert_eq!(result.rounds.len(), 1);
        assert_eq!(result.stop_reason, StopReason::NoKeywords);
    }

    #[tokio::test]
    async fn test_malformed_decision_fails_safe() {
        let llm = Arc::new(ScriptedLlm::always("필요여부: Yes", 10));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm, search, 3).query("q").await.unwrap();

        assert_eq!(result.rounds.len(), 1);
        assert_eq!(result.stop_reason, StopReason::MalformedDecision);
        assert!(result.rounds[0].decision.is_none());
        assert_eq!(result.answer, "final answer");
    }

    #[tokio::test]
    async fn test_keywords_accumulate_in_order() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("필요여부: Yes\n키워드: ab, cd".to_string()),
            Ok("필요여부: Yes\n키워드: ab".to_string()),
            Ok("필요여부: No\n키워드: 없음".to_string()),
        ]));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm.clone(), search.clone(), 5).query("러스트").await.unwrap();

        assert_eq!(
            search.queries(),
            vec!["러스트", "러스트 ab, cd", "러스트 ab, cd, ab"]
        );
        assert_eq!(result.cumulative_keywords, "ab, cd, ab");
        assert_eq!(result.rounds[0].cumulative_keywords, "ab, cd");
        assert_eq!(result.rounds[1].cumulative_keywords, "ab, cd, ab");
        assert_eq!(result.rounds[2].cumulative_keywords, "ab, cd, ab");

        let prompts = llm.prompts();
        assert!(prompts[0].contains("키워드: \n"));
        assert!(prompts[2].contains("키워드: ab, cd\n"));
    }

    #[tokio::test]
    async fn test_synthesis_sees_every_round_in_order() {
        let llm = Arc::new(ScriptedLlm::always(YES_X, 10));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm.clone(), search, 3).query("q").await.unwrap();

        let expected = "\n반복 1 분석:\nanalysis 1\n\n반복 2 분석:\nanalysis 2\n\n반복 3 분석:\nanalysis 3\n";
        assert_eq!(result.full_analysis, expected);

        let prompts = llm.prompts();
        let synthesis = prompts.last().unwrap();
        assert!(synthesis.contains(&format!("전체 분석 내용: {}", expected)));
    }

    #[tokio::test]
    async fn test_single_round_cap() {
        let llm = Arc::new(ScriptedLlm::always(YES_X, 10));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm, search, 1).query("q").await.unwrap();

        assert_eq!(result.rounds.len(), 1);
        assert_eq!(result.stop_reason, StopReason::IterationCap);
    }

    #[tokio::test]
    async fn test_search_failure_aborts_turn() {
        let llm = Arc::new(ScriptedLlm::always(YES_X, 10));
        let search = Arc::new(ScriptedSearch {
            fail_on_call: Some(2),
            ..Default::default()
        });
        let err = engine(llm.clone(), search, 3).query("q").await.err().unwrap();

        assert_eq!(err.stage, Stage::Search { round: 2 });
        assert!(matches!(err.source, ServiceError::RateLimited));
        // No synthesis was attempted.
        assert!(!llm.prompts().iter().any(|p| p.contains("최종 응답:")));
    }

    #[tokio::test]
    async fn test_decision_failure_aborts_turn() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(ServiceError::Unauthorized)]));
        let search = Arc::new(ScriptedSearch::default());
        let err = engine(llm, search, 3).query("q").await.err().unwrap();

        assert_eq!(err.stage, Stage::Decision { round: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_timeout() {
        let llm = Arc::new(ScriptedLlm::always(YES_X, 10));
        let search = Arc::new(ScriptedSearch {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        let err = engine(llm, search, 3).query("q").await.err().unwrap();

        assert_eq!(err.stage, Stage::Search { round: 1 });
        assert!(matches!(err.source, ServiceError::Timeout));
    }

    #[tokio::test]
    async fn test_quoted_keywords_reach_search_verbatim() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("필요여부: Yes\n키워드: \"ab\", \"cd\"".to_string()),
            Ok("필요여부: No\n키워드: 없음".to_string()),
        ]));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm, search.clone(), 3).query("q").await.unwrap();

        assert_eq!(search.queries(), vec!["q", "q \"ab\", \"cd\""]);
        assert_eq!(result.cumulative_keywords, "\"ab\", \"cd\"");
    }

    #[tokio::test]
    async fn test_leading_blank_line_decision_stops() {
        let llm = Arc::new(ScriptedLlm::always("\n필요여부: Yes\n키워드: x", 10));
        let search = Arc::new(ScriptedSearch::default());
        let result = engine(llm, search.clone(), 3).query("q").await.unwrap();

        assert_eq!(result.rounds.len(), 1);
        assert_eq!(result.stop_reason, StopReason::MalformedDecision);
        assert_eq!(result.cumulative_keywords, "");
        assert_eq!(search.queries(), vec!["q"]);
    }

    #[test]
    fn test_round_state_search_query() {
        let mut state = RoundState::default();
        assert_eq!(state.search_query("q"), "q");
        state.advance("a, b");
        state.advance("c");
        assert_eq!(state.iteration, 2);
        assert_eq!(state.search_query("q"), "q a, b, c");
    }
}
