use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use crate::research::{ResearchEngine, ResearchResponse};

/// Input that ends the session ("quit").
pub const EXIT_SENTINEL: &str = "종료";

const RULE_WIDTH: usize = 50;

/// Counts of what a session did, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub answered: u32,
    pub failed: u32,
}

/// Interactive read-eval loop over a line reader and a writer.
pub struct Session<'a> {
    engine: &'a ResearchEngine,
}

impl<'a> Session<'a> {
    pub fn new(engine: &'a ResearchEngine) -> Self {
        Self { engine }
    }

    /// Read queries until the exit sentinel or end of input.
    ///
    /// A failed turn is reported and the loop continues. Only I/O errors on
    /// the reader or writer end the session with an error.
    pub async fn run<R, W>(&self, input: R, output: &mut W) -> Result<SessionSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut summary = SessionSummary::default();
        let mut lines = input.lines();

        write_out(
            output,
            &format!(
                "누적 검색 결과를 활용하는 AI 검색 시스템에 오신 것을 환영합니다!\n\
                 '{}'를 입력하면 프로그램이 종료됩니다.\n",
                EXIT_SENTINEL
            ),
        )
        .await?;

        loop {
            write_out(output, "\n질문을 입력하세요: ").await?;

            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                info!("Input closed");
                break;
            };

            if line == EXIT_SENTINEL {
                write_out(output, "프로그램을 종료합니다. 감사합니다!\n").await?;
                break;
            }

            // Blank input is a no-op turn; anything else is passed through as typed
            if line.trim().is_empty() {
                continue;
            }
            let query = line.as_str();

            match self.engine.query(query).await {
                Ok(response) => {
                    summary.answered += 1;
                    info!(
                        rounds = response.rounds.len(),
                        stop_reason = ?response.stop_reason,
                        cumulative_keywords = %response.cumulative_keywords,
                        analysis_len = response.full_analysis.len(),
                        "Turn answered"
                    );
                    let transcript = render_response(query, &response, self.engine.max_iterations());
                    write_out(output, &transcript).await?;
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(error = %e, "Research turn failed");
                    write_out(output, &format!("오류가 발생했습니다: {}\n", e)).await?;
                }
            }

            write_out(
                output,
                &format!(
                    "\n다음 질문을 입력하거나 '{}'를 입력하여 프로그램을 종료할 수 있습니다.\n",
                    EXIT_SENTINEL
                ),
            )
            .await?;
        }

        info!(answered = summary.answered, failed = summary.failed, "Session ended");
        Ok(summary)
    }
}

async fn write_out<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output
        .write_all(text.as_bytes())
        .await
        .context("Failed to write output")?;
    output.flush().await.context("Failed to flush output")?;
    Ok(())
}

/// Render one answered turn: every round's analysis and verdict, then the answer.
fn render_response(query: &str, response: &ResearchResponse, max_iterations: u32) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = format!("\n질문: {}\n", query);

    for record in &response.rounds {
        out.push_str(&format!(
            "\n{}\n검색어: {}\n분석 결과 (반복 {}/{}):\n{}\n",
            rule, record.search_query, record.round, max_iterations, record.analysis
        ));

        match &record.decision {
            Some(decision) => {
                out.push_str(&format!(
                    "추가 검색 필요: {}\n",
                    if decision.needs_more { "예" } else { "아니오" }
                ));
                out.push_str(&format!("추가 검색 키워드: {}\n", decision.keywords));
            }
            None => out.push_str("추가 검색 필요: 아니오 (판단 형식 오류)\n"),
        }

        if !record.cumulative_keywords.is_empty() {
            out.push_str(&format!("누적 검색 키워드: {}\n", record.cumulative_keywords));
        }
    }

    out.push_str(&format!("\n{}\n최종 응답:\n{}\n{}\n", rule, response.answer, rule));
    out
}
