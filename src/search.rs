//! Web search through the Serper Google Search API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::ServiceError;

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
const NO_RESULT: &str = "No good Google Search Result was found";

/// A search service returning opaque result text for a query.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, ServiceError>;
}

pub struct SerperClient {
    client: reqwest::Client,
    api_key: String,
    num_results: usize,
    gl: String,
    hl: String,
}

impl SerperClient {
    pub fn new(config: &SearchConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            num_results: config.num_results,
            gl: config.gl.clone(),
            hl: config.hl.clone(),
        }
    }
}

#[async_trait]
impl WebSearch for SerperClient {
    async fn search(&self, query: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(SERPER_ENDPOINT)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({
                "q": query,
                "gl": self.gl,
                "hl": self.hl,
                "num": self.num_results,
            }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let results: Value = response.json().await?;
                let text = flatten_results(&results, self.num_results);
                debug!(query, result_len = text.len(), "Serper search");
                Ok(text)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(ServiceError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ServiceError::Unauthorized),
            status => Err(ServiceError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Flatten a Serper response into a single line of snippets.
///
/// A direct answer box wins outright. Otherwise the knowledge graph comes
/// first, followed by up to `limit` organic results.
fn flatten_results(results: &Value, limit: usize) -> String {
    if let Some(answer) = answer_box(&results["answerBox"]) {
        return answer;
    }

    let mut snippets: Vec<String> = Vec::new();

    let kg = &results["knowledgeGraph"];
    if kg.is_object() {
        let title = kg["title"].as_str().unwrap_or_default();
        if let Some(kind) = kg["type"].as_str() {
            snippets.push(format!("{}: {}.", title, kind));
        }
        if let Some(description) = kg["description"].as_str() {
            snippets.push(description.to_string());
        }
        if let Some(attrs) = kg["attributes"].as_object() {
            for (attr, value) in attrs {
                snippets.push(format!("{} {}: {}.", title, attr, plain(value)));
            }
        }
    }

    if let Some(organic) = results["organic"].as_array() {
        for result in organic.iter().take(limit) {
            if let Some(snippet) = result["snippet"].as_str() {
                snippets.push(snippet.to_string());
            }
            if let Some(attrs) = result["attributes"].as_object() {
                for (attr, value) in attrs {
                    snippets.push(format!("{}: {}.", attr, plain(value)));
                }
            }
        }
    }

    if snippets.is_empty() {
        NO_RESULT.to_string()
    } else {
        snippets.join(" ")
    }
}

fn answer_box(answer_box: &Value) -> Option<String> {
    if let Some(answer) = answer_box["answer"].as_str() {
        return Some(answer.to_string());
    }
    if let Some(snippet) = answer_box["snippet"].as_str() {
        return Some(snippet.replace('\n', " "));
    }
    let highlighted: Vec<&str> = answer_box["snippetHighlighted"]
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    (!highlighted.is_empty()).then(|| highlighted.join(" "))
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
