//! HTTP-backed lookup tools: web search, Wikipedia, weather, WolframAlpha.
//!
//! Each handler turns recognised upstream failures into readable strings so
//! the model can route around them instead of aborting the loop.

use crate::env::get_env_var;
use crate::error::Result;
use crate::traits::{parse_arguments, require_f64, require_string, LocalTool};
use async_trait::async_trait;
use confab_llm::{build_tool, BoxError, Tool, ToolHandler, ToolParam};
use serde_json::Value;

const DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";
const WIKIPEDIA_SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";
const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
const WOLFRAM_RESULT_URL: &str = "https://api.wolframalpha.com/v1/result";

pub const WOLFRAM_APP_ID_VAR: &str = "WOLFRAM_APP_ID";

/// DuckDuckGo instant-answer search.
pub struct WebSearchTool {
    http: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn search(&self, query: &str) -> Result<String> {
        let response = self
            .http
            .get(DUCKDUCKGO_URL)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(format!("Error: search request failed with status {status}"));
        }
        let value: Value = response.json().await?;
        Ok(summarize_search(&value, query))
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize_search(value: &Value, query: &str) -> String {
    if let Some(abstract_text) = value["AbstractText"].as_str() {
        if !abstract_text.is_empty() {
            return abstract_text.to_string();
        }
    }
    if let Some(answer) = value["Answer"].as_str() {
        if !answer.is_empty() {
            return answer.to_string();
        }
    }
    let mut lines = Vec::new();
    if let Some(topics) = value["RelatedTopics"].as_array() {
        for topic in topics.iter().take(5) {
            if let Some(text) = topic["Text"].as_str() {
                lines.push(format!("- {text}"));
            }
        }
    }
    if lines.is_empty() {
        format!("No instant answer found for \"{query}\".")
    } else {
        lines.join("\n")
    }
}

#[async_trait]
impl ToolHandler for WebSearchTool {
    #[tracing::instrument(level = "info", skip_all)]
    async fn call(&self, arguments: &str) -> std::result::Result<String, BoxError> {
        let args = parse_arguments(arguments)?;
        let query = require_string(&args, "query")?;
        match self.search(&query).await {
            Ok(out) => Ok(out),
            Err(e) => Ok(format!("Error: {e}")),
        }
    }
}

impl LocalTool for WebSearchTool {
    fn schema(&self) -> Tool {
        build_tool(
            "web_search",
            "Search the web and return an instant-answer summary.",
            &[ToolParam::new("query", "string", "Search terms.", true)],
        )
    }
}

/// Wikipedia article summary lookup.
pub struct WikipediaTool {
    http: reqwest::Client,
}

impl WikipediaTool {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn lookup(&self, title: &str) -> Result<String> {
        let url = format!("{WIKIPEDIA_SUMMARY_URL}/{}", title.trim().replace(' ', "_"));
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(format!("No Wikipedia article found for \"{title}\"."));
        }
        if !status.is_success() {
            return Ok(format!("Error: wikipedia request failed with status {status}"));
        }
        let value: Value = response.json().await?;
        Ok(summarize_page(&value, title))
    }
}

impl Default for WikipediaTool {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize_page(value: &Value, title: &str) -> String {
    match value["extract"].as_str() {
        Some(extract) if !extract.is_empty() => extract.to_string(),
        _ => format!("The article \"{title}\" has no summary."),
    }
}

#[async_trait]
impl ToolHandler for WikipediaTool {
    #[tracing::instrument(level = "info", skip_all)]
    async fn call(&self, arguments: &str) -> std::result::Result<String, BoxError> {
        let args = parse_arguments(arguments)?;
        let title = require_string(&args, "title")?;
        match self.lookup(&title).await {
            Ok(out) => Ok(out),
            Err(e) => Ok(format!("Error: {e}")),
        }
    }
}

impl LocalTool for WikipediaTool {
    fn schema(&self) -> Tool {
        build_tool(
            "wikipedia",
            "Look up the summary of an English Wikipedia article.",
            &[ToolParam::new("title", "string", "Article title.", true)],
        )
    }
}

/// Current conditions from the Open-Meteo forecast API.
pub struct WeatherTool {
    http: reqwest::Client,
}

impl WeatherTool {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn current(&self, latitude: f64, longitude: f64) -> Result<String> {
        let response = self
            .http
            .get(OPEN_METEO_URL)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(format!("Error: weather request failed with status {status}"));
        }
        let value: Value = response.json().await?;
        Ok(format_weather(&value))
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

fn format_weather(value: &Value) -> String {
    let current = &value["current_weather"];
    match (
        current["temperature"].as_f64(),
        current["windspeed"].as_f64(),
    ) {
        (Some(temperature), Some(windspeed)) => format!(
            "Current conditions: {temperature} degrees C, wind {windspeed} km/h."
        ),
        _ => "Error: weather response had no current conditions.".to_string(),
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    #[tracing::instrument(level = "info", skip_all)]
    async fn call(&self, arguments: &str) -> std::result::Result<String, BoxError> {
        let args = parse_arguments(arguments)?;
        let latitude = require_f64(&args, "latitude")?;
        let longitude = require_f64(&args, "longitude")?;
        match self.current(latitude, longitude).await {
            Ok(out) => Ok(out),
            Err(e) => Ok(format!("Error: {e}")),
        }
    }
}

impl LocalTool for WeatherTool {
    fn schema(&self) -> Tool {
        build_tool(
            "weather",
            "Current weather conditions for a coordinate pair.",
            &[
                ToolParam::new("latitude", "number", "Latitude in decimal degrees.", true),
                ToolParam::new("longitude", "number", "Longitude in decimal degrees.", true),
            ],
        )
    }
}

/// WolframAlpha short-answer queries. Reads the app id from the
/// environment at call time so a missing key degrades to a readable reply.
pub struct WolframTool {
    http: reqwest::Client,
}

impl WolframTool {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn query(&self, app_id: &str, input: &str) -> Result<String> {
        let response = self
            .http
            .get(WOLFRAM_RESULT_URL)
            .query(&[("appid", app_id), ("i", input)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status.as_u16() == 501 {
            // Wolfram's "no short answer available" status.
            return Ok(format!("WolframAlpha has no short answer for \"{input}\"."));
        }
        if !status.is_success() {
            return Ok(format!("Error: wolfram request failed with status {status}"));
        }
        Ok(body)
    }
}

impl Default for WolframTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for WolframTool {
    #[tracing::instrument(level = "info", skip_all)]
    async fn call(&self, arguments: &str) -> std::result::Result<String, BoxError> {
        let args = parse_arguments(arguments)?;
        let input = require_string(&args, "query")?;
        let app_id = match get_env_var(WOLFRAM_APP_ID_VAR) {
            Ok(v) => v,
            Err(e) => return Ok(format!("Error: {e}")),
        };
        match self.query(&app_id, &input).await {
            Ok(out) => Ok(out),
            Err(e) => Ok(format!("Error: {e}")),
        }
    }
}

impl LocalTool for WolframTool {
    fn schema(&self) -> Tool {
        build_tool(
            "wolfram",
            "Ask WolframAlpha for a short computed answer.",
            &[ToolParam::new("query", "string", "Question to compute.", true)],
        )
    }
}
