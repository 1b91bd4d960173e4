// engine_http.rs — HttpEngine: OpenAI-compatible reasoning-engine client.
//
// Blocking reqwest on purpose: the driver already runs the engine call on
// its own worker thread under the turn timeout, so async buys nothing
// here. The endpoint receives the tool menu as chat tools and must answer
// with at most one tool call per turn.

use anyhow::Context;
use serde_json::{json, Value};

use mk_driver::{ActionRequest, DriverError, ProposedAction, ReasoningEngine};

const SYSTEM_PROMPT: &str = "You are the planning engine of an autonomous coding agent. \
You receive one goal, a reliability-ordered tool menu, and pending anomalies. \
Respond with exactly one tool call, or plain text to note an observation, \
or the single word IDLE to skip the turn, or RESTART to request a clean restart.";

pub struct HttpEngine {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEngine {
    pub fn new(url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            url: url.into(),
            model: model.into(),
            api_key,
        }
    }

    fn chat(&self, body: &Value) -> anyhow::Result<Value> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().context("engine request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("engine returned {}", status);
        }
        response.json().context("engine response was not JSON")
    }
}

impl ReasoningEngine for HttpEngine {
    fn propose(&self, request: &ActionRequest) -> Result<ProposedAction, DriverError> {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|offer| {
                json!({
                    "type": "function",
                    "function": {
                        "name": offer.name,
                        "description": format!(
                            "{} (reliability {:.2})",
                            offer.description, offer.score
                        ),
                        "parameters": offer.schema,
                    }
                })
            })
            .collect();

        let context = serde_json::to_value(request)
            .map_err(|e| DriverError::Engine(format!("request serialization: {}", e)))?;
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": context.to_string()},
            ],
            "tools": tools,
            "tool_choice": "auto",
        });

        let response = self
            .chat(&body)
            .map_err(|e| DriverError::Engine(e.to_string()))?;
        let message = &response["choices"][0]["message"];

        if let Some(call) = message["tool_calls"].get(0) {
            let name = call["function"]["name"]
                .as_str()
                .ok_or_else(|| DriverError::Engine("tool call without a name".to_string()))?
                .to_string();
            let arguments = call["function"]["arguments"].as_str().unwrap_or("{}");
            let params: Value = serde_json::from_str(arguments)
                .map_err(|e| DriverError::Engine(format!("bad tool arguments: {}", e)))?;
            return Ok(ProposedAction::ToolCall { name, params });
        }

        match message["content"].as_str().map(str::trim) {
            Some("IDLE") | Some("") | None => Ok(ProposedAction::Idle),
            Some("RESTART") => Ok(ProposedAction::Restart),
            Some(text) => Ok(ProposedAction::Note(text.to_string())),
        }
    }
}
