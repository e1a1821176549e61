//! MCP JSON-RPC protocol over stdio.
//!
//! One request per line in, one response per line out. Tool calls run
//! concurrently; responses are written in completion order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinSet,
};
use tracing::{debug, error, info, warn};
use weather_core::WeatherTools;

/// MCP Protocol version
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl ServerError {
    fn code(&self) -> i32 {
        match self {
            ServerError::UnknownTool(_) | ServerError::InvalidArguments(_) => INVALID_PARAMS,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
            }),
        }
    }
}

/// Tool definition for MCP
#[derive(Debug, Serialize)]
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    CurrentWeather,
    WeatherForecast,
    WeatherAlerts,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CurrentWeather => "get_current_weather",
            ToolName::WeatherForecast => "get_weather_forecast",
            ToolName::WeatherAlerts => "get_weather_alerts",
        }
    }

    pub const fn all() -> &'static [ToolName] {
        &[
            ToolName::CurrentWeather,
            ToolName::WeatherForecast,
            ToolName::WeatherAlerts,
        ]
    }

    fn description(&self) -> &'static str {
        match self {
            ToolName::CurrentWeather => "Gets current weather conditions for the specified city.",
            ToolName::WeatherForecast => "Gets a 3-day weather forecast for the specified city.",
            ToolName::WeatherAlerts => {
                "Gets simulated weather alerts (high chance of precipitation) for the specified city."
            }
        }
    }
}

impl TryFrom<&str> for ToolName {
    type Error = ServerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ToolName::all()
            .iter()
            .copied()
            .find(|tool| tool.as_str() == value)
            .ok_or_else(|| ServerError::UnknownTool(value.to_string()))
    }
}

/// Arguments shared by every weather tool.
#[derive(Debug, Deserialize)]
struct LocationArgs {
    city: String,
    #[serde(default, rename = "countryCode", alias = "country_code")]
    country_code: Option<String>,
}

fn location_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "city": {
                "type": "string",
                "description": "The city name to get weather for"
            },
            "countryCode": {
                "type": "string",
                "description": "Optional: Country code (e.g., 'US', 'UK')"
            }
        },
        "required": ["city"]
    })
}

#[derive(Debug)]
pub struct WeatherServer {
    tools: WeatherTools,
}

impl WeatherServer {
    pub fn new(tools: WeatherTools) -> Self {
        Self { tools }
    }

    fn tool_definitions() -> Vec<Tool> {
        ToolName::all()
            .iter()
            .map(|tool| Tool {
                name: tool.as_str(),
                description: tool.description(),
                input_schema: location_schema(),
            })
            .collect()
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, ServerError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidArguments("missing tool name".to_string()))?;
        let tool = ToolName::try_from(name)?;

        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        let args: LocationArgs = serde_json::from_value(arguments)
            .map_err(|e| ServerError::InvalidArguments(e.to_string()))?;

        let city = args.city.trim();
        if city.is_empty() {
            return Err(ServerError::InvalidArguments("city must not be empty".to_string()));
        }
        let country_code = args.country_code.as_deref();

        let text = match tool {
            ToolName::CurrentWeather => self.tools.get_current_weather(city, country_code).await,
            ToolName::WeatherForecast => self.tools.get_weather_forecast(city, country_code).await,
            ToolName::WeatherAlerts => self.tools.get_weather_alerts(city, country_code).await,
        };

        Ok(json!({
            "content": [{
                "type": "text",
                "text": text
            }],
            "isError": false
        }))
    }

    /// Handle a single JSON-RPC request. Notifications get no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(request.id, self.handle_initialize()),
            "initialized" | "notifications/initialized" => return None,
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                request.id,
                json!({ "tools": Self::tool_definitions() }),
            ),
            "tools/call" => match self.handle_tools_call(request.params).await {
                Ok(result) => JsonRpcResponse::success(request.id, result),
                Err(e) => {
                    warn!("Tool call rejected: {e}");
                    JsonRpcResponse::error(request.id, e.code(), &e.to_string())
                }
            },
            _ => {
                warn!("Unknown method: {}", request.method);
                JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    &format!("Method not found: {}", request.method),
                )
            }
        };

        response.id.is_some().then_some(response)
    }

    /// Parse one protocol line and handle it.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                error!("Failed to parse request: {e}");
                Some(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error"))
            }
        }
    }

    /// Serve requests from `reader` until EOF, writing responses to `writer`.
    pub async fn run<R, W>(self: Arc<Self>, mut reader: R, writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut in_flight = JoinSet::new();
        let mut buf = Vec::new();

        while reader.read_until(b'\n', &mut buf).await? > 0 {
            let line = match String::from_utf8(std::mem::take(&mut buf)) {
                Ok(line) => line,
                Err(e) => {
                    error!("Request is not valid UTF-8: {e}");
                    let _ = tx.send(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error"));
                    continue;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("Received: {line}");
            let line = line.to_string();

            let server = Arc::clone(&self);
            let tx = tx.clone();
            in_flight.spawn(async move {
                if let Some(response) = server.handle_line(&line).await {
                    // The writer only goes away on a write error, which `run` reports below.
                    let _ = tx.send(response);
                }
            });
        }

        while in_flight.join_next().await.is_some() {}
        drop(tx);

        writer_task.await??;
        info!("Input closed, MCP server stopping");
        Ok(())
    }

    /// Run the MCP server over stdio.
    pub async fn run_stdio(self: Arc<Self>) -> anyhow::Result<()> {
        info!("MCP server ready, listening on stdio...");
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.run(stdin, tokio::io::stdout()).await
    }
}

async fn write_responses<W>(
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
    mut writer: W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let response_json = serde_json::to_string(&response)?;
        debug!("Sending: {response_json}");
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
