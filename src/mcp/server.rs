use crate::error::{AccordError, Result};
use crate::mcp::tools::ToolBox;
use crate::mcp::types::*;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};

/// MCP Server implementation
pub struct McpServer {
    toolbox: Arc<ToolBox>,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(toolbox: Arc<ToolBox>) -> Self {
        Self { toolbox }
    }

    /// Process one JSON-RPC message
    ///
    /// # Returns
    /// * `Some(response)` - Response to send back to client
    /// * `None` - Notification (no response needed)
    pub async fn process_mcp_request(&self, request: Request, initialized: &mut bool) -> Option<Response> {
        // Notifications carry no ID and get no response
        let Some(id) = request.id else {
            if request.method == "notifications/initialized" {
                *initialized = true;
            }
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "shutdown" => Response::result(id, Value::Null),
            other => Response::error(id, METHOD_NOT_FOUND, format!("Unknown method: {}", other)),
        };

        Some(response)
    }

    /// Run the MCP server (reads from stdin, writes to stdout)
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdin_reader = AsyncBufReader::new(stdin);
        let mut stdout = tokio::io::stdout();

        let mut line = String::new();
        let mut initialized = false;

        log::info!(
            "Accord MCP server v{} starting with {} tool(s)",
            env!("CARGO_PKG_VERSION"),
            self.toolbox.len()
        );

        loop {
            line.clear();
            let bytes_read = stdin_reader.read_line(&mut line).await.map_err(|e| {
                AccordError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to read from stdin: {}", e),
                ))
            })?;

            // EOF - client disconnected
            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: Request = match serde_json::from_str(trimmed) {
                Ok(req) => req,
                Err(e) => {
                    if let Some(id) = extract_id_from_line(trimmed) {
                        let response = Response::error(id, PARSE_ERROR, format!("Parse error: {}", e));
                        send_response(&mut stdout, &response).await?;
                    }
                    continue;
                }
            };

            if let Some(response) = self.process_mcp_request(request, &mut initialized).await {
                send_response(&mut stdout, &response).await?;
            } else if initialized {
                log::debug!("Client initialized");
            }
        }

        log::info!("MCP server shutting down");
        Ok(())
    }

    fn handle_initialize(&self, id: Value) -> Response {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION,
            capabilities: Capabilities::default(),
            server_info: ServerInfo {
                name: "accord",
                version: env!("CARGO_PKG_VERSION"),
            },
        };
        result_response(id, &result)
    }

    fn handle_tools_list(&self, id: Value) -> Response {
        let result = ToolList {
            tools: self.toolbox.definitions(),
        };
        result_response(id, &result)
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> Response {
        let params: CallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return Response::error(id, INVALID_PARAMS, format!("Invalid tools/call params: {}", e));
            }
        };

        match self.toolbox.call(&params.name, &params.arguments.query).await {
            Ok(result) => result_response(id, &result),
            Err(e @ AccordError::Tool(_)) => Response::error(id, INVALID_PARAMS, e.to_string()),
            Err(e) => Response::error(id, INTERNAL_ERROR, format!("Internal error: {}", e)),
        }
    }
}

fn result_response<T: serde::Serialize>(id: Value, result: &T) -> Response {
    match serde_json::to_value(result) {
        Ok(value) => Response::result(id, value),
        Err(e) => Response::error(id, INTERNAL_ERROR, format!("JSON serialization error: {}", e)),
    }
}

/// Send JSON-RPC response to stdout (newline-delimited)
async fn send_response(stdout: &mut tokio::io::Stdout, response: &Response) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| AccordError::Tool(format!("JSON serialization error: {}", e)))?;
    stdout.write_all(json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Extract ID from JSON line (for error handling)
fn extract_id_from_line(line: &str) -> Option<Value> {
    if let Some(id_start) = line.find(r#""id":"#) {
        let id_str = &line[id_start + 5..];
        if let Some(id_end) = id_str.find(',') {
            let id_val = id_str[..id_end].trim();
            if id_val.starts_with('"') && id_val.ends_with('"') && id_val.len() >= 2 {
                return Some(Value::String(id_val[1..id_val.len() - 1].to_string()));
            } else if let Ok(num) = id_val.parse::<i64>() {
                return Some(Value::Number(num.into()));
            }
        }
    }
    None
}
