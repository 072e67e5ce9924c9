//! Newline-delimited JSON over stdin/stdout.
//!
//! One request object per line, one response object per line. Requests run
//! concurrently, so responses come back in completion order; clients match
//! them by `id`. Logging must stay on stderr.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatch::{InvokeError, InvokeResponse, InvokeStatus};
use crate::error::{OsintError, Result};
use crate::server::OsintServer;
use crate::tools::ToolResult;

#[derive(Clone, Debug, Deserialize)]
pub struct StdioRequest {
    #[serde(default)]
    pub id: Value,
    pub tool: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StdioResponse {
    pub id: Value,
    pub status: InvokeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub result: ToolResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InvokeError>,
}

impl StdioResponse {
    fn from_invoke(id: Value, response: InvokeResponse) -> Self {
        Self {
            id,
            status: response.status,
            tool: Some(response.tool),
            result: response.result,
            error: response.error,
        }
    }

    fn rejected(id: Value, err: &OsintError) -> Self {
        let response = InvokeResponse::failure("", err);
        Self {
            id,
            status: response.status,
            tool: None,
            result: response.result,
            error: response.error,
        }
    }
}

/// Parses one line. Errors carry the request id when it could be recovered.
fn parse_request(line: &str) -> std::result::Result<StdioRequest, (Value, OsintError)> {
    let value: Value = serde_json::from_str(line)
        .map_err(|_| (Value::Null, OsintError::invalid_input("request is not valid JSON")))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    if !value.is_object() {
        return Err((id, OsintError::invalid_input("request must be a JSON object")));
    }
    serde_json::from_value(value)
        .map_err(|_| (id, OsintError::invalid_input("request must contain a string `tool`")))
}

pub async fn serve_stdio(server: OsintServer) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    serve(server, reader, writer).await
}

pub async fn serve<R, W>(server: OsintServer, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("stdio transport started");
    let mut lines = reader.lines();
    let mut pending: FuturesUnordered<JoinHandle<StdioResponse>> = FuturesUnordered::new();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_request(line) {
                        Ok(request) => {
                            debug!(tool = %request.tool, "stdio request");
                            let server = server.clone();
                            pending.push(tokio::spawn(async move {
                                let response = server
                                    .invoke(&request.tool, request.params, request.api_key.as_deref())
                                    .await;
                                StdioResponse::from_invoke(request.id, response)
                            }));
                        }
                        Err((id, err)) => {
                            warn!(error = %err, "rejected stdio request");
                            write_line(&mut writer, &StdioResponse::rejected(id, &err)).await?;
                        }
                    }
                }
                Ok(None) => input_open = false,
                Err(err) => {
                    error!(error = %err, "failed to read stdin");
                    input_open = false;
                }
            },
            Some(joined) = pending.next(), if !pending.is_empty() => match joined {
                Ok(response) => write_line(&mut writer, &response).await?,
                Err(err) => error!(error = %err, "request task failed"),
            },
            else => break,
        }
    }

    writer.flush().await.map_err(|e| OsintError::Other(e.into()))?;
    info!("stdio transport stopped");
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, response: &StdioResponse) -> Result<()> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| OsintError::Other(e.into()))?;
    writer.flush().await.map_err(|e| OsintError::Other(e.into()))
}
