//! JSON-RPC stdio server loop

use crate::protocol::*;
use crate::tools;
use lgrep_core::config::Config;
use lgrep_core::embeddings::Embedder;
use lgrep_core::indexer::Indexer;
use lgrep_core::search::Searcher;
use lgrep_core::store::SqliteStore;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio_util::sync::CancellationToken;

/// Single-threaded request/response loop over line-delimited JSON on
/// stdio. Requests are handled serially; diagnostics go to stderr via
/// tracing so stdout stays clean for responses.
pub struct McpServer {
    store: Arc<SqliteStore>,
    searcher: Searcher,
    indexer: Indexer,
    initialized: bool,
}

impl McpServer {
    pub fn new(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>, config: Config) -> Self {
        let searcher = Searcher::new(store.clone(), embedder.clone());
        let indexer = Indexer::new(store.clone(), embedder, config);
        Self {
            store,
            searcher,
            indexer,
            initialized: false,
        }
    }

    /// Process requests until EOF on stdin or cancellation.
    pub async fn run(&mut self, token: &CancellationToken) -> lgrep_core::Result<()> {
        tracing::info!("MCP server starting");

        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut writer = BufWriter::new(stdout);
        let mut line = String::new();

        loop {
            line.clear();

            let bytes_read = tokio::select! {
                _ = token.cancelled() => return Err(lgrep_core::LgrepError::Cancelled),
                read = reader.read_line(&mut line) => read?,
            };

            if bytes_read == 0 {
                tracing::info!("MCP server received EOF, shutting down");
                return Ok(());
            }

            if let Some(response) = self.handle_line(token, &line).await {
                let json = serde_json::to_string(&response)?;
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
    }

    /// Whether the client has completed the initialize handshake.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Handle one input line. Whitespace-only lines and notifications
    /// produce no response.
    pub async fn handle_line(
        &mut self,
        token: &CancellationToken,
        line: &str,
    ) -> Option<JsonRpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(err) => {
                return Some(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    "Parse error",
                    Some(err.to_string()),
                ));
            }
        };

        self.handle_request(token, request).await
    }

    async fn handle_request(
        &mut self,
        token: &CancellationToken,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        tracing::debug!(method = %request.method, "received request");

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "initialized" => {
                // Notification; no response
                self.initialized = true;
                tracing::info!("MCP server initialized");
                return None;
            }
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(token, &request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                return Some(JsonRpcResponse::error(
                    request.id,
                    error_codes::METHOD_NOT_FOUND,
                    "Method not found",
                    Some(method.to_string()),
                ));
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(err) => JsonRpcResponse::error(
                request.id,
                error_codes::INTERNAL_ERROR,
                "Internal error",
                Some(err.to_string()),
            ),
        })
    }

    fn handle_initialize(&self) -> lgrep_core::Result<Value> {
        Ok(serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        }))
    }

    fn handle_tools_list(&self) -> lgrep_core::Result<Value> {
        let tools = vec![
            tools::search_tool_definition(),
            tools::index_tool_definition(),
        ];
        Ok(serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(
        &self,
        token: &CancellationToken,
        params: &Value,
    ) -> lgrep_core::Result<Value> {
        let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
        let default_args = serde_json::json!({});
        let args = params.get("arguments").unwrap_or(&default_args);

        tracing::debug!(tool = name, "calling tool");

        let result = match name {
            "lgrep_search" => {
                tools::handle_search(token, &self.store, &self.indexer, &self.searcher, args).await
            }
            "lgrep_index" => tools::handle_index(token, &self.store, &self.indexer, args).await,
            other => ToolResult::text(format!("Unknown tool: {}", other), true),
        };

        Ok(serde_json::to_value(result)?)
    }
}

/// Build and run the stdio server until EOF or cancellation.
pub async fn start_server(
    token: &CancellationToken,
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
    config: Config,
) -> lgrep_core::Result<()> {
    let mut server = McpServer::new(store, embedder, config);
    server.run(token).await
}
