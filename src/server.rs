//! MCP server exposing the sandbox as the `regexp-match` tool.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::handler::server::ServerHandler;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::service::RequestContext;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use rmcp::{tool, tool_handler, tool_router, RoleServer};
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;

use crate::model::{MatchRequest, WireResult};
use crate::sandbox::executor::PatternSandbox;
use crate::tool::run_match_cancellable;

/// Largest accepted HTTP request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Path the MCP endpoint is served under.
pub const MCP_PATH: &str = "/mcp";

/// MCP service wrapping a shared [`PatternSandbox`].
#[derive(Debug, Clone)]
pub struct RegexMatchServer {
    sandbox: Arc<PatternSandbox>,
    timeout: Duration,
    tool_router: ToolRouter<Self>,
}

impl RegexMatchServer {
    /// Create a server whose tool calls each get `timeout` to complete.
    pub fn new(sandbox: Arc<PatternSandbox>, timeout: Duration) -> Self {
        Self {
            sandbox,
            timeout,
            tool_router: Self::tool_router(),
        }
    }

    async fn answer(&self, request: MatchRequest, cancel: &CancellationToken) -> WireResult {
        run_match_cancellable(&self.sandbox, request, self.timeout, cancel).await
    }
}

#[tool_router]
impl RegexMatchServer {
    /// Match text against a regular expression inside the sandbox.
    ///
    /// Matching errors are reported in the `error` field of a successful
    /// response, never as a protocol error.
    /// The call is abandoned when the client cancels the request.
    #[tool(
        name = "regexp-match",
        title = "Regular Expression Matcher",
        description = "Tool to match text against a regular expression."
    )]
    async fn regexp_match(
        &self,
        Parameters(request): Parameters<MatchRequest>,
        context: RequestContext<RoleServer>,
    ) -> Json<WireResult> {
        Json(self.answer(request, &context.ct).await)
    }
}

#[tool_handler]
impl ServerHandler for RegexMatchServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Regular Expression Matcher. Call regexp-match with a pattern and a text; \
                 the response carries is_match and an error string that is empty on success."
                    .to_string(),
            ),
        }
    }
}

/// HTTP router serving the stateless streamable MCP transport at [`MCP_PATH`].
pub fn router(server: RegexMatchServer) -> Router {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            stateful_mode: false,
            ..Default::default()
        },
    );

    Router::new()
        .nest_service(MCP_PATH, service)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}
