//! EpicMe MCP resource server
//!
//! Demonstrates:
//! - Token introspection against the EpicMe authorization server
//! - Protected Resource Metadata at `/.well-known/oauth-protected-resource/mcp`
//! - Per-tool scope checks with `ScopePolicy` inside the handler
//!
//! Run with: cargo run --example epicme_server
//!
//! Test with curl:
//!
//! ```bash
//! # 1. Discover the authorization server (public endpoint)
//! curl http://localhost:8787/.well-known/oauth-protected-resource/mcp
//!
//! # 2. Attempt without token (returns 401 with WWW-Authenticate header)
//! curl -v -X POST http://localhost:8787/mcp \
//!   -H "Content-Type: application/json" \
//!   -d '{"jsonrpc":"2.0","id":1,"method":"tools/list"}'
//!
//! # 3. Request with a token issued by the authorization server
//! curl -X POST http://localhost:8787/mcp \
//!   -H "Content-Type: application/json" \
//!   -H "Authorization: Bearer <token>" \
//!   -d '{"jsonrpc":"2.0","id":1,"method":"tools/list"}'
//! ```

use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use mcp_resource_gate::oauth::{AuthInfo, ScopePolicy};
use mcp_resource_gate::{GateConfig, ResourceServer};
use serde::Deserialize;
use serde_json::{Value, json};

const TOOLS: [&str; 6] = [
    "whoami",
    "list_entries",
    "create_entry",
    "delete_entry",
    "list_tags",
    "create_tag",
];

fn scope_policy() -> ScopePolicy {
    ScopePolicy::new()
        .tool_scope("whoami", "user:read")
        .tool_scope("list_entries", "entries:read")
        .tool_scope("create_entry", "entries:write")
        .tool_scope("delete_entry", "entries:write")
        .tool_scope("list_tags", "tags:read")
        .tool_scope("create_tag", "tags:write")
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

async fn mcp(auth: AuthInfo, Json(request): Json<RpcRequest>) -> Response {
    let policy = scope_policy();

    match request.method.as_str() {
        "tools/list" => {
            let tools: Vec<Value> = TOOLS
                .iter()
                .filter(|name| policy.permits_tool(name, &auth))
                .map(|name| json!({ "name": name }))
                .collect();
            Json(json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "result": { "tools": tools }
            }))
            .into_response()
        }
        "tools/call" => {
            let name = request.params["name"].as_str().unwrap_or_default();
            if let Err(error) = policy.check_tool(name, &auth) {
                tracing::info!(tool = name, subject = %auth.subject(), "Tool call denied");
                let challenge = error.challenge("EpicMe", None);
                return error.into_response_with(challenge);
            }
            Json(json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "result": {
                    "content": [{
                        "type": "text",
                        "text": format!("{name} called by user {}", auth.subject())
                    }]
                }
            }))
            .into_response()
        }
        other => Json(json!({
            "jsonrpc": "2.0",
            "id": request.id,
            "error": { "code": -32601, "message": format!("Method not found: {other}") }
        }))
        .into_response(),
    }
}

#[tokio::main]
async fn main() -> Result<(), mcp_resource_gate::BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mcp_resource_gate=debug".parse()?)
                .add_directive("epicme_server=debug".parse()?),
        )
        .init();

    let config = GateConfig::from_env()?;
    tracing::info!(
        auth_server = %config.auth_server(),
        introspection = %config.introspection_endpoint(),
        "Using authorization server"
    );
    let server = ResourceServer::new(config)?;

    let protected = Router::new().route("/mcp", post(mcp));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8787").await?;
    tracing::info!("EpicMe MCP server listening on http://127.0.0.1:8787/mcp");
    tracing::info!(
        "Protected Resource Metadata: http://127.0.0.1:8787/.well-known/oauth-protected-resource/mcp"
    );
    server.serve(listener, protected).await?;

    Ok(())
}
