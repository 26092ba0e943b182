//! Discovery helpers (spec §4.8, component I): paginated `tools/list`,
//! `resources/list`, `prompts/list`.
//!
//! No single teacher file owns this pattern; it is grounded on the
//! pagination idiom implied by `mcpc-protocol::discovery`'s lenient
//! `ListParams`/`next_cursor` shapes (themselves grounded on the
//! teacher's discovery result types) plus spec §4.8's loop description.

use mcpc_core::error::McpResult;
use mcpc_protocol::discovery::{ListParams, ListPromptsResult, ListResourcesResult, ListToolsResult, Prompt, Resource, Tool};
use mcpc_transport::Transport;

use crate::session::{RequestOptions, Session};

async fn paginate<F, Fut, R>(mut fetch: F) -> McpResult<Vec<R>>
where
    F: FnMut(ListParams) -> Fut,
    Fut: std::future::Future<Output = McpResult<(Vec<R>, Option<String>)>>,
{
    let mut out = Vec::new();
    let mut cursor = None;
    loop {
        let (mut page, next_cursor) = fetch(ListParams { cursor: cursor.clone() }).await?;
        out.append(&mut page);
        match next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }
    Ok(out)
}

/// Pages through `tools/list` until the server stops returning a cursor.
///
/// # Errors
/// Returns the first transport/protocol error encountered.
pub async fn list_tools<T: Transport + 'static>(session: &Session<T>) -> McpResult<Vec<Tool>> {
    paginate(|params| async {
        let params = serde_json::to_value(&params)?;
        let value = session.send_request("tools/list", Some(params), RequestOptions::default()).await?;
        let page: ListToolsResult = serde_json::from_value(value)?;
        Ok((page.tools, page.next_cursor))
    })
    .await
}

/// Pages through `resources/list` until the server stops returning a cursor.
///
/// # Errors
/// Returns the first transport/protocol error encountered.
pub async fn list_resources<T: Transport + 'static>(session: &Session<T>) -> McpResult<Vec<Resource>> {
    paginate(|params| async {
        let params = serde_json::to_value(&params)?;
        let value = session.send_request("resources/list", Some(params), RequestOptions::default()).await?;
        let page: ListResourcesResult = serde_json::from_value(value)?;
        Ok((page.resources, page.next_cursor))
    })
    .await
}

/// Pages through `prompts/list` until the server stops returning a cursor.
///
/// # Errors
/// Returns the first transport/protocol error encountered.
pub async fn list_prompts<T: Transport + 'static>(session: &Session<T>) -> McpResult<Vec<Prompt>> {
    paginate(|params| async {
        let params = serde_json::to_value(&params)?;
        let value = session.send_request("prompts/list", Some(params), RequestOptions::default()).await?;
        let page: ListPromptsResult = serde_json::from_value(value)?;
        Ok((page.prompts, page.next_cursor))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mcpc_protocol::capabilities::ClientCapabilities;
    use mcpc_protocol::initialization::Implementation;
    use mcpc_transport::{pair, InProcessHandler, DEFAULT_CHANNEL_CAPACITY};
    use std::sync::Arc;

    fn paged_tools_handler() -> InProcessHandler {
        Arc::new(|bytes: Bytes| {
            Box::pin(async move {
                let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
                let id = value.get("id")?.clone();
                let cursor = value.get("params").and_then(|p| p.get("cursor")).and_then(|c| c.as_str());
                let result = if cursor.is_none() {
                    serde_json::json!({"tools": [{"name": "tool1"}], "nextCursor": "page2"})
                } else {
                    serde_json::json!({"tools": [{"name": "tool2"}]})
                };
                let response = serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result});
                Some(Bytes::from(serde_json::to_vec(&response).ok()?))
            })
        })
    }

    #[tokio::test]
    async fn list_tools_concatenates_pages_in_order() {
        let (_server, client) = pair(paged_tools_handler(), DEFAULT_CHANNEL_CAPACITY);
        let transport = Arc::new(client);
        transport.connect().await.unwrap();
        let session = Session::new(
            transport,
            Implementation::new("mcpc-test", "0.1.0"),
            ClientCapabilities::default(),
            None,
            Arc::new(Vec::new),
        );
        let tools = list_tools(&session).await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["tool1", "tool2"]);
    }
}
