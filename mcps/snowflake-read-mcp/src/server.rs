//! Snowflake read-only MCP server
//!
//! Exposes the [`QueryGateway`] over MCP: one `query` tool and two
//! resources, the table list and a per-table schema template.

use std::sync::Arc;

use mcp_common::{
    async_trait, json_resource, json_success, resource_not_found, EmbeddableError, EmbeddableMcp,
    EmbeddableResult, McpError, McpResult, ResultExt, JSON_MIME_TYPE,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, CallToolResult, ListResourceTemplatesResult, ListResourcesResult,
        PaginatedRequestParam, RawResource, ReadResourceRequestParam, ReadResourceResult,
        Resource, ResourceTemplate, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    tool, tool_handler, tool_router, RoleServer,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::gateway::QueryGateway;

/// URI scheme of every resource this server serves
pub const RESOURCE_SCHEME: &str = "snowflake";

/// Address of the table list resource
pub const TABLES_URI: &str = "snowflake://tables";

/// URI template of the per-table schema resource
pub const SCHEMA_URI_TEMPLATE: &str = "snowflake://schema/{tableName}";

// ============================================================================
// Parameter Types
// ============================================================================

/// Parameters for the query tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// Read-only SQL to run against Snowflake. Statements containing write or DDL keywords are rejected.
    pub sql: String,
}

// ============================================================================
// Resource addressing
// ============================================================================

/// A resource URI resolved to what it names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceTarget {
    Tables,
    Schema(String),
}

impl ResourceTarget {
    /// Resolve a `snowflake://` URI. Returns `None` for anything this server does not serve.
    ///
    /// For schema URIs the final path segment is taken as the table name,
    /// as written; validation happens in the gateway.
    pub fn parse(uri: &str) -> Option<Self> {
        let url = Url::parse(uri).ok()?;
        if url.scheme() != RESOURCE_SCHEME {
            return None;
        }

        match url.host_str()? {
            "tables" if matches!(url.path(), "" | "/") => Some(ResourceTarget::Tables),
            "schema" => {
                let table = url.path_segments()?.next_back()?;
                Some(ResourceTarget::Schema(table.to_string()))
            }
            _ => None,
        }
    }

    /// Canonical URI the content is addressed with
    pub fn uri(&self) -> String {
        match self {
            ResourceTarget::Tables => TABLES_URI.to_string(),
            ResourceTarget::Schema(table) => format!("{}://schema/{}", RESOURCE_SCHEME, table),
        }
    }
}

// ============================================================================
// Server Implementation
// ============================================================================

/// Read-only Snowflake MCP server
#[derive(Clone)]
pub struct SnowflakeReadServer {
    gateway: Arc<QueryGateway>,
    tool_router: ToolRouter<Self>,
}

impl SnowflakeReadServer {
    pub fn new(gateway: Arc<QueryGateway>) -> Self {
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    pub fn gateway(&self) -> &Arc<QueryGateway> {
        &self.gateway
    }

    /// Concrete resources listed to clients
    pub fn resources(&self) -> Vec<Resource> {
        let mut tables = RawResource::new(TABLES_URI, "Table list");
        tables.description = Some("Tables visible to the configured Snowflake session".into());
        tables.mime_type = Some(JSON_MIME_TYPE.into());
        vec![tables.no_annotation()]
    }

    /// URI templates listed to clients
    pub fn resource_templates(&self) -> McpResult<Vec<ResourceTemplate>> {
        let schema: ResourceTemplate = serde_json::from_value(serde_json::json!({
            "uriTemplate": SCHEMA_URI_TEMPLATE,
            "name": "Table schema",
            "description": "Column definitions of one table, as reported by DESCRIBE TABLE",
            "mimeType": JSON_MIME_TYPE,
        }))
        .to_mcp_err()?;

        Ok(vec![schema])
    }

    /// Read a resolved resource
    pub async fn read_target(
        &self,
        target: &ResourceTarget,
    ) -> Result<ReadResourceResult, McpError> {
        debug!(uri = %target.uri(), "Reading resource");
        let rows = match target {
            ResourceTarget::Tables => self.gateway.list_tables().await?,
            ResourceTarget::Schema(table) => self.gateway.describe_table(table).await?,
        };
        json_resource(target.uri(), &rows)
    }

    /// Read a resource by URI
    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let target = ResourceTarget::parse(uri).ok_or_else(|| resource_not_found(uri))?;
        self.read_target(&target).await
    }
}

#[tool_router]
impl SnowflakeReadServer {
    /// Run a read-only SQL query
    #[tool(
        description = "Execute a read-only SQL query against Snowflake and return the result rows as JSON. Statements containing INSERT, UPDATE, DELETE, DROP, TRUNCATE, ALTER, CREATE, GRANT, REVOKE, COMMIT or ROLLBACK are rejected."
    )]
    async fn query(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let rows = self.gateway.run_query(&params.sql).await?;
        json_success(&rows)
    }
}

#[tool_handler]
impl rmcp::ServerHandler for SnowflakeReadServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Read-only Snowflake MCP server. Read snowflake://tables to list tables, \
                snowflake://schema/{tableName} for a table's columns, and use the query tool \
                for SELECT statements. Write and DDL statements are rejected."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(self.resources()))
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult::with_all_items(
            self.resource_templates()?,
        ))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read(&request.uri).await
    }
}

// ============================================================================
// EmbeddableMcp Implementation
// ============================================================================

#[async_trait]
impl EmbeddableMcp for SnowflakeReadServer {
    fn server_name(&self) -> &str {
        "snowflake-read"
    }

    fn server_description(&self) -> Option<&str> {
        Some("Read-only Snowflake MCP server - lists tables, describes table schemas and runs SELECT queries.")
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
        match name {
            "query" => {
                let params: QueryParams = serde_json::from_value(params)
                    .map_err(|e| EmbeddableError::InvalidParams(e.to_string()))?;
                self.query(Parameters(params)).await.map_err(Into::into)
            }
            _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
        }
    }

    fn list_resources(&self) -> Vec<Resource> {
        self.resources()
    }

    fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.resource_templates().unwrap_or_else(|e| {
            warn!("Failed to build resource templates: {}", e.message);
            Vec::new()
        })
    }

    async fn read_resource(&self, uri: &str) -> EmbeddableResult<ReadResourceResult> {
        let target = ResourceTarget::parse(uri)
            .ok_or_else(|| EmbeddableError::ResourceNotFound(uri.to_string()))?;
        self.read_target(&target).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::LIST_TABLES_SQL;
    use crate::testing::{row, test_config, FakeDriver};
    use rmcp::model::{ErrorCode, ResourceContents};
    use serde_json::json;

    fn server(driver: &Arc<FakeDriver>) -> SnowflakeReadServer {
        let gateway = QueryGateway::new(test_config(), driver.clone());
        SnowflakeReadServer::new(Arc::new(gateway))
    }

    fn text_of(result: &ReadResourceResult) -> (&str, Option<&str>, &str) {
        match &result.contents[0] {
            ResourceContents::TextResourceContents {
                uri,
                mime_type,
                text,
                ..
            } => (uri.as_str(), mime_type.as_deref(), text.as_str()),
            other => panic!("expected text contents, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_resource_uris() {
        assert_eq!(ResourceTarget::parse("snowflake://tables"), Some(ResourceTarget::Tables));
        assert_eq!(
            ResourceTarget::parse("snowflake://schema/orders"),
            Some(ResourceTarget::Schema("orders".into()))
        );
        assert_eq!(
            ResourceTarget::parse("snowflake://schema/analytics.public.orders"),
            Some(ResourceTarget::Schema("analytics.public.orders".into()))
        );
        assert_eq!(ResourceTarget::parse("postgres://tables"), None);
        assert_eq!(ResourceTarget::parse("snowflake://views"), None);
        assert_eq!(ResourceTarget::parse("snowflake://schema"), None);
        assert_eq!(ResourceTarget::parse("not a uri"), None);
    }

    #[test]
    fn test_schema_target_uri() {
        let target = ResourceTarget::Schema("orders".into());
        assert_eq!(target.uri(), "snowflake://schema/orders");
        assert_eq!(ResourceTarget::Tables.uri(), TABLES_URI);
    }

    #[tokio::test]
    async fn test_lists_resources_and_templates() {
        let driver = Arc::new(FakeDriver::new());
        let server = server(&driver);

        let resources = server.resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].raw.uri, TABLES_URI);
        assert_eq!(resources[0].raw.name, "Table list");
        assert_eq!(resources[0].raw.mime_type.as_deref(), Some(JSON_MIME_TYPE));

        let templates = server.resource_templates().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].raw.uri_template, SCHEMA_URI_TEMPLATE);
        assert_eq!(templates[0].raw.name, "Table schema");

        assert_eq!(driver.connects(), 0);
    }

    #[tokio::test]
    async fn test_read_tables_resource() {
        let driver = Arc::new(FakeDriver::new());
        let tables = vec![row(&[("name", json!("CUSTOMERS")), ("rows", json!(42))])];
        driver.respond(LIST_TABLES_SQL, tables.clone());
        let server = server(&driver);

        let result = server.read(TABLES_URI).await.unwrap();
        let (uri, mime, text) = text_of(&result);

        assert_eq!(uri, TABLES_URI);
        assert_eq!(mime, Some(JSON_MIME_TYPE));
        assert_eq!(text, serde_json::to_string_pretty(&tables).unwrap());
    }

    #[tokio::test]
    async fn test_read_schema_resource() {
        let driver = Arc::new(FakeDriver::new());
        let columns = vec![row(&[("name", json!("ID")), ("type", json!("NUMBER(38,0)"))])];
        driver.respond("DESCRIBE TABLE sales_2023", columns.clone());
        let server = server(&driver);

        let result = server.read("snowflake://schema/sales_2023").await.unwrap();
        let (uri, mime, text) = text_of(&result);

        assert_eq!(uri, "snowflake://schema/sales_2023");
        assert_eq!(mime, Some(JSON_MIME_TYPE));
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, json!(columns));
    }

    #[tokio::test]
    async fn test_read_schema_with_bad_name_is_invalid_params() {
        let driver = Arc::new(FakeDriver::new());
        let server = server(&driver);

        let err = server.read("snowflake://schema/orders;drop").await.unwrap_err();

        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(driver.connects(), 0);
    }

    #[tokio::test]
    async fn test_read_unknown_resource() {
        let driver = Arc::new(FakeDriver::new());
        let server = server(&driver);

        let err = server.read("snowflake://warehouses").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);

        let err = EmbeddableMcp::read_resource(&server, "file:///etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddableError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_query_tool_returns_rows() {
        let driver = Arc::new(FakeDriver::new());
        let rows = vec![row(&[("CURRENT_DATE", json!("2024-01-31"))])];
        driver.respond("SELECT CURRENT_DATE", rows.clone());
        let server = server(&driver);

        let result = server
            .call_tool("query", json!({ "sql": "SELECT CURRENT_DATE" }))
            .await
            .unwrap();

        assert_eq!(result.content.len(), 1);
        let text = &result.content[0].as_text().unwrap().text;
        assert_eq!(text, &serde_json::to_string_pretty(&rows).unwrap());
    }

    #[tokio::test]
    async fn test_query_tool_rejects_writes() {
        let driver = Arc::new(FakeDriver::new());
        let server = server(&driver);

        let err = server
            .call_tool("query", json!({ "sql": "TRUNCATE TABLE orders" }))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("read-only policy"));
        assert!(driver.executed().is_empty());
    }

    #[tokio::test]
    async fn test_call_tool_errors() {
        let driver = Arc::new(FakeDriver::new());
        let server = server(&driver);

        let err = server.call_tool("query", json!({ "query": "SELECT 1" })).await;
        assert!(matches!(err, Err(EmbeddableError::InvalidParams(_))));

        let err = server.call_tool("insert", json!({})).await;
        assert!(matches!(err, Err(EmbeddableError::ToolNotFound(_))));
    }

    #[test]
    fn test_tool_listing_and_info() {
        let driver = Arc::new(FakeDriver::new());
        let server = server(&driver);

        let tools = EmbeddableMcp::list_tools(&server);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "query");
        assert_eq!(server.server_name(), "snowflake-read");

        let info = rmcp::ServerHandler::get_info(&server);
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
    }
}
