use thiserror::Error;

/// Errors that can occur during workspace, workflow, or agent execution.
///
/// Structural errors are fatal to the enclosing run; execution errors are
/// recovered locally by the runtime that raised them (the failing producer
/// surfaces an error string on its primary output and execution continues).
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The graph has no vertices.
    #[error("Graph is empty")]
    EmptyGraph,

    /// The graph contains a cycle involving the named vertex.
    #[error("Cycle detected in graph at '{0}'")]
    CycleDetected(String),

    /// A declared node type has no factory in the node registry.
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// A connection references a socket that maps to no vertex.
    #[error("Socket {0} does not resolve to any node")]
    SocketNotResolved(u64),

    /// A node's process function failed.
    #[error("Node execution failed: {0}")]
    NodeExecutionFailed(String),

    /// A tool executor exceeded its time budget.
    #[error("Tool execution timeout")]
    ToolExecutionTimeout,

    /// The LLM called a tool that has no registered executor.
    #[error("Tool {0} not found")]
    ToolNotFound(String),

    /// The tool-call loop exceeded its iteration cap.
    #[error("Max tool iterations ({0}) exceeded")]
    MaxToolIterationsExceeded(usize),

    /// The reviewer's output could not be parsed as a verdict.
    #[error("Failed to parse review verdict: {0}")]
    ReviewParseError(String),

    /// The final-check output could not be parsed as a verdict.
    #[error("Failed to parse final check verdict: {0}")]
    FinalCheckParseError(String),

    /// The classifier chose an executor that is not among the candidates.
    #[error("Invalid executor choice: {0}")]
    InvalidExecutorChoice(String),

    /// No executor could be selected for a task.
    #[error("No executor available for task '{0}'")]
    NoExecutorAvailable(String),

    /// An LLM provider request failed.
    #[error("Provider request failed: {0}")]
    ProviderHttpError(String),

    /// Connecting to an MCP server failed.
    #[error("MCP connect failed: {0}")]
    McpConnectFailed(String),

    /// An MCP call failed after the connection was established.
    #[error("MCP call failed: {0}")]
    McpCallFailed(String),

    /// An outbound fetch was rejected by the SSRF guard.
    #[error("Fetch blocked: {0}")]
    HttpFetchBlocked(String),

    /// An outbound fetch exceeded the response size cap.
    #[error("Fetch response too large (over {0} bytes)")]
    HttpFetchTooLarge(usize),

    /// An outbound fetch timed out.
    #[error("Fetch timed out")]
    HttpFetchTimeout,

    /// A correlated client request received no reply in time.
    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    /// An inbound client frame could not be decoded.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Workspace-level persistence failed.
    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::MalformedFrame(err.to_string())
    }
}
