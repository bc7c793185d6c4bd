//! The node contract: context, outputs, behaviors, and the registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::{ConfigParameter, LlmChoice, NodeSpec, RuntimeError};

/// Node-type key of the root-input injection node.
pub const WORKFLOW_INPUT_TYPE: &str = "workflow_input";

/// Values a node produced, keyed by output socket id.
pub type NodeOutputs = HashMap<u64, Value>;

/// Shared services nodes may reach during `process`.
///
/// Nodes that call an LLM resolve their provider from their own config
/// parameters first, falling back to these workspace defaults.
pub struct NodeServices {
    pub default_llm: LlmChoice,
    pub default_api_key: Option<String>,
    pub http: reqwest::Client,
}

impl NodeServices {
    pub fn new(default_llm: LlmChoice, default_api_key: Option<String>) -> Self {
        Self {
            default_llm,
            default_api_key,
            http: reqwest::Client::new(),
        }
    }
}

/// Everything a node sees while processing: the declared node (sockets,
/// config parameters, node value), the routed input values, the root input
/// when this node is the designated injection point, and shared services.
pub struct NodeContext<'a> {
    pub spec: &'a NodeSpec,
    pub inputs: HashMap<u64, Value>,
    pub root_input: Option<&'a str>,
    pub services: &'a NodeServices,
}

impl NodeContext<'_> {
    /// Configuration parameter by name.
    pub fn param(&self, name: &str) -> Option<&ConfigParameter> {
        self.spec.parameters.iter().find(|p| p.name == name)
    }

    /// Effective value of a parameter rendered as a string.
    pub fn param_str(&self, name: &str) -> Option<String> {
        self.param(name).and_then(|p| p.effective_str())
    }

    /// Effective value of a parameter, requiring it to be present.
    pub fn require_param(&self, name: &str) -> Result<String, RuntimeError> {
        self.param_str(name).ok_or_else(|| {
            RuntimeError::NodeExecutionFailed(format!(
                "node '{}' is missing required config '{}'",
                self.spec.title, name
            ))
        })
    }

    /// Value on the n-th declared input socket, if routed.
    pub fn input(&self, position: usize) -> Option<&Value> {
        let socket = *self.spec.input_sockets().get(position)?;
        self.inputs.get(&socket)
    }

    /// Value on the n-th input socket rendered as a string.
    pub fn input_str(&self, position: usize) -> Option<String> {
        self.input(position).map(atelier_core::stringify)
    }

    /// All present input values in declared socket order.
    pub fn input_values(&self) -> Vec<&Value> {
        self.spec
            .input_sockets()
            .into_iter()
            .filter_map(|id| self.inputs.get(&id))
            .collect()
    }

    /// The primary (first) output socket id, if declared.
    pub fn primary_output(&self) -> Option<u64> {
        self.spec.output_sockets().first().copied()
    }

    /// Builds the single-value output map on the primary output socket.
    pub fn single_output(&self, value: Value) -> NodeOutputs {
        match self.primary_output() {
            Some(socket) => HashMap::from([(socket, value)]),
            None => HashMap::new(),
        }
    }

    /// Output map pairing the first two output sockets with the given
    /// values; trailing sockets stay absent.
    pub fn pair_output(&self, first: Value, second: Value) -> NodeOutputs {
        let sockets = self.spec.output_sockets();
        let mut outputs = HashMap::new();
        if let Some(s) = sockets.first() {
            outputs.insert(*s, first);
        }
        if let Some(s) = sockets.get(1) {
            outputs.insert(*s, second);
        }
        outputs
    }
}

/// Renders an operational failure as the node's primary output.
pub fn error_output(ctx: &NodeContext<'_>, message: impl std::fmt::Display) -> NodeOutputs {
    ctx.single_output(Value::String(format!("Error: {message}")))
}

/// A node behavior. Implementations are stateless; per-node state lives on
/// the hydrated [`RuntimeNode`]'s spec.
#[async_trait]
pub trait Node: Send + Sync {
    /// The registry key this behavior answers to.
    fn node_type(&self) -> &'static str;

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError>;
}

/// A declared node hydrated against the registry: the client's spec
/// (sockets, parameters, node value overlaid) plus its behavior.
pub struct RuntimeNode {
    pub spec: NodeSpec,
    behavior: Arc<dyn Node>,
}

impl std::fmt::Debug for RuntimeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeNode")
            .field("spec", &self.spec)
            .field("behavior", &self.behavior.node_type())
            .finish()
    }
}

impl RuntimeNode {
    pub fn id(&self) -> u64 {
        self.spec.id
    }

    pub fn title(&self) -> &str {
        &self.spec.title
    }

    pub fn is_workflow_input(&self) -> bool {
        self.spec.node_type == WORKFLOW_INPUT_TYPE
    }

    pub fn get_config_parameter(&self, name: &str) -> Option<&ConfigParameter> {
        self.spec.parameters.iter().find(|p| p.name == name)
    }

    pub fn set_config_parameter(&mut self, name: &str, value: Value) {
        if let Some(param) = self.spec.parameters.iter_mut().find(|p| p.name == name) {
            param.param_value = Some(value);
        }
    }

    pub async fn process(
        &self,
        inputs: HashMap<u64, Value>,
        root_input: Option<&str>,
        services: &NodeServices,
    ) -> Result<NodeOutputs, RuntimeError> {
        let ctx = NodeContext {
            spec: &self.spec,
            inputs,
            root_input,
            services,
        };
        self.behavior.process(&ctx).await
    }
}

/// Registry of node behaviors keyed by node-type string.
pub struct NodeRegistry {
    behaviors: HashMap<&'static str, Arc<dyn Node>>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
        }
    }

    /// Creates a registry with all built-in node types.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::WorkflowInputNode));
        registry.register(Arc::new(crate::LlmChatNode));
        registry.register(Arc::new(crate::JoinNode));
        registry.register(Arc::new(crate::JsonManipulatorNode));
        registry.register(Arc::new(crate::WebScraperNode));
        registry.register(Arc::new(crate::ImageInputNode));
        registry.register(Arc::new(crate::VisionNode));
        registry.register(Arc::new(crate::TranscriptionNode));
        registry.register(Arc::new(crate::TextToSpeechNode));
        registry.register(Arc::new(crate::McpDiscoveryNode));
        registry.register(Arc::new(crate::McpToolCallNode));
        registry.register(Arc::new(crate::McpGetPromptNode));
        registry
    }

    /// Registers a behavior under its node-type key, replacing any
    /// previous behavior with the same key.
    pub fn register(&mut self, behavior: Arc<dyn Node>) {
        self.behaviors.insert(behavior.node_type(), behavior);
    }

    pub fn has(&self, node_type: &str) -> bool {
        self.behaviors.contains_key(node_type)
    }

    /// Hydrates a declared node: looks up the behavior and overlays the
    /// declared sockets, parameters, and node value.
    pub fn hydrate(&self, spec: &NodeSpec) -> Result<RuntimeNode, RuntimeError> {
        let behavior = self
            .behaviors
            .get(spec.node_type.as_str())
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownNodeType(spec.node_type.clone()))?;
        Ok(RuntimeNode {
            spec: spec.clone(),
            behavior,
        })
    }
}
