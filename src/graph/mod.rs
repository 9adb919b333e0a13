// Agent Graph Module
// Think/act/observe reasoning loop on a petgraph state machine

pub mod agent;
pub mod builder;
pub mod emitter;
pub mod node;
pub mod runtime;
pub mod state;

pub mod nodes;

pub use agent::{AgentRequest, AgentResult, RagAgent};
pub use builder::build_agent_graph;
pub use emitter::{ChannelStepSink, NoopStepSink, StepSink};
pub use node::{AgentPolicy, AgentTools, GraphError, Node, NodeContext, NodeOutput};
pub use runtime::GraphRuntime;
pub use state::{AgentState, Strategy};
