pub mod executor;
pub mod faq;
pub mod handoff;
pub mod registry;
pub mod schema;
pub mod support;

pub use executor::{redact_args, ToolExecution, ToolExecutor};
pub use faq::{FaqItem, FaqSearchTool, FaqStore, InMemoryFaqStore};
pub use handoff::HandoffTool;
pub use registry::{Tool, ToolDefinition, ToolRegistry};
pub use support::{
    CreateTicketTool, FollowupEmailTool, OrderStatusTool, ResetPasswordTool, UpdateProfileTool,
};
