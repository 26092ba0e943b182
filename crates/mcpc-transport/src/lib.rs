pub mod child_process;
pub mod core;
pub mod inprocess;
pub mod sse;
pub mod stdio;

pub use child_process::{ChildProcessSpec, ChildProcessTransport};
pub use core::{
    NotificationHandler, PendingTable, Transport, TransportError, TransportResult, TransportState,
    extract_method, extract_request_id,
};
pub use inprocess::{DEFAULT_CHANNEL_CAPACITY, InProcessClientTransport, InProcessHandler, InProcessServer, pair};
pub use sse::{SseConfig, SseTransport};
pub use stdio::StdioTransport;
