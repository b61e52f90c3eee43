//! Streaming flow control and display shaping.

pub mod flow;
pub mod window;

pub use flow::{
    FlowConfig, FlowController, FlushReason, NullSink, RenderSink, StreamAborted, StreamOutcome,
    flush_trigger,
};
pub use window::ELISION_MARKER;
