//! Streaming pipeline layer
//!
//! Composes the transport channel, the media source and the frame scheduler:
//! - Control/Coordination: the coordinator state machine and lifecycle
//! - Scheduling: throttled frame extraction with backpressure
//! - Sinks: pluggable frame destinations (socket send or fallback call)
//! - Health monitoring: counters for drops, failures and socket losses

pub mod coordinator;
pub mod health;
pub mod scheduler;
pub mod sink;
pub mod state;

pub use coordinator::StreamCoordinator;
pub use health::{HealthSummary, PipelineHealth};
pub use scheduler::{FrameScheduler, SchedulerError};
pub use sink::{ChannelSink, FallbackSink, FrameSink, SinkError};
pub use state::PipelineState;
