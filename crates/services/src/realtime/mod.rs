//! Live delivery: the connection registry, the per-connection session state
//! machine, and the frame protocol spoken over the channel.

pub mod heartbeat;
pub mod membership;
pub mod protocol;
pub mod registry;
pub mod session;

pub use heartbeat::{Heartbeat, HeartbeatConfig};
pub use membership::{StaticMembership, TopicMembership};
pub use protocol::{ClientMessage, CloseReason, Outbound};
pub use registry::{ChannelId, ConnectionRegistry};
pub use session::{DeliverySession, SessionState};
