// Status Notification Channels
//
// Sink abstraction, the Discord REST sink, rendering, and the publisher
// that keeps one status message up to date.

pub mod adapter;
pub mod platforms;
pub mod publisher;
pub mod render;
pub mod store;

pub use adapter::{EmbedField, MessageId, SinkError, StatusEmbed, StatusSink};
pub use platforms::discord::{DiscordConfig, DiscordSink};
pub use publisher::{NotificationPublisher, PublishOutcome, PublisherConfig};
pub use render::{render, render_checking};
pub use store::MessageIdStore;
