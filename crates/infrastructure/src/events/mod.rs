mod channel_listener;
mod tracing_listener;

pub use channel_listener::ChannelListener;
pub use tracing_listener::TracingListener;
