use ferrous_doh_application::ports::SessionListener;
use ferrous_doh_domain::SessionEvent;
use tokio::sync::mpsc;

/// Forwards events into an unbounded channel so async code can await them
/// without blocking the event bus.
#[derive(Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: tx }, rx)
    }
}

impl SessionListener for ChannelListener {
    fn on_event(&self, event: &SessionEvent) {
        let _ = self.sender.send(event.clone());
    }
}

impl std::fmt::Debug for ChannelListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelListener")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
