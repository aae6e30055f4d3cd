use ferrous_doh_domain::SessionEvent;

/// Receives session and certificate events.
///
/// Called with the event bus lock held, so implementations must not block
/// or call back into the bus.
pub trait SessionListener: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}
