use std::fmt;

use tokio::sync::broadcast;

/// Capacity used by [`EventChannel::new`].
pub const DEFAULT_CAPACITY: usize = 256;

/// Receiving end of an [`EventChannel`].
pub type EventStream<E> = broadcast::Receiver<E>;

/// Multicast event source.
///
/// Each subscriber gets its own receiver and sees every event emitted after
/// it subscribed. A subscriber that falls more than the channel capacity
/// behind observes `RecvError::Lagged` and skips ahead.
pub struct EventChannel<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventChannel<E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel buffering up to `capacity` events per subscriber.
    /// A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Having no subscribers is not an error; the event is dropped.
    pub fn emit(&self, event: E) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventStream<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn emit_without_subscribers_is_silent() {
        let channel: EventChannel<u32> = EventChannel::new();
        channel.emit(1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn every_subscriber_sees_every_event() {
        let channel = EventChannel::new();
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        channel.emit("x");
        channel.emit("y");
        assert_eq!(a.try_recv().unwrap(), "x");
        assert_eq!(a.try_recv().unwrap(), "y");
        assert_eq!(b.try_recv().unwrap(), "x");
        assert_eq!(b.try_recv().unwrap(), "y");
        assert_eq!(a.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let channel = EventChannel::new();
        channel.emit(1);
        let mut rx = channel.subscribe();
        channel.emit(2);
        assert_eq!(rx.try_recv().unwrap(), 2);
    }

    #[tokio::test]
    async fn async_receive() {
        let channel = EventChannel::with_capacity(4);
        let mut rx = channel.subscribe();
        channel.emit(7u8);
        assert_eq!(rx.recv().await.unwrap(), 7);
    }
}
