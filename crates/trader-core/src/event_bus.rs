//! Broadcast event bus for trade progress.

use tokio::sync::broadcast;
use trader_types::TradeEvent;

/// Fan-out channel for [`TradeEvent`]s.
///
/// Cloning shares the same channel. Subscribers that fall behind by more than
/// the capacity miss the oldest events.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TradeEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: TradeEvent,
	) -> Result<(), broadcast::error::SendError<TradeEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(256)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use trader_types::{TradeKind, TradeStatus};

	#[tokio::test]
	async fn test_publish_reaches_every_subscriber() {
		let bus = EventBus::new(8);
		let mut first = bus.subscribe();
		let mut second = bus.clone().subscribe();

		bus.publish(TradeEvent::StatusChanged {
			trade_id: "buy-1".into(),
			kind: TradeKind::Buy,
			status: TradeStatus::Submitting,
		})
		.unwrap();

		for rx in [&mut first, &mut second] {
			match rx.recv().await.unwrap() {
				TradeEvent::StatusChanged { trade_id, .. } => assert_eq!(trade_id, "buy-1"),
				other => panic!("unexpected {other:?}"),
			}
		}
	}

	#[test]
	fn test_publish_without_subscribers_fails() {
		let bus = EventBus::default();
		let result = bus.publish(TradeEvent::StatusChanged {
			trade_id: "x".into(),
			kind: TradeKind::TopUp,
			status: TradeStatus::Idle,
		});
		assert!(result.is_err());
	}
}
