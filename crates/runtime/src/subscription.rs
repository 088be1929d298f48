//! Explicit unsubscribe handles for platform event listeners.

use std::fmt;

/// Handle returned by a listener registration.
///
/// [`unsubscribe`](Self::unsubscribe) consumes the handle, so removal runs at
/// most once no matter how the platform implements listener removal.
/// Dropping the handle without unsubscribing leaves the listener attached.
pub struct Subscription {
	cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
	pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
		Self {
			cancel: Some(Box::new(cancel)),
		}
	}

	/// A handle whose removal does nothing.
	pub fn noop() -> Self {
		Self { cancel: None }
	}

	/// Detaches the listener.
	pub fn unsubscribe(mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription").field("armed", &self.cancel.is_some()).finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[test]
	fn unsubscribe_runs_cancel_once() {
		let calls = Arc::new(AtomicUsize::new(0));
		let subscription = Subscription::new({
			let calls = Arc::clone(&calls);
			move || {
				calls.fetch_add(1, Ordering::SeqCst);
			}
		});
		subscription.unsubscribe();
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn dropping_does_not_cancel() {
		let calls = Arc::new(AtomicUsize::new(0));
		drop(Subscription::new({
			let calls = Arc::clone(&calls);
			move || {
				calls.fetch_add(1, Ordering::SeqCst);
			}
		}));
		assert_eq!(calls.load(Ordering::SeqCst), 0);
		Subscription::noop().unsubscribe();
	}
}
