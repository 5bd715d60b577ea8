//! Push-notification contract. Delivery to devices is external; the default
//! implementation only logs.

use hailer_core::{TripId, UserId};
use hailer_state::Notice;

/// Delivers passenger notices outside the live session.
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: UserId, trip_id: TripId, notice: Notice);
}

/// Logs each notice through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, user_id: UserId, trip_id: TripId, notice: Notice) {
        tracing::info!(%user_id, %trip_id, ?notice, text = notice.text(), "push notification");
        metrics::counter!("hailer_notifications_total").increment(1);
    }
}
