pub mod clock;
pub mod dispatcher;
pub mod locks;
pub mod transport;

use serde::Serialize;

pub use clock::{Clock, LinearBackoff, SystemClock};
pub use dispatcher::Dispatcher;
pub use locks::{DeliveryGuard, DeliveryLocks};
pub use transport::{HttpTransport, TransportError, TransportResponse, WebhookTransport};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryOutcome {
    pub success: bool,
    /// Attempts made by this invocation.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Attempt number of the last attempt made, or the stored retry count if none ran.
    pub last_attempt_number: i32,
}
