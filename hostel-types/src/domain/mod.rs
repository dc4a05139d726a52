//! Domain models for the hostel payments service.

/// Declares a fieldless enum that round-trips through a fixed string
/// (serde, database columns and `FromStr` all use the same spelling).
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $s:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize, utoipa::ToSchema,
        )]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $s),+
                }
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($name::$variant),)+
                    other => Err($crate::error::DomainError::validation(format!(
                        concat!("Unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

pub mod api_key;
pub mod booking;
pub mod gateway;
pub mod hostel;
pub mod ids;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod payment;
pub mod refund;
pub mod reminder;
pub mod report;
pub mod schedule;
pub mod webhook;

pub use api_key::{ApiKey, Principal};
pub use booking::{Booking, BookingStatus, NewBooking};
pub use gateway::{
    GatewayCallback, GatewayOrder, GatewayOrderRequest, GatewayRefund, GatewayRefundRequest,
    GatewayWebhook, GatewayWebhookPayload,
};
pub use hostel::Hostel;
pub use ids::{
    ApiKeyId, BookingId, HostelId, PaymentId, RefundId, ReminderId, ScheduleId, WebhookEndpointId,
};
pub use ledger::{EntryKind, Ledger, LedgerEntry, LedgerRecord, LedgerScope};
pub use lifecycle::{
    ComplaintStatus, ComplaintUpdate, InquiryStatus, InquiryUpdate, Lifecycle, ensure_transition,
    validate_update,
};
pub use money::{Currency, Money, quantize};
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentStatus, PaymentType};
pub use refund::{Refund, RefundStatus};
pub use reminder::{Reminder, ReminderKind, ReminderPolicy};
pub use report::{AmountByKey, PaymentSummary};
pub use schedule::{Frequency, NewSchedule, PaymentSchedule, ScheduleStatus};
pub use webhook::{
    DomainEvent, EventType, MAX_DELIVERY_ATTEMPTS, WebhookEndpoint, WebhookEvent, WebhookStatus,
};
