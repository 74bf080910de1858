use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Defines a Uuid-backed identifier newtype.
///
/// Every persisted entity gets its own id type so a `UserId` can never be
/// handed to a query expecting a `ShiftId`. Byte accessors feed the store's
/// composite tree keys.
macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $short:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Mint a fresh random (v4) id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// The all-zeros sentinel id.
            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            pub fn from_bytes(b: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(b))
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($short, "({}…)"), &self.0.to_string()[..8])
            }
        }
    };
}

define_id!(
    /// Tenant identifier. The all-zeros id is reserved for the system
    /// company that anchors global role-permission defaults.
    CompanyId,
    "CompanyId"
);

define_id!(
    /// Account identifier; used both as employee and as actor/editor.
    UserId,
    "UserId"
);

define_id!(
    /// Refresh-token session row.
    SessionId,
    "SessionId"
);

define_id!(
    /// A punch record (one clock-in, optionally one clock-out).
    EntryId,
    "EntryId"
);

define_id!(
    /// Cash-drawer session, one-to-one with a time entry.
    CashSessionId,
    "CashSessionId"
);

define_id!(ShiftId, "ShiftId");

define_id!(TemplateId, "TemplateId");

define_id!(
    /// Stamped on every shift created by a single bulk-week call.
    SeriesId,
    "SeriesId"
);

define_id!(RunId, "RunId");

define_id!(LineItemId, "LineItemId");

define_id!(LeaveRequestId, "LeaveRequestId");

define_id!(AuditLogId, "AuditLogId");
