//! Newtype identifiers. All are `Uuid`-backed so the kernel can persist
//! across process restarts without a central sequence allocator.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(AgentId);
uuid_id!(MessageId);
uuid_id!(TaskId);
uuid_id!(DecisionId);
uuid_id!(AppealId);
uuid_id!(AuditId);
uuid_id!(ElectionId);
