use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq,
            PartialOrd, Ord, Hash,
        )]
        #[serde(transparent)]
        #[cfg_attr(feature = "database", derive(sqlx::Type))]
        #[cfg_attr(feature = "database", sqlx(transparent))]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
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

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a crawler configuration. Its string form is also the
    /// event bus topic for that crawler.
    CrawlerId
);
uuid_id!(
    /// Identifier of a single run log row.
    RunLogId
);
uuid_id!(TenantId);
uuid_id!(UserId);

impl CrawlerId {
    pub fn topic(&self) -> String {
        self.0.to_string()
    }
}
