//! Exchange ticker identifiers.
//!
//! Markets, events, and series all use the same textual ticker form but live
//! in distinct namespaces; separate newtypes keep them from crossing.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! ticker_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

ticker_newtype!(
    /// Market ticker assigned by the exchange.
    Ticker
);

ticker_newtype!(
    /// Event ticker assigned by the exchange.
    EventTicker
);

ticker_newtype!(
    /// Series ticker assigned by the exchange.
    SeriesTicker
);
