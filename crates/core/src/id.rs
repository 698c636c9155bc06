//! Unique identifiers for snaphunt entities.
//!
//! All identifiers are database row ids, wrapped so they cannot be mixed up.

use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw row id.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

row_id!(
    /// Unique identifier for a registered user (session owner)
    UserId
);

row_id!(
    /// Unique identifier for an image set
    SetId
);

row_id!(
    /// Unique identifier for an image within a set
    ImageId
);

row_id!(
    /// Unique identifier for a piece of submitted evidence
    EvidenceId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id: ImageId = "42".parse().unwrap();
        assert_eq!(id, ImageId(42));
        assert_eq!(id.to_string(), "42");
        assert!("forty-two".parse::<SetId>().is_err());
    }

    #[test]
    fn test_serializes_as_plain_integer() {
        let json = serde_json::to_string(&UserId(7)).unwrap();
        assert_eq!(json, "7");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(), 7);
    }
}
