use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(MedicationStatus {
    Active => "active",
    Discontinued => "discontinued",
});

str_enum!(SyncStatus {
    Pending => "pending",
    Success => "success",
    Failed => "failed",
});

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn medication_status_round_trips_through_str() {
        for status in [MedicationStatus::Active, MedicationStatus::Discontinued] {
            assert_eq!(MedicationStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn sync_status_rejects_unknown_value() {
        let err = SyncStatus::from_str("done").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn sync_status_serializes_snake_case() {
        let json = serde_json::to_string(&SyncStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }
}
