//! Status enums for payments and orders.

use serde::{Deserialize, Serialize};

/// Status of a payment intent as reported by the payment provider.
///
/// Only `Completed`, `Canceled` and `Failed` are terminal. Anything else the
/// provider reports (`CREATED`, `AUTHORIZED`, `EXPIRED`, ...) means the intent
/// is still in progress and gets polled again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Created,
    Completed,
    Canceled,
    Failed,
    /// Any other provider status, kept verbatim.
    Other(String),
}

impl PaymentStatus {
    /// Whether the intent will not transition any further.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }

    /// The provider's wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "CREATED",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
            Self::Failed => "FAILED",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "CREATED" => Self::Created,
            "COMPLETED" => Self::Completed,
            "CANCELED" => Self::Canceled,
            "FAILED" => Self::Failed,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for PaymentStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Other(s) => s,
            other => other.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order lifecycle status.
///
/// Orders placed through checkout are `Completed`; orders posted directly to
/// `/orders` start as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Canceled.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(!PaymentStatus::Created.is_terminal());
        assert!(!PaymentStatus::from("AUTHORIZED").is_terminal());
    }

    #[test]
    fn test_unknown_status_round_trips_verbatim() {
        let status: PaymentStatus = serde_json::from_str("\"REAUTHORIZING\"").unwrap();
        assert_eq!(status, PaymentStatus::Other("REAUTHORIZING".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"REAUTHORIZING\"");
    }

    #[test]
    fn test_known_status_parses() {
        let status: PaymentStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(status, PaymentStatus::Completed);
    }

    #[test]
    fn test_order_status_from_str() {
        assert_eq!("completed".parse::<OrderStatus>(), Ok(OrderStatus::Completed));
        assert_eq!("pending".parse::<OrderStatus>(), Ok(OrderStatus::Pending));
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }
}
