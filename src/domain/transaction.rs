//! Payment transaction domain entity.
//!
//! Created when an STK push is initiated, advanced exactly once to a
//! terminal status by the asynchronous callback, immutable afterwards.

use crate::phone::CanonicalPhone;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single currency this system settles in.
pub const CURRENCY: &str = "KES";

/// Transaction lifecycle. Transitions only move forward:
/// `Pending → Sent → Completed | Failed | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Sent,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Monotonic forward transitions only; terminal states accept nothing.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Sent | Self::Failed | Self::Cancelled),
            Self::Sent => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub phone: CanonicalPhone,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub receipt_number: Option<String>,
    pub result_code: Option<i32>,
    pub raw_callback: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn new(
        tenant_id: Uuid,
        order_id: Uuid,
        phone: CanonicalPhone,
        amount: BigDecimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            order_id,
            phone,
            amount,
            currency: CURRENCY.to_string(),
            status: TransactionStatus::Pending,
            merchant_request_id: None,
            checkout_request_id: None,
            receipt_number: None,
            result_code: None,
            raw_callback: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the upstream request identifiers after a successful push.
    pub fn mark_sent(&mut self, merchant_request_id: String, checkout_request_id: String) -> bool {
        if !self.status.can_transition_to(TransactionStatus::Sent) {
            return false;
        }
        self.status = TransactionStatus::Sent;
        self.merchant_request_id = Some(merchant_request_id);
        self.checkout_request_id = Some(checkout_request_id);
        self.updated_at = Utc::now();
        true
    }

    /// Applies the single terminal write from the callback handler.
    /// Returns `false` without mutating when the row is already terminal.
    pub fn apply_callback(
        &mut self,
        result_code: i32,
        receipt_number: Option<String>,
        raw_callback: serde_json::Value,
    ) -> bool {
        let next = if result_code == 0 {
            TransactionStatus::Completed
        } else if result_code == 1032 {
            // 1032 is the customer pressing cancel on the prompt.
            TransactionStatus::Cancelled
        } else {
            TransactionStatus::Failed
        };

        if !self.status.can_transition_to(next) {
            return false;
        }

        self.status = next;
        self.result_code = Some(result_code);
        self.receipt_number = receipt_number;
        self.raw_callback = Some(raw_callback);
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending_tx() -> PaymentTransaction {
        PaymentTransaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            CanonicalPhone::parse("254712345678").unwrap(),
            BigDecimal::from(500),
        )
    }

    #[test]
    fn test_new_transaction_is_pending_kes() {
        let tx = pending_tx();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.currency, "KES");
        assert!(tx.merchant_request_id.is_none());
    }

    #[test]
    fn test_status_transitions_monotonic() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Sent));
        assert!(Pending.can_transition_to(Failed));
        assert!(Sent.can_transition_to(Completed));
        assert!(Sent.can_transition_to(Cancelled));

        assert!(!Sent.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Sent));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_mark_sent_records_request_ids() {
        let mut tx = pending_tx();
        assert!(tx.mark_sent("mri-1".to_string(), "cri-1".to_string()));
        assert_eq!(tx.status, TransactionStatus::Sent);
        assert_eq!(tx.checkout_request_id.as_deref(), Some("cri-1"));
    }

    #[test]
    fn test_callback_success_completes() {
        let mut tx = pending_tx();
        tx.mark_sent("mri".into(), "cri".into());

        let applied = tx.apply_callback(0, Some("QGR7TEST01".to_string()), json!({"ok": true}));
        assert!(applied);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.receipt_number.as_deref(), Some("QGR7TEST01"));
        assert_eq!(tx.result_code, Some(0));
    }

    #[test]
    fn test_callback_cancel_code_maps_to_cancelled() {
        let mut tx = pending_tx();
        tx.mark_sent("mri".into(), "cri".into());
        assert!(tx.apply_callback(1032, None, json!({})));
        assert_eq!(tx.status, TransactionStatus::Cancelled);
    }

    #[test]
    fn test_callback_error_code_fails() {
        let mut tx = pending_tx();
        tx.mark_sent("mri".into(), "cri".into());
        assert!(tx.apply_callback(2001, None, json!({})));
        assert_eq!(tx.status, TransactionStatus::Failed);
    }

    #[test]
    fn test_terminal_row_rejects_second_callback() {
        let mut tx = pending_tx();
        tx.mark_sent("mri".into(), "cri".into());
        assert!(tx.apply_callback(0, Some("RCPT".to_string()), json!({})));

        let replay = tx.apply_callback(2001, None, json!({"replay": true}));
        assert!(!replay);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.receipt_number.as_deref(), Some("RCPT"));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Sent,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>(), Ok(status));
        }
        assert!("bogus".parse::<TransactionStatus>().is_err());
    }
}
