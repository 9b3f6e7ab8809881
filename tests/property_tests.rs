//! Property-based tests for the status mapper and the ledger's
//! non-regression guarantee.

mod common;

use commerce_btcpay::mapper::{allows_transition, map_invoice_status, map_remote_status};
use commerce_btcpay::prelude::*;
use common::eur;
use proptest::prelude::*;

const KNOWN_STATUSES: [&str; 6] = ["new", "paid", "confirmed", "complete", "expired", "invalid"];

fn known_status() -> impl Strategy<Value = InvoiceStatus> {
    prop::sample::select(vec![
        InvoiceStatus::New,
        InvoiceStatus::Paid,
        InvoiceStatus::Confirmed,
        InvoiceStatus::Complete,
        InvoiceStatus::Expired,
        InvoiceStatus::Invalid,
    ])
}

proptest! {
    /// Every known status maps to a defined state without error.
    #[test]
    fn mapper_is_total_over_known_statuses(raw in prop::sample::select(KNOWN_STATUSES.to_vec())) {
        prop_assert!(map_remote_status(raw).is_ok());
    }

    /// Anything outside the known set is an explicit error, never a
    /// default state.
    #[test]
    fn unknown_statuses_are_rejected(raw in "[a-zA-Z_]{1,16}") {
        prop_assume!(!KNOWN_STATUSES.contains(&raw.as_str()));
        let err = map_remote_status(&raw).unwrap_err();
        prop_assert!(matches!(err, GatewayError::UnmappedRemoteStatus(s) if s == raw));
    }

    /// Mapping and the transition lattice agree: a settled invoice maps
    /// to a state no failure status can later displace.
    #[test]
    fn settled_mapping_is_sticky(settled in prop::sample::select(vec![InvoiceStatus::Confirmed, InvoiceStatus::Complete]),
                                 later in known_status()) {
        let settled_state = map_invoice_status(settled);
        let later_state = map_invoice_status(later);
        if later.is_failure() || later == InvoiceStatus::New || later == InvoiceStatus::Paid {
            prop_assert!(!allows_transition(settled_state, later_state)
                || later_state == settled_state);
        }
    }

    /// Replaying any sequence of remote statuses produces exactly one
    /// payment row, and once the settled tier was reached the row stays
    /// completed no matter what arrives afterwards.
    #[test]
    fn ledger_replay_is_monotonic(statuses in prop::collection::vec(known_status(), 1..12)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        rt.block_on(async {
            let ledger = InMemoryPaymentLedger::new();
            let mut seen_settled = false;

            for status in &statuses {
                let target = map_invoice_status(*status);
                let (payment, _) = ledger
                    .upsert(&"O1".into(), &"INV1".into(), target, status.as_str(), eur("10.00"))
                    .await
                    .expect("upsert never errors on replay");

                if status.is_settled() {
                    seen_settled = true;
                }
                if seen_settled {
                    prop_assert_eq!(payment.state, PaymentState::Completed);
                }
            }

            prop_assert_eq!(ledger.len(), 1);
            Ok(())
        })?;
    }

    /// Applying the same snapshot twice in a row changes nothing the
    /// second time.
    #[test]
    fn duplicate_upsert_is_idempotent(status in known_status()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        rt.block_on(async {
            let ledger = InMemoryPaymentLedger::new();
            let target = map_invoice_status(status);

            let (first, first_outcome) = ledger
                .upsert(&"O1".into(), &"INV1".into(), target, status.as_str(), eur("10.00"))
                .await
                .expect("first upsert");
            let (second, second_outcome) = ledger
                .upsert(&"O1".into(), &"INV1".into(), target, status.as_str(), eur("10.00"))
                .await
                .expect("second upsert");

            prop_assert_eq!(first_outcome, UpsertOutcome::Created);
            prop_assert_eq!(second_outcome, UpsertOutcome::Unchanged);
            prop_assert_eq!(first, second);
            prop_assert_eq!(ledger.len(), 1);
            Ok(())
        })?;
    }
}
