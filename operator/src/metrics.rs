//! Prometheus counters per error kind and per heal action (`spec.md` §7:
//! "Metrics counters increment per error kind and per action"). Grounded in
//! the teacher's `Metrics` struct (`manager.rs`: `register_int_counter!`,
//! `default_registry()`), generalized from one `handled_events` counter to
//! the vector form this operator needs.

use prometheus::{default_registry, proto::MetricFamily, register_int_counter_vec, IntCounterVec};

use crate::error::ErrorClass;

#[derive(Clone)]
pub struct Metrics {
    pub reconciliations_total: IntCounterVec,
    pub errors_total: IntCounterVec,
    pub heal_actions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            reconciliations_total: register_int_counter_vec!(
                "redisfailover_reconciliations_total",
                "Reconciliation attempts per object kind and outcome",
                &["kind", "outcome"]
            )
            .unwrap(),
            errors_total: register_int_counter_vec!(
                "redisfailover_errors_total",
                "Errors observed during reconciliation, by classification",
                &["class"]
            )
            .unwrap(),
            heal_actions_total: register_int_counter_vec!(
                "redisfailover_heal_actions_total",
                "Corrective actions issued by the healer, by violation kind",
                &["action"]
            )
            .unwrap(),
        }
    }

    pub fn record_reconciliation(&self, kind: &str, outcome: &str) {
        self.reconciliations_total.with_label_values(&[kind, outcome]).inc();
    }

    pub fn record_error(&self, class: ErrorClass) {
        let label = match class {
            ErrorClass::Transient => "transient",
            ErrorClass::Configuration => "configuration",
            ErrorClass::Precondition => "precondition",
            ErrorClass::Fatal => "fatal",
        };
        self.errors_total.with_label_values(&[label]).inc();
    }

    pub fn record_heal_action(&self, action: &str) {
        self.heal_actions_total.with_label_values(&[action]).inc();
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        default_registry().gather()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
