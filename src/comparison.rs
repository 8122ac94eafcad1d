use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LoanConfig;
use crate::decimal::Money;
use crate::simulator::{simulate, SimulationResult};
use crate::types::LoanLabel;

/// which loan costs less overall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOutcome {
    /// `label` pays `by` less in total
    Cheaper { label: LoanLabel, by: Money },
    Equal,
    /// at least one side has nothing to amortize or failed
    NotComparable,
}

/// side by side result of two simulations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanComparison {
    pub loan_a: SimulationResult,
    pub loan_b: SimulationResult,
    pub outcome: ComparisonOutcome,
    /// first payment of B minus first payment of A
    pub first_payment_difference: Money,
}

impl LoanComparison {
    /// build from two finished simulations
    pub fn from_results(loan_a: SimulationResult, loan_b: SimulationResult) -> Self {
        let outcome = decide(&loan_a, &loan_b);
        let first_payment_difference = loan_b.first_month_payment - loan_a.first_month_payment;

        Self {
            loan_a,
            loan_b,
            outcome,
            first_payment_difference,
        }
    }

    pub fn result(&self, label: LoanLabel) -> &SimulationResult {
        match label {
            LoanLabel::A => &self.loan_a,
            LoanLabel::B => &self.loan_b,
        }
    }

    pub fn cheaper(&self) -> Option<LoanLabel> {
        match self.outcome {
            ComparisonOutcome::Cheaper { label, .. } => Some(label),
            _ => None,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn decide(a: &SimulationResult, b: &SimulationResult) -> ComparisonOutcome {
    if a.is_empty() || b.is_empty() || a.is_error() || b.is_error() {
        return ComparisonOutcome::NotComparable;
    }

    if a.total_paid < b.total_paid {
        ComparisonOutcome::Cheaper {
            label: LoanLabel::A,
            by: b.total_paid - a.total_paid,
        }
    } else if b.total_paid < a.total_paid {
        ComparisonOutcome::Cheaper {
            label: LoanLabel::B,
            by: a.total_paid - b.total_paid,
        }
    } else {
        ComparisonOutcome::Equal
    }
}

/// simulate both loans on the rayon pool and compare their total cost
pub fn compare(loan_a: &LoanConfig, loan_b: &LoanConfig) -> LoanComparison {
    let (result_a, result_b) = rayon::join(|| simulate(loan_a), || simulate(loan_b));
    let comparison = LoanComparison::from_results(result_a, result_b);

    debug!(outcome = ?comparison.outcome, "loans compared");

    comparison
}
