//! serializable summaries for the presentation layer
use serde::{Deserialize, Serialize};

use crate::comparison::{ComparisonOutcome, LoanComparison};
use crate::simulator::SimulationResult;
use crate::types::LoanLabel;

/// scalar summary of one loan, amounts in whole currency units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryView {
    pub label: LoanLabel,
    pub first_month_payment: i64,
    pub total_paid: i64,
    pub total_interest: i64,
    pub final_balance: i64,
    pub payoff_month: Option<u32>,
    /// balance remains after the last month of the term
    pub residual_warning: bool,
    /// nothing to amortize, e.g. down payment covers the principal
    pub nothing_to_amortize: bool,
    pub error: Option<String>,
}

impl SummaryView {
    pub fn from_result(label: LoanLabel, result: &SimulationResult) -> Self {
        SummaryView {
            label,
            first_month_payment: result.first_month_payment.truncated_major(),
            total_paid: result.total_paid.truncated_major(),
            total_interest: result.total_interest.truncated_major(),
            final_balance: result.final_balance.truncated_major(),
            payoff_month: result.payoff_month,
            residual_warning: result.has_residual_balance() && !result.is_error(),
            nothing_to_amortize: result.is_empty(),
            error: result.error.as_ref().map(|e| e.to_string()),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// both summaries plus the verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonView {
    pub loan_a: SummaryView,
    pub loan_b: SummaryView,
    pub cheaper: Option<LoanLabel>,
    /// total paid difference in whole units, zero when equal or not comparable
    pub savings: i64,
    pub comparable: bool,
}

impl ComparisonView {
    pub fn from_comparison(comparison: &LoanComparison) -> Self {
        let (cheaper, savings) = match comparison.outcome {
            ComparisonOutcome::Cheaper { label, by } => (Some(label), by.truncated_major()),
            _ => (None, 0),
        };

        ComparisonView {
            loan_a: SummaryView::from_result(LoanLabel::A, &comparison.loan_a),
            loan_b: SummaryView::from_result(LoanLabel::B, &comparison.loan_b),
            cheaper,
            savings,
            comparable: comparison.outcome != ComparisonOutcome::NotComparable,
        }
    }

    /// one-line verdict
    pub fn headline(&self) -> String {
        match (self.comparable, self.cheaper) {
            (false, _) => self.not_comparable_reason(),
            (true, Some(label)) => format!("{} costs {} less in total", label, self.savings),
            (true, None) => "Both loans cost about the same in total".to_string(),
        }
    }

    /// a failed simulation is named before a loan with nothing to amortize
    fn not_comparable_reason(&self) -> String {
        let sides = [&self.loan_a, &self.loan_b];
        if let Some((label, error)) = sides
            .iter()
            .find_map(|side| side.error.as_ref().map(|error| (side.label, error)))
        {
            return format!("{} could not be simulated: {}", label, error);
        }

        match (self.loan_a.nothing_to_amortize, self.loan_b.nothing_to_amortize) {
            (true, false) => {
                format!("{} has nothing left to borrow after the down payment", LoanLabel::A)
            }
            (false, true) => {
                format!("{} has nothing left to borrow after the down payment", LoanLabel::B)
            }
            _ => "Both loans need an amount to borrow before they can be compared".to_string(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
