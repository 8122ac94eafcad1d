use std::collections::BTreeMap;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::LoanConfig;
use crate::decimal::{Money, Rate};
use crate::errors::SimulationError;
use crate::events::{Event, EventStore};
use crate::payments::{AmortizationCalculator, MonthlySplit};
use crate::types::{
    year_of_month, AnnualTotal, BalancePoint, ExtraPayment, RateChange, ScheduledPayment,
};

/// hard ceiling on the simulated term, independent of [`crate::InputLimits`]
pub const MAX_TERM_YEARS: u32 = 100;

/// outcome of one simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub first_month_payment: Money,
    /// scheduled payments only, extra payments are tracked separately
    pub total_paid: Money,
    /// never negative; positive when the loan outlives its term
    pub final_balance: Money,
    /// one point per month of the term
    pub balance_trace: Vec<BalancePoint>,
    pub annual_totals: Vec<AnnualTotal>,
    pub total_interest: Money,
    /// part of the extra payments that actually reduced the balance
    pub total_extra_paid: Money,
    pub payoff_month: Option<u32>,
    pub schedule: Vec<ScheduledPayment>,
    pub events: Vec<Event>,
    pub error: Option<SimulationError>,
}

impl SimulationResult {
    /// result for a loan with nothing to amortize
    pub fn zero() -> Self {
        Self {
            first_month_payment: Money::ZERO,
            total_paid: Money::ZERO,
            final_balance: Money::ZERO,
            balance_trace: Vec::new(),
            annual_totals: Vec::new(),
            total_interest: Money::ZERO,
            total_extra_paid: Money::ZERO,
            payoff_month: None,
            schedule: Vec::new(),
            events: Vec::new(),
            error: None,
        }
    }

    /// true when there was nothing to amortize
    pub fn is_empty(&self) -> bool {
        self.balance_trace.is_empty() && self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_fully_repaid(&self) -> bool {
        !self.balance_trace.is_empty() && self.error.is_none() && self.final_balance.is_zero()
    }

    /// balance still owed after the full term
    pub fn has_residual_balance(&self) -> bool {
        self.final_balance.is_positive()
    }

    pub fn payments_made(&self) -> u32 {
        self.schedule.len() as u32
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// mutable loop state, one instance per simulation
struct SimulationState {
    remaining: Money,
    rate: Rate,
    payments_made: u32,
    total_paid: Money,
    total_interest: Money,
    total_extra_paid: Money,
    first_month_payment: Money,
    payoff_month: Option<u32>,
    annual: BTreeMap<u32, Money>,
    trace: Vec<BalancePoint>,
    schedule: Vec<ScheduledPayment>,
}

impl SimulationState {
    fn new(financed: Money, rate: Rate, term_months: u32) -> Self {
        Self {
            remaining: financed,
            rate,
            payments_made: 0,
            total_paid: Money::ZERO,
            total_interest: Money::ZERO,
            total_extra_paid: Money::ZERO,
            first_month_payment: Money::ZERO,
            payoff_month: None,
            annual: BTreeMap::new(),
            trace: Vec::with_capacity(term_months as usize),
            schedule: Vec::new(),
        }
    }

    fn record_payment(&mut self, month: u32, split: &MonthlySplit) {
        self.total_paid += split.payment;
        self.total_interest += split.interest;
        self.remaining -= split.principal;
        self.payments_made += 1;
        if month == 1 {
            self.first_month_payment = split.payment;
        }
        *self.annual.entry(year_of_month(month)).or_insert(Money::ZERO) += split.payment;
    }

    /// pad the trace to the full term with `balance`
    fn pad_trace(&mut self, term_months: u32, balance: Money) {
        let recorded = self.trace.len() as u32;
        self.trace
            .extend((recorded + 1..=term_months).map(|month| BalancePoint { month, balance }));
    }

    fn into_result(self, events: Vec<Event>, error: Option<SimulationError>) -> SimulationResult {
        SimulationResult {
            first_month_payment: self.first_month_payment,
            total_paid: self.total_paid,
            final_balance: self.remaining.max(Money::ZERO),
            balance_trace: self.trace,
            annual_totals: self
                .annual
                .into_iter()
                .map(|(year, total)| AnnualTotal { year, total })
                .collect(),
            total_interest: self.total_interest,
            total_extra_paid: self.total_extra_paid,
            payoff_month: self.payoff_month,
            schedule: self.schedule,
            events,
            error,
        }
    }
}

/// simulate `config` month by month
///
/// Never fails outright: a loan with nothing to amortize yields
/// [`SimulationResult::zero`], a term beyond [`MAX_TERM_YEARS`] yields an
/// empty result with `error` set, and a numeric overflow stops the loop and
/// returns what was accumulated so far with `error` set.
pub fn simulate(config: &LoanConfig) -> SimulationResult {
    let financed = config.financed_amount();
    if !financed.is_positive() {
        debug!(
            principal = %config.principal_amount,
            down_payment = %config.down_payment,
            "nothing to amortize"
        );
        return SimulationResult::zero();
    }

    if config.term_years > MAX_TERM_YEARS {
        let err = SimulationError::InvalidTerm {
            years: config.term_years,
            min: 1,
            max: MAX_TERM_YEARS,
        };
        warn!(error = %err, "simulation refused");
        return SimulationResult {
            error: Some(err),
            ..SimulationResult::zero()
        };
    }

    let term_months = config.term_months();
    let rate_changes = sorted_rate_changes(&config.rate_changes);
    let extra_payments = sorted_extra_payments(&config.extra_payments);
    let calculator = AmortizationCalculator::new(config.repayment_policy, financed, term_months);

    debug!(
        financed = %financed,
        rate = %config.initial_rate(),
        term_months,
        policy = ?config.repayment_policy,
        rate_changes = rate_changes.len(),
        extra_payments = extra_payments.len(),
        "starting simulation"
    );

    let mut state = SimulationState::new(financed, config.initial_rate(), term_months);
    let mut events = EventStore::new();
    let mut pending_rates = rate_changes.iter().peekable();
    let mut pending_extras = extra_payments.iter().peekable();
    let mut error = None;

    for month in 1..=term_months {
        if !state.remaining.is_positive() {
            break;
        }

        while let Some(change) = pending_rates.next_if(|c| c.effective_month <= month) {
            let new_rate = change.rate();
            trace!(month, old_rate = %state.rate, new_rate = %new_rate, "rate change");
            events.emit(Event::InterestRateChanged {
                month,
                old_rate: state.rate,
                new_rate,
            });
            state.rate = new_rate;
        }

        let beginning_balance = state.remaining;
        let mut split = match calculator.calculate_month(
            month,
            state.remaining,
            state.rate,
            state.payments_made,
        ) {
            Ok(split) => split.clamp_to_balance(state.remaining),
            Err(err) => {
                warn!(month, error = %err, "simulation aborted");
                events.emit(Event::SimulationAborted {
                    month,
                    reason: err.to_string(),
                });
                error = Some(err);
                break;
            }
        };

        // leftover from fixed-point rounding on the last installment
        if month == term_months {
            let leftover = state.remaining - split.principal;
            if leftover.is_positive() && leftover < Money::ONE {
                split.principal += leftover;
                split.payment += leftover;
            }
        }

        state.record_payment(month, &split);

        let mut extra_this_month = Money::ZERO;
        while let Some(extra) = pending_extras.next_if(|e| e.month <= month) {
            let effective = extra.amount.min(state.remaining.max(Money::ZERO));
            if effective.is_positive() {
                trace!(month, amount = %extra.amount, "extra payment");
                state.remaining -= extra.amount;
                state.total_extra_paid += effective;
                extra_this_month += effective;
                events.emit(Event::ExtraPaymentApplied {
                    month,
                    amount: extra.amount,
                    balance_after: state.remaining.max(Money::ZERO),
                });
            } else {
                events.emit(Event::ExtraPaymentConsumed {
                    month,
                    amount: extra.amount,
                });
            }
        }

        let ending_balance = state.remaining.max(Money::ZERO);
        state.trace.push(BalancePoint {
            month,
            balance: ending_balance,
        });
        state.schedule.push(ScheduledPayment {
            month,
            payment_date: payment_date(config.start_date, month),
            annual_rate: state.rate,
            beginning_balance,
            payment_amount: split.payment,
            principal_portion: split.principal,
            interest_portion: split.interest,
            extra_payment: extra_this_month,
            ending_balance,
        });

        if ending_balance.is_zero() && state.payoff_month.is_none() {
            state.payoff_month = Some(month);
            events.emit(Event::LoanPaidOff { month });
        }
    }

    if error.is_some() {
        // unpaid months keep the balance the loop stopped at
        let balance = state.remaining.max(Money::ZERO);
        state.pad_trace(term_months, balance);
    } else {
        state.pad_trace(term_months, Money::ZERO);
        if state.remaining.is_positive() {
            events.emit(Event::ResidualBalance {
                term_months,
                balance: state.remaining,
            });
        }
    }

    let result = state.into_result(events.take_events(), error);

    debug!(
        first_payment = %result.first_month_payment,
        total_paid = %result.total_paid,
        final_balance = %result.final_balance,
        payoff_month = ?result.payoff_month,
        "simulation finished"
    );

    result
}

/// rate changes in month order; month 0 is dropped and only the first
/// change listed for a month is kept
fn sorted_rate_changes(changes: &[RateChange]) -> Vec<RateChange> {
    let mut sorted: Vec<RateChange> = changes
        .iter()
        .filter(|c| c.effective_month > 0)
        .copied()
        .collect();
    sorted.sort_by_key(|c| c.effective_month);
    sorted.dedup_by_key(|c| c.effective_month);
    sorted
}

/// extra payments in month order; month 0 and non-positive amounts are dropped
fn sorted_extra_payments(extras: &[ExtraPayment]) -> Vec<ExtraPayment> {
    let mut sorted: Vec<ExtraPayment> = extras
        .iter()
        .filter(|e| e.month > 0 && e.amount.is_positive())
        .copied()
        .collect();
    sorted.sort_by_key(|e| e.month);
    sorted
}

fn payment_date(start: Option<NaiveDate>, month: u32) -> Option<NaiveDate> {
    start.and_then(|date| date.checked_add_months(Months::new(month - 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::annuity_payment;
    use crate::types::RepaymentPolicy;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn equal_principal(principal: i64, rate: Decimal, years: u32) -> LoanConfig {
        LoanConfig {
            repayment_policy: RepaymentPolicy::EqualPrincipal,
            ..LoanConfig::new(Money::from_major(principal), rate, years)
        }
    }

    #[test]
    fn test_zero_result_when_down_payment_covers_principal() {
        let mut config = LoanConfig::preset_a();
        config.down_payment = config.principal_amount;
        assert_eq!(simulate(&config), SimulationResult::zero());

        config.down_payment = config.principal_amount + Money::from_major(1);
        let result = simulate(&config);
        assert!(result.is_empty());
        assert!(!result.is_error());
        assert!(result.annual_totals.is_empty());
    }

    #[test]
    fn test_equal_payment_matches_closed_form() {
        let config = LoanConfig::preset_a();
        let result = simulate(&config);

        assert_eq!(result.first_month_payment.truncated_major(), 91_855);
        assert_eq!(
            result.first_month_payment,
            annuity_payment(
                Money::from_major(30_000_000),
                Rate::from_percent(dec!(1.5)).monthly_rate(),
                420
            )
            .unwrap()
        );
        assert_eq!(result.balance_trace.len(), 420);
        assert_eq!(result.final_balance, Money::ZERO);
        assert!(result.is_fully_repaid());
        assert_eq!(result.payoff_month, Some(420));

        let expected_total = result.first_month_payment * Decimal::from(420);
        assert!((result.total_paid - expected_total).abs() < Money::ONE);
        assert_eq!(
            result.total_paid - result.total_interest,
            Money::from_major(30_000_000)
        );
    }

    #[test]
    fn test_down_payment_reduces_financed_amount() {
        let mut config = LoanConfig::preset_a();
        config.down_payment = Money::from_major(5_000_000);
        let result = simulate(&config);

        let expected = annuity_payment(
            Money::from_major(25_000_000),
            Rate::from_percent(dec!(1.5)).monthly_rate(),
            420,
        )
        .unwrap();
        assert_eq!(result.first_month_payment, expected);
    }

    #[test]
    fn test_equal_principal_shape() {
        let result = simulate(&equal_principal(1_200_000, dec!(1.2), 10));

        assert_eq!(result.schedule.len(), 120);
        for row in &result.schedule {
            assert_eq!(row.principal_portion, Money::from_major(10_000));
        }
        for pair in result.schedule.windows(2) {
            assert!(pair[1].payment_amount < pair[0].payment_amount);
        }
        assert_eq!(result.first_month_payment, Money::from_major(11_200));
        assert_eq!(result.final_balance, Money::ZERO);
    }

    #[test]
    fn test_equal_principal_rounding_leftover_is_settled() {
        // 30,000,000 / 420 does not divide evenly at 8 places
        let result = simulate(&equal_principal(30_000_000, dec!(1.5), 35));

        assert_eq!(result.final_balance, Money::ZERO);
        assert_eq!(result.payoff_month, Some(420));
        for pair in result.schedule.windows(2) {
            assert!(pair[1].payment_amount < pair[0].payment_amount);
        }
        let principal_paid: Money = result.schedule.iter().map(|p| p.principal_portion).sum();
        assert_eq!(principal_paid, Money::from_major(30_000_000));
    }

    #[test]
    fn test_extra_payment_reduces_total_cost() {
        let base = LoanConfig::preset_a();
        let mut with_extra = base.clone();
        with_extra.extra_payments = vec![ExtraPayment::new(12, Money::from_major(1_000_000))];

        let base_result = simulate(&base);
        let extra_result = simulate(&with_extra);

        assert_eq!(base_result.first_month_payment, extra_result.first_month_payment);
        assert!(extra_result.total_paid < base_result.total_paid);
        assert_eq!(extra_result.total_extra_paid, Money::from_major(1_000_000));
        assert_eq!(
            extra_result.balance_trace[11].balance,
            base_result.balance_trace[11].balance - Money::from_major(1_000_000)
        );
        // annuity recomputed over the remaining term, so the payment drops
        assert!(extra_result.schedule[12].payment_amount < base_result.schedule[12].payment_amount);
    }

    #[test]
    fn test_rate_change_applies_from_its_month() {
        let mut config = LoanConfig::new(Money::from_major(12_000_000), dec!(1.0), 10);
        config.rate_changes = vec![RateChange::new(6, dec!(3.0))];
        let result = simulate(&config);

        let old_monthly = Rate::from_percent(dec!(1.0)).monthly_rate().as_decimal();
        let new_monthly = Rate::from_percent(dec!(3.0)).monthly_rate().as_decimal();

        let month5 = &result.schedule[4];
        assert_eq!(month5.interest_portion, month5.beginning_balance * old_monthly);

        let month6 = &result.schedule[5];
        assert_eq!(month6.annual_rate, Rate::from_percent(dec!(3.0)));
        assert_eq!(month6.interest_portion, month6.beginning_balance * new_monthly);
        assert!(month6.payment_amount > month5.payment_amount);

        assert!(result.events.contains(&Event::InterestRateChanged {
            month: 6,
            old_rate: Rate::from_percent(dec!(1.0)),
            new_rate: Rate::from_percent(dec!(3.0)),
        }));
        assert_eq!(result.final_balance, Money::ZERO);
    }

    #[test]
    fn test_first_rate_change_for_a_month_wins() {
        let mut config = LoanConfig::new(Money::from_major(12_000_000), dec!(1.0), 10);
        config.rate_changes = vec![RateChange::new(6, dec!(2.0)), RateChange::new(6, dec!(5.0))];
        let result = simulate(&config);

        assert_eq!(result.schedule[5].annual_rate, Rate::from_percent(dec!(2.0)));
        assert_eq!(result.schedule[119].annual_rate, Rate::from_percent(dec!(2.0)));
        let changes = result
            .events
            .iter()
            .filter(|e| matches!(e, Event::InterestRateChanged { .. }))
            .count();
        assert_eq!(changes, 1);
    }

    #[test]
    fn test_term_beyond_ceiling_is_refused() {
        let config = LoanConfig::new(Money::from_major(1_000_000), dec!(1.0), u32::MAX / 12);
        let result = simulate(&config);

        assert!(matches!(
            result.error,
            Some(SimulationError::InvalidTerm { max: MAX_TERM_YEARS, .. })
        ));
        assert!(result.balance_trace.is_empty());
        assert!(!result.is_empty());
        assert!(!result.is_fully_repaid());

        let longest = simulate(&LoanConfig::new(
            Money::from_major(1_000_000),
            dec!(1.0),
            MAX_TERM_YEARS,
        ));
        assert!(longest.error.is_none());
        assert_eq!(longest.balance_trace.len() as u32, MAX_TERM_YEARS * 12);
    }

    #[test]
    fn test_rate_change_in_month_one_sets_first_payment() {
        let mut config = LoanConfig::new(Money::from_major(12_000_000), dec!(1.0), 10);
        config.rate_changes = vec![RateChange::new(1, dec!(2.4))];
        let result = simulate(&config);

        let expected = annuity_payment(
            Money::from_major(12_000_000),
            Rate::from_percent(dec!(2.4)).monthly_rate(),
            120,
        )
        .unwrap();
        assert_eq!(result.first_month_payment, expected);
    }

    #[test]
    fn test_unsorted_events_are_applied_in_month_order() {
        let mut sorted = LoanConfig::new(Money::from_major(20_000_000), dec!(1.2), 20);
        sorted.rate_changes = vec![RateChange::new(12, dec!(2.0)), RateChange::new(60, dec!(1.5))];
        sorted.extra_payments = vec![
            ExtraPayment::new(24, Money::from_major(500_000)),
            ExtraPayment::new(36, Money::from_major(300_000)),
        ];

        let mut shuffled = sorted.clone();
        shuffled.rate_changes.reverse();
        shuffled.extra_payments.reverse();

        let a = simulate(&sorted);
        let b = simulate(&shuffled);
        assert_eq!(a.total_paid, b.total_paid);
        assert_eq!(a.balance_trace, b.balance_trace);
        // input lists are left alone
        assert_eq!(shuffled.rate_changes[0].effective_month, 60);
    }

    #[test]
    fn test_invalid_event_entries_are_ignored() {
        let base = LoanConfig::new(Money::from_major(5_000_000), dec!(2.0), 5);
        let mut noisy = base.clone();
        noisy.rate_changes = vec![RateChange::new(0, dec!(9.0))];
        noisy.extra_payments = vec![
            ExtraPayment::new(0, Money::from_major(100_000)),
            ExtraPayment::new(10, Money::ZERO),
            ExtraPayment::new(10, -Money::from_major(50)),
        ];

        assert_eq!(simulate(&base).total_paid, simulate(&noisy).total_paid);
    }

    #[test]
    fn test_extra_payments_clear_balance_early() {
        let mut config = equal_principal(1_200_000, dec!(1.2), 10);
        config.extra_payments = vec![
            ExtraPayment::new(24, Money::from_major(600_000)),
            ExtraPayment::new(12, Money::from_major(600_000)),
            ExtraPayment::new(30, Money::from_major(10_000)),
        ];
        let result = simulate(&config);

        assert_eq!(result.payoff_month, Some(24));
        assert_eq!(result.final_balance, Money::ZERO);
        assert_eq!(result.balance_trace.len(), 120);
        assert!(result.balance_trace[23..].iter().all(|p| p.balance.is_zero()));
        assert!(result.balance_trace[22].balance.is_positive());
        assert_eq!(result.payments_made(), 24);
        assert_eq!(result.annual_totals.len(), 2);
        // the second extra only needed 360,000 to clear the loan
        assert_eq!(result.total_extra_paid, Money::from_major(960_000));
        assert!(result.events.contains(&Event::LoanPaidOff { month: 24 }));
    }

    #[test]
    fn test_extra_payment_in_payoff_month_is_consumed() {
        let mut config = equal_principal(120_000, dec!(1.2), 1);
        config.extra_payments = vec![ExtraPayment::new(12, Money::from_major(5_000))];
        let result = simulate(&config);

        assert_eq!(result.final_balance, Money::ZERO);
        assert_eq!(result.total_extra_paid, Money::ZERO);
        assert!(result.events.contains(&Event::ExtraPaymentConsumed {
            month: 12,
            amount: Money::from_major(5_000),
        }));
    }

    #[test]
    fn test_annual_totals_sum_to_total_paid() {
        let result = simulate(&LoanConfig::new(Money::from_major(2_400_000), dec!(2.0), 2));

        let years: Vec<u32> = result.annual_totals.iter().map(|t| t.year).collect();
        assert_eq!(years, vec![1, 2]);
        let sum: Money = result.annual_totals.iter().map(|t| t.total).sum();
        assert_eq!(sum, result.total_paid);
    }

    #[test]
    fn test_balance_trace_is_non_increasing() {
        let mut config = LoanConfig::preset_b();
        config.rate_changes = vec![RateChange::new(100, dec!(4.0))];
        config.extra_payments = vec![ExtraPayment::new(50, Money::from_major(2_000_000))];
        let result = simulate(&config);

        assert_eq!(result.balance_trace.len(), 360);
        for pair in result.balance_trace.windows(2) {
            assert!(pair[1].balance <= pair[0].balance);
            assert!(!pair[1].balance.is_negative());
        }
    }

    #[test]
    fn test_payment_dates_follow_calendar_months() {
        let mut config = LoanConfig::new(Money::from_major(1_200_000), dec!(1.0), 1);
        config.start_date = NaiveDate::from_ymd_opt(2024, 1, 31);
        let result = simulate(&config);

        assert_eq!(result.schedule[0].payment_date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(result.schedule[1].payment_date, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(result.schedule[11].payment_date, NaiveDate::from_ymd_opt(2024, 12, 31));

        let undated = simulate(&LoanConfig::new(Money::from_major(1_200_000), dec!(1.0), 1));
        assert!(undated.schedule.iter().all(|p| p.payment_date.is_none()));
    }

    #[test]
    fn test_zero_rate_is_linear() {
        let result = simulate(&LoanConfig::new(Money::from_major(1_200_000), Decimal::ZERO, 1));
        assert_eq!(result.first_month_payment, Money::from_major(100_000));
        assert_eq!(result.total_paid, Money::from_major(1_200_000));
        assert_eq!(result.total_interest, Money::ZERO);
    }

    #[test]
    fn test_overflow_aborts_with_partial_result() {
        let config = LoanConfig::new(Money::from_major(1_000_000), dec!(1000), 50);
        let result = simulate(&config);

        assert_eq!(result.error, Some(SimulationError::NumericOverflow { month: 1 }));
        assert!(result.is_error());
        assert!(!result.is_fully_repaid());
        assert_eq!(result.total_paid, Money::ZERO);
        assert_eq!(result.balance_trace.len(), 600);
        assert!(result
            .balance_trace
            .iter()
            .all(|p| p.balance == Money::from_major(1_000_000)));
        assert!(matches!(result.events.last(), Some(Event::SimulationAborted { month: 1, .. })));
    }

    #[test]
    fn test_result_serializes() {
        let result = simulate(&LoanConfig::new(Money::from_major(1_200_000), dec!(1.0), 1));
        let json = result.to_json_pretty().unwrap();
        let parsed: SimulationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
