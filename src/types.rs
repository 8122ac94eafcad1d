use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

/// repayment policy for a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepaymentPolicy {
    /// fixed total payment, principal/interest split shifts over time (annuity)
    #[default]
    EqualPayment,
    /// fixed principal installment, total payment shrinks with the interest
    EqualPrincipal,
}

/// scheduled change of the annual rate, effective from `effective_month`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateChange {
    /// 1-based month the new rate applies to
    pub effective_month: u32,
    /// new nominal annual rate in percent (1.5 == 1.5%)
    pub new_annual_rate_percent: Decimal,
}

impl RateChange {
    pub fn new(effective_month: u32, new_annual_rate_percent: Decimal) -> Self {
        Self {
            effective_month,
            new_annual_rate_percent,
        }
    }

    pub fn rate(&self) -> Rate {
        Rate::from_percent(self.new_annual_rate_percent)
    }
}

/// one-off extra principal payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraPayment {
    /// 1-based month the payment is made in, after the scheduled installment
    pub month: u32,
    pub amount: Money,
}

impl ExtraPayment {
    pub fn new(month: u32, amount: Money) -> Self {
        Self { month, amount }
    }
}

/// outstanding balance at the end of a month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub month: u32,
    pub balance: Money,
}

/// sum of scheduled payments made within one loan year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualTotal {
    pub year: u32,
    pub total: Money,
}

/// one row of the simulated schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub month: u32,
    pub payment_date: Option<NaiveDate>,
    pub annual_rate: Rate,
    pub beginning_balance: Money,
    pub payment_amount: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
    pub extra_payment: Money,
    /// never negative
    pub ending_balance: Money,
}

/// label of one side of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanLabel {
    A,
    B,
}

impl std::fmt::Display for LoanLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoanLabel::A => write!(f, "Loan A"),
            LoanLabel::B => write!(f, "Loan B"),
        }
    }
}

/// loan year (1-based) a month belongs to
pub fn year_of_month(month: u32) -> u32 {
    month.div_ceil(12)
}
