use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{Result, SimulationError};
use crate::types::{ExtraPayment, RateChange, RepaymentPolicy};

/// loan configuration, the input of one simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanConfig {
    /// borrowed sum before the down payment
    pub principal_amount: Money,
    #[serde(default)]
    pub down_payment: Money,
    /// nominal annual rate in percent (1.5 == 1.5%)
    pub annual_rate_percent: Decimal,
    pub term_years: u32,
    #[serde(default)]
    pub repayment_policy: RepaymentPolicy,
    #[serde(default)]
    pub rate_changes: Vec<RateChange>,
    #[serde(default)]
    pub extra_payments: Vec<ExtraPayment>,
    /// date of the first payment, only used to stamp the schedule
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// bounds enforced at the input boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLimits {
    pub min_term_years: u32,
    pub max_term_years: u32,
    /// exclusive lower bound, percent
    pub min_rate_percent: Decimal,
    /// inclusive upper bound, percent
    pub max_rate_percent: Decimal,
    pub max_rate_changes: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            min_term_years: 1,
            max_term_years: 50,
            min_rate_percent: Decimal::ZERO,
            max_rate_percent: dec!(10),
            max_rate_changes: 10,
        }
    }
}

impl InputLimits {
    fn check_rate(&self, rate: Decimal) -> Result<()> {
        if rate <= self.min_rate_percent || rate > self.max_rate_percent {
            return Err(SimulationError::InvalidRate {
                rate,
                min: self.min_rate_percent,
                max: self.max_rate_percent,
            });
        }
        Ok(())
    }
}

impl LoanConfig {
    /// equal-payment loan with no down payment and no events
    pub fn new(principal_amount: Money, annual_rate_percent: Decimal, term_years: u32) -> Self {
        Self {
            principal_amount,
            down_payment: Money::ZERO,
            annual_rate_percent,
            term_years,
            repayment_policy: RepaymentPolicy::EqualPayment,
            rate_changes: Vec::new(),
            extra_payments: Vec::new(),
            start_date: None,
        }
    }

    pub fn builder() -> LoanConfigBuilder {
        LoanConfigBuilder::new()
    }

    /// default form of loan A: 30,000,000 at 1.5% over 35 years
    pub fn preset_a() -> Self {
        Self::new(Money::from_major(30_000_000), dec!(1.5), 35)
    }

    /// default form of loan B: 30,000,000 at 1.8% over 30 years
    pub fn preset_b() -> Self {
        Self::new(Money::from_major(30_000_000), dec!(1.8), 30)
    }

    /// parse from json, then validate against the default limits
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LoanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn term_months(&self) -> u32 {
        self.term_years.saturating_mul(12)
    }

    /// amount left to amortize after the down payment, may be non-positive
    pub fn financed_amount(&self) -> Money {
        self.principal_amount - self.down_payment
    }

    pub fn initial_rate(&self) -> Rate {
        Rate::from_percent(self.annual_rate_percent)
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_with(&InputLimits::default())
    }

    /// check every field against `limits`
    pub fn validate_with(&self, limits: &InputLimits) -> Result<()> {
        if !self.principal_amount.is_positive() {
            return Err(SimulationError::InvalidAmount {
                field: "principal_amount".to_string(),
                amount: self.principal_amount,
            });
        }

        if self.down_payment.is_negative() {
            return Err(SimulationError::InvalidAmount {
                field: "down_payment".to_string(),
                amount: self.down_payment,
            });
        }

        if self.down_payment >= self.principal_amount {
            return Err(SimulationError::InvalidConfiguration {
                message: format!(
                    "down payment {} must be less than the principal {}",
                    self.down_payment, self.principal_amount
                ),
            });
        }

        if self.term_years < limits.min_term_years || self.term_years > limits.max_term_years {
            return Err(SimulationError::InvalidTerm {
                years: self.term_years,
                min: limits.min_term_years,
                max: limits.max_term_years,
            });
        }

        limits.check_rate(self.annual_rate_percent)?;

        if self.rate_changes.len() > limits.max_rate_changes {
            return Err(SimulationError::TooManyRateChanges {
                count: self.rate_changes.len(),
                max: limits.max_rate_changes,
            });
        }

        let term_months = self.term_months();
        let mut seen_months = Vec::with_capacity(self.rate_changes.len());
        for change in &self.rate_changes {
            if change.effective_month == 0 || change.effective_month > term_months {
                return Err(SimulationError::MonthOutOfRange {
                    month: change.effective_month,
                    term_months,
                });
            }
            if seen_months.contains(&change.effective_month) {
                return Err(SimulationError::DuplicateRateChange {
                    month: change.effective_month,
                });
            }
            seen_months.push(change.effective_month);
            limits.check_rate(change.new_annual_rate_percent)?;
        }

        for extra in &self.extra_payments {
            if extra.month == 0 || extra.month > term_months {
                return Err(SimulationError::MonthOutOfRange {
                    month: extra.month,
                    term_months,
                });
            }
            if !extra.amount.is_positive() {
                return Err(SimulationError::InvalidAmount {
                    field: "extra_payment".to_string(),
                    amount: extra.amount,
                });
            }
        }

        Ok(())
    }
}

/// builder for loan configurations
#[derive(Debug, Default)]
pub struct LoanConfigBuilder {
    principal_amount: Option<Money>,
    down_payment: Option<Money>,
    annual_rate_percent: Option<Decimal>,
    term_years: Option<u32>,
    repayment_policy: Option<RepaymentPolicy>,
    rate_changes: Vec<RateChange>,
    extra_payments: Vec<ExtraPayment>,
    start_date: Option<NaiveDate>,
    limits: Option<InputLimits>,
}

impl LoanConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn principal(mut self, amount: Money) -> Self {
        self.principal_amount = Some(amount);
        self
    }

    pub fn down_payment(mut self, amount: Money) -> Self {
        self.down_payment = Some(amount);
        self
    }

    pub fn rate_percent(mut self, percent: Decimal) -> Self {
        self.annual_rate_percent = Some(percent);
        self
    }

    pub fn term_years(mut self, years: u32) -> Self {
        self.term_years = Some(years);
        self
    }

    pub fn policy(mut self, policy: RepaymentPolicy) -> Self {
        self.repayment_policy = Some(policy);
        self
    }

    pub fn rate_change(mut self, month: u32, new_rate_percent: Decimal) -> Self {
        self.rate_changes.push(RateChange::new(month, new_rate_percent));
        self
    }

    pub fn extra_payment(mut self, month: u32, amount: Money) -> Self {
        self.extra_payments.push(ExtraPayment::new(month, amount));
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn limits(mut self, limits: InputLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// build and validate
    pub fn build(self) -> Result<LoanConfig> {
        let principal_amount = self.principal_amount.ok_or(SimulationError::InvalidConfiguration {
            message: "Principal amount required".to_string(),
        })?;

        let annual_rate_percent = self.annual_rate_percent.ok_or(SimulationError::InvalidConfiguration {
            message: "Rate required".to_string(),
        })?;

        let term_years = self.term_years.ok_or(SimulationError::InvalidConfiguration {
            message: "Term required".to_string(),
        })?;

        let config = LoanConfig {
            principal_amount,
            down_payment: self.down_payment.unwrap_or(Money::ZERO),
            annual_rate_percent,
            term_years,
            repayment_policy: self.repayment_policy.unwrap_or_default(),
            rate_changes: self.rate_changes,
            extra_payments: self.extra_payments,
            start_date: self.start_date,
        };

        config.validate_with(&self.limits.unwrap_or_default())?;

        Ok(config)
    }
}
