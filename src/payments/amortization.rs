use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{Result, SimulationError};
use crate::types::RepaymentPolicy;

/// split of one monthly payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySplit {
    pub payment: Money,
    pub principal: Money,
    pub interest: Money,
}

impl MonthlySplit {
    /// cap the principal portion at `balance`; an overpaying split is
    /// reduced to `balance + interest` so the balance lands on zero
    pub fn clamp_to_balance(self, balance: Money) -> Self {
        let principal = self
            .principal
            .clamp_between(Money::ZERO, balance.max(Money::ZERO));
        if self.principal > balance {
            return Self {
                payment: principal + self.interest,
                principal,
                interest: self.interest,
            };
        }

        Self { principal, ..self }
    }
}

/// per-month payment calculator for one loan
#[derive(Debug, Clone, Copy)]
pub struct AmortizationCalculator {
    policy: RepaymentPolicy,
    term_months: u32,
    fixed_principal: Money,
}

impl AmortizationCalculator {
    /// `original_principal` only matters for the equal-principal installment,
    /// which is fixed from the original amount and term for the whole loan
    pub fn new(policy: RepaymentPolicy, original_principal: Money, term_months: u32) -> Self {
        let fixed_principal = if term_months == 0 {
            original_principal
        } else {
            original_principal / Decimal::from(term_months)
        };

        Self {
            policy,
            term_months,
            fixed_principal,
        }
    }

    /// equal-principal installment
    pub fn fixed_principal(&self) -> Money {
        self.fixed_principal
    }

    /// payment for `month` given the balance before paying and the annual rate
    /// in force; the result is not yet clamped to the balance
    pub fn calculate_month(
        &self,
        month: u32,
        balance: Money,
        annual_rate: Rate,
        payments_made: u32,
    ) -> Result<MonthlySplit> {
        let monthly_rate = annual_rate.monthly_rate();
        let interest = interest_for(balance, monthly_rate, month)?;

        match self.policy {
            RepaymentPolicy::EqualPayment => {
                let remaining_payments = self.term_months.saturating_sub(payments_made);
                if remaining_payments == 0 {
                    return Ok(MonthlySplit {
                        payment: balance,
                        principal: balance,
                        interest: Money::ZERO,
                    });
                }

                let payment = annuity_payment(balance, monthly_rate, remaining_payments)
                    .ok_or(SimulationError::NumericOverflow { month })?;

                Ok(MonthlySplit {
                    payment,
                    principal: payment - interest,
                    interest,
                })
            }
            RepaymentPolicy::EqualPrincipal => Ok(MonthlySplit {
                payment: self.fixed_principal + interest,
                principal: self.fixed_principal,
                interest,
            }),
        }
    }
}

fn interest_for(balance: Money, monthly_rate: Rate, month: u32) -> Result<Money> {
    balance
        .checked_mul(monthly_rate.as_decimal())
        .ok_or(SimulationError::NumericOverflow { month })
}

/// level payment that repays `balance` over `months` at `monthly_rate`
///
/// `P * r * (1 + r)^n / ((1 + r)^n - 1)`, falling back to `P / n` when the
/// rate is zero or the denominator collapses. `None` on overflow.
pub fn annuity_payment(balance: Money, monthly_rate: Rate, months: u32) -> Option<Money> {
    if months == 0 {
        return Some(balance);
    }

    let r = monthly_rate.as_decimal();
    if r.is_zero() {
        return balance.checked_div(Decimal::from(months));
    }

    let compound = checked_pow(Decimal::ONE.checked_add(r)?, months)?;
    let denominator = compound.checked_sub(Decimal::ONE)?;

    if denominator.is_zero() {
        return balance.checked_div(Decimal::from(months));
    }

    let numerator = balance.as_decimal().checked_mul(r)?.checked_mul(compound)?;
    numerator.checked_div(denominator).map(Money::from_decimal)
}

/// `base^exp` by repeated squaring, `None` on overflow
fn checked_pow(base: Decimal, exp: u32) -> Option<Decimal> {
    let mut result = Decimal::ONE;
    let mut factor = base;
    let mut remaining = exp;

    while remaining > 0 {
        if remaining & 1 == 1 {
            result = result.checked_mul(factor)?;
        }
        remaining >>= 1;
        if remaining > 0 {
            factor = factor.checked_mul(factor)?;
        }
    }

    Some(result)
}
