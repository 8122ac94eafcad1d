use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::Money;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimulationError {
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("numeric overflow while computing the month {month} payment; the loan terms are out of range")]
    NumericOverflow {
        month: u32,
    },

    #[error("invalid interest rate: {rate}% (allowed: greater than {min}% up to {max}%)")]
    InvalidRate {
        rate: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("invalid term: {years} years (allowed: {min} to {max})")]
    InvalidTerm {
        years: u32,
        min: u32,
        max: u32,
    },

    #[error("invalid amount for {field}: {amount}")]
    InvalidAmount {
        field: String,
        amount: Money,
    },

    #[error("month {month} is outside the loan term of {term_months} months")]
    MonthOutOfRange {
        month: u32,
        term_months: u32,
    },

    #[error("too many rate changes: {count} (maximum {max})")]
    TooManyRateChanges {
        count: usize,
        max: usize,
    },

    #[error("more than one rate change scheduled for month {month}")]
    DuplicateRateChange {
        month: u32,
    },

    #[error("could not parse loan configuration: {message}")]
    Parse {
        message: String,
    },
}

impl From<serde_json::Error> for SimulationError {
    fn from(err: serde_json::Error) -> Self {
        SimulationError::Parse {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
