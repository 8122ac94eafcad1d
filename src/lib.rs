pub mod comparison;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod payments;
pub mod simulator;
pub mod types;
pub mod views;

// re-export key types
pub use comparison::{compare, ComparisonOutcome, LoanComparison};
pub use config::{InputLimits, LoanConfig, LoanConfigBuilder};
pub use decimal::{Money, Rate};
pub use errors::{Result, SimulationError};
pub use events::{Event, EventStore};
pub use payments::{annuity_payment, AmortizationCalculator, MonthlySplit};
pub use simulator::{simulate, SimulationResult, MAX_TERM_YEARS};
pub use types::{
    AnnualTotal, BalancePoint, ExtraPayment, LoanLabel, RateChange, RepaymentPolicy,
    ScheduledPayment,
};
pub use views::{ComparisonView, SummaryView};

// re-export external dependencies that users will need
pub use chrono;
pub use rust_decimal::Decimal;
