pub mod amortization;

pub use amortization::{annuity_payment, AmortizationCalculator, MonthlySplit};
