/// compare two mortgages side by side
///
/// RUST_LOG=loan_sim=debug cargo run --example compare_loans
use loan_sim::{compare, ComparisonView, LoanConfig, Money, RepaymentPolicy};
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // variable rate annuity with a bonus repayment after the first year
    let loan_a = LoanConfig::builder()
        .principal(Money::from_major(30_000_000))
        .down_payment(Money::from_major(3_000_000))
        .rate_percent(dec!(0.6))
        .term_years(35)
        .rate_change(61, dec!(1.2))
        .rate_change(121, dec!(1.8))
        .extra_payment(12, Money::from_major(1_000_000))
        .build()?;

    // fixed rate, equal principal
    let loan_b = LoanConfig::builder()
        .principal(Money::from_major(30_000_000))
        .down_payment(Money::from_major(3_000_000))
        .rate_percent(dec!(1.8))
        .term_years(30)
        .policy(RepaymentPolicy::EqualPrincipal)
        .build()?;

    let comparison = compare(&loan_a, &loan_b);
    let view = ComparisonView::from_comparison(&comparison);

    println!("{}", view.to_json_pretty()?);
    println!("{}", view.headline());

    for total in &comparison.loan_a.annual_totals {
        println!("loan A year {:>2}: {}", total.year, total.total.round_dp(0));
    }

    Ok(())
}
