//! Financial calculation engine
//!
//! Pure, deterministic formulas. No I/O and no LLM in here; every
//! function validates its inputs and reports the offending parameter.

use crate::error::RouterError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Search interval for the internal rate of return.
pub const IRR_LOWER_BOUND: f64 = -0.99;
pub const IRR_UPPER_BOUND: f64 = 10.0;
/// Bisection iteration cap.
pub const IRR_MAX_ITERATIONS: u32 = 200;
/// |NPV| at the returned rate is below this, unless the bracket collapses
/// to adjacent floats first (large cash flows).
pub const IRR_TOLERANCE: f64 = 1e-6;
/// Lower bounds tried in order when NPV is undefined at the one before.
const IRR_LOWER_FALLBACKS: [f64; 5] = [IRR_LOWER_BOUND, -0.95, -0.9, -0.75, -0.5];

/// Periods kept at each end of an amortization sample.
const AMORTIZATION_SAMPLE_EDGE: usize = 5;
const MAX_SCHEDULE_PERIODS: f64 = 1200.0;

//
// ================= Formulas =================
//

/// The closed set of formulas exposed by the calculation suite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    Roi,
    CompoundInterest,
    LoanPayment,
    FinancialRatio,
    NetPresentValue,
    InternalRateOfReturn,
}

impl Formula {
    pub const ALL: [Formula; 6] = [
        Formula::Roi,
        Formula::CompoundInterest,
        Formula::LoanPayment,
        Formula::FinancialRatio,
        Formula::NetPresentValue,
        Formula::InternalRateOfReturn,
    ];

    /// Capability name under which the formula is registered.
    pub fn capability_name(&self) -> &'static str {
        match self {
            Formula::Roi => "roi",
            Formula::CompoundInterest => "compound_interest",
            Formula::LoanPayment => "loan_payment",
            Formula::FinancialRatio => "financial_ratio",
            Formula::NetPresentValue => "npv",
            Formula::InternalRateOfReturn => "irr",
        }
    }

    pub fn from_capability_name(name: &str) -> Option<Formula> {
        Formula::ALL
            .iter()
            .copied()
            .find(|f| f.capability_name() == name)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Formula::Roi => "return on investment",
            Formula::CompoundInterest => "compound interest",
            Formula::LoanPayment => "loan payment",
            Formula::FinancialRatio => "financial ratio",
            Formula::NetPresentValue => "net present value",
            Formula::InternalRateOfReturn => "internal rate of return",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Compounding =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compounding {
    Annual,
    Semiannual,
    Quarterly,
    Monthly,
    Weekly,
    Daily,
}

impl Compounding {
    pub fn per_year(&self) -> u32 {
        match self {
            Compounding::Annual => 1,
            Compounding::Semiannual => 2,
            Compounding::Quarterly => 4,
            Compounding::Monthly => 12,
            Compounding::Weekly => 52,
            Compounding::Daily => 365,
        }
    }

    /// Map a frequency word ("monthly", "semi-annually", ...) to a frequency.
    pub fn from_word(word: &str) -> Option<Compounding> {
        let w = word.trim().to_lowercase();
        let w = w.trim_end_matches(|c: char| !c.is_alphanumeric());
        match w {
            "annual" | "annually" | "yearly" => Some(Compounding::Annual),
            "semiannual" | "semiannually" | "semi-annual" | "semi-annually" | "biannual" => {
                Some(Compounding::Semiannual)
            }
            "quarterly" => Some(Compounding::Quarterly),
            "monthly" => Some(Compounding::Monthly),
            "weekly" => Some(Compounding::Weekly),
            "daily" => Some(Compounding::Daily),
            _ => None,
        }
    }
}

//
// ================= Ratios =================
//

/// Presentation label for `financial_ratio`. The computation is always a
/// plain division; the kind only decides how it is labelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RatioKind {
    Current,
    Quick,
    Debt,
    Roe,
    Roa,
    ProfitMargin,
    Pe,
    Pb,
    InterestCoverage,
    Custom,
}

impl RatioKind {
    pub const ALL: [RatioKind; 10] = [
        RatioKind::Current,
        RatioKind::Quick,
        RatioKind::Debt,
        RatioKind::Roe,
        RatioKind::Roa,
        RatioKind::ProfitMargin,
        RatioKind::Pe,
        RatioKind::Pb,
        RatioKind::InterestCoverage,
        RatioKind::Custom,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RatioKind::Current => "current",
            RatioKind::Quick => "quick",
            RatioKind::Debt => "debt",
            RatioKind::Roe => "roe",
            RatioKind::Roa => "roa",
            RatioKind::ProfitMargin => "profit_margin",
            RatioKind::Pe => "pe",
            RatioKind::Pb => "pb",
            RatioKind::InterestCoverage => "interest_coverage",
            RatioKind::Custom => "custom",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RatioKind::Current => "Current ratio",
            RatioKind::Quick => "Quick ratio",
            RatioKind::Debt => "Debt ratio",
            RatioKind::Roe => "Return on equity (ROE)",
            RatioKind::Roa => "Return on assets (ROA)",
            RatioKind::ProfitMargin => "Net profit margin",
            RatioKind::Pe => "Price-to-earnings (P/E)",
            RatioKind::Pb => "Price-to-book (P/B)",
            RatioKind::InterestCoverage => "Interest coverage",
            RatioKind::Custom => "Ratio",
        }
    }

    pub fn formula(&self) -> &'static str {
        match self {
            RatioKind::Current => "current assets / current liabilities",
            RatioKind::Quick => "(current assets - inventories) / current liabilities",
            RatioKind::Debt => "total liabilities / total assets",
            RatioKind::Roe => "net income / shareholders' equity",
            RatioKind::Roa => "net income / total assets",
            RatioKind::ProfitMargin => "net income / net sales",
            RatioKind::Pe => "price per share / earnings per share",
            RatioKind::Pb => "price per share / book value per share",
            RatioKind::InterestCoverage => "EBIT / interest expense",
            RatioKind::Custom => "numerator / denominator",
        }
    }

    /// Whether the ratio is conventionally shown as a percentage.
    pub fn is_percentage(&self) -> bool {
        matches!(
            self,
            RatioKind::Debt | RatioKind::Roe | RatioKind::Roa | RatioKind::ProfitMargin
        )
    }

    pub fn from_key(key: &str) -> Option<RatioKind> {
        let lowered = key.trim().to_lowercase();
        RatioKind::ALL
            .iter()
            .copied()
            .find(|k| k.key() == lowered)
    }

    /// Short reading of the value, for the ratios that have a common rule of thumb.
    pub fn interpretation(&self, value: f64) -> Option<&'static str> {
        match self {
            RatioKind::Current if value < 1.0 => {
                Some("below 1: current liabilities exceed current assets")
            }
            RatioKind::Current if value < 2.0 => {
                Some("between 1 and 2: short-term obligations are covered")
            }
            RatioKind::Current => Some("2 or more: ample liquidity, possibly idle assets"),
            RatioKind::Debt if value > 0.6 => Some("over 60% of assets are financed with debt"),
            RatioKind::Debt => Some("most assets are financed with equity"),
            RatioKind::Pe if value < 0.0 => Some("negative earnings"),
            RatioKind::Pe if value < 15.0 => Some("generally considered low"),
            RatioKind::Pe if value <= 25.0 => Some("within the usual range"),
            RatioKind::Pe => Some("generally considered high; growth is priced in"),
            _ => None,
        }
    }
}

//
// ================= Validation =================
//

fn ensure_finite(param: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RouterError::invalid(param, "must be a finite number"))
    }
}

/// Results overflow long before inputs do; never hand back `inf` as an answer.
fn finite_result(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RouterError::invalid(
            "result",
            "the inputs produce a number too large to represent",
        ))
    }
}

fn ensure_non_negative(param: &str, value: f64) -> Result<()> {
    ensure_finite(param, value)?;
    if value < 0.0 {
        return Err(RouterError::invalid(param, "must not be negative"));
    }
    Ok(())
}

fn ensure_positive(param: &str, value: f64) -> Result<()> {
    ensure_finite(param, value)?;
    if value <= 0.0 {
        return Err(RouterError::invalid(param, "must be greater than zero"));
    }
    Ok(())
}

/// Discount and growth rates must keep `1 + rate` positive.
fn ensure_rate(param: &str, value: f64) -> Result<()> {
    ensure_finite(param, value)?;
    if value <= -1.0 {
        return Err(RouterError::invalid(param, "must be greater than -100%"));
    }
    Ok(())
}

fn ensure_cash_flows(cash_flows: &[f64]) -> Result<()> {
    for (i, cf) in cash_flows.iter().enumerate() {
        if !cf.is_finite() {
            return Err(RouterError::invalid(
                "cash_flows",
                format!("entry {} is not a finite number", i + 1),
            ));
        }
    }
    Ok(())
}

//
// ================= Engine =================
//

/// `(final - initial) / initial`
pub fn roi(initial: f64, final_value: f64) -> Result<f64> {
    ensure_finite("initial", initial)?;
    ensure_finite("final", final_value)?;
    if initial == 0.0 {
        return Err(RouterError::DivisionByZero(
            "initial investment is zero".to_string(),
        ));
    }
    finite_result((final_value - initial) / initial)
}

/// `principal * (1 + rate/m)^(m*periods)`
pub fn compound_interest(
    principal: f64,
    rate: f64,
    periods: f64,
    compounds_per_period: f64,
) -> Result<f64> {
    ensure_non_negative("principal", principal)?;
    ensure_finite("rate", rate)?;
    ensure_non_negative("periods", periods)?;
    ensure_positive("compounds_per_period", compounds_per_period)?;

    let per_compound = rate / compounds_per_period;
    if per_compound <= -1.0 {
        return Err(RouterError::invalid(
            "rate",
            "loses more than the whole balance each compounding period",
        ));
    }

    finite_result(principal * (1.0 + per_compound).powf(compounds_per_period * periods))
}

/// Standard amortized payment; a zero rate is an even split, not a division by zero.
pub fn loan_payment(principal: f64, rate_per_period: f64, num_periods: f64) -> Result<f64> {
    ensure_non_negative("principal", principal)?;
    ensure_rate("rate_per_period", rate_per_period)?;
    ensure_positive("num_periods", num_periods)?;

    if rate_per_period == 0.0 {
        return finite_result(principal / num_periods);
    }

    let r = rate_per_period;
    finite_result(principal * r / (1.0 - (1.0 + r).powf(-num_periods)))
}

pub fn financial_ratio(kind: RatioKind, numerator: f64, denominator: f64) -> Result<f64> {
    ensure_finite("numerator", numerator)?;
    ensure_finite("denominator", denominator)?;
    if denominator == 0.0 {
        return Err(RouterError::DivisionByZero(format!(
            "{} denominator is zero",
            kind.label()
        )));
    }
    finite_result(numerator / denominator)
}

/// Present value of each future cash flow; flow `i` is discounted `i + 1` periods.
pub fn present_values(rate: f64, cash_flows: &[f64]) -> Result<Vec<f64>> {
    ensure_rate("rate", rate)?;
    ensure_cash_flows(cash_flows)?;
    cash_flows
        .iter()
        .enumerate()
        .map(|(i, cf)| finite_result(cf / (1.0 + rate).powi(i as i32 + 1)))
        .collect()
}

/// `-initial_outlay + Σ cash_flows[i] / (1+rate)^(i+1)`
pub fn net_present_value(rate: f64, initial_outlay: f64, cash_flows: &[f64]) -> Result<f64> {
    ensure_finite("initial_outlay", initial_outlay)?;
    let discounted = present_values(rate, cash_flows)?;
    finite_result(discounted.iter().sum::<f64>() - initial_outlay)
}

fn npv_unchecked(rate: f64, initial_outlay: f64, cash_flows: &[f64]) -> f64 {
    cash_flows
        .iter()
        .enumerate()
        .map(|(i, cf)| cf / (1.0 + rate).powi(i as i32 + 1))
        .sum::<f64>()
        - initial_outlay
}

/// Rate at which NPV is zero, found by bisection over
/// [`IRR_LOWER_BOUND`, `IRR_UPPER_BOUND`].
pub fn internal_rate_of_return(initial_outlay: f64, cash_flows: &[f64]) -> Result<f64> {
    ensure_finite("initial_outlay", initial_outlay)?;
    ensure_cash_flows(cash_flows)?;
    if cash_flows.is_empty() {
        return Err(RouterError::invalid(
            "cash_flows",
            "at least one future cash flow is required",
        ));
    }

    // Near -100% long series overflow. An infinite NPV still has a sign and
    // brackets fine; only inf - inf (mixed-sign flows) leaves it undefined.
    let (mut lo, mut f_lo) = IRR_LOWER_FALLBACKS
        .iter()
        .map(|&rate| (rate, npv_unchecked(rate, initial_outlay, cash_flows)))
        .find(|(_, npv)| !npv.is_nan())
        .unwrap_or((IRR_LOWER_BOUND, f64::NAN));
    let mut hi = IRR_UPPER_BOUND;
    let f_hi = npv_unchecked(hi, initial_outlay, cash_flows);

    if f_lo.abs() < IRR_TOLERANCE {
        return Ok(lo);
    }
    if f_hi.abs() < IRR_TOLERANCE {
        return Ok(hi);
    }
    if f_lo.is_nan() || f_hi.is_nan() || f_lo.signum() == f_hi.signum() {
        return Err(RouterError::NoConvergence(format!(
            "NPV does not change sign between {:.0}% and {:.0}%",
            IRR_LOWER_BOUND * 100.0,
            IRR_UPPER_BOUND * 100.0
        )));
    }

    for _ in 0..IRR_MAX_ITERATIONS {
        let mid = lo + (hi - lo) / 2.0;
        let f_mid = npv_unchecked(mid, initial_outlay, cash_flows);

        if f_mid.abs() < IRR_TOLERANCE || hi - lo <= f64::EPSILON * mid.abs().max(1.0) {
            return Ok(mid);
        }

        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(RouterError::NoConvergence(format!(
        "tolerance not reached after {} iterations",
        IRR_MAX_ITERATIONS
    )))
}

//
// ================= Amortization =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmortizationRow {
    pub period: usize,
    pub payment: f64,
    pub principal: f64,
    pub interest: f64,
    pub remaining_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSummary {
    pub payment: f64,
    pub total_paid: f64,
    pub total_interest: f64,
    /// First and last few periods; empty when the term is not a whole number of periods.
    pub sample: Vec<AmortizationRow>,
}

pub fn amortization(
    principal: f64,
    rate_per_period: f64,
    num_periods: f64,
) -> Result<AmortizationSummary> {
    let payment = loan_payment(principal, rate_per_period, num_periods)?;
    let total_paid = finite_result(payment * num_periods)?;

    let mut sample = Vec::new();
    if num_periods.fract() == 0.0 && num_periods <= MAX_SCHEDULE_PERIODS {
        let n = num_periods as usize;
        let mut balance = principal;
        for period in 1..=n {
            let interest = balance * rate_per_period;
            let principal_part = payment - interest;
            balance -= principal_part;

            if period <= AMORTIZATION_SAMPLE_EDGE || period + AMORTIZATION_SAMPLE_EDGE > n {
                sample.push(AmortizationRow {
                    period,
                    payment,
                    principal: principal_part,
                    interest,
                    remaining_balance: balance.max(0.0),
                });
            }
        }
    }

    Ok(AmortizationSummary {
        payment,
        total_paid,
        total_interest: total_paid - principal,
        sample,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} ± {}, got {}",
            expected,
            tolerance,
            actual
        );
    }

    #[test]
    fn test_roi_matches_definition() {
        let cases = [
            (5000.0, 7500.0),
            (100.0, 50.0),
            (-200.0, 100.0),
            (1e-3, 2.0),
            (12345.67, 12345.67),
        ];
        for (initial, final_value) in cases {
            let got = roi(initial, final_value).unwrap();
            assert_close(got, (final_value - initial) / initial, 1e-9);
        }
        assert_close(roi(5000.0, 7500.0).unwrap(), 0.5, 1e-12);
    }

    #[test]
    fn test_roi_zero_initial_is_division_by_zero() {
        for x in [0.0, 1.0, -5.0, 1e9] {
            assert!(matches!(roi(0.0, x), Err(RouterError::DivisionByZero(_))));
        }
    }

    #[test]
    fn test_roi_rejects_non_finite() {
        let err = roi(f64::NAN, 1.0).unwrap_err();
        assert!(matches!(err, RouterError::InvalidArgument { ref param, .. } if param == "initial"));
        let err = roi(1.0, f64::INFINITY).unwrap_err();
        assert!(matches!(err, RouterError::InvalidArgument { ref param, .. } if param == "final"));
    }

    #[test]
    fn test_compound_interest() {
        assert_close(compound_interest(1000.0, 0.05, 10.0, 1.0).unwrap(), 1628.894627, 1e-5);
        assert_close(compound_interest(1000.0, 0.12, 1.0, 12.0).unwrap(), 1126.825030, 1e-5);
        assert_close(compound_interest(1000.0, 0.05, 0.0, 4.0).unwrap(), 1000.0, 1e-12);
    }

    #[test]
    fn test_compound_interest_rejects_bad_inputs() {
        assert!(matches!(
            compound_interest(1000.0, 0.05, -1.0, 1.0),
            Err(RouterError::InvalidArgument { ref param, .. }) if param == "periods"
        ));
        assert!(matches!(
            compound_interest(1000.0, 0.05, 1.0, 0.0),
            Err(RouterError::InvalidArgument { ref param, .. }) if param == "compounds_per_period"
        ));
        assert!(compound_interest(-1.0, 0.05, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_loan_payment_standard() {
        let payment = loan_payment(20000.0, 0.06 / 12.0, 48.0).unwrap();
        assert_close(payment, 469.70, 0.01);
    }

    #[test]
    fn test_loan_payment_zero_rate_is_even_split() {
        for (p, n) in [(1000.0, 10.0), (20000.0, 48.0), (1.0, 3.0), (999.99, 7.0)] {
            assert_close(loan_payment(p, 0.0, n).unwrap(), p / n, 1e-12);
        }
    }

    #[test]
    fn test_loan_payment_rejects_bad_periods() {
        for n in [0.0, -12.0, f64::NAN] {
            let err = loan_payment(1000.0, 0.01, n).unwrap_err();
            assert!(
                matches!(err, RouterError::InvalidArgument { ref param, .. } if param == "num_periods")
            );
        }
    }

    #[test]
    fn test_financial_ratio_is_plain_division() {
        assert_close(financial_ratio(RatioKind::Current, 500.0, 250.0).unwrap(), 2.0, 1e-12);
        assert_close(financial_ratio(RatioKind::Roa, 50.0, 1000.0).unwrap(), 0.05, 1e-12);
        assert!(matches!(
            financial_ratio(RatioKind::Pe, 10.0, 0.0),
            Err(RouterError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_ratio_kind_lookup() {
        assert_eq!(RatioKind::from_key("PE"), Some(RatioKind::Pe));
        assert_eq!(RatioKind::from_key("profit_margin"), Some(RatioKind::ProfitMargin));
        assert_eq!(RatioKind::from_key(" current "), Some(RatioKind::Current));
        assert_eq!(RatioKind::from_key("sharpe"), None);
        assert!(RatioKind::Current.interpretation(0.8).is_some());
    }

    #[test]
    fn test_net_present_value() {
        let npv = net_present_value(0.10, 1000.0, &[500.0, 500.0, 500.0]).unwrap();
        assert_close(npv, 243.425995, 1e-6);
        assert_close(net_present_value(0.1, 100.0, &[]).unwrap(), -100.0, 1e-12);
    }

    #[test]
    fn test_npv_decreases_with_rate() {
        let flows = [300.0, 400.0, 500.0, 200.0];
        let mut previous = f64::INFINITY;
        for step in 0..50 {
            let rate = -0.5 + step as f64 * 0.2;
            let npv = net_present_value(rate, 1000.0, &flows).unwrap();
            assert!(npv < previous);
            previous = npv;
        }
    }

    #[test]
    fn test_irr_zeroes_npv() {
        let cases: [(f64, &[f64]); 4] = [
            (1000.0, &[500.0, 500.0, 500.0]),
            (100.0, &[110.0]),
            (5000.0, &[1000.0, 1500.0, 2000.0, 2500.0]),
            (1000.0, &[100.0, 100.0, 100.0]),
        ];
        for (outlay, flows) in cases {
            let rate = internal_rate_of_return(outlay, flows).unwrap();
            assert!((IRR_LOWER_BOUND..=IRR_UPPER_BOUND).contains(&rate));
            let npv = net_present_value(rate, outlay, flows).unwrap();
            assert!(npv.abs() < 1e-6, "npv {} at rate {}", npv, rate);
        }
        assert_close(internal_rate_of_return(100.0, &[110.0]).unwrap(), 0.10, 1e-7);
    }

    #[test]
    fn test_irr_without_sign_change_fails() {
        // Inflows alone never discount down to the outlay: NPV stays positive.
        let err = internal_rate_of_return(-100.0, &[50.0, 50.0]).unwrap_err();
        assert!(matches!(err, RouterError::NoConvergence(_)));

        let err = internal_rate_of_return(100.0, &[]).unwrap_err();
        assert!(matches!(err, RouterError::InvalidArgument { ref param, .. } if param == "cash_flows"));
    }

    #[test]
    fn test_irr_large_cash_flows() {
        let cases: [(f64, &[f64]); 2] = [
            (1e10, &[3.3e9, 4.4e9, 5.5e9]),
            (2.5e12, &[1e12, 1e12, 1e12, 1e12]),
        ];
        for (outlay, flows) in cases {
            let rate = internal_rate_of_return(outlay, flows).unwrap();
            let npv = net_present_value(rate, outlay, flows).unwrap();
            // A few ulps of the flows, far below one dollar.
            assert!(npv.abs() < 1e-2, "npv {} at rate {}", npv, rate);
        }
    }

    #[test]
    fn test_irr_long_series_near_lower_bound() {
        // (1 - 0.99)^-400 overflows: NPV at the lower bound is +inf, still a valid bracket end.
        let flows = vec![10.0; 400];
        let rate = internal_rate_of_return(1000.0, &flows).unwrap();
        assert!(net_present_value(rate, 1000.0, &flows).unwrap().abs() < 1e-6);
        assert!(rate > 0.0 && rate < 0.01);
    }

    #[test]
    fn test_overflowing_results_are_rejected() {
        let err = compound_interest(1000.0, 0.5, 5000.0, 1.0).unwrap_err();
        assert!(matches!(err, RouterError::InvalidArgument { ref param, .. } if param == "result"));

        assert!(financial_ratio(RatioKind::Custom, 1e308, 1e-308).is_err());
        assert!(roi(1e-308, 1e308).is_err());
        assert!(net_present_value(0.0, -1e308, &[1e308, 1e308]).is_err());
        assert!(amortization(1e300, 0.0, 1e-300).is_err());
    }

    #[test]
    fn test_amortization_sample() {
        let summary = amortization(20000.0, 0.005, 48.0).unwrap();
        assert_eq!(summary.sample.len(), 10);
        assert_eq!(summary.sample[0].period, 1);
        assert_eq!(summary.sample[9].period, 48);
        assert_close(summary.sample[0].interest, 100.0, 1e-9);
        assert!(summary.sample[9].remaining_balance < 0.01);
        assert_close(summary.total_interest, summary.total_paid - 20000.0, 1e-9);
    }

    #[test]
    fn test_compounding_words() {
        assert_eq!(Compounding::from_word("Monthly"), Some(Compounding::Monthly));
        assert_eq!(Compounding::from_word("semi-annually,"), Some(Compounding::Semiannual));
        assert_eq!(Compounding::Daily.per_year(), 365);
        assert_eq!(Compounding::from_word("hourly"), None);
    }
}
