//! Calculation suite: one capability per engine formula.
//!
//! Each payload carries `formula`, the inputs, a `result` figure and the
//! formula-specific extras (amortization sample, present values, ...).

use crate::calc::{self, Formula, RatioKind};
use crate::error::RouterError;
use crate::models::Arguments;
use crate::tools::schema::{ChoiceOption, DefaultValue, InputSchema, ParamKind, ParamSpec};
use crate::tools::CapabilityDescriptor;
use crate::Result;
use serde_json::{json, Value};

pub const GROUP: &str = "financial_calculator";

const RATIO_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption {
        value: "current",
        synonyms: &["current ratio", "liquidity ratio"],
    },
    ChoiceOption {
        value: "quick",
        synonyms: &["quick ratio", "acid test", "acid-test"],
    },
    ChoiceOption {
        value: "debt",
        synonyms: &["debt ratio", "debt to assets", "debt-to-assets", "leverage"],
    },
    ChoiceOption {
        value: "roe",
        synonyms: &["return on equity"],
    },
    ChoiceOption {
        value: "roa",
        synonyms: &["return on assets"],
    },
    ChoiceOption {
        value: "profit_margin",
        synonyms: &["profit margin", "net margin", "net profit margin"],
    },
    ChoiceOption {
        value: "pe",
        synonyms: &["price to earnings", "price-to-earnings", "p/e", "pe ratio"],
    },
    ChoiceOption {
        value: "pb",
        synonyms: &["price to book", "price-to-book", "p/b", "pb ratio"],
    },
    ChoiceOption {
        value: "interest_coverage",
        synonyms: &["interest coverage", "times interest earned"],
    },
    ChoiceOption {
        value: "custom",
        synonyms: &["ratio"],
    },
];

pub fn descriptor(formula: Formula) -> CapabilityDescriptor {
    let (description, params) = match formula {
        Formula::Roi => (
            "Return on investment: (final - initial) / initial.",
            vec![
                ParamSpec::required("initial", ParamKind::CurrencyAmount, "amount invested")
                    .cues(&[
                        "initial", "invest", "invested", "investment", "bought", "paid", "cost",
                        "purchased", "from", "started",
                    ]),
                ParamSpec::required("final", ParamKind::CurrencyAmount, "value now or at sale")
                    .cues(&[
                        "final", "worth", "now", "sold", "value", "grew", "became", "ending", "to",
                        "current",
                    ]),
            ],
        ),
        Formula::CompoundInterest => (
            "Future value with compound interest: principal * (1 + rate/n)^(n*periods).",
            vec![
                ParamSpec::required("principal", ParamKind::CurrencyAmount, "starting amount")
                    .cues(&[
                        "principal", "invest", "invested", "deposit", "deposited", "save", "saved",
                        "initial", "grow", "starting",
                    ]),
                ParamSpec::required("rate", ParamKind::PercentageRate, "annual interest rate")
                    .cues(&["at", "rate", "interest", "yield", "return", "apy"]),
                ParamSpec::required("periods", ParamKind::DurationInPeriods, "years")
                    .cues(&["for", "over", "after", "term"]),
                ParamSpec::optional(
                    "compounds_per_period",
                    ParamKind::CompoundingFrequency,
                    "compounding frequency per year",
                )
                .default_value(DefaultValue::Number(1.0)),
            ],
        ),
        Formula::LoanPayment => (
            "Amortized payment per period for a loan, with totals and a schedule sample.",
            vec![
                ParamSpec::required("principal", ParamKind::CurrencyAmount, "amount borrowed")
                    .cues(&["loan", "principal", "borrow", "borrowed", "mortgage", "financing"]),
                ParamSpec::required("rate_per_period", ParamKind::PercentageRate, "interest rate")
                    .cues(&["at", "rate", "interest", "apr"])
                    .per_period(),
                ParamSpec::required("num_periods", ParamKind::DurationInPeriods, "term")
                    .cues(&["over", "for", "term", "payments", "installments"])
                    .per_period(),
            ],
        ),
        Formula::FinancialRatio => (
            "A financial ratio (current, quick, debt, ROE, ROA, profit margin, P/E, P/B, \
             interest coverage) as numerator / denominator.",
            vec![
                ParamSpec::required(
                    "kind",
                    ParamKind::Choice {
                        options: RATIO_OPTIONS,
                    },
                    "which ratio",
                ),
                ParamSpec::required("numerator", ParamKind::Number, "top of the fraction")
                    .cues(&["numerator"]),
                ParamSpec::required("denominator", ParamKind::Number, "bottom of the fraction")
                    .cues(&["denominator", "divided by"]),
            ],
        ),
        Formula::NetPresentValue => (
            "Net present value: -outlay + sum(cash_flow[i] / (1 + rate)^(i+1)).",
            vec![
                ParamSpec::required("rate", ParamKind::PercentageRate, "discount rate")
                    .cues(&["rate", "discount", "at", "hurdle"]),
                ParamSpec::required("initial_outlay", ParamKind::CurrencyAmount, "upfront cost")
                    .cues(&["outlay", "initial", "investment", "invest", "cost", "upfront"]),
                ParamSpec::required("cash_flows", ParamKind::AmountSeries, "future cash flows")
                    .cues(&["cash flows", "cash flow", "flows", "inflows", "returns"]),
            ],
        ),
        Formula::InternalRateOfReturn => (
            "Internal rate of return: the rate at which NPV is zero.",
            vec![
                ParamSpec::required("initial_outlay", ParamKind::CurrencyAmount, "upfront cost")
                    .cues(&["outlay", "initial", "investment", "invest", "cost", "upfront"]),
                ParamSpec::required("cash_flows", ParamKind::AmountSeries, "future cash flows")
                    .cues(&["cash flows", "cash flow", "flows", "inflows", "returns"]),
            ],
        ),
    };

    CapabilityDescriptor {
        name: formula.capability_name().to_string(),
        description: description.to_string(),
        group: Some(GROUP.to_string()),
        schema: InputSchema::new(params),
    }
}

fn number(args: &Arguments, name: &str) -> Result<f64> {
    args.get(name)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| RouterError::invalid(name, "missing or not a number"))
}

fn series<'a>(args: &'a Arguments, name: &str) -> Result<&'a [f64]> {
    args.get(name)
        .and_then(|v| v.as_series())
        .ok_or_else(|| RouterError::invalid(name, "missing or not a list of amounts"))
}

/// Run `formula` over already-validated arguments.
pub fn invoke(formula: Formula, args: &Arguments) -> Result<Value> {
    let name = formula.capability_name();

    let payload = match formula {
        Formula::Roi => {
            let initial = number(args, "initial")?;
            let final_value = number(args, "final")?;
            let roi = calc::roi(initial, final_value)?;
            json!({
                "formula": name,
                "initial": initial,
                "final": final_value,
                "gain": final_value - initial,
                "result": roi,
            })
        }
        Formula::CompoundInterest => {
            let principal = number(args, "principal")?;
            let rate = number(args, "rate")?;
            let periods = number(args, "periods")?;
            let compounds = args
                .get("compounds_per_period")
                .and_then(|v| v.as_f64())
                .unwrap_or(1.0);
            let amount = calc::compound_interest(principal, rate, periods, compounds)?;
            json!({
                "formula": name,
                "principal": principal,
                "rate": rate,
                "periods": periods,
                "compounds_per_period": compounds,
                "result": amount,
                "interest_earned": amount - principal,
            })
        }
        Formula::LoanPayment => {
            let principal = number(args, "principal")?;
            let rate = number(args, "rate_per_period")?;
            let periods = number(args, "num_periods")?;
            let summary = calc::amortization(principal, rate, periods)?;
            json!({
                "formula": name,
                "principal": principal,
                "rate_per_period": rate,
                "num_periods": periods,
                "result": summary.payment,
                "total_paid": summary.total_paid,
                "total_interest": summary.total_interest,
                "schedule_sample": summary.sample,
            })
        }
        Formula::FinancialRatio => {
            let key = args
                .get("kind")
                .and_then(|v| v.as_str())
                .unwrap_or("custom");
            let kind = RatioKind::from_key(key)
                .ok_or_else(|| RouterError::invalid("kind", format!("unknown ratio '{}'", key)))?;
            let numerator = number(args, "numerator")?;
            let denominator = number(args, "denominator")?;
            let value = calc::financial_ratio(kind, numerator, denominator)?;
            json!({
                "formula": name,
                "kind": kind.key(),
                "label": kind.label(),
                "definition": kind.formula(),
                "numerator": numerator,
                "denominator": denominator,
                "result": value,
                "is_percentage": kind.is_percentage(),
                "interpretation": kind.interpretation(value),
            })
        }
        Formula::NetPresentValue => {
            let rate = number(args, "rate")?;
            let outlay = number(args, "initial_outlay")?;
            let flows = series(args, "cash_flows")?;
            let npv = calc::net_present_value(rate, outlay, flows)?;
            json!({
                "formula": name,
                "rate": rate,
                "initial_outlay": outlay,
                "cash_flows": flows,
                "present_values": calc::present_values(rate, flows)?,
                "result": npv,
            })
        }
        Formula::InternalRateOfReturn => {
            let outlay = number(args, "initial_outlay")?;
            let flows = series(args, "cash_flows")?;
            let irr = calc::internal_rate_of_return(outlay, flows)?;
            json!({
                "formula": name,
                "initial_outlay": outlay,
                "cash_flows": flows,
                "result": irr,
            })
        }
    };

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ArgumentExtractor;

    fn run(formula: Formula, text: &str) -> Result<Value> {
        let extractor = ArgumentExtractor::new()?;
        let descriptor = descriptor(formula);
        let args = extractor.extract(&descriptor.name, text, &descriptor.schema)?;
        invoke(formula, &args)
    }

    #[test]
    fn test_every_formula_has_a_grouped_descriptor() {
        for formula in Formula::ALL {
            let d = descriptor(formula);
            assert_eq!(d.name, formula.capability_name());
            assert_eq!(d.group.as_deref(), Some(GROUP));
            assert!(!d.schema.params().is_empty());
        }
    }

    #[test]
    fn test_roi_end_to_end() {
        let payload = run(
            Formula::Roi,
            "Calculate the ROI of an investment of $5000 that is now worth $7500",
        )
        .unwrap();
        assert_eq!(payload["result"], json!(0.5));
        assert_eq!(payload["gain"], json!(2500.0));
    }

    #[test]
    fn test_loan_end_to_end() {
        let payload = run(
            Formula::LoanPayment,
            "What is the monthly payment on a $20000 loan at 6% annual interest over 4 years?",
        )
        .unwrap();
        let payment = payload["result"].as_f64().unwrap();
        assert!((payment - 469.70).abs() < 0.01);
        assert_eq!(payload["num_periods"], json!(48.0));
        assert_eq!(payload["schedule_sample"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_ratio_with_kind_choice() {
        let payload = run(
            Formula::FinancialRatio,
            "current ratio with current assets of 50000 and current liabilities of 25000",
        )
        .unwrap();
        assert_eq!(payload["kind"], json!("current"));
        assert_eq!(payload["result"], json!(2.0));
        assert!(payload["interpretation"].is_string());
    }

    #[test]
    fn test_npv_and_irr_from_text() {
        let npv = run(
            Formula::NetPresentValue,
            "NPV at a discount rate of 10% for an initial investment of $1000 with cash flows of 500, 500, 500",
        )
        .unwrap();
        assert!((npv["result"].as_f64().unwrap() - 243.425995).abs() < 1e-6);
        assert_eq!(npv["present_values"].as_array().unwrap().len(), 3);

        let irr = run(
            Formula::InternalRateOfReturn,
            "IRR for an initial outlay of 100 with cash flows [110]",
        )
        .unwrap();
        assert!((irr["result"].as_f64().unwrap() - 0.10).abs() < 1e-6);
    }

    #[test]
    fn test_calculation_errors_surface() {
        let err = run(Formula::Roi, "initial 0 final 100").unwrap_err();
        assert!(matches!(err, RouterError::DivisionByZero(_)));
    }
}
