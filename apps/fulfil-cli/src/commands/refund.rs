use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use fulfil_core::refund::compute_refund;
use fulfil_core::{Money, OrderTotals, RefundBreakdown, ReturnLine};

use super::{print_json, read_lines};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundReport {
    totals: OrderTotals,
    #[serde(flatten)]
    breakdown: RefundBreakdown,
    total_restitution: Money,
}

pub fn run(lines: &Path, select: &[String], discount: i64, shipping: i64) -> anyhow::Result<()> {
    let lines = read_lines(lines)?;
    let selection = select
        .iter()
        .map(|s| parse_selection(s))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let totals = OrderTotals::compute(&lines, Money::from_rupees(discount), Money::from_rupees(shipping));
    let breakdown = compute_refund(&lines, &totals, &selection)?;

    print_json(&RefundReport {
        totals,
        total_restitution: breakdown.total_restitution(),
        breakdown,
    })
}

/// Parses `line:qty`, e.g. `0:2`.
fn parse_selection(raw: &str) -> anyhow::Result<ReturnLine> {
    let (index, quantity) = raw
        .split_once(':')
        .with_context(|| format!("expected line:qty, got '{}'", raw))?;
    Ok(ReturnLine {
        line_index: index.trim().parse().with_context(|| format!("bad line index in '{}'", raw))?,
        quantity: quantity.trim().parse().with_context(|| format!("bad quantity in '{}'", raw))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        let line = parse_selection("2:3").unwrap();
        assert_eq!(line.line_index, 2);
        assert_eq!(line.quantity, 3);
        assert_eq!(parse_selection(" 0 : 1 ").unwrap().quantity, 1);
    }

    #[test]
    fn test_parse_selection_rejects_garbage() {
        assert!(parse_selection("2").is_err());
        assert!(parse_selection("a:1").is_err());
        assert!(parse_selection("1:-1").is_err());
    }
}
