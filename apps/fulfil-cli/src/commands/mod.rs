//! Subcommand implementations.

pub mod config;
pub mod coupon;
pub mod quote;
pub mod refund;
pub mod shipment;

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

use fulfil_core::CartLine;

/// Reads a JSON document from disk.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Reads cart lines and checks each one the way the cart would.
pub(crate) fn read_lines(path: &Path) -> anyhow::Result<Vec<CartLine>> {
    let lines: Vec<CartLine> = read_json(path)?;
    anyhow::ensure!(
        lines.len() <= fulfil_core::MAX_CART_LINES,
        "a cart holds at most {} lines",
        fulfil_core::MAX_CART_LINES
    );
    for line in &lines {
        fulfil_core::validation::validate_cart_line(line)
            .with_context(|| format!("line {}", line.product_ref))?;
    }
    Ok(lines)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
