use std::path::Path;

use tracing::info;

use fulfil_core::shipment::aggregate_with;
use fulfil_core::PackingKind;
use fulfil_engine::EngineConfig;

use super::{print_json, read_lines};

pub fn run(config: &EngineConfig, lines: &Path, packing: Option<PackingKind>) -> anyhow::Result<()> {
    let lines = read_lines(lines)?;
    let packing = packing.unwrap_or(config.shipment.packing);

    let params = aggregate_with(&lines, packing.policy(), &config.shipment.defaults);
    info!(
        lines = lines.len(),
        ?packing,
        weight = params.total_weight,
        "Shipment aggregated"
    );
    print_json(&params)
}
