use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use fulfil_core::shipment::aggregate_with;
use fulfil_core::{DeliveryQuote, ShipmentParameters};
use fulfil_engine::{DeliveryFeeNormalizer, EngineConfig, RateCardCourier};

use super::{print_json, read_lines};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteReport {
    pickup_pincode: String,
    delivery_pincode: String,
    cod: bool,
    shipment: ShipmentParameters,
    quote: DeliveryQuote,
}

pub async fn run(
    config: &EngineConfig,
    lines: &Path,
    pincode: &str,
    cod: bool,
) -> anyhow::Result<()> {
    let lines = read_lines(lines)?;
    let shipment = aggregate_with(
        &lines,
        config.shipment.packing.policy(),
        &config.shipment.defaults,
    );

    let courier = Arc::new(RateCardCourier::new(config.courier.rate_card.clone()));
    let normalizer = DeliveryFeeNormalizer::new(courier, &config.courier);
    let quote = normalizer.quote(&shipment, pincode, cod).await?;

    info!(
        pincode,
        serviceable = quote.serviceable,
        fee = %quote.billable_fee,
        "Delivery quoted"
    );
    print_json(&QuoteReport {
        pickup_pincode: normalizer.pickup_pincode().to_string(),
        delivery_pincode: pincode.trim().to_string(),
        cod,
        shipment,
        quote,
    })
}
