//! Utility functions for identifiers and locations

use bech32::Bech32m;
use uuid7::uuid7;

/// Location recorded in ledger blocks when no coordinates were supplied.
pub const NO_LOCATION: &str = "N/A";

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// `"lat,lon"` when both coordinates are known, otherwise [`NO_LOCATION`].
/// Whole degrees keep their fraction, `35.0,139.0` rather than `35,139`.
pub fn location_label(latitude: Option<f64>, longitude: Option<f64>) -> String {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => format!("{lat:?},{lon:?}"),
        _ => NO_LOCATION.to_string(),
    }
}
