//! Asset codes
//!
//! An asset is an uppercase code with an optional decimal precision suffix,
//! e.g. `COIN`, `USD/2`, `EUR/2`.

use crate::error::{Result, TypesError};

/// Maximum length of the code part of an asset
pub const MAX_ASSET_CODE_LEN: usize = 17;

/// Maximum number of digits of the precision suffix
pub const MAX_ASSET_PRECISION_DIGITS: usize = 6;

/// Check an asset code (`[A-Z][A-Z0-9]{0,16}(/\d{1,6})?`)
pub fn is_valid_asset(asset: &str) -> bool {
    let (code, precision) = match asset.split_once('/') {
        Some((code, precision)) => (code, Some(precision)),
        None => (asset, None),
    };

    let mut chars = code.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    if code.len() > MAX_ASSET_CODE_LEN
        || !chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return false;
    }

    match precision {
        None => true,
        Some(p) => {
            !p.is_empty()
                && p.len() <= MAX_ASSET_PRECISION_DIGITS
                && p.chars().all(|c| c.is_ascii_digit())
        }
    }
}

/// Validate an asset code, returning it on success
pub fn validate_asset(asset: &str) -> Result<&str> {
    if is_valid_asset(asset) {
        Ok(asset)
    } else {
        Err(TypesError::InvalidAsset {
            asset: asset.to_string(),
        })
    }
}
