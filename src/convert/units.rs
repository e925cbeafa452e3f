//! Unit → field name table
//!
//! Downstream queries rely on these names, so they never depend on how an
//! upstream file labels its columns.

/// Field used when a record's unit is missing or unknown
pub const FALLBACK_FIELD: &str = "value";

const UNIT_FIELDS: &[(&str, &str)] = &[
    ("mw", "power_mw"),
    ("kw", "power_kw"),
    ("gw", "power_gw"),
    ("mwh", "energy_mwh"),
    ("kwh", "energy_kwh"),
    ("gwh", "energy_gwh"),
    ("mwmed", "power_mw_avg"),
    ("mw med", "power_mw_avg"),
    ("mwavg", "power_mw_avg"),
    ("%", "percent"),
    ("brl/mwh", "price_brl_mwh"),
    ("r$/mwh", "price_brl_mwh"),
];

/// Field name for a unit string, case-insensitive
pub fn field_for_unit(unit: &str) -> Option<&'static str> {
    let unit = unit.trim().to_lowercase();
    UNIT_FIELDS
        .iter()
        .find(|(u, _)| *u == unit)
        .map(|(_, field)| *field)
}

/// Field name for a unit, falling back to [`FALLBACK_FIELD`]
pub fn field_or_fallback(unit: Option<&str>) -> &'static str {
    unit.and_then(field_for_unit).unwrap_or(FALLBACK_FIELD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_units() {
        assert_eq!(field_for_unit("MW"), Some("power_mw"));
        assert_eq!(field_for_unit("mwh"), Some("energy_mwh"));
        assert_eq!(field_for_unit(" GWh "), Some("energy_gwh"));
        assert_eq!(field_for_unit("MWmed"), Some("power_mw_avg"));
        assert_eq!(field_for_unit("%"), Some("percent"));
        assert_eq!(field_for_unit("BRL/MWh"), Some("price_brl_mwh"));
    }

    #[test]
    fn test_unknown_unit_falls_back() {
        assert_eq!(field_for_unit("furlongs"), None);
        assert_eq!(field_or_fallback(Some("furlongs")), "value");
        assert_eq!(field_or_fallback(None), "value");
        assert_eq!(field_or_fallback(Some("kW")), "power_kw");
    }
}
