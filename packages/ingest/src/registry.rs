//! Layer registry: loads per-level layer definitions from embedded TOML.
//!
//! Each `.toml` file in `packages/ingest/layers/` is baked into the binary
//! at compile time via [`include_str!`]. A layer lists the attribute
//! columns that carry localized names, Latin names, and explicit parents
//! for one administrative level.

use boundary_map_geography_models::Level;
use boundary_map_ingest_models::LayerDefinition;

/// TOML configs embedded at compile time.
const LAYER_TOMLS: &[(&str, &str)] = &[
    ("province", include_str!("../layers/province.toml")),
    ("county", include_str!("../layers/county.toml")),
    ("bakhsh", include_str!("../layers/bakhsh.toml")),
    ("city", include_str!("../layers/city.toml")),
];

/// Returns every layer definition, root level first.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse.
#[must_use]
pub fn all_layers() -> Vec<LayerDefinition> {
    LAYER_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// The layer definition for `level`.
#[must_use]
pub fn layer_for(level: Level) -> Option<LayerDefinition> {
    all_layers().into_iter().find(|layer| layer.level == level)
}

#[cfg(test)]
const EXPECTED_LAYER_COUNT: usize = 4;
