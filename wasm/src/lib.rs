use pedigree_layout::config::parse_config;
use pedigree_layout::layout_dump::LayoutDump;
use pedigree_layout::{LayoutConfig, compute_layout, parse_dataset};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

/// Per-call overrides on top of the layout config.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PedigreeLayoutOptions {
    root_id: Option<String>,
    filter_unrelated_individuals: Option<bool>,
    visible_diseases: Option<Vec<String>>,
    skip_malformed_records: Option<bool>,
    /// Full config document, same shape as the `pedlay --configFile` file.
    config: Option<serde_json::Value>,
}

fn build_config(options: PedigreeLayoutOptions) -> Result<LayoutConfig, String> {
    let mut config = match options.config {
        Some(raw) => parse_config(&raw.to_string()).map_err(|error| error.to_string())?,
        None => LayoutConfig::default(),
    };
    if let Some(root_id) = options.root_id {
        config.root_id = Some(root_id);
    }
    if let Some(filter) = options.filter_unrelated_individuals {
        config.filter_unrelated_individuals = filter;
    }
    if let Some(visible) = options.visible_diseases {
        config.visible_diseases = Some(visible);
    }
    if let Some(skip) = options.skip_malformed_records {
        config.skip_malformed_records = skip;
    }
    Ok(config)
}

fn layout_json(dataset_json: &str, options_json: Option<String>) -> Result<String, String> {
    let options = match options_json {
        Some(raw_options) => serde_json::from_str::<PedigreeLayoutOptions>(&raw_options)
            .map_err(|error| error.to_string())?,
        None => PedigreeLayoutOptions::default(),
    };
    let config = build_config(options)?;
    let records = parse_dataset(dataset_json).map_err(|error| error.to_string())?;
    let layout = compute_layout(&records, &config).map_err(|error| error.to_string())?;
    let dump = LayoutDump::from_layout(&layout, config.dimensions.corner_radius);
    serde_json::to_string(&dump).map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn layout_pedigree(dataset_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    layout_json(dataset_json, options_json).map_err(|error| JsValue::from_str(&error))
}
