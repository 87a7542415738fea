//! Data-driven catalog loading from JSON.
//!
//! Feature-gated behind `data-loader`. Items are declared flat; formulas
//! reference items by id and are wired onto producer and consumer items
//! exactly as [`MemoryCatalog::add_formula`] does.

use crate::catalog::{Catalog, Item, ItemClass, MemoryCatalog, Rarity};
use crate::formula::{Formula, FormulaError, FormulaType};
use crate::id::ItemId;
use crate::ingredient::Ingredient;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while loading catalog data.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("unknown item reference: {0}")]
    UnknownItemRef(String),
    #[error("invalid formula producing {result}: {source}")]
    InvalidFormula {
        result: String,
        source: FormulaError,
    },
}

// ---------------------------------------------------------------------------
// JSON data structures
// ---------------------------------------------------------------------------

/// Top-level catalog data structure for JSON deserialization.
#[derive(Debug, serde::Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub items: Vec<ItemData>,
    #[serde(default)]
    pub formulas: Vec<FormulaData>,
}

/// JSON representation of an item.
#[derive(Debug, serde::Deserialize)]
pub struct ItemData {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub class: ItemClass,
}

/// JSON representation of a formula. Items are referenced by id.
#[derive(Debug, serde::Deserialize)]
pub struct FormulaData {
    #[serde(rename = "type", default)]
    pub kind: FormulaType,
    pub result: EntryData,
    pub ingredients: Vec<EntryData>,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
}

/// One item/quantity pair.
#[derive(Debug, serde::Deserialize)]
pub struct EntryData {
    pub item: String,
    pub qty: i64,
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

/// Load a catalog from a JSON string.
pub fn load_catalog_json(json: &str) -> Result<MemoryCatalog, DataLoadError> {
    let data: CatalogData = serde_json::from_str(json)?;
    build_catalog(data)
}

/// Load a catalog from JSON bytes.
pub fn load_catalog_json_bytes(bytes: &[u8]) -> Result<MemoryCatalog, DataLoadError> {
    let data: CatalogData = serde_json::from_slice(bytes)?;
    build_catalog(data)
}

/// Build a catalog from already-parsed data. Formula item references must
/// resolve against the declared items.
pub fn build_catalog(data: CatalogData) -> Result<MemoryCatalog, DataLoadError> {
    let mut catalog = MemoryCatalog::new();
    for entry in data.items {
        let mut item = Item::new(entry.id.clone(), entry.value, entry.rarity, entry.class);
        if let Some(name) = entry.name {
            item.name = name;
        }
        item.symbol = entry.symbol;
        catalog.insert(item);
    }

    for entry in data.formulas {
        let resolve = |id: &String| -> Result<ItemId, DataLoadError> {
            let item_id = ItemId::from(id.clone());
            if catalog.get_item(&item_id).is_none() {
                return Err(DataLoadError::UnknownItemRef(id.clone()));
            }
            Ok(item_id)
        };

        let result_id = resolve(&entry.result.item)?;
        let ingredients = entry
            .ingredients
            .iter()
            .map(|e| Ok(Ingredient::new(resolve(&e.item)?, e.qty)))
            .collect::<Result<Vec<_>, DataLoadError>>()?;

        let mut formula = Formula::new(
            entry.kind,
            Ingredient::new(result_id, entry.result.qty),
            ingredients,
        )
        .map_err(|source| DataLoadError::InvalidFormula {
            result: entry.result.item.clone(),
            source,
        })?;
        if let Some(process) = entry.process {
            formula = formula.with_process(process, entry.time.unwrap_or(0.0));
        } else {
            formula.time = entry.time;
        }
        catalog.add_formula(formula);
    }

    Ok(catalog)
}
