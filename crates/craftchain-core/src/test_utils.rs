//! Shared test fixtures for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the same
//! constructors serve in-crate tests and the integration-test crate (via the
//! `test-utils` feature).

use crate::catalog::{Item, ItemClass, MemoryCatalog, Rarity};
use crate::formula::{Formula, FormulaType};
use crate::ingredient::Ingredient;

// ===========================================================================
// Item constructors
// ===========================================================================

pub fn resource(id: &str, value: f64) -> Item {
    Item::new(id, value, Rarity::Common, ItemClass::Resource)
}

pub fn product(id: &str, value: f64) -> Item {
    Item::new(id, value, Rarity::Common, ItemClass::Product)
}

// ===========================================================================
// Formula constructors
// ===========================================================================

pub fn refining(result: (&str, i64), ingredients: &[(&str, i64)], time: f64) -> Formula {
    Formula::new(
        FormulaType::Refining,
        Ingredient::new(result.0, result.1),
        ingredients
            .iter()
            .map(|&(id, qty)| Ingredient::new(id, qty)),
    )
    .expect("valid refining fixture")
    .with_process("Refine", time)
}

pub fn craft(result: (&str, i64), ingredients: &[(&str, i64)]) -> Formula {
    Formula::new(
        FormulaType::Craft,
        Ingredient::new(result.0, result.1),
        ingredients
            .iter()
            .map(|&(id, qty)| Ingredient::new(id, qty)),
    )
    .expect("valid craft fixture")
}

// ===========================================================================
// Catalogs
// ===========================================================================

/// Faecium + Pugneum -> Gold x2, with raw values on every input resource.
pub fn gold_refinery_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.insert(resource("Faecium", 30.0));
    catalog.insert(resource("Pugneum", 138.0));
    catalog.insert(Item::new("Gold", 220.0, Rarity::Uncommon, ItemClass::Tradeable));
    catalog.add_formula(
        Formula::new(
            FormulaType::Refining,
            Ingredient::new("Gold", 2),
            [Ingredient::new("Faecium", 1), Ingredient::new("Pugneum", 1)],
        )
        .expect("valid gold fixture")
        .with_process("Alchemical Growth", 0.36),
    );
    catalog
}

/// A two-formula replenishing loop: `A x2 <- B x1`, `B x1 <- A x1`.
pub fn replenishing_pair_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.insert(resource("A", 10.0));
    catalog.insert(resource("B", 15.0));
    catalog.add_formula(refining(("A", 2), &[("B", 1)], 1.2));
    catalog.add_formula(refining(("B", 1), &[("A", 1)], 0.9));
    catalog
}

/// A three-tier crafting catalog: ore -> iron (x5 batches) -> plate/frame,
/// where plate needs Iron x3, frame needs Iron x2, and a composite takes one
/// of each.
pub fn iron_sharing_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.insert(resource("Ore", 2.0));
    catalog.insert(product("Iron", 10.0));
    catalog.insert(product("Plate", 40.0));
    catalog.insert(product("Frame", 35.0));
    catalog.insert(product("Composite", 90.0));
    catalog.add_formula(refining(("Iron", 5), &[("Ore", 10)], 5.0));
    catalog.add_formula(refining(("Plate", 1), &[("Iron", 3)], 2.0));
    catalog.add_formula(refining(("Frame", 1), &[("Iron", 2)], 2.0));
    catalog.add_formula(refining(("Composite", 1), &[("Plate", 1), ("Frame", 1)], 3.0));
    catalog
}
