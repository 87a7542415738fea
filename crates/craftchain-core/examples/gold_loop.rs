//! Detect the replenishing gold loop in a tiny catalog and report its net
//! profit and wall-clock estimate.
//!
//! Run with: `cargo run --example gold_loop --features data-loader`

use craftchain_core::catalog::{Catalog, ItemClass};
use craftchain_core::chain::detect_formula_cycles;
use craftchain_core::data_loader::load_catalog_json;
use craftchain_core::id::ItemId;
use craftchain_core::refinery::{DEFAULT_CRAFT_TIME, RefineryLimits, refiner_output_batch};

const CATALOG_JSON: &str = r#"{
    "items": [
        {"id": "Faecium", "value": 30.0, "class": "resource"},
        {"id": "Mordite", "value": 40.0, "class": "resource"},
        {"id": "Gold", "value": 220.0, "rarity": "uncommon", "class": "resource"}
    ],
    "formulas": [
        {
            "type": "refining",
            "result": {"item": "Faecium", "qty": 2},
            "ingredients": [{"item": "Mordite", "qty": 1}],
            "process": "Organic Refinement",
            "time": 1.2
        },
        {
            "type": "refining",
            "result": {"item": "Mordite", "qty": 3},
            "ingredients": [{"item": "Faecium", "qty": 1}],
            "process": "Mordite Growth",
            "time": 1.8
        },
        {
            "type": "refining",
            "result": {"item": "Gold", "qty": 2},
            "ingredients": [{"item": "Faecium", "qty": 1}],
            "process": "Alchemical Growth",
            "time": 0.36
        }
    ]
}"#;

fn main() {
    let catalog = load_catalog_json(CATALOG_JSON).expect("embedded catalog is valid");

    let start = catalog
        .get_item(&ItemId::from("Gold"))
        .expect("gold is in the catalog")
        .source_formulas
        .clone();

    let report = detect_formula_cycles(&catalog, start);
    println!(
        "inspected {} formulas, found {} cycle(s)",
        report.inspected_nodes, report.cycle_count
    );

    for (item, chains) in &report.cycles {
        println!("\ncycles closing on {item}:");
        for chain in chains {
            let mut chain = chain.clone();
            println!("  {chain}");

            let value = chain.estimate_value(|id| catalog.get_item(id).map(|i| i.value));
            println!(
                "  costs {:.1} -> value {:.1} (profit {:+.1})",
                value.costs,
                value.value,
                value.profit()
            );

            let batch_cap = |id: &ItemId| {
                refiner_output_batch(
                    catalog
                        .get_item(id)
                        .map(|i| i.class)
                        .unwrap_or(ItemClass::Unknown),
                )
            };
            let time = chain
                .estimate_time(batch_cap, DEFAULT_CRAFT_TIME, RefineryLimits::default(), false)
                .expect("default limits are valid");
            println!("  one pass takes {time:?}");
        }
    }
}
