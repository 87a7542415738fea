//! The catalog boundary: resolved items and the collaborator trait that
//! supplies them.
//!
//! The algorithmic core never performs I/O. Whatever fetches and stores item
//! data (a wiki scraper, a database, a test fixture) sits behind [`Catalog`]
//! and hands the core fully materialized [`Item`]s with their formulas
//! already attached.

use crate::formula::Formula;
use crate::graph::WalkDirection;
use crate::id::{FormulaId, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// How hard an item is to come by. Ordered from most to least available;
/// `Unknown` sorts last so unrated items never beat rated ones.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    VeryRare,
    #[default]
    Unknown,
}

/// Broad item category. The core only branches on `Resource` (raw materials
/// terminate BOM recursion and get the large refiner output slot).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ItemClass {
    #[default]
    Unknown,
    Resource,
    Product,
    Tradeable,
    Component,
    Consumable,
    Technology,
    FuelSource,
    CookingIngredient,
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A fully resolved catalog entry.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub symbol: Option<String>,
    pub value: f64,
    pub rarity: Rarity,
    pub class: ItemClass,
    /// Formulas producing this item.
    pub source_formulas: Vec<Formula>,
    /// Formulas consuming this item as an ingredient.
    pub formulas: Vec<Formula>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, value: f64, rarity: Rarity, class: ItemClass) -> Self {
        let id = id.into();
        Self {
            name: id.0.clone(),
            id,
            symbol: None,
            value,
            rarity,
            class,
            source_formulas: Vec::new(),
            formulas: Vec::new(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn symbol_or_id(&self) -> &str {
        self.symbol.as_deref().unwrap_or(self.id.as_str())
    }

    /// Snapshot of the attributes BOMs embed per component.
    pub fn info(&self) -> ItemInfo {
        ItemInfo {
            id: self.id.clone(),
            value: self.value,
            rarity: self.rarity,
            class: self.class,
        }
    }
}

/// Value/rarity snapshot of an item, embedded in BOM components so a finished
/// BOM stays valid even if the catalog is refreshed underneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub id: ItemId,
    pub value: f64,
    pub rarity: Rarity,
    pub class: ItemClass,
}

// ---------------------------------------------------------------------------
// Catalog trait
// ---------------------------------------------------------------------------

/// The external collaborator resolving item ids to structured data.
///
/// A missing id is an `Option::None`, never a panic: unresolvable references
/// simply prune the traversal branch that needed them.
pub trait Catalog {
    fn get_item(&self, id: &ItemId) -> Option<&Item>;

    /// Resolve many ids, silently dropping the unresolved ones.
    fn get_items<'a, 'b>(&'a self, ids: impl IntoIterator<Item = &'b ItemId>) -> Vec<&'a Item> {
        ids.into_iter().filter_map(|id| self.get_item(id)).collect()
    }
}

/// Formulas adjacent to `node` in the formula graph: walking toward `Source`
/// yields the formulas producing each ingredient, toward `Target` the
/// formulas consuming the result. Deduplicated by structural id, in canonical
/// (item id, registration) order so walks are deterministic.
pub fn adjacent_formulas<C: Catalog>(
    catalog: &C,
    node: &Formula,
    direction: WalkDirection,
) -> Vec<Formula> {
    let ids: Vec<&ItemId> = match direction {
        WalkDirection::Source => node.source_ids().collect(),
        WalkDirection::Target => vec![&node.result.item],
    };
    let mut seen: HashSet<FormulaId> = HashSet::new();
    let mut adjacent = Vec::new();
    for item in catalog.get_items(ids) {
        let formulas = match direction {
            WalkDirection::Source => &item.source_formulas,
            WalkDirection::Target => &item.formulas,
        };
        for formula in formulas {
            if seen.insert(formula.id()) {
                adjacent.push(formula.clone());
            }
        }
    }
    adjacent
}

// ---------------------------------------------------------------------------
// MemoryCatalog
// ---------------------------------------------------------------------------

/// In-memory catalog. Backs the data loader and tests; also the reference
/// implementation of how formulas are wired onto items.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    items: HashMap<ItemId, Item>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn get_item_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    /// Attach a formula to the item it produces and to every item it
    /// consumes. Items the formula references but the catalog does not hold
    /// are skipped.
    pub fn add_formula(&mut self, formula: Formula) {
        for ingredient in formula.ingredients.iter() {
            if let Some(item) = self.items.get_mut(&ingredient.item) {
                item.formulas.push(formula.clone());
            }
        }
        if let Some(item) = self.items.get_mut(&formula.result.item) {
            item.source_formulas.push(formula);
        }
    }
}

impl Catalog for MemoryCatalog {
    fn get_item(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }
}
