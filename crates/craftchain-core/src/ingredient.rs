use crate::id::ItemId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

// ---------------------------------------------------------------------------
// Ingredient
// ---------------------------------------------------------------------------

/// One item requirement: an item id and a quantity.
///
/// Source data always carries positive quantities. Negative quantities appear
/// only in derived lists, e.g. the loss entries of a production chain's net
/// profit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ingredient {
    pub item: ItemId,
    pub qty: i64,
}

impl Ingredient {
    pub fn new(item: impl Into<ItemId>, qty: i64) -> Self {
        Self {
            item: item.into(),
            qty,
        }
    }

    /// A copy with the quantity multiplied by `k`.
    pub fn scaled(&self, k: i64) -> Self {
        Self {
            item: self.item.clone(),
            qty: self.qty * k,
        }
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.qty >= 0 {
            write!(f, "{} x{}", self.item, self.qty)
        } else {
            write!(f, "{} x({})", self.item, self.qty)
        }
    }
}

// ---------------------------------------------------------------------------
// IngredientList
// ---------------------------------------------------------------------------

/// Length tie-break strategy for [`IngredientList::compare`].
///
/// When the common prefix of two canonically ordered lists is identical, the
/// shorter list compares less; `LongerLess` inverts that verdict for call
/// sites where more entries means a worse candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListOrdering {
    LongerLess,
    LongerMore,
}

/// A set of ingredients keyed by item id with quantities summed on insert.
///
/// Iteration order is always the canonical order: sorted by item id. There is
/// never more than one entry per item id.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IngredientList {
    by_item: BTreeMap<ItemId, i64>,
}

impl IngredientList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_item.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_item.is_empty()
    }

    /// Quantity for `item`, or 0 when absent.
    pub fn get(&self, item: &ItemId) -> i64 {
        self.by_item.get(item).copied().unwrap_or(0)
    }

    pub fn contains(&self, item: &ItemId) -> bool {
        self.by_item.contains_key(item)
    }

    /// Entries in canonical (item id) order.
    pub fn iter(&self) -> impl Iterator<Item = Ingredient> + '_ {
        self.by_item.iter().map(|(item, &qty)| Ingredient {
            item: item.clone(),
            qty,
        })
    }

    /// Item ids in canonical order.
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.by_item.keys()
    }

    /// Insert one ingredient, summing quantities on collision.
    pub fn add(&mut self, ingredient: Ingredient) {
        *self.by_item.entry(ingredient.item).or_insert(0) += ingredient.qty;
    }

    /// Insert every ingredient of `other`, summing quantities.
    pub fn add_all(&mut self, other: &IngredientList) {
        for ing in other.iter() {
            self.add(ing);
        }
    }

    /// Decrement quantities for entries already present. Entries of `other`
    /// that are not in `self` are ignored; quantities may go negative.
    pub fn deduct_all(&mut self, other: &IngredientList) {
        for (item, qty) in &other.by_item {
            if let Some(existing) = self.by_item.get_mut(item) {
                *existing -= qty;
            }
        }
    }

    /// A copy with every quantity multiplied by `k`.
    pub fn scaled(&self, k: i64) -> Self {
        Self {
            by_item: self
                .by_item
                .iter()
                .map(|(item, &qty)| (item.clone(), qty * k))
                .collect(),
        }
    }

    /// Drop entries whose quantity is exactly zero.
    pub fn purge_zero(&mut self) {
        self.by_item.retain(|_, qty| *qty != 0);
    }

    /// Sum of `value(item) * qty` over all entries whose value is known.
    /// Unknown items contribute nothing and are reported at warn level.
    pub fn estimate_value(&self, value_of: impl Fn(&ItemId) -> Option<f64>) -> f64 {
        let mut total = 0.0;
        for ing in self.iter() {
            match value_of(&ing.item) {
                Some(value) => total += value * ing.qty as f64,
                None => warn!(item = %ing.item, "no value known for item"),
            }
        }
        total
    }

    /// Two-key comparison: entries pairwise in canonical order first, list
    /// length second. The first unequal `(item, qty)` pair decides; if the
    /// common prefix is identical, the shorter list is `Less`, inverted under
    /// [`ListOrdering::LongerLess`].
    pub fn compare(&self, rhs: &IngredientList, ordering: ListOrdering) -> Ordering {
        for (lhs_item, rhs_item) in self.iter().zip(rhs.iter()) {
            match lhs_item.cmp(&rhs_item) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        let by_len = self.len().cmp(&rhs.len());
        match ordering {
            ListOrdering::LongerMore => by_len,
            ListOrdering::LongerLess => by_len.reverse(),
        }
    }
}

impl FromIterator<Ingredient> for IngredientList {
    fn from_iter<T: IntoIterator<Item = Ingredient>>(iter: T) -> Self {
        let mut list = Self::new();
        for ing in iter {
            list.add(ing);
        }
        list
    }
}

impl fmt::Display for IngredientList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for ing in self.iter() {
            if !first {
                f.write_str(" + ")?;
            }
            write!(f, "{ing}")?;
            first = false;
        }
        Ok(())
    }
}
