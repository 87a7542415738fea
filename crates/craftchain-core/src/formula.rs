use crate::id::{FormulaId, ItemId};
use crate::ingredient::{Ingredient, IngredientList};
use crate::refinery::RefinerySize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised when constructing a formula from invalid source data.
#[derive(Debug, thiserror::Error)]
pub enum FormulaError {
    #[error("result quantity for {item} must be positive, got {qty}")]
    NonPositiveResult { item: ItemId, qty: i64 },
    #[error("ingredient quantity for {item} must be positive, got {qty}")]
    NonPositiveIngredient { item: ItemId, qty: i64 },
    #[error("formula producing {item} has no ingredients")]
    NoIngredients { item: ItemId },
}

// ---------------------------------------------------------------------------
// Formula type
// ---------------------------------------------------------------------------

/// The process that turns ingredients into a result.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FormulaType {
    #[default]
    Craft,
    Refining,
    Repair,
    Cook,
}

impl fmt::Display for FormulaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            FormulaType::Craft => "{C}",
            FormulaType::Refining => "{R}",
            FormulaType::Repair => "{M}",
            FormulaType::Cook => "{K}",
        };
        f.write_str(tag)
    }
}

// ---------------------------------------------------------------------------
// Formula
// ---------------------------------------------------------------------------

/// A production recipe: one result produced from a list of ingredients via a
/// process type.
///
/// Identity is structural: equality and hashing cover `(kind, result,
/// ingredients)` only, so semantically identical formulas collapse to one
/// graph node regardless of where they were parsed from. The process name and
/// per-batch time are descriptive and excluded from identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    pub kind: FormulaType,
    pub result: Ingredient,
    pub ingredients: IngredientList,
    /// Display name of the processing step, when known.
    pub process: Option<String>,
    /// Seconds to produce one `result.qty` batch, when known.
    pub time: Option<f64>,
}

impl Formula {
    /// Build a validated formula. Quantities must be positive and at least one
    /// ingredient is required; anything else is a data-integrity error.
    pub fn new(
        kind: FormulaType,
        result: Ingredient,
        ingredients: impl IntoIterator<Item = Ingredient>,
    ) -> Result<Self, FormulaError> {
        if result.qty <= 0 {
            return Err(FormulaError::NonPositiveResult {
                item: result.item,
                qty: result.qty,
            });
        }
        let ingredients: IngredientList = ingredients.into_iter().collect();
        if ingredients.is_empty() {
            return Err(FormulaError::NoIngredients { item: result.item });
        }
        for ing in ingredients.iter() {
            if ing.qty <= 0 {
                return Err(FormulaError::NonPositiveIngredient {
                    item: ing.item,
                    qty: ing.qty,
                });
            }
        }
        Ok(Self {
            kind,
            result,
            ingredients,
            process: None,
            time: None,
        })
    }

    /// Attach the processing step name and its per-batch time in seconds.
    pub fn with_process(mut self, name: impl Into<String>, time: f64) -> Self {
        self.process = Some(name.into());
        self.time = Some(time);
        self
    }

    /// Stable structural digest over `(kind, result, ingredients)`. Identical
    /// across runs for structurally identical formulas.
    pub fn id(&self) -> FormulaId {
        let mut hasher = Sha256::new();
        hasher.update([self.kind as u8]);
        hash_entry(&mut hasher, &self.result.item, self.result.qty);
        for ing in self.ingredients.iter() {
            hash_entry(&mut hasher, &ing.item, ing.qty);
        }
        let digest = hasher.finalize();
        FormulaId(u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]))
    }

    /// Item ids of the ingredient side, in canonical order.
    pub fn source_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.ingredients.item_ids()
    }

    pub fn has_ingredient(&self, item: &ItemId) -> bool {
        self.ingredients.contains(item)
    }

    /// True when the result item also appears among the ingredients, i.e.
    /// the formula is a self-loop candidate.
    pub fn is_replenishing(&self) -> bool {
        self.ingredients.contains(&self.result.item)
    }

    /// A copy with result, ingredients and batch time multiplied by `k`.
    pub fn scaled(&self, k: i64) -> Self {
        debug_assert!(k >= 1, "formula scaled by non-positive factor {k}");
        Self {
            kind: self.kind,
            result: self.result.scaled(k),
            ingredients: self.ingredients.scaled(k),
            process: self.process.clone(),
            time: self.time.map(|t| t * k as f64),
        }
    }

    /// The station class this formula occupies: crafting is always serial,
    /// refining/cooking with more than two inputs needs a big refiner.
    pub fn refinery_size(&self) -> RefinerySize {
        match self.kind {
            FormulaType::Craft | FormulaType::Repair => RefinerySize::Craft,
            _ if self.ingredients.len() > 2 => RefinerySize::Big,
            _ => RefinerySize::Medium,
        }
    }

    /// Estimate the time to produce `result.qty` items.
    ///
    /// `max_output_batch` is the size of the station's output slot; it bounds
    /// how much one queued batch can produce and is ignored for crafting,
    /// which is serial. Formulas without a recorded process time estimate as
    /// instantaneous.
    pub fn estimate_time(&self, max_output_batch: i64, craft_time: f64) -> TimeEstimate {
        debug_assert!(max_output_batch >= 1);
        match self.kind {
            FormulaType::Repair => TimeEstimate {
                total: Duration::ZERO,
                max_batch: Duration::ZERO,
                batches: 0,
                size: RefinerySize::Craft,
            },
            FormulaType::Craft => {
                let total = Duration::from_secs_f64(self.result.qty as f64 * craft_time);
                TimeEstimate {
                    total,
                    max_batch: total,
                    batches: 1,
                    size: RefinerySize::Craft,
                }
            }
            FormulaType::Refining | FormulaType::Cook => {
                let qty = self.result.qty;
                let batches = ((qty + max_output_batch - 1) / max_output_batch) as u32;
                let time = self.time.unwrap_or(0.0);
                let unit_time = time / qty as f64;
                let max_batch = if qty > max_output_batch {
                    max_output_batch as f64 * unit_time
                } else {
                    time
                };
                TimeEstimate {
                    total: Duration::from_secs_f64(time),
                    max_batch: Duration::from_secs_f64(max_batch),
                    batches,
                    size: self.refinery_size(),
                }
            }
        }
    }
}

fn hash_entry(hasher: &mut Sha256, item: &ItemId, qty: i64) {
    hasher.update((item.as_str().len() as u32).to_be_bytes());
    hasher.update(item.as_str().as_bytes());
    hasher.update(qty.to_be_bytes());
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.result == other.result
            && self.ingredients == other.ingredients
    }
}

impl Eq for Formula {}

impl Hash for Formula {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.result.hash(state);
        self.ingredients.hash(state);
    }
}

impl PartialOrd for Formula {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Formula {
    fn cmp(&self, other: &Self) -> Ordering {
        self.result
            .cmp(&other.result)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.ingredients.cmp(&other.ingredients))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} <- {}", self.kind, self.result, self.ingredients)?;
        if let (Some(process), Some(time)) = (&self.process, self.time) {
            write!(f, " ({process} {time:.2} sec)")?;
        }
        Ok(())
    }
}

/// Result of [`Formula::estimate_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeEstimate {
    /// Time to produce the full result quantity on one station.
    pub total: Duration,
    /// Time of the largest single batch.
    pub max_batch: Duration,
    /// Number of output-slot batches required.
    pub batches: u32,
    /// Station class the work runs on.
    pub size: RefinerySize,
}
