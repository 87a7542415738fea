//! Production chains: cyclic production loops as ordered stages.
//!
//! A back edge found while walking the formula graph turns into a
//! [`ProductionChain`]: the stack from the edge's source back to its target,
//! deepest formula first, one [`ProductionStage`] per formula. Appending a
//! stage LCM-rescales quantities so each stage's inputs exactly consume the
//! previous stage's output -- transfers between stages are always integral.
//!
//! Derived chain state (`input`, `profit`, value and time estimates) is
//! cached lazily and dropped on mutation.

use crate::catalog::{Catalog, adjacent_formulas};
use crate::formula::Formula;
use crate::graph::{NodeVisitor, WalkDirection, WalkOrder, walk_graph};
use crate::id::ItemId;
use crate::ingredient::{Ingredient, IngredientList, ListOrdering};
use crate::numeric::lcm;
use crate::refinery::{PoolError, ProductionLine, RefineryLimits, RefinerySize};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// ProductionStage
// ---------------------------------------------------------------------------

/// One or more formulas executed together at the same chain position.
/// Results and ingredients are aggregated over the member formulas with no
/// netting between them.
#[derive(Debug, Clone, Default)]
pub struct ProductionStage {
    formulas: Vec<Formula>,
    results: IngredientList,
    ingredients: IngredientList,
}

impl ProductionStage {
    pub fn new(formulas: Vec<Formula>) -> Self {
        let mut stage = Self {
            formulas,
            results: IngredientList::new(),
            ingredients: IngredientList::new(),
        };
        stage.recalculate();
        stage
    }

    pub fn single(formula: Formula) -> Self {
        Self::new(vec![formula])
    }

    fn recalculate(&mut self) {
        self.results = IngredientList::new();
        self.ingredients = IngredientList::new();
        for formula in &self.formulas {
            self.results.add(formula.result.clone());
            self.ingredients.add_all(&formula.ingredients);
        }
    }

    pub fn formulas(&self) -> &[Formula] {
        &self.formulas
    }

    pub fn results(&self) -> &IngredientList {
        &self.results
    }

    pub fn ingredients(&self) -> &IngredientList {
        &self.ingredients
    }

    /// Both stages' formulas running together.
    pub fn merged(&self, other: &ProductionStage) -> ProductionStage {
        let mut formulas = self.formulas.clone();
        formulas.extend(other.formulas.iter().cloned());
        Self::new(formulas)
    }

    /// Multiply every member formula by `k` and re-aggregate.
    pub fn scale(&mut self, k: i64) {
        self.formulas = self.formulas.iter().map(|f| f.scaled(k)).collect();
        self.recalculate();
    }

    /// Schedule every member formula's batches into the shared line and
    /// return the line's makespan afterwards. `batch_cap` supplies the
    /// refiner output-slot capacity per result item.
    pub fn estimate_time(
        &self,
        batch_cap: &impl Fn(&ItemId) -> i64,
        craft_time: f64,
        line: &mut ProductionLine,
    ) -> Duration {
        for formula in &self.formulas {
            let cap = batch_cap(&formula.result.item);
            let estimate = formula.estimate_time(cap, craft_time);
            if estimate.size == RefinerySize::Craft {
                line.pool_mut(RefinerySize::Craft).add_job(
                    crate::refinery::RefineryJob::new(
                        formula.clone(),
                        estimate.total,
                        formula.result.qty,
                    ),
                );
            } else {
                let pool = line.pool_mut(estimate.size);
                for _ in 0..estimate.batches {
                    pool.add_job(crate::refinery::RefineryJob::new(
                        formula.clone(),
                        estimate.max_batch,
                        cap,
                    ));
                }
            }
        }
        line.max_time()
    }
}

impl fmt::Display for ProductionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) -> ({})", self.ingredients, self.results)
    }
}

// ---------------------------------------------------------------------------
// ProductionValue
// ---------------------------------------------------------------------------

/// Monetary estimate of one chain pass: what the inputs cost and what the
/// outputs are worth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionValue {
    pub costs: f64,
    pub value: f64,
}

impl ProductionValue {
    pub fn profit(&self) -> f64 {
        self.value - self.costs
    }

    /// Ordering by profit, then by gross value.
    pub fn compare(&self, other: &ProductionValue) -> Ordering {
        self.profit()
            .total_cmp(&other.profit())
            .then(self.value.total_cmp(&other.value))
    }
}

// ---------------------------------------------------------------------------
// Chain comparison keys
// ---------------------------------------------------------------------------

/// Comparison keys for ranking production chains, evaluated in the order
/// given until one is decisive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainCompareKey {
    Length,
    Value,
    Output,
    Input,
    Time,
}

/// Key order used by [`ProductionChain::compare`].
pub const DEFAULT_COMPARE_KEYS: [ChainCompareKey; 3] = [
    ChainCompareKey::Length,
    ChainCompareKey::Output,
    ChainCompareKey::Input,
];

/// A reusable comparator closure over a fixed key order.
pub fn chain_comparator(
    keys: Vec<ChainCompareKey>,
) -> impl Fn(&ProductionChain, &ProductionChain) -> Ordering {
    move |lhs, rhs| lhs.compare_by(rhs, &keys)
}

// ---------------------------------------------------------------------------
// ProductionChain
// ---------------------------------------------------------------------------

/// An ordered sequence of production stages describing one production cycle
/// from a result back to itself.
#[derive(Debug, Clone, Default)]
pub struct ProductionChain {
    stages: Vec<ProductionStage>,
    input: OnceCell<IngredientList>,
    profit: OnceCell<IngredientList>,
    value_estimate: Option<ProductionValue>,
    time_estimate: Option<Duration>,
    line: Option<ProductionLine>,
}

impl ProductionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// One single-formula stage per formula, in the given execution order.
    pub fn from_formulas(formulas: impl IntoIterator<Item = Formula>) -> Self {
        let mut chain = Self::new();
        for formula in formulas {
            chain.push_back(ProductionStage::single(formula));
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[ProductionStage] {
        &self.stages
    }

    pub fn first_stage(&self) -> Option<&ProductionStage> {
        self.stages.first()
    }

    pub fn last_stage(&self) -> Option<&ProductionStage> {
        self.stages.last()
    }

    fn invalidate(&mut self) {
        self.input = OnceCell::new();
        self.profit = OnceCell::new();
        self.value_estimate = None;
        self.time_estimate = None;
        self.line = None;
    }

    /// Append a stage, rescaling so its inputs exactly consume the last
    /// stage's output: the new stage is multiplied up where it under-consumes,
    /// and every accumulated stage is multiplied up where it under-produces.
    pub fn push_back(&mut self, mut stage: ProductionStage) {
        let handoff: Option<Vec<Ingredient>> = self
            .stages
            .last()
            .map(|last| last.results().iter().collect());
        if let Some(results) = handoff {
            for res in results {
                if !stage.ingredients().contains(&res.item) {
                    continue;
                }
                let need = stage.ingredients().get(&res.item);
                let scaled = lcm(res.qty, need);
                let k_out = scaled / need;
                let k_in = scaled / res.qty;
                debug!(item = %res.item, k_in, k_out, "rescaling appended stage");
                if k_out != 1 {
                    stage.scale(k_out);
                }
                if k_in != 1 {
                    for prior in &mut self.stages {
                        prior.scale(k_in);
                    }
                }
            }
        }
        self.stages.push(stage);
        self.invalidate();
    }

    /// Insert a stage at the front, rescaling so the old first stage's
    /// matching inputs are exactly covered by the new stage's output.
    pub fn push_front(&mut self, mut stage: ProductionStage) {
        if self.stages.is_empty() {
            self.stages.push(stage);
            self.invalidate();
            return;
        }
        let produced: Vec<Ingredient> = stage.results().iter().collect();
        for res in produced {
            if !self.stages[0].ingredients().contains(&res.item) {
                continue;
            }
            let need = self.stages[0].ingredients().get(&res.item);
            let scaled = lcm(res.qty, need);
            let k_out = scaled / need;
            let k_in = scaled / res.qty;
            debug!(item = %res.item, k_in, k_out, "rescaling prepended stage");
            if k_out != 1 {
                for existing in &mut self.stages {
                    existing.scale(k_out);
                }
            }
            if k_in != 1 {
                stage.scale(k_in);
            }
        }
        self.stages.insert(0, stage);
        self.invalidate();
    }

    /// The last stage's aggregate results.
    pub fn output(&self) -> IngredientList {
        self.stages
            .last()
            .map(|stage| stage.results().clone())
            .unwrap_or_default()
    }

    /// Net external input: stage-0 ingredients plus whatever later stages
    /// need beyond what the stage before them produced. Zero entries purged.
    pub fn input(&self) -> &IngredientList {
        self.input.get_or_init(|| {
            let Some(first) = self.stages.first() else {
                return IngredientList::new();
            };
            let mut input = first.ingredients().clone();
            for idx in 1..self.stages.len() {
                input.add_all(self.stages[idx].ingredients());
                input.deduct_all(self.stages[idx - 1].results());
            }
            input.purge_zero();
            input
        })
    }

    /// `output - input`, decremented entry-wise over the output's items.
    /// Positive entries are net gains, negative entries net losses.
    pub fn profit(&self) -> &IngredientList {
        self.profit.get_or_init(|| {
            let mut profit = self.output();
            profit.deduct_all(self.input());
            profit
        })
    }

    pub fn has_losses(&self) -> bool {
        self.profit().iter().any(|ing| ing.qty < 0)
    }

    pub fn has_profit(&self) -> bool {
        self.profit().iter().any(|ing| ing.qty > 0)
    }

    /// Price the chain's input and output via `value_of`. Cached until the
    /// chain is mutated.
    pub fn estimate_value(&mut self, value_of: impl Fn(&ItemId) -> Option<f64>) -> ProductionValue {
        if let Some(cached) = self.value_estimate {
            return cached;
        }
        let costs = self.input().estimate_value(&value_of);
        let value = self.output().estimate_value(&value_of);
        let estimate = ProductionValue { costs, value };
        self.value_estimate = Some(estimate);
        estimate
    }

    /// Estimate wall-clock time for one chain pass. Stages run strictly
    /// sequentially: parallelism only exists within a stage, via the shared
    /// pool set, and the per-stage line makespans are summed. Cached until
    /// the chain is mutated or `reset` is passed.
    pub fn estimate_time(
        &mut self,
        batch_cap: impl Fn(&ItemId) -> i64,
        craft_time: f64,
        limits: RefineryLimits,
        reset: bool,
    ) -> Result<Duration, PoolError> {
        if reset {
            self.time_estimate = None;
            self.line = None;
        }
        if let Some(cached) = self.time_estimate {
            return Ok(cached);
        }
        let mut line = ProductionLine::new(limits)?;
        let mut total = Duration::ZERO;
        for stage in &self.stages {
            let stage_time = stage.estimate_time(&batch_cap, craft_time, &mut line);
            info!(stage = %stage, time = ?stage_time, "stage estimated");
            total += stage_time;
        }
        self.time_estimate = Some(total);
        self.line = Some(line);
        Ok(total)
    }

    pub fn estimated_value(&self) -> Option<ProductionValue> {
        self.value_estimate
    }

    pub fn estimated_time(&self) -> Option<Duration> {
        self.time_estimate
    }

    /// The pool set of the last time estimation, if any.
    pub fn production_line(&self) -> Option<&ProductionLine> {
        self.line.as_ref()
    }

    /// Compare with the default key order (length, output, input).
    pub fn compare(&self, rhs: &ProductionChain) -> Ordering {
        self.compare_by(rhs, &DEFAULT_COMPARE_KEYS)
    }

    /// Compare under an explicit key order. Empty chains always sort least;
    /// chains with no value/time estimate sort below chains with one.
    pub fn compare_by(&self, rhs: &ProductionChain, keys: &[ChainCompareKey]) -> Ordering {
        match (self.is_empty(), rhs.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        for key in keys {
            let verdict = match key {
                // Fewer stages sorts greater (shorter loops rank higher).
                ChainCompareKey::Length => rhs.len().cmp(&self.len()),
                ChainCompareKey::Value => compare_optional(
                    self.value_estimate.as_ref(),
                    rhs.value_estimate.as_ref(),
                    |a, b| a.compare(b),
                ),
                ChainCompareKey::Output => self
                    .output()
                    .compare(&rhs.output(), ListOrdering::LongerMore),
                ChainCompareKey::Input => {
                    self.input().compare(rhs.input(), ListOrdering::LongerLess)
                }
                ChainCompareKey::Time => compare_optional(
                    self.time_estimate.as_ref(),
                    rhs.time_estimate.as_ref(),
                    Ord::cmp,
                ),
            };
            if verdict != Ordering::Equal {
                return verdict;
            }
        }
        Ordering::Equal
    }
}

/// Missing estimates sort below present ones.
fn compare_optional<T>(
    lhs: Option<&T>,
    rhs: Option<&T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (lhs, rhs) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => cmp(a, b),
    }
}

impl fmt::Display for ProductionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("empty production chain");
        }
        let sign = if self.has_losses() { "--" } else { "++" };
        write!(
            f,
            "{} steps ({}) -> ({}) {}[{}]",
            self.len(),
            self.input(),
            self.output(),
            sign,
            self.profit(),
        )
    }
}

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

/// DFS visitor turning back edges into production chains.
///
/// Mirrors the walker's active path in an explicit stack; when a back edge
/// from `source` to `target` fires, the mirrored path from `source` down to
/// `target` (inclusive) is the cycle, deepest formula first -- which is
/// execution order when walking toward sources.
pub struct CycleDetector<'a, C: Catalog> {
    catalog: &'a C,
    path: Vec<Formula>,
    cycles: HashMap<ItemId, Vec<ProductionChain>>,
    inspected_nodes: usize,
    cycle_count: usize,
}

impl<'a, C: Catalog> CycleDetector<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            path: Vec::new(),
            cycles: HashMap::new(),
            inspected_nodes: 0,
            cycle_count: 0,
        }
    }

    /// Consume the detector and take its findings.
    pub fn into_report(self) -> CycleReport {
        CycleReport {
            cycles: self.cycles,
            inspected_nodes: self.inspected_nodes,
            cycle_count: self.cycle_count,
        }
    }
}

impl<C: Catalog> NodeVisitor<Formula> for CycleDetector<'_, C> {
    fn get_adjacent(
        &mut self,
        node: &Formula,
        direction: WalkDirection,
        _distance: u32,
    ) -> Vec<Formula> {
        adjacent_formulas(self.catalog, node, direction)
    }

    fn examine_node(&mut self, node: &Formula, _distance: u32) {
        self.path.push(node.clone());
    }

    fn finish_node(&mut self, _node: &Formula, _distance: u32) {
        self.path.pop();
        self.inspected_nodes += 1;
    }

    fn back_edge(&mut self, source: &Formula, target: &Formula) {
        let Some(start) = self.path.iter().rposition(|f| f == target) else {
            debug!(from = %source, to = %target, "back edge target not on path");
            return;
        };
        let trace = self.path[start..].iter().rev().cloned();
        let chain = ProductionChain::from_formulas(trace);
        debug!(item = %target.result.item, stages = chain.len(), "cycle found");
        self.cycle_count += 1;
        self.cycles
            .entry(target.result.item.clone())
            .or_default()
            .push(chain);
    }
}

/// Cycles found by [`detect_formula_cycles`], indexed by the result item of
/// the formula the back edge returned to.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycles: HashMap<ItemId, Vec<ProductionChain>>,
    pub inspected_nodes: usize,
    pub cycle_count: usize,
}

/// Walk the formula graph depth-first from `start` and collect every
/// production cycle reachable from it.
pub fn detect_formula_cycles<C: Catalog>(
    catalog: &C,
    start: impl IntoIterator<Item = Formula>,
) -> CycleReport {
    let mut detector = CycleDetector::new(catalog);
    walk_graph(start, &mut detector, WalkOrder::Dfs, WalkDirection::Source);
    detector.into_report()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Item, ItemClass, MemoryCatalog, Rarity};
    use crate::formula::FormulaType;

    fn refining(result: (&str, i64), ingredients: &[(&str, i64)], time: f64) -> Formula {
        Formula::new(
            FormulaType::Refining,
            Ingredient::new(result.0, result.1),
            ingredients
                .iter()
                .map(|&(id, qty)| Ingredient::new(id, qty)),
        )
        .unwrap()
        .with_process("Refine", time)
    }

    fn item_id(id: &str) -> ItemId {
        ItemId::from(id)
    }

    #[test]
    fn stage_aggregates_without_netting() {
        // Two formulas where one produces what the other consumes: both
        // sides keep their full quantities.
        let a = refining(("Glass", 1), &[("Silicate", 2)], 1.0);
        let b = refining(("Silicate", 3), &[("Salt", 1)], 1.0);
        let stage = ProductionStage::new(vec![a.clone(), b.clone()]);
        assert_eq!(stage.results().get(&item_id("Glass")), 1);
        assert_eq!(stage.results().get(&item_id("Silicate")), 3);
        assert_eq!(stage.ingredients().get(&item_id("Silicate")), 2);
        assert_eq!(stage.ingredients().get(&item_id("Salt")), 1);

        // Merging two single-formula stages aggregates the same way.
        let merged = ProductionStage::single(a).merged(&ProductionStage::single(b));
        assert_eq!(merged.results(), stage.results());
        assert_eq!(merged.ingredients(), stage.ingredients());
    }

    #[test]
    fn push_back_scales_stage_to_consume_prior_output() {
        // Stage 1 produces 2 gold; stage 2 wants 3 gold per run.
        let mut chain = ProductionChain::new();
        chain.push_back(ProductionStage::single(refining(
            ("Gold", 2),
            &[("Faecium", 1)],
            0.36,
        )));
        chain.push_back(ProductionStage::single(refining(
            ("Ingot", 1),
            &[("Gold", 3)],
            1.0,
        )));

        // lcm(2, 3) = 6: stage 2 doubled, stage 1 tripled.
        assert_eq!(chain.stages()[0].results().get(&item_id("Gold")), 6);
        assert_eq!(chain.stages()[1].ingredients().get(&item_id("Gold")), 6);
        assert_eq!(chain.stages()[1].results().get(&item_id("Ingot")), 2);
        // Net input is faecium only: the gold hand-off nets out.
        assert_eq!(chain.input().get(&item_id("Faecium")), 3);
        assert!(!chain.input().contains(&item_id("Gold")));
    }

    #[test]
    fn push_front_scales_symmetrically() {
        let mut chain = ProductionChain::new();
        chain.push_back(ProductionStage::single(refining(
            ("Ingot", 1),
            &[("Gold", 3)],
            1.0,
        )));
        chain.push_front(ProductionStage::single(refining(
            ("Gold", 2),
            &[("Faecium", 1)],
            0.36,
        )));

        assert_eq!(chain.stages()[0].results().get(&item_id("Gold")), 6);
        assert_eq!(chain.stages()[1].ingredients().get(&item_id("Gold")), 6);
        assert_eq!(chain.input().get(&item_id("Faecium")), 3);
    }

    #[test]
    fn degenerate_cycle_is_neutral() {
        // A -> B -> A with matching quantities nets to zero everywhere.
        let chain = ProductionChain::from_formulas([
            refining(("B", 1), &[("A", 1)], 1.0),
            refining(("A", 1), &[("B", 1)], 1.0),
        ]);
        assert!(!chain.has_profit());
        assert!(!chain.has_losses());
    }

    #[test]
    fn replenishing_loop_shows_profit() {
        let chain = ProductionChain::from_formulas([
            refining(("B", 1), &[("A", 1)], 1.0),
            refining(("A", 2), &[("B", 1)], 1.0),
        ]);
        assert!(chain.has_profit());
        assert!(!chain.has_losses());
        assert_eq!(chain.profit().get(&item_id("A")), 1);
    }

    #[test]
    fn chain_input_purges_netted_out_entries() {
        let chain = ProductionChain::from_formulas([
            refining(("Mid", 2), &[("Raw", 4)], 1.0),
            refining(("End", 1), &[("Mid", 2)], 1.0),
        ]);
        assert_eq!(chain.input().get(&item_id("Raw")), 4);
        assert!(!chain.input().contains(&item_id("Mid")));
        assert_eq!(chain.output().get(&item_id("End")), 1);
    }

    #[test]
    fn mutation_invalidates_cached_profit() {
        let mut chain = ProductionChain::from_formulas([refining(("A", 2), &[("B", 1)], 1.0)]);
        assert_eq!(chain.profit().get(&item_id("A")), 2);
        chain.push_back(ProductionStage::single(refining(("C", 1), &[("A", 2)], 1.0)));
        assert!(!chain.profit().contains(&item_id("A")));
        assert_eq!(chain.profit().get(&item_id("C")), 1);
    }

    #[test]
    fn empty_chains_sort_least() {
        let empty = ProductionChain::new();
        let full = ProductionChain::from_formulas([refining(("A", 1), &[("B", 1)], 1.0)]);
        assert_eq!(empty.compare(&full), Ordering::Less);
        assert_eq!(full.compare(&empty), Ordering::Greater);
        assert_eq!(empty.compare(&ProductionChain::new()), Ordering::Equal);
    }

    #[test]
    fn shorter_chain_ranks_higher_under_length_key() {
        let short = ProductionChain::from_formulas([refining(("A", 1), &[("B", 1)], 1.0)]);
        let long = ProductionChain::from_formulas([
            refining(("B", 1), &[("C", 1)], 1.0),
            refining(("A", 1), &[("B", 1)], 1.0),
        ]);
        assert_eq!(
            short.compare_by(&long, &[ChainCompareKey::Length]),
            Ordering::Greater
        );
    }

    #[test]
    fn missing_time_estimate_sorts_below_present() {
        let mut timed = ProductionChain::from_formulas([refining(("A", 1), &[("B", 1)], 1.0)]);
        timed
            .estimate_time(|_| 10, 0.5, RefineryLimits::default(), false)
            .unwrap();
        let untimed = ProductionChain::from_formulas([refining(("A", 1), &[("B", 1)], 1.0)]);
        assert_eq!(
            untimed.compare_by(&timed, &[ChainCompareKey::Time]),
            Ordering::Less
        );
        assert_eq!(
            timed.compare_by(&untimed, &[ChainCompareKey::Time]),
            Ordering::Greater
        );
    }

    #[test]
    fn comparator_factory_ranks_by_value() {
        let mut gain = ProductionChain::from_formulas([refining(("A", 2), &[("A", 1)], 1.0)]);
        let mut flat = ProductionChain::from_formulas([refining(("A", 1), &[("A", 1)], 1.0)]);
        let value = |_: &ItemId| Some(10.0);
        gain.estimate_value(value);
        flat.estimate_value(value);
        let cmp = chain_comparator(vec![ChainCompareKey::Value]);
        assert_eq!(cmp(&flat, &gain), Ordering::Less);
    }

    #[test]
    fn chain_time_sums_stage_makespans() {
        // Two sequential stages on one medium refiner: 10s then 20s.
        let mut chain = ProductionChain::from_formulas([
            refining(("Mid", 1), &[("Raw", 1)], 10.0),
            refining(("End", 1), &[("Mid", 1)], 10.0),
        ]);
        let limits = RefineryLimits {
            medium: Some(1),
            big: Some(1),
        };
        let total = chain.estimate_time(|_| 10, 0.5, limits, false).unwrap();
        // Stage 1 makespan 10s; stage 2 adds 10s to the same line -> 20s.
        assert_eq!(total, Duration::from_secs(30));
        assert_eq!(chain.estimated_time(), Some(total));
    }

    #[test]
    fn value_estimation_caches_until_reset() {
        let mut chain = ProductionChain::from_formulas([refining(("A", 2), &[("B", 1)], 1.0)]);
        let first = chain.estimate_value(|id| (id.as_str() == "A").then_some(5.0));
        assert!((first.value - 10.0).abs() < 1e-9);
        // Different lookup, same cached result.
        let second = chain.estimate_value(|_| Some(1000.0));
        assert_eq!(first, second);
    }

    // -- cycle detection ----------------------------------------------------

    fn loop_catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        for id in ["A", "B"] {
            catalog.insert(Item::new(id, 10.0, Rarity::Common, ItemClass::Resource));
        }
        catalog.add_formula(refining(("A", 2), &[("B", 1)], 1.0));
        catalog.add_formula(refining(("B", 1), &[("A", 1)], 1.0));
        catalog
    }

    #[test]
    fn two_formula_loop_yields_two_stage_chain() {
        let catalog = loop_catalog();
        let start = catalog
            .get_item(&item_id("A"))
            .unwrap()
            .source_formulas
            .clone();
        let report = detect_formula_cycles(&catalog, start);

        assert_eq!(report.cycle_count, 1);
        let chains = &report.cycles[&item_id("A")];
        assert_eq!(chains.len(), 1);
        let chain = &chains[0];
        assert_eq!(chain.len(), 2);
        // B's formula runs first, A's formula closes the loop.
        assert_eq!(chain.output().get(&item_id("A")), 2);
        assert!(chain.has_profit());
        assert!(!chain.has_losses());
    }

    #[test]
    fn acyclic_graph_reports_no_cycles() {
        let mut catalog = MemoryCatalog::new();
        for id in ["Raw", "Mid", "End"] {
            catalog.insert(Item::new(id, 1.0, Rarity::Common, ItemClass::Resource));
        }
        catalog.add_formula(refining(("Mid", 1), &[("Raw", 2)], 1.0));
        catalog.add_formula(refining(("End", 1), &[("Mid", 2)], 1.0));

        let start = catalog
            .get_item(&item_id("End"))
            .unwrap()
            .source_formulas
            .clone();
        let report = detect_formula_cycles(&catalog, start);
        assert_eq!(report.cycle_count, 0);
        assert!(report.cycles.is_empty());
        assert_eq!(report.inspected_nodes, 2);
    }

    #[test]
    fn self_loop_formula_is_a_one_stage_cycle() {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(Item::new("Oxygen", 10.0, Rarity::Common, ItemClass::Resource));
        catalog.insert(Item::new("Kelp", 20.0, Rarity::Common, ItemClass::Resource));
        catalog.add_formula(refining(("Oxygen", 10), &[("Oxygen", 5), ("Kelp", 1)], 2.4));

        let start = catalog
            .get_item(&item_id("Oxygen"))
            .unwrap()
            .source_formulas
            .clone();
        let report = detect_formula_cycles(&catalog, start);
        assert_eq!(report.cycle_count, 1);
        let chain = &report.cycles[&item_id("Oxygen")][0];
        assert_eq!(chain.len(), 1);
        assert!(chain.has_profit());
    }
}
