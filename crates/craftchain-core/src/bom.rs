//! Bill-of-Materials synthesis.
//!
//! A BOM aggregates the raw materials needed to produce one batch of an item,
//! selected bottom-up over the formula graph. Candidate BOMs are ranked by a
//! four-key preference order, and child BOMs are rescaled with integer LCM
//! arithmetic so every chosen output divides evenly into the batch -- no
//! fractional units, ever.

use crate::catalog::{Catalog, Item, ItemInfo, Rarity, adjacent_formulas};
use crate::formula::{Formula, FormulaType};
use crate::graph::{NodeVisitor, WalkDirection, WalkOrder, walk_graph};
use crate::id::ItemId;
use crate::ingredient::{Ingredient, IngredientList};
use crate::numeric::lcm;
use crate::refinery::RefinerySize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Formula tree
// ---------------------------------------------------------------------------

/// The tree of formulas a BOM chose, one node per production step.
#[derive(Debug, Clone)]
pub struct FormulaTree {
    pub formula: Formula,
    pub children: Vec<FormulaTree>,
}

impl FormulaTree {
    fn leaf(formula: Formula) -> Self {
        Self {
            formula,
            children: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bom
// ---------------------------------------------------------------------------

/// An aggregated raw-material list for producing `output_qty` of an item.
///
/// Immutable once built: scaling produces a new BOM. `components` always
/// covers every id in `ingredients`, and `total` is the component-value sum
/// over the ingredient quantities.
#[derive(Debug, Clone)]
pub struct Bom {
    pub result: ItemInfo,
    pub output_qty: i64,
    pub ingredients: IngredientList,
    pub components: BTreeMap<ItemId, ItemInfo>,
    /// Highest rarity among the components.
    pub max_rarity: Rarity,
    /// Total raw-material cost for the whole batch.
    pub total: f64,
    /// Cost per produced item.
    pub per_item: f64,
    pub tree: FormulaTree,
    avoid: bool,
    prefer_craft: bool,
    /// Production steps in execution order with their multiplicities.
    /// Populated by [`build_bom`].
    pub process_steps: Vec<(Formula, i64)>,
    /// Refiner assignments for the refining steps. Populated by [`build_bom`].
    pub refinery_allocations: Vec<(Formula, RefinerySize)>,
    /// The avoid set this BOM was built under. Populated by [`build_bom`].
    pub avoided_items: HashSet<ItemId>,
}

impl Bom {
    fn assemble(
        result: ItemInfo,
        ingredients: IngredientList,
        components: BTreeMap<ItemId, ItemInfo>,
        output_qty: i64,
        tree: FormulaTree,
        avoid: bool,
        prefer_craft: bool,
    ) -> Self {
        let max_rarity = components
            .values()
            .map(|c| c.rarity)
            .max()
            .unwrap_or(Rarity::Unknown);
        let mut total = 0.0;
        for ing in ingredients.iter() {
            match components.get(&ing.item) {
                Some(component) => total += component.value * ing.qty as f64,
                None => warn!(item = %ing.item, "ingredient has no component entry"),
            }
        }
        let per_item = total / output_qty as f64;
        Self {
            result,
            output_qty,
            ingredients,
            components,
            max_rarity,
            total,
            per_item,
            tree,
            avoid,
            prefer_craft,
            process_steps: Vec::new(),
            refinery_allocations: Vec::new(),
            avoided_items: HashSet::new(),
        }
    }

    /// The process type of the root formula.
    pub fn process_type(&self) -> FormulaType {
        self.tree.formula.kind
    }

    pub fn is_avoided(&self) -> bool {
        self.avoid
    }

    pub fn prefers_craft(&self) -> bool {
        self.prefer_craft
    }

    /// Quantity of `item` on the raw-material list, 0 when absent.
    pub fn qty_of(&self, item: &ItemId) -> i64 {
        self.ingredients.get(item)
    }

    /// A new BOM for `k` batches: ingredients and output scaled, cost resummed.
    pub fn scaled(&self, k: i64) -> Bom {
        debug_assert!(k >= 1, "BOM scaled by non-positive factor {k}");
        Self::assemble(
            self.result.clone(),
            self.ingredients.scaled(k),
            self.components.clone(),
            self.output_qty * k,
            self.tree.clone(),
            self.avoid,
            self.prefer_craft,
        )
    }

    /// The BOM preference order, ascending = better. Strict weak order over
    /// four keys: not-avoided first; then craft-vs-noncraft according to the
    /// `prefer_craft` flag; then lower maximum rarity; then lower total cost.
    pub fn preference(&self, other: &Bom) -> Ordering {
        match (self.avoid, other.avoid) {
            (false, true) => return Ordering::Less,
            (true, false) => return Ordering::Greater,
            _ => {}
        }
        let type_rank = |bom: &Bom| {
            let is_craft = bom.process_type() == FormulaType::Craft;
            if self.prefer_craft { !is_craft } else { is_craft }
        };
        type_rank(self)
            .cmp(&type_rank(other))
            .then(self.max_rarity.cmp(&other.max_rarity))
            .then(self.total.total_cmp(&other.total))
    }

    /// Build the BOM for one formula. When none of the formula's ingredients
    /// has a BOM in `best` yet this is a leaf: every ingredient is priced at
    /// its base catalog value. Returns `None` if a leaf ingredient cannot be
    /// resolved -- that branch simply yields no bill of materials.
    pub fn make<C: Catalog>(
        catalog: &C,
        result: &Item,
        formula: &Formula,
        best: &HashMap<ItemId, Bom>,
        avoid: &HashSet<ItemId>,
        prefer_craft: bool,
    ) -> Option<Bom> {
        let children: Vec<Bom> = formula
            .ingredients
            .iter()
            .filter_map(|ing| best.get(&ing.item).cloned())
            .collect();
        if !children.is_empty() {
            return Some(Self::combine(
                result,
                formula,
                children,
                best,
                avoid,
                prefer_craft,
            ));
        }

        let mut components = BTreeMap::new();
        for ing in formula.ingredients.iter() {
            match catalog.get_item(&ing.item) {
                Some(item) => {
                    components.insert(ing.item.clone(), item.info());
                }
                None => {
                    warn!(item = %ing.item, "unresolved ingredient, dropping this branch");
                    return None;
                }
            }
        }
        let avoided = components.keys().any(|id| avoid.contains(id));
        Some(Self::assemble(
            result.info(),
            formula.ingredients.clone(),
            components,
            formula.result.qty,
            FormulaTree::leaf(formula.clone()),
            avoided,
            prefer_craft,
        ))
    }

    /// Aggregate child BOMs under one formula.
    ///
    /// Children are grouped by produced item and the locally best candidate
    /// per group competes with the globally best BOM for that item. A single
    /// output multiplier is folded out of per-ingredient LCMs so that every
    /// chosen child output divides the batch exactly; chosen children whose
    /// output does not already match are rescaled by integer multiply.
    pub fn combine(
        result: &Item,
        formula: &Formula,
        children: Vec<Bom>,
        best: &HashMap<ItemId, Bom>,
        avoid: &HashSet<ItemId>,
        prefer_craft: bool,
    ) -> Bom {
        // Locally best candidate per produced item.
        let mut local: HashMap<ItemId, Bom> = HashMap::new();
        for bom in children {
            match local.entry(bom.result.id.clone()) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    if bom.preference(entry.get()) == Ordering::Less {
                        entry.insert(bom);
                    }
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(bom);
                }
            }
        }

        // Per ingredient, the winner between the local and the global best.
        let mut chosen: BTreeMap<ItemId, Bom> = BTreeMap::new();
        for ing in formula.ingredients.iter() {
            let pick = match (local.get(&ing.item), best.get(&ing.item)) {
                (Some(l), Some(g)) => {
                    if l.preference(g) == Ordering::Less {
                        Some(l)
                    } else {
                        Some(g)
                    }
                }
                (Some(l), None) => Some(l),
                (None, Some(g)) => Some(g),
                (None, None) => None,
            };
            if let Some(bom) = pick {
                chosen.insert(ing.item.clone(), bom.clone());
            }
        }

        // Fold a single output multiplier out of the per-ingredient LCMs.
        let mut output_lcm = formula.result.qty;
        for ing in formula.ingredients.iter() {
            if let Some(bom) = chosen.get(&ing.item) {
                let ing_lcm = lcm(ing.qty, bom.output_qty);
                output_lcm = lcm(ing_lcm / ing.qty, output_lcm);
            }
        }
        let mut new_output = formula.result.qty;
        if new_output != output_lcm {
            new_output = output_lcm / new_output;
        }

        // Rescale chosen children to exact multiples of the scaled need.
        let k_output = new_output / formula.result.qty;
        for ing in formula.ingredients.iter() {
            if let Some(bom) = chosen.get_mut(&ing.item) {
                let ing_lcm = lcm(ing.qty * k_output, bom.output_qty);
                if ing_lcm != bom.output_qty {
                    *bom = bom.scaled(ing_lcm / bom.output_qty);
                }
            }
        }

        // Union the component maps, leaving out the intermediates the chosen
        // BOMs themselves produce. First registration wins on overlaps.
        let mut components: BTreeMap<ItemId, ItemInfo> = BTreeMap::new();
        for bom in chosen.values() {
            for (id, info) in &bom.components {
                if !chosen.contains_key(id) {
                    components.entry(id.clone()).or_insert_with(|| info.clone());
                }
            }
        }

        // Re-sum raw-material quantities per component across all children.
        let mut ingredients = IngredientList::new();
        for id in components.keys() {
            let qty: i64 = chosen.values().map(|bom| bom.qty_of(id)).sum();
            ingredients.add(Ingredient::new(id.clone(), qty));
        }

        let avoided = components.keys().any(|id| avoid.contains(id));
        // Link child trees, skipping a child rooted at this very formula so
        // replenishing loops cannot recurse into themselves.
        let children_trees: Vec<FormulaTree> = chosen
            .values()
            .filter(|bom| bom.tree.formula != *formula)
            .map(|bom| bom.tree.clone())
            .collect();
        Self::assemble(
            result.info(),
            ingredients,
            components,
            new_output,
            FormulaTree {
                formula: formula.clone(),
                children: children_trees,
            },
            avoided,
            prefer_craft,
        )
    }
}

// ---------------------------------------------------------------------------
// BOM builder (DFS visitor)
// ---------------------------------------------------------------------------

/// DFS visitor assembling BOMs bottom-up over the formula graph.
///
/// Each examined formula opens a frame collecting its children's BOMs; on
/// finish, the frame is folded into one BOM that competes for the per-item
/// "best so far" slot. Recursion bottoms out at ingredients nothing
/// produces: they stay raw materials priced at their base value.
pub struct BomBuilder<'a, C: Catalog> {
    catalog: &'a C,
    stack: Vec<Vec<Bom>>,
    best: HashMap<ItemId, Bom>,
    avoid: HashSet<ItemId>,
    prefer_craft: bool,
}

impl<'a, C: Catalog> BomBuilder<'a, C> {
    pub fn new(
        catalog: &'a C,
        avoid: impl IntoIterator<Item = ItemId>,
        prefer_craft: bool,
    ) -> Self {
        Self {
            catalog,
            stack: Vec::new(),
            best: HashMap::new(),
            avoid: avoid.into_iter().collect(),
            prefer_craft,
        }
    }

    /// The best BOM found so far per item id.
    pub fn best_boms(&self) -> &HashMap<ItemId, Bom> {
        &self.best
    }

    /// Take the best BOM for `item` and attach its process plan: per-step
    /// multiplicities from a counting walk, then execution-ordered steps and
    /// refinery allocations from a post-order walk over the chosen trees.
    pub fn finish(self, item: &ItemId) -> Option<Bom> {
        let Some(found) = self.best.get(item) else {
            warn!(item = %item, "no bill of materials found");
            return None;
        };
        let mut bom = found.clone();

        let mut counter = BomCounter {
            boms: &self.best,
            counts: HashMap::new(),
        };
        walk_graph(
            [item.clone()],
            &mut counter,
            WalkOrder::Dfs,
            WalkDirection::Source,
        );

        let mut scheduler = BomScheduler {
            boms: &self.best,
            counts: &counter.counts,
            multiple: 1,
            steps: Vec::new(),
            allocations: Vec::new(),
        };
        walk_graph(
            [item.clone()],
            &mut scheduler,
            WalkOrder::Dfs,
            WalkDirection::Source,
        );

        bom.process_steps = scheduler.steps;
        bom.refinery_allocations = scheduler.allocations;
        bom.avoided_items = self.avoid;
        Some(bom)
    }
}

impl<C: Catalog> NodeVisitor<Formula> for BomBuilder<'_, C> {
    fn get_adjacent(
        &mut self,
        node: &Formula,
        direction: WalkDirection,
        _distance: u32,
    ) -> Vec<Formula> {
        adjacent_formulas(self.catalog, node, direction)
    }

    fn examine_node(&mut self, node: &Formula, distance: u32) {
        debug!(formula = %node, distance, "examine");
        self.stack.push(Vec::new());
    }

    fn finish_node(&mut self, node: &Formula, distance: u32) {
        debug!(formula = %node, distance, frames = self.stack.len(), "finish");
        let children = self.stack.pop().unwrap_or_default();
        let Some(result) = self.catalog.get_item(&node.result.item) else {
            warn!(item = %node.result.item, "unresolved result item, dropping formula");
            return;
        };

        let bom = if children.is_empty() {
            Bom::make(
                self.catalog,
                result,
                node,
                &self.best,
                &self.avoid,
                self.prefer_craft,
            )
        } else {
            Some(Bom::combine(
                result,
                node,
                children,
                &self.best,
                &self.avoid,
                self.prefer_craft,
            ))
        };
        let Some(bom) = bom else { return };

        if let Some(frame) = self.stack.last_mut() {
            frame.push(bom.clone());
        }

        // Replace the cached best only when strictly better.
        match self.best.entry(node.result.item.clone()) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if bom.preference(entry.get()) == Ordering::Less {
                    entry.insert(bom);
                }
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(bom);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Process-plan visitors (walk the finished BOM graph by item id)
// ---------------------------------------------------------------------------

/// Counts how many times each chosen BOM is demanded across the tree: once on
/// discovery plus once per additional edge reaching it.
struct BomCounter<'a> {
    boms: &'a HashMap<ItemId, Bom>,
    counts: HashMap<ItemId, i64>,
}

impl BomCounter<'_> {
    fn bump(&mut self, item: &ItemId) {
        if let Some(count) = self.counts.get_mut(item) {
            *count += 1;
        }
    }
}

impl NodeVisitor<ItemId> for BomCounter<'_> {
    fn get_adjacent(
        &mut self,
        node: &ItemId,
        _direction: WalkDirection,
        _distance: u32,
    ) -> Vec<ItemId> {
        bom_dependencies(self.boms, node)
    }

    fn discover_node(&mut self, node: &ItemId, _distance: u32) {
        self.counts.insert(node.clone(), 1);
    }

    fn tree_edge(&mut self, _source: &ItemId, target: &ItemId) {
        self.bump(target);
    }

    fn back_edge(&mut self, _source: &ItemId, target: &ItemId) {
        self.bump(target);
    }

    fn fwd_or_cross_edge(&mut self, _source: &ItemId, target: &ItemId) {
        self.bump(target);
    }
}

/// Emits production steps in execution order (DFS post-order: ingredients
/// before consumers) with multiplicities, and assigns refining steps to a
/// refiner size.
struct BomScheduler<'a> {
    boms: &'a HashMap<ItemId, Bom>,
    counts: &'a HashMap<ItemId, i64>,
    multiple: i64,
    steps: Vec<(Formula, i64)>,
    allocations: Vec<(Formula, RefinerySize)>,
}

impl NodeVisitor<ItemId> for BomScheduler<'_> {
    fn get_adjacent(
        &mut self,
        node: &ItemId,
        _direction: WalkDirection,
        _distance: u32,
    ) -> Vec<ItemId> {
        bom_dependencies(self.boms, node)
    }

    fn finish_node(&mut self, node: &ItemId, _distance: u32) {
        let Some(bom) = self.boms.get(node) else {
            return;
        };
        let formula = bom.tree.formula.clone();
        let count = self.counts.get(node).copied().unwrap_or(1) * bom.output_qty * self.multiple;
        if formula.kind == FormulaType::Refining {
            self.allocations.push((formula.clone(), formula.refinery_size()));
        }
        self.steps.push((formula, count));
    }
}

/// Items whose chosen BOMs the given item's formula tree depends on.
fn bom_dependencies(boms: &HashMap<ItemId, Bom>, node: &ItemId) -> Vec<ItemId> {
    boms.get(node)
        .map(|bom| {
            bom.tree
                .children
                .iter()
                .map(|child| child.formula.result.item.clone())
                .filter(|id| boms.contains_key(id))
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Build the best bill of materials for `item`: walk its source formulas
/// depth-first, fold every subtree into candidate BOMs, and return the
/// winning one with its process plan attached. `None` when the item has no
/// producible formula path.
pub fn build_bom<C: Catalog>(
    catalog: &C,
    item: &Item,
    avoid: impl IntoIterator<Item = ItemId>,
    prefer_craft: bool,
) -> Option<Bom> {
    let mut builder = BomBuilder::new(catalog, avoid, prefer_craft);
    walk_graph(
        item.source_formulas.iter().cloned(),
        &mut builder,
        WalkOrder::Dfs,
        WalkDirection::Source,
    );
    builder.finish(&item.id)
}
