//! Craftchain Core -- analysis of production-formula dependency graphs.
//!
//! Given a catalog of items and the formulas that produce them, this crate
//! answers three questions:
//!
//! 1. **What does it cost to build?** [`bom::build_bom`] folds the formula
//!    graph bottom-up into a [`bom::Bom`]: the minimal raw-material shopping
//!    list with exact integer batch scaling and a ranked choice between
//!    competing formulas.
//! 2. **Does a production loop pay off?** [`chain::detect_formula_cycles`]
//!    finds back edges in the formula graph and materializes each cycle as a
//!    [`chain::ProductionChain`] with net input, output and profit.
//! 3. **How long does it take?** [`refinery`] schedules the chain's work
//!    greedily onto a bounded set of station queues and reports the makespan.
//!
//! # Walking the graph
//!
//! Everything is driven by one generic traversal engine:
//!
//! ```rust,ignore
//! let mut visitor = CycleDetector::new(&catalog);
//! walk_graph(start_formulas, &mut visitor, WalkOrder::Dfs, WalkDirection::Source);
//! ```
//!
//! [`graph::walk_graph`] is node-type agnostic, iterative (no recursion
//! limit), colors nodes White -> Gray -> Black, and classifies every edge as
//! tree, back, or forward/cross. A back edge -- target still Gray -- is the
//! sole cycle-detection mechanism.
//!
//! # Key types
//!
//! - [`formula::Formula`] -- a recipe with structural-digest identity.
//! - [`ingredient::IngredientList`] -- canonical item/quantity mapping with
//!   LCM-friendly integer arithmetic.
//! - [`bom::Bom`] -- aggregated raw-material list with cost and formula tree.
//! - [`chain::ProductionChain`] -- ordered production stages with derived
//!   net profit and cached value/time estimates.
//! - [`refinery::RefineryPool`] -- greedy multi-queue makespan estimation.
//! - [`catalog::Catalog`] -- the boundary to whatever resolves item data;
//!   the core itself never performs I/O and is purely synchronous.

pub mod bom;
pub mod catalog;
pub mod chain;
#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod formula;
pub mod graph;
pub mod id;
pub mod ingredient;
pub mod numeric;
pub mod refinery;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
