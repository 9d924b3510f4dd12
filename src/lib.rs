//! A canonical LR(1) parser table generator.
//!
//! Given a tagged, augmented context-free grammar, the crate constructs the
//! canonical collection of LR(1) item sets and the ACTION/GOTO table over
//! it. Conflicting actions are recorded, not resolved: every entry competing
//! for a `(state, terminal)` key survives into the output so that a
//! downstream pass can report or resolve them.

pub mod first_sets;
pub mod grammar;
pub mod lr1;
pub mod parse_table;
pub mod types;

use crate::{
    first_sets::PredictiveSets,
    grammar::Grammar,
    lr1::{Automaton, TableGenError},
    parse_table::ParseTable,
};

/// Compute the canonical LR(1) parse table from the specified grammar.
pub fn compute(g: &Grammar) -> Result<ParseTable, TableGenError> {
    let sets = PredictiveSets::new(g);
    let automaton = Automaton::generate(g, &sets)?;
    Ok(parse_table::generate(g, automaton))
}
