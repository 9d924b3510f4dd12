//! Calculation of the predictive sets: nullable flags and FIRST sets.

use crate::{
    grammar::{Grammar, NonterminalID, ProductionID, SymbolID, TerminalSet},
    types::{Map, Set},
};

/// Per-nonterminal FIRST sets and nullable flags over a tagged grammar.
///
/// Computed once and treated as an immutable oracle by the automaton
/// construction.
#[derive(Debug)]
pub struct PredictiveSets {
    nullables: Set<NonterminalID>,
    first: Map<NonterminalID, TerminalSet>,
}

impl PredictiveSets {
    pub fn new(grammar: &Grammar) -> Self {
        let nullables = nulls_set(grammar);
        let first = first_sets(grammar, &nullables);
        Self { nullables, first }
    }

    pub fn is_nullable(&self, n: NonterminalID) -> bool {
        self.nullables.contains(&n)
    }

    /// `First(n)`, the terminals that can begin a derivation of `n`.
    pub fn first(&self, n: NonterminalID) -> &TerminalSet {
        &self.first[&n]
    }
}

/// Calculate the set of nullable nonterminals in this grammar.
fn nulls_set(grammar: &Grammar) -> Set<NonterminalID> {
    // Nonterminals with an empty production are nullable by definition.
    let mut nulls: Set<NonterminalID> = grammar
        .productions
        .values()
        .filter_map(|p| p.right.is_empty().then_some(p.left))
        .collect();

    // Repeat until the set no longer grows.
    let mut changed = true;
    while changed {
        changed = false;
        for p in grammar.productions.values() {
            if nulls.contains(&p.left) {
                continue;
            }
            let is_rhs_nullable = p
                .right
                .iter()
                .all(|s| matches!(s, SymbolID::N(n) if nulls.contains(n)));
            if is_rhs_nullable {
                changed = true;
                nulls.insert(p.left);
            }
        }
    }

    nulls
}

/// Calculate the FIRST set of every nonterminal in this grammar.
fn first_sets(grammar: &Grammar, nulls: &Set<NonterminalID>) -> Map<NonterminalID, TerminalSet> {
    let mut map: Map<NonterminalID, TerminalSet> = grammar
        .nonterminals
        .keys()
        .map(|&n| (n, TerminalSet::default()))
        .collect();

    // For X -> Y1 Y2 ... Yn, walk the leading nullable prefix: a terminal Yk
    // lands in First(X) directly, a nonterminal Yk contributes the constraint
    // First(X) ⊇ First(Yk). The walk stops at the first non-nullable symbol.
    #[derive(Debug)]
    struct Constraint {
        sup: NonterminalID,
        sub: NonterminalID,
    }
    let mut constraints = vec![];
    for (id, p) in &grammar.productions {
        if *id == ProductionID::ACCEPT {
            continue;
        }
        for symbol in &p.right {
            match symbol {
                SymbolID::T(t) => {
                    map[&p.left].insert(*t);
                    break;
                }
                SymbolID::N(n) => {
                    if p.left != *n {
                        constraints.push(Constraint {
                            sup: p.left,
                            sub: *n,
                        });
                    }
                    if !nulls.contains(n) {
                        break;
                    }
                }
            }
        }
    }

    // Solve the constraints by iterating the unions to a fixed point.
    let mut changed = true;
    while changed {
        changed = false;
        for Constraint { sup, sub } in &constraints {
            let subset = map[sub].clone();
            let superset = &mut map[sup];
            let before = superset.len();
            superset.union_with(&subset);
            changed |= superset.len() != before;
        }
    }

    map
}
