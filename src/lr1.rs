//! The implementation of the canonical LR(1) automaton.

use crate::{
    first_sets::PredictiveSets,
    grammar::{Grammar, NonterminalID, Production, ProductionID, SymbolID, TerminalID, TerminalSet},
    types::{display_fn, Map},
};
use std::{
    collections::{BTreeSet, VecDeque},
    fmt,
};

#[derive(Debug, thiserror::Error)]
pub enum TableGenError {
    /// Precondition violation at the item-algebra boundary.
    #[error("start index {index} is out of range for a production of length {len}")]
    InvalidStartIndex { index: usize, len: usize },

    /// The input grammar lacks the reserved start/end-of-input entries.
    #[error("the grammar is not augmented with `#Start -> S #EOI`")]
    MissingAugmentation,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u32);
impl StateID {
    pub const START: Self = Self(0);
}
impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}

/// An LR(1) item: a production, a dot position, and a lookahead terminal.
///
/// Equality and ordering are componentwise; two items differing only in
/// their lookahead are distinct.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LRItem {
    pub production: ProductionID,
    pub index: u16,
    pub lookahead: TerminalID,
}

impl LRItem {
    /// The symbol right of the dot, or `None` when the dot is at the end.
    pub fn current_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.production(self.production)
            .right
            .get(usize::from(self.index))
            .copied()
    }

    /// The item with the dot moved one symbol to the right.
    ///
    /// The caller guarantees that the dot is not already at the end.
    pub fn advanced(&self) -> Self {
        Self {
            index: self.index + 1,
            ..*self
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            let production = g.production(self.production);
            write!(f, "{} -> [ ", g.nonterminals[&production.left])?;
            for (i, r) in production.right.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                if i == usize::from(self.index) {
                    f.write_str(". ")?;
                }
                match r {
                    SymbolID::N(n) => f.write_str(&*g.nonterminals[n])?,
                    SymbolID::T(t) => f.write_str(&*g.terminals[t])?,
                }
            }
            if production.right.len() == usize::from(self.index) {
                write!(f, " .")?;
            }
            write!(f, " ] {{ {} }}", g.terminals[&self.lookahead])
        })
    }
}

/// A parser state. State identity is set equality over the items.
pub type ItemSet = BTreeSet<LRItem>;

/// `First(production[start..] lookahead)`.
///
/// The lookahead ends up in the result exactly when every symbol of the
/// suffix is nullable.
pub fn first_of_string(
    production: &Production,
    start: usize,
    lookahead: TerminalID,
    sets: &PredictiveSets,
) -> Result<TerminalSet, TableGenError> {
    if start > production.right.len() {
        return Err(TableGenError::InvalidStartIndex {
            index: start,
            len: production.right.len(),
        });
    }
    Ok(first_of_suffix(&production.right[start..], lookahead, sets))
}

fn first_of_suffix(suffix: &[SymbolID], lookahead: TerminalID, sets: &PredictiveSets) -> TerminalSet {
    let mut res = TerminalSet::default();
    for symbol in suffix {
        match symbol {
            // Terminals are never nullable.
            SymbolID::T(t) => {
                res.insert(*t);
                return res;
            }
            SymbolID::N(n) => {
                res.union_with(sets.first(*n));
                if !sets.is_nullable(*n) {
                    return res;
                }
            }
        }
    }
    res.insert(lookahead);
    res
}

/// Compute the closure of the specified item set.
pub fn closure(grammar: &Grammar, sets: &PredictiveSets, items: ItemSet) -> ItemSet {
    let mut closed = ItemSet::new();
    let mut pending: VecDeque<LRItem> = items.into_iter().collect();
    while let Some(item) = pending.pop_front() {
        if !closed.insert(item) {
            continue;
        }

        // [X -> ... . Y beta, a]
        //  Y: one nonterminal symbol
        let right = &grammar.production(item.production).right[usize::from(item.index)..];
        let (y_symbol, beta) = match right {
            [SymbolID::N(y_symbol), beta @ ..] => (*y_symbol, beta),
            _ => continue,
        };

        // Every production of Y starts a new item for each lookahead
        // in First(beta a).
        let lookaheads = first_of_suffix(beta, item.lookahead, sets);
        for production in grammar.productions_of(y_symbol) {
            for lookahead in lookaheads.iter() {
                let item = LRItem {
                    production,
                    index: 0,
                    lookahead,
                };
                if !closed.contains(&item) {
                    pending.push_back(item);
                }
            }
        }
    }
    closed
}

/// The transition function on item sets: advance the dot past `symbol` in
/// every matching item, then close the result.
///
/// An empty result means "no transition"; callers must not register it as a
/// state.
pub fn goto(grammar: &Grammar, sets: &PredictiveSets, state: &ItemSet, symbol: SymbolID) -> ItemSet {
    let kernel: ItemSet = state
        .iter()
        .filter(|item| item.current_symbol(grammar) == Some(symbol))
        .map(|item| item.advanced())
        .collect();
    if kernel.is_empty() {
        return kernel;
    }
    closure(grammar, sets, kernel)
}

#[derive(Debug)]
pub struct State {
    pub item_set: ItemSet,
    pub shifts: Map<TerminalID, StateID>,
    pub gotos: Map<NonterminalID, StateID>,
}

impl State {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            writeln!(f, "## items:")?;
            for item in &self.item_set {
                writeln!(f, "- {}", item.display(g))?;
            }
            if !self.shifts.is_empty() {
                writeln!(f, "## shifts:")?;
                for (t, to) in &self.shifts {
                    writeln!(f, "- {} => {:?}", g.terminals[t], to)?;
                }
            }
            if !self.gotos.is_empty() {
                writeln!(f, "## gotos:")?;
                for (n, to) in &self.gotos {
                    writeln!(f, "- {} => {:?}", g.nonterminals[n], to)?;
                }
            }
            Ok(())
        })
    }
}

/// The canonical LR(1) automaton: every state reachable from the initial
/// item set, deduplicated by item-set equality.
#[derive(Debug)]
pub struct Automaton {
    pub states: Map<StateID, State>,
}

impl Automaton {
    /// Calculate the canonical LR(1) automaton based on the specified
    /// grammar.
    #[tracing::instrument(skip_all)]
    pub fn generate(grammar: &Grammar, sets: &PredictiveSets) -> Result<Self, TableGenError> {
        validate_augmentation(grammar)?;

        let mut states = Map::<StateID, State>::default();
        let mut state_id = {
            let mut next_state_id = 0;
            move || {
                let id = StateID(next_state_id);
                next_state_id += 1;
                id
            }
        };

        // The kernel lookahead is the end-of-input terminal itself. This is
        // not a placeholder: with the `#Start -> S #EOI` augmentation the
        // end of input is syntactically present after S.
        let start_items: ItemSet = grammar
            .productions_of(NonterminalID::START)
            .map(|production| LRItem {
                production,
                index: 0,
                lookahead: TerminalID::EOI,
            })
            .collect();
        let initial = closure(grammar, sets, start_items);

        let mut state_ids = Map::<ItemSet, StateID>::default();
        let mut pending_states = VecDeque::new();
        let initial_id = state_id();
        state_ids.insert(initial.clone(), initial_id);
        pending_states.push_back((initial_id, initial));

        while let Some((current, item_set)) = pending_states.pop_front() {
            // Group the advanced kernels by the symbol right of the dot, so
            // that the goto of each (state, symbol) pair is computed once.
            let mut kernels = Map::<SymbolID, ItemSet>::default();
            for item in &item_set {
                match item.current_symbol(grammar) {
                    Some(SymbolID::T(t)) if t == TerminalID::EOI => {
                        // No successor over the end of input; the accept
                        // action is derived from the item shape instead.
                    }
                    Some(label) => {
                        kernels.entry(label).or_default().insert(item.advanced());
                    }
                    None => {}
                }
            }

            let mut shifts = Map::default();
            let mut gotos = Map::default();
            for (label, kernel) in kernels {
                let next_set = closure(grammar, sets, kernel);
                let next = match state_ids.get(&next_set) {
                    Some(&id) => id,
                    None => {
                        let id = state_id();
                        state_ids.insert(next_set.clone(), id);
                        pending_states.push_back((id, next_set));
                        id
                    }
                };
                match label {
                    SymbolID::T(t) => {
                        shifts.insert(t, next);
                    }
                    SymbolID::N(n) => {
                        gotos.insert(n, next);
                    }
                }
            }

            states.insert(
                current,
                State {
                    item_set,
                    shifts,
                    gotos,
                },
            );
        }

        tracing::trace!("number of states = {}", states.len());
        Ok(Self { states })
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[&id]
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (i, (id, state)) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {:?}", id)?;
                write!(f, "{}", state.display(g))?;
            }
            Ok(())
        })
    }
}

fn validate_augmentation(grammar: &Grammar) -> Result<(), TableGenError> {
    if !grammar.terminals.contains_key(&TerminalID::EOI)
        || !grammar.nonterminals.contains_key(&NonterminalID::START)
    {
        return Err(TableGenError::MissingAugmentation);
    }

    let accept = grammar
        .productions
        .get(&ProductionID::ACCEPT)
        .ok_or(TableGenError::MissingAugmentation)?;
    let well_formed = accept.left == NonterminalID::START
        && matches!(
            accept.right[..],
            [SymbolID::N(s), SymbolID::T(t)] if s == grammar.start_symbol && t == TerminalID::EOI
        );
    if !well_formed {
        return Err(TableGenError::MissingAugmentation);
    }

    // The end-of-input terminal may appear nowhere but at the end of the
    // accept production.
    for (&id, p) in &grammar.productions {
        for (i, symbol) in p.right.iter().enumerate() {
            if let SymbolID::T(t) = symbol {
                assert!(
                    *t != TerminalID::EOI || (id == ProductionID::ACCEPT && i == p.right.len() - 1),
                    "the end-of-input terminal may only terminate the accept production"
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    // S -> `a`
    fn single_terminal() -> (Grammar, TerminalID, NonterminalID) {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let a = g.terminal("`a`");
            let s = g.nonterminal("S");
            g.start_symbol(s);
            g.production(s, [T(a)]);
            ids = Some((a, s));
        });
        let (a, s) = ids.unwrap();
        (grammar, a, s)
    }

    #[test]
    fn closure_is_monotone_and_idempotent() {
        let (grammar, _a, _s) = single_terminal();
        let sets = PredictiveSets::new(&grammar);

        let kernel: ItemSet = [LRItem {
            production: ProductionID::ACCEPT,
            index: 0,
            lookahead: TerminalID::EOI,
        }]
        .into_iter()
        .collect();

        let closed = closure(&grammar, &sets, kernel.clone());
        assert!(closed.is_superset(&kernel));
        assert_eq!(closure(&grammar, &sets, closed.clone()), closed);
    }

    #[test]
    fn goto_is_deterministic() {
        let (grammar, a, s) = single_terminal();
        let sets = PredictiveSets::new(&grammar);

        let initial = closure(
            &grammar,
            &sets,
            [LRItem {
                production: ProductionID::ACCEPT,
                index: 0,
                lookahead: TerminalID::EOI,
            }]
            .into_iter()
            .collect(),
        );

        assert_eq!(
            goto(&grammar, &sets, &initial, T(a)),
            goto(&grammar, &sets, &initial, T(a)),
        );
        assert_eq!(
            goto(&grammar, &sets, &initial, N(s)),
            goto(&grammar, &sets, &initial, N(s)),
        );

        // No item has the end of input right of the dot in the initial
        // state, so the transition is empty.
        assert!(goto(&grammar, &sets, &initial, T(TerminalID::EOI)).is_empty());
    }

    #[test]
    fn first_of_string_includes_lookahead_iff_suffix_nullable() {
        // A -> ε | `a`;  B -> ε | `b`;  S -> A B `x`
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let ta = g.terminal("`a`");
            let tb = g.terminal("`b`");
            let tx = g.terminal("`x`");
            let s = g.nonterminal("S");
            let a = g.nonterminal("A");
            let b = g.nonterminal("B");
            g.start_symbol(s);
            let p = g.production(s, [N(a), N(b), T(tx)]);
            g.production(a, []);
            g.production(a, [T(ta)]);
            g.production(b, []);
            g.production(b, [T(tb)]);
            ids = Some((p, ta, tb, tx));
        });
        let (p, ta, tb, tx) = ids.unwrap();
        let sets = PredictiveSets::new(&grammar);
        let production = grammar.production(p);

        let first = first_of_string(production, 0, TerminalID::EOI, &sets).unwrap();
        for t in [ta, tb, tx] {
            assert!(first.contains(t));
        }
        assert!(!first.contains(TerminalID::EOI));

        let first = first_of_string(production, 2, TerminalID::EOI, &sets).unwrap();
        assert_eq!(first.iter().collect::<Vec<_>>(), vec![tx]);

        // The empty suffix is fully nullable.
        let first = first_of_string(production, 3, TerminalID::EOI, &sets).unwrap();
        assert_eq!(first.iter().collect::<Vec<_>>(), vec![TerminalID::EOI]);

        assert!(matches!(
            first_of_string(production, 4, TerminalID::EOI, &sets),
            Err(TableGenError::InvalidStartIndex { index: 4, len: 3 }),
        ));
    }

    #[test]
    fn single_terminal_automaton() {
        let (grammar, a, s) = single_terminal();
        let sets = PredictiveSets::new(&grammar);
        let automaton = Automaton::generate(&grammar, &sets).unwrap();
        eprintln!("automaton:\n---\n{}", automaton.display(&grammar));

        // No successor is computed over the end of input, so the machine
        // has exactly three states.
        assert_eq!(automaton.states.len(), 3);

        let initial = automaton.state(StateID::START);
        let post_a = initial.shifts[&a];
        let post_s = initial.gotos[&s];
        assert_ne!(post_a, post_s);

        let post_a = automaton.state(post_a);
        assert!(post_a.shifts.is_empty() && post_a.gotos.is_empty());
        assert!(post_a
            .item_set
            .iter()
            .all(|item| item.current_symbol(&grammar).is_none()));

        let post_s = automaton.state(post_s);
        assert!(post_s.shifts.is_empty() && post_s.gotos.is_empty());
        assert_eq!(post_s.item_set.len(), 1);
        let item = post_s.item_set.first().unwrap();
        assert_eq!(item.current_symbol(&grammar), Some(T(TerminalID::EOI)));
        assert_eq!(item.production, ProductionID::ACCEPT);
    }

    #[test]
    fn right_recursion_terminates() {
        // S -> `a` S | `a`
        let grammar = Grammar::define(|g| {
            let a = g.terminal("`a`");
            let s = g.nonterminal("S");
            g.start_symbol(s);
            g.production(s, [T(a), N(s)]);
            g.production(s, [T(a)]);
        });
        let sets = PredictiveSets::new(&grammar);
        let automaton = Automaton::generate(&grammar, &sets).unwrap();

        // Runaway cap: far above the item-universe bound for this grammar.
        assert!(automaton.states.len() <= 16);

        // Distinct ids always carry distinct item sets.
        let distinct: BTreeSet<&ItemSet> =
            automaton.states.values().map(|s| &s.item_set).collect();
        assert_eq!(distinct.len(), automaton.states.len());

        // Every transition target is a registered state, and every state
        // except the initial one is the target of some shift or goto.
        let mut reached: BTreeSet<StateID> = [StateID::START].into_iter().collect();
        for state in automaton.states.values() {
            for &to in state.shifts.values().chain(state.gotos.values()) {
                assert!(automaton.states.contains_key(&to));
                reached.insert(to);
            }
        }
        assert_eq!(reached.len(), automaton.states.len());
    }

    #[test]
    fn missing_augmentation_is_rejected() {
        let (mut grammar, _a, _s) = single_terminal();
        grammar.productions.shift_remove(&ProductionID::ACCEPT);

        let sets = PredictiveSets::new(&grammar);
        assert!(matches!(
            Automaton::generate(&grammar, &sets),
            Err(TableGenError::MissingAugmentation),
        ));
    }
}
