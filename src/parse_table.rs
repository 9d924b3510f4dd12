//! The ACTION/GOTO parse table derived from the LR(1) automaton.
//!
//! Conflicts are not errors here: every entry competing for a
//! `(state, terminal)` key is retained, and resolution is left to
//! downstream passes.

use crate::{
    grammar::{Grammar, NonterminalID, ProductionID, SymbolID, TerminalID},
    lr1::{Automaton, ItemSet, State, StateID},
    types::{display_fn, Map},
};
use std::{collections::BTreeSet, fmt};

/// The directive that the parser in a state performs on a particular
/// lookahead symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    /// Read the lookahead symbol and transition to the specified state.
    Shift(StateID),

    /// Reduce by the specified production rule.
    Reduce(ProductionID),

    /// Terminate successfully on the end of input.
    Accept,
}

impl Action {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| match self {
            Action::Shift(n) => write!(f, "shift({:?})", n),
            Action::Reduce(p) => write!(f, "reduce({})", g.production(*p).display(g)),
            Action::Accept => f.write_str("accept"),
        })
    }
}

/// Every ACTION entry recorded at one `(state, terminal)` key.
///
/// More than one entry means the grammar has a conflict at that key.
#[derive(Debug, Default, Clone)]
pub struct ActionSet {
    entries: BTreeSet<Action>,
}

impl ActionSet {
    fn insert(&mut self, action: Action) {
        self.entries.insert(action);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_consistent(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn contains(&self, action: Action) -> bool {
        self.entries.contains(&action)
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.entries.iter().copied()
    }

    /// The shift entry, if any. At most one can exist per key.
    pub fn shift(&self) -> Option<StateID> {
        self.entries.iter().find_map(|action| match action {
            Action::Shift(n) => Some(*n),
            _ => None,
        })
    }

    pub fn reduces(&self) -> impl Iterator<Item = ProductionID> + '_ {
        self.entries.iter().filter_map(|action| match action {
            Action::Reduce(p) => Some(*p),
            _ => None,
        })
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub struct ParseTableRow {
    /// The item set of the state, retained for diagnostics.
    pub item_set: ItemSet,
    pub actions: Map<TerminalID, ActionSet>,
    pub gotos: Map<NonterminalID, StateID>,
}

#[derive(Debug)]
#[non_exhaustive]
pub struct ParseTable {
    pub states: Map<StateID, ParseTableRow>,
}

impl ParseTable {
    pub fn state_count(&self) -> u32 {
        self.states.len() as u32
    }

    pub fn initial_state(&self) -> StateID {
        StateID::START
    }

    /// Every `(state, terminal)` key holding more than one ACTION entry.
    pub fn conflicts(&self) -> impl Iterator<Item = Conflict<'_>> + '_ {
        self.states.iter().flat_map(|(&state, row)| {
            row.actions
                .iter()
                .filter(|(_, actions)| !actions.is_consistent())
                .map(move |(&token, actions)| Conflict {
                    state,
                    token,
                    actions,
                })
        })
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (i, (id, row)) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {:?}", id)?;
                writeln!(f, "## items")?;
                for item in &row.item_set {
                    writeln!(f, "- {}", item.display(g))?;
                }
                writeln!(f, "## actions")?;
                for (token, actions) in &row.actions {
                    let token = &g.terminals[token];
                    if actions.is_consistent() {
                        for action in actions.iter() {
                            writeln!(f, "- {} => {}", token, action.display(g))?;
                        }
                    } else {
                        writeln!(f, "- {} => conflict", token)?;
                        for action in actions.iter() {
                            writeln!(f, "  - {}", action.display(g))?;
                        }
                    }
                }
                writeln!(f, "## gotos")?;
                for (symbol, goto) in &row.gotos {
                    writeln!(f, "- {} => goto({:?})", g.nonterminals[symbol], goto)?;
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct Conflict<'t> {
    pub state: StateID,
    pub token: TerminalID,
    pub actions: &'t ActionSet,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

impl Conflict<'_> {
    /// An `Accept` entry classifies with the reductions: it is the
    /// reduction of the accept production.
    pub fn kind(&self) -> ConflictKind {
        if self.actions.shift().is_some() {
            ConflictKind::ShiftReduce
        } else {
            ConflictKind::ReduceReduce
        }
    }
}

/// Derive the ACTION/GOTO table from the automaton.
pub fn generate(g: &Grammar, automaton: Automaton) -> ParseTable {
    let mut states = Map::default();
    for (id, state) in automaton.states {
        let State {
            item_set,
            shifts,
            gotos,
        } = state;

        let mut actions = Map::<TerminalID, ActionSet>::default();
        for (&t, &next) in &shifts {
            actions.entry(t).or_default().insert(Action::Shift(next));
        }
        for item in &item_set {
            match item.current_symbol(g) {
                // The dot at the end reduces on the item's lookahead.
                None => {
                    actions
                        .entry(item.lookahead)
                        .or_default()
                        .insert(Action::Reduce(item.production));
                }
                // The dot before the end of input accepts.
                Some(SymbolID::T(t)) if t == TerminalID::EOI => {
                    actions
                        .entry(TerminalID::EOI)
                        .or_default()
                        .insert(Action::Accept);
                }
                Some(_) => {}
            }
        }

        states.insert(
            id,
            ParseTableRow {
                item_set,
                actions,
                gotos,
            },
        );
    }
    ParseTable { states }
}
