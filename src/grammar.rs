//! Grammar types.
//!
//! The registries map user-facing symbol names onto dense integer tags; the
//! rest of the crate operates exclusively on those tags.

use crate::types::{display_fn, Map, Set};
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TerminalID(u16);
impl TerminalID {
    /// Reserved terminal that marks the end of input.
    pub const EOI: Self = Self(0);
    const OFFSET: u16 = 1;
}
impl fmt::Debug for TerminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::EOI => write!(f, "T#End"),
            _ => write!(f, "T#{:03}", self.0),
        }
    }
}

/// A set of terminal symbols, backed by a bitset over the dense tags.
#[derive(Debug, Default, Clone)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}
impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.0.into())
    }
    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.0.into())
    }
    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner)
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner
            .iter()
            .map(|raw| raw.try_into().map(TerminalID).unwrap())
    }
}
impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(|t| t.0.into()).collect(),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonterminalID(u16);
impl NonterminalID {
    /// Reserved nonterminal on the left of the augmented start production.
    pub const START: Self = Self(0);
    const OFFSET: u16 = 1;
}
impl fmt::Debug for NonterminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::START => write!(f, "N#Start"),
            _ => write!(f, "N#{:03}", self.0),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}
impl fmt::Debug for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::T(t) => write!(f, "{:?}", t),
            Self::N(n) => write!(f, "{:?}", n),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionID(u16);
impl ProductionID {
    /// Reserved ID of the augmented start production `#Start -> S #EOI`.
    pub const ACCEPT: Self = Self(u16::MAX);
}
impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::ACCEPT => write!(f, "P#Accept"),
            _ => write!(f, "P#{:03}", self.0),
        }
    }
}

#[derive(Debug)]
pub struct Production {
    pub left: NonterminalID,
    pub right: Vec<SymbolID>,
}
impl Production {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} -> ", g.nonterminals[&self.left])?;
            if self.right.is_empty() {
                f.write_str("ε")?;
            } else {
                for (i, r) in self.right.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    match r {
                        SymbolID::N(n) => f.write_str(&*g.nonterminals[n])?,
                        SymbolID::T(t) => f.write_str(&*g.terminals[t])?,
                    }
                }
            }
            Ok(())
        })
    }
}

/// A tagged, augmented context-free grammar.
///
/// Read-only once constructed; every later pass treats it as an immutable
/// input.
#[derive(Debug)]
#[non_exhaustive]
pub struct Grammar {
    pub terminals: Map<TerminalID, String>,
    pub nonterminals: Map<NonterminalID, String>,
    pub productions: Map<ProductionID, Production>,
    pub productions_by_nonterminal: Map<NonterminalID, Set<ProductionID>>,
    pub start_symbol: NonterminalID,
}

impl Grammar {
    /// Define a grammar using the specified function.
    ///
    /// The reserved `#EOI`/`#Start` entries and the augmented start
    /// production `#Start -> S #EOI` are installed automatically.
    pub fn define<F>(g: F) -> Self
    where
        F: FnOnce(&mut GrammarDef),
    {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            productions: Map::default(),
            start_symbol: None,
            next_terminal: TerminalID::OFFSET,
            next_nonterminal: NonterminalID::OFFSET,
            next_production: 0,
        };

        def.terminals.insert(TerminalID::EOI, "#EOI".into());
        def.nonterminals
            .insert(NonterminalID::START, "#Start".into());

        g(&mut def);

        let start_symbol = def
            .start_symbol
            .or_else(|| {
                def.nonterminals
                    .keys()
                    .find(|&&id| id != NonterminalID::START)
                    .copied()
            })
            .expect("The start symbol is not specified");

        def.productions.insert(
            ProductionID::ACCEPT,
            Production {
                left: NonterminalID::START,
                right: vec![SymbolID::N(start_symbol), SymbolID::T(TerminalID::EOI)],
            },
        );

        let mut productions_by_nonterminal: Map<NonterminalID, Set<ProductionID>> = def
            .nonterminals
            .keys()
            .map(|&n| (n, Set::default()))
            .collect();
        for (&id, p) in &def.productions {
            productions_by_nonterminal[&p.left].insert(id);
        }

        Self {
            terminals: def.terminals,
            nonterminals: def.nonterminals,
            productions: def.productions,
            productions_by_nonterminal,
            start_symbol,
        }
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[&id]
    }

    /// The productions whose left-hand side is the specified nonterminal.
    pub fn productions_of(&self, left: NonterminalID) -> impl Iterator<Item = ProductionID> + '_ {
        self.productions_by_nonterminal
            .get(&left)
            .into_iter()
            .flatten()
            .copied()
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#### terminals: ")?;
        for (i, t) in self.terminals.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "\n#### nonterminals: ")?;
        for (i, n) in self.nonterminals.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", n)?;
        }
        writeln!(f, "\n#### productions:")?;
        for p in self.productions.values() {
            writeln!(f, "- {}", p.display(self))?;
        }
        Ok(())
    }
}

/// The contextual values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef {
    terminals: Map<TerminalID, String>,
    nonterminals: Map<NonterminalID, String>,
    productions: Map<ProductionID, Production>,
    start_symbol: Option<NonterminalID>,
    next_terminal: u16,
    next_nonterminal: u16,
    next_production: u16,
}

impl GrammarDef {
    /// Declare a terminal symbol used in this grammar.
    pub fn terminal(&mut self, s: &str) -> TerminalID {
        let terminal = TerminalID(self.next_terminal);
        self.terminals.insert(terminal, s.into());
        self.next_terminal += 1;
        terminal
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, s: &str) -> NonterminalID {
        let nonterminal = NonterminalID(self.next_nonterminal);
        self.nonterminals.insert(nonterminal, s.into());
        self.next_nonterminal += 1;
        nonterminal
    }

    /// Add a production rule into this grammar.
    pub fn production<I>(&mut self, left: NonterminalID, right: I) -> ProductionID
    where
        I: IntoIterator<Item = SymbolID>,
    {
        let right: Vec<_> = right.into_iter().collect();
        for (_, p) in &self.productions {
            assert!(
                p.left != left || p.right != right,
                "production rule duplicated"
            );
        }

        let id = ProductionID(self.next_production);
        self.productions.insert(id, Production { left, right });
        self.next_production += 1;
        id
    }

    /// Specify the start symbol.
    pub fn start_symbol(&mut self, start: NonterminalID) {
        self.start_symbol.replace(start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SymbolID::*;

    #[test]
    fn augmentation() {
        let grammar = Grammar::define(|g| {
            let a = g.terminal("A");
            let s = g.nonterminal("S");
            g.start_symbol(s);
            g.production(s, [T(a)]);
        });

        let accept = grammar.production(ProductionID::ACCEPT);
        assert_eq!(accept.left, NonterminalID::START);
        assert_eq!(
            accept.right,
            vec![N(grammar.start_symbol), T(TerminalID::EOI)]
        );
        assert_eq!(
            grammar
                .productions_of(NonterminalID::START)
                .collect::<Vec<_>>(),
            vec![ProductionID::ACCEPT]
        );
    }

    #[test]
    fn terminal_set_ops() {
        let grammar = Grammar::define(|g| {
            let a = g.terminal("A");
            let b = g.terminal("B");
            let s = g.nonterminal("S");
            g.start_symbol(s);
            g.production(s, [T(a), T(b)]);
        });
        let terminals: Vec<_> = grammar.terminals.keys().copied().collect();

        let mut set = TerminalSet::default();
        assert!(set.is_empty());
        assert!(set.insert(terminals[1]));
        assert!(!set.insert(terminals[1]));

        let all: TerminalSet = terminals.iter().copied().collect();
        set.union_with(&all);
        assert_eq!(set.len(), terminals.len());
        assert!(set.contains(TerminalID::EOI));
        assert_eq!(set.iter().collect::<Vec<_>>(), terminals);
    }

    #[test]
    fn start_symbol_defaults_to_first_nonterminal() {
        let grammar = Grammar::define(|g| {
            let x = g.terminal("X");
            let a = g.nonterminal("A");
            let b = g.nonterminal("B");
            g.production(a, [N(b)]);
            g.production(b, [T(x)]);
        });
        assert_eq!(&grammar.nonterminals[&grammar.start_symbol], "A");
    }
}
