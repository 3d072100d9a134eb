//! Triples, query masks and permutation indices
//!
//! The store keeps six orderings of every triple so that any partial
//! binding pattern enumerates one contiguous region of one index:
//!
//! | Index | Order | Use case |
//! |-------|-------|----------|
//! | EAV | e, a, v | attribute/value lookups of an entity |
//! | AEV | a, e, v | entities carrying an attribute |
//! | AVE | a, v, e | reverse lookup by attribute value |
//! | VEA | v, e, a | references to a symbol |
//! | VAE | v, a, e | references via an attribute |
//! | EVA | e, v, a | attributes connecting two symbols |
//!
//! A query names a mode per triple position; the matching permutation lists
//! Match coordinates first, then Varying, then Ignore, so bound prefixes
//! become point lookups and everything else one in-order scan.

use std::fmt;
use symvm_vocab::{sym, Symbol};

/// An ordered (entity, attribute, value) tuple of symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triple {
    pub entity: Symbol,
    pub attribute: Symbol,
    pub value: Symbol,
}

impl Triple {
    /// Build a triple.
    pub fn new(entity: Symbol, attribute: Symbol, value: Symbol) -> Self {
        Triple {
            entity,
            attribute,
            value,
        }
    }

    /// All-Void triple, the starting point for query results.
    pub fn void() -> Self {
        Triple::new(sym::VOID, sym::VOID, sym::VOID)
    }

    /// Coordinate by position: 0 = entity, 1 = attribute, 2 = value.
    pub fn pos(&self, i: usize) -> Symbol {
        match i {
            0 => self.entity,
            1 => self.attribute,
            _ => self.value,
        }
    }

    /// Write a coordinate by position.
    pub fn set_pos(&mut self, i: usize, symbol: Symbol) {
        match i {
            0 => self.entity = symbol,
            1 => self.attribute = symbol,
            _ => self.value = symbol,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.entity, self.attribute, self.value)
    }
}

/// Per-position query mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// The coordinate must equal the given symbol.
    Match,
    /// The coordinate is enumerated and reported.
    Varying,
    /// The coordinate is neither bound nor reported; results collapse to
    /// distinct combinations of the other coordinates.
    Ignore,
}

impl QueryMode {
    fn from_trit(trit: u8) -> QueryMode {
        match trit {
            0 => QueryMode::Match,
            1 => QueryMode::Varying,
            _ => QueryMode::Ignore,
        }
    }

    fn trit(self) -> u8 {
        match self {
            QueryMode::Match => 0,
            QueryMode::Varying => 1,
            QueryMode::Ignore => 2,
        }
    }
}

/// Modes for (entity, attribute, value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryMask(pub [QueryMode; 3]);

impl QueryMask {
    pub const MMM: QueryMask = QueryMask([QueryMode::Match, QueryMode::Match, QueryMode::Match]);
    pub const MMV: QueryMask = QueryMask([QueryMode::Match, QueryMode::Match, QueryMode::Varying]);
    pub const MVM: QueryMask = QueryMask([QueryMode::Match, QueryMode::Varying, QueryMode::Match]);
    pub const VMM: QueryMask = QueryMask([QueryMode::Varying, QueryMode::Match, QueryMode::Match]);
    pub const MVV: QueryMask =
        QueryMask([QueryMode::Match, QueryMode::Varying, QueryMode::Varying]);
    pub const VMV: QueryMask =
        QueryMask([QueryMode::Varying, QueryMode::Match, QueryMode::Varying]);
    pub const VVM: QueryMask =
        QueryMask([QueryMode::Varying, QueryMode::Varying, QueryMode::Match]);
    pub const VVV: QueryMask =
        QueryMask([QueryMode::Varying, QueryMode::Varying, QueryMode::Varying]);
    pub const MVI: QueryMask = QueryMask([QueryMode::Match, QueryMode::Varying, QueryMode::Ignore]);
    pub const MIV: QueryMask = QueryMask([QueryMode::Match, QueryMode::Ignore, QueryMode::Varying]);
    pub const MMI: QueryMask = QueryMask([QueryMode::Match, QueryMode::Match, QueryMode::Ignore]);
    pub const MII: QueryMask = QueryMask([QueryMode::Match, QueryMode::Ignore, QueryMode::Ignore]);

    /// Decode the wire encoding: entity trit + 3·attribute trit + 9·value
    /// trit, each trit Match=0, Varying=1, Ignore=2.
    pub fn from_code(code: u64) -> Option<QueryMask> {
        if code >= 27 {
            return None;
        }
        Some(QueryMask([
            QueryMode::from_trit((code % 3) as u8),
            QueryMode::from_trit(((code / 3) % 3) as u8),
            QueryMode::from_trit(((code / 9) % 3) as u8),
        ]))
    }

    /// The wire encoding of this mask.
    pub fn code(&self) -> u64 {
        self.0[0].trit() as u64 + 3 * self.0[1].trit() as u64 + 9 * self.0[2].trit() as u64
    }

    /// How many positions are Varying.
    pub fn varying_count(&self) -> usize {
        self.0
            .iter()
            .filter(|m| **m == QueryMode::Varying)
            .count()
    }
}

/// One of the six index orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permutation {
    Eav = 0,
    Aev = 1,
    Ave = 2,
    Vea = 3,
    Vae = 4,
    Eva = 5,
}

impl Permutation {
    /// All six, EAV first.
    pub const ALL: [Permutation; 6] = [
        Permutation::Eav,
        Permutation::Aev,
        Permutation::Ave,
        Permutation::Vea,
        Permutation::Vae,
        Permutation::Eva,
    ];

    /// Triple positions in index order: `coords()[level]` is the triple
    /// position enumerated at that level.
    pub fn coords(&self) -> [usize; 3] {
        match self {
            Permutation::Eav => [0, 1, 2],
            Permutation::Aev => [1, 0, 2],
            Permutation::Ave => [1, 2, 0],
            Permutation::Vea => [2, 0, 1],
            Permutation::Vae => [2, 1, 0],
            Permutation::Eva => [0, 2, 1],
        }
    }

    /// Select the permutation whose coordinate order lists the mask's
    /// Match positions first, then Varying, then Ignore. Ties keep
    /// position order, so results are stable across invocations.
    pub fn for_mask(mask: QueryMask) -> Permutation {
        let mut order = [0usize, 1, 2];
        order.sort_by_key(|&p| (mask.0[p].trit(), p));
        *Permutation::ALL
            .iter()
            .find(|perm| perm.coords() == order)
            .expect("all coordinate orders are covered")
    }

    /// Short index name.
    pub fn name(&self) -> &'static str {
        match self {
            Permutation::Eav => "eav",
            Permutation::Aev => "aev",
            Permutation::Ave => "ave",
            Permutation::Vea => "vea",
            Permutation::Vae => "vae",
            Permutation::Eva => "eva",
        }
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_code_roundtrip() {
        for code in 0..27 {
            let mask = QueryMask::from_code(code).unwrap();
            assert_eq!(mask.code(), code);
        }
        assert!(QueryMask::from_code(27).is_none());
        assert_eq!(QueryMask::MMV.code(), 9);
        assert_eq!(QueryMask::MVV.code(), 12);
    }

    #[test]
    fn permutation_selection() {
        assert_eq!(Permutation::for_mask(QueryMask::MMV), Permutation::Eav);
        assert_eq!(Permutation::for_mask(QueryMask::MVV), Permutation::Eav);
        assert_eq!(Permutation::for_mask(QueryMask::VMM), Permutation::Ave);
        assert_eq!(Permutation::for_mask(QueryMask::MVM), Permutation::Eva);
        assert_eq!(Permutation::for_mask(QueryMask::VVM), Permutation::Vea);
        assert_eq!(Permutation::for_mask(QueryMask::MIV), Permutation::Eva);
    }

    #[test]
    fn every_order_has_a_permutation() {
        let mut seen = std::collections::HashSet::new();
        for perm in Permutation::ALL {
            seen.insert(perm.coords());
        }
        assert_eq!(seen.len(), 6);
    }
}
