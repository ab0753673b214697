//! Well-known standard library items.
//!
//! Built-in expression forms (`vec!`, `?`, `.await`, ranges, formatting
//! macros, operators, `for` loops) are typed in terms of these. Any entry
//! may be missing, in which case the dependent expression types as unknown.

use crate::item::{AdtId, TraitId};

/// Operators that dispatch through a trait when the operands are not
/// built-in scalars.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl ArithOp {
    fn index(self) -> usize {
        self as usize
    }
}

/// Which of the range ADTs a range expression builds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RangeKind {
    /// `..`
    Full,
    /// `a..`
    From,
    /// `..b`
    To,
    /// `a..b`
    Exclusive,
    /// `a..=b`
    Inclusive,
    /// `..=b`
    ToInclusive,
}

#[derive(Clone, Debug, Default)]
pub struct KnownItems {
    pub option: Option<AdtId>,
    pub result: Option<AdtId>,
    pub vec: Option<AdtId>,
    pub boxed: Option<AdtId>,
    pub string: Option<AdtId>,
    pub arguments: Option<AdtId>,
    pub range_full: Option<AdtId>,
    pub range_from: Option<AdtId>,
    pub range_to: Option<AdtId>,
    pub range: Option<AdtId>,
    pub range_inclusive: Option<AdtId>,
    pub range_to_inclusive: Option<AdtId>,
    /// `Future<Output>`
    pub future: Option<TraitId>,
    /// `Generator<Yield, Return>`
    pub generator: Option<TraitId>,
    /// `Try<Ok, Error>`
    pub try_trait: Option<TraitId>,
    /// `Deref<Target>`
    pub deref: Option<TraitId>,
    /// `Index<Idx, Output>`
    pub index: Option<TraitId>,
    /// `IntoIterator<Item>`
    pub into_iterator: Option<TraitId>,
    /// `Fn`, `FnMut`, `FnOnce`; argument tuple as the single trait
    /// argument, `Output` as the associated type.
    pub fn_traits: Vec<TraitId>,
    pub partial_eq: Option<TraitId>,
    pub partial_ord: Option<TraitId>,
    arith: [Option<TraitId>; 10],
    arith_assign: [Option<TraitId>; 10],
}

impl KnownItems {
    pub fn range_adt(&self, kind: RangeKind) -> Option<AdtId> {
        match kind {
            RangeKind::Full => self.range_full,
            RangeKind::From => self.range_from,
            RangeKind::To => self.range_to,
            RangeKind::Exclusive => self.range,
            RangeKind::Inclusive => self.range_inclusive,
            RangeKind::ToInclusive => self.range_to_inclusive,
        }
    }

    /// Whether `adt` is any of the range types.
    pub fn is_range(&self, adt: AdtId) -> bool {
        [
            self.range_full,
            self.range_from,
            self.range_to,
            self.range,
            self.range_inclusive,
            self.range_to_inclusive,
        ]
        .contains(&Some(adt))
    }

    /// `Add` for `+`, ...
    pub fn arith_trait(&self, op: ArithOp) -> Option<TraitId> {
        self.arith[op.index()]
    }

    /// `AddAssign` for `+=`, ...
    pub fn arith_assign_trait(&self, op: ArithOp) -> Option<TraitId> {
        self.arith_assign[op.index()]
    }

    pub fn set_arith_trait(&mut self, op: ArithOp, trait_id: TraitId) {
        self.arith[op.index()] = Some(trait_id);
    }

    pub fn set_arith_assign_trait(&mut self, op: ArithOp, trait_id: TraitId) {
        self.arith_assign[op.index()] = Some(trait_id);
    }

    pub fn is_fn_trait(&self, trait_id: TraitId) -> bool {
        self.fn_traits.contains(&trait_id)
    }
}
