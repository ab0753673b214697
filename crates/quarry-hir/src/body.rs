//! Per-body expression and pattern arenas.
//!
//! A `Body` is the lowered form of one function, constant, array length or
//! enum discriminant. Expressions and patterns live in flat arenas and refer
//! to each other by id; every expression knows its parent and its source
//! range so diagnostics can be placed and de-duplicated.

use std::ops::Index;

use rowan::{TextRange, TextSize};

use crate::item::{AdtId, ConstId, FunctionId, VariantRef};
use crate::known::{ArithOp, RangeKind};
use crate::resolve::{PathResolution, ResolvedNames};
use crate::ty::{FloatTy, IntTy, Mutability, Substitution, Ty};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ExprId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct PatId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ExprOrPatId {
    Expr(ExprId),
    Pat(PatId),
}

impl From<ExprId> for ExprOrPatId {
    fn from(id: ExprId) -> Self {
        ExprOrPatId::Expr(id)
    }
}

impl From<PatId> for ExprOrPatId {
    fn from(id: PatId) -> Self {
        ExprOrPatId::Pat(id)
    }
}

/// The item whose body is being inferred.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum BodyOwner {
    Function(FunctionId),
    Const(ConstId),
    /// An anonymous constant in array-length position.
    ArrayLen(u32),
    /// An explicit enum discriminant: `A = 3`.
    Discriminant(AdtId, u32),
}

// ── Expressions ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    pub segments: Vec<String>,
}

impl Path {
    pub fn single(name: impl Into<String>) -> Path {
        Path { segments: vec![name.into()] }
    }

    pub fn from_segments<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Path {
        Path { segments: segments.into_iter().map(Into::into).collect() }
    }

    /// `S::foo` rather than `foo`.
    pub fn is_qualified(&self) -> bool {
        self.segments.len() > 1
    }
}

/// A literal token, already decoded by the front end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Char,
    ByteChar,
    Str,
    /// `b"..."` with its decoded length.
    ByteStr(u64),
    Int(Option<IntTy>),
    Float(Option<FloatTy>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldName {
    Named(String),
    Index(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Ref(Mutability),
    Deref,
    Neg,
    Not,
    Box,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn is_equality(self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::Ne)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Logic(LogicOp),
    Arith(ArithOp),
    Cmp(CmpOp),
    /// `=` when `None`, `+=` and friends otherwise.
    Assign(Option<ArithOp>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Plain,
    Unsafe,
    Async,
    Try,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Let { pat: PatId, ty: Option<Ty>, init: Option<ExprId> },
    Expr(ExprId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchArm {
    pub pat: PatId,
    pub guard: Option<ExprId>,
    pub expr: ExprId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayExpr {
    List(Vec<ExprId>),
    /// `[initializer; len]`; `len_value` is the evaluated length when the
    /// front end could compute it.
    Repeat { initializer: ExprId, len: ExprId, len_value: Option<u64> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub expr: ExprId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureParam {
    pub pat: PatId,
    pub ty: Option<Ty>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroArgs {
    /// Comma separated expressions; format strings are dropped by lowering.
    Exprs(Vec<ExprId>),
    /// `vec![...]`
    Array(ArrayExpr),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroCall {
    pub name: String,
    pub args: MacroArgs,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// Syntax the front end could not make sense of.
    Missing,
    Path(Path),
    Literal(Literal),
    Struct { path: Path, fields: Vec<StructField>, spread: Option<ExprId> },
    Tuple(Vec<ExprId>),
    Array(ArrayExpr),
    Range { lhs: Option<ExprId>, rhs: Option<ExprId>, inclusive: bool },
    Index { base: ExprId, index: ExprId },
    Cast { expr: ExprId, ty: Ty },
    Call { callee: ExprId, args: Vec<ExprId> },
    MethodCall { receiver: ExprId, method: String, generic_args: Vec<Ty>, args: Vec<ExprId> },
    Field { receiver: ExprId, name: FieldName },
    Block { kind: BlockKind, label: Option<String>, stmts: Vec<Statement>, tail: Option<ExprId> },
    If { condition: ExprId, then_branch: ExprId, else_branch: Option<ExprId> },
    /// `let PAT = EXPR` in condition position.
    Let { pat: PatId, expr: ExprId },
    Loop { label: Option<String>, body: ExprId },
    While { label: Option<String>, condition: ExprId, body: ExprId },
    For { label: Option<String>, pat: PatId, iterable: ExprId, body: ExprId },
    Match { scrutinee: ExprId, arms: Vec<MatchArm> },
    Unary { op: UnaryOp, expr: ExprId },
    Binary { op: BinaryOp, lhs: ExprId, rhs: ExprId },
    Try(ExprId),
    Await(ExprId),
    Yield(Option<ExprId>),
    Return(Option<ExprId>),
    Break { label: Option<String>, expr: Option<ExprId> },
    Continue { label: Option<String> },
    Closure { params: Vec<ClosureParam>, ret: Option<Ty>, body: ExprId, is_async: bool },
    Macro(MacroCall),
}

impl Expr {
    pub fn label(&self) -> Option<&str> {
        match self {
            Expr::Loop { label, .. }
            | Expr::While { label, .. }
            | Expr::For { label, .. }
            | Expr::Block { label, .. } => label.as_deref(),
            _ => None,
        }
    }

    /// The range kind this expression builds, if it is a range.
    pub fn range_kind(&self) -> Option<RangeKind> {
        match self {
            Expr::Range { lhs, rhs, inclusive } => {
                match (lhs.is_some(), rhs.is_some(), *inclusive) {
                    (false, false, _) => Some(RangeKind::Full),
                    (true, false, _) => Some(RangeKind::From),
                    (false, true, false) => Some(RangeKind::To),
                    (false, true, true) => Some(RangeKind::ToInclusive),
                    (true, true, false) => Some(RangeKind::Exclusive),
                    (true, true, true) => Some(RangeKind::Inclusive),
                }
            }
            _ => None,
        }
    }

    /// Calls `f` for every directly nested expression, in evaluation order.
    pub fn walk_child_exprs(&self, mut f: impl FnMut(ExprId)) {
        let array = |array: &ArrayExpr, f: &mut dyn FnMut(ExprId)| match array {
            ArrayExpr::List(elems) => elems.iter().copied().for_each(&mut *f),
            ArrayExpr::Repeat { initializer, len, .. } => {
                f(*initializer);
                f(*len);
            }
        };
        match self {
            Expr::Missing | Expr::Path(_) | Expr::Literal(_) | Expr::Continue { .. } => {}
            Expr::Struct { fields, spread, .. } => {
                fields.iter().for_each(|field| f(field.expr));
                spread.iter().copied().for_each(f);
            }
            Expr::Tuple(exprs) => exprs.iter().copied().for_each(f),
            Expr::Array(arr) => array(arr, &mut f),
            Expr::Range { lhs, rhs, .. } => lhs.iter().chain(rhs).copied().for_each(f),
            Expr::Index { base, index } => {
                f(*base);
                f(*index);
            }
            Expr::Cast { expr, .. }
            | Expr::Field { receiver: expr, .. }
            | Expr::Let { expr, .. }
            | Expr::Loop { body: expr, .. }
            | Expr::Unary { expr, .. }
            | Expr::Try(expr)
            | Expr::Await(expr)
            | Expr::Closure { body: expr, .. } => f(*expr),
            Expr::Call { callee, args } => {
                f(*callee);
                args.iter().copied().for_each(f);
            }
            Expr::MethodCall { receiver, args, .. } => {
                f(*receiver);
                args.iter().copied().for_each(f);
            }
            Expr::Block { stmts, tail, .. } => {
                for stmt in stmts {
                    match stmt {
                        Statement::Let { init, .. } => init.iter().copied().for_each(&mut f),
                        Statement::Expr(expr) => f(*expr),
                    }
                }
                tail.iter().copied().for_each(f);
            }
            Expr::If { condition, then_branch, else_branch } => {
                f(*condition);
                f(*then_branch);
                else_branch.iter().copied().for_each(f);
            }
            Expr::While { condition, body, .. } => {
                f(*condition);
                f(*body);
            }
            Expr::For { iterable, body, .. } => {
                f(*iterable);
                f(*body);
            }
            Expr::Match { scrutinee, arms } => {
                f(*scrutinee);
                for arm in arms {
                    arm.guard.iter().copied().for_each(&mut f);
                    f(arm.expr);
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            Expr::Yield(expr) | Expr::Return(expr) | Expr::Break { expr, .. } => {
                expr.iter().copied().for_each(f)
            }
            Expr::Macro(call) => match &call.args {
                MacroArgs::Exprs(exprs) => exprs.iter().copied().for_each(f),
                MacroArgs::Array(arr) => array(arr, &mut f),
            },
        }
    }
}

// ── Patterns ───────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BindingMode {
    ByValue(Mutability),
    ByRef(Mutability),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pat {
    Missing,
    Wild,
    Bind { name: String, mode: BindingMode, sub: Option<PatId> },
    Tuple(Vec<PatId>),
    TupleStruct { path: Path, args: Vec<PatId> },
    Struct { path: Path, fields: Vec<(String, PatId)> },
    /// A unit struct, unit variant or constant.
    Path(Path),
    Ref { pat: PatId, mutability: Mutability },
    Lit(ExprId),
    Range { start: Option<ExprId>, end: Option<ExprId> },
    /// `[a, b, rest @ .., z]`; `rest` is the pattern in `..` position.
    Slice { prefix: Vec<PatId>, rest: Option<PatId>, suffix: Vec<PatId> },
    Or(Vec<PatId>),
}

// ── Body ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ExprData {
    pub kind: Expr,
    pub range: TextRange,
    pub parent: Option<ExprId>,
}

#[derive(Clone, Debug)]
pub struct PatData {
    pub kind: Pat,
    pub range: TextRange,
}

#[derive(Clone, Debug)]
pub struct Body {
    exprs: Vec<ExprData>,
    pats: Vec<PatData>,
    /// Parameter patterns, the self parameter first when present.
    pub params: Vec<PatId>,
    pub root: ExprId,
}

impl Body {
    pub fn exprs(&self) -> impl Iterator<Item = (ExprId, &ExprData)> {
        self.exprs.iter().enumerate().map(|(i, data)| (ExprId(i as u32), data))
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn pat_data(&self, pat: PatId) -> &PatData {
        &self.pats[pat.0 as usize]
    }

    pub fn expr_data(&self, expr: ExprId) -> &ExprData {
        &self.exprs[expr.0 as usize]
    }

    pub fn parent(&self, expr: ExprId) -> Option<ExprId> {
        self.expr_data(expr).parent
    }

    pub fn range(&self, site: ExprOrPatId) -> TextRange {
        match site {
            ExprOrPatId::Expr(expr) => self.expr_data(expr).range,
            ExprOrPatId::Pat(pat) => self.pat_data(pat).range,
        }
    }

    /// Whether `ancestor` is `expr` or encloses it.
    pub fn is_ancestor_of(&self, ancestor: ExprId, expr: ExprId) -> bool {
        let mut cur = Some(expr);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    /// Whether the expression is a closure literal.
    pub fn is_closure(&self, expr: ExprId) -> bool {
        matches!(self[expr], Expr::Closure { .. })
    }
}

impl Index<ExprId> for Body {
    type Output = Expr;
    fn index(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize].kind
    }
}

impl Index<PatId> for Body {
    type Output = Pat;
    fn index(&self, id: PatId) -> &Pat {
        &self.pats[id.0 as usize].kind
    }
}

// ── Builder ────────────────────────────────────────────────────────────

/// Assembles a `Body` bottom-up together with the name resolution results
/// for its paths.
///
/// Nodes without an explicit range get consecutive one-byte ranges so that
/// every node is distinguishable in rendered diagnostics.
#[derive(Default)]
pub struct BodyBuilder {
    exprs: Vec<ExprData>,
    pats: Vec<PatData>,
    params: Vec<PatId>,
    names: ResolvedNames,
    next_offset: u32,
}

impl BodyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_range(&mut self) -> TextRange {
        let start = TextSize::from(self.next_offset);
        self.next_offset += 1;
        TextRange::at(start, TextSize::from(1))
    }

    pub fn alloc_expr(&mut self, kind: Expr) -> ExprId {
        let range = self.next_range();
        self.alloc_expr_at(kind, range)
    }

    pub fn alloc_expr_at(&mut self, kind: Expr, range: TextRange) -> ExprId {
        self.exprs.push(ExprData { kind, range, parent: None });
        ExprId(self.exprs.len() as u32 - 1)
    }

    pub fn alloc_pat(&mut self, kind: Pat) -> PatId {
        let range = self.next_range();
        self.alloc_pat_at(kind, range)
    }

    pub fn alloc_pat_at(&mut self, kind: Pat, range: TextRange) -> PatId {
        self.pats.push(PatData { kind, range });
        PatId(self.pats.len() as u32 - 1)
    }

    /// Allocates a path expression and records what it resolves to.
    pub fn alloc_path(&mut self, path: Path, resolutions: Vec<PathResolution>) -> ExprId {
        let expr = self.alloc_expr(Expr::Path(path));
        self.names.record_path(expr, resolutions);
        expr
    }

    pub fn add_param(&mut self, pat: PatId) {
        self.params.push(pat);
    }

    pub fn record_path(&mut self, expr: ExprId, resolutions: Vec<PathResolution>) {
        self.names.record_path(expr, resolutions);
    }

    pub fn record_variant(
        &mut self,
        site: impl Into<ExprOrPatId>,
        variant: VariantRef,
        subst: Substitution,
    ) {
        self.names.record_variant(site.into(), variant, subst);
    }

    pub fn names_mut(&mut self) -> &mut ResolvedNames {
        &mut self.names
    }

    /// Links parents and returns the finished body with its resolutions.
    pub fn finish(mut self, root: ExprId) -> (Body, ResolvedNames) {
        for idx in 0..self.exprs.len() {
            let parent = ExprId(idx as u32);
            let mut children = Vec::new();
            self.exprs[idx].kind.walk_child_exprs(|child| children.push(child));
            for child in children {
                self.exprs[child.0 as usize].parent = Some(parent);
            }
        }
        let body = Body { exprs: self.exprs, pats: self.pats, params: self.params, root };
        (body, self.names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_links_parents() {
        let mut b = BodyBuilder::new();
        let one = b.alloc_expr(Expr::Literal(Literal::Int(None)));
        let two = b.alloc_expr(Expr::Literal(Literal::Int(None)));
        let op = BinaryOp::Arith(ArithOp::Add);
        let add = b.alloc_expr(Expr::Binary { op, lhs: one, rhs: two });
        let block = b.alloc_expr(Expr::Block {
            kind: BlockKind::Plain,
            label: None,
            stmts: Vec::new(),
            tail: Some(add),
        });
        let (body, _) = b.finish(block);
        assert_eq!(body.parent(one), Some(add));
        assert_eq!(body.parent(add), Some(block));
        assert_eq!(body.parent(block), None);
        assert!(body.is_ancestor_of(block, two));
        assert!(body.is_ancestor_of(two, two));
        assert!(!body.is_ancestor_of(one, add));
    }

    #[test]
    fn range_kinds() {
        let mut b = BodyBuilder::new();
        let lit = b.alloc_expr(Expr::Literal(Literal::Int(None)));
        let to_incl = Expr::Range { lhs: None, rhs: Some(lit), inclusive: true };
        assert_eq!(to_incl.range_kind(), Some(RangeKind::ToInclusive));
        let full = Expr::Range { lhs: None, rhs: None, inclusive: false };
        assert_eq!(full.range_kind(), Some(RangeKind::Full));
    }
}
