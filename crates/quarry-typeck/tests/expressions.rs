//! Integration tests for literals, blocks, conditionals, loops and macros.
//!
//! Covers:
//! - numeric literal defaulting and propagation through bindings
//! - expected types flowing into tails, branches and array elements
//! - joins of `if`/`match` branches, including diverging ones
//! - `break` values of loops and labeled blocks
//! - the function-body return slot
//! - well-known macros

mod common;

use common::*;
use pretty_assertions::assert_eq;
use quarry_hir::body::{
    ArrayExpr, BlockKind, BodyBuilder, BodyOwner, Expr, ExprId, Literal, MacroArgs, MacroCall,
    MatchArm, Pat, Statement,
};
use quarry_hir::item::Generics;
use quarry_hir::ty::{FloatTy, IntTy, Mutability, Region, Ty};
use quarry_hir::ExprOrPatId;
use quarry_typeck::InferenceDiagnostic;

// ── Helpers ────────────────────────────────────────────────────────────

/// A std fixture plus `fn main() -> ret` to hold the body under test.
fn setup(ret: Ty) -> (MiniStd, BodyOwner) {
    let mut std = MiniStd::new();
    let main = std.free_fn("main", Generics::default(), Vec::new(), ret);
    (std, BodyOwner::Function(main))
}

fn macro_call(b: &mut BodyBuilder, name: &str, args: Vec<ExprId>) -> ExprId {
    b.alloc_expr(Expr::Macro(MacroCall { name: name.to_string(), args: MacroArgs::Exprs(args) }))
}

fn loop_expr(b: &mut BodyBuilder, label: Option<&str>, body: ExprId) -> ExprId {
    b.alloc_expr(Expr::Loop { label: label.map(str::to_string), body })
}

fn break_expr(b: &mut BodyBuilder, label: Option<&str>, value: Option<ExprId>) -> ExprId {
    b.alloc_expr(Expr::Break { label: label.map(str::to_string), expr: value })
}

// ── Literals ───────────────────────────────────────────────────────────

/// An unconstrained integer literal defaults to `i32`.
#[test]
fn test_int_literal_defaults_to_i32() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let one = int(&mut b);
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, None, one)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.binding_type(x), Ty::Int(IntTy::I32));
    assert_eq!(result.expr_type(one), Ty::Int(IntTy::I32));
    assert_eq!(result.expr_type(root), Ty::unit());
    assert!(result.diagnostics().is_empty());
}

/// An unconstrained float literal defaults to `f64`.
#[test]
fn test_float_literal_defaults_to_f64() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let half = lit(&mut b, Literal::Float(None));
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, None, half)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.binding_type(x), Ty::Float(FloatTy::F64));
}

/// An annotation on `let` is the expected type of its initializer.
#[test]
fn test_let_annotation_types_literal() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let one = int(&mut b);
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, Some(Ty::Int(IntTy::U8)), one)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(one), Ty::Int(IntTy::U8));
    assert_eq!(result.binding_type(x), Ty::Int(IntTy::U8));
}

/// A later use pins an integer variable introduced earlier.
#[test]
fn test_later_use_pins_integer_variable() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let one = int(&mut b);
    let x = bind(&mut b, "x");
    let use_x = local(&mut b, "x", x);
    let y = bind(&mut b, "y");
    let root = block(
        &mut b,
        vec![let_stmt(x, None, one), let_stmt(y, Some(Ty::Int(IntTy::U64)), use_x)],
        None,
    );

    let result = std.infer(owner, b, root);
    assert_eq!(result.binding_type(x), Ty::Int(IntTy::U64));
    assert_eq!(result.expr_type(one), Ty::Int(IntTy::U64));
    assert!(result.diagnostics().is_empty());
}

/// String and byte-string literals are static references.
#[test]
fn test_string_literals_are_static_references() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let s = lit(&mut b, Literal::Str);
    let bytes = lit(&mut b, Literal::ByteStr(3));
    let root = block(&mut b, vec![Statement::Expr(s), Statement::Expr(bytes)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(s), Ty::static_str());
    assert_eq!(
        result.expr_type(bytes),
        Ty::Ref(
            Box::new(Ty::array(Ty::Int(IntTy::U8), Some(3))),
            Mutability::Not,
            Region::static_(),
        )
    );
    assert_eq!(std.show(&result.expr_type(s)), "&'static str");
}

/// `expr as T` has type `T` whatever the operand.
#[test]
fn test_cast_takes_target_type() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let byte = typed_int(&mut b, IntTy::U8);
    let cast = b.alloc_expr(Expr::Cast { expr: byte, ty: Ty::Int(IntTy::U64) });
    let root = block(&mut b, vec![Statement::Expr(cast)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(cast), Ty::Int(IntTy::U64));
    assert_eq!(result.expr_type(byte), Ty::Int(IntTy::U8));
}

// ── Body root ──────────────────────────────────────────────────────────

/// The tail of a function body is checked against the return type.
#[test]
fn test_tail_takes_return_type() {
    let (std, owner) = setup(Ty::Int(IntTy::U16));
    let mut b = BodyBuilder::new();
    let seven = int(&mut b);
    let root = block(&mut b, Vec::new(), Some(seven));

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(seven), Ty::Int(IntTy::U16));
    assert_eq!(result.expr_type(root), Ty::Int(IntTy::U16));
    assert!(result.diagnostics().is_empty());
}

/// A body without a tail produces unit, which must fit the return type.
#[test]
fn test_missing_tail_mismatches_return_type() {
    let (std, owner) = setup(Ty::Bool);
    let mut b = BodyBuilder::new();
    let root = block(&mut b, Vec::new(), None);

    let result = std.infer(owner, b, root);
    assert_eq!(
        result.diagnostics(),
        &[InferenceDiagnostic::TypeMismatch {
            site: ExprOrPatId::Expr(root),
            expected: Ty::Bool,
            actual: Ty::unit(),
        }]
    );
}

/// A body that ends in `return` needs no tail.
#[test]
fn test_diverging_body_needs_no_tail() {
    let (std, owner) = setup(Ty::Bool);
    let mut b = BodyBuilder::new();
    let value = bool_lit(&mut b, true);
    let ret = b.alloc_expr(Expr::Return(Some(value)));
    let root = block(&mut b, vec![Statement::Expr(ret)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(ret), Ty::Never);
    assert!(result.diagnostics().is_empty());
}

// ── Conditionals ───────────────────────────────────────────────────────

/// Branches of an `if` are joined; a suffixed branch pins the other.
#[test]
fn test_if_branches_join() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let cond = bool_lit(&mut b, true);
    let then_branch = typed_int(&mut b, IntTy::U8);
    let else_branch = int(&mut b);
    let if_expr = b.alloc_expr(Expr::If {
        condition: cond,
        then_branch,
        else_branch: Some(else_branch),
    });
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, None, if_expr)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.binding_type(x), Ty::Int(IntTy::U8));
    assert_eq!(result.expr_type(else_branch), Ty::Int(IntTy::U8));
}

/// An `if` without `else` is unit.
#[test]
fn test_if_without_else_is_unit() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let cond = bool_lit(&mut b, false);
    let then_branch = block(&mut b, Vec::new(), None);
    let if_expr = b.alloc_expr(Expr::If { condition: cond, then_branch, else_branch: None });
    let root = block(&mut b, vec![Statement::Expr(if_expr)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(if_expr), Ty::unit());
}

/// A diverging branch does not constrain the join.
#[test]
fn test_diverging_branch_gives_way() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let cond = bool_lit(&mut b, true);
    let ret = b.alloc_expr(Expr::Return(None));
    let then_branch = block(&mut b, vec![Statement::Expr(ret)], None);
    let else_branch = typed_int(&mut b, IntTy::U32);
    let if_expr = b.alloc_expr(Expr::If {
        condition: cond,
        then_branch,
        else_branch: Some(else_branch),
    });
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, None, if_expr)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(then_branch), Ty::Never);
    assert_eq!(result.binding_type(x), Ty::Int(IntTy::U32));
}

/// A `match` without arms has no type to offer.
#[test]
fn test_empty_match_is_unknown() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let scrutinee = bool_lit(&mut b, true);
    let match_expr = b.alloc_expr(Expr::Match { scrutinee, arms: Vec::new() });
    let root = block(&mut b, vec![Statement::Expr(match_expr)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(match_expr), Ty::Unknown);
}

/// Match arms are joined like `if` branches.
#[test]
fn test_match_arms_join() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let scrutinee = bool_lit(&mut b, true);
    let wild = b.alloc_pat(Pat::Wild);
    let first = int(&mut b);
    let other = b.alloc_pat(Pat::Wild);
    let second = typed_int(&mut b, IntTy::I64);
    let match_expr = b.alloc_expr(Expr::Match {
        scrutinee,
        arms: vec![
            MatchArm { pat: wild, guard: None, expr: first },
            MatchArm { pat: other, guard: None, expr: second },
        ],
    });
    let root = block(&mut b, vec![Statement::Expr(match_expr)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(match_expr), Ty::Int(IntTy::I64));
    assert_eq!(result.expr_type(first), Ty::Int(IntTy::I64));
}

// ── Loops ──────────────────────────────────────────────────────────────

/// A loop without `break` never produces a value.
#[test]
fn test_loop_without_break_diverges() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let body = block(&mut b, Vec::new(), None);
    let lp = loop_expr(&mut b, None, body);
    let root = block(&mut b, vec![Statement::Expr(lp)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(lp), Ty::Never);
}

/// `break value` gives the loop its type.
#[test]
fn test_loop_takes_break_value() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let value = typed_int(&mut b, IntTy::U8);
    let brk = break_expr(&mut b, None, Some(value));
    let body = block(&mut b, vec![Statement::Expr(brk)], None);
    let lp = loop_expr(&mut b, None, body);
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, None, lp)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(brk), Ty::Never);
    assert_eq!(result.binding_type(x), Ty::Int(IntTy::U8));
}

/// A labeled `break` skips the inner loop and types the outer one.
#[test]
fn test_labeled_break_targets_outer_loop() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let value = typed_int(&mut b, IntTy::U16);
    let brk = break_expr(&mut b, Some("outer"), Some(value));
    let inner_body = block(&mut b, vec![Statement::Expr(brk)], None);
    let inner = loop_expr(&mut b, None, inner_body);
    let outer_body = block(&mut b, vec![Statement::Expr(inner)], None);
    let outer = loop_expr(&mut b, Some("outer"), outer_body);
    let root = block(&mut b, vec![Statement::Expr(outer)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(inner), Ty::Never);
    assert_eq!(result.expr_type(outer), Ty::Int(IntTy::U16));
}

/// A labeled block joins its `break 'label value`s with its own value.
#[test]
fn test_labeled_block_break() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let cond = bool_lit(&mut b, true);
    let value = typed_int(&mut b, IntTy::U8);
    let brk = break_expr(&mut b, Some("found"), Some(value));
    let if_expr = b.alloc_expr(Expr::If { condition: cond, then_branch: brk, else_branch: None });
    let tail = int(&mut b);
    let labeled = b.alloc_expr(Expr::Block {
        kind: BlockKind::Plain,
        label: Some("found".to_string()),
        stmts: vec![Statement::Expr(if_expr)],
        tail: Some(tail),
    });
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, None, labeled)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.binding_type(x), Ty::Int(IntTy::U8));
    assert_eq!(result.expr_type(tail), Ty::Int(IntTy::U8));
}

/// `while` is unit and its condition must be `bool`.
#[test]
fn test_while_is_unit() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let cond = bool_lit(&mut b, true);
    let body = block(&mut b, Vec::new(), None);
    let wh = b.alloc_expr(Expr::While { label: None, condition: cond, body });
    let root = block(&mut b, vec![Statement::Expr(wh)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(wh), Ty::unit());
    assert!(result.diagnostics().is_empty());
}

// ── Arrays and tuples ──────────────────────────────────────────────────

/// Array elements are joined and the length is the element count.
#[test]
fn test_array_literal() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let first = typed_int(&mut b, IntTy::U8);
    let second = int(&mut b);
    let third = int(&mut b);
    let array = b.alloc_expr(Expr::Array(ArrayExpr::List(vec![first, second, third])));
    let root = block(&mut b, vec![Statement::Expr(array)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(array), Ty::array(Ty::Int(IntTy::U8), Some(3)));
    assert_eq!(result.expr_type(third), Ty::Int(IntTy::U8));
}

/// An empty array takes its element type from the annotation, or stays
/// unknown without one.
#[test]
fn test_empty_array() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let annotated = b.alloc_expr(Expr::Array(ArrayExpr::List(Vec::new())));
    let a = bind(&mut b, "a");
    let bare = b.alloc_expr(Expr::Array(ArrayExpr::List(Vec::new())));
    let e = bind(&mut b, "e");
    let root = block(
        &mut b,
        vec![
            let_stmt(a, Some(Ty::array(Ty::Int(IntTy::U16), Some(0))), annotated),
            let_stmt(e, None, bare),
        ],
        None,
    );

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(annotated), Ty::array(Ty::Int(IntTy::U16), Some(0)));
    assert_eq!(result.binding_type(e), Ty::array(Ty::Unknown, Some(0)));
}

/// `[x; n]` uses the evaluated length; `n` itself is a `usize`.
#[test]
fn test_repeat_array() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let init = typed_int(&mut b, IntTy::U8);
    let len = int(&mut b);
    let array = b.alloc_expr(Expr::Array(
        ArrayExpr::Repeat { initializer: init, len, len_value: Some(4) },
    ));
    let root = block(&mut b, vec![Statement::Expr(array)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(array), Ty::array(Ty::Int(IntTy::U8), Some(4)));
    assert_eq!(result.expr_type(len), Ty::Int(IntTy::Usize));
}

/// Tuple elements follow an expected tuple type.
#[test]
fn test_tuple_follows_annotation() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let first = int(&mut b);
    let second = lit(&mut b, Literal::Char);
    let tuple = b.alloc_expr(Expr::Tuple(vec![first, second]));
    let t = bind(&mut b, "t");
    let annotation = Ty::Tuple(vec![Ty::Int(IntTy::I8), Ty::Char]);
    let root = block(&mut b, vec![let_stmt(t, Some(annotation.clone()), tuple)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(first), Ty::Int(IntTy::I8));
    assert_eq!(result.binding_type(t), annotation);
}

// ── Macros ─────────────────────────────────────────────────────────────

/// `vec![..]` is a `Vec` of the joined element type.
#[test]
fn test_vec_macro() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let first = lit(&mut b, Literal::Bool(true));
    let second = lit(&mut b, Literal::Bool(false));
    let v = b.alloc_expr(Expr::Macro(MacroCall {
        name: "vec".to_string(),
        args: MacroArgs::Array(ArrayExpr::List(vec![first, second])),
    }));
    let root = block(&mut b, vec![Statement::Expr(v)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(v), std.vec_of(Ty::Bool));
    assert_eq!(std.show(&result.expr_type(v)), "Vec<bool>");
}

/// Formatting, printing and panicking macros have fixed types; unknown
/// macros are unknown but their arguments are still inferred.
#[test]
fn test_fixed_macro_types() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let format = macro_call(&mut b, "format", Vec::new());
    let print = macro_call(&mut b, "println", Vec::new());
    let arg = typed_int(&mut b, IntTy::U8);
    let custom = macro_call(&mut b, "my_macro", vec![arg]);
    let root = block(
        &mut b,
        vec![Statement::Expr(format), Statement::Expr(print), Statement::Expr(custom)],
        None,
    );

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(format), std.string_ty());
    assert_eq!(result.expr_type(print), Ty::unit());
    assert_eq!(result.expr_type(custom), Ty::Unknown);
    assert_eq!(result.expr_type(arg), Ty::Int(IntTy::U8));
}

/// `panic!()` diverges, so a body ending in it needs no tail.
#[test]
fn test_panic_macro_diverges() {
    let (std, owner) = setup(Ty::Bool);
    let mut b = BodyBuilder::new();
    let panic = macro_call(&mut b, "panic", Vec::new());
    let root = block(&mut b, vec![Statement::Expr(panic)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(panic), Ty::Never);
    assert!(result.diagnostics().is_empty());
}

// ── Totality ───────────────────────────────────────────────────────────

/// Every expression of the body gets a type, even unresolvable ones.
#[test]
fn test_every_expression_is_typed() {
    let (std, owner) = setup(Ty::unit());
    let mut b = BodyBuilder::new();
    let missing = b.alloc_expr(Expr::Missing);
    let unresolved = b.alloc_expr(Expr::Path(quarry_hir::body::Path::single("nowhere")));
    let callee_arg = int(&mut b);
    let call_expr = call(&mut b, unresolved, vec![callee_arg]);
    let field = b.alloc_expr(Expr::Field {
        receiver: missing,
        name: quarry_hir::body::FieldName::Named("f".into()),
    });
    let root = block(&mut b, vec![Statement::Expr(call_expr), Statement::Expr(field)], None);

    let result = std.infer(owner, b, root);
    for id in 0..=root.0 {
        assert!(result.is_expr_type_inferred(ExprId(id)), "expression {id} has no type");
    }
    assert_eq!(result.expr_type(unresolved), Ty::Unknown);
    assert_eq!(result.expr_type(call_expr), Ty::Unknown);
    assert_eq!(result.expr_type(field), Ty::Unknown);
    assert!(result.resolved_field(field).is_empty());
    assert!(result.diagnostics().is_empty());
}
