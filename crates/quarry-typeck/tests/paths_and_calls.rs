//! Integration tests for paths, constructors, struct literals and calls.
//!
//! Covers:
//! - enum constructors and unit variants against expectations
//! - generic functions, turbofish arguments and return-type expectations
//! - struct literals with generic fields
//! - constants with and without a declared type, including cycles
//! - trait function paths refined to the impl that applies

mod common;

use common::*;
use pretty_assertions::assert_eq;
use quarry_hir::body::{
    BodyBuilder, BodyOwner, Expr, Literal, Path, Statement, StructField, UnaryOp,
};
use quarry_hir::item::{
    ConstData, FieldData, FnOwner, FunctionId, Generics, SelfParam, TypeParamId, VariantRef,
    VariantShape,
};
use quarry_hir::ty::{IntTy, Mutability, Ty};
use quarry_hir::{PathResolution, Substitution, ValueNs};
use quarry_typeck::infer_body;

// ── Helpers ────────────────────────────────────────────────────────────

fn main_fn(std: &mut MiniStd, ret: Ty) -> BodyOwner {
    BodyOwner::Function(std.free_fn("main", Generics::default(), Vec::new(), ret))
}

/// `fn id<T>(x: T) -> T`
fn identity(std: &mut MiniStd) -> (FunctionId, TypeParamId) {
    let t = std.param("T");
    let generics = Generics { params: vec![t], bounds: Vec::new() };
    let id = std.free_fn("id", generics, vec![Ty::Param(t)], Ty::Param(t));
    (id, t)
}

// ── Constructors ───────────────────────────────────────────────────────

/// A tuple variant is a function from its fields to the enum.
#[test]
fn test_tuple_variant_call() {
    let mut std = MiniStd::new();
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let some = path_to(&mut b, &["Some"], ValueNs::Variant(std.option, 0));
    let arg = typed_int(&mut b, IntTy::U8);
    let value = call(&mut b, some, vec![arg]);
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, None, value)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.binding_type(x), std.option_of(Ty::Int(IntTy::U8)));
    assert_eq!(std.show(&result.expr_type(some)), "fn(u8) -> Option<u8>");
    assert_eq!(std.show(&result.binding_type(x)), "Option<u8>");
}

/// A unit variant takes its arguments from the annotation.
#[test]
fn test_unit_variant_follows_annotation() {
    let mut std = MiniStd::new();
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let none = path_to(&mut b, &["None"], ValueNs::Variant(std.option, 1));
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, Some(std.option_of(Ty::Bool)), none)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(none), std.option_of(Ty::Bool));
    assert_eq!(result.resolved_path(none), &[ValueNs::Variant(std.option, 1)]);
    assert!(result.diagnostics().is_empty());
}

/// Without anything to pin it, a variant's argument ends up unknown.
#[test]
fn test_unconstrained_variant_argument_is_unknown() {
    let mut std = MiniStd::new();
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let none = path_to(&mut b, &["None"], ValueNs::Variant(std.option, 1));
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, None, none)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.binding_type(x), std.option_of(Ty::Unknown));
    assert_eq!(std.show(&result.binding_type(x)), "Option<{unknown}>");
}

/// A path nothing resolved to is unknown, and so is calling it.
#[test]
fn test_unresolved_path_is_unknown() {
    let mut std = MiniStd::new();
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let missing = b.alloc_expr(Expr::Path(Path::single("missing")));
    let arg = bool_lit(&mut b, true);
    let value = call(&mut b, missing, vec![arg]);
    let root = block(&mut b, vec![Statement::Expr(value)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(missing), Ty::Unknown);
    assert!(result.resolved_path(missing).is_empty());
    assert_eq!(result.expr_type(value), Ty::Unknown);
    assert_eq!(result.expr_type(arg), Ty::Bool);
}

// ── Generic functions ──────────────────────────────────────────────────

/// Each call of a generic function gets its own instantiation.
#[test]
fn test_generic_function_instantiated_per_call() {
    let mut std = MiniStd::new();
    let (id, _) = identity(&mut std);
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let id1 = path_to(&mut b, &["id"], ValueNs::Function(id));
    let flag = bool_lit(&mut b, true);
    let first = call(&mut b, id1, vec![flag]);
    let id2 = path_to(&mut b, &["id"], ValueNs::Function(id));
    let ch = lit(&mut b, Literal::Char);
    let second = call(&mut b, id2, vec![ch]);
    let root = block(&mut b, vec![Statement::Expr(first), Statement::Expr(second)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(first), Ty::Bool);
    assert_eq!(result.expr_type(second), Ty::Char);
    assert_eq!(result.expr_type(id1), Ty::function(vec![Ty::Bool], Ty::Bool));
}

/// The expected result type reaches the arguments through the signature.
#[test]
fn test_expected_return_type_reaches_arguments() {
    let mut std = MiniStd::new();
    let (id, _) = identity(&mut std);
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let callee = path_to(&mut b, &["id"], ValueNs::Function(id));
    let arg = int(&mut b);
    let value = call(&mut b, callee, vec![arg]);
    let y = bind(&mut b, "y");
    let root = block(&mut b, vec![let_stmt(y, Some(Ty::Int(IntTy::U8)), value)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(arg), Ty::Int(IntTy::U8));
    assert_eq!(result.expr_type(value), Ty::Int(IntTy::U8));
}

/// Turbofish arguments pin the instantiation.
#[test]
fn test_turbofish_pins_generic_argument() {
    let mut std = MiniStd::new();
    let (id, t) = identity(&mut std);
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let explicit = Substitution::from_pairs([(t, Ty::Int(IntTy::U16))]);
    let callee = b.alloc_path(
        Path::single("id"),
        vec![PathResolution::with_subst(ValueNs::Function(id), explicit)],
    );
    let arg = int(&mut b);
    let value = call(&mut b, callee, vec![arg]);
    let root = block(&mut b, vec![Statement::Expr(value)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(arg), Ty::Int(IntTy::U16));
    assert_eq!(result.expr_type(value), Ty::Int(IntTy::U16));
}

/// A function named without calling it is a function value.
#[test]
fn test_function_value_is_callable() {
    let mut std = MiniStd::new();
    let double = std.free_fn(
        "double",
        Generics::default(),
        vec![Ty::Int(IntTy::U8)],
        Ty::Int(IntTy::U8),
    );
    let owner = main_fn(&mut std, Ty::Int(IntTy::U8));
    let mut b = BodyBuilder::new();
    let item = path_to(&mut b, &["double"], ValueNs::Function(double));
    let f = bind(&mut b, "f");
    let use_f = local(&mut b, "f", f);
    let arg = int(&mut b);
    let value = call(&mut b, use_f, vec![arg]);
    let root = block(&mut b, vec![let_stmt(f, None, item)], Some(value));

    let result = std.infer(owner, b, root);
    assert_eq!(result.binding_type(f), Ty::function(vec![Ty::Int(IntTy::U8)], Ty::Int(IntTy::U8)));
    assert_eq!(result.expr_type(arg), Ty::Int(IntTy::U8));
    assert!(result.diagnostics().is_empty());
}

/// Calling a value that is not a function is unknown, not an error.
#[test]
fn test_calling_a_non_function() {
    let mut std = MiniStd::new();
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let five = typed_int(&mut b, IntTy::U8);
    let n = bind(&mut b, "n");
    let use_n = local(&mut b, "n", n);
    let arg = typed_int(&mut b, IntTy::I8);
    let value = call(&mut b, use_n, vec![arg]);
    let root = block(&mut b, vec![let_stmt(n, None, five), Statement::Expr(value)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(value), Ty::Unknown);
    assert_eq!(result.expr_type(arg), Ty::Int(IntTy::I8));
    assert!(result.diagnostics().is_empty());
}

// ── Struct literals ────────────────────────────────────────────────────

/// Field values instantiate the struct's parameters.
#[test]
fn test_struct_literal_infers_parameters() {
    let mut std = MiniStd::new();
    let t = std.param("T");
    let point = std.struct_adt(
        "Point",
        vec![t],
        VariantShape::Record(vec![
            FieldData { name: "x".into(), ty: Ty::Param(t) },
            FieldData { name: "y".into(), ty: Ty::Param(t) },
        ]),
    );
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let x = typed_int(&mut b, IntTy::U8);
    let y = int(&mut b);
    let literal = b.alloc_expr(Expr::Struct {
        path: Path::single("Point"),
        fields: vec![
            StructField { name: "x".into(), expr: x },
            StructField { name: "y".into(), expr: y },
        ],
        spread: None,
    });
    b.record_variant(literal, VariantRef::Struct(point), Substitution::new());
    let root = block(&mut b, vec![Statement::Expr(literal)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(literal), Ty::Adt(point, vec![Ty::Int(IntTy::U8)]));
    assert_eq!(result.expr_type(y), Ty::Int(IntTy::U8));
    assert_eq!(std.show(&result.expr_type(literal)), "Point<u8>");
}

/// A field the struct does not declare is still inferred, as unknown.
#[test]
fn test_struct_literal_unknown_field() {
    let mut std = MiniStd::new();
    let unit_like = std.struct_adt("Empty", Vec::new(), VariantShape::Record(Vec::new()));
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let value = bool_lit(&mut b, true);
    let literal = b.alloc_expr(Expr::Struct {
        path: Path::single("Empty"),
        fields: vec![StructField { name: "nope".into(), expr: value }],
        spread: None,
    });
    b.record_variant(literal, VariantRef::Struct(unit_like), Substitution::new());
    let root = block(&mut b, vec![Statement::Expr(literal)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(literal), Ty::Adt(unit_like, Vec::new()));
    assert_eq!(result.expr_type(value), Ty::Bool);
    assert!(result.diagnostics().is_empty());
}

// ── Constants ──────────────────────────────────────────────────────────

/// A constant without a declared type takes the type of its body.
#[test]
fn test_untyped_constant_is_inferred_from_its_body() {
    let mut std = MiniStd::new();
    let konst = std.items.alloc_const(ConstData { name: "LIMIT".into(), ty: None });
    let owner = main_fn(&mut std, Ty::unit());

    let mut const_body = BodyBuilder::new();
    let const_root = typed_int(&mut const_body, IntTy::U64);
    let (const_body, const_names) = const_body.finish(const_root);

    let mut b = BodyBuilder::new();
    let limit = path_to(&mut b, &["LIMIT"], ValueNs::Const(konst));
    let x = bind(&mut b, "x");
    let root = block(&mut b, vec![let_stmt(x, None, limit)], None);
    let (body, names) = b.finish(root);

    let mut db = std.db();
    db.add_body(BodyOwner::Const(konst), const_body, const_names);
    db.add_body(owner, body, names);
    let result = infer_body(&db, owner).expect("inference should complete");
    assert_eq!(result.binding_type(x), Ty::Int(IntTy::U64));
}

/// Constants whose bodies name each other come out unknown.
#[test]
fn test_constant_cycle_is_unknown() {
    let mut std = MiniStd::new();
    let a = std.items.alloc_const(ConstData { name: "A".into(), ty: None });
    let c = std.items.alloc_const(ConstData { name: "B".into(), ty: None });

    let mut a_body = BodyBuilder::new();
    let a_root = path_to(&mut a_body, &["B"], ValueNs::Const(c));
    let (a_body, a_names) = a_body.finish(a_root);
    let mut c_body = BodyBuilder::new();
    let c_root = path_to(&mut c_body, &["A"], ValueNs::Const(a));
    let (c_body, c_names) = c_body.finish(c_root);

    let mut db = std.db();
    db.add_body(BodyOwner::Const(a), a_body, a_names);
    db.add_body(BodyOwner::Const(c), c_body, c_names);
    let result = infer_body(&db, BodyOwner::Const(a)).expect("inference should complete");
    assert_eq!(result.expr_type(a_root), Ty::Unknown);
}

/// A declared constant type is used without looking at the body.
#[test]
fn test_typed_constant_uses_declaration() {
    let mut std = MiniStd::new();
    let konst = std.items.alloc_const(ConstData {
        name: "MAX".into(),
        ty: Some(Ty::Int(IntTy::I16)),
    });
    let owner = main_fn(&mut std, Ty::unit());
    let mut b = BodyBuilder::new();
    let max = path_to(&mut b, &["MAX"], ValueNs::Const(konst));
    let root = block(&mut b, vec![Statement::Expr(max)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(max), Ty::Int(IntTy::I16));
}

// ── Trait function paths ───────────────────────────────────────────────

/// `Trait::f()` is refined to the impl's function once `Self` is known.
#[test]
fn test_trait_function_path_is_refined() {
    let mut std = MiniStd::new();
    let make = std.add_trait("Make", Vec::new(), &[]);
    let decl = std.fn_item(function(
        "make",
        FnOwner::Trait(make),
        Generics::default(),
        Vec::new(),
        Ty::Param(TypeParamId::SELF),
    ));
    let imp = std.trait_impl(make, Vec::new(), Ty::Int(IntTy::U8), Vec::new());
    let concrete = std.fn_item(function(
        "make",
        FnOwner::Impl(imp),
        Generics::default(),
        Vec::new(),
        Ty::Int(IntTy::U8),
    ));
    let owner = main_fn(&mut std, Ty::unit());

    let mut b = BodyBuilder::new();
    let callee = path_to(&mut b, &["Make", "make"], ValueNs::Function(decl));
    let value = call(&mut b, callee, Vec::new());
    let m = bind(&mut b, "m");
    let root = block(&mut b, vec![let_stmt(m, Some(Ty::Int(IntTy::U8)), value)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(value), Ty::Int(IntTy::U8));
    assert_eq!(result.resolved_path(callee), &[ValueNs::Function(concrete)]);
}

/// A qualified path with one candidate per impl collapses to the trait
/// function and is refined by the argument's type.
#[test]
fn test_ambiguous_qualified_path_collapses() {
    let mut std = MiniStd::new();
    let describe = std.add_trait("Describe", Vec::new(), &[]);
    let mut decl = function(
        "describe",
        FnOwner::Trait(describe),
        Generics::default(),
        Vec::new(),
        Ty::Bool,
    );
    decl.self_param = Some(SelfParam::Ref(Mutability::Not));
    std.fn_item(decl);
    let on_i32 = std.trait_impl(describe, Vec::new(), Ty::Int(IntTy::I32), Vec::new());
    let for_i32 = std.ref_method(FnOwner::Impl(on_i32), "describe", Vec::new(), Ty::Bool);
    let on_i64 = std.trait_impl(describe, Vec::new(), Ty::Int(IntTy::I64), Vec::new());
    let for_i64 = std.ref_method(FnOwner::Impl(on_i64), "describe", Vec::new(), Ty::Bool);
    let owner = main_fn(&mut std, Ty::unit());

    let mut b = BodyBuilder::new();
    let callee = b.alloc_path(
        Path::from_segments(["Describe", "describe"]),
        vec![
            PathResolution::new(ValueNs::Function(for_i32)),
            PathResolution::new(ValueNs::Function(for_i64)),
        ],
    );
    let five = typed_int(&mut b, IntTy::I64);
    let arg = b.alloc_expr(Expr::Unary { op: UnaryOp::Ref(Mutability::Not), expr: five });
    let value = call(&mut b, callee, vec![arg]);
    let root = block(&mut b, vec![Statement::Expr(value)], None);

    let result = std.infer(owner, b, root);
    assert_eq!(result.expr_type(value), Ty::Bool);
    assert_eq!(result.resolved_path(callee), &[ValueNs::Function(for_i64)]);
    assert_eq!(
        result.expr_type(callee),
        Ty::function(vec![Ty::reference(Ty::Int(IntTy::I64), Mutability::Not)], Ty::Bool)
    );
}
