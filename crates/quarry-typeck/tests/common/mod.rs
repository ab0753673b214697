//! Shared fixture for the integration tests: a miniature standard library
//! and small helpers for assembling bodies by hand.

#![allow(dead_code)]

use quarry_hir::body::{
    BindingMode, BlockKind, BodyBuilder, BodyOwner, Expr, ExprId, Literal, Path, Pat, PatId,
    Statement,
};
use quarry_hir::item::{
    AdtData, AdtId, AdtKind, FieldData, FnOwner, FunctionData, FunctionId, Generics, ImplData,
    ImplId, ItemTree, TraitData, TraitId, TypeParamId, VariantData, VariantShape,
};
use quarry_hir::known::ArithOp;
use quarry_hir::ty::{IntTy, Mutability, Ty};
use quarry_hir::{KnownItems, PathResolution, ValueNs};
use quarry_typeck::{infer_body, InferenceResult, MemoryDatabase};

// ── Mini std ───────────────────────────────────────────────────────────

/// `Option`, `Result`, `Vec`, `Box`, `String`, `Range` and the traits the
/// engine knows about, with the impls the tests rely on.
pub struct MiniStd {
    pub items: ItemTree,
    pub known: KnownItems,
    pub option: AdtId,
    pub result: AdtId,
    pub vec: AdtId,
    pub boxed: AdtId,
    pub string: AdtId,
    pub range: AdtId,
    pub future: TraitId,
    pub into_iterator: TraitId,
    pub deref: TraitId,
    pub index: TraitId,
    pub try_trait: TraitId,
    pub fn_trait: TraitId,
    pub add: TraitId,
}

impl MiniStd {
    pub fn new() -> MiniStd {
        let mut items = ItemTree::new();

        let t = items.alloc_type_param("T");
        let option = enum_adt(
            &mut items,
            "Option",
            vec![t],
            vec![("Some", VariantShape::Tuple(vec![Ty::Param(t)])), ("None", VariantShape::Unit)],
        );
        let (t, e) = (items.alloc_type_param("T"), items.alloc_type_param("E"));
        let result = enum_adt(
            &mut items,
            "Result",
            vec![t, e],
            vec![
                ("Ok", VariantShape::Tuple(vec![Ty::Param(t)])),
                ("Err", VariantShape::Tuple(vec![Ty::Param(e)])),
            ],
        );
        let t = items.alloc_type_param("T");
        let vec = struct_adt(&mut items, "Vec", vec![t], VariantShape::Record(Vec::new()));
        let t = items.alloc_type_param("T");
        let boxed = struct_adt(&mut items, "Box", vec![t], VariantShape::Record(Vec::new()));
        let string = struct_adt(&mut items, "String", Vec::new(), VariantShape::Record(Vec::new()));
        let arguments = struct_adt(
            &mut items,
            "Arguments",
            Vec::new(),
            VariantShape::Record(Vec::new()),
        );
        let idx = items.alloc_type_param("Idx");
        let range = struct_adt(
            &mut items,
            "Range",
            vec![idx],
            VariantShape::Record(vec![
                FieldData { name: "start".into(), ty: Ty::Param(idx) },
                FieldData { name: "end".into(), ty: Ty::Param(idx) },
            ]),
        );

        let future = add_trait(&mut items, "Future", Vec::new(), &["Output"]);
        let into_iterator = add_trait(&mut items, "IntoIterator", Vec::new(), &["Item"]);
        let deref = add_trait(&mut items, "Deref", Vec::new(), &["Target"]);
        let idx = items.alloc_type_param("Idx");
        let index = add_trait(&mut items, "Index", vec![idx], &["Output"]);
        let try_trait = add_trait(&mut items, "Try", Vec::new(), &["Ok", "Error"]);
        let args = items.alloc_type_param("Args");
        let fn_trait = add_trait(&mut items, "Fn", vec![args], &["Output"]);
        let rhs = items.alloc_type_param("Rhs");
        let add = add_trait(&mut items, "Add", vec![rhs], &["Output"]);

        // impl<T> IntoIterator for Vec<T> { type Item = T; }
        let t = items.alloc_type_param("T");
        add_impl(
            &mut items,
            vec![t],
            into_iterator,
            Vec::new(),
            Ty::Adt(vec, vec![Ty::Param(t)]),
            vec![("Item", Ty::Param(t))],
        );
        // impl<T> Deref for Vec<T> { type Target = [T]; }
        let t = items.alloc_type_param("T");
        add_impl(
            &mut items,
            vec![t],
            deref,
            Vec::new(),
            Ty::Adt(vec, vec![Ty::Param(t)]),
            vec![("Target", Ty::slice(Ty::Param(t)))],
        );
        // impl Deref for String { type Target = str; }
        add_impl(
            &mut items,
            Vec::new(),
            deref,
            Vec::new(),
            Ty::Adt(string, Vec::new()),
            vec![("Target", Ty::Str)],
        );
        // impl<T> Index<usize> for Vec<T> { type Output = T; }
        let t = items.alloc_type_param("T");
        add_impl(
            &mut items,
            vec![t],
            index,
            vec![Ty::Int(IntTy::Usize)],
            Ty::Adt(vec, vec![Ty::Param(t)]),
            vec![("Output", Ty::Param(t))],
        );
        // impl<T, E> Try for Result<T, E> { type Ok = T; type Error = E; }
        let (t, e) = (items.alloc_type_param("T"), items.alloc_type_param("E"));
        add_impl(
            &mut items,
            vec![t, e],
            try_trait,
            Vec::new(),
            Ty::Adt(result, vec![Ty::Param(t), Ty::Param(e)]),
            vec![("Ok", Ty::Param(t)), ("Error", Ty::Param(e))],
        );

        let mut known = KnownItems::default();
        known.option = Some(option);
        known.result = Some(result);
        known.vec = Some(vec);
        known.boxed = Some(boxed);
        known.string = Some(string);
        known.arguments = Some(arguments);
        known.range = Some(range);
        known.future = Some(future);
        known.into_iterator = Some(into_iterator);
        known.deref = Some(deref);
        known.index = Some(index);
        known.try_trait = Some(try_trait);
        known.fn_traits = vec![fn_trait];
        known.set_arith_trait(ArithOp::Add, add);

        MiniStd {
            items,
            known,
            option,
            result,
            vec,
            boxed,
            string,
            range,
            future,
            into_iterator,
            deref,
            index,
            try_trait,
            fn_trait,
            add,
        }
    }

    // ── Declaring items ────────────────────────────────────────────────

    pub fn param(&mut self, name: &str) -> TypeParamId {
        self.items.alloc_type_param(name)
    }

    pub fn free_fn(
        &mut self,
        name: &str,
        generics: Generics,
        params: Vec<Ty>,
        ret: Ty,
    ) -> FunctionId {
        self.items.alloc_function(function(name, FnOwner::Free, generics, params, ret))
    }

    pub fn struct_adt(
        &mut self,
        name: &str,
        params: Vec<TypeParamId>,
        shape: VariantShape,
    ) -> AdtId {
        struct_adt(&mut self.items, name, params, shape)
    }

    pub fn add_trait(&mut self, name: &str, params: Vec<TypeParamId>, assoc: &[&str]) -> TraitId {
        add_trait(&mut self.items, name, params, assoc)
    }

    pub fn inherent_impl(&mut self, params: Vec<TypeParamId>, self_ty: Ty) -> ImplId {
        self.items.alloc_impl(ImplData {
            generics: Generics { params, bounds: Vec::new() },
            trait_ref: None,
            self_ty,
            methods: Vec::new(),
            assoc_types: Vec::new(),
        })
    }

    pub fn trait_impl(
        &mut self,
        trait_id: TraitId,
        args: Vec<Ty>,
        self_ty: Ty,
        assoc: Vec<(&str, Ty)>,
    ) -> ImplId {
        add_impl(&mut self.items, Vec::new(), trait_id, args, self_ty, assoc)
    }

    /// A method with a `&self` receiver.
    pub fn ref_method(
        &mut self,
        owner: FnOwner,
        name: &str,
        params: Vec<Ty>,
        ret: Ty,
    ) -> FunctionId {
        let mut data = function(name, owner, Generics::default(), params, ret);
        data.self_param = Some(quarry_hir::item::SelfParam::Ref(Mutability::Not));
        self.items.alloc_function(data)
    }

    pub fn fn_item(&mut self, data: FunctionData) -> FunctionId {
        self.items.alloc_function(data)
    }

    // ── Types ──────────────────────────────────────────────────────────

    pub fn option_of(&self, ty: Ty) -> Ty {
        Ty::Adt(self.option, vec![ty])
    }

    pub fn result_of(&self, ok: Ty, err: Ty) -> Ty {
        Ty::Adt(self.result, vec![ok, err])
    }

    pub fn vec_of(&self, ty: Ty) -> Ty {
        Ty::Adt(self.vec, vec![ty])
    }

    pub fn string_ty(&self) -> Ty {
        Ty::Adt(self.string, Vec::new())
    }

    /// Renders `ty` with declaration names.
    pub fn show(&self, ty: &Ty) -> String {
        ty.display(&self.items).to_string()
    }

    // ── Running inference ──────────────────────────────────────────────

    pub fn db(&self) -> MemoryDatabase {
        MemoryDatabase::new(self.items.clone(), self.known.clone())
    }

    /// Finishes `builder` as the body of `owner` and infers it.
    pub fn infer(&self, owner: BodyOwner, builder: BodyBuilder, root: ExprId) -> InferenceResult {
        let (body, names) = builder.finish(root);
        let mut db = self.db();
        db.add_body(owner, body, names);
        infer_body(&db, owner).expect("inference should complete")
    }
}

pub fn function(
    name: &str,
    owner: FnOwner,
    generics: Generics,
    params: Vec<Ty>,
    ret: Ty,
) -> FunctionData {
    FunctionData {
        name: name.to_string(),
        owner,
        generics,
        self_param: None,
        params,
        ret,
        is_async: false,
        has_body: true,
    }
}

fn enum_adt(
    items: &mut ItemTree,
    name: &str,
    params: Vec<TypeParamId>,
    variants: Vec<(&str, VariantShape)>,
) -> AdtId {
    let variants = variants
        .into_iter()
        .map(|(name, shape)| VariantData { name: name.to_string(), shape })
        .collect();
    items.alloc_adt(AdtData {
        name: name.to_string(),
        generics: Generics { params, bounds: Vec::new() },
        kind: AdtKind::Enum(variants),
        repr: None,
    })
}

fn struct_adt(
    items: &mut ItemTree,
    name: &str,
    params: Vec<TypeParamId>,
    shape: VariantShape,
) -> AdtId {
    items.alloc_adt(AdtData {
        name: name.to_string(),
        generics: Generics { params, bounds: Vec::new() },
        kind: AdtKind::Struct(shape),
        repr: None,
    })
}

fn add_trait(
    items: &mut ItemTree,
    name: &str,
    params: Vec<TypeParamId>,
    assoc: &[&str],
) -> TraitId {
    items.alloc_trait(TraitData {
        name: name.to_string(),
        generics: Generics { params, bounds: Vec::new() },
        assoc_types: assoc.iter().map(|name| name.to_string()).collect(),
        methods: Vec::new(),
    })
}

fn add_impl(
    items: &mut ItemTree,
    params: Vec<TypeParamId>,
    trait_id: TraitId,
    args: Vec<Ty>,
    self_ty: Ty,
    assoc: Vec<(&str, Ty)>,
) -> ImplId {
    items.alloc_impl(ImplData {
        generics: Generics { params, bounds: Vec::new() },
        trait_ref: Some((trait_id, args)),
        self_ty,
        methods: Vec::new(),
        assoc_types: assoc.into_iter().map(|(name, ty)| (name.to_string(), ty)).collect(),
    })
}

// ── Body helpers ───────────────────────────────────────────────────────

pub fn lit(b: &mut BodyBuilder, lit: Literal) -> ExprId {
    b.alloc_expr(Expr::Literal(lit))
}

/// An unsuffixed integer literal.
pub fn int(b: &mut BodyBuilder) -> ExprId {
    lit(b, Literal::Int(None))
}

pub fn typed_int(b: &mut BodyBuilder, ty: IntTy) -> ExprId {
    lit(b, Literal::Int(Some(ty)))
}

pub fn bool_lit(b: &mut BodyBuilder, value: bool) -> ExprId {
    lit(b, Literal::Bool(value))
}

/// `name` as a plain by-value binding.
pub fn bind(b: &mut BodyBuilder, name: &str) -> PatId {
    b.alloc_pat(Pat::Bind {
        name: name.to_string(),
        mode: BindingMode::ByValue(Mutability::Not),
        sub: None,
    })
}

/// A use of the binding `pat`.
pub fn local(b: &mut BodyBuilder, name: &str, pat: PatId) -> ExprId {
    b.alloc_path(Path::single(name), vec![PathResolution::new(ValueNs::Local(pat))])
}

/// A path with a single resolution.
pub fn path_to(b: &mut BodyBuilder, segments: &[&str], value: ValueNs) -> ExprId {
    b.alloc_path(Path::from_segments(segments.iter().copied()), vec![PathResolution::new(value)])
}

pub fn call(b: &mut BodyBuilder, callee: ExprId, args: Vec<ExprId>) -> ExprId {
    b.alloc_expr(Expr::Call { callee, args })
}

pub fn method_call(
    b: &mut BodyBuilder,
    receiver: ExprId,
    method: &str,
    args: Vec<ExprId>,
) -> ExprId {
    b.alloc_expr(Expr::MethodCall {
        receiver,
        method: method.to_string(),
        generic_args: Vec::new(),
        args,
    })
}

pub fn let_stmt(pat: PatId, ty: Option<Ty>, init: ExprId) -> Statement {
    Statement::Let { pat, ty, init: Some(init) }
}

pub fn block(b: &mut BodyBuilder, stmts: Vec<Statement>, tail: Option<ExprId>) -> ExprId {
    b.alloc_expr(Expr::Block { kind: BlockKind::Plain, label: None, stmts, tail })
}
