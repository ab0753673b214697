//! Type representation shared by item declarations and the inference engine.
//!
//! `Ty` is an immutable value tree. Equality is structural, except that
//! inference variables compare by identity (their table index) and regions
//! never participate in equality at all.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::fold::{TypeFoldable, TypeFolder, TypeVisitor};
use crate::item::{AdtId, ItemTree, TraitId, TypeParamId};

// ── Primitive kinds ────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IntTy {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
}

impl IntTy {
    /// Width used when an unconstrained integer literal is defaulted.
    pub const DEFAULT: IntTy = IntTy::I32;

    pub fn name(self) -> &'static str {
        match self {
            IntTy::I8 => "i8",
            IntTy::I16 => "i16",
            IntTy::I32 => "i32",
            IntTy::I64 => "i64",
            IntTy::I128 => "i128",
            IntTy::Isize => "isize",
            IntTy::U8 => "u8",
            IntTy::U16 => "u16",
            IntTy::U32 => "u32",
            IntTy::U64 => "u64",
            IntTy::U128 => "u128",
            IntTy::Usize => "usize",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FloatTy {
    F32,
    F64,
}

impl FloatTy {
    /// Width used when an unconstrained float literal is defaulted.
    pub const DEFAULT: FloatTy = FloatTy::F64;

    pub fn name(self) -> &'static str {
        match self {
            FloatTy::F32 => "f32",
            FloatTy::F64 => "f64",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Mutability {
    Not,
    Mut,
}

impl Mutability {
    pub fn is_mut(self) -> bool {
        self == Mutability::Mut
    }

    fn prefix(self) -> &'static str {
        match self {
            Mutability::Not => "",
            Mutability::Mut => "mut ",
        }
    }
}

/// A lifetime tag carried by reference types.
///
/// Lifetimes are tracked nominally for display only. The name is
/// intentionally excluded from `PartialEq` and `Hash`: two references that
/// differ only by region are the same type as far as inference goes.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Region(pub Option<String>);

impl Region {
    pub fn erased() -> Region {
        Region(None)
    }

    pub fn static_() -> Region {
        Region(Some("static".to_string()))
    }
}

impl PartialEq for Region {
    fn eq(&self, _other: &Self) -> bool {
        true // names intentionally excluded
    }
}

impl Eq for Region {}

impl std::hash::Hash for Region {
    fn hash<H: std::hash::Hasher>(&self, _state: &mut H) {}
}

// ── Inference variables ────────────────────────────────────────────────

/// A general type variable, identified by its index in the type table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TyVid(pub u32);

/// An integer-literal variable; resolves only to an integer type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IntVid(pub u32);

/// A float-literal variable; resolves only to a float type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FloatVid(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum InferTy {
    TyVar(TyVid),
    IntVar(IntVid),
    FloatVar(FloatVid),
}

// ── Trait references ───────────────────────────────────────────────────

/// `Self: Trait<Args>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TraitRef {
    pub self_ty: Ty,
    pub trait_id: TraitId,
    pub args: Vec<Ty>,
}

impl TraitRef {
    pub fn new(self_ty: Ty, trait_id: TraitId, args: Vec<Ty>) -> TraitRef {
        TraitRef { self_ty, trait_id, args }
    }
}

/// A trait bound without its self type, optionally binding associated
/// types: `Iterator<Item = u8>`, `Fn(i32) -> bool`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BoundTrait {
    pub trait_id: TraitId,
    pub args: Vec<Ty>,
    pub assoc: Vec<(String, Ty)>,
}

impl BoundTrait {
    pub fn new(trait_id: TraitId, args: Vec<Ty>) -> BoundTrait {
        BoundTrait { trait_id, args, assoc: Vec::new() }
    }

    pub fn with_assoc(mut self, name: impl Into<String>, ty: Ty) -> BoundTrait {
        self.assoc.push((name.into(), ty));
        self
    }

    pub fn assoc_ty(&self, name: &str) -> Option<&Ty> {
        self.assoc.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }

    pub fn with_self_ty(&self, self_ty: Ty) -> TraitRef {
        TraitRef::new(self_ty, self.trait_id, self.args.clone())
    }
}

/// `<SelfTy as Trait<Args>>::Name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ProjectionTy {
    pub trait_ref: TraitRef,
    pub name: String,
}

impl ProjectionTy {
    pub fn new(trait_ref: TraitRef, name: impl Into<String>) -> ProjectionTy {
        ProjectionTy { trait_ref, name: name.into() }
    }

    pub fn self_ty(&self) -> &Ty {
        &self.trait_ref.self_ty
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FnSig {
    pub params: Vec<Ty>,
    pub ret: Box<Ty>,
}

impl FnSig {
    pub fn new(params: Vec<Ty>, ret: Ty) -> FnSig {
        FnSig { params, ret: Box::new(ret) }
    }

    /// A signature whose every component is unknown.
    pub fn unknown(arity: usize) -> FnSig {
        FnSig::new(vec![Ty::Unknown; arity], Ty::Unknown)
    }
}

/// An existential type known only through its bounds: `impl Future<Output = T>`.
///
/// `def` identifies a declared opaque type; anonymous ones (async blocks,
/// generators) carry `None` and only unify with themselves.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct OpaqueTy {
    pub def: Option<u32>,
    pub bounds: Vec<BoundTrait>,
}

// ── Ty ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Ty {
    Bool,
    Char,
    Str,
    Int(IntTy),
    Float(FloatTy),
    Ref(Box<Ty>, Mutability, Region),
    Ptr(Box<Ty>, Mutability),
    /// Element type and, when known, the compile-time length.
    Array(Box<Ty>, Option<u64>),
    Slice(Box<Ty>),
    Tuple(Vec<Ty>),
    Fn(FnSig),
    Adt(AdtId, Vec<Ty>),
    Dyn(BoundTrait),
    Opaque(OpaqueTy),
    Param(TypeParamId),
    Projection(Box<ProjectionTy>),
    Infer(InferTy),
    /// Placeholder for anything that could not be determined.
    Unknown,
    /// The type of diverging expressions.
    Never,
}

impl Ty {
    pub fn unit() -> Ty {
        Ty::Tuple(Vec::new())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Ty::Tuple(tys) if tys.is_empty())
    }

    pub fn reference(pointee: Ty, mutability: Mutability) -> Ty {
        Ty::Ref(Box::new(pointee), mutability, Region::erased())
    }

    pub fn static_str() -> Ty {
        Ty::Ref(Box::new(Ty::Str), Mutability::Not, Region::static_())
    }

    pub fn slice(elem: Ty) -> Ty {
        Ty::Slice(Box::new(elem))
    }

    pub fn array(elem: Ty, len: Option<u64>) -> Ty {
        Ty::Array(Box::new(elem), len)
    }

    pub fn function(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fn(FnSig::new(params, ret))
    }

    pub fn projection(trait_ref: TraitRef, name: impl Into<String>) -> Ty {
        Ty::Projection(Box::new(ProjectionTy::new(trait_ref, name)))
    }

    pub fn ty_var(vid: TyVid) -> Ty {
        Ty::Infer(InferTy::TyVar(vid))
    }

    pub fn int_var(vid: IntVid) -> Ty {
        Ty::Infer(InferTy::IntVar(vid))
    }

    pub fn float_var(vid: FloatVid) -> Ty {
        Ty::Infer(InferTy::FloatVar(vid))
    }

    pub fn as_ty_var(&self) -> Option<TyVid> {
        match self {
            Ty::Infer(InferTy::TyVar(vid)) => Some(*vid),
            _ => None,
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Ty::Int(_) | Ty::Infer(InferTy::IntVar(_)))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Ty::Float(_) | Ty::Infer(InferTy::FloatVar(_)))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_float()
    }

    pub fn is_scalar(&self) -> bool {
        self.is_numeric() || matches!(self, Ty::Bool | Ty::Char | Ty::Ptr(..))
    }

    /// Whether any inference variable occurs anywhere in this type.
    pub fn has_infer(&self) -> bool {
        self.any(&mut |ty| matches!(ty, Ty::Infer(_)))
    }

    /// Whether `pred` holds for this type or any type nested in it.
    pub fn any(&self, pred: &mut dyn FnMut(&Ty) -> bool) -> bool {
        struct Any<'p>(&'p mut dyn FnMut(&Ty) -> bool);
        impl TypeVisitor for Any<'_> {
            fn visit_ty(&mut self, ty: &Ty) -> bool {
                (self.0)(ty) || ty.super_visit_with(self)
            }
        }
        self.visit_with(&mut Any(pred))
    }

    /// Rebuild this type with every direct child passed through `folder`.
    pub fn super_fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Ty {
        match self {
            Ty::Ref(pointee, m, region) => Ty::Ref(Box::new(folder.fold_ty(*pointee)), m, region),
            Ty::Ptr(pointee, m) => Ty::Ptr(Box::new(folder.fold_ty(*pointee)), m),
            Ty::Array(elem, len) => Ty::Array(Box::new(folder.fold_ty(*elem)), len),
            Ty::Slice(elem) => Ty::Slice(Box::new(folder.fold_ty(*elem))),
            Ty::Tuple(tys) => Ty::Tuple(tys.fold_with(folder)),
            Ty::Fn(sig) => Ty::Fn(sig.fold_with(folder)),
            Ty::Adt(id, args) => Ty::Adt(id, args.fold_with(folder)),
            Ty::Dyn(bound) => Ty::Dyn(bound.fold_with(folder)),
            Ty::Opaque(OpaqueTy { def, bounds }) => {
                Ty::Opaque(OpaqueTy { def, bounds: bounds.fold_with(folder) })
            }
            Ty::Projection(proj) => Ty::Projection(Box::new(proj.fold_with(folder))),
            leaf => leaf,
        }
    }

    /// Visit every direct child; returns `true` as soon as the visitor breaks.
    pub fn super_visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        match self {
            Ty::Ref(pointee, ..)
            | Ty::Ptr(pointee, _)
            | Ty::Array(pointee, _)
            | Ty::Slice(pointee) => visitor.visit_ty(pointee),
            Ty::Tuple(tys) | Ty::Adt(_, tys) => tys.visit_with(visitor),
            Ty::Fn(sig) => sig.visit_with(visitor),
            Ty::Dyn(bound) => bound.visit_with(visitor),
            Ty::Opaque(opaque) => opaque.bounds.visit_with(visitor),
            Ty::Projection(proj) => proj.visit_with(visitor),
            _ => false,
        }
    }

    /// Render with declaration names looked up in `items`.
    pub fn display<'a>(&'a self, items: &'a ItemTree) -> TyDisplay<'a> {
        TyDisplay { ty: self, items: Some(items) }
    }
}

// ── Substitution ───────────────────────────────────────────────────────

/// Maps generic parameters to types. Lookups are total: a parameter without
/// an entry maps to itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Substitution(FxHashMap<TypeParamId, Ty>);

impl Substitution {
    pub fn new() -> Substitution {
        Substitution::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (TypeParamId, Ty)>) -> Substitution {
        Substitution(pairs.into_iter().collect())
    }

    pub fn insert(&mut self, param: TypeParamId, ty: Ty) {
        self.0.insert(param, ty);
    }

    pub fn get(&self, param: TypeParamId) -> Option<&Ty> {
        self.0.get(&param)
    }

    /// The value for `param`, or the parameter itself.
    pub fn lookup(&self, param: TypeParamId) -> Ty {
        self.0.get(&param).cloned().unwrap_or(Ty::Param(param))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeParamId, &Ty)> + '_ {
        self.0.iter().map(|(param, ty)| (*param, ty))
    }

    /// `self` extended by `other`; entries of `other` win.
    pub fn union(mut self, other: &Substitution) -> Substitution {
        for (param, ty) in other.iter() {
            self.0.insert(param, ty.clone());
        }
        self
    }

    pub fn apply<T: TypeFoldable>(&self, value: T) -> T {
        if self.0.is_empty() {
            return value;
        }
        struct Subst<'s>(&'s Substitution);
        impl TypeFolder for Subst<'_> {
            fn fold_ty(&mut self, ty: Ty) -> Ty {
                match ty {
                    Ty::Param(param) => self.0.lookup(param),
                    other => other.super_fold_with(self),
                }
            }
        }
        value.fold_with(&mut Subst(self))
    }
}

// ── Display ────────────────────────────────────────────────────────────

pub struct TyDisplay<'a> {
    ty: &'a Ty,
    items: Option<&'a ItemTree>,
}

impl TyDisplay<'_> {
    fn nested<'b>(&'b self, ty: &'b Ty) -> TyDisplay<'b> {
        TyDisplay { ty, items: self.items }
    }

    fn write_list(&self, f: &mut fmt::Formatter<'_>, tys: &[Ty]) -> fmt::Result {
        for (i, ty) in tys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.nested(ty))?;
        }
        Ok(())
    }

    fn write_bound(&self, f: &mut fmt::Formatter<'_>, bound: &BoundTrait) -> fmt::Result {
        match self.items {
            Some(items) => write!(f, "{}", items[bound.trait_id].name)?,
            None => write!(f, "trait#{}", bound.trait_id.0)?,
        }
        if bound.args.is_empty() && bound.assoc.is_empty() {
            return Ok(());
        }
        write!(f, "<")?;
        self.write_list(f, &bound.args)?;
        for (i, (name, ty)) in bound.assoc.iter().enumerate() {
            if i > 0 || !bound.args.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", name, self.nested(ty))?;
        }
        write!(f, ">")
    }
}

impl fmt::Display for TyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            Ty::Bool => write!(f, "bool"),
            Ty::Char => write!(f, "char"),
            Ty::Str => write!(f, "str"),
            Ty::Int(int) => write!(f, "{}", int.name()),
            Ty::Float(float) => write!(f, "{}", float.name()),
            Ty::Ref(pointee, m, region) => {
                write!(f, "&")?;
                if let Some(name) = &region.0 {
                    write!(f, "'{} ", name)?;
                }
                write!(f, "{}{}", m.prefix(), self.nested(pointee))
            }
            Ty::Ptr(pointee, m) => {
                let kind = if m.is_mut() { "mut" } else { "const" };
                write!(f, "*{} {}", kind, self.nested(pointee))
            }
            Ty::Array(elem, Some(len)) => write!(f, "[{}; {}]", self.nested(elem), len),
            Ty::Array(elem, None) => write!(f, "[{}; _]", self.nested(elem)),
            Ty::Slice(elem) => write!(f, "[{}]", self.nested(elem)),
            Ty::Tuple(tys) => {
                write!(f, "(")?;
                self.write_list(f, tys)?;
                if tys.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Ty::Fn(sig) => {
                write!(f, "fn(")?;
                self.write_list(f, &sig.params)?;
                write!(f, ")")?;
                if !sig.ret.is_unit() {
                    write!(f, " -> {}", self.nested(&sig.ret))?;
                }
                Ok(())
            }
            Ty::Adt(id, args) => {
                match self.items {
                    Some(items) => write!(f, "{}", items[*id].name)?,
                    None => write!(f, "adt#{}", id.0)?,
                }
                if !args.is_empty() {
                    write!(f, "<")?;
                    self.write_list(f, args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            Ty::Dyn(bound) => {
                write!(f, "dyn ")?;
                self.write_bound(f, bound)
            }
            Ty::Opaque(opaque) => {
                write!(f, "impl ")?;
                for (i, bound) in opaque.bounds.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    self.write_bound(f, bound)?;
                }
                Ok(())
            }
            Ty::Param(param) => match self.items {
                Some(items) => write!(f, "{}", items.type_param_name(*param)),
                None => write!(f, "T#{}", param.0),
            },
            Ty::Projection(proj) => {
                write!(f, "<{} as ", self.nested(&proj.trait_ref.self_ty))?;
                let bound = BoundTrait::new(proj.trait_ref.trait_id, proj.trait_ref.args.clone());
                self.write_bound(f, &bound)?;
                write!(f, ">::{}", proj.name)
            }
            Ty::Infer(InferTy::TyVar(vid)) => write!(f, "?{}", vid.0),
            Ty::Infer(InferTy::IntVar(vid)) => write!(f, "?int{}", vid.0),
            Ty::Infer(InferTy::FloatVar(vid)) => write!(f, "?float{}", vid.0),
            Ty::Unknown => write!(f, "{{unknown}}"),
            Ty::Never => write!(f, "!"),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TyDisplay { ty: self, items: None }.fmt(f)
    }
}
