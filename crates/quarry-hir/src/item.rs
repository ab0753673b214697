//! Item declarations: ADTs, functions, traits, impls and constants.
//!
//! The `ItemTree` is the read-only registry of everything that can be named
//! from a body. It is built once by the front end and shared between all
//! inference runs. Trait impls are indexed by trait for selection.

use std::ops::Index;

use rustc_hash::FxHashMap;

use crate::ty::{BoundTrait, IntTy, Mutability, TraitRef, Ty};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct AdtId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct FunctionId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct TraitId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ImplId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ConstId(pub u32);

/// A generic type parameter. Index 0 is reserved for `Self`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct TypeParamId(pub u32);

impl TypeParamId {
    pub const SELF: TypeParamId = TypeParamId(0);
}

/// A struct, or one variant of an enum.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum VariantRef {
    Struct(AdtId),
    EnumVariant(AdtId, u32),
}

impl VariantRef {
    pub fn adt(self) -> AdtId {
        match self {
            VariantRef::Struct(adt) | VariantRef::EnumVariant(adt, _) => adt,
        }
    }
}

// ── Generics ───────────────────────────────────────────────────────────

/// `Self: Trait<Args, Assoc = Ty>` as written in a where clause or a
/// parameter bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WherePredicate {
    pub self_ty: Ty,
    pub bound: BoundTrait,
}

impl WherePredicate {
    pub fn trait_ref(&self) -> TraitRef {
        self.bound.with_self_ty(self.self_ty.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Generics {
    pub params: Vec<TypeParamId>,
    pub bounds: Vec<WherePredicate>,
}

impl Generics {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.bounds.is_empty()
    }

    /// The parameters as types, in declaration order.
    pub fn param_tys(&self) -> Vec<Ty> {
        self.params.iter().map(|p| Ty::Param(*p)).collect()
    }
}

// ── ADTs ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldData {
    pub name: String,
    pub ty: Ty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariantShape {
    Unit,
    Tuple(Vec<Ty>),
    Record(Vec<FieldData>),
}

impl VariantShape {
    pub fn field(&self, name: &str) -> Option<(usize, &Ty)> {
        match self {
            VariantShape::Record(fields) => {
                fields.iter().enumerate().find(|(_, f)| f.name == name).map(|(i, f)| (i, &f.ty))
            }
            _ => None,
        }
    }

    pub fn tuple_field(&self, index: usize) -> Option<&Ty> {
        match self {
            VariantShape::Tuple(tys) => tys.get(index),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantData {
    pub name: String,
    pub shape: VariantShape,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdtKind {
    Struct(VariantShape),
    Enum(Vec<VariantData>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdtData {
    pub name: String,
    pub generics: Generics,
    pub kind: AdtKind,
    /// `#[repr(u8)]` and friends; only meaningful for enums.
    pub repr: Option<IntTy>,
}

impl AdtData {
    pub fn shape(&self, variant: VariantRef) -> Option<&VariantShape> {
        match (&self.kind, variant) {
            (AdtKind::Struct(shape), VariantRef::Struct(_)) => Some(shape),
            (AdtKind::Enum(variants), VariantRef::EnumVariant(_, idx)) => {
                variants.get(idx as usize).map(|v| &v.shape)
            }
            _ => None,
        }
    }
}

// ── Functions ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelfParam {
    /// `self`
    Value,
    /// `&self` / `&mut self`
    Ref(Mutability),
    /// `self: Box<Self>` and similar; `Self` appears as `TypeParamId::SELF`.
    Explicit(Ty),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FnOwner {
    Free,
    Impl(ImplId),
    Trait(TraitId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionData {
    pub name: String,
    pub owner: FnOwner,
    pub generics: Generics,
    pub self_param: Option<SelfParam>,
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub is_async: bool,
    /// Trait methods with a default body are inherited by impls.
    pub has_body: bool,
}

// ── Traits, impls, constants ───────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraitData {
    pub name: String,
    pub generics: Generics,
    pub assoc_types: Vec<String>,
    pub methods: Vec<FunctionId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImplData {
    pub generics: Generics,
    /// `None` for inherent impls.
    pub trait_ref: Option<(TraitId, Vec<Ty>)>,
    pub self_ty: Ty,
    pub methods: Vec<FunctionId>,
    pub assoc_types: Vec<(String, Ty)>,
}

impl ImplData {
    pub fn trait_id(&self) -> Option<TraitId> {
        self.trait_ref.as_ref().map(|(id, _)| *id)
    }

    pub fn assoc_ty(&self, name: &str) -> Option<&Ty> {
        self.assoc_types.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstData {
    pub name: String,
    /// `None` when the declaration omits its type (mid-edit code).
    pub ty: Option<Ty>,
}

// ── ItemTree ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ItemTree {
    adts: Vec<AdtData>,
    functions: Vec<FunctionData>,
    traits: Vec<TraitData>,
    impls: Vec<ImplData>,
    consts: Vec<ConstData>,
    type_params: Vec<String>,
    impls_by_trait: FxHashMap<TraitId, Vec<ImplId>>,
    inherent_impls: Vec<ImplId>,
}

impl Default for ItemTree {
    fn default() -> Self {
        ItemTree::new()
    }
}

impl ItemTree {
    pub fn new() -> Self {
        ItemTree {
            adts: Vec::new(),
            functions: Vec::new(),
            traits: Vec::new(),
            impls: Vec::new(),
            consts: Vec::new(),
            type_params: vec!["Self".to_string()],
            impls_by_trait: FxHashMap::default(),
            inherent_impls: Vec::new(),
        }
    }

    // ── Allocation ─────────────────────────────────────────────────────

    pub fn alloc_type_param(&mut self, name: impl Into<String>) -> TypeParamId {
        self.type_params.push(name.into());
        TypeParamId(self.type_params.len() as u32 - 1)
    }

    pub fn alloc_adt(&mut self, data: AdtData) -> AdtId {
        self.adts.push(data);
        AdtId(self.adts.len() as u32 - 1)
    }

    pub fn alloc_function(&mut self, data: FunctionData) -> FunctionId {
        let owner = data.owner;
        self.functions.push(data);
        let id = FunctionId(self.functions.len() as u32 - 1);
        match owner {
            FnOwner::Impl(imp) => self.impls[imp.0 as usize].methods.push(id),
            FnOwner::Trait(tr) => self.traits[tr.0 as usize].methods.push(id),
            FnOwner::Free => {}
        }
        id
    }

    pub fn alloc_trait(&mut self, data: TraitData) -> TraitId {
        self.traits.push(data);
        TraitId(self.traits.len() as u32 - 1)
    }

    pub fn alloc_impl(&mut self, data: ImplData) -> ImplId {
        let trait_id = data.trait_id();
        self.impls.push(data);
        let id = ImplId(self.impls.len() as u32 - 1);
        match trait_id {
            Some(trait_id) => self.impls_by_trait.entry(trait_id).or_default().push(id),
            None => self.inherent_impls.push(id),
        }
        id
    }

    pub fn alloc_const(&mut self, data: ConstData) -> ConstId {
        self.consts.push(data);
        ConstId(self.consts.len() as u32 - 1)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn type_param_name(&self, param: TypeParamId) -> &str {
        self.type_params.get(param.0 as usize).map(String::as_str).unwrap_or("?")
    }

    pub fn impls_of_trait(&self, trait_id: TraitId) -> &[ImplId] {
        self.impls_by_trait.get(&trait_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn trait_ids(&self) -> impl Iterator<Item = TraitId> {
        (0..self.traits.len() as u32).map(TraitId)
    }

    pub fn inherent_impls(&self) -> &[ImplId] {
        &self.inherent_impls
    }

    pub fn trait_impls(&self) -> impl Iterator<Item = ImplId> + '_ {
        (0..self.impls.len() as u32).map(ImplId).filter(move |imp| self[*imp].trait_ref.is_some())
    }

    /// The method named `name` declared directly in `trait_id`.
    pub fn trait_method(&self, trait_id: TraitId, name: &str) -> Option<FunctionId> {
        self[trait_id].methods.iter().copied().find(|f| self[*f].name == name)
    }

    /// The method named `name` in `impl_id`, falling back to the default
    /// body inherited from the implemented trait.
    pub fn impl_method(&self, impl_id: ImplId, name: &str) -> Option<FunctionId> {
        let imp = &self[impl_id];
        imp.methods.iter().copied().find(|f| self[*f].name == name).or_else(|| {
            let trait_id = imp.trait_id()?;
            self.trait_method(trait_id, name).filter(|f| self[*f].has_body)
        })
    }

    /// The type `Self` denotes inside items owned by `owner`.
    pub fn owner_self_ty(&self, owner: FnOwner) -> Option<Ty> {
        match owner {
            FnOwner::Free => None,
            FnOwner::Impl(imp) => Some(self[imp].self_ty.clone()),
            FnOwner::Trait(_) => Some(Ty::Param(TypeParamId::SELF)),
        }
    }

    /// The trait an associated function belongs to, directly or through
    /// the impl that contains it.
    pub fn fn_trait(&self, func: FunctionId) -> Option<TraitId> {
        match self[func].owner {
            FnOwner::Free => None,
            FnOwner::Impl(imp) => self[imp].trait_id(),
            FnOwner::Trait(tr) => Some(tr),
        }
    }

    /// The declared type of an ADT with its own parameters left open.
    pub fn adt_ty(&self, adt: AdtId) -> Ty {
        Ty::Adt(adt, self[adt].generics.param_tys())
    }
}

impl Index<AdtId> for ItemTree {
    type Output = AdtData;
    fn index(&self, id: AdtId) -> &AdtData {
        &self.adts[id.0 as usize]
    }
}

impl Index<FunctionId> for ItemTree {
    type Output = FunctionData;
    fn index(&self, id: FunctionId) -> &FunctionData {
        &self.functions[id.0 as usize]
    }
}

impl Index<TraitId> for ItemTree {
    type Output = TraitData;
    fn index(&self, id: TraitId) -> &TraitData {
        &self.traits[id.0 as usize]
    }
}

impl Index<ImplId> for ItemTree {
    type Output = ImplData;
    fn index(&self, id: ImplId) -> &ImplData {
        &self.impls[id.0 as usize]
    }
}

impl Index<ConstId> for ItemTree {
    type Output = ConstData;
    fn index(&self, id: ConstId) -> &ConstData {
        &self.consts[id.0 as usize]
    }
}
