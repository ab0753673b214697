//! Patterns and bindings.
//!
//! Matching a non-reference pattern against a reference looks through the
//! reference and switches the default binding mode to by-reference, so
//! `Some(x)` against `&Option<T>` binds `x: &T`.

use quarry_hir::body::{BindingMode, Expr, Literal, Pat, PatId};
use quarry_hir::item::VariantShape;
use quarry_hir::ty::{InferTy, Mutability, Ty};
use quarry_hir::Substitution;

use super::{InferResult, InferenceWalker};

/// How a plain binding binds when it carries no `ref` of its own.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DefaultBinding {
    Move,
    Ref(Mutability),
}

impl DefaultBinding {
    /// Looking through one more reference of mutability `mutability`.
    fn through(self, mutability: Mutability) -> DefaultBinding {
        match self {
            DefaultBinding::Move => DefaultBinding::Ref(mutability),
            DefaultBinding::Ref(Mutability::Mut) => DefaultBinding::Ref(mutability),
            DefaultBinding::Ref(Mutability::Not) => DefaultBinding::Ref(Mutability::Not),
        }
    }
}

impl InferenceWalker<'_, '_> {
    /// Type `pat` against `expected`, recording a type for every binding.
    pub(super) fn infer_pat(&mut self, pat: PatId, expected: &Ty) -> InferResult<()> {
        self.infer_pat_with(pat, expected, DefaultBinding::Move)
    }

    fn is_non_reference_pat(&self, pat: PatId) -> bool {
        let body = self.body;
        match &body[pat] {
            Pat::Tuple(_)
            | Pat::TupleStruct { .. }
            | Pat::Struct { .. }
            | Pat::Path(_)
            | Pat::Slice { .. }
            | Pat::Range { .. } => true,
            // String literals already have reference type.
            Pat::Lit(expr) => {
                !matches!(body[*expr], Expr::Literal(Literal::Str | Literal::ByteStr(_)))
            }
            Pat::Missing | Pat::Wild | Pat::Bind { .. } | Pat::Ref { .. } | Pat::Or(_) => false,
        }
    }

    fn infer_pat_with(
        &mut self,
        pat: PatId,
        expected: &Ty,
        mut mode: DefaultBinding,
    ) -> InferResult<()> {
        let body = self.body;
        let mut expected = self.ctx.resolve_vars_with_obligations(expected.clone());
        if self.is_non_reference_pat(pat) {
            while let Ty::Ref(inner, mutability, _) = &expected {
                mode = mode.through(*mutability);
                expected = self.ctx.shallow_resolve(inner);
            }
        }

        match &body[pat] {
            Pat::Missing | Pat::Wild => {}
            Pat::Bind { mode: annotation, sub, .. } => {
                let ty = match (annotation, mode) {
                    (BindingMode::ByRef(mutability), _) => {
                        Ty::reference(expected.clone(), *mutability)
                    }
                    (BindingMode::ByValue(Mutability::Not), DefaultBinding::Ref(mutability)) => {
                        Ty::reference(expected.clone(), mutability)
                    }
                    (BindingMode::ByValue(_), _) => expected.clone(),
                };
                self.ctx.write_binding(pat, ty);
                if let Some(sub) = sub {
                    self.infer_pat_with(*sub, &expected, mode)?;
                }
            }
            Pat::Tuple(pats) => {
                let elems = match &expected {
                    Ty::Tuple(elems) if elems.len() == pats.len() => elems.clone(),
                    Ty::Infer(InferTy::TyVar(_)) => {
                        let elems: Vec<Ty> = pats.iter().map(|_| self.ctx.new_ty_var()).collect();
                        self.ctx.combine_types(&expected, &Ty::Tuple(elems.clone()));
                        elems
                    }
                    _ => vec![Ty::Unknown; pats.len()],
                };
                for (sub, ty) in pats.iter().zip(&elems) {
                    self.infer_pat_with(*sub, ty, mode)?;
                }
            }
            Pat::TupleStruct { args, .. } => {
                let fields = self.variant_fields(pat, &expected);
                let fields: Vec<Ty> = match fields {
                    Some((VariantShape::Tuple(fields), subst)) => subst.apply(fields),
                    _ => Vec::new(),
                };
                for (i, sub) in args.iter().enumerate() {
                    let ty = fields.get(i).cloned().unwrap_or(Ty::Unknown);
                    let ty = self.ctx.normalize_and_register(ty);
                    self.infer_pat_with(*sub, &ty, mode)?;
                }
            }
            Pat::Struct { fields, .. } => {
                let shape = self.variant_fields(pat, &expected);
                for (name, sub) in fields {
                    let ty = match &shape {
                        Some((shape, subst)) => {
                            shape.field(name).map(|(_, ty)| subst.apply(ty.clone()))
                        }
                        None => None,
                    };
                    let ty = self.ctx.normalize_and_register(ty.unwrap_or(Ty::Unknown));
                    self.infer_pat_with(*sub, &ty, mode)?;
                }
            }
            Pat::Path(_) => {
                self.variant_fields(pat, &expected);
            }
            Pat::Ref { pat: inner, mutability } => {
                let inner_ty = match &expected {
                    Ty::Ref(pointee, ..) => (**pointee).clone(),
                    Ty::Infer(InferTy::TyVar(_)) => {
                        let pointee = self.ctx.new_ty_var();
                        let reference = Ty::reference(pointee.clone(), *mutability);
                        self.ctx.combine_types(&expected, &reference);
                        pointee
                    }
                    _ => Ty::Unknown,
                };
                self.infer_pat_with(*inner, &inner_ty, DefaultBinding::Move)?;
            }
            Pat::Lit(expr) => {
                let ty = self.infer_expr(*expr, Some(&expected))?;
                self.ctx.combine_types(&expected, &ty);
            }
            Pat::Range { start, end } => {
                for bound in start.iter().chain(end.iter()) {
                    let ty = self.infer_expr(*bound, Some(&expected))?;
                    self.ctx.combine_types(&expected, &ty);
                }
            }
            Pat::Slice { prefix, rest, suffix } => {
                let (elem, len) = match &expected {
                    Ty::Array(elem, len) => ((**elem).clone(), *len),
                    Ty::Slice(elem) => ((**elem).clone(), None),
                    _ => (Ty::Unknown, None),
                };
                for sub in prefix.iter().chain(suffix) {
                    self.infer_pat_with(*sub, &elem, mode)?;
                }
                if let Some(rest) = rest {
                    let taken = (prefix.len() + suffix.len()) as u64;
                    let rest_ty = match (&expected, len) {
                        (Ty::Array(..), Some(len)) => {
                            Ty::array(elem, Some(len.saturating_sub(taken)))
                        }
                        (Ty::Array(..) | Ty::Slice(_), _) => Ty::slice(elem),
                        _ => Ty::Unknown,
                    };
                    self.infer_pat_with(*rest, &rest_ty, mode)?;
                }
            }
            Pat::Or(alternatives) => {
                for alternative in alternatives {
                    self.infer_pat_with(*alternative, &expected, mode)?;
                }
            }
        }
        Ok(())
    }

    /// The shape of the struct or variant `pat` names, instantiated against
    /// `expected`. A pattern of another type is reported as a mismatch.
    fn variant_fields(
        &mut self,
        pat: PatId,
        expected: &Ty,
    ) -> Option<(VariantShape, Substitution)> {
        let db = self.ctx.session.db();
        let items = self.ctx.items();
        let (variant, explicit) = db.resolve_variant(self.ctx.owner, pat.into())?;
        let adt = variant.adt();
        let data = &items[adt];

        let subst = self.instantiate_generics(&data.generics, None);
        self.unify_subst(&explicit, &subst);
        let pat_ty = Ty::Adt(adt, subst.apply(data.generics.param_tys()));
        if !self.ctx.combine_types(expected, &pat_ty) {
            self.ctx.report_type_mismatch(pat.into(), expected, &pat_ty);
        }
        let shape = data.shape(variant)?.clone();
        Some((shape, subst))
    }
}
