//! Literals, tuples, arrays and macro calls.

use quarry_hir::body::{ArrayExpr, ExprId, Literal, MacroArgs, MacroCall};
use quarry_hir::ty::{InferTy, IntTy, Mutability, Region, Ty};

use super::{InferResult, InferenceWalker};

/// The result type of a well-known macro whose arguments do not affect it,
/// or `None` for macros not listed here.
fn fixed_macro_ty(name: &str) -> Option<Ty> {
    let ty = match name {
        "print" | "println" | "eprint" | "eprintln" | "write" | "writeln" => Ty::unit(),
        "assert" | "assert_eq" | "assert_ne" => Ty::unit(),
        "debug_assert" | "debug_assert_eq" | "debug_assert_ne" => Ty::unit(),
        "panic" | "unreachable" | "unimplemented" | "todo" => Ty::Never,
        "line" | "column" => Ty::Int(IntTy::U32),
        "file" | "env" | "concat" | "stringify" | "include_str" | "module_path" => Ty::static_str(),
        "cfg" => Ty::Bool,
        "include_bytes" => {
            let bytes = Box::new(Ty::slice(Ty::Int(IntTy::U8)));
            Ty::Ref(bytes, Mutability::Not, Region::static_())
        }
        _ => return None,
    };
    Some(ty)
}

/// The element type an array or slice expectation asks for.
fn expected_elem(expected: Option<&Ty>) -> Option<Ty> {
    match expected {
        Some(Ty::Array(elem, _) | Ty::Slice(elem)) => Some((**elem).clone()),
        _ => None,
    }
}

impl InferenceWalker<'_, '_> {
    /// Infer the type of a literal. Unsuffixed numbers take the expected
    /// numeric type when there is one, a fresh numeric variable otherwise.
    pub(super) fn infer_literal(&mut self, lit: &Literal, expected: Option<&Ty>) -> Ty {
        match lit {
            Literal::Bool(_) => Ty::Bool,
            Literal::Char => Ty::Char,
            Literal::ByteChar => Ty::Int(IntTy::U8),
            Literal::Str => Ty::static_str(),
            Literal::ByteStr(len) => Ty::Ref(
                Box::new(Ty::array(Ty::Int(IntTy::U8), Some(*len))),
                Mutability::Not,
                Region::static_(),
            ),
            Literal::Int(Some(int)) => Ty::Int(*int),
            Literal::Int(None) => match expected {
                Some(ty @ (Ty::Int(_) | Ty::Infer(InferTy::IntVar(_)))) => ty.clone(),
                Some(Ty::Char) => Ty::Int(IntTy::U8),
                Some(Ty::Ptr(..) | Ty::Fn(_)) => Ty::Int(IntTy::Usize),
                _ => self.ctx.new_int_var(),
            },
            Literal::Float(Some(float)) => Ty::Float(*float),
            Literal::Float(None) => match expected {
                Some(ty @ (Ty::Float(_) | Ty::Infer(InferTy::FloatVar(_)))) => ty.clone(),
                _ => self.ctx.new_float_var(),
            },
        }
    }

    /// Infer the type of a tuple, element-wise against an expected tuple.
    pub(super) fn infer_tuple(
        &mut self,
        elems: &[ExprId],
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        let expected_elems: &[Ty] = match expected {
            Some(Ty::Tuple(tys)) => tys,
            _ => &[],
        };
        let expected_elems = expected_elems.to_vec();
        let mut tys = Vec::with_capacity(elems.len());
        for (i, elem) in elems.iter().enumerate() {
            let expected = expected_elems.get(i).cloned().unwrap_or(Ty::Unknown);
            tys.push(self.infer_expr_coercable_to(*elem, &expected)?);
        }
        Ok(Ty::Tuple(tys))
    }

    /// Infer the type of `[a, b, c]` or `[x; n]`.
    pub(super) fn infer_array(
        &mut self,
        array: &ArrayExpr,
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        let expected_elem = expected_elem(expected);
        match array {
            ArrayExpr::List(elems) => {
                let elem = self.infer_elements(elems, expected_elem)?;
                Ok(Ty::array(elem, Some(elems.len() as u64)))
            }
            ArrayExpr::Repeat { initializer, len, len_value } => {
                let elem = self.infer_repeat(*initializer, *len, expected_elem)?;
                Ok(Ty::array(elem, *len_value))
            }
        }
    }

    /// The joined type of list elements, preferring the expected element
    /// type when the join coerces to it. An empty list has a fresh one.
    fn infer_elements(&mut self, elems: &[ExprId], expected_elem: Option<Ty>) -> InferResult<Ty> {
        let Some(first) = elems.first() else {
            return Ok(expected_elem.unwrap_or_else(|| self.ctx.new_ty_var()));
        };
        let mut tys = Vec::with_capacity(elems.len());
        for elem in elems {
            tys.push(self.infer_expr(*elem, expected_elem.as_ref())?);
        }
        let joined = self.more_complete_ty(tys);
        match expected_elem {
            Some(expected) if self.ctx.try_coerce(*first, &joined, &expected) => Ok(expected),
            _ => Ok(joined),
        }
    }

    fn infer_repeat(
        &mut self,
        initializer: ExprId,
        len: ExprId,
        expected_elem: Option<Ty>,
    ) -> InferResult<Ty> {
        let elem = match expected_elem {
            Some(expected) => self.infer_expr_coercable_to(initializer, &expected)?,
            None => self.infer_expr(initializer, None)?,
        };
        self.infer_expr_coercable_to(len, &Ty::Int(IntTy::Usize))?;
        Ok(elem)
    }

    // ── Macros ─────────────────────────────────────────────────────────

    /// Infer the type of a macro call. Arguments are always walked; the
    /// result depends on which macro it is.
    pub(super) fn infer_macro(
        &mut self,
        call: &MacroCall,
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        let known = self.ctx.known();
        let name = call.name.as_str();
        let args = match &call.args {
            MacroArgs::Array(array) => {
                if name != "vec" {
                    for child in array_children(array) {
                        self.infer_expr(child, None)?;
                    }
                    return Ok(Ty::Unknown);
                }
                return self.infer_vec_macro(array, expected);
            }
            MacroArgs::Exprs(args) => args,
        };

        match (name, args.as_slice()) {
            ("vec", elems) => self.infer_vec_macro(&ArrayExpr::List(elems.to_vec()), expected),
            ("dbg", [arg]) => self.infer_expr(*arg, expected),
            ("try", [arg]) => {
                let base = self.infer_expr(*arg, None)?;
                Ok(self.try_output_ty(base))
            }
            ("await", [arg]) => {
                let base = self.infer_expr(*arg, None)?;
                Ok(self.await_output_ty(base))
            }
            _ => {
                for arg in args {
                    self.infer_expr(*arg, None)?;
                }
                let ty = match name {
                    "format" => self.known_adt_ty(known.string, Vec::new()),
                    "format_args" => self.known_adt_ty(known.arguments, Vec::new()),
                    "option_env" => self.known_adt_ty(known.option, vec![Ty::static_str()]),
                    "dbg" => Ty::Tuple(args.iter().map(|arg| self.ctx.expr_ty(*arg)).collect()),
                    _ => fixed_macro_ty(name).unwrap_or(Ty::Unknown),
                };
                Ok(ty)
            }
        }
    }

    /// `vec![..]`: a `Vec` of the element type, guided by an expected `Vec`.
    fn infer_vec_macro(&mut self, array: &ArrayExpr, expected: Option<&Ty>) -> InferResult<Ty> {
        let known = self.ctx.known();
        let expected_elem = match expected {
            Some(Ty::Adt(adt, args)) if Some(*adt) == known.vec => args.first().cloned(),
            _ => None,
        };
        let elem = match array {
            ArrayExpr::List(elems) => self.infer_elements(elems, expected_elem)?,
            ArrayExpr::Repeat { initializer, len, .. } => {
                self.infer_repeat(*initializer, *len, expected_elem)?
            }
        };
        Ok(self.known_adt_ty(known.vec, vec![elem]))
    }
}

fn array_children(array: &ArrayExpr) -> Vec<ExprId> {
    match array {
        ArrayExpr::List(elems) => elems.clone(),
        ArrayExpr::Repeat { initializer, len, .. } => vec![*initializer, *len],
    }
}
