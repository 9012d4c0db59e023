//! Type-parameter substitution.
//!
//! A [`Substitution`] binds type parameters (by native handle) to type arguments. Applying it composes
//! use-site variance through [`Variance::compose`] and joins nullability by dominance
//! (`Nullable > Platform > NotNull`).

use std::collections::HashMap;

use symproc_core::Variance;

use crate::frontend::DeclHandle;
use crate::symbols::Symbol;

use super::{AliasForm, Type, TypeArgument};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    bindings: HashMap<DeclHandle, TypeArgument>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `parameters[i]` to `arguments[i]`. Extra parameters or arguments are ignored.
    pub fn from_pairs(parameters: &[Symbol], arguments: &[TypeArgument]) -> Self {
        let mut sub = Self::new();
        for (param, arg) in parameters.iter().zip(arguments) {
            if let Some(handle) = param.decl_handle() {
                sub.bind(handle, arg.clone());
            }
        }
        sub
    }

    pub fn bind(&mut self, parameter: DeclHandle, argument: TypeArgument) {
        self.bindings.insert(parameter, argument);
    }

    pub fn get(&self, parameter: DeclHandle) -> Option<&TypeArgument> {
        self.bindings.get(&parameter)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    fn binding_for(&self, ty: &Type) -> Option<&TypeArgument> {
        if !ty.is_type_parameter() {
            return None;
        }
        ty.declaration().decl_handle().and_then(|h| self.bindings.get(&h))
    }

    /// Substitute inside `ty`.
    ///
    /// A parameter bound to `*` in top-level position has no single replacement; it stays as the parameter,
    /// made nullable.
    pub fn apply(&self, ty: &Type) -> Type {
        if self.is_empty() {
            return ty.clone();
        }
        if let Some(binding) = self.binding_for(ty) {
            return match &binding.ty {
                Some(replacement) => {
                    replacement.with_nullability(replacement.nullability().join(ty.nullability()))
                }
                None => ty.make_nullable(),
            };
        }

        let mut out = Type::new(
            ty.declaration().clone(),
            ty.arguments().iter().map(|a| self.apply_argument(a)).collect(),
            ty.nullability(),
        );
        if let Some(alias) = ty.alias() {
            out = out.with_alias(AliasForm {
                alias: alias.alias.clone(),
                arguments: alias.arguments.iter().map(|a| self.apply_argument(a)).collect(),
            });
        }
        out
    }

    /// Substitute inside one argument, composing its projection with the binding's.
    pub fn apply_argument(&self, argument: &TypeArgument) -> TypeArgument {
        let Some(inner) = &argument.ty else {
            return TypeArgument::star();
        };
        let variance = match self.binding_for(inner) {
            Some(binding) => argument.variance.compose(binding.variance),
            None => argument.variance,
        };
        if variance == Variance::Star {
            return TypeArgument::star();
        }
        TypeArgument::projected(variance, self.apply(inner))
    }
}
