use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use symproc_core::{Nullability, Variance};

use crate::frontend::{DeclHandle, NameResolution, NativeTypeRef};
use crate::symbols::{FacadeError, Symbol, SymbolFacade, SymbolIdentity, SymbolKind};

use super::{AliasForm, NullabilityPolicy, RefId, Substitution, Type, TypeArgument, TypeReference};

/// Alias chains longer than this are treated as recursive.
const MAX_ALIAS_DEPTH: usize = 32;

/// A function's signature as seen from a containing type.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub type_parameters: Vec<Symbol>,
    pub parameters: Vec<(String, Type)>,
    /// `None` when the function declares no return type.
    pub return_type: Option<Type>,
    pub receiver: Option<Type>,
}

/// Resolves type references and performs member-of substitution. One per build.
pub struct TypeResolver {
    facade: Arc<SymbolFacade>,
    policy: NullabilityPolicy,
    cache: RwLock<HashMap<RefId, Type>>,
}

impl TypeResolver {
    pub fn new(facade: Arc<SymbolFacade>, policy: NullabilityPolicy) -> Self {
        Self {
            facade,
            policy,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn facade(&self) -> &Arc<SymbolFacade> {
        &self.facade
    }

    pub fn policy(&self) -> NullabilityPolicy {
        self.policy
    }

    /// Resolve a reference, memoized per reference identity once it resolves fully.
    ///
    /// Unresolvable names yield an error type whose declaration is the memoized error symbol for the name.
    pub fn resolve(&self, reference: &TypeReference) -> Result<Type, FacadeError> {
        if let Some(ty) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&reference.id()) {
            return Ok(ty.clone());
        }
        let ty = self.resolve_native(reference.native(), reference.scope(), 0)?;
        let ty = self.surface(ty);
        // Unresolved references are retried: a later round may generate the missing declaration.
        if mentions_error(&ty) {
            tracing::debug!(reference = %reference.native(), "unresolved type reference");
            return Ok(ty);
        }
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(reference.id()).or_insert(ty).clone())
    }

    /// An error type for `name`.
    pub fn error_type(&self, name: &str) -> Type {
        Type::error(self.facade.error_symbol(name))
    }

    /// The type of `symbol` as declared: `Foo<T1, ..., Tn>` for a class, the type parameter itself for a
    /// type parameter.
    pub fn declared_type(&self, symbol: &Symbol) -> Result<Type, FacadeError> {
        match symbol.kind() {
            SymbolKind::Class(_) => {
                let args = self
                    .facade
                    .type_parameters(symbol)?
                    .iter()
                    .map(|p| TypeArgument::invariant(Type::new(Arc::clone(p), Vec::new(), Nullability::NotNull)))
                    .collect();
                Ok(Type::new(Arc::clone(symbol), args, Nullability::NotNull))
            }
            SymbolKind::TypeParameter => Ok(Type::new(Arc::clone(symbol), Vec::new(), Nullability::NotNull)),
            SymbolKind::Error => Ok(Type::error(Arc::clone(symbol))),
            SymbolKind::TypeAlias => {
                let args = self
                    .facade
                    .type_parameters(symbol)?
                    .iter()
                    .map(|p| TypeArgument::invariant(Type::new(Arc::clone(p), Vec::new(), Nullability::NotNull)))
                    .collect();
                let ty = self.expand_alias(Arc::clone(symbol), args, Nullability::NotNull, 0)?;
                Ok(self.surface(ty))
            }
            _ => match self.facade.type_of(symbol) {
                Some(reference) => self.resolve(&reference),
                None => Ok(self.error_type(symbol.qualified_name().as_str())),
            },
        }
    }

    fn resolve_native(&self, native: &NativeTypeRef, scope: DeclHandle, depth: usize) -> Result<Type, FacadeError> {
        match self.facade.frontend().resolve_type_name(scope, &native.name) {
            NameResolution::Unresolved => Ok(self.error_type(&native.name)),
            NameResolution::TypeParameter(handle) => {
                let param = self.facade.symbol_for_decl(handle)?;
                Ok(Type::new(param, Vec::new(), native.nullability))
            }
            NameResolution::Declaration(handle) => {
                let declaration = self.facade.symbol_for_decl(handle)?;
                let mut arguments = Vec::with_capacity(native.arguments.len());
                for arg in &native.arguments {
                    arguments.push(match &arg.ty {
                        None => TypeArgument::star(),
                        Some(inner) => TypeArgument::projected(arg.variance, self.resolve_native(inner, scope, depth)?),
                    });
                }
                if declaration.kind() == SymbolKind::TypeAlias {
                    return self.expand_alias(declaration, arguments, native.nullability, depth);
                }
                Ok(Type::new(declaration, arguments, native.nullability))
            }
        }
    }

    fn expand_alias(
        &self,
        alias: Symbol,
        arguments: Vec<TypeArgument>,
        nullability: Nullability,
        depth: usize,
    ) -> Result<Type, FacadeError> {
        if depth >= MAX_ALIAS_DEPTH {
            tracing::warn!(alias = %alias.qualified_name(), "type alias expansion too deep; treating as recursive");
            return Ok(self.error_type(alias.qualified_name().as_str()));
        }
        let Some(target) = self.facade.type_of(&alias) else {
            return Ok(self.error_type(alias.qualified_name().as_str()));
        };
        let expanded = self.resolve_native(target.native(), target.scope(), depth + 1)?;
        if expanded.is_error() {
            return Ok(expanded);
        }
        let params = self.facade.type_parameters(&alias)?;
        let expanded = Substitution::from_pairs(&params, &arguments).apply(&expanded);
        let expanded = expanded.with_nullability(expanded.nullability().join(nullability));
        Ok(expanded.with_alias(AliasForm { alias, arguments }))
    }

    /// Apply the nullability policy throughout a type.
    fn surface(&self, ty: Type) -> Type {
        if self.policy == NullabilityPolicy::Flexible {
            return ty;
        }
        self.surface_ref(&ty)
    }

    fn surface_ref(&self, ty: &Type) -> Type {
        let map_args = |args: &[TypeArgument]| -> Vec<TypeArgument> {
            args.iter()
                .map(|a| match &a.ty {
                    None => TypeArgument::star(),
                    Some(t) => TypeArgument::projected(a.variance, self.surface_ref(t)),
                })
                .collect()
        };
        let mut out = Type::new(
            ty.declaration().clone(),
            map_args(ty.arguments()),
            self.policy.apply(ty.nullability()),
        );
        if let Some(alias) = ty.alias() {
            out = out.with_alias(AliasForm {
                alias: alias.alias.clone(),
                arguments: map_args(&alias.arguments),
            });
        }
        out
    }

    /// Bindings of a type's declaration parameters to its arguments.
    pub fn substitution_for(&self, ty: &Type) -> Result<Substitution, FacadeError> {
        if !ty.declaration().kind().is_class() {
            return Ok(Substitution::new());
        }
        let params = self.facade.type_parameters(ty.declaration())?;
        Ok(Substitution::from_pairs(&params, ty.arguments()))
    }

    /// View `ty` as its supertype declared by `target`.
    ///
    /// ## Returns
    /// - `Some(view)` with substituted arguments, keeping `ty`'s nullability.
    /// - `None` when `target` is not a supertype of `ty` (or `ty` is an error type).
    pub fn as_super_type(&self, ty: &Type, target: &Symbol) -> Result<Option<Type>, FacadeError> {
        if ty.is_error() || target.is_error() {
            return Ok(None);
        }
        let mut visited = HashSet::new();
        let found = self.find_super_type(ty, target, &mut visited)?;
        Ok(found.map(|t| t.with_nullability(ty.nullability())))
    }

    fn find_super_type(
        &self,
        ty: &Type,
        target: &Symbol,
        visited: &mut HashSet<SymbolIdentity>,
    ) -> Result<Option<Type>, FacadeError> {
        if ty.declaration() == target {
            return Ok(Some(ty.clone()));
        }
        if !visited.insert(ty.declaration().identity().clone()) {
            return Ok(None);
        }
        if ty.is_type_parameter() {
            for bound in self.facade.bounds(ty.declaration()).iter() {
                let bound = self.resolve(bound)?;
                if let Some(found) = self.find_super_type(&bound, target, visited)? {
                    return Ok(Some(found));
                }
            }
            return Ok(None);
        }
        let sub = self.substitution_for(ty)?;
        for super_ref in self.facade.super_types(ty.declaration()).iter() {
            let super_type = self.resolve(super_ref)?;
            if super_type.is_error() {
                continue;
            }
            let super_type = sub.apply(&super_type);
            if let Some(found) = self.find_super_type(&super_type, target, visited)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// The declared type of `member` (property type or function return type) as seen from `containing`.
    ///
    /// Walks the supertype chain from `containing` to the member's owner, composing substitutions at each
    /// step. A containing type that is not a subtype of the owner yields an error type.
    #[tracing::instrument(skip_all, fields(member = %member.qualified_name()))]
    pub fn as_member_of(&self, member: &Symbol, containing: &Type) -> Result<Type, FacadeError> {
        let declared = match self.facade.type_of(member) {
            Some(reference) => self.resolve(&reference)?,
            None => return Ok(self.error_type(member.qualified_name().as_str())),
        };
        match self.member_substitution(member, containing)? {
            MemberView::TopLevel => Ok(declared),
            MemberView::Seen(sub) => Ok(self.surface(sub.apply(&declared))),
            MemberView::NotASubtype(name) => Ok(self.error_type(&name)),
        }
    }

    /// Return, receiver and parameter types of `function` as seen from `containing`.
    pub fn function_as_member_of(&self, function: &Symbol, containing: &Type) -> Result<FunctionSignature, FacadeError> {
        let sub = match self.member_substitution(function, containing)? {
            MemberView::TopLevel => Substitution::new(),
            MemberView::Seen(sub) => sub,
            MemberView::NotASubtype(name) => {
                let error = self.error_type(&name);
                return Ok(FunctionSignature {
                    type_parameters: self.facade.type_parameters(function)?.to_vec(),
                    parameters: Vec::new(),
                    return_type: Some(error),
                    receiver: None,
                });
            }
        };
        let see = |reference: Option<TypeReference>| -> Result<Option<Type>, FacadeError> {
            reference
                .map(|r| self.resolve(&r).map(|t| self.surface(sub.apply(&t))))
                .transpose()
        };
        let mut parameters = Vec::new();
        for param in self.facade.parameters(function)?.iter() {
            let ty = match see(self.facade.type_of(param))? {
                Some(ty) => ty,
                None => self.error_type(param.qualified_name().as_str()),
            };
            parameters.push((param.name().to_string(), ty));
        }
        Ok(FunctionSignature {
            type_parameters: self.facade.type_parameters(function)?.to_vec(),
            parameters,
            return_type: see(self.facade.type_of(function))?,
            receiver: see(self.facade.receiver_type(function))?,
        })
    }

    fn member_substitution(&self, member: &Symbol, containing: &Type) -> Result<MemberView, FacadeError> {
        let owner = match self.facade.parent(member)? {
            Some(owner) if owner.kind().is_class() => owner,
            _ => return Ok(MemberView::TopLevel),
        };
        if containing.is_error() {
            return Ok(MemberView::NotASubtype(containing.declaration().name().to_string()));
        }
        match self.as_super_type(containing, &owner)? {
            Some(view) => Ok(MemberView::Seen(self.substitution_for(&view)?)),
            None => Ok(MemberView::NotASubtype(format!(
                "{} as member of {}",
                member.qualified_name(),
                containing
            ))),
        }
    }

    /// Whether a value of type `source` may be used where `target` is expected.
    ///
    /// Honors declaration-site and use-site variance. Platform nullability is compatible with both
    /// nullable and not-null. Error types are never assignable.
    pub fn is_assignable_from(&self, target: &Type, source: &Type) -> Result<bool, FacadeError> {
        if target.is_error() || source.is_error() {
            return Ok(false);
        }
        if source.is_marked_nullable() && target.nullability() == Nullability::NotNull {
            return Ok(false);
        }
        if target.declaration() == source.declaration() && target.arguments() == source.arguments() {
            return Ok(true);
        }
        if target.is_type_parameter() {
            return Ok(false);
        }
        let Some(view) = self.as_super_type(source, target.declaration())? else {
            return Ok(false);
        };

        let params = self.facade.type_parameters(target.declaration())?;
        for (idx, target_arg) in target.arguments().iter().enumerate() {
            let Some(target_ty) = &target_arg.ty else {
                continue;
            };
            let Some(source_arg) = view.arguments().get(idx) else {
                return Ok(false);
            };
            let Some(source_ty) = &source_arg.ty else {
                return Ok(false);
            };
            let declared = params.get(idx).map(|p| p.variance()).unwrap_or(Variance::Invariant);
            let effective = match target_arg.variance {
                Variance::Invariant => declared,
                projected => projected,
            };
            let ok = match effective {
                Variance::Covariant => {
                    source_arg.variance != Variance::Contravariant && self.is_assignable_from(target_ty, source_ty)?
                }
                Variance::Contravariant => {
                    source_arg.variance != Variance::Covariant && self.is_assignable_from(source_ty, target_ty)?
                }
                Variance::Invariant => source_arg.variance == Variance::Invariant && source_ty == target_ty,
                Variance::Star => true,
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn mentions_error(ty: &Type) -> bool {
    ty.is_error() || ty.arguments().iter().filter_map(|a| a.ty.as_ref()).any(mentions_error)
}

enum MemberView {
    /// The member has no owning class.
    TopLevel,
    Seen(Substitution),
    NotASubtype(String),
}
