//! Registered type model.
//!
//! The data-model types being documented live in another program, so their
//! shape is described to this crate as a [`TypeRegistry`]: immutable type
//! descriptors addressed by [`TypeId`], with [`TypeRef`] values for closed
//! generic instantiations. A registry is built once (programmatically through
//! [`RegistryBuilder`] or from a YAML manifest) and only read afterwards.

mod builder;
mod expr;
pub mod relation;

pub use builder::{PropertySpec, RegistryBuilder, TypeSpec};
pub use relation::{find_generic_instantiation, inherits_or_implements_generic};

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Index of a type descriptor inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub(crate) fn from_index(index: usize) -> Self {
        TypeId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Reference to a type, possibly a generic instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A non-generic type, or an open generic definition.
    Type(TypeId),
    /// A generic definition applied to type arguments.
    Generic {
        definition: TypeId,
        arguments: Vec<TypeRef>,
    },
    /// Positional generic parameter of the enclosing definition.
    Parameter(usize),
}

impl TypeRef {
    /// The descriptor this reference is built on, if any.
    pub fn definition(&self) -> Option<TypeId> {
        match self {
            TypeRef::Type(id) => Some(*id),
            TypeRef::Generic { definition, .. } => Some(*definition),
            TypeRef::Parameter(_) => None,
        }
    }

    /// Normalize to the open generic definition. Non-generic references are
    /// returned unchanged.
    pub fn open_definition(&self) -> TypeRef {
        match self {
            TypeRef::Generic { definition, .. } => TypeRef::Type(*definition),
            other => other.clone(),
        }
    }

    /// Generic arguments, empty for non-generic references.
    pub fn arguments(&self) -> &[TypeRef] {
        match self {
            TypeRef::Generic { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Replace generic parameters with the given arguments.
    pub(crate) fn substitute(&self, arguments: &[TypeRef]) -> TypeRef {
        match self {
            TypeRef::Parameter(index) => arguments
                .get(*index)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeRef::Generic {
                definition,
                arguments: inner,
            } => TypeRef::Generic {
                definition: *definition,
                arguments: inner.iter().map(|a| a.substitute(arguments)).collect(),
            },
            TypeRef::Type(_) => self.clone(),
        }
    }
}

impl From<TypeId> for TypeRef {
    fn from(id: TypeId) -> Self {
        TypeRef::Type(id)
    }
}

/// Broad category of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// The universal root type.
    Object,
    #[default]
    Class,
    Interface,
    /// Basic value types and strings.
    Primitive,
    Boolean,
    Enum,
}

/// Mapping annotation attached to a type or member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Table-name override on an entity type.
    Table { name: String },
    /// Column-name override on a member.
    Column { name: String },
    /// Member is excluded from persistence.
    NotMapped,
}

/// A property declared on a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: String,
    pub declared_type: TypeRef,
    pub attributes: Vec<Attribute>,
    pub readable: bool,
    pub is_static: bool,
}

impl MemberDescriptor {
    /// Name given by a column-rename annotation.
    pub fn column_name(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Column { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Whether the member carries a persistence-exclusion annotation.
    pub fn is_not_mapped(&self) -> bool {
        self.attributes.contains(&Attribute::NotMapped)
    }

    /// Externally visible column name.
    pub fn persisted_name(&self) -> &str {
        self.column_name().unwrap_or(&self.name)
    }
}

/// Immutable description of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Namespace-qualified name without generic parameters.
    pub full_name: String,
    pub kind: TypeKind,
    pub generic_parameters: Vec<String>,
    pub base: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub attributes: Vec<Attribute>,
    pub properties: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    /// Simple name (last path segment).
    pub fn name(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.full_name)
    }

    /// Namespace, if the name is qualified.
    pub fn namespace(&self) -> Option<&str> {
        self.full_name.rsplit_once('.').map(|(ns, _)| ns)
    }

    pub fn is_generic_definition(&self) -> bool {
        !self.generic_parameters.is_empty()
    }

    /// Table-name override from a mapping annotation.
    pub fn table_name_override(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Table { name } => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Read-only registry of type descriptors.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
    aliases: HashMap<String, TypeId>,
}

impl TypeRegistry {
    /// Start building a registry. Builtin system types are always included.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry holding only the builtin system types.
    pub fn with_builtins() -> Result<Self> {
        RegistryBuilder::new().build()
    }

    /// Load a registry from a YAML manifest file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a registry from a YAML manifest.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Manifest {
            types: Vec<TypeSpec>,
        }

        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        manifest
            .types
            .into_iter()
            .fold(RegistryBuilder::new(), RegistryBuilder::define)
            .build()
    }

    pub(crate) fn from_parts(
        types: Vec<TypeDescriptor>,
        by_name: HashMap<String, TypeId>,
        aliases: HashMap<String, TypeId>,
    ) -> Self {
        Self {
            types,
            by_name,
            aliases,
        }
    }

    /// The universal root type (`System.Object`).
    pub fn object(&self) -> TypeId {
        TypeId(0)
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Descriptor for an id handed out by this registry.
    pub fn descriptor(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.index()]
    }

    /// Look up a type by full name or builtin alias (`int`, `DbSet`, ...).
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name
            .get(name)
            .or_else(|| self.aliases.get(name))
            .copied()
    }

    /// Resolve a closed type expression such as `DbSet<Shop.Order>`.
    ///
    /// A bare generic definition name (`DbSet`) resolves to the open definition.
    pub fn resolve(&self, expression: &str) -> Result<TypeRef> {
        let expr = expr::parse(expression)?;
        builder::resolve_expr(
            &expr,
            &[],
            &|name| self.lookup(name),
            &|id| self.descriptor(id).generic_parameters.len(),
            &|id| self.descriptor(id).kind,
            true,
        )
    }

    /// Kind of the referenced type, `None` for unbound parameters.
    pub fn kind_of(&self, ty: &TypeRef) -> Option<TypeKind> {
        ty.definition().map(|id| self.descriptor(id).kind)
    }

    /// Kind of the value stored in a column of type `ty`: `Nullable<T>` is
    /// classified by `T`.
    pub fn column_kind(&self, ty: &TypeRef) -> Option<TypeKind> {
        let nullable = self.lookup(builder::NULLABLE);
        match ty {
            TypeRef::Generic {
                definition,
                arguments,
            } if Some(*definition) == nullable => self.kind_of(arguments.first()?),
            _ => self.kind_of(ty),
        }
    }

    /// Human-readable name, e.g. `Microsoft.EntityFrameworkCore.DbSet<Shop.Order>`.
    pub fn display(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Type(id) => self.descriptor(*id).full_name.clone(),
            TypeRef::Generic {
                definition,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(|a| self.display(a)).collect();
                format!("{}<{}>", self.descriptor(*definition).full_name, args.join(", "))
            }
            TypeRef::Parameter(index) => format!("!{}", index),
        }
    }

    /// Symbol path used by the documentation corpus: the full name, with an
    /// arity suffix (`` Name`1 ``) for generic definitions.
    pub fn documentation_path(&self, ty: &TypeRef) -> Option<String> {
        let descriptor = self.descriptor(ty.definition()?);
        if descriptor.is_generic_definition() {
            Some(format!(
                "{}`{}",
                descriptor.full_name,
                descriptor.generic_parameters.len()
            ))
        } else {
            Some(descriptor.full_name.clone())
        }
    }

    /// Base type with generic arguments substituted.
    pub fn base_of(&self, ty: &TypeRef) -> Option<TypeRef> {
        let descriptor = self.descriptor(ty.definition()?);
        descriptor
            .base
            .as_ref()
            .map(|base| base.substitute(ty.arguments()))
    }

    /// Interfaces directly implemented by the type, arguments substituted.
    pub fn interfaces_of(&self, ty: &TypeRef) -> Vec<TypeRef> {
        match ty.definition() {
            Some(id) => self
                .descriptor(id)
                .interfaces
                .iter()
                .map(|i| i.substitute(ty.arguments()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Public properties including inherited ones, in declaration order:
    /// the type's own members first, then each base in turn. A member hides
    /// any base member with the same name.
    pub fn properties_of(&self, ty: &TypeRef) -> Vec<MemberDescriptor> {
        let mut seen = HashSet::new();
        let mut members = Vec::new();
        let mut current = Some(ty.clone());

        while let Some(level) = current {
            let Some(id) = level.definition() else {
                break;
            };
            for member in &self.descriptor(id).properties {
                if seen.insert(member.name.clone()) {
                    members.push(MemberDescriptor {
                        declared_type: member.declared_type.substitute(level.arguments()),
                        ..member.clone()
                    });
                }
            }
            current = self.base_of(&level);
        }

        members
    }

    /// Public instance properties that can be read.
    pub fn readable_instance_properties(&self, ty: &TypeRef) -> Vec<MemberDescriptor> {
        self.properties_of(ty)
            .into_iter()
            .filter(|m| m.readable && !m.is_static)
            .collect()
    }

    /// Fail with a model error if `name` is not registered.
    pub fn require(&self, name: &str) -> Result<TypeId> {
        self.lookup(name)
            .ok_or_else(|| SyncError::Model(format!("unknown type '{}'", name)))
    }
}
