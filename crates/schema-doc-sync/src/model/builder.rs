//! Registry construction from type specifications.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::expr::{self, TypeExpr};
use super::{Attribute, MemberDescriptor, TypeDescriptor, TypeId, TypeKind, TypeRef, TypeRegistry};
use crate::error::{Result, SyncError};

const OBJECT: &str = "System.Object";
const VALUE_TYPE: &str = "System.ValueType";
const ENUM: &str = "System.Enum";
pub(super) const NULLABLE: &str = "System.Nullable";

/// C# keyword aliases accepted in type expressions.
const KEYWORD_ALIASES: &[(&str, &str)] = &[
    ("object", "System.Object"),
    ("bool", "System.Boolean"),
    ("byte", "System.Byte"),
    ("sbyte", "System.SByte"),
    ("short", "System.Int16"),
    ("ushort", "System.UInt16"),
    ("int", "System.Int32"),
    ("uint", "System.UInt32"),
    ("long", "System.Int64"),
    ("ulong", "System.UInt64"),
    ("float", "System.Single"),
    ("double", "System.Double"),
    ("decimal", "System.Decimal"),
    ("char", "System.Char"),
    ("string", "System.String"),
];

const PRIMITIVES: &[&str] = &[
    "System.Byte",
    "System.SByte",
    "System.Int16",
    "System.UInt16",
    "System.Int32",
    "System.UInt32",
    "System.Int64",
    "System.UInt64",
    "System.Single",
    "System.Double",
    "System.Decimal",
    "System.Char",
    "System.DateTime",
    "System.DateTimeOffset",
    "System.DateOnly",
    "System.TimeOnly",
    "System.TimeSpan",
    "System.Guid",
];

/// Specification of one type, as written in a manifest or built in code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    /// Full name, with generic parameters for definitions: `Shop.Entity<TKey>`.
    pub name: String,

    #[serde(default)]
    pub kind: TypeKind,

    /// Base type expression. Defaults by kind (`System.Object` for classes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,

    /// Table-name override, e.g. `Orders` or `[dbo].[Orders]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertySpec>,
}

impl TypeSpec {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Enum)
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn property(mut self, property: PropertySpec) -> Self {
        self.properties.push(property);
        self
    }
}

/// Specification of one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,

    /// Declared type expression.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Column-name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    #[serde(default)]
    pub not_mapped: bool,

    #[serde(default = "default_true")]
    pub readable: bool,

    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            column: None,
            not_mapped: false,
            readable: true,
            is_static: false,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn not_mapped(mut self) -> Self {
        self.not_mapped = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    fn attributes(&self) -> Vec<Attribute> {
        let mut attributes = Vec::new();
        if let Some(name) = &self.column {
            attributes.push(Attribute::Column { name: name.clone() });
        }
        if self.not_mapped {
            attributes.push(Attribute::NotMapped);
        }
        attributes
    }
}

fn default_true() -> bool {
    true
}

/// Collects type specifications and resolves them into a [`TypeRegistry`].
///
/// Specs may reference each other in any order; names are resolved only in
/// [`RegistryBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    specs: Vec<TypeSpec>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, spec: TypeSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Resolve all specs. Fails on parse errors, unknown or duplicate names,
    /// wrong generic arity, misplaced interfaces and inheritance cycles.
    pub fn build(self) -> Result<TypeRegistry> {
        let builtins = builtin_specs();
        let builtin_count = builtins.len();
        let specs: Vec<TypeSpec> = builtins.into_iter().chain(self.specs).collect();

        let mut headers: Vec<(String, Vec<String>)> = Vec::with_capacity(specs.len());
        let mut by_name = HashMap::new();
        for (index, spec) in specs.iter().enumerate() {
            let (full_name, parameters) = parse_header(&spec.name)?;
            if by_name
                .insert(full_name.clone(), TypeId::from_index(index))
                .is_some()
            {
                return Err(SyncError::Model(format!(
                    "type '{}' is defined more than once",
                    full_name
                )));
            }
            headers.push((full_name, parameters));
        }

        let mut aliases = HashMap::new();
        for (keyword, target) in KEYWORD_ALIASES {
            if let Some(id) = by_name.get(*target) {
                aliases.insert(keyword.to_string(), *id);
            }
        }
        for (index, (full_name, _)) in headers.iter().enumerate().take(builtin_count) {
            if let Some((_, short)) = full_name.rsplit_once('.') {
                aliases
                    .entry(short.to_string())
                    .or_insert(TypeId::from_index(index));
            }
        }

        let lookup = |name: &str| by_name.get(name).or_else(|| aliases.get(name)).copied();
        let arity = |id: TypeId| headers[id.index()].1.len();
        let kinds: Vec<TypeKind> = specs.iter().map(|s| s.kind).collect();
        let kind = |id: TypeId| kinds[id.index()];

        let mut types = Vec::with_capacity(specs.len());
        for (spec, (full_name, parameters)) in specs.into_iter().zip(headers.iter()) {
            let context = |e: SyncError| match e {
                SyncError::Model(message) => {
                    SyncError::Model(format!("type '{}': {}", full_name, message))
                }
                other => other,
            };
            let resolve = |text: &str| -> Result<TypeRef> {
                let parsed = expr::parse(text)?;
                resolve_expr(&parsed, parameters, &lookup, &arity, &kind, false)
            };

            let base = match &spec.base {
                Some(text) => Some(resolve(text).map_err(context)?),
                None => default_base(spec.kind, &lookup).map(TypeRef::Type),
            };
            if let Some(id) = base.as_ref().and_then(TypeRef::definition) {
                if kinds[id.index()] == TypeKind::Interface {
                    return Err(context(SyncError::Model(format!(
                        "base type '{}' is an interface",
                        headers[id.index()].0
                    ))));
                }
            }

            let mut interfaces = Vec::with_capacity(spec.interfaces.len());
            for text in &spec.interfaces {
                let interface = resolve(text).map_err(context)?;
                if let Some(id) = interface.definition() {
                    if kinds[id.index()] != TypeKind::Interface {
                        return Err(context(SyncError::Model(format!(
                            "'{}' is not an interface",
                            headers[id.index()].0
                        ))));
                    }
                }
                interfaces.push(interface);
            }

            let mut properties = Vec::with_capacity(spec.properties.len());
            for property in &spec.properties {
                let declared_type = resolve(&property.type_name).map_err(|e| {
                    context(match e {
                        SyncError::Model(message) => SyncError::Model(format!(
                            "property '{}': {}",
                            property.name, message
                        )),
                        other => other,
                    })
                })?;
                properties.push(MemberDescriptor {
                    name: property.name.clone(),
                    declared_type,
                    attributes: property.attributes(),
                    readable: property.readable,
                    is_static: property.is_static,
                });
            }

            let attributes = spec
                .table
                .iter()
                .map(|name| Attribute::Table { name: name.clone() })
                .collect();

            types.push(TypeDescriptor {
                full_name: full_name.clone(),
                kind: spec.kind,
                generic_parameters: parameters.clone(),
                base,
                interfaces,
                attributes,
                properties,
            });
        }

        check_acyclic(&types)?;

        Ok(TypeRegistry::from_parts(types, by_name, aliases))
    }
}

/// Resolve a parsed expression. `scope` holds the generic parameters of the
/// enclosing definition; `allow_open` accepts a bare generic definition name.
///
/// `T?` becomes `System.Nullable<T>` only for value types. On a class or
/// interface it is a nullable-reference annotation and resolves to `T`.
pub(super) fn resolve_expr(
    expr: &TypeExpr,
    scope: &[String],
    lookup: &dyn Fn(&str) -> Option<TypeId>,
    arity: &dyn Fn(TypeId) -> usize,
    kind: &dyn Fn(TypeId) -> TypeKind,
    allow_open: bool,
) -> Result<TypeRef> {
    if expr.nullable {
        let inner = TypeExpr {
            nullable: false,
            ..expr.clone()
        };
        let argument = resolve_expr(&inner, scope, lookup, arity, kind, false)?;
        if let Some(id) = argument.definition() {
            if matches!(
                kind(id),
                TypeKind::Object | TypeKind::Class | TypeKind::Interface
            ) {
                return Ok(argument);
            }
        }
        let definition = lookup(NULLABLE)
            .ok_or_else(|| SyncError::Model(format!("unknown type '{}'", NULLABLE)))?;
        return Ok(TypeRef::Generic {
            definition,
            arguments: vec![argument],
        });
    }

    if let Some(index) = scope.iter().position(|p| *p == expr.name) {
        if !expr.arguments.is_empty() {
            return Err(SyncError::Model(format!(
                "generic parameter '{}' cannot take type arguments",
                expr.name
            )));
        }
        return Ok(TypeRef::Parameter(index));
    }

    let id = lookup(&expr.name)
        .ok_or_else(|| SyncError::Model(format!("unknown type '{}'", expr.name)))?;
    let expected = arity(id);

    if expr.arguments.is_empty() {
        if expected == 0 || allow_open {
            return Ok(TypeRef::Type(id));
        }
        return Err(SyncError::Model(format!(
            "type '{}' requires {} type argument(s)",
            expr.name, expected
        )));
    }

    if expr.arguments.len() != expected {
        return Err(SyncError::Model(format!(
            "type '{}' takes {} type argument(s), got {}",
            expr.name,
            expected,
            expr.arguments.len()
        )));
    }

    let arguments = expr
        .arguments
        .iter()
        .map(|a| resolve_expr(a, scope, lookup, arity, kind, false))
        .collect::<Result<Vec<_>>>()?;

    Ok(TypeRef::Generic {
        definition: id,
        arguments,
    })
}

/// Split a definition name into full name and generic parameter names.
fn parse_header(name: &str) -> Result<(String, Vec<String>)> {
    let header = expr::parse(name)?;
    if header.nullable {
        return Err(SyncError::Model(format!(
            "type name '{}' cannot be nullable",
            name
        )));
    }

    let mut parameters = Vec::with_capacity(header.arguments.len());
    for argument in &header.arguments {
        if !argument.arguments.is_empty() || argument.nullable || argument.name.contains('.') {
            return Err(SyncError::Model(format!(
                "type name '{}' has an invalid generic parameter list",
                name
            )));
        }
        if parameters.contains(&argument.name) {
            return Err(SyncError::Model(format!(
                "type name '{}' repeats generic parameter '{}'",
                name, argument.name
            )));
        }
        parameters.push(argument.name.clone());
    }

    Ok((header.name, parameters))
}

fn default_base(kind: TypeKind, lookup: &dyn Fn(&str) -> Option<TypeId>) -> Option<TypeId> {
    match kind {
        TypeKind::Object | TypeKind::Interface => None,
        TypeKind::Class => lookup(OBJECT),
        TypeKind::Enum => lookup(ENUM),
        TypeKind::Primitive | TypeKind::Boolean => lookup(VALUE_TYPE),
    }
}

fn check_acyclic(types: &[TypeDescriptor]) -> Result<()> {
    let base_of = |index: usize| types[index].base.as_ref().and_then(TypeRef::definition);

    for start in 0..types.len() {
        let mut current = base_of(start);
        let mut steps = 0;
        while let Some(id) = current {
            if id.index() == start || steps > types.len() {
                return Err(SyncError::Model(format!(
                    "inheritance cycle through type '{}'",
                    types[start].full_name
                )));
            }
            steps += 1;
            current = base_of(id.index());
        }
    }

    Ok(())
}

/// System types every registry starts with. `System.Object` must stay first.
fn builtin_specs() -> Vec<TypeSpec> {
    let mut specs = vec![
        TypeSpec::new(OBJECT, TypeKind::Object),
        TypeSpec::class(VALUE_TYPE),
        TypeSpec::class(ENUM).base(VALUE_TYPE),
        TypeSpec::new("System.Boolean", TypeKind::Boolean),
        TypeSpec::new("System.String", TypeKind::Primitive).base(OBJECT),
        TypeSpec::new("System.Nullable<T>", TypeKind::Primitive),
    ];
    specs.extend(
        PRIMITIVES
            .iter()
            .map(|name| TypeSpec::new(*name, TypeKind::Primitive)),
    );
    specs.extend([
        TypeSpec::interface("System.Collections.Generic.IEnumerable<T>"),
        TypeSpec::interface("System.Collections.Generic.ICollection<T>")
            .implements("System.Collections.Generic.IEnumerable<T>"),
        TypeSpec::class("System.Collections.Generic.List<T>")
            .implements("System.Collections.Generic.ICollection<T>")
            .implements("System.Collections.Generic.IEnumerable<T>"),
        TypeSpec::interface("System.Linq.IQueryable<T>")
            .implements("System.Collections.Generic.IEnumerable<T>"),
        TypeSpec::class("Microsoft.EntityFrameworkCore.DbContext"),
        TypeSpec::class("Microsoft.EntityFrameworkCore.DbSet<TEntity>")
            .implements("System.Linq.IQueryable<TEntity>")
            .implements("System.Collections.Generic.IEnumerable<TEntity>"),
    ]);
    specs
}
