//! Per-entity documentation resolution.
//!
//! Turns an entity type into the description of its table and the ordered
//! descriptions of its persisted scalar columns.

use serde::Serialize;

use crate::docs::{DocumentationIndex, SymbolKind};
use crate::model::{MemberDescriptor, TypeKind, TypeRef, TypeRegistry};

/// Fixed descriptions for the audit fields shared by all entities.
///
/// These win over authored documentation for any member with the same
/// column name.
// TODO: make the override opt-out per entity; an unrelated member that happens
// to be called `Id` or `IsDeleted` currently loses its own summary.
pub const AUDIT_FIELD_DESCRIPTIONS: &[(&str, &str)] = &[
    ("Id", "编号"),
    ("CreationTime", "创建时间"),
    ("CreatorUserId", "创建人Id"),
    ("LastModificationTime", "最后更新时间"),
    ("LastModifierUserId", "最后更新人"),
    ("IsDeleted", "是否删除"),
    ("DeleterUserId", "删除人"),
    ("DeletionTime", "删除时间"),
    ("CreatorUserName", "创建人"),
];

/// Fixed description for a well-known audit column, if `column` is one.
pub fn fallback_description(column: &str) -> Option<&'static str> {
    AUDIT_FIELD_DESCRIPTIONS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, description)| *description)
}

/// Description of one column, keyed by its externally visible name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub member_name: String,
    pub description: Option<String>,
}

impl ColumnDescriptor {
    /// Description worth writing: present and non-empty.
    pub fn writable_description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }
}

/// Everything the corpus says about one entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityDocumentation {
    pub table_description: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
}

/// Resolves entity documentation from a registry and a corpus index.
#[derive(Debug, Clone, Copy)]
pub struct EntityDocumentationResolver<'a> {
    registry: &'a TypeRegistry,
    index: &'a DocumentationIndex,
}

impl<'a> EntityDocumentationResolver<'a> {
    pub fn new(registry: &'a TypeRegistry, index: &'a DocumentationIndex) -> Self {
        Self { registry, index }
    }

    /// Resolve the table description and column descriptions of `entity`.
    pub fn resolve(&self, entity: &TypeRef) -> EntityDocumentation {
        let Some(path) = self.registry.documentation_path(entity) else {
            return EntityDocumentation::default();
        };

        let table_description = self
            .index
            .lookup(SymbolKind::Type, &path)
            .map(str::to_string);

        let columns = self
            .registry
            .readable_instance_properties(entity)
            .iter()
            .filter(|member| self.is_column(member))
            .map(|member| {
                let documented = self
                    .index
                    .lookup(SymbolKind::Property, &format!("{}.{}", path, member.name))
                    .map(str::to_string);
                let member_name = member.persisted_name().to_string();
                let description = fallback_description(&member_name)
                    .map(str::to_string)
                    .or(documented);
                ColumnDescriptor {
                    member_name,
                    description,
                }
            })
            .collect();

        EntityDocumentation {
            table_description,
            columns,
        }
    }

    /// Scalar, boolean or enum members not excluded from persistence.
    fn is_column(&self, member: &MemberDescriptor) -> bool {
        if member.is_not_mapped() {
            return false;
        }
        matches!(
            self.registry.column_kind(&member.declared_type),
            Some(TypeKind::Primitive | TypeKind::Boolean | TypeKind::Enum)
        )
    }
}
