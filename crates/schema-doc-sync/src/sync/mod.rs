//! Description synchronization engine.
//!
//! A run discovers the entity collections declared on an aggregate type,
//! resolves each entity's documentation, and brings the table and column
//! descriptions in the database into agreement with it. The whole run is one
//! transaction: either every description is written or none is.

pub mod extended_property;
mod session;

pub use extended_property::DescriptionSlot;
pub use session::{Connector, SqlSession};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::docs::DocumentationIndex;
use crate::error::{Result, SyncError};
use crate::identifier::{qualify_mssql, unwrap_table_name, validate_identifier};
use crate::model::{find_generic_instantiation, TypeRef, TypeRegistry};
use crate::mssql::MssqlConnector;
use crate::resolver::{ColumnDescriptor, EntityDocumentationResolver};
use extended_property::Mutation;

/// Default schema holding the described tables.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Default generic definition marking entity collections.
pub const DEFAULT_ENTITY_COLLECTION: &str = "Microsoft.EntityFrameworkCore.DbSet";

/// Run options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Level-0 schema name of every description slot.
    pub schema: String,
    /// Generic definition whose instantiations are entity collections.
    pub entity_collection: TypeRef,
}

impl SyncOptions {
    /// Defaults: schema `dbo`, entity collection `DbSet<TEntity>`.
    pub fn new(registry: &TypeRegistry) -> Result<Self> {
        Ok(Self {
            schema: DEFAULT_SCHEMA.to_string(),
            entity_collection: registry.resolve(DEFAULT_ENTITY_COLLECTION)?,
        })
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }
}

/// Resolved documentation of one entity, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub entity: TypeRef,
    /// Display name of the entity type.
    pub entity_name: String,
    pub table_name: String,
    pub table_description: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
}

/// What happened to one description slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotOutcome {
    Added,
    Updated,
    Unchanged,
}

/// Per-table counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub entity: String,
    pub table: String,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl TableReport {
    fn record(&mut self, outcome: SlotOutcome) {
        match outcome {
            SlotOutcome::Added => self.added += 1,
            SlotOutcome::Updated => self.updated += 1,
            SlotOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Result of a committed run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Aggregate type that was synchronized.
    pub aggregate: String,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// One entry per entity collection, in declaration order.
    pub tables: Vec<TableReport>,

    pub descriptions_added: usize,

    pub descriptions_updated: usize,

    pub descriptions_unchanged: usize,
}

impl SyncReport {
    /// Descriptions that required a write.
    pub fn descriptions_written(&self) -> usize {
        self.descriptions_added + self.descriptions_updated
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Table identifier for an entity: the table-name override when present,
/// otherwise the type's simple name, with `[schema].[table]` unwrapped.
pub fn table_name(registry: &TypeRegistry, entity: &TypeRef) -> Option<String> {
    let descriptor = registry.descriptor(entity.definition()?);
    let name = descriptor
        .table_name_override()
        .unwrap_or_else(|| descriptor.name());
    Some(unwrap_table_name(name).to_string())
}

/// Synchronizes documentation of an aggregate's entities into the database.
pub struct SchemaSyncEngine {
    connector: Box<dyn Connector>,
    registry: Arc<TypeRegistry>,
    index: Arc<DocumentationIndex>,
    options: SyncOptions,
}

impl SchemaSyncEngine {
    pub fn new(
        connector: impl Connector + 'static,
        registry: Arc<TypeRegistry>,
        index: Arc<DocumentationIndex>,
        options: SyncOptions,
    ) -> Self {
        Self {
            connector: Box::new(connector),
            registry,
            index,
            options,
        }
    }

    /// Build an engine against SQL Server from a configuration.
    ///
    /// Loads the documentation corpus (explicit path or the one next to the
    /// executable) before any database interaction.
    pub fn from_config(config: &Config, registry: Arc<TypeRegistry>) -> Result<Self> {
        let index = match &config.documentation.path {
            Some(path) => DocumentationIndex::load(path)?,
            None => DocumentationIndex::embedded()?,
        };
        let options = SyncOptions {
            schema: config.target.schema.clone(),
            entity_collection: registry.resolve(&config.sync.entity_collection)?,
        };
        info!(
            "Prepared description sync (config {})",
            &config.hash()[..12]
        );

        Ok(Self::new(
            MssqlConnector::new(config.target.clone()),
            registry,
            Arc::new(index),
            options,
        ))
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn index(&self) -> &DocumentationIndex {
        &self.index
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Element types of the aggregate's public entity-collection properties,
    /// in declaration order.
    pub fn entity_types(&self, aggregate: &TypeRef) -> Vec<TypeRef> {
        let mut entities = Vec::new();
        for property in self.registry.readable_instance_properties(aggregate) {
            debug!("Inspecting {}", property.name);
            let Some(collection) = find_generic_instantiation(
                &self.registry,
                &property.declared_type,
                &self.options.entity_collection,
            ) else {
                continue;
            };
            match collection.arguments().first() {
                Some(entity) => entities.push(entity.clone()),
                None => warn!(
                    "Skipping {}: {} has no element type",
                    property.name,
                    self.registry.display(&collection)
                ),
            }
        }
        entities
    }

    /// Resolve table name and documentation for one entity.
    pub fn describe(&self, entity: &TypeRef) -> Result<EntityDescriptor> {
        let entity_name = self.registry.display(entity);
        let table_name = table_name(&self.registry, entity).ok_or_else(|| {
            SyncError::Model(format!("{} is not a concrete entity type", entity_name))
        })?;
        let docs = EntityDocumentationResolver::new(&self.registry, &self.index).resolve(entity);

        Ok(EntityDescriptor {
            entity: entity.clone(),
            entity_name,
            table_name,
            table_description: docs.table_description,
            columns: docs.columns,
        })
    }

    /// Synchronize all entity descriptions of `aggregate` in one transaction.
    ///
    /// Any failure rolls back every description written by this run and is
    /// returned as [`SyncError::SyncFailed`]. The connection is closed on
    /// every path.
    pub async fn sync(&self, aggregate: &TypeRef) -> Result<SyncReport> {
        let aggregate_name = self.registry.display(aggregate);
        let started_at = Utc::now();
        let timer = Instant::now();
        info!("Synchronizing descriptions for {}", aggregate_name);

        let mut session = self
            .connector
            .open()
            .await
            .map_err(|e| SyncError::sync_failed(&aggregate_name, e))?;

        let outcome = self.run_transaction(session.as_mut(), aggregate).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close connection: {}", e);
        }

        let tables = outcome.map_err(|e| SyncError::sync_failed(&aggregate_name, e))?;

        let report = SyncReport {
            aggregate: aggregate_name,
            started_at,
            completed_at: Utc::now(),
            duration_seconds: timer.elapsed().as_secs_f64(),
            descriptions_added: tables.iter().map(|t| t.added).sum(),
            descriptions_updated: tables.iter().map(|t| t.updated).sum(),
            descriptions_unchanged: tables.iter().map(|t| t.unchanged).sum(),
            tables,
        };

        info!(
            "Description sync completed for {}: {} tables, {} added, {} updated, {} unchanged ({:.2}s)",
            report.aggregate,
            report.tables.len(),
            report.descriptions_added,
            report.descriptions_updated,
            report.descriptions_unchanged,
            report.duration_seconds
        );

        Ok(report)
    }

    async fn run_transaction(
        &self,
        session: &mut dyn SqlSession,
        aggregate: &TypeRef,
    ) -> Result<Vec<TableReport>> {
        session.begin_transaction().await?;

        let outcome = match self.apply(session, aggregate).await {
            Ok(tables) => session.commit().await.map(|()| tables),
            Err(e) => Err(e),
        };

        // A failed COMMIT may leave the transaction open
        if let Err(e) = &outcome {
            warn!("Rolling back description sync: {}", e);
            if let Err(rollback) = session.rollback().await {
                warn!("Rollback failed: {}", rollback);
            }
        }
        outcome
    }

    async fn apply(
        &self,
        session: &mut dyn SqlSession,
        aggregate: &TypeRef,
    ) -> Result<Vec<TableReport>> {
        let mut tables = Vec::new();

        for entity in self.entity_types(aggregate) {
            let descriptor = self.describe(&entity)?;
            validate_identifier(&descriptor.table_name)?;

            let mut report = TableReport {
                entity: descriptor.entity_name.clone(),
                table: descriptor.table_name.clone(),
                ..TableReport::default()
            };

            if let Some(description) = descriptor
                .table_description
                .as_deref()
                .filter(|d| !d.is_empty())
            {
                let slot = DescriptionSlot::table(&self.options.schema, &descriptor.table_name);
                report.record(upsert_description(session, &slot, description).await?);
            }

            for column in &descriptor.columns {
                let Some(description) = column.writable_description() else {
                    continue;
                };
                validate_identifier(&column.member_name)?;
                let slot = DescriptionSlot::column(
                    &self.options.schema,
                    &descriptor.table_name,
                    &column.member_name,
                );
                report.record(upsert_description(session, &slot, description).await?);
            }

            info!(
                "{} -> {}: {} added, {} updated, {} unchanged",
                report.entity,
                qualify_mssql(&self.options.schema, &report.table)?,
                report.added,
                report.updated,
                report.unchanged
            );
            tables.push(report);
        }

        Ok(tables)
    }
}

/// Bring one description slot to `description`.
///
/// Reads the current value first because the add and update procedures each
/// fail when the property is respectively present or absent.
pub async fn upsert_description(
    session: &mut dyn SqlSession,
    slot: &DescriptionSlot,
    description: &str,
) -> Result<SlotOutcome> {
    let lookup = extended_property::lookup(slot);
    let current = session.query_scalar(&lookup.sql, &lookup.params()).await?;

    let mutation = match current.as_deref() {
        Some(existing) if existing == description => {
            debug!("{} already up to date", slot);
            return Ok(SlotOutcome::Unchanged);
        }
        Some(existing) if !existing.is_empty() => Mutation::Update,
        _ => Mutation::Add,
    };

    let statement = extended_property::mutate(mutation, slot, description);
    session.execute(&statement.sql, &statement.params()).await?;
    debug!("{} {}", mutation.procedure(), slot);

    Ok(match mutation {
        Mutation::Add => SlotOutcome::Added,
        Mutation::Update => SlotOutcome::Updated,
    })
}
