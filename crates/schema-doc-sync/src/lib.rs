//! # schema-doc-sync
//!
//! Propagates the XML documentation comments of a .NET data model into SQL
//! Server `MS_Description` extended properties, so that every mapped table
//! and column carries the same description as the entity and property it
//! was generated from.
//!
//! ## Pipeline
//!
//! 1. A [`TypeRegistry`] describes the data model: the aggregate type, the
//!    entity collections it declares and the entities' properties.
//! 2. A [`DocumentationIndex`] loads the compiler-generated documentation
//!    corpus.
//! 3. [`SchemaSyncEngine::sync`] discovers every entity reachable from the
//!    aggregate, resolves table and column descriptions, and writes them in
//!    one transaction.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use schema_doc_sync::{Config, SchemaSyncEngine, TypeRegistry};
//!
//! #[tokio::main]
//! async fn main() -> schema_doc_sync::Result<()> {
//!     let config = Config::load("sync.yaml")?;
//!     let registry = Arc::new(TypeRegistry::load("model.yaml")?);
//!     let aggregate = registry.resolve("Shop.ShopContext")?;
//!
//!     let engine = SchemaSyncEngine::from_config(&config, registry)?;
//!     let report = engine.sync(&aggregate).await?;
//!     println!("{}", report.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod docs;
pub mod error;
pub mod identifier;
pub mod model;
pub mod mssql;
pub mod resolver;
pub mod sync;

pub use config::Config;
pub use docs::{DocumentationIndex, SymbolKind};
pub use error::{Result, SyncError};
pub use model::{
    find_generic_instantiation, inherits_or_implements_generic, TypeKind, TypeRef, TypeRegistry,
};
pub use mssql::MssqlConnector;
pub use resolver::{ColumnDescriptor, EntityDocumentation, EntityDocumentationResolver};
pub use sync::{
    Connector, DescriptionSlot, EntityDescriptor, SchemaSyncEngine, SlotOutcome, SqlSession,
    SyncOptions, SyncReport, TableReport,
};
