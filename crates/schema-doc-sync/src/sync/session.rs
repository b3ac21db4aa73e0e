//! Database capabilities consumed by the sync engine.
//!
//! The engine works with `Box<dyn SqlSession>` obtained from a [`Connector`]
//! and never knows the concrete driver. [`crate::mssql::MssqlConnector`] is
//! the SQL Server implementation; tests plug in recording fakes.

use async_trait::async_trait;

use crate::error::Result;

/// Opens database sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection.
    async fn open(&self) -> Result<Box<dyn SqlSession>>;
}

/// One open database connection.
///
/// Statements are issued strictly one at a time. Parameters are bound
/// positionally as `@P1..@Pn`.
#[async_trait]
pub trait SqlSession: Send {
    async fn begin_transaction(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Execute a statement that returns no rows.
    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64>;

    /// Execute a query and return the first column of the first row as text.
    async fn query_scalar(&mut self, sql: &str, params: &[&str]) -> Result<Option<String>>;

    /// Release the connection. Further calls fail.
    async fn close(&mut self) -> Result<()>;
}
