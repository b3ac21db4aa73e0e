//! SQL Server session backed by tiberius.
//!
//! One connection per run; no pooling. Transaction control goes through
//! `simple_query` as a plain batch, since issuing `BEGIN TRANSACTION` through
//! `sp_executesql` trips "Transaction count mismatch" (error 266).

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::TargetConfig;
use crate::error::{Result, SyncError};
use crate::sync::{Connector, SqlSession};

type MssqlClient = Client<Compat<TcpStream>>;

/// Opens tiberius connections to the configured SQL Server database.
#[derive(Debug, Clone)]
pub struct MssqlConnector {
    config: TargetConfig,
}

impl MssqlConnector {
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        if self.config.encryption_enabled() {
            if self.config.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config
    }
}

#[async_trait]
impl Connector for MssqlConnector {
    async fn open(&self) -> Result<Box<dyn SqlSession>> {
        let config = self.build_config();
        let addr = config.get_addr();

        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|e| SyncError::Connection(format!("{}: {}", addr, e)))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| SyncError::Connection(format!("{}: {}", addr, e)))?;

        info!(
            "Connected to MSSQL: {}:{}/{}",
            self.config.host, self.config.port, self.config.database
        );

        Ok(Box::new(MssqlSession {
            client: Some(client),
        }))
    }
}

/// An open SQL Server connection.
pub struct MssqlSession {
    client: Option<MssqlClient>,
}

impl MssqlSession {
    fn client(&mut self) -> Result<&mut MssqlClient> {
        self.client
            .as_mut()
            .ok_or_else(|| SyncError::Connection("connection already closed".into()))
    }

    async fn batch(&mut self, sql: &str) -> Result<()> {
        let client = self.client()?;
        let stream = client
            .simple_query(sql)
            .await
            .map_err(|e| SyncError::Transaction(format!("{}: {}", sql, e)))?;
        stream
            .into_results()
            .await
            .map_err(|e| SyncError::Transaction(format!("{}: {}", sql, e)))?;
        debug!("{}", sql);
        Ok(())
    }
}

fn bind<'a>(params: &'a [&'a str]) -> Vec<&'a dyn ToSql> {
    params.iter().map(|p| p as &dyn ToSql).collect()
}

#[async_trait]
impl SqlSession for MssqlSession {
    async fn begin_transaction(&mut self) -> Result<()> {
        self.batch("BEGIN TRANSACTION").await
    }

    async fn commit(&mut self) -> Result<()> {
        self.batch("COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.batch("ROLLBACK TRANSACTION").await
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64> {
        let client = self.client()?;
        let result = client
            .execute(sql, &bind(params))
            .await
            .map_err(|e| SyncError::sql(sql, e))?;
        Ok(result.total())
    }

    async fn query_scalar(&mut self, sql: &str, params: &[&str]) -> Result<Option<String>> {
        let client = self.client()?;
        let stream = client
            .query(sql, &bind(params))
            .await
            .map_err(|e| SyncError::sql(sql, e))?;
        let Some(row) = stream.into_row().await.map_err(|e| SyncError::sql(sql, e))? else {
            return Ok(None);
        };
        let value: Option<&str> = row.try_get(0).map_err(|e| SyncError::sql(sql, e))?;
        Ok(value.map(str::to_string))
    }

    async fn close(&mut self) -> Result<()> {
        match self.client.take() {
            Some(client) => client
                .close()
                .await
                .map_err(|e| SyncError::Connection(format!("close: {}", e))),
            None => Ok(()),
        }
    }
}
