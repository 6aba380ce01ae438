// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-level handle: database, active configuration and table cache.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::config::DbConfig;
use super::factory::SchemaFactory;
use super::table::SnippetTable;
use crate::db::{Database, Schema};
use crate::errors::{Error, Result};

pub struct DbConnection {
    config: DbConfig,
    schema: Schema,
    db: Database,
    factory: SchemaFactory,
    tables: HashMap<String, Arc<SnippetTable>>,
}

impl DbConnection {
    /// Connect using an existing handle or a uri.
    ///
    /// The handle takes precedence when both are given. Fails with
    /// [`Error::MissingConnection`] when neither is.
    pub fn new(config: DbConfig, db: Option<Database>, uri: Option<&Path>) -> Result<Self> {
        let db = match (db, uri) {
            (Some(db), _) => db,
            (None, Some(uri)) => Database::connect(uri)?,
            (None, None) => return Err(Error::MissingConnection),
        };

        let mut factory = SchemaFactory::new();
        factory.register(&config)?;
        let schema = factory.get_schema(&config)?.clone();

        tracing::debug!(uri = %db.uri().display(), config = %config, "opened snippet connection");
        Ok(Self {
            config,
            schema,
            db,
            factory,
            tables: HashMap::new(),
        })
    }

    pub fn from_uri(config: DbConfig, uri: impl AsRef<Path>) -> Result<Self> {
        Self::new(config, None, Some(uri.as_ref()))
    }

    pub fn from_database(config: DbConfig, db: Database) -> Result<Self> {
        Self::new(config, Some(db), None)
    }

    /// Make `config` the active configuration, registering it if needed.
    pub fn use_config(&mut self, config: DbConfig) -> Result<()> {
        self.factory.register(&config)?;
        self.schema = self.factory.get_schema(&config)?.clone();
        self.config = config;
        Ok(())
    }

    /// Return the session's table called `name`, creating or opening it on
    /// first use.
    ///
    /// `config` must have been registered through construction or
    /// [`use_config`](Self::use_config).
    pub fn get_or_create_table(&mut self, config: &DbConfig, name: &str) -> Result<Arc<SnippetTable>> {
        if let Some(table) = self.tables.get(name) {
            return Ok(Arc::clone(table));
        }

        let schema = self.factory.get_schema(config)?;
        let table = Arc::new(SnippetTable::create_or_open(&self.db, config, schema, name)?);
        self.tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Cache a table built elsewhere. Its config must be registered here.
    pub fn add_table(&mut self, table: Arc<SnippetTable>) -> Result<()> {
        if !self.factory.is_registered(table.config()) {
            return Err(Error::UnregisteredConfig(table.config().to_string()));
        }
        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    /// A table previously created or added in this session.
    pub fn table(&self, name: &str) -> Option<Arc<SnippetTable>> {
        self.tables.get(name).cloned()
    }

    /// All tables in the database, including ones not opened in this session.
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.db.table_names()
    }

    pub fn uri(&self) -> &Path {
        self.db.uri()
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::Language;
    use crate::snippet::Snippet;
    use tempfile::tempdir;

    #[test]
    fn test_requires_handle_or_uri() {
        let config = DbConfig::dummy(8).unwrap();
        assert!(matches!(
            DbConnection::new(config, None, None),
            Err(Error::MissingConnection)
        ));
    }

    #[test]
    fn test_adopts_handle_uri() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let conn = DbConnection::from_database(DbConfig::dummy(8).unwrap(), db.clone()).unwrap();
        assert_eq!(conn.uri(), db.uri());
        assert_eq!(conn.database(), &db);
    }

    #[test]
    fn test_get_or_create_is_cached() {
        let dir = tempdir().unwrap();
        let config = DbConfig::dummy(8).unwrap();
        let mut conn = DbConnection::from_uri(config.clone(), dir.path()).unwrap();

        let first = conn.get_or_create_table(&config, "snippets").unwrap();
        let second = conn.get_or_create_table(&config, "snippets").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(conn.table_names().unwrap(), vec!["snippets"]);
    }

    #[test]
    fn test_get_or_create_opens_existing_table() {
        let dir = tempdir().unwrap();
        let config = DbConfig::dummy(8).unwrap();
        {
            let mut conn = DbConnection::from_uri(config.clone(), dir.path()).unwrap();
            let table = conn.get_or_create_table(&config, "snippets").unwrap();
            table
                .add_snippet(&Snippet::new("print(1)", Language::Py))
                .unwrap();
        }

        let mut conn = DbConnection::from_uri(config.clone(), dir.path()).unwrap();
        let table = conn.get_or_create_table(&config, "snippets").unwrap();
        assert_eq!(table.count_rows().unwrap(), 1);
    }

    #[test]
    fn test_unregistered_config() {
        let dir = tempdir().unwrap();
        let mut conn = DbConnection::from_uri(DbConfig::dummy(8).unwrap(), dir.path()).unwrap();
        let other = DbConfig::dummy(16).unwrap();

        assert!(matches!(
            conn.get_or_create_table(&other, "snippets"),
            Err(Error::UnregisteredConfig(_))
        ));

        let table = Arc::new(SnippetTable::create(conn.database(), &other, "wide", false).unwrap());
        assert!(matches!(
            conn.add_table(Arc::clone(&table)),
            Err(Error::UnregisteredConfig(_))
        ));

        conn.use_config(other.clone()).unwrap();
        assert_eq!(conn.config(), &other);
        assert_eq!(conn.schema().vector_dimension(), 16);
        conn.add_table(Arc::clone(&table)).unwrap();
        assert!(Arc::ptr_eq(&conn.table("wide").unwrap(), &table));
    }
}
