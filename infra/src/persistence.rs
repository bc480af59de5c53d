use anyhow::{Context, Result};
use err_derive::Error;
use fallible_iterator::FallibleIterator;
use log::*;
use postgres::{Client, NoTls};
use r2d2::ManageConnection;
use r2d2_postgres::PostgresConnectionManager;
use serde::{de::DeserializeOwned, Serialize};

use crate::documents::HasMeta;
use crate::ids::{Entity, Id};

/// Raised when a write does not find the document in the state it expects.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WriteError {
    #[error(display = "document {} already exists", _0)]
    AlreadyExists(String),
    #[error(display = "document {} does not exist", _0)]
    Missing(String),
}

/// A document store. Each write is a single atomic statement.
pub trait Storage {
    fn setup(&mut self) -> Result<()>;
    /// Drops every stored document and recreates the schema.
    fn reset(&mut self) -> Result<()>;
    fn load<D: DeserializeOwned + Entity>(&mut self, id: &Id<D>) -> Result<Option<D>>;
    /// Every document of one entity type, ordered by id.
    fn load_all<D: DeserializeOwned + Entity>(&mut self) -> Result<Vec<D>>;
    fn create<D: Serialize + HasMeta>(&mut self, document: &D) -> Result<()>;
    fn save<D: Serialize + HasMeta>(&mut self, document: &D) -> Result<()>;
    /// Returns whether a document was actually removed.
    fn remove<D: Entity>(&mut self, id: &Id<D>) -> Result<bool>;
}

pub struct Documents {
    client: Client,
}

#[derive(Debug)]
pub struct DocumentConnectionManager {
    inner: PostgresConnectionManager<NoTls>,
}

const SETUP_SQL: &str = include_str!("persistence.sql");
const RESET_SQL: &str = "DROP TABLE IF EXISTS documents";
const LOAD_SQL: &str = "SELECT body FROM documents WHERE id = $1";
const LOAD_ALL_SQL: &str =
    "SELECT body FROM documents WHERE left(id, char_length($1)) = $1 ORDER BY id";
const INSERT_SQL: &str =
    "INSERT INTO documents (id, body) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING";
const SAVE_SQL: &str = "UPDATE documents SET body = $2 WHERE id = $1";
const DELETE_SQL: &str = "DELETE FROM documents WHERE id = $1";

fn entity_prefix<D: Entity>() -> String {
    format!("{}-", D::PREFIX)
}

impl Documents {
    pub fn wrap(client: Client) -> Self {
        Documents { client }
    }

    pub fn get_ref(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl Storage for Documents {
    fn setup(&mut self) -> Result<()> {
        self.client.batch_execute(SETUP_SQL).context("create schema")?;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let mut t = self.client.transaction()?;
        t.batch_execute(RESET_SQL).context("drop documents")?;
        t.batch_execute(SETUP_SQL).context("create schema")?;
        t.commit()?;
        Ok(())
    }

    fn load<D: DeserializeOwned + Entity>(&mut self, id: &Id<D>) -> Result<Option<D>> {
        let res = self.client.query_opt(LOAD_SQL, &[&id.to_string()])?;

        if let Some(row) = res {
            let json: serde_json::Value = row.try_get(0)?;
            let doc = serde_json::from_value(json).with_context(|| format!("decode {}", id))?;
            Ok(Some(doc))
        } else {
            Ok(None)
        }
    }

    fn load_all<D: DeserializeOwned + Entity>(&mut self) -> Result<Vec<D>> {
        let prefix = entity_prefix::<D>();
        let bodies: Vec<serde_json::Value> = self
            .client
            .query_raw(LOAD_ALL_SQL, std::iter::once(prefix))?
            .map(|row| row.try_get::<_, serde_json::Value>(0))
            .collect()?;
        debug!("Loaded {} {} documents", bodies.len(), D::PREFIX);

        let docs = bodies
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<D>, _>>()
            .with_context(|| format!("decode {} documents", D::PREFIX))?;
        Ok(docs)
    }

    fn create<D: Serialize + HasMeta>(&mut self, document: &D) -> Result<()> {
        let id = document.meta().id.to_string();
        let json = serde_json::to_value(document)?;
        let nrows = self.client.execute(INSERT_SQL, &[&id, &json])?;
        debug!("Insert modified {} rows", nrows);
        if nrows != 1 {
            warn!("Insert of {} impacted {} rows not 1", id, nrows);
            return Err(WriteError::AlreadyExists(id).into());
        }
        Ok(())
    }

    fn save<D: Serialize + HasMeta>(&mut self, document: &D) -> Result<()> {
        let id = document.meta().id.to_string();
        let json = serde_json::to_value(document)?;
        let nrows = self.client.execute(SAVE_SQL, &[&id, &json])?;
        debug!("Update modified {} rows", nrows);
        if nrows != 1 {
            warn!("Update of {} impacted {} rows not 1", id, nrows);
            return Err(WriteError::Missing(id).into());
        }
        Ok(())
    }

    fn remove<D: Entity>(&mut self, id: &Id<D>) -> Result<bool> {
        let nrows = self.client.execute(DELETE_SQL, &[&id.to_string()])?;
        debug!("Delete of {} modified {} rows", id, nrows);
        Ok(nrows == 1)
    }
}

impl DocumentConnectionManager {
    pub fn new(inner: PostgresConnectionManager<NoTls>) -> Self {
        DocumentConnectionManager { inner }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let config = url.parse::<postgres::Config>().context("parse postgres url")?;
        Ok(Self::new(PostgresConnectionManager::new(config, NoTls)))
    }
}

impl ManageConnection for DocumentConnectionManager {
    type Connection = Documents;
    type Error = postgres::Error;

    fn connect(&self) -> Result<Documents, postgres::Error> {
        self.inner.connect().map(Documents::wrap)
    }

    fn is_valid(&self, conn: &mut Documents) -> Result<(), postgres::Error> {
        self.inner.is_valid(&mut conn.client)
    }

    fn has_broken(&self, conn: &mut Documents) -> bool {
        self.inner.has_broken(&mut conn.client)
    }
}
