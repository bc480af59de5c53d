//! A process-local document store with the same semantics as the
//! PostgreSQL one. Every pooled connection shares the same map.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use err_derive::Error;
use log::*;
use serde::{de::DeserializeOwned, Serialize};

use crate::documents::HasMeta;
use crate::ids::{Entity, Id};
use crate::persistence::{Storage, WriteError};

#[derive(Debug, Error)]
#[error(display = "memory store lock poisoned")]
pub struct Poisoned;

#[derive(Debug, Clone, Default)]
pub struct MemoryDocuments {
    docs: Arc<Mutex<BTreeMap<String, serde_json::Value>>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnectionManager {
    store: MemoryDocuments,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        MemoryDocuments::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, serde_json::Value>>, Poisoned> {
        self.docs.lock().map_err(|_| Poisoned)
    }
}

impl Storage for MemoryDocuments {
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn load<D: DeserializeOwned + Entity>(&mut self, id: &Id<D>) -> Result<Option<D>> {
        let json = self.lock()?.get(&id.to_string()).cloned();
        match json {
            Some(json) => Ok(Some(serde_json::from_value(json)?)),
            None => Ok(None),
        }
    }

    fn load_all<D: DeserializeOwned + Entity>(&mut self) -> Result<Vec<D>> {
        let prefix = format!("{}-", D::PREFIX);
        let bodies = self
            .lock()?
            .iter()
            .filter(|(id, _)| id.starts_with(&prefix))
            .map(|(_, body)| body.clone())
            .collect::<Vec<_>>();
        trace!("Loaded {} {} documents", bodies.len(), D::PREFIX);

        let docs = bodies
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<D>, _>>()?;
        Ok(docs)
    }

    fn create<D: Serialize + HasMeta>(&mut self, document: &D) -> Result<()> {
        let id = document.meta().id.to_string();
        let json = serde_json::to_value(document)?;
        let mut docs = self.lock()?;
        if docs.contains_key(&id) {
            return Err(WriteError::AlreadyExists(id).into());
        }
        docs.insert(id, json);
        Ok(())
    }

    fn save<D: Serialize + HasMeta>(&mut self, document: &D) -> Result<()> {
        let id = document.meta().id.to_string();
        let json = serde_json::to_value(document)?;
        match self.lock()?.get_mut(&id) {
            Some(body) => {
                *body = json;
                Ok(())
            }
            None => Err(WriteError::Missing(id).into()),
        }
    }

    fn remove<D: Entity>(&mut self, id: &Id<D>) -> Result<bool> {
        Ok(self.lock()?.remove(&id.to_string()).is_some())
    }
}

impl MemoryConnectionManager {
    pub fn new(store: MemoryDocuments) -> Self {
        MemoryConnectionManager { store }
    }
}

impl r2d2::ManageConnection for MemoryConnectionManager {
    type Connection = MemoryDocuments;
    type Error = Poisoned;

    fn connect(&self) -> Result<MemoryDocuments, Poisoned> {
        Ok(self.store.clone())
    }

    fn is_valid(&self, conn: &mut MemoryDocuments) -> Result<(), Poisoned> {
        conn.lock().map(|_| ())
    }

    fn has_broken(&self, _: &mut MemoryDocuments) -> bool {
        false
    }
}
