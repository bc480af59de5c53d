use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::ids::{Entity, Id};

/// Bookkeeping fields stored alongside every document body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(bound = "T: Entity")]
pub struct DocMeta<T> {
    #[serde(rename = "_id")]
    pub id: Id<T>,
    #[serde(skip)]
    pub _phantom: PhantomData<T>,
}

pub trait HasMeta: Entity + Sized {
    fn meta(&self) -> &DocMeta<Self>;
    fn meta_mut(&mut self) -> &mut DocMeta<Self>;
}

impl<T> Default for DocMeta<T> {
    fn default() -> Self {
        let id = Default::default();
        let _phantom = Default::default();
        DocMeta { id, _phantom }
    }
}

impl<T> DocMeta<T> {
    pub fn new_with_id(id: Id<T>) -> Self {
        DocMeta {
            id,
            ..Default::default()
        }
    }
}
