use anyhow::{Context, Result};
use log::*;

use infra::ids::{Id, IdGen};
use infra::persistence::Storage;

use super::models::{Drink, Ingredient};
use crate::error::PersistenceError;

/// Drink records over any document store.
///
/// Reads fail with plain errors, which surface as internal errors. Writes
/// fail with [`PersistenceError`], which the API reports as unprocessable.
pub trait DrinkRepository {
    /// Every drink, ordered by id.
    fn list_all(&mut self) -> Result<Vec<Drink>>;
    fn find_by_id(&mut self, id: &Id<Drink>) -> Result<Option<Drink>>;
    fn insert(
        &mut self,
        idgen: &IdGen,
        title: &str,
        recipe: Vec<Ingredient>,
    ) -> Result<Drink, PersistenceError>;
    fn update(&mut self, drink: &Drink) -> Result<(), PersistenceError>;
    /// `false` when there was nothing to delete.
    fn delete(&mut self, id: &Id<Drink>) -> Result<bool, PersistenceError>;
    /// Empties the store and seeds it with [`Drink::water`].
    fn reset_menu(&mut self) -> Result<Drink>;
}

impl<S: Storage> DrinkRepository for S {
    fn list_all(&mut self) -> Result<Vec<Drink>> {
        let drinks = self.load_all::<Drink>().context("load drinks")?;
        trace!("Listed {} drinks", drinks.len());
        Ok(drinks)
    }

    fn find_by_id(&mut self, id: &Id<Drink>) -> Result<Option<Drink>> {
        let drink = self.load(id).with_context(|| format!("load {}", id))?;
        debug!("Load {} -> {:?}", id, drink);
        Ok(drink)
    }

    fn insert(
        &mut self,
        idgen: &IdGen,
        title: &str,
        recipe: Vec<Ingredient>,
    ) -> Result<Drink, PersistenceError> {
        let drink = Drink::new(idgen.generate(), title, recipe);
        self.create(&drink)
            .with_context(|| format!("insert {}", drink.id()))?;
        info!("Added {} ({:?})", drink.id(), drink.title());
        Ok(drink)
    }

    fn update(&mut self, drink: &Drink) -> Result<(), PersistenceError> {
        self.save(drink)
            .with_context(|| format!("update {}", drink.id()))?;
        info!("Updated {} ({:?})", drink.id(), drink.title());
        Ok(())
    }

    fn delete(&mut self, id: &Id<Drink>) -> Result<bool, PersistenceError> {
        let removed = self.remove(id).with_context(|| format!("delete {}", id))?;
        info!("Delete {}: removed: {}", id, removed);
        Ok(removed)
    }

    fn reset_menu(&mut self) -> Result<Drink> {
        self.reset().context("reset documents")?;
        let water = Drink::water();
        self.create(&water).context("seed water")?;
        Ok(water)
    }
}
