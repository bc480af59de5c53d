mod models;
mod resources;
mod store;

pub use self::models::{Drink, DrinkPayload, DrinkView, Ingredient, Projection, RecipeInput};
pub use self::resources::Menu;
pub use self::store::DrinkRepository;
