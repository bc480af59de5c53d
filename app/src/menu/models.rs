use serde::{Deserialize, Serialize};

use infra::documents::{DocMeta, HasMeta};
use infra::ids::{Entity, Id};

/// A drink on the menu. The recipe is kept as JSON text inside the
/// stored document.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Drink {
    #[serde(flatten)]
    pub(super) meta: DocMeta<Drink>,
    pub(super) title: String,
    #[serde(with = "recipe_text")]
    pub(super) recipe: Vec<Ingredient>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub parts: u32,
}

/// How much of each drink a listing shows.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    /// Ingredient names and colours only.
    Short,
    /// Everything, including how many parts of each ingredient.
    Long,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum DrinkView<'a> {
    Short {
        id: Id<Drink>,
        title: &'a str,
        recipe: Vec<ShortIngredient<'a>>,
    },
    Long {
        id: Id<Drink>,
        title: &'a str,
        recipe: &'a [Ingredient],
    },
}

#[derive(Serialize, Debug)]
pub struct ShortIngredient<'a> {
    name: &'a str,
    color: &'a str,
}

/// A create or update request body. Fields left out are `None`.
#[derive(Deserialize, Debug, Default)]
pub struct DrinkPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<RecipeInput>,
}

/// Clients send either a single ingredient or a list of them.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RecipeInput {
    One(Ingredient),
    Many(Vec<Ingredient>),
}

mod recipe_text {
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Ingredient;

    pub fn serialize<S: Serializer>(recipe: &[Ingredient], ser: S) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(recipe).map_err(S::Error::custom)?;
        ser.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<Ingredient>, D::Error> {
        let text = String::deserialize(de)?;
        serde_json::from_str(&text).map_err(D::Error::custom)
    }
}

impl Drink {
    pub fn new(id: Id<Drink>, title: &str, recipe: Vec<Ingredient>) -> Self {
        let meta = DocMeta::new_with_id(id);
        let title = title.to_string();
        Drink {
            meta,
            title,
            recipe,
        }
    }

    /// The drink every fresh menu starts with.
    pub fn water() -> Self {
        let recipe = vec![Ingredient::new("water", "blue", 1)];
        Drink::new(Id::hashed("water"), "water", recipe)
    }

    pub fn id(&self) -> Id<Drink> {
        self.meta.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn recipe(&self) -> &[Ingredient] {
        &self.recipe
    }

    pub fn view(&self, projection: Projection) -> DrinkView<'_> {
        match projection {
            Projection::Short => self.short(),
            Projection::Long => self.long(),
        }
    }

    pub fn short(&self) -> DrinkView<'_> {
        let recipe = self
            .recipe
            .iter()
            .map(|i| ShortIngredient {
                name: &i.name,
                color: &i.color,
            })
            .collect();
        DrinkView::Short {
            id: self.meta.id,
            title: &self.title,
            recipe,
        }
    }

    pub fn long(&self) -> DrinkView<'_> {
        DrinkView::Long {
            id: self.meta.id,
            title: &self.title,
            recipe: &self.recipe,
        }
    }

    /// Overwrites whichever fields the payload carries.
    pub fn apply(&mut self, payload: DrinkPayload) {
        if let Some(title) = payload.title {
            self.title = title;
        }
        if let Some(recipe) = payload.recipe {
            self.recipe = recipe.into();
        }
    }
}

impl Ingredient {
    pub fn new(name: &str, color: &str, parts: u32) -> Self {
        Ingredient {
            name: name.to_string(),
            color: color.to_string(),
            parts,
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Short
    }
}

impl DrinkPayload {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.recipe.is_none()
    }
}

impl From<RecipeInput> for Vec<Ingredient> {
    fn from(input: RecipeInput) -> Self {
        match input {
            RecipeInput::One(ingredient) => vec![ingredient],
            RecipeInput::Many(ingredients) => ingredients,
        }
    }
}

impl Entity for Drink {
    const PREFIX: &'static str = "drink";
}

impl HasMeta for Drink {
    fn meta(&self) -> &DocMeta<Self> {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut DocMeta<Self> {
        &mut self.meta
    }
}
