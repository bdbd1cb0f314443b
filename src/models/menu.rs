use serde::{Deserialize, Serialize};

use super::{CategoryId, MenuId};

/// A recommendable menu as read from the catalog store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: MenuId,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Free-text recipe body
    #[serde(default)]
    pub recipe: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// Like counter maintained outside the engine
    #[serde(default)]
    pub popularity: u32,
}

impl CatalogItem {
    pub fn new(id: impl Into<MenuId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
            description: String::new(),
            recipe: String::new(),
            category_id: None,
            popularity: 0,
        }
    }

    pub fn with_recipe(mut self, recipe: impl Into<String>) -> Self {
        self.recipe = recipe.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category_id: impl Into<CategoryId>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn with_popularity(mut self, popularity: u32) -> Self {
        self.popularity = popularity;
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Lowercased recipe and description, the text every matcher runs against
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.recipe, self.description).to_lowercase()
    }
}

/// Read filter for catalog listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    /// Order by popularity, most liked first
    pub by_popularity: bool,
    pub limit: Option<usize>,
}

impl CatalogFilter {
    /// The whole catalog, unordered
    pub fn all() -> Self {
        Self::default()
    }

    pub fn most_popular(limit: usize) -> Self {
        Self {
            by_popularity: true,
            limit: Some(limit),
        }
    }

    /// Applies the filter to an in-memory listing
    pub fn apply(&self, mut items: Vec<CatalogItem>) -> Vec<CatalogItem> {
        if self.by_popularity {
            items.sort_by(|a, b| b.popularity.cmp(&a.popularity).then_with(|| a.id.cmp(&b.id)));
        }
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searchable_text_is_lowercase_recipe_then_description() {
        let item = CatalogItem::new("M1", "Tom Yum")
            .with_recipe("Pork, GINGER")
            .with_description("Spicy Soup");

        assert_eq!(item.searchable_text(), "pork, ginger spicy soup");
    }

    #[test]
    fn test_filter_most_popular_orders_and_truncates() {
        let items = vec![
            CatalogItem::new("a", "A").with_popularity(1),
            CatalogItem::new("b", "B").with_popularity(9),
            CatalogItem::new("c", "C").with_popularity(5),
        ];

        let listed = CatalogFilter::most_popular(2).apply(items);
        let ids: Vec<&str> = listed.iter().map(|i| i.id.as_str()).collect();

        assert_eq!(ids, vec!["b", "c"]);
    }
}
