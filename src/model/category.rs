//! Annotation categories.
//!
//! A case has a fixed, ordered set of categories. The first one is the
//! reference region; every later category is measured as a percentage of
//! the reference area.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a category in its case's ordered category set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub usize);

impl CategoryId {
    /// The reference category.
    pub const REFERENCE: CategoryId = CategoryId(0);

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_reference(self) -> bool {
        self == Self::REFERENCE
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An annotation category with a name and display color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name, also used in export file names
    pub name: String,
    /// RGB color for overlays
    pub color: [u8; 3],
}

impl Category {
    /// Create a new category with the given name and color.
    pub fn new(name: &str, color: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            color,
        }
    }
}

/// Default categories for new cases.
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new("papilla", [0, 128, 0]),
        Category::new("fibrosis", [31, 102, 180]),
        Category::new("hyalinized", [255, 165, 0]),
        Category::new("mineralized", [128, 0, 128]),
    ]
}

/// Ordered category set; index 0 is the reference category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySet {
    categories: Vec<Category>,
}

impl CategorySet {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(id.0)
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        id.0 < self.categories.len()
    }

    /// Look up a category by name (case-sensitive).
    pub fn id_of(&self, name: &str) -> Option<CategoryId> {
        self.categories
            .iter()
            .position(|c| c.name == name)
            .map(CategoryId)
    }

    pub fn reference(&self) -> Option<&Category> {
        self.categories.first()
    }

    /// All category ids in order.
    pub fn ids(&self) -> impl Iterator<Item = CategoryId> + '_ {
        (0..self.categories.len()).map(CategoryId)
    }

    /// Ids of every category except the reference.
    pub fn measured_ids(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.ids().skip(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &Category)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(i, c)| (CategoryId(i), c))
    }

    /// Name of a category, or its id when out of range.
    pub fn name(&self, id: CategoryId) -> String {
        self.get(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::new(default_categories())
    }
}
