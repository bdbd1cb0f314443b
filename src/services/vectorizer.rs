use std::collections::BTreeSet;

use crate::models::{BehaviorSnapshot, CatalogItem, CategoryId};

/// Thai ingredient tokens tracked when no vocabulary is configured
#[rustfmt::skip]
const DEFAULT_INGREDIENTS: &[&str] = &[
    "หมู", "ไก่", "เนื้อ", "ปลา", "กุ้ง", "หอย", "ปู", "ไข่",
    "ผัก", "ผักกาด", "ผักชี", "กะหล่ำปลี", "มะเขือเทศ", "แครอท", "หัวหอม", "กระเทียม",
    "พริก", "พริกไทย", "ขิง", "ข่า", "ตะไคร้", "ใบมะกรูด",
    "น้ำตาล", "เกลือ", "น้ำปลา", "ซีอิ๊ว", "น้ำมันหอย",
    "ข้าว", "เส้น", "เส้นหมี่", "เส้นใหญ่", "วุ้นเส้น",
    "มะนาว", "มะเขือ", "ถั่ว", "เต้าหู้", "เห็ด",
    "กะทิ", "หอม", "พริกชี้ฟ้า", "พริกขี้หนู",
    "ใบกะเพรา", "ใบโหระพา", "ผักบุ้ง", "คะน้า", "บร็อคโคลี",
];

/// Preference scores live roughly in [-10, 10]
const PREFERENCE_RANGE: f64 = 10.0;
const POPULARITY_SCALE: f64 = 100.0;
const ENGAGEMENT_SCALE: f64 = 50.0;

/// Ordered set of ingredient tokens the vectors track
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    tokens: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_INGREDIENTS.iter().copied())
    }
}

impl Vocabulary {
    /// Builds a vocabulary, dropping blanks and later duplicates (case-insensitive)
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let tokens = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
            .collect();
        Self { tokens }
    }

    /// Parses a comma separated token list
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens found in already-lowercased text, in vocabulary order
    pub fn tokens_in<'a>(&'a self, lowercase_text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tokens
            .iter()
            .filter(move |t| lowercase_text.contains(&t.to_lowercase()))
            .map(String::as_str)
    }
}

/// Numeric encoding of an item or a user.
///
/// Layout: one slot per vocabulary token, one slot per catalog category, then a
/// single trailing scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Shared dimensions for one ranking pass.
///
/// Item and user vectors are only comparable when built from the same space.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpace {
    pub ingredients: Vocabulary,
    pub categories: Vec<CategoryId>,
}

impl FeatureSpace {
    /// Takes the distinct non-null categories of the catalog, sorted by id
    pub fn from_catalog(vocabulary: &Vocabulary, catalog: &[CatalogItem]) -> Self {
        let categories: BTreeSet<CategoryId> = catalog
            .iter()
            .filter_map(|item| item.category_id.clone())
            .collect();

        Self {
            ingredients: vocabulary.clone(),
            categories: categories.into_iter().collect(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.ingredients.len() + self.categories.len() + 1
    }
}

pub fn build_item_vector(item: &CatalogItem, space: &FeatureSpace) -> FeatureVector {
    let text = item.searchable_text();
    let mut values = Vec::with_capacity(space.dimension());

    for token in space.ingredients.tokens() {
        values.push(if text.contains(&token.to_lowercase()) { 1.0 } else { 0.0 });
    }

    for category in &space.categories {
        values.push(if item.category_id.as_ref() == Some(category) { 1.0 } else { 0.0 });
    }

    values.push((item.popularity as f64 / POPULARITY_SCALE).min(1.0));

    FeatureVector(values)
}

pub fn build_user_vector(snapshot: &BehaviorSnapshot, space: &FeatureSpace) -> FeatureVector {
    let mut values = Vec::with_capacity(space.dimension());

    for token in space.ingredients.tokens() {
        values.push(rescale_preference(snapshot.ingredient_score(token).unwrap_or(0.0)));
    }

    for category in &space.categories {
        let score = snapshot
            .category_preference(category)
            .map(|p| p.score)
            .unwrap_or(0.0);
        values.push(rescale_preference(score));
    }

    // A like signals more intent than a view, a meal-plan entry more than both
    let engagement = snapshot.viewed.len() as f64
        + 2.0 * snapshot.liked.len() as f64
        + 3.0 * snapshot.meal_plan.len() as f64;
    values.push((engagement / ENGAGEMENT_SCALE).min(1.0));

    FeatureVector(values)
}

/// Maps a preference score from [-10, 10] onto [0, 1]
fn rescale_preference(score: f64) -> f64 {
    ((score + PREFERENCE_RANGE) / (2.0 * PREFERENCE_RANGE)).clamp(0.0, 1.0)
}
