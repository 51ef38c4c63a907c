use log::debug;

use crate::error::{LedgerError, Result};
use crate::models::{Category, Kind};
use crate::storage::{load_json, save_json, KeyValueStore};

pub const CATEGORIES_KEY: &str = "categories";

// (id, name, icon, color, kind)
const DEFAULT_CATEGORIES: &[(&str, &str, &str, &str, Kind)] = &[
    // Expenses
    ("exp-food", "Food", "utensils", "#f97316", Kind::Expense),
    ("exp-transport", "Transport", "bus", "#3b82f6", Kind::Expense),
    ("exp-shopping", "Shopping", "shopping-bag", "#ec4899", Kind::Expense),
    ("exp-housing", "Housing", "home", "#8b5cf6", Kind::Expense),
    ("exp-entertainment", "Entertainment", "film", "#eab308", Kind::Expense),
    ("exp-health", "Health", "heart-pulse", "#ef4444", Kind::Expense),
    ("exp-education", "Education", "book", "#14b8a6", Kind::Expense),
    ("exp-travel", "Travel", "plane", "#06b6d4", Kind::Expense),
    ("exp-other", "Other", "circle", "#6b7280", Kind::Expense),
    // Income
    ("inc-salary", "Salary", "briefcase", "#22c55e", Kind::Income),
    ("inc-bonus", "Bonus", "gift", "#84cc16", Kind::Income),
    ("inc-investment", "Investment", "trending-up", "#10b981", Kind::Income),
    ("inc-side-job", "Side Job", "laptop", "#0ea5e9", Kind::Income),
    ("inc-other", "Other Income", "plus-circle", "#64748b", Kind::Income),
];

pub fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(id, name, icon, color, kind)| Category {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            kind: *kind,
        })
        .collect()
}

/// Pick the category a free-text suggestion refers to.
///
/// Scores, case-insensitive: exact name 3, name contains suggestion 2,
/// suggestion contains name 1. The first best-scoring category of `kind`
/// wins; with no match the first category of `kind` is returned.
pub fn match_category<'a>(suggestion: &str, candidates: &'a [Category], kind: Kind) -> Option<&'a Category> {
    let needle = suggestion.trim().to_lowercase();
    let of_kind = candidates.iter().filter(|c| c.kind == kind);
    let fallback = of_kind.clone().next();
    if needle.is_empty() {
        return fallback;
    }

    let mut best: Option<(u8, &Category)> = None;
    for cat in of_kind {
        let name = cat.name.to_lowercase();
        let score = if name == needle {
            3
        } else if name.contains(&needle) {
            2
        } else if needle.contains(&name) {
            1
        } else {
            0
        };
        if score > 0 && best.map_or(true, |(s, _)| score > s) {
            best = Some((score, cat));
        }
    }
    best.map(|(_, c)| c).or(fallback)
}

#[derive(Debug, Default)]
pub struct CategoryBook {
    categories: Vec<Category>,
}

impl CategoryBook {
    /// Load categories, seeding the defaults the first time.
    pub fn load(kv: &dyn KeyValueStore) -> Result<Self> {
        let mut categories: Vec<Category> = load_json(kv, CATEGORIES_KEY)?;
        if categories.is_empty() {
            debug!("no stored categories, using defaults");
            categories = default_categories();
        }
        Ok(Self { categories })
    }

    pub fn all(&self) -> &[Category] {
        &self.categories
    }

    pub fn of_kind(&self, kind: Kind) -> Vec<&Category> {
        self.categories.iter().filter(|c| c.kind == kind).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn name_of(&self, id: &str) -> &str {
        self.get(id).map(|c| c.name.as_str()).unwrap_or("(unknown)")
    }

    /// Resolve a category by id or by name, limited to `kind`.
    pub fn resolve(&self, key: &str, kind: Kind) -> Result<&Category> {
        self.categories
            .iter()
            .filter(|c| c.kind == kind)
            .find(|c| c.id == key || c.name.eq_ignore_ascii_case(key))
            .ok_or_else(|| LedgerError::NotFound(format!("{kind} category '{key}'")))
    }

    pub fn best_match(&self, suggestion: &str, kind: Kind) -> Option<&Category> {
        match_category(suggestion, &self.categories, kind)
    }

    pub fn add(
        &mut self,
        kv: &mut dyn KeyValueStore,
        name: &str,
        kind: Kind,
        icon: Option<&str>,
        color: Option<&str>,
    ) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("Category name cannot be empty".to_string()));
        }
        if self
            .categories
            .iter()
            .any(|c| c.kind == kind && c.name.eq_ignore_ascii_case(name))
        {
            return Err(LedgerError::Validation(format!("{kind} category '{name}' already exists")));
        }
        let category = Category {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            icon: icon.unwrap_or("circle").to_string(),
            color: color.unwrap_or("#6b7280").to_string(),
            kind,
        };
        self.categories.push(category.clone());
        self.save(kv)?;
        Ok(category)
    }

    pub fn rename(&mut self, kv: &mut dyn KeyValueStore, id: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(LedgerError::Validation("Category name cannot be empty".to_string()));
        }
        let cat = self
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("category {id}")))?;
        cat.name = new_name.to_string();
        self.save(kv)
    }

    /// Remove a category. The last category of a kind is kept so every
    /// transaction always has a fallback.
    pub fn remove(&mut self, kv: &mut dyn KeyValueStore, id: &str) -> Result<Category> {
        let pos = self
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("category {id}")))?;
        let kind = self.categories[pos].kind;
        if self.of_kind(kind).len() <= 1 {
            return Err(LedgerError::Validation(format!(
                "Cannot remove the last {kind} category"
            )));
        }
        let removed = self.categories.remove(pos);
        self.save(kv)?;
        Ok(removed)
    }

    pub fn save(&self, kv: &mut dyn KeyValueStore) -> Result<()> {
        save_json(kv, CATEGORIES_KEY, &self.categories)
            .map_err(|e| LedgerError::persistence(e, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn cat(id: &str, name: &str, kind: Kind) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            icon: "circle".to_string(),
            color: "#000000".to_string(),
            kind,
        }
    }

    fn sample() -> Vec<Category> {
        vec![
            cat("food", "Food", Kind::Expense),
            cat("fastfood", "Fast Food", Kind::Expense),
            cat("transport", "Transport", Kind::Expense),
            cat("salary", "Salary", Kind::Income),
        ]
    }

    #[test]
    fn test_exact_match_wins() {
        let cats = sample();
        assert_eq!(match_category("food", &cats, Kind::Expense).unwrap().id, "food");
    }

    #[test]
    fn test_name_contains_suggestion() {
        let cats = sample();
        assert_eq!(match_category("trans", &cats, Kind::Expense).unwrap().id, "transport");
    }

    #[test]
    fn test_suggestion_contains_name() {
        let cats = sample();
        assert_eq!(
            match_category("Public transport ticket", &cats, Kind::Expense).unwrap().id,
            "transport"
        );
    }

    #[test]
    fn test_ties_go_to_list_order() {
        let cats = sample();
        // "od" is contained in both Food and Fast Food
        assert_eq!(match_category("od", &cats, Kind::Expense).unwrap().id, "food");
    }

    #[test]
    fn test_fallback_to_first_of_kind() {
        let cats = sample();
        assert_eq!(match_category("bitcoin", &cats, Kind::Income).unwrap().id, "salary");
        assert_eq!(match_category("", &cats, Kind::Expense).unwrap().id, "food");
    }

    #[test]
    fn test_kind_is_respected() {
        let cats = sample();
        assert_eq!(match_category("Salary", &cats, Kind::Expense).unwrap().id, "food");
        assert!(match_category("x", &cats[..3], Kind::Income).is_none());
    }

    #[test]
    fn test_load_seeds_defaults() {
        let kv = MemoryStore::new();
        let book = CategoryBook::load(&kv).unwrap();
        assert!(book.of_kind(Kind::Expense).len() >= 9);
        assert!(book.of_kind(Kind::Income).len() >= 5);
        assert_eq!(book.name_of("exp-food"), "Food");
    }

    #[test]
    fn test_add_rename_remove_persist() {
        let mut kv = MemoryStore::new();
        let mut book = CategoryBook::load(&kv).unwrap();
        let pets = book.add(&mut kv, "Pets", Kind::Expense, Some("paw"), None).unwrap();
        book.rename(&mut kv, &pets.id, "Pet care").unwrap();

        let reloaded = CategoryBook::load(&kv).unwrap();
        assert_eq!(reloaded.name_of(&pets.id), "Pet care");

        book.remove(&mut kv, &pets.id).unwrap();
        assert!(CategoryBook::load(&kv).unwrap().get(&pets.id).is_none());
    }

    #[test]
    fn test_add_rejects_duplicate_name() {
        let mut kv = MemoryStore::new();
        let mut book = CategoryBook::load(&kv).unwrap();
        let err = book.add(&mut kv, "food", Kind::Expense, None, None).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        // Same name under the other kind is fine
        book.add(&mut kv, "Food", Kind::Income, None, None).unwrap();
    }

    #[test]
    fn test_cannot_remove_last_of_kind() {
        let mut kv = MemoryStore::new();
        let mut book = CategoryBook::load(&kv).unwrap();
        let income: Vec<String> = book.of_kind(Kind::Income).iter().map(|c| c.id.clone()).collect();
        for id in &income[1..] {
            book.remove(&mut kv, id).unwrap();
        }
        let err = book.remove(&mut kv, &income[0]).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_resolve_by_id_or_name() {
        let kv = MemoryStore::new();
        let book = CategoryBook::load(&kv).unwrap();
        assert_eq!(book.resolve("exp-travel", Kind::Expense).unwrap().name, "Travel");
        assert_eq!(book.resolve("salary", Kind::Income).unwrap().id, "inc-salary");
        assert!(book.resolve("salary", Kind::Expense).is_err());
    }
}
