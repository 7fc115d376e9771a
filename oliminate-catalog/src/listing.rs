use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::item::{Item, ItemKind, MerchandiseCategory};

/// Ordering of a catalog listing. Unknown `sort_by` values fall back to
/// alphabetical order.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    PriceAsc,
    PriceDesc,
    #[default]
    Name,
}

impl SortOrder {
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("price_asc") => SortOrder::PriceAsc,
            Some("price_desc") => SortOrder::PriceDesc,
            _ => SortOrder::Name,
        }
    }

    pub fn compare(&self, a: &Item, b: &Item) -> Ordering {
        match self {
            SortOrder::PriceAsc => a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)),
            SortOrder::PriceDesc => b.price.cmp(&a.price).then_with(|| a.name.cmp(&b.name)),
            SortOrder::Name => a.name.cmp(&b.name).then_with(|| a.price.cmp(&b.price)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingFilter {
    pub kind: Option<ItemKind>,
    pub category: Option<MerchandiseCategory>,
    pub sort: SortOrder,
}

impl ListingFilter {
    pub fn matches(&self, item: &Item) -> bool {
        self.kind.map_or(true, |k| item.kind == k)
            && self.category.map_or(true, |c| item.category == Some(c))
    }

    pub fn apply(&self, items: impl IntoIterator<Item = Item>) -> Vec<Item> {
        let mut listed: Vec<Item> = items.into_iter().filter(|i| self.matches(i)).collect();
        listed.sort_by(|a, b| self.sort.compare(a, b));
        listed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::NewItem;
    use oliminate_core::Buyer;

    fn merch(name: &str, category: MerchandiseCategory, price: i64) -> Item {
        NewItem {
            kind: ItemKind::Merchandise,
            name: name.to_string(),
            category: Some(category),
            schedule_id: None,
            price,
            stock: 1,
            description: String::new(),
            image_url: None,
        }
        .into_item(&Buyer::organizer("org-1"))
        .unwrap()
    }

    fn names(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_sorting_breaks_ties_by_name() {
        let items = vec![
            merch("Scarf B", MerchandiseCategory::Scarf, 30_000),
            merch("Cap", MerchandiseCategory::Hat, 45_000),
            merch("Scarf A", MerchandiseCategory::Scarf, 30_000),
        ];

        let asc = ListingFilter { sort: SortOrder::PriceAsc, ..Default::default() }.apply(items.clone());
        assert_eq!(names(&asc), vec!["Scarf A", "Scarf B", "Cap"]);

        let desc = ListingFilter { sort: SortOrder::PriceDesc, ..Default::default() }.apply(items.clone());
        assert_eq!(names(&desc), vec!["Cap", "Scarf A", "Scarf B"]);

        let by_name = ListingFilter::default().apply(items);
        assert_eq!(names(&by_name), vec!["Cap", "Scarf A", "Scarf B"]);
    }

    #[test]
    fn test_category_filter() {
        let items = vec![
            merch("Cap", MerchandiseCategory::Hat, 45_000),
            merch("Scarf", MerchandiseCategory::Scarf, 30_000),
        ];
        let filter = ListingFilter {
            category: Some(MerchandiseCategory::Hat),
            ..Default::default()
        };
        assert_eq!(names(&filter.apply(items)), vec!["Cap"]);
    }

    #[test]
    fn test_unknown_sort_falls_back_to_name() {
        assert_eq!(SortOrder::from_query(Some("newest")), SortOrder::Name);
        assert_eq!(SortOrder::from_query(Some("price_desc")), SortOrder::PriceDesc);
        assert_eq!(SortOrder::from_query(None), SortOrder::Name);
    }
}
