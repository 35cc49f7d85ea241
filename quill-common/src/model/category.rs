use crate::{model::Id, util::BoundedText};
use serde::{Deserialize, Serialize};

pub const CATEGORY_NAME_MAX_LEN: usize = 100;

pub type CategoryName = BoundedText<CATEGORY_NAME_MAX_LEN>;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CategoryMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Category {
    pub id: Id<CategoryMarker>,
    pub name: CategoryName,
    pub slug: String,
    pub description: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreateCategory {
    pub name: CategoryName,
    #[serde(default)]
    pub description: String,
}

/// Slug for `name`, suffixed with a counter until `taken` no longer claims it.
pub fn unique_slug(name: &CategoryName, taken: impl Fn(&str) -> bool) -> String {
    let base = match slug::slugify(name.get()) {
        base if base.is_empty() => "category".to_owned(),
        base => base,
    };

    let mut candidate = base.clone();
    let mut counter = 1;
    while taken(&candidate) {
        counter += 1;
        candidate = format!("{base}-{counter}");
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::{CategoryName, unique_slug};

    #[test]
    fn slugs_are_made_unique() {
        let name = CategoryName::new("Rust & Systems".to_owned()).unwrap();
        let taken = ["rust-systems", "rust-systems-2"];

        assert_eq!(unique_slug(&name, |_| false), "rust-systems");
        assert_eq!(unique_slug(&name, |s| taken.contains(&s)), "rust-systems-3");
    }

    #[test]
    fn unsluggable_names_fall_back() {
        let name = CategoryName::new("???".to_owned()).unwrap();
        assert_eq!(unique_slug(&name, |_| false), "category");
    }
}
