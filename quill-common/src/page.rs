use serde::Serialize;

pub const DEFAULT_PER_PAGE: usize = 5;

/// One page of a listing. Pages are numbered from 1.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Cuts `requested` out of `items`.
    ///
    /// A missing or unparsable page number yields the first page, one past
    /// the end yields the last page, and an empty listing still has one
    /// (empty) page.
    #[must_use]
    pub fn paginate(items: Vec<T>, requested: Option<&str>, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total_items = items.len();
        let total_pages = total_items.div_ceil(per_page).max(1);

        let page = requested
            .and_then(|page| page.trim().parse::<usize>().ok())
            .map_or(1, |page| page.clamp(1, total_pages));

        let items = items
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Self {
            items,
            page,
            per_page,
            total_items,
            total_pages,
        }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::Page;

    #[test]
    fn pages() {
        let items: Vec<u32> = (1..=12).collect();

        let first = Page::paginate(items.clone(), None, 5);
        assert_eq!(first.items, [1, 2, 3, 4, 5]);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = Page::paginate(items.clone(), Some("3"), 5);
        assert_eq!(last.items, [11, 12]);
        assert!(!last.has_next());
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        let items: Vec<u32> = (1..=12).collect();

        assert_eq!(Page::paginate(items.clone(), Some("abc"), 5).page, 1);
        assert_eq!(Page::paginate(items.clone(), Some("0"), 5).page, 1);
        assert_eq!(Page::paginate(items.clone(), Some("-2"), 5).page, 1);
        assert_eq!(Page::paginate(items, Some("99"), 5).page, 3);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let page = Page::paginate(Vec::<u32>::new(), Some("4"), 5);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
    }
}
