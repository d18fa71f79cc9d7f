use anyhow::anyhow;
use serde::{Deserialize, Serialize};

pub type Url = String;

const DEFAULT_ENTRIES_PER_PAGE: u32 = 25;
const MAX_ENTRIES_PER_PAGE: u32 = 1000;

#[derive(Serialize, Default, Debug)]
pub struct Page {
    page_number: u32,
    is_current_page: bool,
    link: Url,
}

#[derive(Serialize, Default)]
pub struct TableComponent<T: Serialize + Default> {
    entries: Vec<T>,
    pages: Vec<Page>,
    first_page: Option<Url>,
    last_page: Option<Page>,
    previous_page: Option<Url>,
    next_page: Option<Url>,
    columns: Vec<String>,
    max_entries_per_page: u32,
    total_entries: usize,
}

#[derive(Deserialize, Default)]
pub struct Query {
    pub page: Option<u32>,
    pub entries_per_page: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct QueryNormalized {
    page: u32,
    entries_per_page: u32,
}

impl QueryNormalized {
    pub fn limit(&self) -> usize {
        self.entries_per_page as usize
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.entries_per_page as usize)
    }

    /// The slice of `all` shown on the current page.
    pub fn page_of<'a, T>(&self, all: &'a [T]) -> &'a [T] {
        let start = self.offset().min(all.len());
        let end = start.saturating_add(self.limit()).min(all.len());
        &all[start..end]
    }
}

impl Query {
    pub fn normalize(&self) -> QueryNormalized {
        QueryNormalized {
            page: self.page.unwrap_or(1).max(1),
            entries_per_page: self
                .entries_per_page
                .unwrap_or(DEFAULT_ENTRIES_PER_PAGE)
                .clamp(1, MAX_ENTRIES_PER_PAGE),
        }
    }
}

fn page_link(base: &str, page: u32, entries_per_page: u32) -> Url {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!(
        "{}{}page={}&entries_per_page={}",
        base, sep, page, entries_per_page
    )
}

impl<T: Serialize + Default> TableComponent<T> {
    /// `base_link` may already carry query parameters; paging ones are appended.
    pub fn new(
        entries: Vec<T>,
        count: usize,
        base_link: impl AsRef<str>,
        query: QueryNormalized,
    ) -> anyhow::Result<Self> {
        let base = base_link.as_ref();
        let per_page = query.entries_per_page;
        let number_of_pages = count.div_ceil(per_page as usize) as u32;
        let current_page = query.page;

        let mut component = Self::default();
        component.entries = entries;
        component.columns = get_struct_fields_names(T::default())?;
        component.max_entries_per_page = per_page;
        component.total_entries = count;
        component.pages = (current_page as i64 - 3..=current_page as i64 + 3)
            .filter(|p| *p >= 1)
            .filter(|p| *p <= number_of_pages as i64)
            .map(|p| Page {
                page_number: p as u32,
                is_current_page: p == current_page as i64,
                link: page_link(base, p as u32, per_page),
            })
            .collect();

        let (first, last) = match (component.pages.first(), component.pages.last()) {
            (Some(f), Some(l)) => (f.page_number, l.page_number),
            _ => return Ok(component),
        };

        if last != number_of_pages {
            component.last_page = Some(Page {
                page_number: number_of_pages,
                is_current_page: false,
                link: page_link(base, number_of_pages, per_page),
            })
        };

        if first != 1 {
            component.first_page = Some(page_link(base, 1, per_page))
        };

        if current_page < number_of_pages {
            component.next_page = Some(page_link(base, current_page + 1, per_page))
        };

        if current_page != 1 {
            component.previous_page = Some(page_link(base, current_page - 1, per_page))
        };

        Ok(component)
    }
}

fn get_struct_fields_names(s: impl Serialize) -> anyhow::Result<Vec<String>> {
    let j = serde_json::to_value(s)?;
    let j = j.as_object().ok_or(anyhow!("it should be an object"))?;
    Ok(j.iter().map(|f| f.0).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Default)]
    struct Row {
        date: String,
        amount: f64,
    }

    fn query(page: u32, per: u32) -> QueryNormalized {
        Query {
            page: Some(page),
            entries_per_page: Some(per),
        }
        .normalize()
    }

    #[test]
    fn normalizes_out_of_range_queries() {
        let q = Query {
            page: Some(0),
            entries_per_page: Some(5000),
        }
        .normalize();
        assert_eq!(q.offset(), 0);
        assert_eq!(q.limit(), 1000);

        let q = Query::default().normalize();
        assert_eq!(q.limit(), 25);
    }

    #[test]
    fn slices_the_current_page() {
        let all: Vec<u32> = (1..=12).collect();
        assert_eq!(query(2, 5).page_of(&all), &[6, 7, 8, 9, 10]);
        assert_eq!(query(3, 5).page_of(&all), &[11, 12]);
        assert!(query(9, 5).page_of(&all).is_empty());
    }

    #[test]
    fn builds_window_and_links() {
        let t = TableComponent::<Row>::new(vec![], 100, "/ledger/page?workspace_id=4", query(5, 10))
            .unwrap();

        let numbers: Vec<u32> = t.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![2, 3, 4, 5, 6, 7, 8]);
        assert!(t.pages[3].is_current_page);
        assert_eq!(
            t.first_page.as_deref(),
            Some("/ledger/page?workspace_id=4&page=1&entries_per_page=10")
        );
        assert_eq!(t.last_page.as_ref().map(|p| p.page_number), Some(10));
        assert_eq!(
            t.next_page.as_deref(),
            Some("/ledger/page?workspace_id=4&page=6&entries_per_page=10")
        );
        assert_eq!(t.columns, vec!["date", "amount"]);
    }

    #[test]
    fn empty_table_has_no_links() {
        let t = TableComponent::<Row>::new(vec![], 0, "/ledger/page", query(1, 25)).unwrap();
        assert!(t.pages.is_empty());
        assert!(t.next_page.is_none());
        assert!(t.previous_page.is_none());
    }
}
