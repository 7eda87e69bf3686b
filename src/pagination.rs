//! Filtered, searched, sorted and paginated listing over a table.
//!
//! A record kind opts in by implementing [`Paginate`], which names its table,
//! the columns to select and the fields that may be searched or sorted on.
//! [`paginate`] validates a [`PageRequest`] against those declarations and
//! runs one `COUNT(*)` query plus one page query sharing the same filter.
//!
//! SQLite only folds ASCII case, so searchable text is stored a second time
//! through [`fold_case`] when it is written, and the search text goes through
//! the same function before it is compared.

use std::str::FromStr;

use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Sqlite, SqlitePool};

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;
pub const MAX_SEARCH_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum PaginationError {
    #[error("Page numbers start at 1")]
    InvalidPage,
    #[error("Unknown sort field: {0}")]
    UnknownSortField(String),
    #[error("Unknown search field: {0}")]
    UnknownSearchField(String),
    #[error("Unknown sort order: {0}")]
    UnknownSortOrder(String),
    #[error("Search text is longer than {MAX_SEARCH_LEN} characters")]
    SearchTooLong,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PaginationError {
    /// True when the error was caused by the request rather than the database.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PaginationError::Database(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = PaginationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(PaginationError::UnknownSortOrder(s.to_string())),
        }
    }
}

/// Case folding shared by stored search columns and search text.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// A table that can be listed through [`paginate`].
pub trait Paginate: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    const TABLE: &'static str;
    /// Comma separated select list, must include `id`.
    const COLUMNS: &'static str;
    /// `(field, column)` pairs; the column holds [`fold_case`] output.
    const SEARCHABLE: &'static [(&'static str, &'static str)];
    const SORTABLE: &'static [&'static str];
    const DEFAULT_SEARCH_FIELDS: &'static [&'static str];
    const DEFAULT_SORT: &'static str;
}

/// Raw query string parameters of a listing page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    /// Comma separated list of fields.
    pub search_fields: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
    /// Empty means the record kind's defaults.
    pub search_fields: Vec<String>,
    /// `None` means the record kind's default.
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: None,
            search_fields: Vec::new(),
            sort_by: None,
            sort_order: SortOrder::Desc,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page: clamp_per_page(per_page),
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>, fields: &[&str]) -> Self {
        let search = search.into();
        let trimmed = search.trim();
        self.search = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order;
        self
    }

    pub fn from_params(params: &PageParams) -> Result<Self, PaginationError> {
        let page = params.page.unwrap_or(1);
        if page == 0 {
            return Err(PaginationError::InvalidPage);
        }

        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if search.as_ref().is_some_and(|s| s.chars().count() > MAX_SEARCH_LEN) {
            return Err(PaginationError::SearchTooLong);
        }

        let search_fields = params
            .search_fields
            .as_deref()
            .map(|fields| {
                fields
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let sort_order = match params.sort_order.as_deref().map(str::trim) {
            None | Some("") => SortOrder::default(),
            Some(order) => order.parse()?,
        };

        let sort_by = params
            .sort_by
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            page,
            per_page: clamp_per_page(params.per_page.unwrap_or(DEFAULT_PER_PAGE)),
            search,
            search_fields,
            sort_by,
            sort_order,
        })
    }

    fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.per_page)
    }
}

pub fn clamp_per_page(per_page: u32) -> u32 {
    per_page.clamp(1, MAX_PER_PAGE)
}

/// Number of pages needed for `total` records; zero records means zero pages.
pub fn page_count(total: i64, per_page: u32) -> u32 {
    if total <= 0 {
        return 0;
    }
    let per_page = i64::from(per_page.max(1));
    ((total + per_page - 1) / per_page) as u32
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            pages: self.pages,
        }
    }

    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            pages: self.pages,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    pub fn previous_page(&self) -> u32 {
        self.page.saturating_sub(1).max(1)
    }

    pub fn next_page(&self) -> u32 {
        self.page + 1
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        (1..=self.pages).collect()
    }
}

struct ResolvedQuery {
    search: Option<(String, Vec<&'static str>)>,
    sort_by: &'static str,
}

fn resolve<T: Paginate>(request: &PageRequest) -> Result<ResolvedQuery, PaginationError> {
    let sort_by = match request.sort_by.as_deref() {
        None => T::DEFAULT_SORT,
        Some(field) => T::SORTABLE
            .iter()
            .copied()
            .find(|f| *f == field)
            .ok_or_else(|| PaginationError::UnknownSortField(field.to_string()))?,
    };

    let search = match request.search.as_deref() {
        None => None,
        Some(text) => {
            let fields: Vec<&str> = if request.search_fields.is_empty() {
                T::DEFAULT_SEARCH_FIELDS.to_vec()
            } else {
                request.search_fields.iter().map(String::as_str).collect()
            };
            let columns = fields
                .into_iter()
                .map(|field| {
                    T::SEARCHABLE
                        .iter()
                        .find(|(name, _)| *name == field)
                        .map(|(_, column)| *column)
                        .ok_or_else(|| PaginationError::UnknownSearchField(field.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Some((like_pattern(text), columns))
        }
    };

    Ok(ResolvedQuery { search, sort_by })
}

/// `%text%` with LIKE wildcards escaped, case folded like the search columns.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for ch in fold_case(text).chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, resolved: &ResolvedQuery) {
    if let Some((pattern, columns)) = &resolved.search {
        builder.push(" WHERE (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder
                .push(format!("{column} LIKE "))
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'");
        }
        builder.push(")");
    }
}

/// Fetch one page of `T` matching `request`.
pub async fn paginate<T: Paginate>(
    pool: &SqlitePool,
    request: &PageRequest,
) -> Result<Page<T>, PaginationError> {
    if request.page == 0 {
        return Err(PaginationError::InvalidPage);
    }
    let per_page = clamp_per_page(request.per_page);
    let resolved = resolve::<T>(request)?;

    let mut count_query: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", T::TABLE));
    push_filter(&mut count_query, &resolved);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut data_query: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM {}", T::COLUMNS, T::TABLE));
    push_filter(&mut data_query, &resolved);
    let direction = request.sort_order.as_sql();
    data_query.push(format!(
        " ORDER BY {} {direction}, id {direction}",
        resolved.sort_by
    ));
    data_query
        .push(" LIMIT ")
        .push_bind(i64::from(per_page))
        .push(" OFFSET ")
        .push_bind(PageRequest { per_page, ..request.clone() }.offset());

    let items = data_query.build_query_as::<T>().fetch_all(pool).await?;

    tracing::debug!(
        table = T::TABLE,
        page = request.page,
        per_page,
        total,
        "Paginated query"
    );

    Ok(Page {
        items,
        total,
        page: request.page,
        per_page,
        pages: page_count(total, per_page),
    })
}
