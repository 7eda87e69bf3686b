pub mod dashboard_handlers;
pub mod profile_handlers;
pub mod report_handlers;
pub mod team_handlers;

pub use dashboard_handlers::dashboard_handler;
pub use profile_handlers::{profile_page, update_address_handler, upload_photo_handler};
pub use report_handlers::{
    create_report_handler, map_handler, report_page, reports_handler, summary_pdf_handler,
};
pub use team_handlers::team_handler;

use std::collections::HashMap;

use axum::extract::Multipart;
use serde::Serialize;

use crate::error::AppError;
use crate::pagination::{Page, PageRequest};
use crate::services::upload_service::IncomingFile;

/// Serialize a value for embedding inside an inline `<script>` block.
pub fn script_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    let json = serde_json::to_string(value).map_err(|e| AppError::Internal(e.into()))?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

pub struct PageLink {
    pub number: u32,
    pub href: String,
    pub current: bool,
}

/// Pager state for a listing template, keeping search and sort in every link.
pub struct PageLinks {
    pub search: String,
    pub sort_by: String,
    pub sort_order: String,
    pub per_page: u32,
    pub links: Vec<PageLink>,
    pub previous: Option<String>,
    pub next: Option<String>,
}

impl PageLinks {
    pub fn new<T>(path: &str, request: &PageRequest, default_sort: &str, page: &Page<T>) -> Self {
        let search = request.search.clone().unwrap_or_default();
        let sort_by = request
            .sort_by
            .clone()
            .unwrap_or_else(|| default_sort.to_string());
        let sort_order = request.sort_order.as_str().to_string();

        let href = |number: u32| {
            let query = serde_urlencoded::to_string([
                ("page", number.to_string()),
                ("per_page", request.per_page.to_string()),
                ("search", search.clone()),
                ("sort_by", sort_by.clone()),
                ("sort_order", sort_order.clone()),
            ])
            .unwrap_or_default();
            format!("{path}?{query}")
        };

        let links = page
            .page_numbers()
            .into_iter()
            .map(|number| PageLink {
                number,
                href: href(number),
                current: number == page.page,
            })
            .collect();
        let previous = page.has_previous().then(|| href(page.previous_page()));
        let next = page.has_next().then(|| href(page.next_page()));

        Self {
            per_page: request.per_page,
            links,
            previous,
            next,
            search,
            sort_by,
            sort_order,
        }
    }
}

/// Text fields and file parts of a multipart upload form.
#[derive(Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<IncomingFile>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == file_field {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                // Browsers send an empty part when no file was picked
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.files.push(IncomingFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read field {}: {}", name, e))
                })?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::SortOrder;

    #[test]
    fn test_script_json_escapes_closing_tags() {
        let json = script_json(&vec!["</script><b>"]).unwrap();
        assert!(!json.contains('<'));
        assert!(json.contains("\\u003c/script\\u003e"));
    }

    #[test]
    fn test_page_links_keep_search_and_sort() {
        let request = PageRequest::new(2, 10)
            .with_search("north gate", &["title"])
            .with_sort("title", SortOrder::Asc);
        let page: Page<u8> = Page {
            items: Vec::new(),
            total: 35,
            page: 2,
            per_page: 10,
            pages: 4,
        };

        let links = PageLinks::new("/reports", &request, "created_at", &page);
        assert_eq!(links.links.len(), 4);
        assert!(links.links[1].current);
        let next = links.next.unwrap();
        assert!(next.starts_with("/reports?page=3"));
        assert!(next.contains("search=north+gate"));
        assert!(next.contains("sort_by=title"));
        assert!(next.contains("sort_order=asc"));
        assert!(links.previous.unwrap().contains("page=1"));
    }
}
