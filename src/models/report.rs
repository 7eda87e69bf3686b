use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::UserSummary;
use crate::pagination::{fold_case, Paginate};

pub const DEFAULT_MARKER_COLOR: &str = "#999999";

/// Ids bound per `IN (...)` query; keeps batch loads under SQLite's
/// bound parameter limit however many reports a view covers.
pub const ID_BATCH: usize = 500;

/// Report types offered on the creation form; free text is accepted too.
pub const KNOWN_TITLES: [&str; 4] = ["Civilian", "Suspect", "Lebanon Forces", "UN Forces"];

/// Map marker assigned to a report from its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub icon: &'static str,
    pub color: &'static str,
}

pub fn marker_for_title(title: &str) -> Option<Marker> {
    let marker = match title {
        "Civilian" => Marker {
            icon: "/static/markers/civilian.svg",
            color: "#2e7d32",
        },
        "Suspect" => Marker {
            icon: "/static/markers/suspect.svg",
            color: "#c62828",
        },
        "Lebanon Forces" => Marker {
            icon: "/static/markers/leb_soldier.svg",
            color: "#ef6c00",
        },
        "UN Forces" => Marker {
            icon: "/static/markers/un_soldier.svg",
            color: "#1565c0",
        },
        _ => return None,
    };
    Some(marker)
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Report {
    pub id: i64,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub icon: Option<String>,
    pub color: String,
    pub user_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct ReportImage {
    pub id: i64,
    pub report_id: i64,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: i64,
    pub image_urls: Vec<String>,
}

/// A report with its author and images loaded.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDetail {
    pub report: Report,
    pub author: Option<UserSummary>,
    pub images: Vec<ReportImage>,
}

impl ReportDetail {
    pub fn author_name(&self) -> String {
        self.author
            .as_ref()
            .map(|a| a.display_name())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn first_image(&self) -> Option<&str> {
        self.images.first().map(|i| i.url.as_str())
    }
}

/// A marker on the map pages.
#[derive(Debug, Clone, Serialize)]
pub struct MapLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub icon_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub photo: String,
    pub images: Vec<String>,
}

const REPORT_COLUMNS: &str =
    "id, title, latitude, longitude, icon, color, user_id, created_at, updated_at";

impl Paginate for Report {
    const TABLE: &'static str = "reports";
    const COLUMNS: &'static str = REPORT_COLUMNS;
    const SEARCHABLE: &'static [(&'static str, &'static str)] = &[("title", "title_folded")];
    const SORTABLE: &'static [&'static str] = &["created_at", "title", "latitude", "longitude"];
    const DEFAULT_SEARCH_FIELDS: &'static [&'static str] = &["title"];
    const DEFAULT_SORT: &'static str = "created_at";
}

impl Report {
    pub fn created_display(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn icon_url(&self) -> &str {
        self.icon.as_deref().unwrap_or("")
    }

    /// Insert a report and its images in one transaction.
    pub async fn create(pool: &SqlitePool, new_report: &NewReport) -> Result<i64, sqlx::Error> {
        let marker = marker_for_title(&new_report.title);
        let icon = marker.map(|m| m.icon.to_string());
        let color = marker.map(|m| m.color).unwrap_or(DEFAULT_MARKER_COLOR);
        let now = Utc::now().naive_utc();

        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO reports (title, title_folded, latitude, longitude, icon, color, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new_report.title)
        .bind(fold_case(&new_report.title))
        .bind(new_report.latitude)
        .bind(new_report.longitude)
        .bind(icon)
        .bind(color)
        .bind(new_report.user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let report_id = result.last_insert_rowid();

        for url in &new_report.image_urls {
            sqlx::query("INSERT INTO report_images (report_id, url) VALUES (?, ?)")
                .bind(report_id)
                .bind(url)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(report_id)
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn latest(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn list_since(
        pool: &SqlitePool,
        since: NaiveDateTime,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE created_at >= ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Reports created inside an optional window, both bounds inclusive.
    pub async fn list_between(
        pool: &SqlitePool,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {REPORT_COLUMNS} FROM reports WHERE 1 = 1"));
        if let Some(start) = start {
            builder.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = end {
            builder.push(" AND created_at <= ").push_bind(end);
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        builder.build_query_as::<Report>().fetch_all(pool).await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reports")
            .fetch_one(pool)
            .await
    }

    pub async fn count_by_title(pool: &SqlitePool, title: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reports WHERE title = ?")
            .bind(title)
            .fetch_one(pool)
            .await
    }

    pub async fn count_by_user(pool: &SqlitePool, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reports WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Attach authors and images to a batch of reports, preserving order.
    pub async fn load_details(
        pool: &SqlitePool,
        reports: Vec<Report>,
    ) -> Result<Vec<ReportDetail>, sqlx::Error> {
        if reports.is_empty() {
            return Ok(Vec::new());
        }

        let report_ids: Vec<i64> = reports.iter().map(|r| r.id).collect();
        let mut user_ids: Vec<i64> = reports.iter().map(|r| r.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let mut images_by_report: HashMap<i64, Vec<ReportImage>> = HashMap::new();
        for image in ReportImage::list_for_reports(pool, &report_ids).await? {
            images_by_report
                .entry(image.report_id)
                .or_default()
                .push(image);
        }

        let mut authors: HashMap<i64, UserSummary> = HashMap::new();
        for batch in user_ids.chunks(ID_BATCH) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT id, email, first_name, last_name, photo FROM users WHERE id IN (",
            );
            let mut separated = builder.separated(", ");
            for id in batch {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            for author in builder
                .build_query_as::<UserSummary>()
                .fetch_all(pool)
                .await?
            {
                authors.insert(author.id, author);
            }
        }

        Ok(reports
            .into_iter()
            .map(|report| ReportDetail {
                author: authors.get(&report.user_id).cloned(),
                images: images_by_report.remove(&report.id).unwrap_or_default(),
                report,
            })
            .collect())
    }
}

impl ReportImage {
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM report_images")
            .fetch_one(pool)
            .await
    }

    pub async fn list_for_reports(
        pool: &SqlitePool,
        report_ids: &[i64],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut images = Vec::new();
        for batch in report_ids.chunks(ID_BATCH) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT id, report_id, url FROM report_images WHERE report_id IN (",
            );
            let mut separated = builder.separated(", ");
            for id in batch {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            images.extend(builder.build_query_as::<ReportImage>().fetch_all(pool).await?);
        }

        images.sort_by_key(|image| image.id);
        Ok(images)
    }
}
