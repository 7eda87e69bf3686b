use std::{collections::BTreeSet, sync::Arc};

use chrono::{Duration, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::jobs::{enqueue_or_warn, Job, JobQueue};
use crate::models::{MapLocation, NewReport, Report, ReportDetail};
use crate::pagination::{paginate, Page, PageRequest, PaginationError};
use crate::services::upload_service::{IncomingFile, UploadError, UploadService};

pub const MAX_TITLE_LEN: usize = 100;
pub const DEFAULT_LOCATION_IMAGE: &str = "/static/img/default.svg";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Title is required")]
    MissingTitle,
    #[error("Title must be at most {MAX_TITLE_LEN} characters")]
    TitleTooLong,
    #[error("Latitude must be between -90 and 90")]
    InvalidLatitude,
    #[error("Longitude must be between -180 and 180")]
    InvalidLongitude,
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("{0}")]
    Upload(#[from] UploadError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct ReportInput {
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl ReportInput {
    pub fn validate(&self) -> Result<String, ReportError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ReportError::MissingTitle);
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ReportError::TitleTooLong);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ReportError::InvalidLatitude);
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ReportError::InvalidLongitude);
        }
        Ok(title.to_string())
    }
}

/// Locations for the map page plus the distinct report titles among them.
#[derive(Debug, Clone)]
pub struct MapView {
    pub locations: Vec<MapLocation>,
    pub types: Vec<String>,
}

pub struct ReportService {
    pool: SqlitePool,
    uploads: Arc<UploadService>,
    jobs: JobQueue,
}

impl ReportService {
    pub fn new(pool: SqlitePool, uploads: Arc<UploadService>, jobs: JobQueue) -> Self {
        Self {
            pool,
            uploads,
            jobs,
        }
    }

    /// Store the images, insert the report, and queue normalization.
    pub async fn create_report(
        &self,
        user_id: i64,
        input: ReportInput,
        files: Vec<IncomingFile>,
    ) -> Result<i64, ReportError> {
        let title = input.validate()?;
        let stored = self.uploads.store_all(&files).await?;

        let new_report = NewReport {
            title,
            latitude: input.latitude,
            longitude: input.longitude,
            user_id,
            image_urls: stored.iter().map(|f| f.url.clone()).collect(),
        };

        let report_id = match Report::create(&self.pool, &new_report).await {
            Ok(id) => id,
            Err(e) => {
                self.uploads.remove_all(&stored).await;
                return Err(e.into());
            }
        };

        for file in stored {
            enqueue_or_warn(&self.jobs, Job::NormalizeImage { path: file.path });
        }

        info!(
            "User {} created report {} '{}' with {} images",
            user_id,
            report_id,
            new_report.title,
            new_report.image_urls.len()
        );
        Ok(report_id)
    }

    pub async fn get_detail(&self, id: i64) -> Result<Option<ReportDetail>, ReportError> {
        let Some(report) = Report::get_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        Ok(Report::load_details(&self.pool, vec![report]).await?.pop())
    }

    pub async fn reports_page(
        &self,
        request: &PageRequest,
    ) -> Result<Page<ReportDetail>, PaginationError> {
        let mut page = paginate::<Report>(&self.pool, request).await?;
        let reports = std::mem::take(&mut page.items);
        let details = Report::load_details(&self.pool, reports).await?;
        Ok(page.with_items(details))
    }

    /// Reports of the last `hours` hours, newest first.
    pub async fn recent(&self, hours: i64) -> Result<Vec<ReportDetail>, ReportError> {
        let since = Utc::now().naive_utc() - Duration::hours(hours);
        let reports = Report::list_since(&self.pool, since).await?;
        Ok(Report::load_details(&self.pool, reports).await?)
    }

    pub async fn recent_locations(&self, hours: i64) -> Result<Vec<MapLocation>, ReportError> {
        Ok(self.recent(hours).await?.iter().map(to_location).collect())
    }

    /// Reports between two optional `YYYY-MM-DD` dates, both days inclusive.
    pub async fn map_view(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<MapView, ReportError> {
        let start = parse_day(start_date)?.and_then(|d| d.and_hms_opt(0, 0, 0));
        let end = parse_day(end_date)?.and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999));

        let reports = Report::list_between(&self.pool, start, end).await?;
        let details = Report::load_details(&self.pool, reports).await?;

        let locations: Vec<MapLocation> = details.iter().map(to_location).collect();
        let types = locations
            .iter()
            .map(|l| l.kind.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(MapView { locations, types })
    }
}

fn parse_day(value: Option<&str>) -> Result<Option<NaiveDate>, ReportError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ReportError::InvalidDate(v.to_string())),
    }
}

pub fn to_location(detail: &ReportDetail) -> MapLocation {
    let report = &detail.report;
    MapLocation {
        name: detail.author_name(),
        latitude: report.latitude,
        longitude: report.longitude,
        icon_url: report.icon.clone(),
        kind: report.title.clone(),
        photo: detail
            .first_image()
            .unwrap_or(DEFAULT_LOCATION_IMAGE)
            .to_string(),
        images: detail.images.iter().map(|i| i.url.clone()).collect(),
    }
}
