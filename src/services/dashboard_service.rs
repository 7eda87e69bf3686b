use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::models::{Report, ReportDetail, ReportImage};

pub const TREND_DAYS: i64 = 7;
pub const LATEST_REPORTS: i64 = 5;

#[derive(Clone, Debug)]
pub struct DashboardService {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_reports: i64,
    pub total_users: i64,
    pub total_images: i64,
    pub suspect_reports: i64,
}

/// One slice of the reports-by-title pie chart.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct TitleCount {
    pub title: String,
    pub count: i64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrendSeries {
    pub title: String,
    pub counts: Vec<i64>,
}

/// Reports per day, oldest day first and today last.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyTrend {
    pub labels: Vec<String>,
    pub totals: Vec<i64>,
    pub by_title: Vec<TrendSeries>,
}

#[derive(Debug, Clone)]
pub struct DashboardData {
    pub stats: DashboardStats,
    pub by_title: Vec<TitleCount>,
    pub trend: DailyTrend,
    pub latest: Vec<ReportDetail>,
}

#[derive(Debug, FromRow)]
struct DayTitleCount {
    day: String,
    title: String,
    count: i64,
}

impl DashboardService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load(&self) -> Result<DashboardData> {
        let stats = self.get_dashboard_stats().await?;
        let by_title = self.reports_by_title().await?;
        let trend = self.daily_trend(Utc::now().date_naive()).await?;
        let latest = Report::latest(&self.pool, LATEST_REPORTS).await?;
        let latest = Report::load_details(&self.pool, latest).await?;

        Ok(DashboardData {
            stats,
            by_title,
            trend,
            latest,
        })
    }

    pub async fn get_dashboard_stats(&self) -> Result<DashboardStats> {
        let total_reports = Report::count(&self.pool).await?;
        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let total_images = ReportImage::count(&self.pool).await?;
        let suspect_reports = Report::count_by_title(&self.pool, "Suspect").await?;

        Ok(DashboardStats {
            total_reports,
            total_users,
            total_images,
            suspect_reports,
        })
    }

    /// Report counts per title, largest first.
    pub async fn reports_by_title(&self) -> Result<Vec<TitleCount>> {
        let rows = sqlx::query_as::<_, TitleCount>(
            r#"
            SELECT title, COUNT(*) AS count, MAX(color) AS color
            FROM reports
            GROUP BY title
            ORDER BY count DESC, title ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Daily counts for the [`TREND_DAYS`] days ending on `today`.
    pub async fn daily_trend(&self, today: NaiveDate) -> Result<DailyTrend> {
        let days: Vec<NaiveDate> = (0..TREND_DAYS)
            .rev()
            .map(|back| today - Duration::days(back))
            .collect();
        let first = days[0].format("%Y-%m-%d").to_string();
        let last = today.format("%Y-%m-%d").to_string();

        let rows = sqlx::query_as::<_, DayTitleCount>(
            r#"
            SELECT substr(created_at, 1, 10) AS day, title, COUNT(*) AS count
            FROM reports
            WHERE substr(created_at, 1, 10) BETWEEN ? AND ?
            GROUP BY day, title
            "#,
        )
        .bind(&first)
        .bind(&last)
        .fetch_all(&self.pool)
        .await?;

        let labels: Vec<String> = days.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
        let index: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i))
            .collect();

        let mut totals = vec![0i64; labels.len()];
        let mut by_title: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        for row in rows {
            let Some(&i) = index.get(row.day.as_str()) else {
                continue;
            };
            totals[i] += row.count;
            by_title
                .entry(row.title)
                .or_insert_with(|| vec![0; labels.len()])[i] += row.count;
        }

        Ok(DailyTrend {
            labels,
            totals,
            by_title: by_title
                .into_iter()
                .map(|(title, counts)| TrendSeries { title, counts })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewReport;
    use crate::test_utils::test_helpers::{create_test_db, insert_test_user};

    async fn add_report(pool: &SqlitePool, user_id: i64, title: &str, images: usize) {
        let report = NewReport {
            title: title.to_string(),
            latitude: 33.9,
            longitude: 35.5,
            user_id,
            image_urls: (0..images).map(|i| format!("/uploads/{title}-{i}.jpg")).collect(),
        };
        Report::create(pool, &report).await.unwrap();
    }

    #[tokio::test]
    async fn test_stats_and_pie() {
        let pool = create_test_db().await.unwrap();
        let user_id = insert_test_user(&pool, "dash@example.com", "password123", true).await.unwrap();
        add_report(&pool, user_id, "Suspect", 2).await;
        add_report(&pool, user_id, "Suspect", 1).await;
        add_report(&pool, user_id, "Civilian", 0).await;

        let service = DashboardService::new(pool);
        let stats = service.get_dashboard_stats().await.unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                total_reports: 3,
                total_users: 1,
                total_images: 3,
                suspect_reports: 2,
            }
        );

        let pie = service.reports_by_title().await.unwrap();
        assert_eq!(pie.len(), 2);
        assert_eq!(pie[0].title, "Suspect");
        assert_eq!(pie[0].count, 2);
        assert_eq!(pie[0].color, "#c62828");
    }

    #[tokio::test]
    async fn test_daily_trend_has_seven_days_ending_today() {
        let pool = create_test_db().await.unwrap();
        let user_id = insert_test_user(&pool, "trend@example.com", "password123", true).await.unwrap();
        add_report(&pool, user_id, "Civilian", 0).await;
        add_report(&pool, user_id, "UN Forces", 0).await;

        let today = Utc::now().date_naive();
        let trend = DashboardService::new(pool).daily_trend(today).await.unwrap();

        assert_eq!(trend.labels.len(), TREND_DAYS as usize);
        assert_eq!(
            trend.labels.last().unwrap(),
            &today.format("%Y-%m-%d").to_string()
        );
        assert_eq!(trend.totals, vec![0, 0, 0, 0, 0, 0, 2]);
        assert_eq!(trend.by_title.len(), 2);
        assert_eq!(trend.by_title[0].title, "Civilian");
        assert_eq!(trend.by_title[0].counts[6], 1);
    }
}
