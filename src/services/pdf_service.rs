//! "Last 24 hours" report summary as an A4 PDF.
//!
//! Layout happens in two passes: [`layout`] splits the content into pages of
//! text lines, then [`render`] draws them so every footer can show the total
//! page count. Images are listed by path, not embedded.

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use sqlx::SqlitePool;

use crate::models::{Report, ReportDetail};

pub const SUMMARY_FILENAME: &str = "last_24h_reports.pdf";
pub const SUMMARY_HOURS: i64 = 24;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT_MARGIN: f32 = 20.0;
const TOP_Y: f32 = 277.0;
const BOTTOM_Y: f32 = 25.0;
const FOOTER_Y: f32 = 12.0;
const WRAP_COLUMNS: usize = 90;
// 12pt bold capitals are about 3 mm wide; 170 mm of text width
const HEADING_WRAP_COLUMNS: usize = 56;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Heading,
    Body,
}

impl LineStyle {
    fn size(&self) -> f32 {
        match self {
            LineStyle::Title => 18.0,
            LineStyle::Heading => 12.0,
            LineStyle::Body => 10.0,
        }
    }

    /// Vertical space taken by the line, in millimetres.
    fn advance(&self) -> f32 {
        match self {
            LineStyle::Title => 12.0,
            LineStyle::Heading => 7.0,
            LineStyle::Body => 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub style: LineStyle,
}

impl Line {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// Everything drawn into the summary document.
#[derive(Debug, Clone)]
pub struct SummaryData {
    pub generated_at: NaiveDateTime,
    pub reports: Vec<ReportDetail>,
}

impl SummaryData {
    pub fn image_count(&self) -> usize {
        self.reports.iter().map(|r| r.images.len()).sum()
    }
}

#[derive(Clone)]
pub struct PdfService {
    pool: SqlitePool,
}

impl PdfService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn collect_last_24h(&self) -> Result<SummaryData> {
        let generated_at = Utc::now().naive_utc();
        let since = generated_at - chrono::Duration::hours(SUMMARY_HOURS);
        let reports = Report::list_since(&self.pool, since).await?;
        let reports = Report::load_details(&self.pool, reports).await?;

        Ok(SummaryData {
            generated_at,
            reports,
        })
    }

    pub async fn summary_pdf(&self) -> Result<Vec<u8>> {
        let data = self.collect_last_24h().await?;
        tracing::info!(
            "Generating summary PDF for {} reports",
            data.reports.len()
        );
        // The document type is not Send, so build it off the async runtime
        tokio::task::spawn_blocking(move || render(&data)).await?
    }
}

fn report_lines(detail: &ReportDetail) -> Vec<Line> {
    let report = &detail.report;
    let mut lines: Vec<Line> = wrap(
        &format!("#{} {}", report.id, report.title),
        HEADING_WRAP_COLUMNS,
    )
    .into_iter()
    .map(|chunk| Line::new(LineStyle::Heading, chunk))
    .collect();
    lines.extend([
        Line::new(
            LineStyle::Body,
            format!(
                "Location: {:.5}, {:.5}",
                report.latitude, report.longitude
            ),
        ),
        Line::new(
            LineStyle::Body,
            format!("Created: {} UTC", report.created_display()),
        ),
    ]);
    for chunk in wrap(
        &format!("Reported by: {}", detail.author_name()),
        WRAP_COLUMNS,
    ) {
        lines.push(Line::new(LineStyle::Body, chunk));
    }

    if detail.images.is_empty() {
        lines.push(Line::new(LineStyle::Body, "Images: none"));
    } else {
        lines.push(Line::new(
            LineStyle::Body,
            format!("Images ({}):", detail.images.len()),
        ));
        for image in &detail.images {
            for chunk in wrap(&format!("  {}", image.url), WRAP_COLUMNS) {
                lines.push(Line::new(LineStyle::Body, chunk));
            }
        }
    }

    lines.push(Line::new(LineStyle::Body, ""));
    lines
}

/// Split the document content into pages of lines.
pub fn layout(data: &SummaryData) -> Vec<Vec<Line>> {
    let mut blocks: Vec<Vec<Line>> = vec![vec![
        Line::new(LineStyle::Title, "Reports of the last 24 hours"),
        Line::new(
            LineStyle::Body,
            format!(
                "Window: {} to {} UTC",
                (data.generated_at - chrono::Duration::hours(SUMMARY_HOURS))
                    .format("%Y-%m-%d %H:%M"),
                data.generated_at.format("%Y-%m-%d %H:%M")
            ),
        ),
        Line::new(LineStyle::Body, ""),
    ]];

    if data.reports.is_empty() {
        blocks.push(vec![Line::new(
            LineStyle::Body,
            "No reports were submitted in this period.",
        )]);
    }
    blocks.extend(data.reports.iter().map(report_lines));

    blocks.push(vec![
        Line::new(LineStyle::Heading, "Summary"),
        Line::new(
            LineStyle::Body,
            format!("Total reports: {}", data.reports.len()),
        ),
        Line::new(
            LineStyle::Body,
            format!("Total images: {}", data.image_count()),
        ),
    ]);

    let usable = TOP_Y - BOTTOM_Y;
    let mut pages: Vec<Vec<Line>> = vec![Vec::new()];
    let mut used = 0.0f32;

    for block in blocks {
        let height: f32 = block.iter().map(|l| l.style.advance()).sum();
        // Keep a report together when it fits on a fresh page
        if used > 0.0 && used + height > usable && height <= usable {
            pages.push(Vec::new());
            used = 0.0;
        }
        for line in block {
            let advance = line.style.advance();
            if used + advance > usable {
                pages.push(Vec::new());
                used = 0.0;
            }
            used += advance;
            if let Some(page) = pages.last_mut() {
                page.push(line);
            }
        }
    }

    pages
}

/// Draw the laid-out pages into PDF bytes.
pub fn render(data: &SummaryData) -> Result<Vec<u8>> {
    let pages = layout(data);
    let total = pages.len();

    let (doc, first_page, first_layer) = PdfDocument::new(
        "Reports of the last 24 hours",
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let font_bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
    let font_regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let footer = format!(
        "Generated {} UTC",
        data.generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    for (number, lines) in pages.iter().enumerate() {
        let (page, layer) = if number == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", number + 1))
        };
        let layer = doc.get_page(page).get_layer(layer);

        let mut y = TOP_Y;
        for line in lines {
            let font: &IndirectFontRef = match line.style {
                LineStyle::Body => &font_regular,
                LineStyle::Title | LineStyle::Heading => &font_bold,
            };
            if !line.text.is_empty() {
                layer.use_text(
                    line.text.as_str(),
                    line.style.size(),
                    Mm(LEFT_MARGIN),
                    Mm(y),
                    font,
                );
            }
            y -= line.style.advance();
        }

        layer.use_text(
            footer.as_str(),
            8.0,
            Mm(LEFT_MARGIN),
            Mm(FOOTER_Y),
            &font_regular,
        );
        layer.use_text(
            format!("Page {} of {}", number + 1, total),
            8.0,
            Mm(PAGE_WIDTH - LEFT_MARGIN - 20.0),
            Mm(FOOTER_Y),
            &font_regular,
        );
    }

    Ok(doc.save_to_bytes()?)
}

fn wrap(text: &str, columns: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(columns.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportImage, UserSummary};

    fn detail(id: i64, images: usize) -> ReportDetail {
        let created = Utc::now().naive_utc();
        ReportDetail {
            report: Report {
                id,
                title: "Suspect".to_string(),
                latitude: 33.88,
                longitude: 35.5,
                icon: None,
                color: "#c62828".to_string(),
                user_id: 1,
                created_at: created,
                updated_at: created,
            },
            author: Some(UserSummary {
                id: 1,
                email: "a@b.com".to_string(),
                first_name: "Ann".to_string(),
                last_name: "Lee".to_string(),
                photo: "/static/img/user.svg".to_string(),
            }),
            images: (0..images)
                .map(|i| ReportImage {
                    id: i as i64,
                    report_id: id,
                    url: format!("/uploads/{id}-{i}.jpg"),
                })
                .collect(),
        }
    }

    fn data(reports: Vec<ReportDetail>) -> SummaryData {
        SummaryData {
            generated_at: Utc::now().naive_utc(),
            reports,
        }
    }

    #[test]
    fn test_empty_summary_is_one_page() {
        let pages = layout(&data(Vec::new()));
        assert_eq!(pages.len(), 1);
        assert!(pages[0]
            .iter()
            .any(|l| l.text == "Total reports: 0"));
    }

    #[test]
    fn test_many_reports_span_pages() {
        let reports: Vec<ReportDetail> = (1..=40).map(|id| detail(id, 2)).collect();
        let pages = layout(&data(reports));
        assert!(pages.len() > 1);

        let all: Vec<&Line> = pages.iter().flatten().collect();
        assert!(all.iter().any(|l| l.text == "Total images: 80"));
        assert!(all.iter().any(|l| l.text == "  /uploads/40-1.jpg"));
    }

    #[test]
    fn test_long_title_wraps_into_heading_lines() {
        let mut long = detail(7, 0);
        long.report.title = "W".repeat(100);

        let lines = report_lines(&long);
        let headings: Vec<&Line> = lines
            .iter()
            .filter(|l| l.style == LineStyle::Heading)
            .collect();
        assert_eq!(headings.len(), 2);
        assert!(headings
            .iter()
            .all(|l| l.text.chars().count() <= HEADING_WRAP_COLUMNS));
        let joined: String = headings.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(joined, format!("#7 {}", "W".repeat(100)));

        let bytes = render(&data(vec![long])).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_produces_pdf_bytes() {
        let bytes = render(&data(vec![detail(1, 1)])).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap("", 4), vec![""]);
    }
}
