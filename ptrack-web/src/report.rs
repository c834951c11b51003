//! Completion report PDF
//!
//! Lists participants whose downloads and key uploads are all confirmed, as a
//! landscape US-letter table with the header row repeated on every page.

use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect,
    Rgb,
};
use ptrack_common::db::models::Participant;
use ptrack_common::{time, TrackingItem};
use thiserror::Error;

/// Items shown as report columns after Study ID and Enrollment Date
pub const REPORT_COLUMNS: [TrackingItem; 6] = [
    TrackingItem::HeadUltrasoundImagesUploaded,
    TrackingItem::HeadUltrasoundReportUploaded,
    TrackingItem::VideoLaryngoscopeUploaded,
    TrackingItem::RopFinalReportUploaded,
    TrackingItem::CostEffectivenessDataUploaded,
    TrackingItem::BloodCultureDone,
];

pub const REPORT_FILENAME: &str = "completed_downloads.pdf";

const PAGE_WIDTH_PT: f32 = 792.0;
const PAGE_HEIGHT_PT: f32 = 612.0;
const MARGIN_TOP_PT: f32 = 40.0;
const MARGIN_BOTTOM_PT: f32 = 20.0;
const MARGIN_SIDE_PT: f32 = 20.0;
const TITLE_SIZE_PT: f32 = 16.0;
const TITLE_GAP_PT: f32 = 20.0;
const CELL_FONT_PT: f32 = 8.0;
const ROW_HEIGHT_PT: f32 = 18.0;
const GRID_THICKNESS_PT: f32 = 0.25;

#[derive(Debug, Error)]
#[error("PDF rendering failed: {0}")]
pub struct ReportError(String);

/// One table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub study_id: String,
    pub enrollment_date: String,
    pub confirmed: [bool; 6],
}

impl ReportRow {
    fn cells(&self) -> Vec<String> {
        let mut cells = vec![self.study_id.clone(), self.enrollment_date.clone()];
        cells.extend(
            self.confirmed
                .iter()
                .map(|done| if *done { "Yes" } else { "" }.to_string()),
        );
        cells
    }
}

/// Whether a participant belongs in the report
pub fn is_reportable(participant: &Participant) -> bool {
    let checklist = &participant.checklist;
    checklist.is_done(TrackingItem::MonitorDownloaded)
        && checklist.is_done(TrackingItem::UltrasoundDownloaded)
        && REPORT_COLUMNS.iter().all(|item| checklist.is_done(*item))
}

pub fn report_rows(participants: &[Participant]) -> Vec<ReportRow> {
    participants
        .iter()
        .filter(|p| is_reportable(p))
        .map(|p| ReportRow {
            study_id: p.study_id.clone(),
            enrollment_date: time::display_date(p.enrollment_date),
            confirmed: REPORT_COLUMNS.map(|item| p.checklist.is_done(item)),
        })
        .collect()
}

pub fn report_title(site_label: &str) -> String {
    format!("Preterm Africa Patient Tracking Log ({})", site_label)
}

pub fn header_cells() -> Vec<String> {
    let mut headers = vec!["Study ID".to_string(), "Enrollment Date".to_string()];
    headers.extend(REPORT_COLUMNS.iter().map(|item| item.label().to_string()));
    headers
}

/// Column widths in points: six points per character of the longest cell, plus ten
///
/// A table wider than the page between the side margins is scaled down to fit.
pub fn column_widths(rows: &[ReportRow]) -> Vec<f32> {
    let headers = header_cells();
    let natural: Vec<f32> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = rows
                .iter()
                .map(|row| row.cells()[col].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0);
            longest as f32 * 6.0 + 10.0
        })
        .collect();

    let total: f32 = natural.iter().sum();
    let usable = usable_width();
    if total <= usable {
        return natural;
    }
    let scale = usable / total;
    natural.into_iter().map(|width| width * scale).collect()
}

fn usable_width() -> f32 {
    PAGE_WIDTH_PT - 2.0 * MARGIN_SIDE_PT
}

/// Cut `text` so it fits in `width` points, marking the cut with "..."
fn fit_text(text: &str, size: f32, width: f32) -> String {
    if text_width_pt(text, size) <= width {
        return text.to_string();
    }
    let max_chars = (width / (size * 0.5)).floor() as usize;
    let keep = max_chars.saturating_sub(3);
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str("...");
    cut
}

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

/// Rough Helvetica advance width, good enough for centering
fn text_width_pt(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5
}

struct Table<'a> {
    widths: Vec<f32>,
    left: f32,
    font: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
}

impl Table<'_> {
    fn draw_row(&self, layer: &PdfLayerReference, top: f32, cells: &[String], header: bool) {
        let total: f32 = self.widths.iter().sum();
        let bottom = top - ROW_HEIGHT_PT;

        if header {
            layer.set_fill_color(Color::Rgb(Rgb::new(1.0, 169.0 / 255.0, 77.0 / 255.0, None)));
            layer.add_rect(
                Rect::new(mm(self.left), mm(bottom), mm(self.left + total), mm(top))
                    .with_mode(PaintMode::Fill),
            );
        }

        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        let font = if header { self.bold } else { self.font };
        let mut x = self.left;
        for (cell, width) in cells.iter().zip(&self.widths) {
            let text = fit_text(cell, CELL_FONT_PT, width - 4.0);
            let text_x = x + (width - text_width_pt(&text, CELL_FONT_PT)).max(0.0) / 2.0;
            layer.use_text(text.as_str(), CELL_FONT_PT, mm(text_x), mm(bottom + 6.0), font);
            x += width;
        }

        layer.set_outline_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        layer.set_outline_thickness(GRID_THICKNESS_PT);
        let mut x = self.left;
        for width in self.widths.iter().chain(std::iter::once(&0.0)) {
            line(layer, (x, bottom), (x, top));
            x += width;
        }
        line(layer, (self.left, top), (self.left + total, top));
        line(layer, (self.left, bottom), (self.left + total, bottom));
    }
}

fn line(layer: &PdfLayerReference, from: (f32, f32), to: (f32, f32)) {
    layer.add_line(Line {
        points: vec![
            (Point::new(mm(from.0), mm(from.1)), false),
            (Point::new(mm(to.0), mm(to.1)), false),
        ],
        is_closed: false,
    });
}

/// Render the report; `site_label` is a site name or "All Sites"
pub fn render_pdf(site_label: &str, rows: &[ReportRow]) -> Result<Vec<u8>, ReportError> {
    let title = report_title(site_label);
    let (doc, first_page, first_layer) = PdfDocument::new(
        title.as_str(),
        mm(PAGE_WIDTH_PT),
        mm(PAGE_HEIGHT_PT),
        "Table",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError(e.to_string()))?;

    let widths = column_widths(rows);
    let total: f32 = widths.iter().sum();
    let table = Table {
        left: ((PAGE_WIDTH_PT - total) / 2.0).max(MARGIN_SIDE_PT),
        widths,
        font: &font,
        bold: &bold,
    };
    let headers = header_cells();

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    let title_top = PAGE_HEIGHT_PT - MARGIN_TOP_PT;
    let heading = fit_text(&title, TITLE_SIZE_PT, usable_width());
    layer.use_text(
        heading.as_str(),
        TITLE_SIZE_PT,
        mm(((PAGE_WIDTH_PT - text_width_pt(&heading, TITLE_SIZE_PT)) / 2.0).max(MARGIN_SIDE_PT)),
        mm(title_top - TITLE_SIZE_PT),
        &bold,
    );

    let mut top = title_top - TITLE_SIZE_PT - TITLE_GAP_PT;
    table.draw_row(&layer, top, &headers, true);
    top -= ROW_HEIGHT_PT;

    for row in rows {
        if top - ROW_HEIGHT_PT < MARGIN_BOTTOM_PT {
            let (page, page_layer) = doc.add_page(mm(PAGE_WIDTH_PT), mm(PAGE_HEIGHT_PT), "Table");
            layer = doc.get_page(page).get_layer(page_layer);
            top = PAGE_HEIGHT_PT - MARGIN_TOP_PT;
            table.draw_row(&layer, top, &headers, true);
            top -= ROW_HEIGHT_PT;
        }
        table.draw_row(&layer, top, &row.cells(), false);
        top -= ROW_HEIGHT_PT;
    }

    doc.save_to_bytes().map_err(|e| ReportError(e.to_string()))
}

/// Rows that fit on the first page, below the title and header
pub fn rows_on_first_page() -> usize {
    let usable = PAGE_HEIGHT_PT - MARGIN_TOP_PT - TITLE_SIZE_PT - TITLE_GAP_PT - ROW_HEIGHT_PT
        - MARGIN_BOTTOM_PT;
    (usable / ROW_HEIGHT_PT).floor() as usize
}
