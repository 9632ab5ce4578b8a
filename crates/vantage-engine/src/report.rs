use std::fmt::Write as _;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use vantage_contracts::address::sanitize_for_filename;
use vantage_contracts::analysis::{ImagePayload, SecurityAnalysis};
use vantage_contracts::events::now_utc_iso;
use vantage_contracts::markers::{marker_color, marker_label, marker_pixel};

use crate::imagery::decode_image_bytes;

/// What is on screen when the user exports: the current tile and the marker
/// drawn emphasised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportView {
    pub image: ImagePayload,
    pub highlighted_marker: Option<usize>,
}

pub trait ReportExporter: Send + Sync {
    fn export(
        &self,
        view: &ReportView,
        analysis: &SecurityAnalysis,
        address: &str,
    ) -> Result<PathBuf>;
}

/// Draws one dot per placement over the tile, coloured by placement index.
pub fn render_marker_overlay(
    image: &ImagePayload,
    analysis: &SecurityAnalysis,
    highlighted: Option<usize>,
) -> Result<RgbaImage> {
    let bytes = decode_image_bytes(image)?;
    let mut canvas = image::load_from_memory(&bytes)
        .context("view image could not be decoded")?
        .to_rgba8();
    let (width, height) = canvas.dimensions();
    let base_radius = (width.min(height) / 40).max(6) as i64;

    for (idx, placement) in analysis.placements.iter().enumerate() {
        let (cx, cy) = marker_pixel(&placement.coordinates, width, height);
        let radius = if highlighted == Some(idx) {
            base_radius * 3 / 2
        } else {
            base_radius
        };
        fill_circle(&mut canvas, cx, cy, radius + 2, Rgba([255, 255, 255, 255]));
        fill_circle(&mut canvas, cx, cy, radius, Rgba(marker_color(idx).rgba()));
    }
    Ok(canvas)
}

fn fill_circle(canvas: &mut RgbaImage, cx: i64, cy: i64, radius: i64, color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    let r2 = radius * radius;
    for y in (cy - radius).max(0)..=(cy + radius).min(i64::from(height) - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(i64::from(width) - 1) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= r2 {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub page_height: f64,
    pub content_width: f64,
    pub margin: f64,
    pub line_height: f64,
    pub chars_per_line: usize,
    pub block_gap: f64,
}

impl Default for PageLayout {
    fn default() -> Self {
        // A4 in points.
        Self {
            page_height: 842.0,
            content_width: 515.0,
            margin: 40.0,
            line_height: 14.0,
            chars_per_line: 88,
            block_gap: 12.0,
        }
    }
}

impl PageLayout {
    pub fn usable_height(&self) -> f64 {
        self.page_height - 2.0 * self.margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportBlock {
    Header,
    View,
    Overview,
    Placement(usize),
    Summary,
}

/// Greedy word-wrap line count; never less than one.
fn wrapped_lines(text: &str, chars_per_line: usize) -> usize {
    let width = chars_per_line.max(1);
    let mut lines = 1;
    let mut current = 0;
    for word in text.split_whitespace() {
        let len = word.chars().count();
        if current == 0 {
            current = len;
        } else if current + 1 + len <= width {
            current += 1 + len;
        } else {
            lines += 1;
            current = len;
        }
        while current > width {
            lines += 1;
            current -= width;
        }
    }
    lines
}

pub fn estimate_block_height(
    block: ReportBlock,
    analysis: &SecurityAnalysis,
    view_aspect: f64,
    layout: &PageLayout,
) -> f64 {
    let lh = layout.line_height;
    let cpl = layout.chars_per_line;
    match block {
        ReportBlock::Header => 3.0 * lh,
        ReportBlock::View => layout.content_width * view_aspect,
        ReportBlock::Overview => (1 + wrapped_lines(&analysis.overview, cpl)) as f64 * lh,
        ReportBlock::Placement(idx) => match analysis.placement(idx) {
            Some(placement) => {
                let lines = 2
                    + wrapped_lines(&placement.location, cpl)
                    + wrapped_lines(&placement.reason, cpl);
                lines as f64 * lh
            }
            None => 0.0,
        },
        ReportBlock::Summary => (2 + analysis.summary_items().len()) as f64 * lh,
    }
}

/// Flows blocks onto pages, starting a new page whenever the next block does
/// not fit in what is left. A block taller than a page gets a page to itself.
pub fn paginate(blocks: &[(ReportBlock, f64)], layout: &PageLayout) -> Vec<Vec<ReportBlock>> {
    let usable = layout.usable_height();
    let mut pages: Vec<Vec<ReportBlock>> = Vec::new();
    let mut current: Vec<ReportBlock> = Vec::new();
    let mut used = 0.0;
    for (block, height) in blocks {
        if !current.is_empty() && used + height > usable {
            pages.push(std::mem::take(&mut current));
            used = 0.0;
        }
        current.push(*block);
        used += height + layout.block_gap;
    }
    if !current.is_empty() {
        pages.push(current);
    }
    pages
}

/// Page one holds the header and the captured view; everything else flows
/// from page two.
fn layout_pages(
    analysis: &SecurityAnalysis,
    view_aspect: f64,
    layout: &PageLayout,
) -> Vec<Vec<ReportBlock>> {
    let mut flow = vec![ReportBlock::Overview];
    flow.extend((0..analysis.placements.len()).map(ReportBlock::Placement));
    if !analysis.summary_items().is_empty() {
        flow.push(ReportBlock::Summary);
    }
    let sized: Vec<(ReportBlock, f64)> = flow
        .into_iter()
        .map(|block| {
            (
                block,
                estimate_block_height(block, analysis, view_aspect, layout),
            )
        })
        .collect();

    let mut pages = vec![vec![ReportBlock::Header, ReportBlock::View]];
    pages.extend(paginate(&sized, layout));
    pages
}

/// Plain-text rendering used by the console.
pub fn render_report_text(analysis: &SecurityAnalysis, address: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Security camera plan for {address}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Overview");
    let _ = writeln!(out, "  {}", analysis.overview.trim());
    let _ = writeln!(out);
    let _ = writeln!(out, "Placements ({})", analysis.placements.len());
    for (idx, placement) in analysis.placements.iter().enumerate() {
        let _ = writeln!(
            out,
            "  [{}] {} - {} ({})",
            marker_label(idx),
            placement.location,
            placement.camera_type,
            marker_color(idx).hex()
        );
        let _ = writeln!(out, "      {}", placement.reason);
        let _ = writeln!(
            out,
            "      at x={:.1}% y={:.1}%",
            placement.coordinates.x, placement.coordinates.y
        );
    }
    let items = analysis.summary_items();
    if !items.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Equipment");
        for item in items {
            let _ = writeln!(out, "  {:<24} {}", item.camera_type, item.quantity);
        }
    }
    out
}

/// Writes a paginated, self-contained HTML report plus the captured view PNG.
pub struct HtmlReportExporter {
    out_dir: PathBuf,
    layout: PageLayout,
}

impl HtmlReportExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            layout: PageLayout::default(),
        }
    }

    fn render_block(
        &self,
        block: ReportBlock,
        analysis: &SecurityAnalysis,
        address: &str,
        view_src: &str,
    ) -> String {
        match block {
            ReportBlock::Header => format!(
                "<header><h1>Security Camera Placement Report</h1><div class='address'>{}</div><div class='generated'>Generated {}</div></header>",
                escape_html(address),
                escape_html(&now_utc_iso()),
            ),
            ReportBlock::View => format!(
                "<figure class='view'><img src='{view_src}' alt='Satellite view with camera markers'></figure>"
            ),
            ReportBlock::Overview => format!(
                "<section class='block'><h2>Overview</h2><p>{}</p></section>",
                escape_html(&analysis.overview)
            ),
            ReportBlock::Placement(idx) => {
                let Some(placement) = analysis.placement(idx) else {
                    return String::new();
                };
                format!(
                    "<section class='block placement'><h3><span class='swatch' style='background:{color}'>{label}</span>{location}</h3><div class='type'>{camera_type}</div><p>{reason}</p></section>",
                    color = marker_color(idx).hex(),
                    label = marker_label(idx),
                    location = escape_html(&placement.location),
                    camera_type = escape_html(&placement.camera_type),
                    reason = escape_html(&placement.reason),
                )
            }
            ReportBlock::Summary => {
                let rows: String = analysis
                    .summary_items()
                    .iter()
                    .map(|item| {
                        format!(
                            "<tr><td>{}</td><td>{}</td></tr>",
                            escape_html(&item.camera_type),
                            item.quantity
                        )
                    })
                    .collect();
                format!(
                    "<section class='block'><h2>Equipment Summary</h2><table><thead><tr><th>Camera type</th><th>Quantity</th></tr></thead><tbody>{rows}</tbody></table></section>"
                )
            }
        }
    }
}

impl ReportExporter for HtmlReportExporter {
    fn export(
        &self,
        view: &ReportView,
        analysis: &SecurityAnalysis,
        address: &str,
    ) -> Result<PathBuf> {
        let overlay = render_marker_overlay(&view.image, analysis, view.highlighted_marker)?;
        let (width, height) = overlay.dimensions();
        let view_aspect = f64::from(height) / f64::from(width.max(1));

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(overlay)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("view capture encode failed")?;

        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;
        let stem = format!("security_report_{}", sanitize_for_filename(address));
        let png_path = self.out_dir.join(format!("{stem}.png"));
        fs::write(&png_path, &png)
            .with_context(|| format!("failed to write {}", png_path.display()))?;

        let view_src = ImagePayload::new("image/png", BASE64.encode(&png)).to_data_url();
        let pages = layout_pages(analysis, view_aspect, &self.layout);
        let total = pages.len();
        let mut body = String::new();
        for (page_idx, page) in pages.into_iter().enumerate() {
            body.push_str("<div class='page'>");
            for block in page {
                body.push_str(&self.render_block(block, analysis, address, &view_src));
            }
            let _ = writeln!(
                body,
                "<footer>Page {} of {total}</footer></div>",
                page_idx + 1
            );
        }

        let html_doc = format!(
            "<!doctype html>\n<html>\n<head>\n  <meta charset='utf-8'>\n  <title>Security Report - {title}</title>\n  <style>\n    body {{ font-family: Arial, sans-serif; background: #f6f6f6; margin: 0; }}\n    .page {{ background: white; width: 210mm; min-height: 297mm; margin: 12px auto; padding: 14mm; box-sizing: border-box; position: relative; page-break-after: always; }}\n    header h1 {{ font-size: 20px; margin: 0 0 6px; }}\n    .address {{ font-size: 14px; color: #333; }}\n    .generated {{ font-size: 11px; color: #777; margin-bottom: 12px; }}\n    .view img {{ width: 100%; }}\n    .view {{ margin: 0; }}\n    .block {{ margin-bottom: 12px; font-size: 13px; }}\n    .swatch {{ display: inline-block; width: 20px; height: 20px; border-radius: 50%; color: white; text-align: center; line-height: 20px; font-size: 11px; margin-right: 8px; }}\n    .type {{ font-size: 12px; color: #555; }}\n    table {{ border-collapse: collapse; width: 100%; }}\n    th, td {{ border: 1px solid #ddd; padding: 4px 8px; text-align: left; }}\n    footer {{ position: absolute; bottom: 8mm; right: 14mm; font-size: 10px; color: #999; }}\n  </style>\n</head>\n<body>\n{body}</body>\n</html>\n",
            title = escape_html(address),
        );

        let html_path = self.out_dir.join(format!("{stem}.html"));
        fs::write(&html_path, html_doc)
            .with_context(|| format!("failed to write {}", html_path.display()))?;
        Ok(html_path)
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use vantage_contracts::analysis::{
        CameraPlacement, CameraSummaryItem, ImagePayload, MarkerCoordinates, SecurityAnalysis,
    };
    use vantage_contracts::markers::marker_color;

    use super::{
        escape_html, estimate_block_height, layout_pages, paginate, render_marker_overlay,
        render_report_text, wrapped_lines, HtmlReportExporter, PageLayout, ReportBlock,
        ReportExporter, ReportView,
    };
    use crate::dryrun::DryrunImagery;
    use crate::imagery::{ImageSize, ImageryProvider};

    fn sample(placements: usize, with_summary: bool) -> SecurityAnalysis {
        SecurityAnalysis {
            overview: "Detached house <with> a long driveway & garden.".to_string(),
            placements: (0..placements)
                .map(|idx| CameraPlacement {
                    location: format!("Spot {idx}"),
                    reason: "Covers the approach.".to_string(),
                    camera_type: "Dome".to_string(),
                    coordinates: MarkerCoordinates {
                        x: 10.0 + idx as f64 * 10.0,
                        y: 50.0,
                    },
                })
                .collect(),
            camera_summary: with_summary.then(|| {
                vec![CameraSummaryItem {
                    camera_type: "Dome".to_string(),
                    quantity: placements as u32,
                }]
            }),
        }
    }

    fn tile() -> ImagePayload {
        DryrunImagery
            .fetch_aerial_image("1 Main St", 21, ImageSize::new(100, 100))
            .expect("dryrun tile")
    }

    #[test]
    fn wrap_counts_lines() {
        assert_eq!(wrapped_lines("", 10), 1);
        assert_eq!(wrapped_lines("aaaa bbbb", 10), 1);
        assert_eq!(wrapped_lines("aaaa bbbb cccc", 10), 2);
        assert_eq!(wrapped_lines("abcdefghijklmnopqrstuvwxy", 10), 3);
    }

    #[test]
    fn paginate_breaks_when_block_does_not_fit() {
        let layout = PageLayout {
            page_height: 120.0,
            margin: 10.0,
            block_gap: 0.0,
            ..PageLayout::default()
        };
        // usable height is 100
        let blocks = vec![
            (ReportBlock::Overview, 40.0),
            (ReportBlock::Placement(0), 50.0),
            (ReportBlock::Placement(1), 20.0),
            (ReportBlock::Summary, 300.0),
        ];
        let pages = paginate(&blocks, &layout);
        assert_eq!(
            pages,
            vec![
                vec![ReportBlock::Overview, ReportBlock::Placement(0)],
                vec![ReportBlock::Placement(1)],
                vec![ReportBlock::Summary],
            ]
        );
    }

    #[test]
    fn first_page_is_header_and_view() {
        let analysis = sample(3, true);
        let pages = layout_pages(&analysis, 1.0, &PageLayout::default());
        assert_eq!(pages[0], vec![ReportBlock::Header, ReportBlock::View]);
        let flowed: Vec<ReportBlock> = pages[1..].iter().flatten().copied().collect();
        assert_eq!(flowed.first(), Some(&ReportBlock::Overview));
        assert_eq!(flowed.last(), Some(&ReportBlock::Summary));
        assert_eq!(flowed.len(), 5);
    }

    #[test]
    fn summary_block_only_when_present() {
        let analysis = sample(2, false);
        let pages = layout_pages(&analysis, 1.0, &PageLayout::default());
        assert!(!pages.iter().flatten().any(|block| *block == ReportBlock::Summary));
        assert_eq!(
            estimate_block_height(ReportBlock::Placement(9), &analysis, 1.0, &PageLayout::default()),
            0.0
        );
    }

    #[test]
    fn overlay_paints_markers_in_palette_colors() -> anyhow::Result<()> {
        let analysis = sample(2, false);
        let canvas = render_marker_overlay(&tile(), &analysis, None)?;
        assert_eq!(canvas.dimensions(), (100, 100));
        assert_eq!(canvas.get_pixel(10, 50).0, marker_color(0).rgba());
        assert_eq!(canvas.get_pixel(20, 50).0, marker_color(1).rgba());
        Ok(())
    }

    #[test]
    fn exporter_writes_html_and_png_named_from_address() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let exporter = HtmlReportExporter::new(temp.path());
        let analysis = sample(8, true);
        let view = ReportView {
            image: tile(),
            highlighted_marker: Some(1),
        };
        let path = exporter.export(&view, &analysis, "221B Baker St, London")?;

        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("security_report_221B_Baker_St__London.html")
        );
        assert!(temp
            .path()
            .join("security_report_221B_Baker_St__London.png")
            .exists());

        let html = fs::read_to_string(&path)?;
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("&lt;with&gt; a long driveway &amp; garden"));
        assert!(html.contains(&marker_color(7).hex()));
        assert!(html.contains("Equipment Summary"));
        assert!(html.contains("Page 1 of"));
        Ok(())
    }

    #[test]
    fn text_report_lists_placements_and_summary() {
        let text = render_report_text(&sample(2, true), "1 Main St");
        assert!(text.contains("Security camera plan for 1 Main St"));
        assert!(text.contains("[1] Spot 0 - Dome (#EF4444)"));
        assert!(text.contains("[2] Spot 1 - Dome (#3B82F6)"));
        assert!(text.contains("Equipment"));
    }

    #[test]
    fn escape_html_covers_quotes() {
        assert_eq!(escape_html("a'b\"c"), "a&#x27;b&quot;c");
    }
}
