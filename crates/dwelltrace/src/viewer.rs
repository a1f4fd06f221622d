use anyhow::{anyhow, Result};
use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, RichText, Sense, Stroke};
use std::path::Path;

use dwelltrace_backend::{load_records, ActivityRecord, LoadedLog};

use crate::controller::{ActiveView, PlotController, TimelineControls};
use crate::normalize::WindowNameNormalizer;
use crate::palette::palette_color;
use crate::summary::{self, BarChart};
use crate::timeline::{DisplayMode, Legend, TimelineLayout};

const AXIS_GUTTER_LEFT: f32 = 56.0;
const AXIS_GUTTER_BOTTOM: f32 = 40.0;
const TIMELINE_LABEL_GUTTER: f32 = 140.0;
const MIN_CHART_HEIGHT: f32 = 120.0;
const MAX_TIMELINE_ROW_HEIGHT: f32 = 48.0;

/// Loads `log_path` and blocks until the chart window is closed.
pub fn show(log_path: &Path, title_limit: usize) -> Result<()> {
    let loaded = load_records(log_path)?;
    if loaded.skipped_rows > 0 {
        tracing::warn!(
            skipped = loaded.skipped_rows,
            total = loaded.total_rows,
            "some activity log rows could not be read"
        );
    }

    let normalizer = WindowNameNormalizer::default().with_title_limit(title_limit);
    let app = PlotApp::new(log_path.display().to_string(), loaded, normalizer);
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 720.0])
            .with_min_inner_size([800.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "DwellTrace",
        native_options,
        Box::new(move |cc| {
            cc.egui_ctx.set_theme(egui::ThemePreference::Light);
            Ok(Box::new(app))
        }),
    )
    .map_err(|err| anyhow!("failed to start viewer: {err}"))
}

struct PlotApp {
    source: String,
    records: Vec<ActivityRecord>,
    skipped_rows: usize,
    total_secs: f64,
    by_app: BarChart,
    by_hour: BarChart,
    timeline: TimelineLayout,
    normalizer: WindowNameNormalizer,
    controller: PlotController,
}

impl PlotApp {
    fn new(source: String, loaded: LoadedLog, normalizer: WindowNameNormalizer) -> Self {
        let LoadedLog {
            records,
            skipped_rows,
            ..
        } = loaded;
        Self {
            source,
            total_secs: records.iter().map(|r| r.duration_seconds).sum(),
            by_app: summary::by_app(&records),
            by_hour: summary::by_hour(&records),
            timeline: TimelineLayout::build(&records, &normalizer),
            records,
            skipped_rows,
            normalizer,
            controller: PlotController::default(),
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (next, previous, toggle) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::ArrowRight),
                i.key_pressed(egui::Key::ArrowLeft),
                i.key_pressed(egui::Key::D),
            )
        });
        if next {
            self.controller.next();
        }
        if previous {
            self.controller.previous();
        }
        if toggle {
            self.controller.toggle_detail();
        }
    }

    fn draw_navigation(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("\u{2190} Previous").clicked() {
                self.controller.previous();
            }
            if ui.button("Next \u{2192}").clicked() {
                self.controller.next();
            }

            if let Some(mode) = self.controller.detail_mode() {
                ui.separator();
                if ui.button(mode.button_label()).clicked() {
                    self.controller.toggle_detail();
                }
            }

            ui.separator();
            let mut status = format!(
                "{} intervals | {} tracked | {}",
                self.records.len(),
                format_duration(self.total_secs.round() as i64),
                self.source
            );
            if self.skipped_rows > 0 {
                status.push_str(&format!(" | {} unreadable rows skipped", self.skipped_rows));
            }
            ui.label(status);
        });
    }
}

impl eframe::App for PlotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        egui::TopBottomPanel::bottom("navigation").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_navigation(ui);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            draw_view_header(
                ui,
                &self.controller.title(),
                view_subtitle(self.controller.detail_mode()),
            );
            ui.add_space(6.0);
            match self.controller.active() {
                ActiveView::ByApp => draw_bar_chart(ui, &self.by_app),
                ActiveView::Timeline(TimelineControls { mode }) => draw_timeline(
                    ui,
                    &self.timeline,
                    &self.records,
                    &self.normalizer,
                    *mode,
                ),
                ActiveView::ByHour => draw_bar_chart(ui, &self.by_hour),
            }
        });
    }
}

struct ChartColors {
    background: Color32,
    border: Color32,
    label: Color32,
    grid: Color32,
}

fn chart_colors(ui: &egui::Ui) -> ChartColors {
    if ui.visuals().dark_mode {
        ChartColors {
            background: Color32::from_rgb(28, 30, 32),
            border: Color32::from_rgb(86, 86, 86),
            label: Color32::from_rgb(190, 190, 190),
            grid: Color32::from_rgb(62, 62, 62),
        }
    } else {
        ChartColors {
            background: Color32::from_rgb(247, 247, 244),
            border: Color32::from_rgb(210, 210, 205),
            label: Color32::from_rgb(92, 92, 86),
            grid: Color32::from_rgb(218, 218, 213),
        }
    }
}

fn draw_empty(ui: &mut egui::Ui) {
    ui.centered_and_justified(|ui| {
        ui.label("No activity recorded.");
    });
}

fn draw_bar_chart(ui: &mut egui::Ui, chart: &BarChart) {
    if chart.is_empty() {
        draw_empty(ui);
        return;
    }

    let colors = chart_colors(ui);
    let size = egui::vec2(
        ui.available_width().max(200.0),
        ui.available_height().max(MIN_CHART_HEIGHT + AXIS_GUTTER_BOTTOM),
    );
    let (rect, _) = ui.allocate_exact_size(size, Sense::hover());
    let painter = ui.painter_at(rect);

    let plot = Rect::from_min_max(
        Pos2::new(rect.left() + AXIS_GUTTER_LEFT, rect.top() + 8.0),
        Pos2::new(rect.right() - 8.0, rect.bottom() - AXIS_GUTTER_BOTTOM),
    );
    painter.rect_filled(plot, 0.0, colors.background);

    let label_font = FontId::monospace(10.0);
    let step = nice_step(chart.max_minutes(), 6.0);
    let top = (chart.max_minutes() / step).ceil().max(1.0) * step;
    let mut tick = 0.0;
    while tick <= top + f64::EPSILON {
        let y = plot.bottom() - (tick / top) as f32 * plot.height();
        painter.line_segment(
            [Pos2::new(plot.left(), y), Pos2::new(plot.right(), y)],
            Stroke::new(1.0, colors.grid),
        );
        painter.text(
            Pos2::new(plot.left() - 6.0, y),
            Align2::RIGHT_CENTER,
            format_minutes(tick),
            label_font.clone(),
            colors.label,
        );
        tick += step;
    }

    let slot = plot.width() / chart.bars.len() as f32;
    let max_label_chars = ((slot / 6.5) as usize).max(3);
    for (idx, bar) in chart.bars.iter().enumerate() {
        let x0 = plot.left() + idx as f32 * slot + slot * 0.15;
        let x1 = plot.left() + (idx + 1) as f32 * slot - slot * 0.15;
        let height = (bar.minutes / top) as f32 * plot.height();
        let bar_rect = Rect::from_min_max(
            Pos2::new(x0, plot.bottom() - height),
            Pos2::new(x1.max(x0 + 1.0), plot.bottom()),
        );
        painter.rect_filled(bar_rect, 1.0, palette_color(idx));
        painter.text(
            Pos2::new((x0 + x1) / 2.0, plot.bottom() + 4.0),
            Align2::CENTER_TOP,
            clip_label(&bar.label, max_label_chars),
            label_font.clone(),
            colors.label,
        );
    }

    painter.rect_stroke(plot, 0.0, Stroke::new(1.0, colors.border));
    painter.text(
        Pos2::new(plot.center().x, rect.bottom() - 4.0),
        Align2::CENTER_BOTTOM,
        chart.x_label,
        FontId::proportional(12.0),
        colors.label,
    );
    painter.text(
        Pos2::new(rect.left() + 2.0, plot.top()),
        Align2::LEFT_TOP,
        chart.y_label,
        FontId::proportional(12.0),
        colors.label,
    );
}

fn draw_timeline(
    ui: &mut egui::Ui,
    layout: &TimelineLayout,
    records: &[ActivityRecord],
    normalizer: &WindowNameNormalizer,
    mode: DisplayMode,
) {
    if layout.is_empty() {
        draw_empty(ui);
        return;
    }

    let colors = chart_colors(ui);
    let legend = layout.legend(mode);
    let legend_rows = legend.entries.len().div_ceil(legend.columns.max(1));
    let legend_height = legend_rows as f32 * (legend.label_size + 8.0) + 8.0;

    let width = ui.available_width().max(200.0);
    let chart_height = (ui.available_height() - legend_height)
        .max(MIN_CHART_HEIGHT + AXIS_GUTTER_BOTTOM)
        .min(layout.rows().len() as f32 * MAX_TIMELINE_ROW_HEIGHT + AXIS_GUTTER_BOTTOM + 8.0);
    let (rect, _) = ui.allocate_exact_size(egui::vec2(width, chart_height), Sense::hover());
    let painter = ui.painter_at(rect);

    let plot = Rect::from_min_max(
        Pos2::new(rect.left() + TIMELINE_LABEL_GUTTER, rect.top() + 8.0),
        Pos2::new(rect.right() - 8.0, rect.bottom() - AXIS_GUTTER_BOTTOM),
    );
    painter.rect_filled(plot, 0.0, colors.background);

    let span = layout.span_minutes().max(f64::EPSILON);
    let x_for = |minutes: f64| plot.left() + (minutes / span) as f32 * plot.width();
    let row_height = plot.height() / layout.rows().len() as f32;
    let label_font = FontId::monospace(10.0);

    for offset in layout.ticks() {
        let x = x_for(offset);
        painter.line_segment(
            [Pos2::new(x, plot.top()), Pos2::new(x, plot.bottom())],
            Stroke::new(1.0, colors.grid),
        );
        painter.text(
            Pos2::new(x, plot.bottom() + 4.0),
            Align2::CENTER_TOP,
            layout.tick_label(offset),
            label_font.clone(),
            colors.label,
        );
    }

    for (row, app) in layout.rows().iter().enumerate() {
        let y = plot.top() + (row as f32 + 0.5) * row_height;
        painter.text(
            Pos2::new(plot.left() - 6.0, y),
            Align2::RIGHT_CENTER,
            clip_label(app, 20),
            label_font.clone(),
            colors.label,
        );
    }

    let hover = ui.interact(plot, ui.id().with("timeline_hover"), Sense::hover());
    let hover_pos = hover.hover_pos();
    let mut hovered = None;
    for bar in layout.bars() {
        let top = plot.top() + bar.row as f32 * row_height + row_height * 0.15;
        let bottom = plot.top() + (bar.row + 1) as f32 * row_height - row_height * 0.15;
        let x0 = x_for(bar.offset_minutes);
        let bar_rect = Rect::from_min_max(
            Pos2::new(x0, top),
            Pos2::new(x_for(bar.end_minutes()).max(x0 + 1.0), bottom),
        );
        painter.rect_filled(bar_rect, 1.0, palette_color(bar.color(mode)));
        if hover_pos.is_some_and(|pos| bar_rect.contains(pos)) {
            hovered = records.get(bar.record);
        }
    }
    painter.rect_stroke(plot, 0.0, Stroke::new(1.0, colors.border));
    let axis_label = match layout.origin() {
        Some(origin) => format!("Time of Day ({})", origin.format("%Y-%m-%d")),
        None => "Time of Day".to_owned(),
    };
    painter.text(
        Pos2::new(plot.center().x, rect.bottom() - 4.0),
        Align2::CENTER_BOTTOM,
        axis_label,
        FontId::proportional(12.0),
        colors.label,
    );

    if let Some(record) = hovered {
        egui::show_tooltip_at_pointer(
            ui.ctx(),
            ui.layer_id(),
            ui.id().with("timeline_hover_tooltip"),
            |ui| {
                ui.label(egui::RichText::new(&record.app).strong());
                let window = normalizer.normalize(&record.app, &record.window);
                if !window.is_empty() {
                    ui.label(window);
                }
                ui.label(format!(
                    "Duration: {}",
                    format_duration(record.duration_seconds.round() as i64)
                ));
                ui.label(format!(
                    "{} - {}",
                    record.start.format("%H:%M:%S"),
                    record.end.format("%H:%M:%S")
                ));
            },
        );
    }

    draw_legend(ui, &legend, legend_height, &colors);
}

fn draw_legend(ui: &mut egui::Ui, legend: &Legend, height: f32, colors: &ChartColors) {
    let width = ui.available_width().max(200.0);
    let (rect, _) = ui.allocate_exact_size(egui::vec2(width, height), Sense::hover());
    let painter = ui.painter_at(rect);

    let columns = legend.columns.max(1);
    let cell_width = (rect.width() - TIMELINE_LABEL_GUTTER) / columns as f32;
    let cell_height = legend.label_size + 8.0;
    let swatch = legend.label_size;
    let max_chars = ((cell_width - swatch - 12.0) / (legend.label_size * 0.6)).max(4.0) as usize;
    let font = FontId::proportional(legend.label_size);

    for (idx, entry) in legend.entries.iter().enumerate() {
        let (row, col) = (idx / columns, idx % columns);
        let x = rect.left() + TIMELINE_LABEL_GUTTER + col as f32 * cell_width;
        let y = rect.top() + 4.0 + row as f32 * cell_height;
        let swatch_rect = Rect::from_min_size(Pos2::new(x, y + 2.0), egui::vec2(swatch, swatch));
        painter.rect_filled(swatch_rect, 2.0, palette_color(entry.color));
        painter.text(
            Pos2::new(swatch_rect.right() + 6.0, swatch_rect.center().y),
            Align2::LEFT_CENTER,
            clip_label(&entry.label, max_chars),
            font.clone(),
            colors.label,
        );
    }
}

fn draw_view_header(ui: &mut egui::Ui, title: &str, subtitle: &str) {
    let colors = chart_colors(ui);
    ui.horizontal(|ui| {
        ui.label(RichText::new(title).size(20.0).strong());
        ui.add_space(8.0);
        ui.label(RichText::new(subtitle).small().color(colors.label));
    });
    let (rule, _) = ui.allocate_exact_size(egui::vec2(ui.available_width(), 3.0), Sense::hover());
    ui.painter()
        .hline(rule.x_range(), rule.center().y, Stroke::new(1.0, colors.border));
}

fn view_subtitle(mode: Option<DisplayMode>) -> &'static str {
    match mode {
        Some(DisplayMode::Simple) => "colored by app",
        Some(DisplayMode::Detailed) => "colored by app and window",
        None => "minutes tracked",
    }
}

/// Smallest 1/2/5 x 10^k step that splits `max` into at most `target` parts.
fn nice_step(max: f64, target: f64) -> f64 {
    if max <= 0.0 {
        return 1.0;
    }
    let raw = max / target;
    let magnitude = 10f64.powf(raw.log10().floor());
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|factor| factor * magnitude)
        .find(|step| *step >= raw)
        .unwrap_or(10.0 * magnitude)
}

fn format_minutes(minutes: f64) -> String {
    if minutes.fract().abs() < 1e-9 {
        format!("{minutes:.0}")
    } else {
        format!("{minutes:.1}")
    }
}

fn format_duration(seconds: i64) -> String {
    let secs = seconds.max(0);
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

fn clip_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let keep = max_chars.saturating_sub(1);
    let mut clipped: String = text.chars().take(keep).collect();
    clipped.push('\u{2026}');
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(app: &str, h: u32, m0: u32, m1: u32) -> ActivityRecord {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ActivityRecord::new(
            app,
            "",
            day.and_hms_opt(h, m0, 0).unwrap(),
            day.and_hms_opt(h, m1, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn nice_step_picks_round_values() {
        assert_eq!(nice_step(0.0, 6.0), 1.0);
        assert_eq!(nice_step(30.0, 6.0), 5.0);
        assert_eq!(nice_step(7.0, 6.0), 2.0);
        assert_eq!(nice_step(250.0, 6.0), 50.0);
    }

    #[test]
    fn labels_are_clipped_by_characters() {
        assert_eq!(clip_label("chrome.exe", 20), "chrome.exe");
        assert_eq!(clip_label("verylongapplication", 5), "very\u{2026}");
        assert_eq!(format_duration(3725), "01:02:05");
        assert_eq!(format_minutes(15.0), "15");
        assert_eq!(format_minutes(0.5), "0.5");
    }

    #[test]
    fn app_state_is_built_from_loaded_log() {
        let loaded = LoadedLog {
            records: vec![record("code", 9, 0, 30), record("chrome", 14, 0, 15)],
            total_rows: 3,
            skipped_rows: 1,
        };
        let app = PlotApp::new("activity.csv".to_owned(), loaded, WindowNameNormalizer::default());

        assert_eq!(app.total_secs, 2700.0);
        assert_eq!(app.by_app.bars.len(), 2);
        assert_eq!(app.by_hour.bars.len(), 2);
        assert_eq!(app.timeline.rows().len(), 2);
        assert_eq!(app.skipped_rows, 1);
        assert_eq!(app.controller.title(), "Time per App (1/3)");
    }

    #[test]
    fn empty_log_builds_empty_views() {
        let app = PlotApp::new(
            "activity.csv".to_owned(),
            LoadedLog::default(),
            WindowNameNormalizer::default(),
        );
        assert!(app.by_app.is_empty());
        assert!(app.by_hour.is_empty());
        assert!(app.timeline.is_empty());
    }

    #[test]
    fn header_subtitle_follows_detail_toggle() {
        let mut controller = PlotController::default();
        assert_eq!(view_subtitle(controller.detail_mode()), "minutes tracked");
        controller.next();
        assert_eq!(view_subtitle(controller.detail_mode()), "colored by app");
        controller.toggle_detail();
        assert_eq!(view_subtitle(controller.detail_mode()), "colored by app and window");
    }
}
