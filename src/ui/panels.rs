//! UI panels for telemetry, the tracked-object list and the footer

use egui::{Color32, RichText, Ui};

use satmap::{Frame, ObjectId, Telemetry};

use crate::renderer::color32;

const STALE_COLOR: Color32 = Color32::from_rgb(200, 160, 90);

/// Format an instant as a UTC timestamp
pub fn format_instant(instant: &satkit::Instant) -> String {
    let micros = (instant.as_unixtime() * 1e6).round() as i64;
    match chrono::DateTime::from_timestamp_micros(micros) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "invalid time".to_string(),
    }
}

/// "<name> at <lat>°N, <lon>°E"
pub fn location_text(name: &str, telemetry: &Telemetry) -> String {
    format!(
        "{} at {:.2}°N, {:.2}°E",
        name, telemetry.subpoint.latitude_deg, telemetry.subpoint.longitude_deg
    )
}

/// One-line summary of a frame, for the log
pub fn frame_summary(frame: &Frame) -> String {
    let placed = frame.markers.iter().filter(|m| m.position.is_some()).count();
    let mut text = format!(
        "[{}] tick {} | {}/{} placed",
        format_instant(&frame.instant),
        frame.tick,
        placed,
        frame.markers.len()
    );
    match &frame.telemetry {
        Some(t) => {
            text.push_str(&format!(
                " | {} | {:.3} mi/s | {:.1} km",
                location_text(frame.selected.as_str(), t),
                t.speed_mi_s,
                t.distance_km
            ));
            if frame.telemetry_stale {
                text.push_str(" (stale)");
            }
        }
        None => text.push_str(&format!(" | {} unavailable", frame.selected)),
    }
    text
}

/// Location, speed and altitude of the selected object
pub struct TelemetryPanel;

impl TelemetryPanel {
    pub fn show(ui: &mut Ui, frame: Option<&Frame>) {
        let Some(frame) = frame else {
            ui.label("Waiting for first update...");
            return;
        };

        ui.horizontal(|ui| match &frame.telemetry {
            Some(telemetry) => {
                ui.heading(location_text(frame.selected.as_str(), telemetry));
                ui.separator();
                ui.label(format!("Speed: {:.3} mi/s", telemetry.speed_mi_s));
                ui.separator();
                ui.label(format!("Altitude: {:.1} km", telemetry.distance_km));
                if frame.telemetry_stale {
                    ui.colored_label(STALE_COLOR, "(stale)");
                }
            }
            None => {
                ui.heading(frame.selected.as_str());
                ui.separator();
                ui.colored_label(STALE_COLOR, "No position available");
            }
        });
    }
}

/// Tracked-object list; clicking a row selects it
#[derive(Default)]
pub struct BrowserPanel;

impl BrowserPanel {
    pub fn show(&mut self, ui: &mut Ui, frame: &Frame) -> Option<ObjectId> {
        let mut new_selection = None;

        ui.heading("Tracked");
        ui.separator();

        let row_height = ui.text_style_height(&egui::TextStyle::Body) + ui.spacing().item_spacing.y;
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show_rows(ui, row_height, frame.markers.len(), |ui, row_range| {
                for row in row_range {
                    let marker = &frame.markers[row];
                    let is_selected = marker.id == frame.selected;

                    let mut text = RichText::new(format!("● {}", marker.label));
                    text = if marker.position.is_some() {
                        text.color(color32(marker.color))
                    } else {
                        text.color(Color32::GRAY)
                    };

                    let response = ui.selectable_label(is_selected, text);
                    if response.clicked() && !is_selected {
                        new_selection = Some(marker.id.clone());
                    }

                    if marker.position.is_none() {
                        response.on_hover_text("No position yet");
                    }
                }
            });

        new_selection
    }
}

/// Element-set details for the selected object
pub struct DetailPanel;

impl DetailPanel {
    pub fn show(
        ui: &mut Ui,
        frame: &Frame,
        catalog_number: Option<u32>,
        element_age_days: Option<f64>,
    ) {
        ui.heading(frame.selected.as_str());
        ui.separator();

        egui::Grid::new("detail_grid")
            .num_columns(2)
            .spacing([10.0, 4.0])
            .show(ui, |ui| {
                if let Some(number) = catalog_number {
                    ui.label("NORAD ID:");
                    ui.label(format!("{}", number));
                    ui.end_row();
                }

                if let Some(age) = element_age_days {
                    ui.label("TLE Age:");
                    let color = if age < 7.0 {
                        Color32::from_rgb(100, 200, 100)
                    } else if age < 30.0 {
                        Color32::from_rgb(200, 200, 100)
                    } else {
                        Color32::from_rgb(200, 100, 100)
                    };
                    ui.colored_label(color, format!("{:.1} days", age));
                    ui.end_row();
                }

                if let Some(t) = &frame.telemetry {
                    ui.label("Latitude:");
                    ui.label(format!("{:.3}°", t.subpoint.latitude_deg));
                    ui.end_row();

                    ui.label("Longitude:");
                    ui.label(format!("{:.3}°", t.subpoint.longitude_deg));
                    ui.end_row();

                    ui.label("Speed:");
                    ui.label(format!("{:.3} mi/s", t.speed_mi_s));
                    ui.end_row();

                    ui.label("Range:");
                    ui.label(format!("{:.1} km", t.distance_km));
                    ui.end_row();
                }
            });

        if !frame.failures.is_empty() {
            ui.separator();
            ui.label(format!("Skipped this tick: {}", frame.failures.len()));
            for failure in &frame.failures {
                ui.colored_label(Color32::from_rgb(200, 100, 100), failure.to_string());
            }
        }
    }
}

/// Footer with the clock and a Quit button; returns true when Quit is pressed
pub fn show_footer(ui: &mut Ui, frame: Option<&Frame>) -> bool {
    let mut quit = false;
    ui.horizontal(|ui| {
        if ui.button("Quit").clicked() {
            quit = true;
        }
        if let Some(frame) = frame {
            ui.separator();
            ui.label(format!("Time: {}", format_instant(&frame.instant)));
            ui.separator();
            ui.label(format!("Tick {}", frame.tick));
        }
    });
    quit
}

#[cfg(test)]
mod tests {
    use super::*;
    use satmap::Subpoint;

    fn telemetry() -> Telemetry {
        Telemetry {
            speed_mi_s: 4.76,
            distance_km: 418.2,
            subpoint: Subpoint {
                latitude_deg: 12.345,
                longitude_deg: -45.678,
                altitude_km: 418.2,
            },
        }
    }

    fn frame(stale: bool, telemetry: Option<Telemetry>) -> Frame {
        Frame {
            tick: 3,
            instant: satkit::Instant::from_datetime(2026, 1, 29, 12, 0, 0.0).unwrap(),
            markers: Vec::new(),
            selected: ObjectId::new("ISS (ZARYA)"),
            telemetry,
            telemetry_stale: stale,
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_location_text() {
        assert_eq!(
            location_text("ISS (ZARYA)", &telemetry()),
            "ISS (ZARYA) at 12.35°N, -45.68°E"
        );
    }

    #[test]
    fn test_format_instant() {
        let instant = satkit::Instant::from_datetime(2026, 1, 29, 12, 30, 15.0).unwrap();
        assert_eq!(format_instant(&instant), "2026-01-29 12:30:15 UTC");
    }

    #[test]
    fn test_frame_summary_marks_stale() {
        let text = frame_summary(&frame(true, Some(telemetry())));
        assert!(text.contains("tick 3"));
        assert!(text.contains("4.760 mi/s"));
        assert!(text.ends_with("(stale)"));

        let text = frame_summary(&frame(false, None));
        assert!(text.ends_with("ISS (ZARYA) unavailable"));
    }
}
