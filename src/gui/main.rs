// GUI entry point for heiya
// Pick files or folders, tick the output formats, convert

use eframe::egui;

mod app;
use app::HeiyaApp;

fn main() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([560.0, 420.0])
            .with_min_inner_size([400.0, 300.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Heiya GUI",
        options,
        Box::new(|cc| Ok(Box::new(HeiyaApp::new(cc)))),
    )
}
