use clap::Parser;
use kunquat_sheet::config::SheetConfig;
use kunquat_sheet::ui::SheetApp;
use std::path::PathBuf;

/// Kunquat sheet editor
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Module archive to open (.kqt, .kqt.gz, .kqt.bz2)
    path: Option<PathBuf>,

    /// Configuration file, instead of the one in the user config directory
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SheetConfig::load_or_default(path),
        None => SheetConfig::load(),
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 720.0])
            .with_title("Kunquat sheet"),
        ..Default::default()
    };

    eframe::run_native(
        "Kunquat sheet",
        native_options,
        Box::new(move |_cc| Ok(Box::new(SheetApp::new(config, args.path)))),
    )
}
