use std::path::PathBuf;

use mgssr_crate_tools::config::load_toml;
use mgssr_crate_tools::init_log::init_log;
use mgssr_crate_tools::resource::MgssrPath;
use mgssr_demo_app::app::FloorCubeApp;
use mgssr_ssr::SsrSettings;

/// 用法：`ssr-floor-cube [settings.toml] [output-dir]`
fn main() -> anyhow::Result<()> {
    init_log();

    let mut args = std::env::args().skip(1);
    let settings_path = args.next().map(PathBuf::from).unwrap_or_else(|| MgssrPath::config_path("ssr.toml"));
    let settings: SsrSettings = if settings_path.exists() {
        load_toml(&settings_path)?
    } else {
        log::warn!("{:?} not found, using default SSR settings", settings_path);
        SsrSettings::default()
    };
    let output_dir = args.next().map(PathBuf::from).unwrap_or_else(|| MgssrPath::output_path(""));

    let mut app = FloorCubeApp::new(settings.validate()?, 320, 240)?;
    let frame = app.render_frame()?;

    log::info!("executed: {:?}", frame.report.executed);
    if !frame.report.culled.is_empty() {
        log::info!("culled: {:?}", frame.report.culled);
    }
    log::info!("SSR applied: {}, skipped: {:?}", frame.outcome.applied, frame.outcome.skipped);

    frame.save(&output_dir)
}
