pub mod app;
pub mod error;
pub mod input;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod time;

use app::App;
use settings::RenderSettings;
use winit::event_loop::EventLoop;

pub use error::{DemoError, DeviceError, Result};

fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

pub fn run() -> Result<()> {
    init_logging();

    log::info!("Starting planar shadows demo");

    let settings = RenderSettings::load();
    let event_loop = EventLoop::new()?;
    let mut app = App::new(settings);

    event_loop.run_app(&mut app)?;
    let result = app.into_result();

    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }

    log::info!("Application shutdown complete");

    result
}
