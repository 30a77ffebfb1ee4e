use std::{fs, io, sync::Mutex, time::{Duration, Instant}};

use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pomotask::{
    app::{handle_input, AppState, Control},
    ui::render_ui,
    Args, Config, Paths,
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
const TICK_RATE: Duration = Duration::from_millis(50);

fn init_logging(args: &Args, paths: &Paths) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pomotask={}", args.log_level())));

    match fs::OpenOptions::new().create(true).append(true).open(&paths.log) {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init(),
        Err(e) => eprintln!("Logging disabled, cannot open {}: {}", paths.log.display(), e),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let paths = Paths::new(&args.data_dir);
    paths.ensure_dirs()?;
    init_logging(&args, &paths);

    let mut config = Config::load(&paths.config);
    if !paths.config.exists() {
        if let Err(e) = config.save(&paths.config) {
            warn!("Failed to write default config: {}", e);
        }
    }
    config.apply_args(&args);

    info!(
        "Starting pomotask: task={}min break={}min tasks={}",
        config.work_duration,
        config.rest_duration,
        config.task_file.display()
    );

    let mut app = AppState::open(&config, &paths, args.fresh)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, &mut app);
    if res.is_err() {
        // still leave the task file and stashed timer in a usable state
        app.close(true);
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    info!("Exiting");
    res
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut AppState) -> Result<()> {
    let mut last_tick = Instant::now();
    app.update(chrono::Utc::now());

    loop {
        terminal.draw(|f| render_ui(f, app))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Control::Quit { keep_progress } = handle_input(key, app) {
                        app.close(keep_progress);
                        return Ok(());
                    }
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.update(chrono::Utc::now());
            last_tick = Instant::now();
        }
    }
}
