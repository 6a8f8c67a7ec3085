/// Entry point and frame loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossterm::event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::{execute, terminal};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::GameConfig;
use domain::entity::FrameInput;
use sim::assets::SpriteBook;
use sim::flow::{Flow, Services};
use sim::level::LevelLibrary;
use sim::save::{self, JsonProfileStore};
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::layout;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

fn main() -> ExitCode {
    let config = GameConfig::load();
    init_tracing(&config);
    for w in &config.warnings {
        warn!("config: {w}");
    }

    // Everything that can reject bad content loads before the terminal is taken
    let sprites = match SpriteBook::load(config.assets_dir.as_deref()) {
        Ok(book) => book,
        Err(e) => {
            error!(error = %e, "sprite loading failed");
            eprintln!("Cannot load sprites: {e}");
            return ExitCode::FAILURE;
        }
    };
    let levels = match LevelLibrary::open(&config.levels_dir) {
        Ok(lib) => lib,
        Err(e) => {
            error!(error = %e, "level loading failed");
            eprintln!("Cannot load levels: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(levels = levels.count(), "content loaded");

    let mut store = JsonProfileStore::new(save::profile_path(&config.profile_path));
    let (progress, notice) = save::load_or_default(&store);

    let viewport = terminal::size()
        .map(|(w, h)| Renderer::viewport_px(w, h))
        .unwrap_or((config.display.width, config.display.height));
    let mut flow = Flow::new(progress, viewport);
    if let Some(text) = notice {
        flow.set_notice(text);
    }

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return ExitCode::FAILURE;
    }

    let mut kb = InputState::new();
    kb.honor_release = enable_key_release();

    let mut rng = StdRng::from_entropy();
    let mut sound = SoundEngine::new();
    let mut svc = Services {
        levels: &levels,
        sprites: &sprites,
        config: &config,
        store: &mut store,
        rng: &mut rng,
    };

    let result = game_loop(&mut flow, &mut svc, &mut renderer, &mut kb, sound.as_mut());

    if kb.honor_release {
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    match result {
        Ok(()) => {
            info!("bye");
            println!("Thanks for playing Tilehop! Coins: {}", flow.progress.currency);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "game loop failed");
            eprintln!("Game error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to a file; the terminal belongs to the renderer.
fn init_tracing(config: &GameConfig) {
    let file = match File::create(&config.log_file) {
        Ok(f) => f,
        Err(_) => return,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .compact()
        .init();
}

/// Ask for key release events. Without them held keys expire on a timeout.
fn enable_key_release() -> bool {
    if !matches!(terminal::supports_keyboard_enhancement(), Ok(true)) {
        return false;
    }
    let flags = KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES | KeyboardEnhancementFlags::REPORT_EVENT_TYPES;
    execute!(std::io::stdout(), PushKeyboardEnhancementFlags(flags)).is_ok()
}

fn game_loop(
    flow: &mut Flow,
    svc: &mut Services,
    renderer: &mut Renderer,
    kb: &mut InputState,
    mut sound: Option<&mut SoundEngine>,
) -> std::io::Result<()> {
    let mut gp = GamepadState::new();
    gp.load_button_config(&svc.config.gamepad);
    let (mut term_w, mut term_h) = renderer.term_size();
    let mut force_draw = true;

    loop {
        let frame_start = Instant::now();
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            flow.request_close(svc);
        }
        if let Some((w, h)) = kb.resized() {
            renderer.resize(w, h);
            (term_w, term_h) = (w, h);
            let (vw, vh) = Renderer::viewport_px(w, h);
            flow.set_viewport(vw, vh);
            force_draw = true;
        }

        for key in kb.hotkeys().into_iter().chain(gp.hotkeys()) {
            if let Some(action) = flow.hotkey(key) {
                flow.dispatch(action, svc);
            }
        }
        if let Some(click) = kb.click() {
            let screen = layout::screen_for(flow, term_w, term_h);
            if let Some(action) = screen.registry.hit(click.col, click.row).cloned() {
                flow.dispatch(action, svc);
            }
        }
        if flow.is_terminated() {
            break;
        }

        let input = FrameInput {
            horizontal: kb.horizontal().or(gp.horizontal()),
            jump: kb.jump_held() || gp.jump_held(),
        };
        flow.tick(input, svc);

        let cues = flow.drain_cues();
        if let Some(engine) = sound.as_deref_mut() {
            for cue in cues {
                engine.play(cue);
            }
            engine.set_music(flow.wants_music());
        }

        if flow.take_dirty() || force_draw || flow.session().is_some() {
            let screen = layout::screen_for(flow, term_w, term_h);
            renderer.render(flow, &screen)?;
            force_draw = false;
        }

        let frame = Duration::from_secs(1) / flow.fps(&svc.config.speed);
        if let Some(rest) = frame.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    Ok(())
}
