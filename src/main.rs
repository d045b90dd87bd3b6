//! Hand of Gravity entry point
//!
//! The browser build wires DOM input and the frame loop into `Game` and
//! exposes physics hooks to the host page. The native build runs a scripted
//! headless playthrough against the configured backend.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::{Cell, RefCell};

    use glam::Vec3;
    use wasm_bindgen::prelude::*;
    use web_sys::{KeyboardEvent, MouseEvent};

    use hand_of_gravity::audio::web::WebAudioBackend;
    use hand_of_gravity::interaction::{InputSignal, Key, PointerButton};
    use hand_of_gravity::persistence::{ApiConfig, EhttpTransport, PersistenceClient};
    use hand_of_gravity::{Catalog, Game};

    type WebGame = Game<WebAudioBackend, EhttpTransport>;

    thread_local! {
        static GAME: RefCell<Option<WebGame>> = const { RefCell::new(None) };
        static LAST_TIME: Cell<f64> = const { Cell::new(0.0) };
    }

    fn with_game<R>(f: impl FnOnce(&mut WebGame) -> R) -> Option<R> {
        GAME.with(|cell| match cell.try_borrow_mut() {
            Ok(mut game) => game.as_mut().map(f),
            Err(_) => {
                log::warn!("Game busy, event dropped");
                None
            }
        })
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Logger already initialized".into());
        }

        log::info!("Hand of Gravity starting...");

        let catalog = match Catalog::builtin() {
            Ok(catalog) => catalog,
            Err(e) => {
                log::error!("Bundled catalog is broken: {}", e);
                return;
            }
        };
        let config = ApiConfig::default();
        log::info!("Backend: {}", config.api_base());
        let client = PersistenceClient::new(config, EhttpTransport);

        let mut game = Game::restore(catalog, WebAudioBackend::new(), client);
        game.open_menu();
        game.sync_with_backend();
        GAME.with(|cell| *cell.borrow_mut() = Some(game));

        setup_input_handlers();
        request_animation_frame();

        log::info!("Hand of Gravity running!");
    }

    fn setup_input_handlers() {
        let Some(window) = web_sys::window() else {
            return;
        };

        // Mouse down (also unlocks audio after the first gesture)
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let button = PointerButton::from_dom(event.button());
                with_game(|g| {
                    g.audio_mut().resume();
                    g.input(InputSignal::PointerDown(button));
                });
            });
            let _ = window
                .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse up
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let button = PointerButton::from_dom(event.button());
                with_game(|g| g.input(InputSignal::PointerUp(button)));
            });
            let _ = window
                .add_event_listener_with_callback("mouseup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Keyboard
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if event.repeat() {
                    return;
                }
                let key = Key::from_code(&event.code());
                if key == Key::Space {
                    event.prevent_default();
                }
                with_game(|g| {
                    g.audio_mut().resume();
                    g.input(InputSignal::KeyDown(key));
                });
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let key = Key::from_code(&event.code());
                with_game(|g| g.input(InputSignal::KeyUp(key)));
            });
            let _ =
                window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // A grab never outlives focus
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                with_game(|g| g.release_grab());
                log::info!("Grab released (window blur)");
            });
            let _ =
                window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame() {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(time: f64) {
        let last = LAST_TIME.with(|t| t.replace(time));
        let delta_ms = if last > 0.0 { time - last } else { 0.0 };

        with_game(|g| {
            g.frame(delta_ms);
            for notice in g.notices() {
                log::warn!("{}", notice);
            }
        });

        request_animation_frame();
    }

    // Hooks for the host page's physics and UI

    #[wasm_bindgen]
    pub fn enter_level(level_id: &str) -> Result<(), JsValue> {
        match with_game(|g| g.enter_level(level_id)) {
            Some(result) => result.map_err(|e| JsValue::from_str(&e.to_string())),
            None => Err(JsValue::from_str("game not running")),
        }
    }

    #[wasm_bindgen]
    pub fn leave_level() {
        with_game(|g| g.leave_level());
    }

    #[wasm_bindgen]
    pub fn restart_level() {
        with_game(|g| g.restart_level());
    }

    #[wasm_bindgen]
    pub fn pointer_moved(x: f32, y: f32, z: f32) {
        with_game(|g| g.pointer_moved(Vec3::new(x, y, z)));
    }

    #[wasm_bindgen]
    pub fn sync_body(body_id: &str, x: f32, y: f32, z: f32) {
        with_game(|g| g.sync_body(body_id, Vec3::new(x, y, z)));
    }

    #[wasm_bindgen]
    pub fn collision_enter(object_id: &str, zone_id: &str) {
        with_game(|g| g.collision_enter(object_id, zone_id));
    }

    #[wasm_bindgen]
    pub fn collision_exit(object_id: &str, zone_id: &str) {
        with_game(|g| g.collision_exit(object_id, zone_id));
    }

    #[wasm_bindgen]
    pub fn select_hand_skin(skin_id: &str) -> Result<(), JsValue> {
        match with_game(|g| g.select_hand_skin(skin_id)) {
            Some(result) => result.map_err(|e| JsValue::from_str(&e.to_string())),
            None => Err(JsValue::from_str("game not running")),
        }
    }

    /// Notices for the UI toast, oldest first
    #[wasm_bindgen]
    pub fn take_notices() -> js_sys::Array {
        let notices = with_game(|g| g.take_notices()).unwrap_or_default();
        notices.iter().map(|n| JsValue::from_str(n)).collect()
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Hand of Gravity (native) starting...");
    log::info!("Native mode is headless - serve the web build for the full game");

    if let Err(e) = headless::run() {
        log::error!("Playthrough failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::time::{Duration, Instant};

    use glam::Vec3;

    use hand_of_gravity::audio::SilentBackend;
    use hand_of_gravity::interaction::{InputSignal, Key};
    use hand_of_gravity::persistence::{ApiConfig, EhttpTransport, PersistenceClient};
    use hand_of_gravity::{Catalog, Game, ProfileStore};

    const FRAME_MS: f64 = 16.0;
    const CARRY_FRAMES: u32 = 30;
    /// How long to wait for outstanding requests before exiting
    const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

    type HeadlessGame = Game<SilentBackend, EhttpTransport>;

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let catalog = Catalog::builtin()?;
        let config = ApiConfig::default();
        log::info!("Backend: {}", config.api_base());
        let client = PersistenceClient::new(config, EhttpTransport);

        let mut game = Game::new(ProfileStore::new(catalog), SilentBackend::default(), client);
        game.open_menu();
        game.client().health_check();
        game.sync_with_backend();
        settle(&mut game);

        play_first_level(&mut game)?;
        game.leave_level();
        settle(&mut game);

        for notice in game.take_notices() {
            log::warn!("{}", notice);
        }

        let profile = game.profile();
        println!(
            "Completed {:?}, unlocked {:?}, achievements {:?} ({:.0}% done)",
            profile.completed_level_ids,
            profile.unlocked_level_ids,
            profile.unlocked_achievement_ids,
            game.store().progress_percent()
        );
        Ok(())
    }

    /// Carry every ball of the first level into its first target
    fn play_first_level(game: &mut HeadlessGame) -> Result<(), Box<dyn std::error::Error>> {
        let level = game
            .catalog()
            .first_level()
            .cloned()
            .ok_or("catalog has no levels")?;
        let target = level.targets.first().ok_or("first level has no target")?;
        game.enter_level(&level.id)?;
        game.frame(FRAME_MS);

        for ball in &level.balls {
            game.pointer_moved(ball.position);
            game.input(InputSignal::KeyDown(Key::Space));
            for step in 1..=CARRY_FRAMES {
                let t = step as f32 / CARRY_FRAMES as f32;
                let hand = ball.position.lerp(target.position + Vec3::Y, t);
                game.pointer_moved(hand);
                game.frame(FRAME_MS);
            }
            game.input(InputSignal::KeyUp(Key::Space));
            // Stand-in for the physics engine reporting the drop
            game.collision_enter(&ball.id, &target.id);
            game.frame(FRAME_MS);
        }

        log::info!(
            "{} finished in phase {:?}",
            level.name,
            game.controller().phase()
        );
        Ok(())
    }

    /// Keep framing until the backend has answered (or gave up)
    fn settle(game: &mut HeadlessGame) {
        let started = Instant::now();
        while game.client().in_flight() > 0 && started.elapsed() < SETTLE_TIMEOUT {
            std::thread::sleep(Duration::from_millis(FRAME_MS as u64));
            game.frame(FRAME_MS);
        }
        game.frame(FRAME_MS);
    }
}
