//! Backend client
//!
//! Requests are fire-and-forget. Each finished request drops an
//! [`ApiResponse`] into a shared pending queue (Arc<Mutex>, ehttp callbacks
//! must be Send) which the game drains once per frame. Nothing here ever
//! blocks the frame loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::cache::{DEFAULT_TTL_MS, ResponseCache};
use super::error::ApiError;
use super::wire::{
    ApiEnvelope, CompleteLevelRequest, HealthDto, LevelDto, PlayerStateDto, SelectHandSkinRequest,
    SessionStarted, StartSessionRequest, UpdateSettingsRequest, UpdateStatsRequest,
};
use crate::level::LevelDefinition;
use crate::platform;
use crate::profile::settings::Settings;
use crate::profile::unlocks::{Achievement, HandSkin};
use crate::profile::{GameProfile, LevelCompletion, PersistRequest};

pub const API_PREFIX: &str = "/api";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Scheme and host, no trailing slash
    pub base_url: String,
    pub player_id: String,
    pub cache_ttl_ms: f64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: platform::backend_url(),
            player_id: "default".to_string(),
            cache_ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn api_base(&self) -> String {
        format!("{}{}", self.base_url, API_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// JSON body for POSTs
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// `Err` means no response was received at all
pub type TransportResult = Result<HttpResponse, String>;

pub type TransportCallback = Box<dyn FnOnce(TransportResult) + Send + 'static>;

/// Sends one HTTP request and calls back exactly once
pub trait Transport {
    fn send(&self, request: HttpRequest, on_done: TransportCallback);
}

/// Real network transport (browser `fetch` on wasm, a worker thread natively)
#[derive(Debug, Default, Clone, Copy)]
pub struct EhttpTransport;

impl Transport for EhttpTransport {
    fn send(&self, request: HttpRequest, on_done: TransportCallback) {
        let mut req = match request.method {
            Method::Get => ehttp::Request::get(&request.url),
            Method::Post => ehttp::Request::post(&request.url, request.body),
        };
        req.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        ehttp::fetch(req, move |result| {
            on_done(result.map(|resp| HttpResponse {
                status: resp.status,
                body: resp.bytes,
            }));
        });
    }
}

/// Which request a response belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    FetchGameState,
    FetchLevels,
    FetchLevel(String),
    FetchHandSkins,
    FetchAchievements,
    CompleteLevel(String),
    SelectHandSkin(String),
    UpdateSettings,
    StartSession(String),
    UpdateStats,
    HealthCheck,
}

impl ApiCall {
    /// Short human label for notices
    pub fn describe(&self) -> &'static str {
        match self {
            ApiCall::FetchGameState => "load game state",
            ApiCall::FetchLevels | ApiCall::FetchLevel(_) => "load levels",
            ApiCall::FetchHandSkins => "load hand skins",
            ApiCall::FetchAchievements => "load achievements",
            ApiCall::CompleteLevel(_) => "save level completion",
            ApiCall::SelectHandSkin(_) => "save hand skin",
            ApiCall::UpdateSettings => "save settings",
            ApiCall::StartSession(_) => "start game session",
            ApiCall::UpdateStats => "save statistics",
            ApiCall::HealthCheck => "reach server",
        }
    }

    fn cacheable(&self) -> bool {
        matches!(
            self,
            ApiCall::FetchLevels
                | ApiCall::FetchLevel(_)
                | ApiCall::FetchHandSkins
                | ApiCall::FetchAchievements
        )
    }
}

/// Decoded payload of a successful call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiReply {
    GameState(Box<GameProfile>),
    Levels(Vec<LevelDefinition>),
    Level(Box<LevelDefinition>),
    HandSkins(Vec<HandSkin>),
    Achievements(Vec<Achievement>),
    Acknowledged,
    SessionStarted { session_id: String },
    Health(HealthDto),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub call: ApiCall,
    pub result: Result<ApiReply, ApiError>,
}

fn open_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ApiError> {
    let envelope: ApiEnvelope<T> = serde_json::from_slice(body)?;
    if !envelope.success {
        return Err(ApiError::Unknown {
            status,
            message: envelope.message,
        });
    }
    envelope
        .data
        .ok_or_else(|| ApiError::client("response carried no data"))
}

/// Acknowledgement only; `data` may be absent
fn expect_success(status: u16, body: &[u8]) -> Result<ApiReply, ApiError> {
    let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_slice(body)?;
    if envelope.success {
        Ok(ApiReply::Acknowledged)
    } else {
        Err(ApiError::Unknown {
            status,
            message: envelope.message,
        })
    }
}

/// Turn a 2xx body into the reply for `call`
fn decode(call: &ApiCall, status: u16, body: &[u8]) -> Result<ApiReply, ApiError> {
    match call {
        ApiCall::FetchGameState => {
            let dto: PlayerStateDto = open_envelope(status, body)?;
            Ok(ApiReply::GameState(Box::new(dto.into())))
        }
        ApiCall::FetchLevels => {
            let dtos: Vec<LevelDto> = open_envelope(status, body)?;
            let mut levels: Vec<LevelDefinition> = dtos.into_iter().map(Into::into).collect();
            levels.sort_by_key(|l| l.order);
            Ok(ApiReply::Levels(levels))
        }
        // Single level comes back bare, without the envelope
        ApiCall::FetchLevel(_) => {
            let dto: LevelDto = serde_json::from_slice(body)?;
            Ok(ApiReply::Level(Box::new(dto.into())))
        }
        ApiCall::FetchHandSkins => Ok(ApiReply::HandSkins(open_envelope(status, body)?)),
        ApiCall::FetchAchievements => Ok(ApiReply::Achievements(open_envelope(status, body)?)),
        ApiCall::StartSession(_) => {
            let started: SessionStarted = open_envelope(status, body)?;
            Ok(ApiReply::SessionStarted {
                session_id: started.session_id,
            })
        }
        ApiCall::HealthCheck => Ok(ApiReply::Health(serde_json::from_slice(body)?)),
        ApiCall::CompleteLevel(_)
        | ApiCall::SelectHandSkin(_)
        | ApiCall::UpdateSettings
        | ApiCall::UpdateStats => expect_success(status, body),
    }
}

type Pending = Arc<Mutex<Vec<ApiResponse>>>;

fn push_response(pending: &Pending, response: ApiResponse) {
    match pending.lock() {
        Ok(mut queue) => queue.push(response),
        Err(poisoned) => poisoned.into_inner().push(response),
    }
}

pub struct PersistenceClient<T: Transport> {
    config: ApiConfig,
    transport: T,
    pending: Pending,
    cache: Arc<Mutex<ResponseCache<Vec<u8>>>>,
    in_flight: Arc<AtomicUsize>,
}

impl<T: Transport> PersistenceClient<T> {
    pub fn new(config: ApiConfig, transport: T) -> Self {
        let cache = ResponseCache::new(config.cache_ttl_ms);
        Self {
            config,
            transport,
            pending: Arc::new(Mutex::new(Vec::new())),
            cache: Arc::new(Mutex::new(cache)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Requests sent but not yet answered
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Take every response that arrived since the last call
    pub fn drain(&self) -> Vec<ApiResponse> {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn player_query(&self) -> String {
        format!("player_id={}", self.config.player_id)
    }

    pub fn fetch_game_state(&self) {
        let path = format!("/game/state?{}", self.player_query());
        self.get(ApiCall::FetchGameState, &path);
    }

    pub fn fetch_levels(&self) {
        self.get(ApiCall::FetchLevels, "/game/levels");
    }

    pub fn fetch_level(&self, level_id: &str) {
        let path = format!("/game/levels/{}", level_id);
        self.get(ApiCall::FetchLevel(level_id.to_string()), &path);
    }

    pub fn fetch_hand_skins(&self) {
        self.get(ApiCall::FetchHandSkins, "/game/hand-skins");
    }

    pub fn fetch_achievements(&self) {
        self.get(ApiCall::FetchAchievements, "/game/achievements");
    }

    pub fn health_check(&self) {
        self.get(ApiCall::HealthCheck, "/");
    }

    pub fn complete_level(&self, completion: &LevelCompletion) {
        let path = format!("/game/complete-level?{}", self.player_query());
        self.post(
            ApiCall::CompleteLevel(completion.level_id.clone()),
            &path,
            &CompleteLevelRequest::from(completion),
        );
    }

    pub fn select_hand_skin(&self, skin_id: &str) {
        let path = format!("/game/select-hand-skin?{}", self.player_query());
        self.post(
            ApiCall::SelectHandSkin(skin_id.to_string()),
            &path,
            &SelectHandSkinRequest {
                hand_skin_id: skin_id.to_string(),
            },
        );
    }

    pub fn update_settings(&self, settings: &Settings) {
        let path = format!("/game/settings?{}", self.player_query());
        self.post(
            ApiCall::UpdateSettings,
            &path,
            &UpdateSettingsRequest {
                settings: settings.clone(),
            },
        );
    }

    pub fn start_session(&self, level_id: &str) {
        let path = format!("/game/start-session?{}", self.player_query());
        self.post(
            ApiCall::StartSession(level_id.to_string()),
            &path,
            &StartSessionRequest {
                level_id: level_id.to_string(),
            },
        );
    }

    pub fn update_stats(&self, stats: &UpdateStatsRequest) {
        let path = format!("/game/update-stats?{}", self.player_query());
        self.post(ApiCall::UpdateStats, &path, stats);
    }

    /// Send whatever the profile store queued
    pub fn persist(&self, request: &PersistRequest) {
        match request {
            PersistRequest::CompleteLevel(completion) => self.complete_level(completion),
            PersistRequest::SelectHandSkin(skin_id) => self.select_hand_skin(skin_id),
            PersistRequest::UpdateSettings(settings) => self.update_settings(settings),
        }
    }

    fn get(&self, call: ApiCall, path: &str) {
        let url = format!("{}{}", self.config.api_base(), path);

        if call.cacheable()
            && let Some(body) = self
                .cache
                .lock()
                .ok()
                .and_then(|mut c| c.get(&url, platform::now_ms()))
        {
            log::debug!("API Cache hit: {}", url);
            let result = decode(&call, 200, &body);
            push_response(&self.pending, ApiResponse { call, result });
            return;
        }

        self.send(
            call,
            HttpRequest {
                method: Method::Get,
                url,
                body: Vec::new(),
            },
        );
    }

    fn post<B: Serialize>(&self, call: ApiCall, path: &str, body: &B) {
        let url = format!("{}{}", self.config.api_base(), path);
        let body = match serde_json::to_vec(body) {
            Ok(body) => body,
            Err(e) => {
                log::error!("API Request Error: {} {}: {}", Method::Post.as_str(), url, e);
                push_response(
                    &self.pending,
                    ApiResponse {
                        call,
                        result: Err(e.into()),
                    },
                );
                return;
            }
        };
        self.send(
            call,
            HttpRequest {
                method: Method::Post,
                url,
                body,
            },
        );
    }

    fn send(&self, call: ApiCall, request: HttpRequest) {
        log::info!("API Request: {} {}", request.method.as_str(), request.url);

        let pending = Arc::clone(&self.pending);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let url = request.url.clone();
        in_flight.fetch_add(1, Ordering::SeqCst);

        self.transport.send(
            request,
            Box::new(move |result| {
                let result = match result {
                    Ok(resp) if resp.is_success() => {
                        log::info!("API Response: {} {}", resp.status, url);
                        if call.cacheable()
                            && let Ok(mut cache) = cache.lock()
                        {
                            cache.set(url.clone(), resp.body.clone(), platform::now_ms());
                        }
                        decode(&call, resp.status, &resp.body)
                    }
                    Ok(resp) => {
                        log::error!("API Response Error: {} {}", resp.status, url);
                        Err(ApiError::from_status(resp.status, &resp.body))
                    }
                    Err(e) => {
                        log::error!("API Request Error: {}: {}", url, e);
                        Err(ApiError::network(e))
                    }
                };
                if let Err(e) = &result {
                    log::warn!("API Error in {}: {} ({})", call.describe(), e, e.kind());
                }
                in_flight.fetch_sub(1, Ordering::SeqCst);
                push_response(&pending, ApiResponse { call, result });
            }),
        );
    }
}
