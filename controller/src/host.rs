use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use chrono_tz::Tz;
use rumqttc::{AsyncClient, Event, Incoming, LastWill, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot, watch, Mutex},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use cooker_common::{
    card::{self, Block, CardError, CardField},
    CookCycleEngine, CookRecipe, ControllerStatus, EngineAction, Preset, RemoteCommand,
    RuntimeConfig, TickInput, WakeReason, MAX_VOLUME, TOPIC_CONTROLLER_ONLINE,
    TOPIC_CONTROLLER_STATE, TOPIC_PHASE, TOPIC_REMOTE_COMMAND,
};

use crate::hardware::{AudioPlayer, LedStrip, SimulatedCardSlot, SimulatedOven, ThermalModel};

const MAX_MQTT_PAYLOAD_BYTES: usize = 64;
const INPUT_QUEUE_DEPTH: usize = 32;

/// Everything the outside world can do to the cooker. Delivered to the control
/// loop, which is the only owner of the engine and the hardware.
#[derive(Debug)]
enum ControlInput {
    ButtonPressed,
    Remote(RemoteCommand),
    Door { open: bool },
    TapCard {
        blocks: [Block; 3],
        failing_block: Option<u8>,
    },
    WriteCard {
        recipe: CookRecipe,
        reply: oneshot::Sender<Result<[Block; 3], CardError>>,
    },
    SetVolume(u8),
    SensorFault(bool),
}

#[derive(Clone)]
struct AppState {
    inputs: mpsc::Sender<ControlInput>,
    status: watch::Receiver<ControllerStatus>,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct Queued {
    queued: &'static str,
}

/// Raw card contents as text, one field per data block.
#[derive(Debug, Serialize, Deserialize)]
struct CardContents {
    name: String,
    temp: String,
    time: String,
    #[serde(rename = "failingBlock", default, skip_serializing)]
    failing_block: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct CardWriteRequest {
    name: String,
    #[serde(rename = "targetTemp")]
    target_temp_f: i32,
    #[serde(rename = "durationMin")]
    duration_min: u64,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });

    let timezone = runtime.timezone.parse::<Tz>().unwrap_or_else(|err| {
        warn!("invalid timezone '{}', using UTC: {err}", runtime.timezone);
        chrono_tz::UTC
    });

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options =
        MqttOptions::new(runtime.network.client_id.clone(), mqtt_host, mqtt_port);
    mqtt_options.set_keep_alive(Duration::from_secs(120));
    mqtt_options.set_last_will(LastWill::new(
        TOPIC_CONTROLLER_ONLINE,
        "offline",
        QoS::AtLeastOnce,
        true,
    ));
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);
    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_DEPTH);

    let control = ControlLoop::new(runtime, timezone, store, mqtt.clone(), input_rx);
    let status = control.status_receiver();

    spawn_mqtt_loop(mqtt, eventloop, input_tx.clone());
    tokio::spawn(control.run());

    let app_state = AppState {
        inputs: input_tx,
        status,
    };

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/button", post(handle_button))
        .route("/api/door", post(handle_door))
        .route("/api/card", post(handle_tap_card))
        .route("/api/card/write", post(handle_write_card))
        .route("/api/remote", post(handle_remote))
        .route("/api/volume", post(handle_volume))
        .route("/api/sensor", post(handle_sensor))
        .with_state(app_state);

    let port = std::env::var("COOKER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;
    info!("controller stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}

fn spawn_mqtt_loop(
    mqtt: AsyncClient,
    mut eventloop: rumqttc::EventLoop,
    inputs: mpsc::Sender<ControlInput>,
) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&inputs, &message.topic, &message.payload).await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    // Clean sessions drop subscriptions, so renew them on every connect.
                    if let Err(err) = mqtt.try_subscribe(TOPIC_REMOTE_COMMAND, QoS::AtMostOnce) {
                        warn!("remote feed subscribe failed: {err}");
                    }
                    if let Err(err) =
                        mqtt.try_publish(TOPIC_CONTROLLER_ONLINE, QoS::AtLeastOnce, true, "online")
                    {
                        warn!("online status publish failed: {err}");
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

async fn handle_mqtt_message(
    inputs: &mpsc::Sender<ControlInput>,
    topic: &str,
    payload: &[u8],
) -> anyhow::Result<()> {
    if topic != TOPIC_REMOTE_COMMAND {
        return Ok(());
    }
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {topic} ({} bytes)",
            payload.len()
        );
        return Ok(());
    }

    let message = std::str::from_utf8(payload).context("non utf8 mqtt payload")?;
    let command = RemoteCommand::parse_payload(message)?;
    info!("remote command {command:?}");
    inputs
        .send(ControlInput::Remote(command))
        .await
        .context("control loop stopped")?;
    Ok(())
}

/// Remote commands waiting for the next tick, folded so a burst of feed
/// messages cannot grow without bound. Sleep beats anything queued before it.
#[derive(Debug, Default, PartialEq, Eq)]
struct PendingRemote {
    sleep: bool,
    preset: Option<Preset>,
    volume_steps: i16,
}

impl PendingRemote {
    fn push(&mut self, command: RemoteCommand) {
        let limit = i16::from(MAX_VOLUME);
        match command {
            RemoteCommand::Sleep => {
                self.sleep = true;
                self.preset = None;
            }
            RemoteCommand::Cook(preset) => self.preset = Some(preset),
            RemoteCommand::VolumeUp => {
                self.volume_steps = (self.volume_steps + 1).min(limit);
            }
            RemoteCommand::VolumeDown => {
                self.volume_steps = (self.volume_steps - 1).max(-limit);
            }
        }
    }

    /// The command the engine sees this tick. A preset that arrived after a
    /// sleep waits for the following tick.
    fn take_command(&mut self) -> Option<RemoteCommand> {
        if std::mem::take(&mut self.sleep) {
            return Some(RemoteCommand::Sleep);
        }
        self.preset.take().map(RemoteCommand::Cook)
    }

    fn take_volume(&mut self, current: u8) -> Option<u8> {
        match std::mem::take(&mut self.volume_steps) {
            0 => None,
            steps => {
                let volume = (i16::from(current) + steps).clamp(0, i16::from(MAX_VOLUME));
                u8::try_from(volume).ok()
            }
        }
    }
}

struct ControlLoop {
    engine: CookCycleEngine,
    runtime: RuntimeConfig,
    timezone: Tz,
    store: AppStore,
    mqtt: AsyncClient,

    oven: SimulatedOven,
    card_slot: SimulatedCardSlot,
    leds: LedStrip,
    audio: AudioPlayer,

    inputs: mpsc::Receiver<ControlInput>,
    status: watch::Sender<ControllerStatus>,
    pending_button: bool,
    pending_remote: PendingRemote,
}

impl ControlLoop {
    fn new(
        runtime: RuntimeConfig,
        timezone: Tz,
        store: AppStore,
        mqtt: AsyncClient,
        inputs: mpsc::Receiver<ControlInput>,
    ) -> Self {
        let engine = CookCycleEngine::new(
            runtime.cooker.clone(),
            runtime.settings.clone(),
            &runtime.light,
        );
        let (status, _) = watch::channel(engine.status(monotonic_ms()));

        Self {
            oven: SimulatedOven::new(ThermalModel::default()),
            card_slot: SimulatedCardSlot::default(),
            leds: LedStrip::new(runtime.light.pixel_count, runtime.light.brightness),
            audio: AudioPlayer::new(engine.settings().volume),
            engine,
            runtime,
            timezone,
            store,
            mqtt,
            inputs,
            status,
            pending_button: false,
            pending_remote: PendingRemote::default(),
        }
    }

    fn status_receiver(&self) -> watch::Receiver<ControllerStatus> {
        self.status.subscribe()
    }

    async fn run(mut self) {
        let mut ticks =
            tokio::time::interval(Duration::from_millis(self.engine.config.tick_interval_ms));
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut publishes = tokio::time::interval(Duration::from_millis(
            self.engine.config.state_publish_interval_ms,
        ));
        publishes.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticks.tick() => self.tick().await,
                _ = publishes.tick() => self.publish_state(),
                input = self.inputs.recv() => match input {
                    Some(input) => self.apply_input(input).await,
                    None => break,
                },
            }
        }
        info!("control loop stopped");
    }

    async fn tick(&mut self) {
        let now_ms = monotonic_ms();
        self.oven.advance(now_ms);

        let card = if self.engine.wants_recipe() {
            card::read_recipe(&mut self.card_slot, self.engine.config.card_format()).transpose()
        } else {
            None
        };

        if let Some(volume) = self.pending_remote.take_volume(self.engine.settings().volume) {
            let actions = self.engine.set_volume(volume);
            let _ = self.execute(actions).await;
        }

        let input = TickInput {
            button_pressed: std::mem::take(&mut self.pending_button),
            remote: self.pending_remote.take_command(),
            card,
            thermocouple: Some(self.oven.read_thermocouple()),
            door_open: self.oven.door_open(),
        };

        let actions = self.engine.tick(now_ms, input);
        if let Some(timeout_ms) = self.execute(actions).await {
            self.refresh_status();
            let reason = self.sleep(timeout_ms).await;
            info!("woke from sleep: {}", reason.as_str());
        }
        self.refresh_status();
    }

    /// Runs engine actions in order. A sleep request is returned rather than
    /// honoured so the announcements around it still go out first.
    async fn execute(&mut self, actions: Vec<EngineAction>) -> Option<u64> {
        let mut sleep_request = None;
        for action in actions {
            match action {
                EngineAction::SetRelay(on) => {
                    self.oven.set_relay(on);
                    info!("relay {}", if on { "energized" } else { "de-energized" });
                }
                EngineAction::Notify {
                    message,
                    temperature_f,
                } => self.display(&message, temperature_f),
                EngineAction::FillColor { start, end, color } => self.leds.fill(start, end, color),
                EngineAction::PlayClip(clip) => self.audio.play(clip),
                EngineAction::SetVolume(volume) => {
                    self.audio.set_volume(volume);
                    self.persist_settings().await;
                }
                EngineAction::PublishPhase(phase) => {
                    info!("phase -> {}", phase.as_str());
                    if let Err(err) =
                        self.mqtt
                            .try_publish(TOPIC_PHASE, QoS::AtLeastOnce, false, phase.as_str())
                    {
                        warn!("phase publish failed: {err}");
                    }
                }
                EngineAction::ReportSensorFault { consecutive } => {
                    warn!("thermocouple fault ({consecutive} in a row)");
                }
                EngineAction::RequestSleep { timeout_ms } => sleep_request = Some(timeout_ms),
            }
        }
        sleep_request
    }

    /// Low-power wait. Only a card tap, the button, a remote command or the
    /// check-in timeout end it; other inputs are applied without waking.
    async fn sleep(&mut self, timeout_ms: u64) -> WakeReason {
        info!("sleeping for up to {timeout_ms} ms");
        let deadline = tokio::time::sleep(Duration::from_millis(timeout_ms));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return WakeReason::Timeout,
                input = self.inputs.recv() => match input {
                    // The press that wakes the cooker is not also an off switch.
                    Some(ControlInput::ButtonPressed) => return WakeReason::Gpio,
                    Some(input @ ControlInput::TapCard { .. }) => {
                        self.apply_input(input).await;
                        return WakeReason::Gpio;
                    }
                    Some(input @ ControlInput::Remote(_)) => {
                        self.apply_input(input).await;
                        return WakeReason::Network;
                    }
                    Some(input) => self.apply_input(input).await,
                    None => return WakeReason::Timeout,
                },
            }
        }
    }

    async fn apply_input(&mut self, input: ControlInput) {
        match input {
            ControlInput::ButtonPressed => self.pending_button = true,
            ControlInput::Remote(command) => self.pending_remote.push(command),
            ControlInput::Door { open } => {
                debug!("door {}", if open { "opened" } else { "closed" });
                self.oven.set_door(open);
            }
            ControlInput::TapCard {
                blocks,
                failing_block,
            } => {
                if self.engine.wants_recipe() {
                    self.card_slot.tap(blocks, failing_block);
                } else {
                    info!("card ignored while {}", self.engine.phase().as_str());
                }
            }
            ControlInput::WriteCard { recipe, reply } => {
                let result = self
                    .card_slot
                    .provision(&recipe, self.engine.config.card_format());
                if let Err(err) = &result {
                    warn!("card write failed: {err}");
                }
                let _ = reply.send(result);
            }
            ControlInput::SetVolume(volume) => {
                let actions = self.engine.set_volume(volume);
                let _ = self.execute(actions).await;
                self.refresh_status();
            }
            ControlInput::SensorFault(fault) => self.oven.inject_fault(fault),
        }
    }

    fn display(&self, message: &str, temperature_f: Option<f32>) {
        let stamp = Utc::now()
            .with_timezone(&self.timezone)
            .format("%Y-%m-%d %H:%M:%S %Z");
        match temperature_f {
            Some(temp) => info!("[display {stamp}] {message} {temp:.0}F"),
            None => info!("[display {stamp}] {message}"),
        }
    }

    async fn persist_settings(&mut self) {
        self.runtime.settings = self.engine.settings().clone();
        if let Err(err) = self.store.save_runtime_config(&self.runtime).await {
            warn!("failed to persist settings: {err:#}");
        }
    }

    fn refresh_status(&self) {
        self.status.send_replace(self.engine.status(monotonic_ms()));
    }

    fn publish_state(&self) {
        let payload = serde_json::to_vec(&self.engine.state_payload(monotonic_ms()));
        match payload {
            Ok(body) => {
                if let Err(err) =
                    self.mqtt
                        .try_publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                {
                    warn!("controller state publish failed: {err}");
                }
            }
            Err(err) => warn!("controller state serialization failed: {err}"),
        }
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    Json(status)
}

async fn handle_button(State(state): State<AppState>) -> axum::response::Response {
    enqueue(&state, ControlInput::ButtonPressed, "button").await
}

async fn handle_door(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let open = match value.to_ascii_lowercase().as_str() {
        "open" => true,
        "closed" => false,
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid door state. Use 'open' or 'closed'",
            )
        }
    };
    enqueue(&state, ControlInput::Door { open }, "door").await
}

async fn handle_tap_card(
    State(state): State<AppState>,
    Json(contents): Json<CardContents>,
) -> axum::response::Response {
    let blocks = match (
        card::text_block(&contents.name, CardField::Name),
        card::text_block(&contents.temp, CardField::Temperature),
        card::text_block(&contents.time, CardField::Time),
    ) {
        (Ok(name), Ok(temp), Ok(time)) => [name, temp, time],
        (Err(err), _, _) | (_, Err(err), _) | (_, _, Err(err)) => {
            return error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    };

    let input = ControlInput::TapCard {
        blocks,
        failing_block: contents.failing_block,
    };
    enqueue(&state, input, "card").await
}

async fn handle_write_card(
    State(state): State<AppState>,
    Json(request): Json<CardWriteRequest>,
) -> axum::response::Response {
    if request.target_temp_f <= 0 || request.duration_min == 0 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "targetTemp and durationMin must be positive",
        );
    }

    let recipe = CookRecipe::new(
        request.name,
        request.target_temp_f,
        request.duration_min.saturating_mul(60_000),
    );
    let (reply, written) = oneshot::channel();
    if state
        .inputs
        .send(ControlInput::WriteCard { recipe, reply })
        .await
        .is_err()
    {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Control loop stopped");
    }

    match written.await {
        Ok(Ok(blocks)) => Json(card_contents(&blocks)).into_response(),
        Ok(Err(err @ CardError::InvalidField { .. })) => {
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
        Ok(Err(err)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        Err(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, "Control loop stopped"),
    }
}

async fn handle_remote(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    // Preset names are accepted alongside the numeric feed codes.
    let command = match RemoteCommand::parse_payload(value) {
        Ok(command) => command,
        Err(err) => match Preset::from_slug(value) {
            Some(preset) => RemoteCommand::Cook(preset),
            None => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        },
    };
    enqueue(&state, ControlInput::Remote(command), "remote").await
}

async fn handle_volume(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(volume) = value.parse::<u8>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid volume value");
    };
    if volume > MAX_VOLUME {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("Volume must be between 0 and {MAX_VOLUME}"),
        );
    }
    enqueue(&state, ControlInput::SetVolume(volume), "volume").await
}

async fn handle_sensor(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let fault = match params.get("value").map(String::as_str) {
        Some("ok") => false,
        Some("fault") => true,
        _ => return error_response(StatusCode::BAD_REQUEST, "Use value=ok or value=fault"),
    };
    enqueue(&state, ControlInput::SensorFault(fault), "sensor").await
}

async fn enqueue(
    state: &AppState,
    input: ControlInput,
    label: &'static str,
) -> axum::response::Response {
    match state.inputs.send(input).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(Queued { queued: label })).into_response(),
        Err(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, "Control loop stopped"),
    }
}

fn card_contents(blocks: &[Block; 3]) -> CardContents {
    let text = |block: &Block, field| card::block_text(block, field).unwrap_or_default();
    CardContents {
        name: text(&blocks[0], CardField::Name),
        temp: text(&blocks[1], CardField::Temperature),
        time: text(&blocks[2], CardField::Time),
        failing_block: None,
    }
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("COOKER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.smartcooker"));
        Self::at(data_dir)
    }

    fn at(data_dir: PathBuf) -> Self {
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => RuntimeConfig::from_json(&raw).with_context(|| {
                format!("malformed runtime config at {}", self.runtime_path.display())
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.runtime_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = runtime.to_json_pretty()?;
        tokio::fs::write(&path, payload)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use cooker_common::{CardFormat, Phase, RecipeCardReader, ShutdownReason};

    use super::*;

    const TWO_HOURS_MS: u64 = 7_200_000;

    fn control_loop() -> (ControlLoop, mpsc::Sender<ControlInput>, rumqttc::EventLoop) {
        let (mqtt, eventloop) =
            AsyncClient::new(MqttOptions::new("cooker-test", "localhost", 1883), 16);
        let (inputs, input_rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
        let store = AppStore::at(
            std::env::temp_dir().join(format!("smartcooker-test-{}", std::process::id())),
        );
        let control = ControlLoop::new(
            RuntimeConfig::default(),
            chrono_tz::UTC,
            store,
            mqtt,
            input_rx,
        );
        (control, inputs, eventloop)
    }

    fn pizza_card() -> ControlInput {
        let recipe = CookRecipe::new("Pizza", 425, 12 * 60_000);
        let (name, temp, time) = card::encode_recipe(&recipe, CardFormat::default()).unwrap();
        ControlInput::TapCard {
            blocks: [name, temp, time],
            failing_block: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_runs_to_timeout_without_input() {
        let (mut control, _inputs, _eventloop) = control_loop();
        control.tick().await;

        assert_eq!(control.sleep(TWO_HOURS_MS).await, WakeReason::Timeout);
        assert_eq!(control.engine.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn waking_button_press_is_not_an_off_press() {
        let (mut control, inputs, _eventloop) = control_loop();
        control.tick().await;

        inputs.send(ControlInput::ButtonPressed).await.unwrap();
        assert_eq!(control.sleep(TWO_HOURS_MS).await, WakeReason::Gpio);
        assert!(!control.pending_button);

        control.tick().await;
        assert_eq!(control.engine.phase(), Phase::Idle);
        assert_eq!(control.engine.last_shutdown(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn card_tap_wakes_and_starts_recipe() {
        let (mut control, inputs, _eventloop) = control_loop();
        control.tick().await;

        inputs.send(pizza_card()).await.unwrap();
        assert_eq!(control.sleep(TWO_HOURS_MS).await, WakeReason::Gpio);

        control.tick().await;
        assert_eq!(control.engine.phase(), Phase::Heating);
        assert_eq!(
            control.engine.recipe().map(|recipe| recipe.name.as_str()),
            Some("Pizza")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn remote_command_wakes_over_network() {
        let (mut control, inputs, _eventloop) = control_loop();
        control.tick().await;

        inputs
            .send(ControlInput::Remote(RemoteCommand::Cook(Preset::Lasagna)))
            .await
            .unwrap();
        assert_eq!(control.sleep(TWO_HOURS_MS).await, WakeReason::Network);

        control.tick().await;
        assert_eq!(control.engine.phase(), Phase::Heating);
        assert_eq!(control.engine.recipe(), Some(&Preset::Lasagna.recipe()));
    }

    #[tokio::test(start_paused = true)]
    async fn door_and_volume_are_applied_without_waking() {
        let (mut control, inputs, _eventloop) = control_loop();
        control.tick().await;

        inputs.send(ControlInput::Door { open: true }).await.unwrap();
        inputs.send(ControlInput::SetVolume(12)).await.unwrap();
        assert_eq!(control.sleep(60_000).await, WakeReason::Timeout);

        assert!(control.oven.door_open());
        assert_eq!(control.engine.settings().volume, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn card_tap_outside_idle_is_dropped() {
        let (mut control, _inputs, _eventloop) = control_loop();
        control.tick().await;
        control
            .apply_input(ControlInput::Remote(RemoteCommand::Cook(Preset::Lasagna)))
            .await;
        control.tick().await;
        assert_eq!(control.engine.phase(), Phase::Heating);

        control.apply_input(pizza_card()).await;
        assert!(!control.card_slot.scan());
        control.tick().await;
        assert_eq!(control.engine.recipe(), Some(&Preset::Lasagna.recipe()));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_sleep_beats_queued_presets() {
        let (mut control, _inputs, _eventloop) = control_loop();
        control.tick().await;

        for _ in 0..5 {
            control
                .apply_input(ControlInput::Remote(RemoteCommand::Cook(Preset::Lasagna)))
                .await;
        }
        control
            .apply_input(ControlInput::Remote(RemoteCommand::Sleep))
            .await;
        control.tick().await;

        assert_eq!(control.engine.phase(), Phase::ShuttingDown);
        assert_eq!(
            control.engine.last_shutdown(),
            Some(ShutdownReason::RemoteSleep)
        );
        assert!(!control.engine.is_relay_on());
        assert_eq!(control.pending_remote, PendingRemote::default());
    }

    #[tokio::test(start_paused = true)]
    async fn volume_steps_fold_into_one_change() {
        let (mut control, _inputs, _eventloop) = control_loop();
        control.tick().await;

        for _ in 0..3 {
            control
                .apply_input(ControlInput::Remote(RemoteCommand::VolumeUp))
                .await;
        }
        control.tick().await;
        assert_eq!(control.engine.settings().volume, 23);
        assert_eq!(control.engine.phase(), Phase::Idle);
    }

    #[test]
    fn pending_remote_stays_bounded() {
        let mut pending = PendingRemote::default();
        for _ in 0..1_000 {
            pending.push(RemoteCommand::VolumeUp);
            pending.push(RemoteCommand::Cook(Preset::BakedChicken));
        }
        assert_eq!(pending.volume_steps, i16::from(MAX_VOLUME));
        assert_eq!(pending.take_volume(20), Some(MAX_VOLUME));
        assert_eq!(pending.take_volume(20), None);
        assert_eq!(
            pending.take_command(),
            Some(RemoteCommand::Cook(Preset::BakedChicken))
        );
        assert_eq!(pending.take_command(), None);

        for _ in 0..5 {
            pending.push(RemoteCommand::VolumeDown);
        }
        assert_eq!(pending.take_volume(3), Some(0));
    }

    #[test]
    fn preset_after_sleep_waits_a_tick() {
        let mut pending = PendingRemote::default();
        pending.push(RemoteCommand::Cook(Preset::Lasagna));
        pending.push(RemoteCommand::Sleep);
        pending.push(RemoteCommand::Cook(Preset::RoastedTurkey));

        assert_eq!(pending.take_command(), Some(RemoteCommand::Sleep));
        assert_eq!(
            pending.take_command(),
            Some(RemoteCommand::Cook(Preset::RoastedTurkey))
        );
        assert_eq!(pending.take_command(), None);
    }

    #[test]
    fn written_card_contents_can_be_tapped_back() {
        let recipe = CookRecipe::new("Pizza", 425, 12 * 60_000);
        let (name, temp, time) = card::encode_recipe(&recipe, Default::default()).unwrap();
        let contents = card_contents(&[name, temp, time]);

        assert_eq!(contents.name, "Pizza");
        assert_eq!(contents.temp, "425");
        assert_eq!(contents.time, "12");
    }

    #[test]
    fn card_body_defaults_to_no_failing_block() {
        let body: CardContents =
            serde_json::from_str(r#"{"name":"Lasagna","temp":"375","time":"40"}"#).unwrap();
        assert_eq!(body.failing_block, None);

        let body: CardContents = serde_json::from_str(
            r#"{"name":"Lasagna","temp":"375","time":"40","failingBlock":2}"#,
        )
        .unwrap();
        assert_eq!(body.failing_block, Some(2));
    }
}
