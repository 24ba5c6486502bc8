use crate::{
    card::CardError,
    config::{CookerConfig, LightConfig, PersistedSettings, MAX_VOLUME, MIN_VOLUME},
    recipe::CookRecipe,
    reminder::{ReminderOutcome, ReminderPolicy},
    remote::RemoteCommand,
    thermostat::Thermostat,
    timer::CountdownTimer,
    types::{
        AudioClip, Color, ControllerStatePayload, ControllerStatus, Phase, RelayCommand,
        SensorStatus, ThermocoupleReading,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    SetRelay(bool),
    Notify {
        message: String,
        temperature_f: Option<f32>,
    },
    FillColor {
        start: u16,
        end: u16,
        color: Color,
    },
    PlayClip(AudioClip),
    SetVolume(u8),
    PublishPhase(Phase),
    ReportSensorFault {
        consecutive: u32,
    },
    RequestSleep {
        timeout_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Button,
    RemoteSleep,
    RemindersExhausted,
    FoodRemoved,
    OverTemperature,
    SensorFault,
}

impl ShutdownReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Button => "BUTTON",
            Self::RemoteSleep => "REMOTE_SLEEP",
            Self::RemindersExhausted => "REMINDERS_EXHAUSTED",
            Self::FoodRemoved => "FOOD_REMOVED",
            Self::OverTemperature => "OVER_TEMPERATURE",
            Self::SensorFault => "SENSOR_FAULT",
        }
    }
}

/// Everything sampled from the outside world for one control tick.
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub button_pressed: bool,
    pub remote: Option<RemoteCommand>,
    /// Result of a card scan, only consumed while idle.
    pub card: Option<Result<CookRecipe, CardError>>,
    pub thermocouple: Option<ThermocoupleReading>,
    pub door_open: bool,
}

#[derive(Debug, Clone)]
pub struct CookCycleEngine {
    pub config: CookerConfig,
    settings: PersistedSettings,
    pixel_count: u16,
    thermostat: Thermostat,

    phase: Phase,
    entry_fired: bool,
    recipe: Option<CookRecipe>,
    relay: RelayCommand,

    current_temp_f: Option<f32>,
    sensor_ok: bool,
    consecutive_faults: u32,

    cook_timer: CountdownTimer,
    cool_timer: CountdownTimer,
    reminders: ReminderPolicy,
    door_opened_since_entry: bool,

    last_shutdown: Option<ShutdownReason>,
}

impl CookCycleEngine {
    pub fn new(
        mut config: CookerConfig,
        mut settings: PersistedSettings,
        light: &LightConfig,
    ) -> Self {
        config.sanitize();
        settings.sanitize();
        Self {
            thermostat: Thermostat::new(config.hysteresis_f, config.comparison),
            reminders: ReminderPolicy::new(config.max_reminders, config.reminder_interval_ms),
            config,
            settings,
            pixel_count: light.pixel_count,
            phase: Phase::Idle,
            entry_fired: false,
            recipe: None,
            relay: RelayCommand::DeEnergize,
            current_temp_f: None,
            sensor_ok: false,
            consecutive_faults: 0,
            cook_timer: CountdownTimer::new(),
            cool_timer: CountdownTimer::new(),
            door_opened_since_entry: false,
            last_shutdown: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn recipe(&self) -> Option<&CookRecipe> {
        self.recipe.as_ref()
    }

    pub fn settings(&self) -> &PersistedSettings {
        &self.settings
    }

    pub fn is_relay_on(&self) -> bool {
        self.relay.is_energized()
    }

    pub fn current_temp_f(&self) -> Option<f32> {
        self.current_temp_f
    }

    pub fn reminder_count(&self) -> u8 {
        self.reminders.count()
    }

    pub fn last_shutdown(&self) -> Option<ShutdownReason> {
        self.last_shutdown
    }

    /// The card reader is only polled while waiting for a recipe.
    pub fn wants_recipe(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn tick(&mut self, now_ms: u64, input: TickInput) -> Vec<EngineAction> {
        let mut actions = Vec::new();

        let mut transitioned = self.apply_safety_override(&input);

        let fresh_temp_f = match input.thermocouple {
            Some(reading) => self.apply_reading(reading, &mut transitioned, &mut actions),
            None => None,
        };

        if !transitioned {
            transitioned = self.apply_remote(input.remote, &mut actions);
        }

        if !transitioned && self.phase == Phase::Idle {
            if let Some(scan) = input.card {
                transitioned = self.apply_card_scan(scan, &mut actions);
            }
        }

        if !transitioned {
            self.evaluate_phase(now_ms, fresh_temp_f, input.door_open, &mut actions);
        }

        self.fire_entry_actions(&mut actions);
        actions
    }

    pub fn set_volume(&mut self, volume: u8) -> Vec<EngineAction> {
        let clamped = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        if clamped == self.settings.volume {
            return Vec::new();
        }
        self.settings.volume = clamped;
        vec![EngineAction::SetVolume(clamped)]
    }

    pub fn status(&self, now_ms: u64) -> ControllerStatus {
        ControllerStatus {
            phase: self.phase.as_str(),
            recipe: self.recipe.clone(),
            current_temp_f: self.current_temp_f,
            target_temp_f: self.recipe.as_ref().map(|recipe| recipe.target_temp_f),
            relay_on: self.is_relay_on(),
            sensor_ok: self.sensor_ok,
            consecutive_sensor_faults: self.consecutive_faults,
            reminders: self.reminders.count(),
            max_reminders: self.reminders.max_reminders(),
            cook_remaining_ms: self.cook_timer.remaining_ms(now_ms),
            cool_remaining_ms: self.cool_timer.remaining_ms(now_ms),
            wait_remaining_ms: self.reminders.remaining_ms(now_ms),
            volume: self.settings.volume,
            last_shutdown: self.last_shutdown.map(ShutdownReason::as_str),
        }
    }

    pub fn state_payload(&self, now_ms: u64) -> ControllerStatePayload {
        ControllerStatePayload {
            phase: self.phase.as_str(),
            recipe: self.recipe.as_ref().map(|recipe| recipe.name.clone()),
            temp: self.current_temp_f,
            target: self.recipe.as_ref().map(|recipe| recipe.target_temp_f),
            relay: self.is_relay_on(),
            reminders: self.reminders.count(),
            cook_remaining_min: self.cook_timer.remaining_ms(now_ms) / 60_000,
        }
    }

    fn apply_safety_override(&mut self, input: &TickInput) -> bool {
        let reason = if input.button_pressed {
            ShutdownReason::Button
        } else if input.remote.is_some_and(RemoteCommand::is_safety_override) {
            ShutdownReason::RemoteSleep
        } else {
            return false;
        };

        self.shut_down(reason);
        true
    }

    /// Returns the temperature when the sample is usable this tick.
    fn apply_reading(
        &mut self,
        reading: ThermocoupleReading,
        transitioned: &mut bool,
        actions: &mut Vec<EngineAction>,
    ) -> Option<f32> {
        let temp_f = reading.fahrenheit();
        let plausible = reading.status == SensorStatus::Ok
            && temp_f.is_finite()
            && (self.config.min_valid_temp_f..=self.config.max_valid_temp_f).contains(&temp_f);

        if !plausible {
            self.sensor_ok = false;
            self.consecutive_faults = self.consecutive_faults.saturating_add(1);
            actions.push(EngineAction::ReportSensorFault {
                consecutive: self.consecutive_faults,
            });

            if !*transitioned
                && self.phase.requires_recipe()
                && self.consecutive_faults >= self.config.max_consecutive_sensor_faults
            {
                self.shut_down(ShutdownReason::SensorFault);
                *transitioned = true;
            }
            return None;
        }

        self.sensor_ok = true;
        self.consecutive_faults = 0;
        self.current_temp_f = Some(temp_f);

        if *transitioned {
            return Some(temp_f);
        }

        // Emergency ceiling, independent of the recipe target.
        if self.phase.requires_recipe() && temp_f >= self.config.absolute_max_temp_f {
            self.shut_down(ShutdownReason::OverTemperature);
            *transitioned = true;
            return Some(temp_f);
        }

        if self.phase.is_regulating() {
            if let Some(target) = self.recipe.as_ref().map(|recipe| recipe.target_temp_f) {
                let command = self.thermostat.command(temp_f, target as f32, self.relay);
                if command != self.relay {
                    self.set_relay(command, actions);
                }
            }
        }

        Some(temp_f)
    }

    fn apply_remote(
        &mut self,
        remote: Option<RemoteCommand>,
        actions: &mut Vec<EngineAction>,
    ) -> bool {
        match remote {
            Some(RemoteCommand::VolumeUp) => {
                let volume = self.settings.volume.saturating_add(1);
                actions.extend(self.set_volume(volume));
                false
            }
            Some(RemoteCommand::VolumeDown) => {
                let volume = self.settings.volume.saturating_sub(1);
                actions.extend(self.set_volume(volume));
                false
            }
            Some(RemoteCommand::Cook(preset)) => {
                self.start_recipe(preset.recipe());
                true
            }
            // Sleep is handled as a safety override before anything else.
            Some(RemoteCommand::Sleep) | None => false,
        }
    }

    fn apply_card_scan(
        &mut self,
        scan: Result<CookRecipe, CardError>,
        actions: &mut Vec<EngineAction>,
    ) -> bool {
        match scan {
            Ok(recipe) => {
                self.start_recipe(recipe);
                true
            }
            Err(err) => {
                actions.push(EngineAction::PlayClip(AudioClip::CardError));
                actions.push(EngineAction::Notify {
                    message: format!("Card error: {err}"),
                    temperature_f: None,
                });
                false
            }
        }
    }

    fn evaluate_phase(
        &mut self,
        now_ms: u64,
        fresh_temp_f: Option<f32>,
        door_open: bool,
        actions: &mut Vec<EngineAction>,
    ) {
        match self.phase {
            Phase::Idle => {}
            Phase::ShuttingDown => {
                if self.config.sleep_enabled {
                    actions.push(EngineAction::RequestSleep {
                        timeout_ms: self.config.sleep_timeout_ms,
                    });
                }
                self.transition(Phase::Idle);
            }
            Phase::Heating => {
                let Some(target) = self.recipe.as_ref().map(|recipe| recipe.target_temp_f) else {
                    self.transition(Phase::ShuttingDown);
                    return;
                };
                if fresh_temp_f.is_some_and(|temp| temp >= target as f32) {
                    self.reminders.arm(now_ms);
                    self.door_opened_since_entry = door_open;
                    self.transition(Phase::AwaitingLoad);
                }
            }
            Phase::AwaitingLoad => {
                if door_open {
                    self.door_opened_since_entry = true;
                } else if self.door_opened_since_entry {
                    let duration_ms = self
                        .recipe
                        .as_ref()
                        .map(|recipe| recipe.duration_ms)
                        .unwrap_or(0);
                    let cook_ms = duration_ms.saturating_sub(self.config.cooling_allowance_ms);
                    self.cook_timer.start(cook_ms, now_ms);
                    self.reminders.reset();
                    self.transition(Phase::Cooking);
                    return;
                }
                self.poll_reminders(now_ms, AudioClip::PutFoodIn, "Put food in", actions);
            }
            Phase::Cooking => {
                if self.cook_timer.is_elapsed(now_ms) {
                    self.cook_timer.cancel();
                    if self.relay.is_energized() {
                        self.set_relay(RelayCommand::DeEnergize, actions);
                    }
                    let duration_ms = self
                        .recipe
                        .as_ref()
                        .map(|recipe| recipe.duration_ms)
                        .unwrap_or(0);
                    self.cool_timer
                        .start(duration_ms.min(self.config.cooling_allowance_ms), now_ms);
                    self.transition(Phase::Cooling);
                }
            }
            Phase::Cooling => {
                if self.cool_timer.is_elapsed(now_ms) {
                    self.cool_timer.cancel();
                    self.reminders.arm(now_ms);
                    self.transition(Phase::AwaitingUnload);
                }
            }
            Phase::AwaitingUnload => {
                if door_open {
                    self.shut_down(ShutdownReason::FoodRemoved);
                    return;
                }
                self.poll_reminders(now_ms, AudioClip::TakeFoodOut, "Take food out", actions);
            }
        }
    }

    fn poll_reminders(
        &mut self,
        now_ms: u64,
        clip: AudioClip,
        message: &str,
        actions: &mut Vec<EngineAction>,
    ) {
        match self.reminders.poll(now_ms) {
            ReminderOutcome::Waiting => {}
            ReminderOutcome::Remind(count) => {
                actions.push(EngineAction::Notify {
                    message: format!(
                        "{message} (reminder {count}/{})",
                        self.reminders.max_reminders()
                    ),
                    temperature_f: None,
                });
                actions.push(EngineAction::PlayClip(clip));
            }
            ReminderOutcome::Exhausted => self.shut_down(ShutdownReason::RemindersExhausted),
        }
    }

    fn start_recipe(&mut self, recipe: CookRecipe) {
        self.recipe = Some(recipe);
        // The fault budget covers a single heated run.
        self.consecutive_faults = 0;
        self.cook_timer.cancel();
        self.cool_timer.cancel();
        self.reminders.reset();
        self.door_opened_since_entry = false;
        self.transition(Phase::Heating);
    }

    fn shut_down(&mut self, reason: ShutdownReason) {
        self.last_shutdown = Some(reason);
        self.cook_timer.cancel();
        self.cool_timer.cancel();
        self.reminders.reset();
        self.door_opened_since_entry = false;
        self.transition(Phase::ShuttingDown);
    }

    fn transition(&mut self, to: Phase) {
        self.phase = to;
        self.entry_fired = false;
    }

    fn fire_entry_actions(&mut self, actions: &mut Vec<EngineAction>) {
        if self.entry_fired {
            return;
        }
        self.entry_fired = true;

        let phase = self.phase;
        match phase {
            Phase::Idle => {
                self.set_relay(RelayCommand::DeEnergize, actions);
                self.notify("System Ready", None, actions);
            }
            Phase::ShuttingDown => {
                self.set_relay(RelayCommand::DeEnergize, actions);
                self.notify("System Off", None, actions);
                actions.push(EngineAction::PlayClip(AudioClip::SystemOff));
            }
            Phase::Heating => {
                self.notify("Oven Heating", None, actions);
                self.set_relay(RelayCommand::Energize, actions);
            }
            Phase::AwaitingLoad => {
                self.notify("Put food in", None, actions);
                actions.push(EngineAction::PlayClip(AudioClip::PutFoodIn));
            }
            Phase::Cooking => {
                self.notify("Cooking, temp:", self.current_temp_f, actions);
            }
            Phase::Cooling => {
                self.notify("Cooling", None, actions);
            }
            Phase::AwaitingUnload => {
                self.notify("Take food out", None, actions);
                actions.push(EngineAction::PlayClip(AudioClip::TakeFoodOut));
            }
        }

        actions.push(EngineAction::FillColor {
            start: 0,
            end: self.pixel_count,
            color: phase.light_color(),
        });
        actions.push(EngineAction::PublishPhase(phase));
    }

    fn notify(&self, message: &str, temperature_f: Option<f32>, actions: &mut Vec<EngineAction>) {
        actions.push(EngineAction::Notify {
            message: message.to_string(),
            temperature_f,
        });
    }

    fn set_relay(&mut self, command: RelayCommand, actions: &mut Vec<EngineAction>) {
        self.relay = command;
        actions.push(EngineAction::SetRelay(command.is_energized()));
    }
}
