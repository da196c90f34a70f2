//! System and runtime settings payloads.
//!
//! System settings describe the hardware wiring and take effect after a
//! controller restart. Runtime settings are tunables applied immediately.
//! Both are sent back verbatim in `setSystem` / `setRuntime` commands, so
//! the `Serialize` impls produce the same wire shape the validators accept.

use serde::Serialize;
use serde_json::Value;

use super::validate::{Invalid, Record, Schema, Shape};

/// Stepper driver wiring. Field names are snake_case on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepperDriver {
    /// Step pulse GPIO.
    pub pull_gpio: u8,
    /// Direction GPIO.
    pub dir_gpio: u8,
    /// Invert the direction signal.
    pub invert_dir: bool,
    /// Driver enable GPIO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ena_gpio: Option<u8>,
    /// Lower endstop GPIO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_left_gpio: Option<u8>,
    /// Upper endstop GPIO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_right_gpio: Option<u8>,
}

impl Shape for StepperDriver {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            pull_gpio: record.unsigned("pull_gpio")?,
            dir_gpio: record.unsigned("dir_gpio")?,
            invert_dir: record.boolean("invert_dir")?,
            ena_gpio: record.optional("ena_gpio", Record::unsigned)?,
            end_left_gpio: record.optional("end_left_gpio", Record::unsigned)?,
            end_right_gpio: record.optional("end_right_gpio", Record::unsigned)?,
        })
    }
}

/// Motor driver, externally tagged: `"Mock"` or `{"Stepper": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DriverSettings {
    /// Physical stepper driver.
    Stepper(StepperDriver),
    /// Simulated motor.
    Mock,
}

struct StepperVariant(StepperDriver);

impl Shape for StepperVariant {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        record.shape("Stepper").map(Self)
    }
}

fn driver_settings(record: &Record<'_>, field: &str) -> Result<DriverSettings, Invalid> {
    if let Some(Value::String(_)) = record.get(field) {
        return record
            .one_of(field, &[("Mock", ())])
            .map(|()| DriverSettings::Mock);
    }
    record
        .shape::<StepperVariant>(field)
        .map(|v| DriverSettings::Stepper(v.0))
}

/// Per-axis motor settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MotorSettings {
    /// Driver wiring.
    pub driver_settings: DriverSettings,
    /// Maximum step rate (steps/s).
    pub max_step_speed: u32,
    /// Travel per step (mm).
    pub step_size: f64,
    /// Acceleration constant.
    pub acceleration: f64,
    /// Deceleration constant.
    pub deceleration: f64,
    /// Step rate reachable without ramping.
    pub free_step_speed: f64,
    /// Time scale of the ramp graph in the UI.
    pub acceleration_time_scale: f64,
}

impl Shape for MotorSettings {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            driver_settings: driver_settings(record, "driverSettings")?,
            max_step_speed: record.unsigned("maxStepSpeed")?,
            step_size: record.number("stepSize")?,
            acceleration: record.number("acceleration")?,
            deceleration: record.number("deceleration")?,
            free_step_speed: record.number("freeStepSpeed")?,
            acceleration_time_scale: record.number("accelerationTimeScale")?,
        })
    }
}

/// Hardware configuration. Requires a controller restart to apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    /// Run against mock motors.
    pub dev_mode: bool,
    /// X axis motor.
    pub motor_x: MotorSettings,
    /// Y axis motor.
    pub motor_y: MotorSettings,
    /// Z axis motor.
    pub motor_z: MotorSettings,
    /// Z probe GPIO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibrate_z_gpio: Option<u8>,
    /// Power relay GPIO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_off_gpio: Option<u8>,
    /// Delay after switching the relay (s).
    pub switch_on_off_delay: f64,
}

impl Shape for SystemSettings {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            dev_mode: record.boolean("devMode")?,
            motor_x: record.shape("motorX")?,
            motor_y: record.shape("motorY")?,
            motor_z: record.shape("motorZ")?,
            calibrate_z_gpio: record.optional("calibrateZGpio", Record::unsigned)?,
            on_off_gpio: record.optional("onOffGpio", Record::unsigned)?,
            switch_on_off_delay: record.number("switchOnOffDelay")?,
        })
    }
}

impl Schema for SystemSettings {
    const TAGS: &'static [&'static str] = &["systemSettings"];
}

/// Tunables applied without restart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    /// Directories scanned for programs.
    pub input_dir: Vec<String>,
    /// Only every Nth controller input is processed.
    pub input_update_reduce: u32,
    /// Feed speed when a program gives none.
    pub default_speed: f64,
    /// Rapid move speed.
    pub rapid_speed: f64,
    /// Program scale factor.
    pub scale: f64,
    /// Invert Z for programs.
    pub invert_z: bool,
    /// Mirror output on the controller console.
    pub show_console_output: bool,
    /// Only every Nth position update is printed on the console.
    pub console_pos_update_reduce: u32,
    /// External jog input enabled, on controllers that report it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_input_enabled: Option<bool>,
}

impl Shape for RuntimeSettings {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            input_dir: record.strings("inputDir")?,
            input_update_reduce: record.unsigned("inputUpdateReduce")?,
            default_speed: record.number("defaultSpeed")?,
            rapid_speed: record.number("rapidSpeed")?,
            scale: record.number("scale")?,
            invert_z: record.boolean("invertZ")?,
            show_console_output: record.boolean("showConsoleOutput")?,
            console_pos_update_reduce: record.unsigned("consolePosUpdateReduce")?,
            external_input_enabled: record.optional("externalInputEnabled", Record::boolean)?,
        })
    }
}

impl Schema for RuntimeSettings {
    const TAGS: &'static [&'static str] = &["runtimeSettings"];
}

/// Outcome of `setSystem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemSettingsSaved {
    /// Settings were persisted.
    pub ok: bool,
}

impl Shape for SystemSettingsSaved {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            ok: record.boolean("ok")?,
        })
    }
}

impl Schema for SystemSettingsSaved {
    const TAGS: &'static [&'static str] = &["systemSettingsSaved"];
}

/// Outcome of `setRuntime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuntimeSettingsSaved {
    /// Settings were applied.
    pub ok: bool,
}

impl Shape for RuntimeSettingsSaved {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            ok: record.boolean("ok")?,
        })
    }
}

impl Schema for RuntimeSettingsSaved {
    const TAGS: &'static [&'static str] = &["runtimeSettingsSaved"];
}
