//! Settings replicas and save outcomes.

use crate::schema::{
    DriverSettings, MotorSettings, RuntimeSettings, RuntimeSettingsSaved, SystemSettings,
    SystemSettingsSaved,
};
use crate::stream::{Stream, StreamSource};

/// Write side.
#[derive(Debug)]
pub struct SettingsSources {
    pub(crate) system: StreamSource<SystemSettings>,
    pub(crate) system_saved: StreamSource<SystemSettingsSaved>,
    pub(crate) runtime: StreamSource<RuntimeSettings>,
    pub(crate) runtime_saved: StreamSource<RuntimeSettingsSaved>,
}

impl SettingsSources {
    /// Fresh sources.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: StreamSource::latest(),
            system_saved: StreamSource::event(),
            runtime: StreamSource::latest(),
            runtime_saved: StreamSource::event(),
        }
    }

    /// Read side for handles.
    #[must_use]
    pub fn streams(&self) -> SettingsStreams {
        SettingsStreams {
            system: self.system.stream(),
            system_saved: self.system_saved.stream(),
            runtime: self.runtime.stream(),
            runtime_saved: self.runtime_saved.stream(),
        }
    }
}

impl Default for SettingsSources {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side.
#[derive(Debug, Clone)]
pub struct SettingsStreams {
    /// Hardware configuration, latest value.
    pub system: Stream<SystemSettings>,
    /// `setSystem` outcomes.
    pub system_saved: Stream<SystemSettingsSaved>,
    /// Runtime tunables, latest value.
    pub runtime: Stream<RuntimeSettings>,
    /// `setRuntime` outcomes.
    pub runtime_saved: Stream<RuntimeSettingsSaved>,
}

fn mock_motor() -> MotorSettings {
    MotorSettings {
        driver_settings: DriverSettings::Mock,
        max_step_speed: 200,
        step_size: 0.004,
        acceleration: 1.2,
        deceleration: 1.2,
        free_step_speed: 50.0,
        acceleration_time_scale: 2.0,
    }
}

impl SettingsStreams {
    /// Dev-mode settings with mock motors on every axis.
    ///
    /// The `*_saved` streams replay a success to every subscriber instead
    /// of behaving as events.
    #[must_use]
    pub fn mock() -> Self {
        Self {
            system: Stream::constant(SystemSettings {
                dev_mode: true,
                motor_x: mock_motor(),
                motor_y: mock_motor(),
                motor_z: mock_motor(),
                calibrate_z_gpio: None,
                on_off_gpio: None,
                switch_on_off_delay: 1.0,
            }),
            system_saved: Stream::constant(SystemSettingsSaved { ok: true }),
            runtime: Stream::constant(RuntimeSettings {
                input_dir: vec!["./gcode".to_string()],
                input_update_reduce: 1,
                default_speed: 300.0,
                rapid_speed: 800.0,
                scale: 1.0,
                invert_z: false,
                show_console_output: false,
                console_pos_update_reduce: 50,
                external_input_enabled: None,
            }),
            runtime_saved: Stream::constant(RuntimeSettingsSaved { ok: true }),
        }
    }
}
