use crate::config::Config;
use chrono::{DateTime, Utc};
use clock::{Clock, SystemTimeSource, TimeSource};
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sntp::{EspSntp, SyncStatus};
use log::*;
use motion::{
    ControlLoop, HistoryRow, LoopAction, Orientation, Persistence, Servo, ServoPair,
    SystemMonotonic, Tracker,
};
use sensors::adc::AdcLightSensor;

/// Read if a filesystem is mounted there, otherwise the embedded defaults apply.
pub const CONFIG_PATH: &str = "/spiffs/config.toml";

const NVS_NAMESPACE: &str = "storage";
const NVS_KEY_CAL_YAW: &str = "cal_yaw";
const NVS_KEY_CAL_TILT: &str = "cal_tilt";
const NVS_KEY_LAST_ROW: &str = "hist_last";

const LOOP_DELAY_MS: u32 = 10;

/// Calibration in NVS. Flash has no room for a growing log, so only the
/// latest durable history row is kept.
pub struct NvsStorage {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStorage {
    pub fn new(partition: EspDefaultNvsPartition) -> anyhow::Result<NvsStorage> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        info!("Got namespace {:?} from default partition", NVS_NAMESPACE);
        Ok(NvsStorage { nvs })
    }
}

impl Persistence for NvsStorage {
    fn load_calibration(&mut self) -> anyhow::Result<Option<Orientation>> {
        let yaw = self.nvs.get_i32(NVS_KEY_CAL_YAW)?;
        let tilt = self.nvs.get_i32(NVS_KEY_CAL_TILT)?;
        Ok(yaw.zip(tilt).map(|(yaw, tilt)| Orientation::new(yaw, tilt)))
    }

    fn save_calibration(&mut self, orientation: Orientation) -> anyhow::Result<()> {
        self.nvs.set_i32(NVS_KEY_CAL_YAW, orientation.yaw)?;
        self.nvs.set_i32(NVS_KEY_CAL_TILT, orientation.tilt)?;
        Ok(())
    }

    fn append_history_row(&mut self, row: &HistoryRow) -> anyhow::Result<()> {
        let line = row.to_string();
        self.nvs.set_str(NVS_KEY_LAST_ROW, &line)?;
        info!("History: {}", line);
        Ok(())
    }
}

/// Wall clock from SNTP. Invalid until the first sync completes, which needs
/// a network brought up elsewhere.
pub struct SntpTime {
    sntp: EspSntp<'static>,
}

impl TimeSource for SntpTime {
    fn now(&self) -> Option<DateTime<Utc>> {
        if self.sntp.get_sync_status() != SyncStatus::Completed {
            return None;
        }
        SystemTimeSource.now()
    }
}

pub fn run(config: Config) -> anyhow::Result<()> {
    let peripherals = Peripherals::take()?;
    let nvs_default = EspDefaultNvsPartition::take()?;

    // 50 Hz servo frame, 14-bit duty resolution.
    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default()
            .frequency(50.Hz().into())
            .resolution(Resolution::Bits14),
    )?;
    let yaw_pwm = LedcDriver::new(peripherals.ledc.channel0, &timer, peripherals.pins.gpio18)?;
    let tilt_pwm = LedcDriver::new(peripherals.ledc.channel1, &timer, peripherals.pins.gpio19)?;
    let servos = ServoPair::new(Servo::new(yaw_pwm), Servo::new(tilt_pwm));

    let light = AdcLightSensor::new(
        peripherals.adc1,
        peripherals.pins.gpio34,
        peripherals.pins.gpio35,
        peripherals.pins.gpio32,
        peripherals.pins.gpio33,
    )?;

    let storage = NvsStorage::new(nvs_default)?;
    let sntp = EspSntp::new_default()?;
    info!("SNTP started, tracking on light sensors until time syncs");

    let tracker = Tracker::new(config.tracker.clone(), light, servos, storage);
    let clock = Clock::new(SntpTime { sntp }, config.location);
    let mut ctl = ControlLoop::new(tracker, clock, SystemMonotonic::new());

    info!(
        "Tracker id: {}, Lat: {}, Lon: {}",
        config.get_tracker_id(),
        config.get_latitude(),
        config.get_longitude()
    );

    loop {
        if ctl.iterate() == LoopAction::Restart {
            error!("Watchdog requested a restart, rebooting");
            FreeRtos::delay_ms(100);
            esp_idf_svc::hal::reset::restart();
        }
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}
