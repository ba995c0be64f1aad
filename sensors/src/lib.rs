pub mod sensors {
    use serde::Serialize;

    /// Full-scale reading of the 12-bit ADC behind each LDR.
    pub const FULL_SCALE: u16 = 4095;

    /// Position of an LDR on the cross-shaped shade.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Quadrant {
        TopLeft,
        TopRight,
        BottomLeft,
        BottomRight,
    }

    impl Quadrant {
        pub const ALL: [Quadrant; 4] = [
            Quadrant::TopLeft,
            Quadrant::TopRight,
            Quadrant::BottomLeft,
            Quadrant::BottomRight,
        ];
    }

    /// A source of raw light intensities, one channel per quadrant.
    ///
    /// Implemented by the ADC driver on the device and by synthetic light
    /// fields in the simulator and tests.
    pub trait LightSensor {
        type Error: core::fmt::Debug;

        fn read(&mut self, quadrant: Quadrant) -> Result<u16, Self::Error>;
    }

    /// One sampling of all four LDRs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct SensorFrame {
        pub top_left: u16,
        pub top_right: u16,
        pub bottom_left: u16,
        pub bottom_right: u16,
    }

    /// Sums and normalised differentials derived from a frame.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct LightBalance {
        pub top: u32,
        pub bottom: u32,
        pub left: u32,
        pub right: u32,
        pub total: u32,
        /// (left - right) / total, positive when the left pair sees more light.
        pub error_yaw: f32,
        /// (top - bottom) / total, positive when the top pair sees more light.
        pub error_tilt: f32,
    }

    impl SensorFrame {
        pub fn new(top_left: u16, top_right: u16, bottom_left: u16, bottom_right: u16) -> Self {
            SensorFrame {
                top_left: top_left.min(FULL_SCALE),
                top_right: top_right.min(FULL_SCALE),
                bottom_left: bottom_left.min(FULL_SCALE),
                bottom_right: bottom_right.min(FULL_SCALE),
            }
        }

        /// Same value on every channel.
        pub fn uniform(value: u16) -> Self {
            SensorFrame::new(value, value, value, value)
        }

        pub fn get(&self, quadrant: Quadrant) -> u16 {
            match quadrant {
                Quadrant::TopLeft => self.top_left,
                Quadrant::TopRight => self.top_right,
                Quadrant::BottomLeft => self.bottom_left,
                Quadrant::BottomRight => self.bottom_right,
            }
        }

        pub fn total(&self) -> u32 {
            Quadrant::ALL.iter().map(|q| self.get(*q) as u32).sum()
        }

        /// Integer mean of the four channels.
        pub fn mean(&self) -> u32 {
            self.total() / 4
        }

        /// Night: every channel below the threshold.
        pub fn is_dark(&self, night_threshold: u16) -> bool {
            Quadrant::ALL.iter().all(|q| self.get(*q) < night_threshold)
        }

        /// Overcast: the mean of the four channels below the threshold.
        pub fn is_cloudy(&self, cloud_threshold: u16) -> bool {
            self.mean() < cloud_threshold as u32
        }

        pub fn balance(&self) -> LightBalance {
            let top = self.top_left as u32 + self.top_right as u32;
            let bottom = self.bottom_left as u32 + self.bottom_right as u32;
            let left = self.top_left as u32 + self.bottom_left as u32;
            let right = self.top_right as u32 + self.bottom_right as u32;
            let total = top + bottom;

            let (error_yaw, error_tilt) = if total == 0 {
                (0.0, 0.0)
            } else {
                (
                    (left as f32 - right as f32) / total as f32,
                    (top as f32 - bottom as f32) / total as f32,
                )
            };

            LightBalance {
                top,
                bottom,
                left,
                right,
                total,
                error_yaw,
                error_tilt,
            }
        }
    }

    /// Reads all four channels. Fails on the first channel that fails.
    pub fn sample<S: LightSensor>(sensor: &mut S) -> Result<SensorFrame, S::Error> {
        Ok(SensorFrame::new(
            sensor.read(Quadrant::TopLeft)?,
            sensor.read(Quadrant::TopRight)?,
            sensor.read(Quadrant::BottomLeft)?,
            sensor.read(Quadrant::BottomRight)?,
        ))
    }

}

#[cfg(target_os = "espidf")]
pub mod adc {
    use crate::sensors::{LightSensor, Quadrant};
    use esp_idf_svc::hal::adc::{
        AdcContConfig, AdcContDriver, AdcMeasurement, Attenuated, EmptyAdcChannels, ADC1,
    };
    use esp_idf_svc::hal::gpio::{Gpio32, Gpio33, Gpio34, Gpio35};
    use esp_idf_svc::sys::EspError;

    const BATCH: usize = 64;

    /// Four LDR dividers on ADC1, sampled continuously.
    pub struct AdcLightSensor<'a> {
        driver: AdcContDriver<'a>,
        latest: [u16; 4],
    }

    impl AdcLightSensor<'_> {
        pub fn new<'a>(
            adc: ADC1,
            top_left: Gpio34,
            top_right: Gpio35,
            bottom_left: Gpio32,
            bottom_right: Gpio33,
        ) -> Result<AdcLightSensor<'a>, EspError> {
            let channels = EmptyAdcChannels::chain(Attenuated::db11(top_left))
                .chain(Attenuated::db11(top_right))
                .chain(Attenuated::db11(bottom_left))
                .chain(Attenuated::db11(bottom_right));

            let mut driver = AdcContDriver::new(adc, &AdcContConfig::default(), channels)?;
            driver.start()?;

            Ok(AdcLightSensor {
                driver,
                latest: [0; 4],
            })
        }

        fn channel_index(quadrant: Quadrant) -> usize {
            match quadrant {
                Quadrant::TopLeft => 0,
                Quadrant::TopRight => 1,
                Quadrant::BottomLeft => 2,
                Quadrant::BottomRight => 3,
            }
        }

        fn refresh(&mut self) -> Result<(), EspError> {
            let mut samples: [AdcMeasurement; BATCH] = [Default::default(); BATCH];
            let read = self.driver.read(&mut samples, 100)?;

            // GPIO34/35 are ADC1 channels 6/7, GPIO32/33 are channels 4/5.
            let mut sums = [0u32; 4];
            let mut counts = [0u32; 4];
            for m in &samples[..read] {
                let idx = match m.channel() {
                    6 => 0,
                    7 => 1,
                    4 => 2,
                    5 => 3,
                    _ => continue,
                };
                sums[idx] += m.data() as u32;
                counts[idx] += 1;
            }
            for idx in 0..4 {
                if counts[idx] > 0 {
                    self.latest[idx] = (sums[idx] / counts[idx]) as u16;
                }
            }
            Ok(())
        }
    }

    impl LightSensor for AdcLightSensor<'_> {
        type Error = EspError;

        fn read(&mut self, quadrant: Quadrant) -> Result<u16, EspError> {
            // One DMA batch covers all four channels, refresh on the first.
            if quadrant == Quadrant::TopLeft {
                self.refresh()?;
            }
            Ok(self.latest[Self::channel_index(quadrant)])
        }
    }
}

pub use sensors::{sample, LightBalance, LightSensor, Quadrant, SensorFrame, FULL_SCALE};
