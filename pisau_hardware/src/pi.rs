//! Raspberry Pi drivers: hardware PWM for the motor driver, GPIO for the
//! enable line and the two active-low switches.

use crate::error::{HwError, Result};
use pisau_traits::{MotorDriver, SwitchState, Switches};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::pwm::{Channel, Polarity, Pwm};

pub struct PwmMotorDriver {
    pwm: Pwm,
    enable: OutputPin,
}

impl PwmMotorDriver {
    /// Open the PWM channel at `frequency_hz` with 0% duty and the enable line low.
    pub fn new(pwm_channel: u8, frequency_hz: f64, enable_pin: u8) -> Result<Self> {
        let channel = match pwm_channel {
            0 => Channel::Pwm0,
            1 => Channel::Pwm1,
            other => return Err(HwError::Pwm(format!("unsupported pwm channel {other}"))),
        };
        let pwm = Pwm::with_frequency(channel, frequency_hz, 0.0, Polarity::Normal, true)
            .map_err(|e| HwError::Pwm(e.to_string()))?;
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut enable = gpio
            .get(enable_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        enable.set_low();
        tracing::info!(pwm_channel, frequency_hz, enable_pin, "pwm motor driver ready");
        Ok(Self { pwm, enable })
    }
}

impl MotorDriver for PwmMotorDriver {
    fn set_duty_cycle(
        &mut self,
        percent: f32,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let duty = f64::from(percent.clamp(0.0, 100.0)) / 100.0;
        self.pwm
            .set_duty_cycle(duty)
            .map_err(|e| HwError::Pwm(e.to_string()))?;
        Ok(())
    }

    fn set_enabled(
        &mut self,
        on: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if on {
            self.enable.set_high();
        } else {
            self.enable.set_low();
        }
        Ok(())
    }
}

/// Run and shutdown switches wired to ground through the internal pull-ups.
pub struct GpioSwitches {
    run: InputPin,
    shutdown: InputPin,
}

impl GpioSwitches {
    pub fn new(run_pin: u8, shutdown_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let run = gpio
            .get(run_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();
        let shutdown = gpio
            .get(shutdown_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();
        Ok(Self { run, shutdown })
    }
}

impl Switches for GpioSwitches {
    fn read(&mut self) -> std::result::Result<SwitchState, Box<dyn std::error::Error + Send + Sync>> {
        // active low
        Ok(SwitchState {
            run: self.run.is_low(),
            shutdown: self.shutdown.is_low(),
        })
    }
}
