//! Boot button as a stop request.
//!
//! Active-low switch with the internal pull-up.  The falling-edge ISR only
//! raises the shared [`StopSignal`]; the supervisor notices it at the next
//! cycle boundary or sleep chunk.  The interrupt is one-shot: a second
//! press has nothing left to do.

use log::info;

use crate::app::supervisor::StopSignal;

pub struct StopButton {
    signal: StopSignal,
    #[cfg(target_os = "espidf")]
    _pin: esp_idf_svc::hal::gpio::PinDriver<
        'static,
        esp_idf_svc::hal::gpio::AnyIOPin,
        esp_idf_svc::hal::gpio::Input,
    >,
}

impl StopButton {
    #[cfg(target_os = "espidf")]
    pub fn new(
        pin: esp_idf_svc::hal::gpio::AnyIOPin,
        signal: StopSignal,
    ) -> anyhow::Result<Self> {
        use esp_idf_svc::hal::gpio::{InterruptType, PinDriver, Pull};

        let mut driver = PinDriver::input(pin)?;
        driver.set_pull(Pull::Up)?;
        driver.set_interrupt_type(InterruptType::NegEdge)?;

        let isr_signal = signal.clone();
        // SAFETY: the callback performs a single atomic store and is safe to
        // run in ISR context.
        unsafe {
            driver.subscribe(move || isr_signal.raise())?;
        }
        driver.enable_interrupt()?;
        info!("StopButton: armed");

        Ok(Self { signal, _pin: driver })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(signal: StopSignal) -> Self {
        info!("StopButton(sim): armed");
        Self { signal }
    }

    /// Simulation: behave as if the button was pressed.
    #[cfg(not(target_os = "espidf"))]
    pub fn press(&self) {
        self.signal.raise();
    }

    pub fn pressed(&self) -> bool {
        self.signal.is_raised()
    }
}
