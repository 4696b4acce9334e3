//! Status LED driven by the connectivity state

use std::{io, path::PathBuf, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::{state::ConnectivityMonitor, types::ConnectivityState};

/// A single on/off indicator
pub trait StatusLed: Send + 'static {
    fn set(&mut self, on: bool) -> io::Result<()>;
}

/// LED exposed through the Linux LED class
#[derive(Debug)]
pub struct SysfsLed {
    brightness: PathBuf,
}

impl SysfsLed {
    pub fn new(name: &str) -> Self {
        Self {
            brightness: PathBuf::from(format!("/sys/class/leds/{name}/brightness")),
        }
    }
}

impl StatusLed for SysfsLed {
    fn set(&mut self, on: bool) -> io::Result<()> {
        std::fs::write(&self.brightness, if on { "1" } else { "0" })
    }
}

/// Used when no LED is configured
#[derive(Debug, Default)]
pub struct NoLed;

impl StatusLed for NoLed {
    fn set(&mut self, _on: bool) -> io::Result<()> {
        Ok(())
    }
}

/// One period of the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPattern {
    /// `times` on/off cycles, each half lasting `interval`
    Blink { times: u8, interval: Duration },
    /// On for the whole `period`
    Steady { period: Duration },
}

pub fn pattern_for(state: ConnectivityState) -> BlinkPattern {
    match state {
        ConnectivityState::AwaitingRadio => BlinkPattern::Blink {
            times: 3,
            interval: Duration::from_millis(500),
        },
        ConnectivityState::AwaitingAddress => BlinkPattern::Blink {
            times: 10,
            interval: Duration::from_millis(100),
        },
        ConnectivityState::Connected => BlinkPattern::Steady {
            period: Duration::from_secs(1),
        },
    }
}

/// Renders the connectivity state on a [`StatusLed`]
pub struct Indicator<L> {
    led: L,
    monitor: ConnectivityMonitor,
}

impl<L: StatusLed> Indicator<L> {
    pub fn new(led: L, monitor: ConnectivityMonitor) -> Self {
        Self { led, monitor }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Play the pattern of the current state, forever
    pub async fn run(mut self) {
        let mut failing = false;
        loop {
            let pattern = pattern_for(self.monitor.current());
            if let Err(e) = self.play(pattern).await {
                if !failing {
                    warn!(error = %e, "Status LED write failed");
                    failing = true;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            } else if failing {
                debug!("Status LED recovered");
                failing = false;
            }
        }
    }

    async fn play(&mut self, pattern: BlinkPattern) -> io::Result<()> {
        match pattern {
            BlinkPattern::Blink { times, interval } => {
                for _ in 0..times {
                    self.led.set(true)?;
                    tokio::time::sleep(interval).await;
                    self.led.set(false)?;
                    tokio::time::sleep(interval).await;
                }
            }
            BlinkPattern::Steady { period } => {
                self.led.set(true)?;
                tokio::time::sleep(period).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{gate::ServiceGate, state::ConnectivityStateMachine, types::ConnectivitySignal};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingLed(Arc<Mutex<Vec<bool>>>);

    impl StatusLed for RecordingLed {
        fn set(&mut self, on: bool) -> io::Result<()> {
            self.0.lock().unwrap().push(on);
            Ok(())
        }
    }

    #[test]
    fn test_patterns() {
        assert_eq!(
            pattern_for(ConnectivityState::AwaitingRadio),
            BlinkPattern::Blink {
                times: 3,
                interval: Duration::from_millis(500)
            }
        );
        assert_eq!(
            pattern_for(ConnectivityState::Connected),
            BlinkPattern::Steady {
                period: Duration::from_secs(1)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_awaiting_radio_blinks_three_times() {
        let (_machine, monitor) = ConnectivityStateMachine::new(ServiceGate::new());
        let led = RecordingLed::default();
        let handle = Indicator::new(led.clone(), monitor).spawn();

        // One full period is 3 * 2 * 500ms
        tokio::time::sleep(Duration::from_millis(2900)).await;
        handle.abort();

        assert_eq!(
            *led.0.lock().unwrap(),
            vec![true, false, true, false, true, false]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_is_steady() {
        let (mut machine, monitor) = ConnectivityStateMachine::new(ServiceGate::new());
        machine.apply(ConnectivitySignal::RadioStarted);
        machine.apply(ConnectivitySignal::AddressAcquired);

        let led = RecordingLed::default();
        let handle = Indicator::new(led.clone(), monitor).spawn();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.abort();

        assert!(led.0.lock().unwrap().iter().all(|on| *on));
    }
}
