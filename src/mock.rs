//! In-memory line, PWM and delay models shared by the unit tests.

extern crate std;

use core::cell::RefCell;
use core::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital;
use embedded_hal::pwm::{self, SetDutyCycle};

use crate::bus::{Lines, OutputBus};
use crate::Rgb3;

/// Everything the engine did to the hardware, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// One batched bus write
    Bus { set: Lines, clear: Lines },
    /// A single pin change through `PinBus`
    Pin { line: usize, high: bool },
    /// Display-enable duty update
    Duty(u16),
    /// Delay request
    DelayNs(u32),
}

#[derive(Debug, Default, Clone)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn take(&self) -> Vec<Event> {
        core::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }
}

pub struct MockPin {
    log: EventLog,
    line: usize,
}

impl MockPin {
    pub fn new(log: &EventLog, line: usize) -> Self {
        Self {
            log: log.clone(),
            line,
        }
    }
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.log.push(Event::Pin {
            line: self.line,
            high: false,
        });
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.log.push(Event::Pin {
            line: self.line,
            high: true,
        });
        Ok(())
    }
}

/// Bus that records every write and tracks the resulting line levels.
pub struct MockBus {
    log: EventLog,
    pub state: Lines,
}

impl MockBus {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            state: Lines::NONE,
        }
    }
}

impl OutputBus for MockBus {
    fn modify(&mut self, set: Lines, clear: Lines) {
        assert!((set & clear).is_empty(), "line both set and cleared");
        self.state = (self.state | set) & !clear;
        self.log.push(Event::Bus { set, clear });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmFault;

impl pwm::Error for PwmFault {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// PWM channel that records duty updates and can fail after a number of them.
pub struct MockPwm {
    log: EventLog,
    max: u16,
    remaining: Option<usize>,
}

impl MockPwm {
    pub fn new(log: &EventLog, max: u16) -> Self {
        Self {
            log: log.clone(),
            max,
            remaining: None,
        }
    }

    pub fn failing_after(log: &EventLog, max: u16, updates: usize) -> Self {
        Self {
            remaining: Some(updates),
            ..Self::new(log, max)
        }
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = PwmFault;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        assert!(duty <= self.max, "duty {duty} above max {}", self.max);
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(PwmFault);
            }
            *remaining -= 1;
        }
        self.log.push(Event::Duty(duty));
        Ok(())
    }
}

/// Zero-cost clock: records requested delays without waiting.
pub struct MockDelay {
    log: EventLog,
}

impl MockDelay {
    pub fn new(log: &EventLog) -> Self {
        Self { log: log.clone() }
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.push(Event::DelayNs(ns));
    }
}

/// What a panel latched for one row address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Latched {
    pub addr: u8,
    /// `(upper, lower)` lane pixels in the order they were clocked in
    pub data: Vec<(Rgb3, Rgb3)>,
}

/// Replays bus writes into a model of the panel shift registers.
///
/// Colour lines are sampled on every rising clock edge; a rising latch edge
/// captures the shifted data together with the current row address.
pub fn replay(events: &[Event]) -> Vec<Latched> {
    let mut state = Lines::NONE;
    let mut shift = Vec::new();
    let mut latched = Vec::new();

    for event in events {
        let Event::Bus { set, clear } = *event else {
            continue;
        };
        let next = (state | set) & !clear;
        if next.clock() && !state.clock() {
            let upper = Rgb3::new(next.red1(), next.grn1(), next.blu1());
            let lower = Rgb3::new(next.red2(), next.grn2(), next.blu2());
            shift.push((upper, lower));
        }
        if next.latch() && !state.latch() {
            latched.push(Latched {
                addr: next.addr(),
                data: core::mem::take(&mut shift),
            });
        }
        state = next;
    }
    latched
}
