use std::cell::RefCell;
use std::rc::Rc;

use voltdrive_timer::{
    DispatcherState, IntervalDispatcher, PeriodicTimer, SetupStep, TimerBank, TimerError, TimerSlot,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Available(bool),
    Force,
    Take(u8),
    Begin(u8, f32),
    OverflowIrq(u8),
    Open(u8),
    Start(u8),
    GiveBack(u8),
}

type Log = Rc<RefCell<Vec<Call>>>;

#[derive(Debug, PartialEq)]
struct FakeTimerError;

struct FakeTimer {
    index: u8,
    fail_at: Option<SetupStep>,
    log: Log,
}

impl FakeTimer {
    fn step(&self, step: SetupStep, call: Call) -> Result<(), FakeTimerError> {
        self.log.borrow_mut().push(call);
        if self.fail_at == Some(step) {
            Err(FakeTimerError)
        } else {
            Ok(())
        }
    }
}

impl PeriodicTimer for FakeTimer {
    type Error = FakeTimerError;

    fn begin(&mut self, frequency_hz: f32) -> Result<(), Self::Error> {
        self.step(SetupStep::Begin, Call::Begin(self.index, frequency_hz))
    }

    fn setup_overflow_irq(&mut self) -> Result<(), Self::Error> {
        self.step(SetupStep::OverflowIrq, Call::OverflowIrq(self.index))
    }

    fn open(&mut self) -> Result<(), Self::Error> {
        self.step(SetupStep::Open, Call::Open(self.index))
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        self.step(SetupStep::Start, Call::Start(self.index))
    }
}

/// Bank with free and PWM-reserved channels. Reserved channels can only be
/// taken after `force_use_of_pwm_reserved`.
struct FakeBank {
    slots: Vec<(TimerSlot, bool)>,
    forced: bool,
    fail_at: Option<SetupStep>,
    log: Log,
}

impl FakeBank {
    fn new(free: &[u8], pwm_reserved: &[u8]) -> Self {
        let slots = free
            .iter()
            .map(|&index| TimerSlot { index, pwm_reserved: false })
            .chain(pwm_reserved.iter().map(|&index| TimerSlot { index, pwm_reserved: true }))
            .map(|slot| (slot, false))
            .collect();
        Self {
            slots,
            forced: false,
            fail_at: None,
            log: Log::default(),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }
}

impl TimerBank for FakeBank {
    type Timer = FakeTimer;

    fn available_timer(&mut self, allow_pwm_reserved: bool) -> Option<TimerSlot> {
        self.log.borrow_mut().push(Call::Available(allow_pwm_reserved));
        self.slots
            .iter()
            .filter(|(_, claimed)| !claimed)
            .map(|(slot, _)| *slot)
            .find(|slot| !slot.pwm_reserved || allow_pwm_reserved)
    }

    fn force_use_of_pwm_reserved(&mut self) {
        self.log.borrow_mut().push(Call::Force);
        self.forced = true;
    }

    fn take(&mut self, slot: TimerSlot) -> Option<FakeTimer> {
        self.log.borrow_mut().push(Call::Take(slot.index));
        let forced = self.forced;
        let entry = self
            .slots
            .iter_mut()
            .find(|(s, claimed)| *s == slot && !claimed && (!s.pwm_reserved || forced))?;
        entry.1 = true;
        Some(FakeTimer {
            index: slot.index,
            fail_at: self.fail_at,
            log: Rc::clone(&self.log),
        })
    }

    fn give_back(&mut self, slot: TimerSlot, timer: FakeTimer) {
        self.log.borrow_mut().push(Call::GiveBack(timer.index));
        if let Some(entry) = self.slots.iter_mut().find(|(s, _)| *s == slot) {
            entry.1 = false;
        }
    }
}

#[test]
fn test_free_timer_is_preferred() {
    let mut bank = FakeBank::new(&[4], &[0]);
    let mut dispatcher = IntervalDispatcher::new();

    let running = dispatcher.configure_interval(&mut bank, 10).unwrap();
    assert_eq!(running.slot.index, 4);
    assert!(!running.shared);
    assert_eq!(running.interval_ms, 10);
    assert_eq!(running.frequency_hz, 100.0);
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    assert_eq!(
        bank.calls(),
        vec![
            Call::Available(false),
            Call::Take(4),
            Call::Begin(4, 100.0),
            Call::OverflowIrq(4),
            Call::Open(4),
            Call::Start(4),
        ]
    );
}

#[test]
fn test_zero_interval_runs_at_one_khz() {
    let mut bank = FakeBank::new(&[1], &[]);
    let mut dispatcher = IntervalDispatcher::new();

    let running = dispatcher.configure_interval(&mut bank, 0).unwrap();
    assert_eq!(running.interval_ms, 1);
    assert_eq!(running.frequency_hz, 1000.0);
    assert!(bank.calls().contains(&Call::Begin(1, 1000.0)));
}

#[test]
fn test_falls_back_to_pwm_reserved_timer() {
    let mut bank = FakeBank::new(&[], &[2]);
    let mut dispatcher = IntervalDispatcher::new();

    let running = dispatcher.configure_interval(&mut bank, 5).unwrap();
    assert!(running.shared);
    assert!(running.slot.pwm_reserved);
    assert_eq!(
        bank.calls()[..4],
        [
            Call::Available(false),
            Call::Available(true),
            Call::Force,
            Call::Take(2),
        ]
    );
    assert!(bank.calls().contains(&Call::Start(2)));
}

#[test]
fn test_no_timer_touches_nothing() {
    let mut bank = FakeBank::new(&[], &[]);
    let mut dispatcher = IntervalDispatcher::new();

    let result = dispatcher.configure_interval(&mut bank, 10);
    assert_eq!(result.unwrap_err(), TimerError::NoTimerAvailable);
    assert_eq!(dispatcher.state(), DispatcherState::Unconfigured);
    assert!(dispatcher.running().is_none());
    assert_eq!(
        bank.calls(),
        vec![Call::Available(false), Call::Available(true)]
    );
}

#[test]
fn test_failed_step_skips_the_rest() {
    let mut bank = FakeBank::new(&[3], &[]);
    bank.fail_at = Some(SetupStep::OverflowIrq);
    let mut dispatcher = IntervalDispatcher::new();

    let result = dispatcher.configure_interval(&mut bank, 20);
    assert_eq!(
        result.unwrap_err(),
        TimerError::Peripheral {
            step: SetupStep::OverflowIrq,
            source: FakeTimerError,
        }
    );
    assert_eq!(dispatcher.state(), DispatcherState::Unconfigured);
    let calls = bank.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[Call::OverflowIrq(3), Call::GiveBack(3)]
    );
    assert!(!calls.contains(&Call::Open(3)));
    assert!(!calls.contains(&Call::Start(3)));
}

#[test]
fn test_failed_channel_can_be_retried() {
    let mut bank = FakeBank::new(&[4], &[]);
    bank.fail_at = Some(SetupStep::Start);
    let mut dispatcher = IntervalDispatcher::new();

    assert!(dispatcher.configure_interval(&mut bank, 5).is_err());
    assert_eq!(
        bank.available_timer(false),
        Some(TimerSlot { index: 4, pwm_reserved: false })
    );

    bank.fail_at = None;
    let running = dispatcher.configure_interval(&mut bank, 5).unwrap();
    assert_eq!(running.slot.index, 4);
    assert!(!running.shared);
    assert_eq!(dispatcher.state(), DispatcherState::Running);
}

#[test]
fn test_running_dispatcher_is_not_reconfigured() {
    let mut bank = FakeBank::new(&[0, 1], &[]);
    let mut dispatcher = IntervalDispatcher::new();

    dispatcher.configure_interval(&mut bank, 10).unwrap();
    let before = bank.calls().len();

    let result = dispatcher.configure_interval(&mut bank, 1);
    assert_eq!(result.unwrap_err(), TimerError::AlreadyRunning);
    assert_eq!(bank.calls().len(), before);
    assert_eq!(dispatcher.running().unwrap().interval_ms, 10);
}

#[test]
fn test_error_messages() {
    let err: TimerError<FakeTimerError> = TimerError::Peripheral {
        step: SetupStep::Open,
        source: FakeTimerError,
    };
    assert_eq!(err.to_string(), "Timer open failed: FakeTimerError");
    assert_eq!(
        TimerError::<FakeTimerError>::NoTimerAvailable.to_string(),
        "No hardware timer available"
    );
}
