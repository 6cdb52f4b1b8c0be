/// A hardware timer channel offered by a [`TimerBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerSlot {
    /// Channel index within the bank.
    pub index: u8,
    /// The channel is normally set aside for PWM generation.
    pub pwm_reserved: bool,
}

/// The set of general-purpose timer channels on a board.
///
/// Implementations arbitrate channels between users. A channel handed out by
/// [`TimerBank::take`] is not offered again until it comes back through
/// [`TimerBank::give_back`].
pub trait TimerBank {
    /// Driver for one claimed channel.
    type Timer: PeriodicTimer;

    /// Find a free channel.
    ///
    /// With `allow_pwm_reserved` set, channels reserved for PWM may be
    /// returned when no other channel is free.
    fn available_timer(&mut self, allow_pwm_reserved: bool) -> Option<TimerSlot>;

    /// Allow the next [`TimerBank::take`] to claim a PWM-reserved channel.
    fn force_use_of_pwm_reserved(&mut self);

    /// Claim the channel described by `slot`.
    fn take(&mut self, slot: TimerSlot) -> Option<Self::Timer>;

    /// Return a claimed channel whose bring-up failed, making it available again.
    fn give_back(&mut self, slot: TimerSlot, timer: Self::Timer);
}

/// A claimed timer channel that can be run in periodic mode.
///
/// The bring-up order is `begin`, `setup_overflow_irq`, `open`, `start`.
pub trait PeriodicTimer {
    type Error;

    /// Configure periodic mode with an overflow every `1 / frequency_hz` seconds.
    fn begin(&mut self, frequency_hz: f32) -> Result<(), Self::Error>;

    /// Enable the overflow interrupt.
    fn setup_overflow_irq(&mut self) -> Result<(), Self::Error>;

    fn open(&mut self) -> Result<(), Self::Error>;

    fn start(&mut self) -> Result<(), Self::Error>;
}
