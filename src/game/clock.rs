//! Per-player countdown with increment and reset-per-move policies.
//!
//! Only one side is charged at a time. Time arrives as explicit
//! [`ClockEngine::tick`] calls; the engine never reads a wall clock.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::game::coords::Side;

/// How remaining time is topped up after each move.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeControlPolicy {
    /// Both start with `base` seconds; the mover gains `bonus` after each move.
    Increment { base: u64, bonus: u64 },
    /// The side whose turn begins is reset to `allowance` seconds.
    ResetPerMove { allowance: u64 },
}

impl TimeControlPolicy {
    fn starting_time(self) -> u64 {
        match self {
            TimeControlPolicy::Increment { base, .. } => base,
            TimeControlPolicy::ResetPerMove { allowance } => allowance,
        }
    }
}

/// Named presets offered when starting a game.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControl {
    Blitz,
    Tempo,
    Classic,
    None,
}

impl TimeControl {
    /// The clock policy for this preset, or `None` for untimed games.
    pub fn policy(self) -> Option<TimeControlPolicy> {
        match self {
            TimeControl::Blitz => Some(TimeControlPolicy::Increment { base: 180, bonus: 3 }),
            TimeControl::Tempo => Some(TimeControlPolicy::ResetPerMove { allowance: 20 }),
            TimeControl::Classic => Some(TimeControlPolicy::ResetPerMove { allowance: 60 }),
            TimeControl::None => None,
        }
    }
}

impl std::str::FromStr for TimeControl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blitz" => Ok(TimeControl::Blitz),
            "tempo" => Ok(TimeControl::Tempo),
            "classic" => Ok(TimeControl::Classic),
            "none" => Ok(TimeControl::None),
            other => Err(format!("unknown time control: {other}")),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(tag = "state", content = "side", rename_all = "snake_case")]
pub enum ClockPhase {
    Stopped,
    Running(Side),
    Expired(Side),
}

/// Remaining seconds for each side plus whose clock is live.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct ClockState {
    pub white_remaining: u64,
    pub black_remaining: u64,
    pub side_to_move: Side,
    pub running: bool,
}

impl ClockState {
    pub fn remaining(&self, side: Side) -> u64 {
        match side {
            Side::White => self.white_remaining,
            Side::Black => self.black_remaining,
        }
    }

    fn remaining_mut(&mut self, side: Side) -> &mut u64 {
        match side {
            Side::White => &mut self.white_remaining,
            Side::Black => &mut self.black_remaining,
        }
    }
}

/// Raised once, by the tick that runs a side out of time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Expiry {
    pub side: Side,
}

#[derive(Clone, Debug)]
pub struct ClockEngine {
    policy: TimeControlPolicy,
    phase: ClockPhase,
    state: ClockState,
}

impl ClockEngine {
    /// A stopped clock with both sides at the policy's starting time.
    pub fn new(policy: TimeControlPolicy) -> Self {
        let starting = policy.starting_time();
        Self {
            policy,
            phase: ClockPhase::Stopped,
            state: ClockState {
                white_remaining: starting,
                black_remaining: starting,
                side_to_move: Side::White,
                running: false,
            },
        }
    }

    pub fn policy(&self) -> TimeControlPolicy {
        self.policy
    }

    pub fn phase(&self) -> ClockPhase {
        self.phase
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Resets both sides to the starting time and runs `side`'s clock.
    pub fn start(&mut self, policy: TimeControlPolicy, side: Side) {
        let starting = policy.starting_time();
        self.policy = policy;
        self.state = ClockState {
            white_remaining: starting,
            black_remaining: starting,
            side_to_move: side,
            running: true,
        };
        self.phase = ClockPhase::Running(side);
        info!("Clock started for {} with {:?}", side, policy);
    }

    /// Charges `elapsed` seconds to the active side.
    ///
    /// Ignored unless running. Returns the expiry on the tick that reaches
    /// zero; the clock is then terminal and later ticks return `None`.
    pub fn tick(&mut self, elapsed: u64) -> Option<Expiry> {
        let ClockPhase::Running(active) = self.phase else {
            debug!("Tick of {}s ignored while {:?}", elapsed, self.phase);
            return None;
        };

        let remaining = self.state.remaining_mut(active);
        *remaining = remaining.saturating_sub(elapsed);
        if *remaining > 0 {
            return None;
        }

        info!("{} ran out of time", active);
        self.phase = ClockPhase::Expired(active);
        self.state.running = false;
        Some(Expiry { side: active })
    }

    /// Applies the post-move adjustment, then hands the clock to the opponent.
    ///
    /// Ignored unless running.
    pub fn on_move_committed(&mut self, mover: Side) {
        let ClockPhase::Running(active) = self.phase else {
            debug!("Move by {} ignored by clock while {:?}", mover, self.phase);
            return;
        };
        if active != mover {
            debug!("Clock was running for {} but {} moved", active, mover);
        }

        let next = mover.opposite();
        match self.policy {
            TimeControlPolicy::Increment { bonus, .. } => {
                let remaining = self.state.remaining_mut(mover);
                *remaining = remaining.saturating_add(bonus);
            }
            TimeControlPolicy::ResetPerMove { allowance } => {
                *self.state.remaining_mut(next) = allowance;
            }
        }

        self.state.side_to_move = next;
        self.phase = ClockPhase::Running(next);
    }

    /// Stops the clock from any state. Remaining times are kept.
    pub fn stop(&mut self) {
        if self.phase != ClockPhase::Stopped {
            debug!("Clock stopped from {:?}", self.phase);
        }
        self.phase = ClockPhase::Stopped;
        self.state.running = false;
    }
}
