//! Clock synchronizer.
//!
//! The server sends periodic snapshots of both players' remaining time.
//! Between snapshots the clock of the side to move is run down locally from
//! fixed-interval ticks. All times are milliseconds and every entry point
//! takes the caller's notion of "now", so the synchronizer never reads a
//! clock itself.
//!
//! The base tick is shared; what happens when a period runs out and when a
//! move is committed differs per time system and lives behind
//! [`TimePolicy`].

use std::fmt;

use goban_types::messages::{ClockSnapshot, PlayerTime};
use goban_types::{Stone, TimeControl};

/// Per-system behavior plugged into the shared tick loop.
pub trait TimePolicy: fmt::Debug + Send {
    /// Short system name, for display.
    fn name(&self) -> &'static str;

    /// Whether this system runs a clock at all.
    fn ticks(&self) -> bool {
        true
    }

    /// Main time just reached zero. Set up overtime if the system has one.
    fn enter_overtime(&self, _time: &mut PlayerTime) {}

    /// The current period ran out. Return `false` if the player is out of
    /// time.
    fn period_exhausted(&self, time: &mut PlayerTime) -> bool {
        time.period_ms = 0;
        false
    }

    /// The player committed a move.
    fn on_move(&self, _time: &mut PlayerTime) {}
}

/// Main time, then reloading periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Byoyomi {
    /// Length of one period.
    pub period_ms: u64,
}

impl TimePolicy for Byoyomi {
    fn name(&self) -> &'static str {
        "byoyomi"
    }

    fn enter_overtime(&self, time: &mut PlayerTime) {
        if time.periods > 0 && time.period_ms == 0 {
            time.period_ms = self.period_ms;
        }
    }

    fn period_exhausted(&self, time: &mut PlayerTime) -> bool {
        time.periods = time.periods.saturating_sub(1);
        if time.periods > 0 {
            time.period_ms = self.period_ms;
            true
        } else {
            time.period_ms = 0;
            false
        }
    }

    fn on_move(&self, time: &mut PlayerTime) {
        if time.main_ms == 0 && time.periods > 0 {
            time.period_ms = self.period_ms;
        }
    }
}

/// Main time, then one period that must cover a fixed number of stones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canadian {
    /// Length of one period.
    pub period_ms: u64,
    /// Stones to play per period.
    pub stones: u32,
}

impl TimePolicy for Canadian {
    fn name(&self) -> &'static str {
        "canadian"
    }

    fn enter_overtime(&self, time: &mut PlayerTime) {
        if time.periods == 0 && time.period_ms == 0 {
            time.periods = 1;
            time.period_ms = self.period_ms;
            time.stones_left = Some(self.stones);
        }
    }

    fn on_move(&self, time: &mut PlayerTime) {
        if time.main_ms > 0 || time.periods == 0 {
            return;
        }
        let left = time.stones_left.unwrap_or(self.stones).saturating_sub(1);
        if left == 0 {
            time.period_ms = self.period_ms;
            time.stones_left = Some(self.stones);
        } else {
            time.stones_left = Some(left);
        }
    }
}

/// Increment per move, optionally capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fischer {
    /// Time added after each move.
    pub increment_ms: u64,
    /// Upper bound on accumulated time.
    pub max_ms: Option<u64>,
}

impl TimePolicy for Fischer {
    fn name(&self) -> &'static str {
        "fischer"
    }

    fn on_move(&self, time: &mut PlayerTime) {
        let next = time.main_ms.saturating_add(self.increment_ms);
        time.main_ms = match self.max_ms {
            Some(max) => next.min(max),
            None => next,
        };
    }
}

/// Fixed time per move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Simple {
    /// Time per move.
    pub per_move_ms: u64,
}

impl TimePolicy for Simple {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn on_move(&self, time: &mut PlayerTime) {
        time.main_ms = self.per_move_ms;
    }
}

/// One total budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Absolute;

impl TimePolicy for Absolute {
    fn name(&self) -> &'static str {
        "absolute"
    }
}

/// No clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Untimed;

impl TimePolicy for Untimed {
    fn name(&self) -> &'static str {
        "none"
    }

    fn ticks(&self) -> bool {
        false
    }
}

/// Policy for a decoded time control.
pub fn policy_for(tc: &TimeControl) -> Box<dyn TimePolicy> {
    match *tc {
        TimeControl::Byoyomi { period_ms, .. } => Box::new(Byoyomi { period_ms }),
        TimeControl::Canadian { period_ms, stones, .. } => Box::new(Canadian { period_ms, stones }),
        TimeControl::Fischer {
            increment_ms, max_ms, ..
        } => Box::new(Fischer { increment_ms, max_ms }),
        TimeControl::Simple { per_move_ms } => Box::new(Simple { per_move_ms }),
        TimeControl::Absolute { .. } => Box::new(Absolute),
        TimeControl::None => Box::new(Untimed),
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing ran: paused, no ticking color, or untimed.
    Idle,
    /// `color`'s clock ran; this is its time now.
    Ticked(Stone, PlayerTime),
    /// `color` ran out of time. Reported once per color.
    Expired(Stone),
}

/// Both players' clocks between server snapshots.
#[derive(Debug)]
pub struct ClockSync {
    policy: Box<dyn TimePolicy>,
    // Set once a time control named the system; until then each snapshot
    // picks the policy.
    policy_known: bool,
    times: [PlayerTime; 2],
    ticking: Option<Stone>,
    last_tick_ms: Option<u64>,
    paused: bool,
    expired: [bool; 2],
}

impl ClockSync {
    /// A stopped clock with the given policy.
    pub fn new(policy: Box<dyn TimePolicy>) -> Self {
        Self {
            policy,
            policy_known: true,
            times: [PlayerTime::default(); 2],
            ticking: None,
            last_tick_ms: None,
            paused: false,
            expired: [false; 2],
        }
    }

    /// A stopped clock for a time control, with both players at their
    /// starting allowance.
    pub fn for_time_control(tc: &TimeControl) -> Self {
        let mut clock = Self::new(policy_for(tc));
        let start = starting_time(tc);
        clock.times = [start, start];
        clock
    }

    /// Swap the policy, keeping the current times.
    pub fn set_policy(&mut self, policy: Box<dyn TimePolicy>) {
        self.policy = policy;
        self.policy_known = true;
    }

    /// Name of the active time system.
    pub fn system(&self) -> &'static str {
        self.policy.name()
    }

    /// Adopt a server snapshot as the new baseline, taken at `now_ms`.
    ///
    /// With no time control seen yet, the policy is inferred from the
    /// snapshot: byoyomi when either side has periods, absolute otherwise.
    pub fn apply_snapshot(&mut self, snapshot: &ClockSnapshot, now_ms: u64) {
        if !self.policy_known {
            self.policy = inferred_policy(snapshot);
        }
        self.times = [snapshot.black, snapshot.white];
        self.ticking = snapshot.current;
        self.paused = snapshot.paused;
        self.last_tick_ms = Some(now_ms);
        for color in [Stone::Black, Stone::White] {
            if has_time(&self.times[color.index()]) {
                self.expired[color.index()] = false;
            }
        }
    }

    /// Run down the ticking color by the time elapsed since the last tick.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        let last = self.last_tick_ms.replace(now_ms);
        let color = match self.ticking {
            Some(c) if !self.paused && self.policy.ticks() => c,
            _ => return TickOutcome::Idle,
        };
        if self.expired[color.index()] {
            return TickOutcome::Idle;
        }
        let elapsed = last.map(|l| now_ms.saturating_sub(l)).unwrap_or(0);

        let policy = &self.policy;
        let time = &mut self.times[color.index()];
        let alive = if time.main_ms > 0 {
            time.main_ms = time.main_ms.saturating_sub(elapsed);
            if time.main_ms == 0 {
                policy.enter_overtime(time);
            }
            true
        } else if time.periods > 0 {
            time.period_ms = time.period_ms.saturating_sub(elapsed);
            time.period_ms > 0 || policy.period_exhausted(time)
        } else {
            false
        };

        if alive {
            TickOutcome::Ticked(color, *time)
        } else {
            self.expired[color.index()] = true;
            TickOutcome::Expired(color)
        }
    }

    /// `color` committed a move. Applies the system's per-move rule and
    /// stops its clock; the next snapshot says who ticks next.
    pub fn on_move(&mut self, color: Stone) {
        self.policy.on_move(&mut self.times[color.index()]);
        if self.ticking == Some(color) {
            self.ticking = None;
        }
    }

    /// Stop ticking until [`ClockSync::resume`].
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Restart ticking from `now_ms` so the pause is not charged.
    pub fn resume(&mut self, now_ms: u64) {
        self.paused = false;
        self.last_tick_ms = Some(now_ms);
    }

    /// Stop the clock for good (game over).
    pub fn stop(&mut self) {
        self.ticking = None;
    }

    /// Remaining time for `color`.
    pub fn time_of(&self, color: Stone) -> PlayerTime {
        self.times[color.index()]
    }

    /// Main time, or period time once main time is gone.
    pub fn display_ms(&self, color: Stone) -> u64 {
        let t = self.time_of(color);
        if t.main_ms > 0 {
            t.main_ms
        } else {
            t.period_ms
        }
    }

    /// Color currently running down.
    pub fn ticking(&self) -> Option<Stone> {
        self.ticking
    }

    /// Whether ticking is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Default for ClockSync {
    /// Untimed until a time control or a snapshot says otherwise.
    fn default() -> Self {
        Self {
            policy_known: false,
            ..Self::new(Box::new(Untimed))
        }
    }
}

fn inferred_policy(snapshot: &ClockSnapshot) -> Box<dyn TimePolicy> {
    let (b, w) = (&snapshot.black, &snapshot.white);
    if b.periods > 0 || w.periods > 0 {
        Box::new(Byoyomi {
            period_ms: b.period_ms.max(w.period_ms),
        })
    } else {
        Box::new(Absolute)
    }
}

fn has_time(t: &PlayerTime) -> bool {
    t.main_ms > 0 || (t.periods > 0 && t.period_ms > 0)
}

fn starting_time(tc: &TimeControl) -> PlayerTime {
    match *tc {
        TimeControl::Byoyomi {
            main_ms,
            period_ms,
            periods,
        } => PlayerTime {
            main_ms,
            periods,
            period_ms,
            stones_left: None,
        },
        TimeControl::Canadian {
            main_ms,
            period_ms,
            stones,
        } => PlayerTime {
            main_ms,
            periods: 1,
            period_ms,
            stones_left: Some(stones),
        },
        TimeControl::Fischer { initial_ms, .. } => PlayerTime {
            main_ms: initial_ms,
            ..PlayerTime::default()
        },
        TimeControl::Simple { per_move_ms } => PlayerTime {
            main_ms: per_move_ms,
            ..PlayerTime::default()
        },
        TimeControl::Absolute { total_ms } => PlayerTime {
            main_ms: total_ms,
            ..PlayerTime::default()
        },
        TimeControl::None => PlayerTime::default(),
    }
}

/// Format milliseconds as `m:ss`, or `h:mm:ss` past an hour.
pub fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byoyomi_clock(main_ms: u64, periods: u32, period_ms: u64) -> ClockSync {
        let mut clock = ClockSync::new(Box::new(Byoyomi { period_ms }));
        let t = PlayerTime {
            main_ms,
            periods,
            period_ms,
            stones_left: None,
        };
        clock.apply_snapshot(
            &ClockSnapshot {
                game_id: None,
                current: Some(Stone::Black),
                black: t,
                white: t,
                server_now_ms: None,
                paused: false,
            },
            0,
        );
        clock
    }

    #[test]
    fn only_ticking_color_runs() {
        let mut clock = byoyomi_clock(10_000, 3, 1_000);
        assert_eq!(
            clock.tick(400),
            TickOutcome::Ticked(Stone::Black, clock.time_of(Stone::Black))
        );
        assert_eq!(clock.time_of(Stone::Black).main_ms, 9_600);
        assert_eq!(clock.time_of(Stone::White).main_ms, 10_000);
    }

    #[test]
    fn main_time_floors_then_periods_run() {
        let mut clock = byoyomi_clock(500, 3, 1_000);
        clock.tick(800);
        let t = clock.time_of(Stone::Black);
        assert_eq!(t.main_ms, 0);
        assert_eq!(t.period_ms, 1_000, "no carry-over into the period");

        clock.tick(1_100);
        assert_eq!(clock.time_of(Stone::Black).period_ms, 700);
    }

    #[test]
    fn exhausted_period_reloads_then_expires() {
        let mut clock = byoyomi_clock(0, 2, 1_000);
        clock.tick(1_000);
        let t = clock.time_of(Stone::Black);
        assert_eq!((t.periods, t.period_ms), (1, 1_000));

        assert_eq!(clock.tick(2_000), TickOutcome::Expired(Stone::Black));
        assert_eq!(clock.time_of(Stone::Black).periods, 0);
        // reported once
        assert_eq!(clock.tick(3_000), TickOutcome::Idle);
    }

    #[test]
    fn move_in_period_reloads_byoyomi() {
        let mut clock = byoyomi_clock(0, 2, 1_000);
        clock.tick(600);
        clock.on_move(Stone::Black);
        assert_eq!(clock.time_of(Stone::Black).period_ms, 1_000);
        assert_eq!(clock.ticking(), None);
    }

    #[test]
    fn paused_or_no_color_is_idle() {
        let mut clock = byoyomi_clock(10_000, 0, 0);
        clock.pause();
        assert_eq!(clock.tick(5_000), TickOutcome::Idle);
        clock.resume(5_000);
        clock.tick(5_100);
        assert_eq!(clock.time_of(Stone::Black).main_ms, 9_900);

        clock.stop();
        assert_eq!(clock.tick(9_000), TickOutcome::Idle);
    }

    #[test]
    fn snapshot_without_time_control_still_ticks() {
        let mut clock = ClockSync::default();
        assert_eq!(clock.system(), "none");
        let t = PlayerTime {
            main_ms: 5_000,
            ..PlayerTime::default()
        };
        let snapshot = ClockSnapshot {
            game_id: None,
            current: Some(Stone::Black),
            black: t,
            white: t,
            server_now_ms: None,
            paused: false,
        };
        clock.apply_snapshot(&snapshot, 1_000);
        assert_eq!(clock.system(), "absolute");
        clock.tick(1_500);
        assert_eq!(clock.time_of(Stone::Black).main_ms, 4_500);

        let overtime = PlayerTime {
            main_ms: 0,
            periods: 3,
            period_ms: 30_000,
            stones_left: None,
        };
        clock.apply_snapshot(
            &ClockSnapshot {
                black: overtime,
                ..snapshot
            },
            2_000,
        );
        assert_eq!(clock.system(), "byoyomi");
    }

    #[test]
    fn explicit_untimed_never_ticks() {
        let mut clock = ClockSync::for_time_control(&TimeControl::None);
        clock.apply_snapshot(
            &ClockSnapshot {
                game_id: None,
                current: Some(Stone::White),
                black: PlayerTime::default(),
                white: PlayerTime {
                    main_ms: 5_000,
                    ..PlayerTime::default()
                },
                server_now_ms: None,
                paused: false,
            },
            0,
        );
        assert_eq!(clock.tick(1_000), TickOutcome::Idle);
        assert_eq!(clock.system(), "none");
    }

    #[test]
    fn fischer_increment_is_capped() {
        let policy = Fischer {
            increment_ms: 5_000,
            max_ms: Some(12_000),
        };
        let mut t = PlayerTime {
            main_ms: 10_000,
            ..PlayerTime::default()
        };
        policy.on_move(&mut t);
        assert_eq!(t.main_ms, 12_000);
    }

    #[test]
    fn canadian_reloads_after_n_stones() {
        let policy = Canadian {
            period_ms: 60_000,
            stones: 2,
        };
        let mut t = PlayerTime::default();
        policy.enter_overtime(&mut t);
        assert_eq!((t.periods, t.period_ms, t.stones_left), (1, 60_000, Some(2)));

        t.period_ms = 10_000;
        policy.on_move(&mut t);
        assert_eq!((t.period_ms, t.stones_left), (10_000, Some(1)));
        policy.on_move(&mut t);
        assert_eq!((t.period_ms, t.stones_left), (60_000, Some(2)));

        assert!(!policy.period_exhausted(&mut t));
    }

    #[test]
    fn simple_resets_per_move() {
        let mut clock = ClockSync::for_time_control(&TimeControl::Simple { per_move_ms: 30_000 });
        assert_eq!(clock.system(), "simple");
        assert_eq!(clock.time_of(Stone::White).main_ms, 30_000);
        clock.on_move(Stone::White);
        assert_eq!(clock.time_of(Stone::White).main_ms, 30_000);
    }

    #[test]
    fn untimed_never_ticks() {
        let mut clock = ClockSync::for_time_control(&TimeControl::None);
        clock.apply_snapshot(
            &ClockSnapshot {
                game_id: None,
                current: Some(Stone::White),
                black: PlayerTime::default(),
                white: PlayerTime::default(),
                server_now_ms: None,
                paused: false,
            },
            0,
        );
        assert_eq!(clock.tick(1_000), TickOutcome::Idle);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_ms(0), "0:00");
        assert_eq!(format_ms(65_400), "1:05");
        assert_eq!(format_ms(3_725_000), "1:02:05");
    }
}
