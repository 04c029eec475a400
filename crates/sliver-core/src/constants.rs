/// Distinct completed days needed to reach freedom mode.
pub const HABIT_DAYS: usize = 21;

/// Daily page goals offered when a new document is started.
pub const DAILY_GOAL_OPTIONS: [u32; 5] = [3, 5, 10, 15, 20];

/// Goal preselected when none is given.
pub const DEFAULT_DAILY_GOAL: u32 = 5;

/// Seconds in one local day; the countdown never reports more than this minus one.
pub const SECONDS_PER_DAY: i64 = 86_400;
