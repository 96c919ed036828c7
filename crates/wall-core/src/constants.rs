use std::time::Duration;

/// Header shown until the collaborator supplies one.
pub const DEFAULT_HEADER: &str = "What ways can we use AI?";

/// Upper bound on idea text length, in chars, after trimming.
pub const MAX_TEXT_CHARS: usize = 500;

/// Consecutive authoritative snapshots an id must be missing from before removal.
pub const REMOVAL_STRIKES: u32 = 2;

/// Bob angular rate in rad/s (~0.3 Hz).
pub const BOB_RATE: f64 = 1.9;

/// Vertical bob amplitude in px.
pub const BOB_AMPLITUDE: f64 = 8.0;

/// Cruise drift speed in px/s.
pub const DRIFT_SPEED: f64 = 12.0;

/// Relative per-actor variation of the cruise speed.
pub const DRIFT_VARIANCE: f64 = 0.6;

/// Rate (1/s) at which velocity eases toward the cruise vector.
pub const DRIFT_EASE: f64 = 0.8;

/// Heading random-walk intensity in rad/√s.
pub const HEADING_JITTER: f64 = 0.35;

/// Multiplier applied to the idea id to seed per-actor motion.
pub const DRIFT_SEED_MULTIPLIER: u64 = 1337;

/// Horizontal keep-out margin from the display edges, px.
pub const MARGIN_X: f64 = 80.0;

/// Vertical keep-out margin from the display edges, px.
pub const MARGIN_Y: f64 = 40.0;

/// Wrap width as a fraction of display width.
pub const MAX_TEXT_WIDTH_RATIO: f64 = 0.42;

/// Minimum centre distance placement tries to keep between actors, px.
pub const MIN_ACTOR_SPACING: f64 = 60.0;

/// Rejection-sampling attempts before settling on the best candidate.
pub const PLACEMENT_RETRIES: usize = 8;

/// How long a retiring actor stays on screen.
pub const EXIT_WINDOW: Duration = Duration::from_millis(600);

/// Time between spotlight selections.
pub const SPOTLIGHT_PERIOD: Duration = Duration::from_secs(7);

/// Recent selections excluded from the next spotlight pick.
pub const SPOTLIGHT_HISTORY: usize = 3;

/// Peak emphasis scale of the spotlighted actor.
pub const SPOT_SCALE_MAX: f64 = 1.28;

/// Largest Δt a single frame may advance by, seconds.
pub const MAX_FRAME_DT: f64 = 0.25;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;
