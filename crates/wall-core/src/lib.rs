//! Idea wall state engine.
//!
//! Mirrors a remote, append-only collection of ideas into an entity store
//! fed by two unreliable channels (push and poll), and drives a
//! continuously animated set of actors over it. Mutations funnel through
//! one reconciler; animation state lives on actors that are linked to
//! ideas only by id.
//!
//! Zero I/O: pure state with no opinions about transport or rendering.

pub mod backoff;
pub mod constants;
pub mod frame;
pub mod geometry;
pub mod idea;
pub mod layout;
pub mod phasor;
pub mod presentation;
pub mod reconcile;
pub mod spotlight;
pub mod store;
pub mod time;

pub use backoff::{Backoff, BackoffPolicy, ConnectionState, ConnectionStatus, Reconnector};
pub use constants::{DEFAULT_HEADER, MAX_TEXT_CHARS, SPOTLIGHT_HISTORY, SPOTLIGHT_PERIOD};
pub use frame::{ActorView, FrameDriver, FrameSnapshot, Renderer};
pub use geometry::{Bounds, Vec2};
pub use idea::{Idea, IdeaError, IdeaId};
pub use layout::{MonospaceMeasure, RenderCacheKey, TextLayout, TextMeasure, layout_idea};
pub use phasor::BobPhase;
pub use presentation::{Actor, PresentationConfig, PresentationState, SyncReport};
pub use reconcile::{ReconcileReport, Reconciler, Update};
pub use spotlight::{SpotlightScheduler, SpotlightState};
pub use store::{EntityStore, Ordered, UpsertOutcome};
pub use time::Timestamp;
