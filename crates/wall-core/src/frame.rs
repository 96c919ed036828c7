//! Fixed-cadence frame stepping and the read-only snapshot handed to the
//! renderer.

use std::sync::Arc;
use std::time::Instant;

use crate::backoff::ConnectionStatus;
use crate::constants::{BOB_AMPLITUDE, MAX_FRAME_DT};
use crate::geometry::Vec2;
use crate::idea::IdeaId;
use crate::layout::{MonospaceMeasure, TextLayout, TextMeasure};
use crate::presentation::{Actor, PresentationState};
use crate::reconcile::{ReconcileReport, Reconciler, Update};
use crate::spotlight::SpotlightScheduler;

/// Weight of the newest sample in the frame-rate moving average.
const FPS_SMOOTHING: f64 = 0.1;

#[derive(Clone, Debug)]
pub struct ActorView {
    pub idea_id: IdeaId,
    pub position: Vec2,
    pub bob_phase: f64,
    /// Vertical bob displacement to add to `position.y`.
    pub bob_offset: f64,
    pub entering_since: Instant,
    pub exiting: bool,
    /// 1.0 unless spotlighted.
    pub emphasis: f64,
    pub layout: Arc<TextLayout>,
}

#[derive(Clone, Debug)]
pub struct FrameSnapshot {
    pub frame: u64,
    pub at: Instant,
    pub header: String,
    /// Ideas currently in the store.
    pub idea_count: usize,
    /// Display order; retiring actors trail the live ones.
    pub actors: Vec<ActorView>,
    pub spotlight: Option<IdeaId>,
    pub connection: ConnectionStatus,
    pub fps: f64,
}

impl FrameSnapshot {
    pub fn actor(&self, id: IdeaId) -> Option<&ActorView> {
        self.actors.iter().find(|a| a.idea_id == id)
    }
}

/// Consumer of snapshots. Never mutates them.
pub trait Renderer {
    fn present(&mut self, snapshot: &FrameSnapshot);
}

/// Owns every piece of mutable wall state and steps it one frame at a time.
pub struct FrameDriver<M = MonospaceMeasure> {
    reconciler: Reconciler,
    presentation: PresentationState<M>,
    spotlight: SpotlightScheduler,
    connection: ConnectionStatus,
    frame: u64,
    last_tick: Option<Instant>,
    fps: f64,
}

impl<M: TextMeasure> FrameDriver<M> {
    pub fn new(presentation: PresentationState<M>, spotlight: SpotlightScheduler) -> Self {
        Self {
            reconciler: Reconciler::new(),
            presentation,
            spotlight,
            connection: ConnectionStatus::Disconnected,
            frame: 0,
            last_tick: None,
            fps: 0.0,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn presentation(&self) -> &PresentationState<M> {
        &self.presentation
    }

    pub fn spotlight(&self) -> &SpotlightScheduler {
        &self.spotlight
    }

    /// Hand a completed channel result to the reconciler. Presentation
    /// catches up on the next tick.
    pub fn apply(&mut self, update: Update) -> ReconcileReport {
        self.reconciler.apply(update)
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        self.connection = status;
    }

    pub fn resize(&mut self, width: f64, height: f64) -> usize {
        self.presentation
            .resize(width, height, self.reconciler.store())
    }

    pub fn tick(&mut self, now: Instant) -> FrameSnapshot {
        let dt = self
            .last_tick
            .map(|t| now.saturating_duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        if dt > 0.0 {
            let sample = 1.0 / dt;
            self.fps = if self.fps == 0.0 {
                sample
            } else {
                self.fps + (sample - self.fps) * FPS_SMOOTHING
            };
        }

        if self.reconciler.take_changed() {
            self.presentation.sync(self.reconciler.store(), now);
        }
        self.presentation.advance(dt.min(MAX_FRAME_DT), now);

        let live = self.presentation.live_ids();
        self.spotlight.tick(now, &live);

        self.frame += 1;
        self.snapshot(now)
    }

    fn snapshot(&self, now: Instant) -> FrameSnapshot {
        let spotlight = self.spotlight.current();
        let emphasis = self.spotlight.emphasis(now);
        let view = |actor: &Actor| ActorView {
            idea_id: actor.idea_id,
            position: actor.position,
            bob_phase: actor.bob.theta,
            bob_offset: actor.bob.offset(BOB_AMPLITUDE),
            entering_since: actor.created_at,
            exiting: actor.is_retiring(),
            emphasis: if spotlight == Some(actor.idea_id) {
                emphasis
            } else {
                1.0
            },
            layout: Arc::clone(actor.layout()),
        };

        let store = self.reconciler.store();
        let mut actors: Vec<ActorView> = store
            .snapshot_ordered()
            .filter_map(|idea| self.presentation.actor(idea.id))
            .map(view)
            .collect();
        actors.extend(
            self.presentation
                .actors()
                .filter(|a| !store.contains(a.idea_id))
                .map(view),
        );

        FrameSnapshot {
            frame: self.frame,
            at: now,
            header: self.reconciler.header().to_string(),
            idea_count: store.len(),
            actors,
            spotlight,
            connection: self.connection,
            fps: self.fps,
        }
    }
}
