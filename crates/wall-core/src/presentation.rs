//! Visual actors for live ideas.
//!
//! Actors are owned here and linked to ideas only by id. They are created
//! once when an idea first appears, survive any number of redundant data
//! updates untouched, and are dropped only after their idea has left the
//! store and the exit window has run out.

use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_4, PI};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::constants::{
    BOB_RATE, DRIFT_EASE, DRIFT_SEED_MULTIPLIER, DRIFT_SPEED, DRIFT_VARIANCE, EXIT_WINDOW,
    HEADING_JITTER, MARGIN_X, MARGIN_Y, MAX_TEXT_WIDTH_RATIO, MIN_ACTOR_SPACING,
    PLACEMENT_RETRIES,
};
use crate::geometry::{Bounds, Vec2};
use crate::idea::{Idea, IdeaId};
use crate::layout::{MonospaceMeasure, RenderCacheKey, TextLayout, TextMeasure, layout_idea};
use crate::phasor::BobPhase;
use crate::store::EntityStore;

#[derive(Clone, Debug)]
pub struct PresentationConfig {
    pub bounds: Bounds,
    pub exit_window: Duration,
    /// Angular bob rate, rad/s.
    pub bob_rate: f64,
    pub min_spacing: f64,
    pub placement_retries: usize,
}

impl PresentationConfig {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            bounds: Bounds {
                width,
                height,
                margin_x: MARGIN_X,
                margin_y: MARGIN_Y,
            },
            exit_window: EXIT_WINDOW,
            bob_rate: BOB_RATE,
            min_spacing: MIN_ACTOR_SPACING,
            placement_retries: PLACEMENT_RETRIES,
        }
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

#[derive(Debug)]
pub struct Actor {
    pub idea_id: IdeaId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub bob: BobPhase,
    pub created_at: Instant,
    retiring_since: Option<Instant>,
    heading: f64,
    cruise_speed: f64,
    /// Seeded from the idea id so each idea drifts the same way every run.
    motion: SmallRng,
    cache_key: RenderCacheKey,
    layout: Arc<TextLayout>,
    layout_builds: u32,
}

impl Actor {
    fn spawn(
        idea: &Idea,
        position: Vec2,
        now: Instant,
        wrap_width: f64,
        measure: &impl TextMeasure,
    ) -> Self {
        let mut motion = SmallRng::seed_from_u64(idea.id.0.wrapping_mul(DRIFT_SEED_MULTIPLIER));
        let heading = motion.random_range(-FRAC_PI_4..=FRAC_PI_4);
        let cruise_speed =
            DRIFT_SPEED * (1.0 + motion.random_range(-DRIFT_VARIANCE..=DRIFT_VARIANCE));

        Self {
            idea_id: idea.id,
            position,
            velocity: Vec2::ZERO,
            bob: BobPhase::default(),
            created_at: now,
            retiring_since: None,
            heading,
            cruise_speed,
            motion,
            cache_key: RenderCacheKey::new(idea, wrap_width),
            layout: Arc::new(layout_idea(idea, wrap_width, measure)),
            layout_builds: 1,
        }
    }

    pub fn is_retiring(&self) -> bool {
        self.retiring_since.is_some()
    }

    pub fn retiring_since(&self) -> Option<Instant> {
        self.retiring_since
    }

    pub fn layout(&self) -> &Arc<TextLayout> {
        &self.layout
    }

    pub fn cache_key(&self) -> RenderCacheKey {
        self.cache_key
    }

    /// How many times the layout artifact has been computed for this actor.
    pub fn layout_builds(&self) -> u32 {
        self.layout_builds
    }

    /// Recompute the layout only if the cache key moved.
    fn refresh_layout(&mut self, idea: &Idea, wrap_width: f64, measure: &impl TextMeasure) -> bool {
        let key = RenderCacheKey::new(idea, wrap_width);
        if key == self.cache_key {
            return false;
        }
        self.layout = Arc::new(layout_idea(idea, wrap_width, measure));
        self.cache_key = key;
        self.layout_builds += 1;
        true
    }

    fn step(&mut self, dt: f64, bounds: &Bounds, bob_rate: f64) {
        self.bob = self.bob.advance(bob_rate, dt);
        if dt <= 0.0 {
            return;
        }

        // Random walk on the heading, velocity eased toward the cruise vector.
        self.heading += self.motion.random_range(-1.0..=1.0) * HEADING_JITTER * dt.sqrt();
        let target = Vec2::from_angle(self.heading) * self.cruise_speed;
        let blend = (DRIFT_EASE * dt).min(1.0);
        self.velocity += (target - self.velocity) * blend;
        self.position += self.velocity * dt;
        self.reflect(bounds);
    }

    /// Soft edge handling: clamp inside the margins and turn the velocity
    /// (and heading) back inward.
    fn reflect(&mut self, bounds: &Bounds) {
        let (x0, x1) = bounds.x_range();
        let (y0, y1) = bounds.y_range();

        if self.position.x < x0 {
            self.position.x = x0;
            self.velocity.x = self.velocity.x.abs();
            if self.heading.cos() < 0.0 {
                self.heading = PI - self.heading;
            }
        } else if self.position.x > x1 {
            self.position.x = x1;
            self.velocity.x = -self.velocity.x.abs();
            if self.heading.cos() > 0.0 {
                self.heading = PI - self.heading;
            }
        }

        if self.position.y < y0 {
            self.position.y = y0;
            self.velocity.y = self.velocity.y.abs();
            if self.heading.sin() < 0.0 {
                self.heading = -self.heading;
            }
        } else if self.position.y > y1 {
            self.position.y = y1;
            self.velocity.y = -self.velocity.y.abs();
            if self.heading.sin() > 0.0 {
                self.heading = -self.heading;
            }
        }
    }
}

/// What a [`PresentationState::sync`] pass changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<IdeaId>,
    pub retiring: Vec<IdeaId>,
    /// Retiring actors whose idea came back before the exit window ended.
    pub revived: Vec<IdeaId>,
}

pub struct PresentationState<M = MonospaceMeasure> {
    actors: BTreeMap<IdeaId, Actor>,
    config: PresentationConfig,
    measure: M,
    placement: SmallRng,
}

impl<M: TextMeasure> PresentationState<M> {
    pub fn new(config: PresentationConfig, measure: M, placement: SmallRng) -> Self {
        Self {
            actors: BTreeMap::new(),
            config,
            measure,
            placement,
        }
    }

    pub fn config(&self) -> &PresentationConfig {
        &self.config
    }

    pub fn wrap_width(&self) -> f64 {
        self.config.bounds.width * MAX_TEXT_WIDTH_RATIO
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn actor(&self, id: IdeaId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// All actors, retiring ones included, by ascending id.
    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    /// Ids of actors that are not retiring, ascending.
    pub fn live_ids(&self) -> Vec<IdeaId> {
        self.actors
            .values()
            .filter(|a| !a.is_retiring())
            .map(|a| a.idea_id)
            .collect()
    }

    /// Diff actors against the store: spawn for new ids, start retirement
    /// for ids that left, revive retiring actors whose id returned.
    pub fn sync(&mut self, store: &EntityStore, now: Instant) -> SyncReport {
        let mut report = SyncReport::default();
        let wrap_width = self.wrap_width();

        for idea in store.snapshot_ordered() {
            match self.actors.get_mut(&idea.id) {
                Some(actor) => {
                    if actor.retiring_since.take().is_some() {
                        // The returning idea may carry different text.
                        actor.refresh_layout(idea, wrap_width, &self.measure);
                        report.revived.push(idea.id);
                    }
                }
                None => {
                    let position = self.place();
                    let actor = Actor::spawn(idea, position, now, wrap_width, &self.measure);
                    self.actors.insert(idea.id, actor);
                    report.created.push(idea.id);
                }
            }
        }

        for (id, actor) in self.actors.iter_mut() {
            if actor.retiring_since.is_none() && !store.contains(*id) {
                actor.retiring_since = Some(now);
                report.retiring.push(*id);
            }
        }

        report
    }

    /// Advance every actor by `dt` seconds and drop those whose exit
    /// window has elapsed. Returns the dropped ids.
    pub fn advance(&mut self, dt: f64, now: Instant) -> Vec<IdeaId> {
        let bounds = self.config.bounds;
        let rate = self.config.bob_rate;
        for actor in self.actors.values_mut() {
            actor.step(dt, &bounds, rate);
        }

        let exit = self.config.exit_window;
        let retired: Vec<IdeaId> = self
            .actors
            .values()
            .filter(|a| {
                a.retiring_since
                    .is_some_and(|t| now.saturating_duration_since(t) >= exit)
            })
            .map(|a| a.idea_id)
            .collect();
        for id in &retired {
            self.actors.remove(id);
        }
        retired
    }

    /// Adopt new display dimensions: pull actors back inside and re-key
    /// layouts for the new wrap width. Returns how many layouts were rebuilt.
    pub fn resize(&mut self, width: f64, height: f64, store: &EntityStore) -> usize {
        self.config.bounds.width = width;
        self.config.bounds.height = height;
        let bounds = self.config.bounds;
        let wrap_width = self.wrap_width();

        let mut rebuilt = 0;
        for actor in self.actors.values_mut() {
            actor.position = bounds.clamp(actor.position);
            if let Some(idea) = store.get(actor.idea_id)
                && actor.refresh_layout(idea, wrap_width, &self.measure)
            {
                rebuilt += 1;
            }
        }
        rebuilt
    }

    /// Rejection-sample a spawn point clear of existing actors; after the
    /// retry cap, settle for the candidate with the most clearance.
    fn place(&mut self) -> Vec2 {
        let (x0, x1) = self.config.bounds.x_range();
        let (y0, y1) = self.config.bounds.y_range();

        let mut best: Option<(f64, Vec2)> = None;
        for _ in 0..=self.config.placement_retries {
            let candidate = Vec2::new(
                sample(&mut self.placement, x0, x1),
                sample(&mut self.placement, y0, y1),
            );
            let clearance = self
                .actors
                .values()
                .map(|a| a.position.distance(candidate))
                .fold(f64::INFINITY, f64::min);
            if clearance >= self.config.min_spacing {
                return candidate;
            }
            if best.is_none_or(|(c, _)| clearance > c) {
                best = Some((clearance, candidate));
            }
        }
        best.map_or(Vec2::new(x0, y0), |(_, p)| p)
    }
}

fn sample(rng: &mut SmallRng, lo: f64, hi: f64) -> f64 {
    if hi > lo { rng.random_range(lo..=hi) } else { lo }
}
