//! Terminal renderer: one JSON object per emitted frame.

use std::io::Write;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wall_core::{ActorView, FrameSnapshot, Renderer};

pub struct JsonLinesRenderer<W: Write> {
    out: W,
    emit_every: u64,
    emitted: u64,
    /// Fired when the output goes away (e.g. a closed pipe).
    on_broken: CancellationToken,
    broken: bool,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(out: W, emit_every: u64, on_broken: CancellationToken) -> Self {
        Self {
            out,
            emit_every: emit_every.max(1),
            emitted: 0,
            on_broken,
            broken: false,
        }
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn write_line(&mut self, line: &Value) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> Renderer for JsonLinesRenderer<W> {
    fn present(&mut self, snapshot: &FrameSnapshot) {
        if self.broken || snapshot.frame % self.emit_every != 0 {
            return;
        }
        let line = snapshot_json(snapshot);
        match self.write_line(&line) {
            Ok(()) => self.emitted += 1,
            Err(e) => {
                tracing::warn!("output closed, stopping: {e}");
                self.broken = true;
                self.on_broken.cancel();
            }
        }
    }
}

pub fn snapshot_json(snapshot: &FrameSnapshot) -> Value {
    let actors: Vec<Value> = snapshot
        .actors
        .iter()
        .map(|a| actor_json(a, snapshot))
        .collect();
    json!({
        "frame": snapshot.frame,
        "header": snapshot.header,
        "idea_count": snapshot.idea_count,
        "connection": snapshot.connection.to_string(),
        "fps": round2(snapshot.fps),
        "spotlight": snapshot.spotlight.map(|id| id.0),
        "actors": actors,
    })
}

fn actor_json(actor: &ActorView, snapshot: &FrameSnapshot) -> Value {
    let age = snapshot.at.saturating_duration_since(actor.entering_since);
    json!({
        "id": actor.idea_id.0,
        "x": round2(actor.position.x),
        "y": round2(actor.position.y + actor.bob_offset),
        "bob_phase": round2(actor.bob_phase),
        "age_ms": age.as_millis() as u64,
        "exiting": actor.exiting,
        "emphasis": round2(actor.emphasis),
        "lines": actor.layout.lines,
        "author": actor.layout.author_line,
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use wall_core::{FrameDriver, Idea, IdeaId, Timestamp, Update};
    use wall_sync::{WallConfig, build_driver};

    fn driver() -> FrameDriver {
        build_driver(&WallConfig::default(), Some(1))
    }

    #[test]
    fn test_emits_every_nth_frame() {
        let mut out = Vec::new();
        let mut renderer = JsonLinesRenderer::new(&mut out, 2, CancellationToken::new());
        let mut d = driver();
        let start = Instant::now();
        for i in 0..6u32 {
            renderer.present(&d.tick(start + Duration::from_millis(16) * i));
        }
        assert_eq!(renderer.emitted(), 3);
        let text = String::from_utf8(out).unwrap();
        let frames: Vec<u64> = text
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["frame"].as_u64().unwrap())
            .collect();
        assert_eq!(frames, vec![2, 4, 6]);
    }

    #[test]
    fn test_actor_fields() {
        let mut d = driver();
        d.apply(Update::IdeaAdded(
            Idea::new(IdeaId(4), "Ada", "Reduce meetings", Timestamp::from_unix_secs(0)).unwrap(),
        ));
        let snap = d.tick(Instant::now());
        let line = snapshot_json(&snap);
        assert_eq!(line["idea_count"], 1);
        assert_eq!(line["spotlight"], 4);
        assert_eq!(line["connection"], "disconnected");
        let actor = &line["actors"][0];
        assert_eq!(actor["id"], 4);
        assert_eq!(actor["lines"][0], "Reduce meetings");
        assert_eq!(actor["author"], "— Ada");
        assert_eq!(actor["exiting"], false);
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_broken_output_cancels() {
        let cancel = CancellationToken::new();
        let mut renderer = JsonLinesRenderer::new(Closed, 1, cancel.clone());
        renderer.present(&driver().tick(Instant::now()));
        assert!(cancel.is_cancelled());
        assert_eq!(renderer.emitted(), 0);
    }
}
