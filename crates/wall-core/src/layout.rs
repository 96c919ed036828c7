//! Word-wrapped text layout, the expensive per-actor render artifact.
//!
//! Layout is cached on the actor under a [`RenderCacheKey`] derived from
//! the idea's text, author and wrap width. Ideas are immutable, so the key
//! only changes when the display is resized.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::idea::Idea;

/// Gap between wrapped body lines, px.
const LINE_GAP: f64 = 4.0;

/// Gap between the body and the author line, px.
const AUTHOR_GAP: f64 = 8.0;

/// Text metrics supplied by the renderer.
pub trait TextMeasure {
    fn width(&self, text: &str) -> f64;
    fn line_height(&self) -> f64;
}

/// Fixed advance per char. Good enough for terminal and headless renderers.
#[derive(Clone, Copy, Debug)]
pub struct MonospaceMeasure {
    pub glyph_width: f64,
    pub line_height: f64,
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        Self {
            glyph_width: 14.0,
            line_height: 34.0,
        }
    }
}

impl TextMeasure for MonospaceMeasure {
    fn width(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.glyph_width
    }

    fn line_height(&self) -> f64 {
        self.line_height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderCacheKey(u64);

impl RenderCacheKey {
    pub fn new(idea: &Idea, wrap_width: f64) -> Self {
        let mut hasher = DefaultHasher::new();
        idea.text.hash(&mut hasher);
        idea.author.hash(&mut hasher);
        wrap_width.round().to_bits().hash(&mut hasher);
        Self(hasher.finish())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<String>,
    /// `— author`, absent for anonymous ideas.
    pub author_line: Option<String>,
    pub width: f64,
    pub height: f64,
}

/// Greedy word wrap of the idea body plus an author line.
pub fn layout_idea(idea: &Idea, wrap_width: f64, measure: &impl TextMeasure) -> TextLayout {
    let lines = wrap_words(&idea.text, wrap_width, measure);
    let author_line = (!idea.author.is_empty()).then(|| format!("— {}", idea.author));

    let lh = measure.line_height();
    let body_w = lines
        .iter()
        .map(|l| measure.width(l))
        .fold(0.0_f64, f64::max);
    let author_w = author_line.as_deref().map_or(0.0, |a| measure.width(a));

    let mut height = lines.len() as f64 * lh + lines.len().saturating_sub(1) as f64 * LINE_GAP;
    if author_line.is_some() {
        height += AUTHOR_GAP + lh;
    }

    TextLayout {
        lines,
        author_line,
        width: body_w.max(author_w),
        height,
    }
}

fn wrap_words(text: &str, max_width: f64, measure: &impl TextMeasure) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure.width(&candidate) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
