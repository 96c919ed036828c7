use std::ops::{Add, AddAssign, Mul, Sub};

/// 2D vector in display pixels. +y points down.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector at `angle` radians.
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Display area with keep-out margins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
    pub margin_x: f64,
    pub margin_y: f64,
}

impl Bounds {
    /// Usable horizontal range. Collapses to the centre line when the
    /// margins do not fit.
    pub fn x_range(&self) -> (f64, f64) {
        axis_range(self.width, self.margin_x)
    }

    pub fn y_range(&self) -> (f64, f64) {
        axis_range(self.height, self.margin_y)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        let (x0, x1) = self.x_range();
        let (y0, y1) = self.y_range();
        p.x >= x0 && p.x <= x1 && p.y >= y0 && p.y <= y1
    }

    pub fn clamp(&self, p: Vec2) -> Vec2 {
        let (x0, x1) = self.x_range();
        let (y0, y1) = self.y_range();
        Vec2::new(p.x.clamp(x0, x1), p.y.clamp(y0, y1))
    }
}

fn axis_range(extent: f64, margin: f64) -> (f64, f64) {
    if extent - 2.0 * margin <= 0.0 {
        let mid = (extent / 2.0).max(0.0);
        (mid, mid)
    } else {
        (margin, extent - margin)
    }
}
