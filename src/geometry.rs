//! Pixel-space points and rectangles.
//!
//! Rectangles are inclusive of both corners, matching the convention of the
//! container formats this crate reads: the rectangle (0,0)-(63,63) is a 64x64
//! block.

/// A point in pixel space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Point {
  pub x: i32,
  pub y: i32,
}

impl Point {
  pub const fn new(x: i32, y: i32) -> Self {
    Point { x, y }
  }
}

/// An axis-aligned rectangle in pixel space, inclusive of both corners.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rect {
  ul: Point,
  lr: Point,
}

impl Rect {
  /// A rectangle from its upper-left and lower-right corners.
  ///
  /// # Panics
  /// Panics if `lr` lies above or left of `ul`.
  pub fn new(ul: Point, lr: Point) -> Self {
    assert!(ul.x <= lr.x && ul.y <= lr.y, "degenerate rectangle {ul:?}..{lr:?}");
    Rect { ul, lr }
  }

  /// A `width` x `height` rectangle with its upper-left corner at `ul`.
  pub fn from_origin_size(ul: Point, width: u32, height: u32) -> Self {
    assert!(width > 0 && height > 0);
    Rect::new(ul, Point::new(ul.x + width as i32 - 1, ul.y + height as i32 - 1))
  }

  pub fn ul(&self) -> Point {
    self.ul
  }

  pub fn lr(&self) -> Point {
    self.lr
  }

  pub fn width(&self) -> u32 {
    (self.lr.x - self.ul.x + 1) as u32
  }

  pub fn height(&self) -> u32 {
    (self.lr.y - self.ul.y + 1) as u32
  }

  pub fn area(&self) -> u64 {
    u64::from(self.width()) * u64::from(self.height())
  }

  pub fn contains(&self, p: Point) -> bool {
    p.x >= self.ul.x && p.x <= self.lr.x && p.y >= self.ul.y && p.y <= self.lr.y
  }

  pub fn completely_within(&self, other: &Rect) -> bool {
    other.contains(self.ul) && other.contains(self.lr)
  }

  pub fn intersects(&self, other: &Rect) -> bool {
    self.ul.x <= other.lr.x
      && self.lr.x >= other.ul.x
      && self.ul.y <= other.lr.y
      && self.lr.y >= other.ul.y
  }

  /// The overlapping region of two rectangles, if any.
  pub fn clip_to(&self, other: &Rect) -> Option<Rect> {
    if !self.intersects(other) {
      return None;
    }
    Some(Rect::new(
      Point::new(self.ul.x.max(other.ul.x), self.ul.y.max(other.ul.y)),
      Point::new(self.lr.x.min(other.lr.x), self.lr.y.min(other.lr.y)),
    ))
  }

  /// Expands the rectangle outward so both corners land on a `bw` x `bh` grid.
  pub fn stretch_to_block_boundary(&self, bw: u32, bh: u32) -> Rect {
    let bw = bw as i32;
    let bh = bh as i32;
    let ul = Point::new(self.ul.x.div_euclid(bw) * bw, self.ul.y.div_euclid(bh) * bh);
    let lr = Point::new(
      (self.lr.x.div_euclid(bw) + 1) * bw - 1,
      (self.lr.y.div_euclid(bh) + 1) * bh - 1,
    );
    Rect::new(ul, lr)
  }
}
