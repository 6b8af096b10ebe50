/// Fraction of the parent extent covered by each half produced by [`Envelope::split`].
///
/// The halves overlap in the middle so that records straddling the split line
/// can still descend into a child node.
pub const SPLIT_RATIO: f64 = 0.55;

/// A 2D envelope represented by its minimum and maximum coordinates.
///
/// `Envelope` is the only geometry the index knows about: every node stores
/// one, every record is inserted with one, and every query is expressed as one.
/// It is persisted as four `f64` values in `min_x, min_y, max_x, max_y` order.
///
/// # Examples
///
/// ```rust
/// use qix_index::Envelope;
///
/// let area = Envelope::new(0.0, 0.0, 100.0, 100.0);
/// assert!(area.contains_point(50.0, 50.0));
/// assert!(area.intersects(&Envelope::new(100.0, 100.0, 120.0, 120.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Envelope({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl Envelope {
    /// Creates a new envelope from its corners.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An inverted envelope that any [`expand`](Self::expand) call replaces.
    pub fn empty() -> Envelope {
        Envelope {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// True when all four coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Checks if this envelope contains a point (boundary included).
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Checks if `other` lies completely inside this envelope (boundary included).
    pub fn contains(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Checks if the two envelopes share at least one point. Touching edges count.
    pub fn intersects(&self, other: &Envelope) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }

    /// Returns the smallest envelope covering both.
    pub fn merge(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grows this envelope in place to cover `other`.
    pub fn expand(&mut self, other: &Envelope) {
        *self = self.merge(other);
    }

    /// Splits along the longer axis into two overlapping halves.
    ///
    /// Each half spans [`SPLIT_RATIO`] of the extent, anchored at opposite ends.
    pub fn split(&self) -> (Envelope, Envelope) {
        if self.width() > self.height() {
            let range = self.width() * SPLIT_RATIO;
            (
                Envelope::new(self.min_x, self.min_y, self.min_x + range, self.max_y),
                Envelope::new(self.max_x - range, self.min_y, self.max_x, self.max_y),
            )
        } else {
            let range = self.height() * SPLIT_RATIO;
            (
                Envelope::new(self.min_x, self.min_y, self.max_x, self.min_y + range),
                Envelope::new(self.min_x, self.max_y - range, self.max_x, self.max_y),
            )
        }
    }

    /// Four quadrants obtained by splitting each half of [`split`](Self::split) again.
    pub fn quadrants(&self) -> [Envelope; 4] {
        let (half1, half2) = self.split();
        let (quad1, quad2) = half1.split();
        let (quad3, quad4) = half2.split();
        [quad1, quad2, quad3, quad4]
    }
}
