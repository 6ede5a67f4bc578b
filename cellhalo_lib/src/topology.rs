//! Helper types for the cartesian neighbor topology of cells and processes
//!
//! Every cell (and every process in the process grid) has 26 neighbors, one for each offset vector
//! `(α,β,γ) ∈ {-1,0,1}³ \ {0}`. The [`NeighborDirection`] type addresses these neighbors by a stable
//! index in `0..26`. Half of the directions (13) are *canonical*: walking only the canonical
//! directions from every cell visits every unordered pair of adjacent cells exactly once.

use bitflags::bitflags;

/// Direction on a number line/coordinate axis
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
    Negative = 0,
    Positive = 1,
}

/// Abbreviated type alias for cartesian coordinate axes in 3D
pub type Axis = CartesianAxis3d;

/// The cartesian coordinate axes in 3D
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum CartesianAxis3d {
    /// The x-axis
    X = 0,
    /// The y-axis
    Y = 1,
    /// The z-axis
    Z = 2,
}

/// Identifies a direction along a specific cartesian axis, e.g. the outward normal of a subdomain face
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DirectedAxis {
    pub axis: Axis,
    pub direction: Direction,
}

bitflags! {
    /// Set of cartesian axes, used e.g. to mark the axes along which a subdomain borders other processes
    #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
    pub struct AxisFlags: u8 {
        const X = 0b001;
        const Y = 0b010;
        const Z = 0b100;
    }
}

/// One of the 26 offsets `(α,β,γ) ∈ {-1,0,1}³ \ {0}` from a cell (or process) to one of its neighbors
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NeighborDirection {
    offset: [i8; 3],
}

impl Direction {
    /// Returns a reference to an array containing all possible directions
    /// ```
    /// use cellhalo_lib::topology::Direction;
    /// assert_eq!(Direction::all_possible().len(), 2);
    /// ```
    pub const fn all_possible() -> &'static [Direction; 2] {
        &ALL_DIRECTIONS
    }

    /// Returns the opposite direction
    pub const fn opposite(&self) -> Self {
        match self {
            Direction::Positive => Direction::Negative,
            Direction::Negative => Direction::Positive,
        }
    }

    /// Returns the sign of the direction as a unit offset
    /// ```
    /// use cellhalo_lib::topology::Direction;
    /// assert_eq!(Direction::Positive.sign(), 1);
    /// assert_eq!(Direction::Negative.sign(), -1);
    /// ```
    #[inline(always)]
    pub const fn sign(&self) -> i8 {
        match self {
            Direction::Positive => 1,
            Direction::Negative => -1,
        }
    }

    /// Returns whether the direction is positive
    #[inline(always)]
    pub const fn is_positive(&self) -> bool {
        matches!(self, Direction::Positive)
    }
}

const ALL_DIRECTIONS: [Direction; 2] = [Direction::Negative, Direction::Positive];

impl CartesianAxis3d {
    /// Returns a reference to an array containing all 3D cartesian axes
    /// ```
    /// use cellhalo_lib::topology::Axis;
    /// assert_eq!(Axis::all_possible()[0], Axis::X);
    /// assert_eq!(Axis::all_possible()[2], Axis::Z);
    /// ```
    #[inline(always)]
    pub const fn all_possible() -> &'static [Axis; 3] {
        &ALL_AXES
    }

    /// Converts the cartesian axis into the corresponding 3D dimension index (X=0, Y=1, Z=2)
    #[inline(always)]
    pub const fn dim(self) -> usize {
        self as usize
    }

    /// Returns the other two axes that are orthogonal to the current axis
    /// ```
    /// use cellhalo_lib::topology::Axis;
    /// assert_eq!(Axis::X.orthogonal_axes(), [Axis::Y, Axis::Z]);
    /// ```
    #[inline(always)]
    pub const fn orthogonal_axes(&self) -> [Self; 2] {
        ORTHOGONAL_AXES[self.dim()]
    }

    /// Returns the flag corresponding to this axis
    #[inline(always)]
    pub const fn flag(self) -> AxisFlags {
        match self {
            Axis::X => AxisFlags::X,
            Axis::Y => AxisFlags::Y,
            Axis::Z => AxisFlags::Z,
        }
    }

    /// Combines this coordinate axis with a direction into a DirectedAxis
    #[inline(always)]
    pub const fn with_direction(self, direction: Direction) -> DirectedAxis {
        DirectedAxis::new(self, direction)
    }
}

const ALL_AXES: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

const ORTHOGONAL_AXES: [[Axis; 2]; 3] = [[Axis::Y, Axis::Z], [Axis::Z, Axis::X], [Axis::X, Axis::Y]];

impl DirectedAxis {
    /// Returns a reference to an array of all possible directed axes in 3D (the six face normals)
    #[inline(always)]
    pub const fn all_possible() -> &'static [DirectedAxis; 6] {
        &ALL_DIRECTED_AXES
    }

    /// Constructs a new directed axis
    #[inline(always)]
    pub const fn new(axis: Axis, direction: Direction) -> Self {
        Self { axis, direction }
    }

    /// Returns a directed axis with the opposite direction
    #[inline(always)]
    pub const fn opposite(&self) -> Self {
        Self::new(self.axis, self.direction.opposite())
    }

    /// Returns the unit offset vector of this directed axis
    /// ```
    /// use cellhalo_lib::topology::{Axis, Direction, DirectedAxis};
    /// assert_eq!(DirectedAxis::new(Axis::Y, Direction::Negative).offset(), [0, -1, 0]);
    /// ```
    #[inline(always)]
    pub const fn offset(&self) -> [i8; 3] {
        let mut offset = [0; 3];
        offset[self.axis.dim()] = self.direction.sign();
        offset
    }

    /// Returns the neighbor direction pointing along this directed axis
    #[inline(always)]
    pub const fn neighbor_direction(&self) -> NeighborDirection {
        NeighborDirection {
            offset: self.offset(),
        }
    }
}

const ALL_DIRECTED_AXES: [DirectedAxis; 6] = [
    DirectedAxis::new(Axis::X, Direction::Negative),
    DirectedAxis::new(Axis::Y, Direction::Negative),
    DirectedAxis::new(Axis::Z, Direction::Negative),
    DirectedAxis::new(Axis::X, Direction::Positive),
    DirectedAxis::new(Axis::Y, Direction::Positive),
    DirectedAxis::new(Axis::Z, Direction::Positive),
];

/// Index of the zero offset in the flattened `3x3x3` offset cube, it has no corresponding direction
const CENTER_FLAT_INDEX: usize = 13;

impl NeighborDirection {
    /// Total number of neighbor directions
    pub const COUNT: usize = 26;
    /// Number of canonical neighbor directions
    pub const CANONICAL_COUNT: usize = 13;

    /// Constructs a direction from an offset vector, returns `None` for the zero vector or components outside of `{-1,0,1}`
    /// ```
    /// use cellhalo_lib::topology::NeighborDirection;
    /// assert!(NeighborDirection::new([1, 0, -1]).is_some());
    /// assert!(NeighborDirection::new([0, 0, 0]).is_none());
    /// assert!(NeighborDirection::new([2, 0, 0]).is_none());
    /// ```
    pub const fn new(offset: [i8; 3]) -> Option<Self> {
        let in_range = offset[0] >= -1
            && offset[0] <= 1
            && offset[1] >= -1
            && offset[1] <= 1
            && offset[2] >= -1
            && offset[2] <= 1;
        let is_zero = offset[0] == 0 && offset[1] == 0 && offset[2] == 0;
        if in_range && !is_zero {
            Some(Self { offset })
        } else {
            None
        }
    }

    /// Returns a reference to an array of all 26 directions, ordered by their [`index`](Self::index)
    #[inline(always)]
    pub const fn all() -> &'static [NeighborDirection; 26] {
        &ALL_NEIGHBOR_DIRECTIONS
    }

    /// Returns a reference to an array of the 13 canonical directions (the "force loop" directions)
    #[inline(always)]
    pub const fn canonical() -> &'static [NeighborDirection; 13] {
        &CANONICAL_NEIGHBOR_DIRECTIONS
    }

    /// Converts an index in the range `0..26` to the corresponding direction, panics if the index is out of range
    #[inline(always)]
    pub const fn from_index(index: usize) -> Self {
        ALL_NEIGHBOR_DIRECTIONS[index]
    }

    /// Returns the unique index of this direction in the range `0..26`
    /// ```
    /// use cellhalo_lib::topology::NeighborDirection;
    /// for (i, dir) in NeighborDirection::all().iter().enumerate() {
    ///     assert_eq!(dir.index(), i);
    /// }
    /// ```
    #[inline(always)]
    pub const fn index(&self) -> usize {
        let flat = ((self.offset[0] + 1) as usize) * 9
            + ((self.offset[1] + 1) as usize) * 3
            + ((self.offset[2] + 1) as usize);
        if flat > CENTER_FLAT_INDEX {
            flat - 1
        } else {
            flat
        }
    }

    /// Returns the offset vector `(α,β,γ)`
    #[inline(always)]
    pub const fn offset(&self) -> [i8; 3] {
        self.offset
    }

    /// Returns the offset component along the given axis
    #[inline(always)]
    pub const fn component(&self, axis: Axis) -> i8 {
        self.offset[axis.dim()]
    }

    /// Returns the direction pointing the opposite way
    #[inline(always)]
    pub const fn opposite(&self) -> Self {
        Self {
            offset: [-self.offset[0], -self.offset[1], -self.offset[2]],
        }
    }

    /// Returns the number of nonzero offset components (1: face, 2: edge, 3: corner neighbor)
    #[inline(always)]
    pub const fn num_nonzero(&self) -> usize {
        (self.offset[0] != 0) as usize + (self.offset[1] != 0) as usize + (self.offset[2] != 0) as usize
    }

    /// Returns the set of axes with a nonzero offset component
    pub fn support(&self) -> AxisFlags {
        Axis::all_possible()
            .iter()
            .filter(|axis| self.component(**axis) != 0)
            .fold(AxisFlags::empty(), |flags, axis| flags | axis.flag())
    }

    /// Returns the offset restricted to the given axes, `None` if no component remains
    /// ```
    /// use cellhalo_lib::topology::{AxisFlags, NeighborDirection};
    /// let d = NeighborDirection::new([1, -1, 1]).unwrap();
    /// assert_eq!(d.restricted_to(AxisFlags::X | AxisFlags::Z), NeighborDirection::new([1, 0, 1]));
    /// assert_eq!(d.restricted_to(AxisFlags::empty()), None);
    /// ```
    pub fn restricted_to(&self, axes: AxisFlags) -> Option<Self> {
        let mut offset = self.offset;
        for axis in Axis::all_possible() {
            if !axes.contains(axis.flag()) {
                offset[axis.dim()] = 0;
            }
        }
        Self::new(offset)
    }

    /// Returns whether this direction belongs to the canonical half-space
    ///
    /// A direction `(α,β,γ)` is canonical iff `γ = 1`, or `γ = 0` and (`α = 1`, or `α = 0` and `β = 1`).
    /// Exactly one direction of every pair `(d, -d)` is canonical.
    /// ```
    /// use cellhalo_lib::topology::NeighborDirection;
    /// assert!(NeighborDirection::new([-1, -1, 1]).unwrap().is_canonical());
    /// assert!(NeighborDirection::new([1, -1, 0]).unwrap().is_canonical());
    /// assert!(NeighborDirection::new([0, 1, 0]).unwrap().is_canonical());
    /// assert!(!NeighborDirection::new([0, -1, 0]).unwrap().is_canonical());
    /// assert!(!NeighborDirection::new([1, 1, -1]).unwrap().is_canonical());
    /// ```
    #[inline(always)]
    pub const fn is_canonical(&self) -> bool {
        let [alpha, beta, gamma] = self.offset;
        gamma == 1 || (gamma == 0 && (alpha == 1 || (alpha == 0 && beta == 1)))
    }

    /// Applies this offset to a signed cell coordinate triplet
    #[inline(always)]
    pub fn apply(&self, ijk: [i64; 3]) -> [i64; 3] {
        [
            ijk[0] + self.offset[0] as i64,
            ijk[1] + self.offset[1] as i64,
            ijk[2] + self.offset[2] as i64,
        ]
    }
}

const ALL_NEIGHBOR_DIRECTIONS: [NeighborDirection; 26] = {
    let mut dirs = [NeighborDirection { offset: [0; 3] }; 26];
    let mut flat = 0;
    while flat < 27 {
        if flat != CENTER_FLAT_INDEX {
            let index = if flat > CENTER_FLAT_INDEX { flat - 1 } else { flat };
            dirs[index] = NeighborDirection {
                offset: [
                    (flat / 9) as i8 - 1,
                    ((flat / 3) % 3) as i8 - 1,
                    (flat % 3) as i8 - 1,
                ],
            };
        }
        flat += 1;
    }
    dirs
};

const CANONICAL_NEIGHBOR_DIRECTIONS: [NeighborDirection; 13] = {
    let mut dirs = [NeighborDirection { offset: [0; 3] }; 13];
    let mut count = 0;
    let mut i = 0;
    while i < 26 {
        if ALL_NEIGHBOR_DIRECTIONS[i].is_canonical() {
            dirs[count] = ALL_NEIGHBOR_DIRECTIONS[i];
            count += 1;
        }
        i += 1;
    }
    dirs
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_index_consistency() {
        for i in 0..NeighborDirection::COUNT {
            assert_eq!(NeighborDirection::from_index(i).index(), i);
        }
    }

    #[test]
    fn test_canonical_half_space() {
        let canonical = NeighborDirection::all()
            .iter()
            .filter(|d| d.is_canonical())
            .count();
        assert_eq!(canonical, NeighborDirection::CANONICAL_COUNT);

        for d in NeighborDirection::all() {
            assert_ne!(
                d.is_canonical(),
                d.opposite().is_canonical(),
                "exactly one of {:?} and its opposite has to be canonical",
                d
            );
        }

        for d in NeighborDirection::canonical() {
            assert!(d.is_canonical());
        }
    }

    #[test]
    fn test_canonical_set_is_exact() {
        let mut expected = vec![
            [-1, -1, 1],
            [-1, 0, 1],
            [-1, 1, 1],
            [0, -1, 1],
            [0, 0, 1],
            [0, 1, 1],
            [1, -1, 1],
            [1, 0, 1],
            [1, 1, 1],
            [1, -1, 0],
            [1, 0, 0],
            [1, 1, 0],
            [0, 1, 0],
        ];
        let mut actual: Vec<_> = NeighborDirection::canonical()
            .iter()
            .map(|d| d.offset())
            .collect();
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_directed_axis_offsets() {
        for axis in DirectedAxis::all_possible() {
            let dir = axis.neighbor_direction();
            assert_eq!(dir.num_nonzero(), 1);
            assert_eq!(dir.component(axis.axis), axis.direction.sign());
            assert_eq!(axis.opposite().neighbor_direction(), dir.opposite());
        }
    }

    #[test]
    fn test_support_and_kind() {
        let corner = NeighborDirection::new([1, 1, -1]).unwrap();
        assert_eq!(corner.num_nonzero(), 3);
        assert_eq!(corner.support(), AxisFlags::all());

        let edge = NeighborDirection::new([0, -1, 1]).unwrap();
        assert_eq!(edge.support(), AxisFlags::Y | AxisFlags::Z);
        assert_eq!(
            edge.restricted_to(AxisFlags::Y),
            NeighborDirection::new([0, -1, 0])
        );
    }
}
