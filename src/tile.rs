use array_init::array_init;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{Display, EnumCount as EnumCountMacro, EnumIter};

/// One of the four cardinal connection points (ports) of a tile.
///
/// The declaration order (N, E, S, W) is also the fixed scan order used
/// everywhere a tie-break between directions is needed.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// The direction pointing the opposite way.
    ///
    /// # Example
    /// ```
    /// use streetcar::tile::Direction;
    ///
    /// assert_eq!(Direction::North.opposite(), Direction::South);
    /// assert_eq!(Direction::West.opposite(), Direction::East);
    /// ```
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Rotates the direction clockwise by the given orientation
    /// (N→E→S→W per quarter turn).
    #[inline]
    pub fn rotated(self, orientation: Orientation) -> Self {
        const RING: [Direction; 4] = [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ];
        RING[(self as usize + orientation.quarter_turns()) % 4]
    }

    /// Row/column delta of one step in this direction.
    #[inline]
    pub fn delta(self) -> (i8, i8) {
        match self {
            Direction::North => (-1, 0),
            Direction::East => (0, 1),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
        }
    }
}

/// The rotation applied to a tile when it is laid on the board.
///
/// # JSON
/// Orientations are serialized as their angle in degrees.
#[derive(
    Clone, Copy, Debug, Deserialize_repr, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize_repr,
)]
#[repr(u16)]
pub enum Orientation {
    Deg0 = 0,
    Deg90 = 90,
    Deg180 = 180,
    Deg270 = 270,
}

impl Orientation {
    /// How many quarter turns this orientation applies to a port.
    #[inline]
    pub fn quarter_turns(self) -> usize {
        self as usize / 90
    }

    #[inline]
    fn index(self) -> usize {
        self.quarter_turns()
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}°", *self as u16)
    }
}

/// All the different track tile variants in the game.
///
/// The `Tree*` variants depict a tree next to the track, which makes them
/// permanent: they can never be exchanged once laid.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumCountMacro,
    EnumIter,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum TileKind {
    Straight,
    Curve,
    StraightLeftCurve,
    StraightRightCurve,
    DoubleCurveY,
    DiagonalCurve,
    TreeJunctionTop,
    TreeJunctionRight,
    TreeRoundabout,
    TreeCrossroad,
    TreeStraightDiagonal1,
    TreeStraightDiagonal2,
}

impl TileKind {
    /// The port pairs realized by this kind before any rotation.
    pub fn base_connections(self) -> ConnectionSet {
        use Direction::*;
        match self {
            TileKind::Straight => ConnectionSet::from_pairs(&[(North, South)]),
            TileKind::Curve => ConnectionSet::from_pairs(&[(North, East)]),
            TileKind::StraightLeftCurve => {
                ConnectionSet::from_pairs(&[(North, South), (South, West)])
            }
            TileKind::StraightRightCurve => {
                ConnectionSet::from_pairs(&[(North, South), (South, East)])
            }
            TileKind::DoubleCurveY => ConnectionSet::from_pairs(&[(North, West), (North, East)]),
            TileKind::DiagonalCurve => ConnectionSet::from_pairs(&[(South, West), (North, East)]),
            TileKind::TreeJunctionTop => {
                ConnectionSet::from_pairs(&[(East, West), (West, North), (North, East)])
            }
            TileKind::TreeJunctionRight => {
                ConnectionSet::from_pairs(&[(East, West), (North, East), (South, East)])
            }
            TileKind::TreeRoundabout => ConnectionSet::from_pairs(&[
                (West, North),
                (North, East),
                (East, South),
                (South, West),
            ]),
            TileKind::TreeCrossroad => ConnectionSet::from_pairs(&[(North, South), (East, West)]),
            TileKind::TreeStraightDiagonal1 => {
                ConnectionSet::from_pairs(&[(North, South), (South, West), (North, East)])
            }
            TileKind::TreeStraightDiagonal2 => {
                ConnectionSet::from_pairs(&[(North, South), (North, West), (South, East)])
            }
        }
    }

    /// Whether a laid tile of this kind may later be exchanged.
    #[inline]
    pub fn is_swappable(self) -> bool {
        !matches!(
            self,
            TileKind::TreeJunctionTop
                | TileKind::TreeJunctionRight
                | TileKind::TreeRoundabout
                | TileKind::TreeCrossroad
                | TileKind::TreeStraightDiagonal1
                | TileKind::TreeStraightDiagonal2
        )
    }
}

// Bit layout of `ConnectionSet`, one bit per unordered port pair.
const PAIR_TABLE: [(Direction, Direction); 6] = [
    (Direction::North, Direction::East),
    (Direction::North, Direction::South),
    (Direction::North, Direction::West),
    (Direction::East, Direction::South),
    (Direction::East, Direction::West),
    (Direction::South, Direction::West),
];

// For each direction, the mask of all pairs touching it.
const PORT_MASKS: [u8; 4] = [
    0b00_0111, // North: N-E | N-S | N-W
    0b01_1001, // East:  N-E | E-S | E-W
    0b10_1010, // South: N-S | E-S | S-W
    0b11_0100, // West:  N-W | E-W | S-W
];

/// The set of unordered port pairs a tile realizes.
///
/// There are only six possible pairs of distinct cardinal ports, so the set
/// is a 6-bit mask and every query is a mask operation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ConnectionSet(u8);

impl ConnectionSet {
    pub const EMPTY: ConnectionSet = ConnectionSet(0);

    fn pair_bit(a: Direction, b: Direction) -> u8 {
        let (lo, hi) = if (a as u8) <= (b as u8) { (a, b) } else { (b, a) };
        match (lo, hi) {
            (Direction::North, Direction::East) => 1 << 0,
            (Direction::North, Direction::South) => 1 << 1,
            (Direction::North, Direction::West) => 1 << 2,
            (Direction::East, Direction::South) => 1 << 3,
            (Direction::East, Direction::West) => 1 << 4,
            (Direction::South, Direction::West) => 1 << 5,
            _ => unreachable!("a port pair must join two distinct ports"),
        }
    }

    /// Builds a set from unordered port pairs.
    pub fn from_pairs(pairs: &[(Direction, Direction)]) -> Self {
        let mut set = ConnectionSet::EMPTY;
        for &(a, b) in pairs {
            set.0 |= Self::pair_bit(a, b);
        }
        set
    }

    /// Whether the pair joining the two given ports is in the set.
    #[inline]
    pub fn contains(self, a: Direction, b: Direction) -> bool {
        self.0 & Self::pair_bit(a, b) != 0
    }

    /// Whether any pair in the set touches the given port.
    #[inline]
    pub fn has_port(self, direction: Direction) -> bool {
        self.0 & PORT_MASKS[direction as usize] != 0
    }

    /// Whether every pair of `other` is also in `self`.
    #[inline]
    pub fn is_superset_of(self, other: ConnectionSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the set runs straight through from north to south.
    #[inline]
    pub fn has_north_south(self) -> bool {
        self.contains(Direction::North, Direction::South)
    }

    /// Whether the set runs straight through from east to west.
    #[inline]
    pub fn has_east_west(self) -> bool {
        self.contains(Direction::East, Direction::West)
    }

    /// Iterates over the pairs in the set, in the fixed bit order.
    pub fn pairs(self) -> impl Iterator<Item = (Direction, Direction)> {
        PAIR_TABLE
            .iter()
            .enumerate()
            .filter(move |(i, _)| self.0 & (1 << i) != 0)
            .map(|(_, pair)| *pair)
    }

    /// The pairs present in `self` but absent from `old`.
    pub fn pairs_added_over(self, old: ConnectionSet) -> impl Iterator<Item = (Direction, Direction)> {
        ConnectionSet(self.0 & !old.0).pairs()
    }

    /// Rotates every pair in the set by the given orientation.
    pub fn rotated(self, orientation: Orientation) -> Self {
        let mut set = ConnectionSet::EMPTY;
        for (a, b) in self.pairs() {
            set.0 |= Self::pair_bit(a.rotated(orientation), b.rotated(orientation));
        }
        set
    }
}

lazy_static! {
    // 12 kinds × 4 orientations, computed once. Legality checks are plain
    // table lookups from here on.
    static ref CONNECTION_TABLE: [[ConnectionSet; 4]; TileKind::COUNT] = {
        let kinds: Vec<TileKind> = TileKind::iter().collect();
        let orientations: Vec<Orientation> = Orientation::iter().collect();
        array_init(|k| array_init(|o| kinds[k].base_connections().rotated(orientations[o])))
    };
}

/// The port-pair set a tile kind realizes once rotated to an orientation.
///
/// # Example
/// ```
/// use streetcar::tile::{effective_connections, Direction, Orientation, TileKind};
///
/// let curve = effective_connections(TileKind::Curve, Orientation::Deg90);
/// assert!(curve.contains(Direction::East, Direction::South));
/// assert!(!curve.has_port(Direction::North));
/// ```
#[inline]
pub fn effective_connections(kind: TileKind, orientation: Orientation) -> ConnectionSet {
    CONNECTION_TABLE[kind as usize][orientation.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_directions() {
        for direction in Direction::iter() {
            assert_ne!(direction, direction.opposite());
            assert_eq!(direction, direction.opposite().opposite());
        }
    }

    #[test]
    fn rotation_is_cyclic() {
        assert_eq!(
            Direction::North.rotated(Orientation::Deg90),
            Direction::East
        );
        assert_eq!(
            Direction::West.rotated(Orientation::Deg90),
            Direction::North
        );
        assert_eq!(
            Direction::East.rotated(Orientation::Deg270),
            Direction::North
        );
    }

    #[test]
    fn full_turn_restores_every_connection_set() {
        // Closure of every kind's connections under the rotation group.
        for kind in TileKind::iter() {
            let base = kind.base_connections();
            let mut rotated = base;
            for _ in 0..4 {
                rotated = rotated.rotated(Orientation::Deg90);
            }
            assert_eq!(rotated, base, "Fails for {kind}");

            assert_eq!(base.rotated(Orientation::Deg0), base, "Fails for {kind}");
            assert_eq!(
                base.rotated(Orientation::Deg90).rotated(Orientation::Deg270),
                base,
                "Fails for {kind}"
            );
        }
    }

    #[test]
    fn straight_connections() {
        let base = TileKind::Straight.base_connections();
        assert!(base.has_north_south());
        assert!(!base.has_east_west());
        assert!(base.has_port(Direction::North));
        assert!(base.has_port(Direction::South));
        assert!(!base.has_port(Direction::East));

        let quarter = effective_connections(TileKind::Straight, Orientation::Deg90);
        assert!(quarter.has_east_west());
        assert!(!quarter.has_north_south());
    }

    #[test]
    fn roundabout_touches_every_port_but_runs_straight_through_none() {
        let set = TileKind::TreeRoundabout.base_connections();
        for direction in Direction::iter() {
            assert!(set.has_port(direction));
        }
        assert!(!set.has_north_south());
        assert!(!set.has_east_west());
    }

    #[test]
    fn crossroad_is_rotation_invariant() {
        let base = TileKind::TreeCrossroad.base_connections();
        for orientation in Orientation::iter() {
            assert_eq!(effective_connections(TileKind::TreeCrossroad, orientation), base);
        }
    }

    #[test]
    fn superset_of_self_and_of_subset() {
        let crossroad = TileKind::TreeCrossroad.base_connections();
        let straight = TileKind::Straight.base_connections();
        let curve = TileKind::Curve.base_connections();

        assert!(crossroad.is_superset_of(crossroad));
        assert!(crossroad.is_superset_of(straight));
        assert!(!crossroad.is_superset_of(curve));
        assert!(!straight.is_superset_of(crossroad));
    }

    #[test]
    fn pairs_added_over_reports_only_new_pairs() {
        let straight = TileKind::Straight.base_connections();
        let crossroad = TileKind::TreeCrossroad.base_connections();

        let added: Vec<_> = crossroad.pairs_added_over(straight).collect();
        assert_eq!(added, vec![(Direction::East, Direction::West)]);

        assert_eq!(straight.pairs_added_over(straight).count(), 0);
    }

    #[test]
    fn every_kind_and_orientation_is_in_the_table() {
        for kind in TileKind::iter() {
            for orientation in Orientation::iter() {
                assert_eq!(
                    effective_connections(kind, orientation),
                    kind.base_connections().rotated(orientation),
                    "Fails for {kind} at {orientation}"
                );
            }
        }
    }

    #[test]
    fn swappability_split() {
        assert!(TileKind::Straight.is_swappable());
        assert!(TileKind::DiagonalCurve.is_swappable());
        assert!(!TileKind::TreeRoundabout.is_swappable());
        assert!(!TileKind::TreeCrossroad.is_swappable());
        assert_eq!(TileKind::iter().filter(|kind| kind.is_swappable()).count(), 6);
    }

    #[test]
    fn orientation_to_json() -> serde_json::Result<()> {
        assert_eq!(serde_json::to_string(&Orientation::Deg0)?, "0");
        assert_eq!(serde_json::to_string(&Orientation::Deg270)?, "270");
        Ok(())
    }

    #[test]
    fn json_to_orientation() -> serde_json::Result<()> {
        assert_eq!(serde_json::from_str::<Orientation>("90")?, Orientation::Deg90);
        assert!(serde_json::from_str::<Orientation>("45").is_err());
        Ok(())
    }

    #[test]
    fn direction_to_json() -> serde_json::Result<()> {
        assert_eq!(serde_json::to_string(&Direction::North)?, r#""north""#);
        assert_eq!(
            serde_json::from_str::<Direction>(r#""west""#)?,
            Direction::West
        );
        Ok(())
    }
}
