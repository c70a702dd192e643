use crate::rules::{InvariantKind, InvariantViolation};
use crate::tile::{effective_connections, ConnectionSet, Direction, Orientation, TileKind};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::collections::BTreeMap;
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// Full grid height, including the border ring that hosts the terminals.
pub const GRID_ROWS: usize = 14;
/// Full grid width, including the border ring that hosts the terminals.
pub const GRID_COLS: usize = 14;
/// First playable row/column index.
pub const PLAYABLE_MIN: u8 = 1;
/// Last playable row/column index. The playable area is thus 12×12.
pub const PLAYABLE_MAX: u8 = 12;

/// A cell of the grid. Row 0 is the top edge, column 0 the left edge.
///
/// Coordinates order row-major, which is the deterministic tie-break order
/// used by the planner.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Coord {
    pub row: u8,
    pub col: u8,
}

impl Coord {
    #[inline]
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Whether the cell lies inside the playable 12×12 area.
    #[inline]
    pub fn is_playable(self) -> bool {
        (PLAYABLE_MIN..=PLAYABLE_MAX).contains(&self.row)
            && (PLAYABLE_MIN..=PLAYABLE_MAX).contains(&self.col)
    }

    /// The adjacent cell in the given direction, if it is still on the grid.
    pub fn neighbor(self, direction: Direction) -> Option<Coord> {
        let (dr, dc) = direction.delta();
        let row = self.row as i16 + dr as i16;
        let col = self.col as i16 + dc as i16;
        if (0..GRID_ROWS as i16).contains(&row) && (0..GRID_COLS as i16).contains(&col) {
            Some(Coord::new(row as u8, col as u8))
        } else {
            None
        }
    }

    /// The direction pointing from `self` to an orthogonally adjacent cell.
    pub fn direction_to(self, other: Coord) -> Option<Direction> {
        Direction::iter().find(|direction| self.neighbor(*direction) == Some(other))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The buildings passengers want to reach. `J` is skipped, as on the
/// physical board.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
pub enum Building {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    K,
    L,
    M,
}

/// One of the six streetcar lines, each owning two terminal entrances.
///
/// # JSON
/// Lines are serialized as their number.
#[derive(
    Clone, Copy, Debug, Deserialize_repr, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize_repr,
)]
#[repr(u8)]
pub enum Line {
    Line1 = 1,
    Line2 = 2,
    Line3 = 3,
    Line4 = 4,
    Line5 = 5,
    Line6 = 6,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}", *self as u8)
    }
}

/// A tile laid on a board cell.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlacedTile {
    pub kind: TileKind,
    pub orientation: Orientation,
    /// Set once by the stop-sign assigner; never cleared.
    pub has_stop_sign: bool,
    /// Terminal tiles are placed at setup and never touched again.
    pub is_terminal: bool,
}

impl PlacedTile {
    pub fn new(kind: TileKind, orientation: Orientation) -> Self {
        Self {
            kind,
            orientation,
            has_stop_sign: false,
            is_terminal: false,
        }
    }

    fn terminal(orientation: Orientation) -> Self {
        Self {
            kind: TileKind::Curve,
            orientation,
            has_stop_sign: false,
            is_terminal: true,
        }
    }

    /// The port pairs this tile realizes at its orientation.
    #[inline]
    pub fn connections(&self) -> ConnectionSet {
        effective_connections(self.kind, self.orientation)
    }

    /// A stop-signed or terminal tile is permanently immutable.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.has_stop_sign || self.is_terminal
    }
}

// Where each building sits on the playable area.
const BUILDING_TABLE: [(Building, (u8, u8)); 12] = [
    (Building::A, (8, 12)),
    (Building::B, (11, 9)),
    (Building::C, (12, 5)),
    (Building::D, (8, 2)),
    (Building::E, (5, 1)),
    (Building::F, (2, 4)),
    (Building::G, (1, 8)),
    (Building::H, (4, 11)),
    (Building::I, (6, 9)),
    (Building::K, (9, 7)),
    (Building::L, (7, 4)),
    (Building::M, (4, 6)),
];

// Each line has two terminal entrances on the border ring; each entrance is
// a pair of curve tiles feeding the playable area. The first cell of each
// entrance is the line's primary terminal coordinate.
type TerminalCell = ((u8, u8), Orientation);
const TERMINAL_TABLE: [(Line, [[TerminalCell; 2]; 2]); 6] = [
    (
        Line::Line1,
        [
            [((6, 0), Orientation::Deg90), ((7, 0), Orientation::Deg0)],
            [((2, 13), Orientation::Deg180), ((3, 13), Orientation::Deg270)],
        ],
    ),
    (
        Line::Line2,
        [
            [((10, 0), Orientation::Deg90), ((11, 0), Orientation::Deg0)],
            [((6, 13), Orientation::Deg180), ((7, 13), Orientation::Deg270)],
        ],
    ),
    (
        Line::Line3,
        [
            [((2, 0), Orientation::Deg90), ((3, 0), Orientation::Deg0)],
            [((10, 13), Orientation::Deg180), ((11, 13), Orientation::Deg270)],
        ],
    ),
    (
        Line::Line4,
        [
            [((0, 6), Orientation::Deg90), ((0, 7), Orientation::Deg180)],
            [((13, 10), Orientation::Deg0), ((13, 11), Orientation::Deg270)],
        ],
    ),
    (
        Line::Line5,
        [
            [((0, 2), Orientation::Deg90), ((0, 3), Orientation::Deg180)],
            [((13, 6), Orientation::Deg0), ((13, 7), Orientation::Deg270)],
        ],
    ),
    (
        Line::Line6,
        [
            [((0, 10), Orientation::Deg90), ((0, 11), Orientation::Deg180)],
            [((13, 2), Orientation::Deg0), ((13, 3), Orientation::Deg270)],
        ],
    ),
];

/// The authoritative state of the board, per game.
///
/// Holds the grid of laid tiles plus three registries: buildings (fixed),
/// terminals (fixed at setup), and stop signs (append-only).
/// Not thread-safe!
#[derive(Clone, Debug)]
pub struct Board {
    grid: [[Option<PlacedTile>; GRID_COLS]; GRID_ROWS],
    buildings: BTreeMap<Building, Coord>,
    building_cells: BTreeMap<Coord, Building>,
    terminals: BTreeMap<Line, (Coord, Coord)>,
    stop_signs: BTreeMap<Building, Coord>,
}

impl Board {
    /// Builds a board with all buildings registered and every line's
    /// terminal entrance tiles already laid on the border ring.
    pub fn new() -> Self {
        let mut buildings = BTreeMap::new();
        let mut building_cells = BTreeMap::new();
        for (building, (row, col)) in BUILDING_TABLE {
            let coord = Coord::new(row, col);
            buildings.insert(building, coord);
            building_cells.insert(coord, building);
        }

        let mut grid = [[None; GRID_COLS]; GRID_ROWS];
        let mut terminals = BTreeMap::new();
        for (line, entrances) in TERMINAL_TABLE {
            for entrance in entrances {
                for ((row, col), orientation) in entrance {
                    grid[row as usize][col as usize] = Some(PlacedTile::terminal(orientation));
                }
            }
            let primary_a = Coord::new(entrances[0][0].0 .0, entrances[0][0].0 .1);
            let primary_b = Coord::new(entrances[1][0].0 .0, entrances[1][0].0 .1);
            terminals.insert(line, (primary_a, primary_b));
        }

        Self {
            grid,
            buildings,
            building_cells,
            terminals,
            stop_signs: BTreeMap::new(),
        }
    }

    /// The tile laid at the given cell, if any.
    #[inline]
    pub fn tile(&self, coord: Coord) -> Option<&PlacedTile> {
        self.grid[coord.row as usize][coord.col as usize].as_ref()
    }

    /// The building occupying the given cell, if any.
    #[inline]
    pub fn building_at(&self, coord: Coord) -> Option<Building> {
        self.building_cells.get(&coord).copied()
    }

    /// Where the given building sits.
    #[inline]
    pub fn building_coord(&self, building: Building) -> Coord {
        self.buildings[&building]
    }

    /// Whether a tile could in principle go here: playable, empty, and not
    /// a building cell.
    pub fn is_free(&self, coord: Coord) -> bool {
        coord.is_playable() && self.tile(coord).is_none() && self.building_at(coord).is_none()
    }

    /// The two primary terminal coordinates of a line.
    #[inline]
    pub fn terminal_coords(&self, line: Line) -> (Coord, Coord) {
        self.terminals[&line]
    }

    /// Where the given building's stop sign stands, if it has one.
    #[inline]
    pub fn stop_sign(&self, building: Building) -> Option<Coord> {
        self.stop_signs.get(&building).copied()
    }

    /// The append-only stop-sign registry.
    pub fn stop_signs(&self) -> &BTreeMap<Building, Coord> {
        &self.stop_signs
    }

    /// Iterates over all playable cells in row-major order.
    pub fn playable_coords(&self) -> impl Iterator<Item = Coord> {
        (PLAYABLE_MIN..=PLAYABLE_MAX).flat_map(|row| {
            (PLAYABLE_MIN..=PLAYABLE_MAX).map(move |col| Coord::new(row, col))
        })
    }

    /// Iterates over every cell holding a tile, in row-major order.
    pub fn occupied_coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..GRID_ROWS as u8)
            .flat_map(|row| (0..GRID_COLS as u8).map(move |col| Coord::new(row, col)))
            .filter(|coord| self.tile(*coord).is_some())
    }

    /// Lays a tile on a cell. The caller is responsible for having validated
    /// the move; this is the raw mutation used by the committed-move path.
    pub(crate) fn set_tile(&mut self, coord: Coord, tile: PlacedTile) {
        self.grid[coord.row as usize][coord.col as usize] = Some(tile);
    }

    /// Binds a stop sign to a building and flags the serving tile.
    ///
    /// A building accrues at most one stop sign for the lifetime of a game;
    /// a second registration is a fatal inconsistency.
    pub(crate) fn register_stop_sign(
        &mut self,
        building: Building,
        coord: Coord,
    ) -> Result<(), InvariantViolation> {
        if let Some(existing) = self.stop_signs.get(&building).copied() {
            return Err(InvariantViolation::new(
                InvariantKind::DuplicateStopSign { building },
                vec![existing, coord],
                self.clone(),
            ));
        }
        self.stop_signs.insert(building, coord);
        if let Some(slot) = self.grid[coord.row as usize][coord.col as usize].as_mut() {
            slot.has_stop_sign = true;
        }
        Ok(())
    }

    /// Verifies bidirectional port agreement between every pair of adjacent
    /// laid tiles: either both point at each other or neither does.
    pub fn audit_agreement(&self) -> Result<(), InvariantViolation> {
        for coord in self.occupied_coords() {
            let connections = match self.tile(coord) {
                Some(tile) => tile.connections(),
                None => continue,
            };
            // Checking east and south covers each adjacency exactly once.
            for direction in [Direction::East, Direction::South] {
                let neighbor = match coord.neighbor(direction) {
                    Some(neighbor) => neighbor,
                    None => continue,
                };
                let neighbor_connections = match self.tile(neighbor) {
                    Some(tile) => tile.connections(),
                    None => continue,
                };
                let outgoing = connections.has_port(direction);
                let reciprocal = neighbor_connections.has_port(direction.opposite());
                if outgoing != reciprocal {
                    return Err(InvariantViolation::new(
                        InvariantKind::AsymmetricConnection,
                        vec![coord, neighbor],
                        self.clone(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
