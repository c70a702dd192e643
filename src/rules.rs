use crate::board::{Board, Building, Coord, PlacedTile};
use crate::tile::{effective_connections, Direction, Orientation, TileKind};

use serde::Serialize;
use strum::IntoEnumIterator;
use thiserror::Error;

/// A validator rejection. Always recoverable; a rejected move never mutates
/// any state.
///
/// # JSON
/// Rejections serialize with a snake_case `reason` tag plus the offending
/// details, e.g. `{"reason":"occupied","coord":{"row":4,"col":5}}`.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InvalidMove {
    #[error("Cannot build at {coord}: the track would leave the playable area.")]
    OffBoardBlocked { coord: Coord },
    #[error("Cannot build at {coord}: the square is already occupied.")]
    Occupied { coord: Coord },
    #[error("Cannot build at {coord}: blocked by building {building}.")]
    BuildingBlocked { coord: Coord, building: Building },
    #[error("Cannot place at {coord}: the tile disagrees with its neighbor at {neighbor}.")]
    NeighborMismatch { coord: Coord, neighbor: Coord },
    #[error("Cannot exchange at {coord}: there is no tile there.")]
    NothingToExchange { coord: Coord },
    #[error("Cannot exchange the tile at {coord}: it is permanent.")]
    TreeLocked { coord: Coord },
    #[error("Cannot exchange the tile at {coord}: it carries a stop sign.")]
    StopLocked { coord: Coord },
    #[error("Cannot exchange the tile at {coord}: it is a terminal.")]
    TerminalLocked { coord: Coord },
    #[error("Cannot play a {kind} tile: it is not in the hand.")]
    NotInHand { kind: TileKind },
    #[error("Cannot exchange the tile at {coord} for another of the same kind.")]
    SameKind { coord: Coord },
    #[error("Cannot exchange at {coord}: the new tile drops a connection the old one had.")]
    ConnectionNotPreserved { coord: Coord },
    #[error("Cannot exchange at {coord}: the added connection towards {direction} is invalid.")]
    AddedConnectionInvalid { coord: Coord, direction: Direction },
}

/// Which rule of the data model was broken.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvariantKind {
    /// A building was about to receive a second stop sign.
    DuplicateStopSign { building: Building },
    /// Two adjacent tiles disagree about their shared edge.
    AsymmetricConnection,
}

/// A broken invariant. Fatal to the affected turn: the caller must halt the
/// turn and surface the diagnostic state instead of playing on.
#[derive(Clone, Debug, Error)]
#[error("Invariant violated ({kind:?}) at {coords:?}.")]
pub struct InvariantViolation {
    pub kind: InvariantKind,
    /// The offending coordinates.
    pub coords: Vec<Coord>,
    /// Snapshot of the board at the moment the violation was detected.
    pub board: Box<Board>,
}

impl InvariantViolation {
    pub(crate) fn new(kind: InvariantKind, coords: Vec<Coord>, board: Board) -> Self {
        Self {
            kind,
            coords,
            board: Box::new(board),
        }
    }
}

/// Errors coming out of a committed move: either an ordinary rejection or a
/// fatal inconsistency.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error(transparent)]
    Invalid(#[from] InvalidMove),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// The board delta of a committed placement.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct PlacementOutcome {
    pub coord: Coord,
    pub placed: PlacedTile,
    /// The stop sign assigned as a consequence of this placement, if any.
    pub stop_sign: Option<(Building, Coord)>,
}

/// The board delta of a committed exchange.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ExchangeOutcome {
    pub coord: Coord,
    /// The old tile kind, returned to the player's hand.
    pub returned: TileKind,
    pub placed: PlacedTile,
}

// Looks a tile up on the board, or among a pending overlay of tiles that
// are treated as if already laid.
fn tile_among<'a>(
    board: &'a Board,
    pending: &'a [(Coord, PlacedTile)],
    coord: Coord,
) -> Option<&'a PlacedTile> {
    pending
        .iter()
        .find(|(pending_coord, _)| *pending_coord == coord)
        .map(|(_, tile)| tile)
        .or_else(|| board.tile(coord))
}

/// Checks whether laying a hand tile on an empty square is legal.
///
/// Both sides of every edge are checked: the new tile must not point at a
/// neighbor that does not point back, and it must point back at every
/// neighbor that points at it.
///
/// # Example
/// ```
/// use streetcar::board::{Board, Coord};
/// use streetcar::rules::check_placement;
/// use streetcar::tile::{Orientation, TileKind};
///
/// let board = Board::new();
/// let isolated = Coord::new(6, 6);
/// assert!(check_placement(&board, TileKind::Straight, Orientation::Deg0, isolated).is_ok());
/// ```
pub fn check_placement(
    board: &Board,
    kind: TileKind,
    orientation: Orientation,
    coord: Coord,
) -> Result<(), InvalidMove> {
    check_placement_among(board, &[], kind, orientation, coord)
}

/// Same check as [`check_placement`], but with a pending overlay of tiles
/// treated as if they were already on the board. Used by the combinatorial
/// planner to evaluate pairs of moves that are only legal together.
pub fn check_placement_among(
    board: &Board,
    pending: &[(Coord, PlacedTile)],
    kind: TileKind,
    orientation: Orientation,
    coord: Coord,
) -> Result<(), InvalidMove> {
    if !coord.is_playable() {
        return Err(InvalidMove::OffBoardBlocked { coord });
    }
    if tile_among(board, pending, coord).is_some() {
        return Err(InvalidMove::Occupied { coord });
    }
    if let Some(building) = board.building_at(coord) {
        return Err(InvalidMove::BuildingBlocked { coord, building });
    }

    let connections = effective_connections(kind, orientation);
    for direction in Direction::iter() {
        let outgoing = connections.has_port(direction);
        let neighbor = match coord.neighbor(direction) {
            Some(neighbor) => neighbor,
            None => {
                if outgoing {
                    return Err(InvalidMove::OffBoardBlocked { coord });
                }
                continue;
            }
        };

        if let Some(neighbor_tile) = tile_among(board, pending, neighbor) {
            // Existing tile (terminals included): the agreement must hold in
            // both directions, never just one.
            let reciprocal = neighbor_tile.connections().has_port(direction.opposite());
            if outgoing != reciprocal {
                return Err(InvalidMove::NeighborMismatch { coord, neighbor });
            }
        } else if let Some(building) = board.building_at(neighbor) {
            if outgoing {
                return Err(InvalidMove::BuildingBlocked { coord, building });
            }
        } else if outgoing && !neighbor.is_playable() {
            // Bare border cell: only terminal tiles live out there.
            return Err(InvalidMove::OffBoardBlocked { coord });
        }
    }

    Ok(())
}

/// Checks whether replacing a laid tile with a hand tile is legal.
///
/// Preconditions fail fast in a fixed order, then the exchange must
/// preserve every connection the old tile had, and every connection it adds
/// must itself survive the per-direction neighbor check.
///
/// `streetcars` are the cells currently occupied by driving players; any of
/// them blocks the exchange, the acting player's own car included.
pub fn check_exchange(
    board: &Board,
    hand: &[TileKind],
    kind: TileKind,
    orientation: Orientation,
    coord: Coord,
    streetcars: &[Coord],
) -> Result<(), InvalidMove> {
    let old = match board.tile(coord) {
        Some(tile) => tile,
        None => return Err(InvalidMove::NothingToExchange { coord }),
    };
    if !old.kind.is_swappable() {
        return Err(InvalidMove::TreeLocked { coord });
    }
    if old.has_stop_sign {
        return Err(InvalidMove::StopLocked { coord });
    }
    if old.is_terminal {
        return Err(InvalidMove::TerminalLocked { coord });
    }
    if streetcars.contains(&coord) {
        return Err(InvalidMove::Occupied { coord });
    }
    if !hand.contains(&kind) {
        return Err(InvalidMove::NotInHand { kind });
    }
    if old.kind == kind {
        return Err(InvalidMove::SameKind { coord });
    }

    let old_connections = old.connections();
    let new_connections = effective_connections(kind, orientation);
    if !new_connections.is_superset_of(old_connections) {
        return Err(InvalidMove::ConnectionNotPreserved { coord });
    }

    for (a, b) in new_connections.pairs_added_over(old_connections) {
        for direction in [a, b] {
            let neighbor = coord.neighbor(direction);
            let neighbor_tile = neighbor.and_then(|n| board.tile(n));
            if let Some(neighbor_tile) = neighbor_tile {
                if !neighbor_tile.connections().has_port(direction.opposite()) {
                    return Err(InvalidMove::AddedConnectionInvalid { coord, direction });
                }
                continue;
            }
            match neighbor {
                Some(n) => {
                    if board.building_at(n).is_some() || !n.is_playable() {
                        return Err(InvalidMove::AddedConnectionInvalid { coord, direction });
                    }
                }
                None => return Err(InvalidMove::AddedConnectionInvalid { coord, direction }),
            }
        }
    }

    Ok(())
}

/// Runs the automatic stop-sign consequence of a just-committed placement.
///
/// Scans the neighbors in the fixed N, E, S, W order; the first unflagged
/// building whose shared edge is parallel to a straight-through pair on the
/// new tile receives the sign. A tile serves at most one building, even
/// when it is adjacent to two.
fn assign_stop_sign(board: &mut Board, coord: Coord) -> Result<Option<Building>, InvariantViolation> {
    let connections = match board.tile(coord) {
        Some(tile) => tile.connections(),
        None => return Ok(None),
    };

    for direction in Direction::iter() {
        let neighbor = match coord.neighbor(direction) {
            Some(neighbor) => neighbor,
            None => continue,
        };
        let building = match board.building_at(neighbor) {
            Some(building) => building,
            None => continue,
        };
        if board.stop_sign(building).is_some() {
            continue;
        }
        let parallel = match direction {
            Direction::North | Direction::South => connections.has_east_west(),
            Direction::East | Direction::West => connections.has_north_south(),
        };
        if parallel {
            board.register_stop_sign(building, coord)?;
            return Ok(Some(building));
        }
    }

    Ok(None)
}

/// Validates and commits the placement of a hand tile, then applies the
/// stop-sign consequence and audits the board.
///
/// On success the tile is removed from `hand`. The board is never touched
/// on a rejection.
pub fn commit_placement(
    board: &mut Board,
    hand: &mut Vec<TileKind>,
    kind: TileKind,
    orientation: Orientation,
    coord: Coord,
) -> Result<PlacementOutcome, MoveError> {
    if !hand.contains(&kind) {
        return Err(InvalidMove::NotInHand { kind }.into());
    }
    check_placement(board, kind, orientation, coord)?;

    let placed = PlacedTile::new(kind, orientation);
    board.set_tile(coord, placed);
    remove_one(hand, kind);
    let stop_sign = assign_stop_sign(board, coord)?.map(|building| (building, coord));
    board.audit_agreement()?;

    Ok(PlacementOutcome {
        coord,
        // Re-read so the outcome reflects a possible stop-sign flag.
        placed: *board.tile(coord).expect("the tile was just laid"),
        stop_sign,
    })
}

/// Validates and commits an exchange: the old tile returns to the hand and
/// the new tile takes its place with no stop sign. Exchanges never create
/// stop signs.
pub fn commit_exchange(
    board: &mut Board,
    hand: &mut Vec<TileKind>,
    kind: TileKind,
    orientation: Orientation,
    coord: Coord,
    streetcars: &[Coord],
) -> Result<ExchangeOutcome, MoveError> {
    check_exchange(board, hand, kind, orientation, coord, streetcars)?;

    let returned = board.tile(coord).expect("the exchange check saw a tile").kind;
    let placed = PlacedTile::new(kind, orientation);
    board.set_tile(coord, placed);
    remove_one(hand, kind);
    hand.push(returned);
    board.audit_agreement()?;

    Ok(ExchangeOutcome {
        coord,
        returned,
        placed,
    })
}

/// Validates a pair of placements that may only be legal together, then
/// commits both. Each placement is checked with the other treated as
/// pending, so mutation still only happens after full validation.
pub fn commit_joint_placements(
    board: &mut Board,
    hand: &mut Vec<TileKind>,
    first: (TileKind, Orientation, Coord),
    second: (TileKind, Orientation, Coord),
) -> Result<(PlacementOutcome, PlacementOutcome), MoveError> {
    let (first_kind, first_orientation, first_coord) = first;
    let (second_kind, second_orientation, second_coord) = second;

    let mut remaining = hand.clone();
    if !remove_one(&mut remaining, first_kind) {
        return Err(InvalidMove::NotInHand { kind: first_kind }.into());
    }
    if !remove_one(&mut remaining, second_kind) {
        return Err(InvalidMove::NotInHand { kind: second_kind }.into());
    }

    let first_tile = PlacedTile::new(first_kind, first_orientation);
    let second_tile = PlacedTile::new(second_kind, second_orientation);
    check_placement_among(
        board,
        &[(second_coord, second_tile)],
        first_kind,
        first_orientation,
        first_coord,
    )?;
    check_placement_among(
        board,
        &[(first_coord, first_tile)],
        second_kind,
        second_orientation,
        second_coord,
    )?;

    board.set_tile(first_coord, first_tile);
    board.set_tile(second_coord, second_tile);
    *hand = remaining;
    let first_sign = assign_stop_sign(board, first_coord)?.map(|building| (building, first_coord));
    let second_sign =
        assign_stop_sign(board, second_coord)?.map(|building| (building, second_coord));
    board.audit_agreement()?;

    let first_outcome = PlacementOutcome {
        coord: first_coord,
        placed: *board.tile(first_coord).expect("the tile was just laid"),
        stop_sign: first_sign,
    };
    let second_outcome = PlacementOutcome {
        coord: second_coord,
        placed: *board.tile(second_coord).expect("the tile was just laid"),
        stop_sign: second_sign,
    };
    Ok((first_outcome, second_outcome))
}

fn remove_one(hand: &mut Vec<TileKind>, kind: TileKind) -> bool {
    match hand.iter().position(|tile| *tile == kind) {
        Some(index) => {
            hand.remove(index);
            true
        }
        None => false,
    }
}
