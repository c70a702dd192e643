use crate::board::{Board, Building, Coord, Line, GRID_COLS, GRID_ROWS};
use crate::tile::Direction;

use serde::Serialize;
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};
use strum::IntoEnumIterator;

/// Finds the shortest track between two laid tiles, walking only edges on
/// which both sides agree: the tile at `from` must have a port towards its
/// neighbor *and* the neighbor must have a port back.
///
/// Returns the coordinate list including both endpoints, or `None` when the
/// two cells are not connected on the current board.
pub fn segment_path(board: &Board, from: Coord, to: Coord) -> Option<Vec<Coord>> {
    board.tile(from)?;
    board.tile(to)?;
    if from == to {
        return Some(vec![from]);
    }

    let mut predecessor: [[Option<Coord>; GRID_COLS]; GRID_ROWS] = [[None; GRID_COLS]; GRID_ROWS];
    let mut visited = [[false; GRID_COLS]; GRID_ROWS];
    visited[from.row as usize][from.col as usize] = true;

    let mut frontier = VecDeque::new();
    frontier.push_back(from);

    while let Some(current) = frontier.pop_front() {
        if current == to {
            let mut path = vec![to];
            let mut cursor = to;
            while let Some(previous) = predecessor[cursor.row as usize][cursor.col as usize] {
                path.push(previous);
                cursor = previous;
            }
            path.reverse();
            return Some(path);
        }

        let connections = match board.tile(current) {
            Some(tile) => tile.connections(),
            None => continue,
        };
        for direction in Direction::iter() {
            if !connections.has_port(direction) {
                continue;
            }
            let neighbor = match current.neighbor(direction) {
                Some(neighbor) => neighbor,
                None => continue,
            };
            if visited[neighbor.row as usize][neighbor.col as usize] {
                continue;
            }
            let neighbor_tile = match board.tile(neighbor) {
                Some(tile) => tile,
                None => continue,
            };
            if !neighbor_tile.connections().has_port(direction.opposite()) {
                continue;
            }
            visited[neighbor.row as usize][neighbor.col as usize] = true;
            predecessor[neighbor.row as usize][neighbor.col as usize] = Some(current);
            frontier.push_back(neighbor);
        }
    }

    None
}

/// Whether two cells are connected by laid track.
pub fn connected(board: &Board, from: Coord, to: Coord) -> bool {
    segment_path(board, from, to).is_some()
}

/// A route proven complete, ready for the driving phase.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CompletedRoute {
    /// The terminal the streetcar departs from; fixed by whichever
    /// direction of the waypoint sequence connected first.
    pub start_terminal: Coord,
    pub end_terminal: Coord,
    /// The full coordinate list from start terminal to end terminal,
    /// passing every required stop in order.
    pub path: Vec<Coord>,
}

/// Checks the route-completion predicate for a line and its required stops.
///
/// The waypoint sequence is `[terminal_A, stop_1, …, stop_k, terminal_B]`,
/// using the board's stop-sign registry; a required stop without a
/// registered stop sign makes the route incomplete immediately. The
/// forward sequence is tried first, then the same stops from the opposite
/// terminal. Stops are visited in card order in both directions.
pub fn check_route_completion(
    board: &Board,
    line: Line,
    stops: &[Building],
) -> Option<CompletedRoute> {
    let (terminal_a, terminal_b) = board.terminal_coords(line);

    let mut stop_coords: SmallVec<[Coord; 3]> = SmallVec::new();
    for stop in stops {
        stop_coords.push(board.stop_sign(*stop)?);
    }

    connect_sequence(board, terminal_a, &stop_coords, terminal_b)
        .or_else(|| connect_sequence(board, terminal_b, &stop_coords, terminal_a))
}

fn connect_sequence(
    board: &Board,
    start: Coord,
    stops: &[Coord],
    end: Coord,
) -> Option<CompletedRoute> {
    let mut waypoints = Vec::with_capacity(stops.len() + 2);
    waypoints.push(start);
    waypoints.extend_from_slice(stops);
    waypoints.push(end);

    let mut path = vec![start];
    for window in waypoints.windows(2) {
        let segment = segment_path(board, window[0], window[1])?;
        path.extend_from_slice(&segment[1..]);
    }

    Some(CompletedRoute {
        start_terminal: start,
        end_terminal: end,
        path,
    })
}

// A node of the hypothetical search. The arrival direction matters because
// an occupied square is only traversable along pairs its laid tile already
// realizes.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
struct SearchState {
    pos: Coord,
    arrival: Option<Direction>,
    next_waypoint: usize,
}

/// Finds the minimum-length coordinate sequence visiting the waypoints in
/// order, assuming any empty playable square can be satisfied by *some*
/// catalog tile with the required in/out ports, while an occupied square
/// must be reused as-is.
///
/// This is the planner's "ideal route": a hypothetical best case, not a
/// statement about the current track. Returns the coordinate sequence and
/// its length in moves.
pub fn ideal_route(board: &Board, waypoints: &[Coord]) -> Option<(Vec<Coord>, usize)> {
    let start = *waypoints.first()?;
    board.tile(start)?;
    if waypoints.len() == 1 {
        return Some((vec![start], 0));
    }

    let start_state = SearchState {
        pos: start,
        arrival: None,
        next_waypoint: 1,
    };
    let mut came_from: HashMap<SearchState, SearchState> = HashMap::new();
    let mut frontier = VecDeque::new();
    came_from.insert(start_state, start_state);
    frontier.push_back(start_state);

    while let Some(state) = frontier.pop_front() {
        if state.next_waypoint == waypoints.len() {
            let mut path = Vec::new();
            let mut cursor = state;
            loop {
                path.push(cursor.pos);
                let previous = came_from[&cursor];
                if previous == cursor {
                    break;
                }
                cursor = previous;
            }
            path.reverse();
            let moves = path.len() - 1;
            return Some((path, moves));
        }

        for direction in exits_of(board, state) {
            let neighbor = match state.pos.neighbor(direction) {
                Some(neighbor) => neighbor,
                None => continue,
            };
            if !enterable(board, neighbor, direction) {
                continue;
            }
            let mut next_waypoint = state.next_waypoint;
            if neighbor == waypoints[next_waypoint] {
                next_waypoint += 1;
            }
            let successor = SearchState {
                pos: neighbor,
                arrival: Some(direction),
                next_waypoint,
            };
            if !came_from.contains_key(&successor) {
                came_from.insert(successor, state);
                frontier.push_back(successor);
            }
        }
    }

    None
}

// The directions a path may leave a square towards, given how it arrived.
fn exits_of(board: &Board, state: SearchState) -> SmallVec<[Direction; 4]> {
    match board.tile(state.pos) {
        Some(tile) => {
            let connections = tile.connections();
            match state.arrival {
                // Through traffic must follow a pair the tile realizes.
                Some(arrival) => Direction::iter()
                    .filter(|exit| connections.contains(arrival.opposite(), *exit))
                    .collect(),
                None => Direction::iter()
                    .filter(|exit| connections.has_port(*exit))
                    .collect(),
            }
        }
        // A hypothetical tile can join any two distinct ports, so the only
        // forbidden exit is a U-turn.
        None => match state.arrival {
            Some(arrival) => Direction::iter()
                .filter(|exit| *exit != arrival.opposite())
                .collect(),
            None => Direction::iter().collect(),
        },
    }
}

// Whether the path may step onto `coord` when travelling `towards` it.
fn enterable(board: &Board, coord: Coord, towards: Direction) -> bool {
    match board.tile(coord) {
        Some(tile) => tile.connections().has_port(towards.opposite()),
        None => coord.is_playable() && board.building_at(coord).is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PlacedTile;
    use crate::tile::{Orientation, TileKind};

    fn lay(board: &mut Board, row: u8, col: u8, kind: TileKind, orientation: Orientation) {
        board.set_tile(Coord::new(row, col), PlacedTile::new(kind, orientation));
    }

    // Lays an east-west corridor across the given row.
    fn lay_corridor(board: &mut Board, row: u8, cols: std::ops::RangeInclusive<u8>) {
        for col in cols {
            lay(board, row, col, TileKind::Straight, Orientation::Deg90);
        }
    }

    // Tests for `segment_path` / `connected`.

    #[test]
    fn not_connected_on_a_fresh_board() {
        let board = Board::new();
        let (terminal_a, terminal_b) = board.terminal_coords(Line::Line1);

        assert!(!connected(&board, terminal_a, terminal_b));
    }

    #[test]
    fn terminal_entrance_cells_are_connected_to_each_other() {
        let board = Board::new();

        // The two cells of line 1's western entrance.
        assert!(connected(&board, Coord::new(6, 0), Coord::new(7, 0)));
    }

    #[test]
    fn straight_corridor_connects_its_ends() {
        let mut board = Board::new();
        lay_corridor(&mut board, 6, 1..=12);

        assert_eq!(
            segment_path(&board, Coord::new(6, 1), Coord::new(6, 4)),
            Some(vec![
                Coord::new(6, 1),
                Coord::new(6, 2),
                Coord::new(6, 3),
                Coord::new(6, 4)
            ])
        );
        // The corridor also reaches line 1's western terminal entrance.
        assert!(connected(&board, Coord::new(6, 0), Coord::new(6, 12)));
    }

    #[test]
    fn one_sided_ports_do_not_connect() {
        let mut board = Board::new();
        // An E-W straight next to a N-S straight: the first points at the
        // second, which does not point back.
        lay(&mut board, 6, 6, TileKind::Straight, Orientation::Deg90);
        lay(&mut board, 6, 7, TileKind::Straight, Orientation::Deg0);

        assert!(!connected(&board, Coord::new(6, 6), Coord::new(6, 7)));
    }

    #[test]
    fn segment_path_to_self() {
        let mut board = Board::new();
        lay(&mut board, 6, 6, TileKind::Straight, Orientation::Deg90);

        assert_eq!(
            segment_path(&board, Coord::new(6, 6), Coord::new(6, 6)),
            Some(vec![Coord::new(6, 6)])
        );
    }

    #[test]
    fn path_follows_curves() {
        let mut board = Board::new();
        // East from (6,1), turning south at (6,3), then south to (8,3).
        lay(&mut board, 6, 1, TileKind::Straight, Orientation::Deg90);
        lay(&mut board, 6, 2, TileKind::Straight, Orientation::Deg90);
        // Curve with ports W and S: base N-E rotated 180.
        lay(&mut board, 6, 3, TileKind::Curve, Orientation::Deg180);
        lay(&mut board, 7, 3, TileKind::Straight, Orientation::Deg0);
        lay(&mut board, 8, 3, TileKind::Straight, Orientation::Deg0);

        assert_eq!(
            segment_path(&board, Coord::new(6, 1), Coord::new(8, 3)),
            Some(vec![
                Coord::new(6, 1),
                Coord::new(6, 2),
                Coord::new(6, 3),
                Coord::new(7, 3),
                Coord::new(8, 3)
            ])
        );
    }

    // Tests for `check_route_completion`.

    // Joins line 1's two terminals: an east-west corridor along row 6,
    // then a climb in column 12 up to the eastern entrance at (2,13)/(3,13).
    fn board_with_line1_corridor() -> Board {
        let mut board = Board::new();
        lay_corridor(&mut board, 6, 1..=11);
        // Junction carrying E-W through traffic plus the W-N climb; its
        // east port faces line 2's terminal at (6,13), which points back.
        lay(&mut board, 6, 12, TileKind::TreeJunctionTop, Orientation::Deg0);
        lay(&mut board, 5, 12, TileKind::Straight, Orientation::Deg0);
        lay(&mut board, 4, 12, TileKind::Straight, Orientation::Deg0);
        lay(&mut board, 3, 12, TileKind::Curve, Orientation::Deg90); // E-S
        board
    }

    #[test]
    fn route_completion_requires_registered_stops() {
        let board = board_with_line1_corridor();

        // Connected terminal to terminal, but stop A has no sign yet.
        assert_eq!(
            check_route_completion(&board, Line::Line1, &[Building::A]),
            None
        );
        // With no required stops the same track completes the route.
        assert!(check_route_completion(&board, Line::Line1, &[]).is_some());
    }

    #[test]
    fn route_completion_passes_through_stop_signs() {
        let mut board = board_with_line1_corridor();
        // The registry is what the predicate consults, so bind A's sign to
        // a corridor tile directly.
        board
            .register_stop_sign(Building::A, Coord::new(6, 5))
            .unwrap();

        let complete = check_route_completion(&board, Line::Line1, &[Building::A]).unwrap();
        assert_eq!(complete.start_terminal, Coord::new(6, 0));
        assert_eq!(complete.end_terminal, Coord::new(2, 13));
        assert!(complete.path.contains(&Coord::new(6, 5)));
        assert_eq!(complete.path.first(), Some(&Coord::new(6, 0)));
        assert_eq!(complete.path.last(), Some(&Coord::new(2, 13)));
    }

    #[test]
    fn completion_direction_fixes_the_driving_start() {
        let mut board = board_with_line1_corridor();
        board
            .register_stop_sign(Building::A, Coord::new(6, 10))
            .unwrap();

        // The forward sequence is tried first, so terminal A of the line
        // becomes the driving start whenever it connects.
        let complete = check_route_completion(&board, Line::Line1, &[Building::A]).unwrap();
        assert_eq!(complete.start_terminal, Coord::new(6, 0));
        assert_eq!(complete.end_terminal, Coord::new(2, 13));
    }

    #[test]
    fn incomplete_when_track_is_broken() {
        let mut board = Board::new();
        lay_corridor(&mut board, 6, 1..=5);
        // Gap at (6, 6); the rest of the corridor resumes east of it.
        lay_corridor(&mut board, 6, 7..=12);

        assert_eq!(check_route_completion(&board, Line::Line1, &[]), None);
    }

    // Tests for `ideal_route`.

    #[test]
    fn ideal_route_crosses_empty_ground() {
        let board = Board::new();
        let (terminal_a, terminal_b) = board.terminal_coords(Line::Line1);

        let (path, moves) = ideal_route(&board, &[terminal_a, terminal_b]).unwrap();
        assert_eq!(path.first(), Some(&terminal_a));
        assert_eq!(path.last(), Some(&terminal_b));
        // (6,0) to (2,13): at least the Manhattan distance.
        assert!(moves >= 17);
    }

    #[test]
    fn ideal_route_reuses_compatible_tiles() {
        let mut board = Board::new();
        lay_corridor(&mut board, 6, 1..=12);

        let from = Coord::new(6, 1);
        let to = Coord::new(6, 12);
        let (path, moves) = ideal_route(&board, &[from, to]).unwrap();
        assert_eq!(moves, 11);
        assert_eq!(path.len(), 12);
    }

    #[test]
    fn ideal_route_cannot_cross_an_incompatible_tile() {
        let mut board = Board::new();
        // A wall of N-S straights across row 6, columns 2..=10: N-S tiles
        // cannot carry E-W through traffic, so travelling east along row 6
        // must detour around the wall.
        for col in 2..=10 {
            lay(&mut board, 6, col, TileKind::Straight, Orientation::Deg0);
        }
        lay(&mut board, 6, 1, TileKind::Straight, Orientation::Deg90);
        lay(&mut board, 6, 12, TileKind::Straight, Orientation::Deg90);

        let (path, moves) = ideal_route(&board, &[Coord::new(6, 1), Coord::new(6, 12)]).unwrap();
        // The straight-line distance is 11; the detour must be longer.
        assert!(moves > 11, "Path {path:?} should detour around the wall");
    }

    #[test]
    fn ideal_route_cannot_cross_buildings() {
        let board = Board::new();
        // Building M sits at (4, 6). A route from (4, 5) to (4, 7) must go
        // around it.
        let mut board = board;
        lay(&mut board, 4, 5, TileKind::Straight, Orientation::Deg90);
        lay(&mut board, 4, 7, TileKind::Straight, Orientation::Deg90);

        let (path, moves) = ideal_route(&board, &[Coord::new(4, 5), Coord::new(4, 7)]).unwrap();
        assert!(moves > 2);
        assert!(!path.contains(&Coord::new(4, 6)));
    }

    #[test]
    fn ideal_route_visits_waypoints_in_order() {
        let board = Board::new();
        let (terminal_a, terminal_b) = board.terminal_coords(Line::Line1);
        let stop = Coord::new(9, 6);

        let mut board = board;
        lay(&mut board, 9, 6, TileKind::Straight, Orientation::Deg90);

        let (path, _) = ideal_route(&board, &[terminal_a, stop, terminal_b]).unwrap();
        let stop_at = path.iter().position(|&c| c == stop).unwrap();
        assert!(stop_at > 0 && stop_at < path.len() - 1);
    }
}
