use crate::board::{Board, Coord, PlacedTile};
use crate::path::ideal_route;
use crate::player::Player;
use crate::rules::{
    check_exchange, check_placement_among, commit_exchange, commit_placement,
};
use crate::tile::{effective_connections, Direction, Orientation, TileKind};

use serde::Serialize;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use strum::IntoEnumIterator;
use thiserror::Error;

// How many target squares the combinatorial fallback will consider. The
// pair search is quadratic in this, never in hand × board × orientations.
const MAX_SHORTLIST: usize = 10;

/// One of the two actions a laying-track player spends each turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Place {
        kind: TileKind,
        orientation: Orientation,
        coord: Coord,
    },
    Exchange {
        kind: TileKind,
        orientation: Orientation,
        coord: Coord,
    },
}

impl Action {
    #[inline]
    pub fn coord(&self) -> Coord {
        match self {
            Action::Place { coord, .. } | Action::Exchange { coord, .. } => *coord,
        }
    }

    #[inline]
    pub fn kind(&self) -> TileKind {
        match self {
            Action::Place { kind, .. } | Action::Exchange { kind, .. } => *kind,
        }
    }

    #[inline]
    pub fn orientation(&self) -> Orientation {
        match self {
            Action::Place { orientation, .. } | Action::Exchange { orientation, .. } => {
                *orientation
            }
        }
    }
}

/// The additive parts of a candidate's score. Zero means the part did not
/// apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Flat credit for any legal move, so a legal pool is never empty.
    pub base: f64,
    /// Weight for sitting on the ideal route, fading with distance from
    /// its start.
    pub ideal_route: f64,
    /// Bonus for a placement that would earn a still-missing stop sign.
    pub stop_creation: f64,
    /// Bonus per adjacent laid tile.
    pub adjacency: f64,
    /// Small nudge for exchanges.
    pub exchange: f64,
    /// Joint value of a combinatorial pair.
    pub joint: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.base + self.ideal_route + self.stop_creation + self.adjacency + self.exchange
            + self.joint
    }
}

/// What became of a scored candidate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Part of the final plan.
    Chosen,
    /// Legal, but a better candidate won.
    NotChosen,
    /// Legal against the original board, but no longer once the first
    /// action was applied.
    RejectedOnRevalidation,
}

/// One scored entry of the planner's candidate pool, kept for
/// observability and test replay.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Candidate {
    pub action: Action,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub outcome: CandidateOutcome,
}

/// The planner's answer for one turn: exactly two actions, plus the
/// ordered trace of everything it considered.
#[derive(Clone, Debug, Serialize)]
pub struct TurnPlan {
    pub actions: SmallVec<[Action; 2]>,
    /// True when the two actions were found by the pair search and must be
    /// committed together.
    pub joint: bool,
    pub trace: Vec<Candidate>,
}

/// The player cannot fill both mandatory actions; the game must eliminate
/// them rather than let the turn pass.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("No pair of legal actions is available.")]
pub struct PlannerExhaustion;

/// Whether the player has at least one legal placement or exchange.
/// Used before eliminating a human player who claims to be stuck.
pub fn has_any_legal_move(board: &Board, player: &Player, streetcars: &[Coord]) -> bool {
    let kinds: BTreeSet<TileKind> = player.hand().iter().copied().collect();
    for coord in board.playable_coords() {
        let occupied = board.tile(coord).is_some();
        for &kind in &kinds {
            for orientation in Orientation::iter() {
                let legal = if occupied {
                    check_exchange(board, player.hand(), kind, orientation, coord, streetcars)
                        .is_ok()
                } else {
                    check_placement_among(board, &[], kind, orientation, coord).is_ok()
                };
                if legal {
                    return true;
                }
            }
        }
    }
    false
}

/// Plans a full turn for the given player: two actions, or
/// [`PlannerExhaustion`] when the board offers no way to spend both.
///
/// The plan is recomputed from scratch; nothing is carried over from
/// previous turns. Candidates come only from the validators; scoring picks
/// among legal moves, never the other way around. The second action is
/// re-validated against the board as it will look after the first, since
/// the two are committed sequentially. With `hard` set, a bounded
/// combinatorial pair search over high-value squares runs before giving
/// up.
pub fn plan_turn(
    board: &Board,
    player: &Player,
    streetcars: &[Coord],
    hard: bool,
) -> Result<TurnPlan, PlannerExhaustion> {
    let ideal = plan_ideal_route(board, player);
    let ideal_path = ideal.as_deref();

    let mut trace = enumerate_candidates(board, player, streetcars, ideal_path);
    trace.sort_by(compare_candidates);

    // Greedy selection with sequential re-validation on a scratch board.
    let mut sim_board = board.clone();
    let mut sim_hand = player.hand().to_vec();
    let mut actions: SmallVec<[Action; 2]> = SmallVec::new();
    for candidate in trace.iter_mut() {
        if actions.len() == 2 {
            break;
        }
        if apply_candidate(&mut sim_board, &mut sim_hand, candidate.action, streetcars) {
            candidate.outcome = CandidateOutcome::Chosen;
            actions.push(candidate.action);
        } else {
            candidate.outcome = CandidateOutcome::RejectedOnRevalidation;
        }
    }

    if actions.len() == 2 {
        return Ok(TurnPlan {
            actions,
            joint: false,
            trace,
        });
    }

    if hard {
        if let Some((pair, breakdown)) = combinatorial_pair(board, player, ideal_path) {
            // The greedy picks are superseded by the pair.
            for candidate in trace.iter_mut() {
                if candidate.outcome == CandidateOutcome::Chosen {
                    candidate.outcome = CandidateOutcome::NotChosen;
                }
            }
            trace.extend(pair.iter().map(|action| Candidate {
                action: *action,
                score: breakdown.total(),
                breakdown,
                outcome: CandidateOutcome::Chosen,
            }));
            return Ok(TurnPlan {
                actions: SmallVec::from_slice(&pair),
                joint: true,
                trace,
            });
        }
    }

    Err(PlannerExhaustion)
}

// The hypothetical best-case route for the player's cards: terminals of
// their line through their stops, in card order, in whichever direction is
// shorter (forward wins ties). None until every required stop has a
// registered sign, or when even a hypothetical path is blocked.
fn plan_ideal_route(board: &Board, player: &Player) -> Option<Vec<Coord>> {
    let line = player.line()?;
    let (terminal_a, terminal_b) = board.terminal_coords(line);

    let mut stops: SmallVec<[Coord; 3]> = SmallVec::new();
    for building in player.stops() {
        stops.push(board.stop_sign(*building)?);
    }

    let mut forward = Vec::with_capacity(stops.len() + 2);
    forward.push(terminal_a);
    forward.extend_from_slice(&stops);
    forward.push(terminal_b);

    let mut reversed = Vec::with_capacity(stops.len() + 2);
    reversed.push(terminal_b);
    reversed.extend_from_slice(&stops);
    reversed.push(terminal_a);

    match (ideal_route(board, &forward), ideal_route(board, &reversed)) {
        (Some((path, cost)), Some((reversed_path, reversed_cost))) => {
            if cost <= reversed_cost {
                Some(path)
            } else {
                Some(reversed_path)
            }
        }
        (Some((path, _)), None) | (None, Some((path, _))) => Some(path),
        (None, None) => None,
    }
}

// Every legal single move: hand × empty playable squares × orientations
// for placements, hand × laid tiles × orientations for exchanges. Only
// candidates a validator passed enter the pool.
fn enumerate_candidates(
    board: &Board,
    player: &Player,
    streetcars: &[Coord],
    ideal: Option<&[Coord]>,
) -> Vec<Candidate> {
    let kinds: BTreeSet<TileKind> = player.hand().iter().copied().collect();
    let mut pool = Vec::new();

    for coord in board.playable_coords() {
        let occupied = board.tile(coord).is_some();
        for &kind in &kinds {
            for orientation in Orientation::iter() {
                let action = if occupied {
                    if check_exchange(board, player.hand(), kind, orientation, coord, streetcars)
                        .is_err()
                    {
                        continue;
                    }
                    Action::Exchange {
                        kind,
                        orientation,
                        coord,
                    }
                } else {
                    if check_placement_among(board, &[], kind, orientation, coord).is_err() {
                        continue;
                    }
                    Action::Place {
                        kind,
                        orientation,
                        coord,
                    }
                };
                let breakdown = score_action(board, player, ideal, action);
                pool.push(Candidate {
                    action,
                    score: breakdown.total(),
                    breakdown,
                    outcome: CandidateOutcome::NotChosen,
                });
            }
        }
    }

    pool
}

fn score_action(
    board: &Board,
    player: &Player,
    ideal: Option<&[Coord]>,
    action: Action,
) -> ScoreBreakdown {
    let coord = action.coord();
    let mut breakdown = ScoreBreakdown {
        base: 1.0,
        ..ScoreBreakdown::default()
    };

    if let Some(route) = ideal {
        if let Some(position) = route.iter().position(|&cell| cell == coord) {
            breakdown.ideal_route = 100.0 - 2.0 * position as f64;
        }
    }

    if let Action::Place {
        kind, orientation, ..
    } = action
    {
        if would_assign_missing_stop(board, player, kind, orientation, coord) {
            breakdown.stop_creation = 50.0;
        }
    }

    let adjacent_tiles = Direction::iter()
        .filter(|direction| {
            coord
                .neighbor(*direction)
                .map(|neighbor| board.tile(neighbor).is_some())
                .unwrap_or(false)
        })
        .count();
    breakdown.adjacency = 10.0 * adjacent_tiles as f64;

    if matches!(action, Action::Exchange { .. }) {
        breakdown.exchange = 5.0;
    }

    breakdown
}

// Whether laying this tile here would earn a stop sign for one of the
// player's own still-unserved buildings.
fn would_assign_missing_stop(
    board: &Board,
    player: &Player,
    kind: TileKind,
    orientation: Orientation,
    coord: Coord,
) -> bool {
    let connections = effective_connections(kind, orientation);
    Direction::iter().any(|direction| {
        let building = coord
            .neighbor(direction)
            .and_then(|neighbor| board.building_at(neighbor));
        let building = match building {
            Some(building) => building,
            None => return false,
        };
        if !player.stops().contains(&building) || board.stop_sign(building).is_some() {
            return false;
        }
        match direction {
            Direction::North | Direction::South => connections.has_east_west(),
            Direction::East | Direction::West => connections.has_north_south(),
        }
    })
}

// Score first, descending; ties break by lowest coordinate, then lowest
// orientation, then kind, so runs are reproducible.
fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.action.coord().cmp(&b.action.coord()))
        .then_with(|| a.action.orientation().cmp(&b.action.orientation()))
        .then_with(|| a.action.kind().cmp(&b.action.kind()))
}

// Commits a candidate onto the scratch state, re-validating on the way.
fn apply_candidate(
    board: &mut Board,
    hand: &mut Vec<TileKind>,
    action: Action,
    streetcars: &[Coord],
) -> bool {
    match action {
        Action::Place {
            kind,
            orientation,
            coord,
        } => commit_placement(board, hand, kind, orientation, coord).is_ok(),
        Action::Exchange {
            kind,
            orientation,
            coord,
        } => commit_exchange(board, hand, kind, orientation, coord, streetcars).is_ok(),
    }
}

// The bounded pair search: placements on pairs of shortlisted squares,
// each validated with the other treated as already laid. Finds plays the
// greedy pass cannot, at a cost capped by the shortlist size squared.
fn combinatorial_pair(
    board: &Board,
    player: &Player,
    ideal: Option<&[Coord]>,
) -> Option<([Action; 2], ScoreBreakdown)> {
    let mut shortlist: Vec<Coord> = Vec::new();
    if let Some(route) = ideal {
        shortlist.extend(route.iter().copied().filter(|coord| board.is_free(*coord)));
    }
    for building in player.stops() {
        if board.stop_sign(*building).is_some() {
            continue;
        }
        let building_coord = board.building_coord(*building);
        for direction in Direction::iter() {
            if let Some(neighbor) = building_coord.neighbor(direction) {
                if board.is_free(neighbor) {
                    shortlist.push(neighbor);
                }
            }
        }
    }
    shortlist.sort();
    shortlist.dedup();
    shortlist.truncate(MAX_SHORTLIST);

    // Unique ordered kind pairs the hand can actually supply.
    let mut kind_pairs: BTreeSet<(TileKind, TileKind)> = BTreeSet::new();
    for (i, &first) in player.hand().iter().enumerate() {
        for (j, &second) in player.hand().iter().enumerate() {
            if i != j {
                kind_pairs.insert((first, second));
            }
        }
    }

    let mut best: Option<(f64, [Action; 2])> = None;
    for (i, &first_coord) in shortlist.iter().enumerate() {
        for &second_coord in &shortlist[i + 1..] {
            for &(first_kind, second_kind) in &kind_pairs {
                for first_orientation in Orientation::iter() {
                    for second_orientation in Orientation::iter() {
                        let first_tile = PlacedTile::new(first_kind, first_orientation);
                        let second_tile = PlacedTile::new(second_kind, second_orientation);
                        if check_placement_among(
                            board,
                            &[(second_coord, second_tile)],
                            first_kind,
                            first_orientation,
                            first_coord,
                        )
                        .is_err()
                        {
                            continue;
                        }
                        if check_placement_among(
                            board,
                            &[(first_coord, first_tile)],
                            second_kind,
                            second_orientation,
                            second_coord,
                        )
                        .is_err()
                        {
                            continue;
                        }

                        let score = joint_score(ideal, first_coord, second_coord);
                        let better = best.map(|(best_score, _)| score > best_score).unwrap_or(true);
                        if better {
                            best = Some((
                                score,
                                [
                                    Action::Place {
                                        kind: first_kind,
                                        orientation: first_orientation,
                                        coord: first_coord,
                                    },
                                    Action::Place {
                                        kind: second_kind,
                                        orientation: second_orientation,
                                        coord: second_coord,
                                    },
                                ],
                            ));
                        }
                    }
                }
            }
        }
    }

    best.map(|(score, pair)| {
        let breakdown = ScoreBreakdown {
            base: 1.0,
            joint: score - 1.0,
            ..ScoreBreakdown::default()
        };
        (pair, breakdown)
    })
}

fn joint_score(ideal: Option<&[Coord]>, first: Coord, second: Coord) -> f64 {
    let mut score = 1.0;
    if let Some(route) = ideal {
        score += 100.0
            * route
                .iter()
                .filter(|coord| **coord == first || **coord == second)
                .count() as f64;
    }
    score
}
