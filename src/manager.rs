use crate::board::{Board, Building, Coord, Line};
use crate::card::{deal_cards, starting_hand, TilePile, HAND_TILE_LIMIT};
use crate::driving::{advance, DieFace};
use crate::path::check_route_completion;
use crate::planner::{has_any_legal_move, plan_turn, Action, PlannerExhaustion, TurnPlan};
use crate::player::{DrivingRoute, Player, PlayerState};
use crate::rules::{
    commit_exchange, commit_joint_placements, commit_placement, ExchangeOutcome, InvalidMove,
    InvariantViolation, MoveError, PlacementOutcome,
};
use crate::tile::{Orientation, TileKind};

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

const MIN_PLAYERS: usize = 2;
const MAX_PLAYERS: usize = 6;
/// Actions a laying-track player must spend per turn.
pub const ACTIONS_PER_TURN: usize = 2;
// At most this many tiles are redrawn at the end of a laying turn.
const MAX_REDRAWS_PER_TURN: usize = 2;

/// Phases of the game, which act as states in the game's finite-state
/// machine.
///
/// # JSON
/// Phases are serialized in snake_case.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Before [`Manager::start`]: no piles, no hands, no cards.
    Setup,
    /// The main phase: everyone is still building track.
    LayingTrack,
    /// At least one player has a complete route and is driving.
    Driving,
    /// Somebody won, or everybody is out. No actions can be taken.
    GameOver,
}

/// Everything that can go wrong when poking the game from outside.
#[derive(Debug, Error)]
pub enum GameError {
    #[error(
        "Cannot create a game with {0} players: one must have at least two, and at most six players."
    )]
    PlayerCount(usize),
    #[error("That action is not allowed in the current phase of the game.")]
    WrongPhase,
    #[error("Both actions have already been spent this turn.")]
    NoActionsLeft,
    #[error("The turn cannot end while legal moves are still available.")]
    MovesAvailable,
    #[error(transparent)]
    Invalid(#[from] InvalidMove),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl From<MoveError> for GameError {
    fn from(error: MoveError) -> Self {
        match error {
            MoveError::Invalid(invalid) => GameError::Invalid(invalid),
            MoveError::Invariant(violation) => GameError::Invariant(violation),
        }
    }
}

/// The secret cards revealed when a player's route first completes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RouteReveal {
    pub line: Line,
    pub stops: Vec<Building>,
    /// The terminal the streetcar will depart from, fixed by the direction
    /// in which the route connected.
    pub start_terminal: Coord,
}

/// What the start-of-turn check found for the active player.
#[derive(Clone, Debug, Serialize)]
pub struct TurnStart {
    pub player: usize,
    pub route_complete: bool,
    /// Populated exactly once, on the turn the route first completes.
    pub revealed: Option<RouteReveal>,
}

/// One die-driven move of a driving player.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct DriveReport {
    pub player: usize,
    pub face: DieFace,
    pub from: Coord,
    pub to: Coord,
    pub finished: bool,
}

/// What happened during one AI-played turn.
#[derive(Debug, Serialize)]
pub enum TurnEvent {
    /// Two build actions were committed; the full plan is attached.
    Laid(TurnPlan),
    Drove(DriveReport),
    /// The player could not fill both actions and left the game.
    Eliminated,
}

/// The start-of-turn findings plus the turn's event, for observers.
#[derive(Debug, Serialize)]
pub struct TurnReport {
    pub start: TurnStart,
    pub event: TurnEvent,
}

/// In charge of holding all the state of the game, sequencing turns, and
/// transitioning players between laying track, driving, and being out.
///
/// This overall acts as a finite-state machine. The board and the hands
/// are only ever mutated after a validator has accepted the move.
pub struct Manager {
    phase: GamePhase,
    /// Incremented every time a player finishes their turn.
    turn: usize,
    board: Board,
    pile: TilePile,
    players: Vec<Player>,
    active: usize,
    actions_taken: usize,
    winner: Option<usize>,
}

impl Manager {
    /// Creates a game in [`GamePhase::Setup`].
    ///
    /// Succeeds if the given number of players is allowed (i.e. between
    /// two and six, inclusively). Otherwise, returns an error.
    ///
    /// # Example
    /// ```
    /// use streetcar::manager::Manager;
    ///
    /// assert!(Manager::new(4).is_ok());
    /// assert!(Manager::new(1).is_err());
    /// assert!(Manager::new(7).is_err());
    /// ```
    pub fn new(num_players: usize) -> Result<Self, GameError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&num_players) {
            return Err(GameError::PlayerCount(num_players));
        }
        Ok(Self {
            phase: GamePhase::Setup,
            turn: 0,
            board: Board::new(),
            pile: TilePile::from_tiles(Vec::new()),
            players: (0..num_players).map(Player::new).collect(),
            active: 0,
            actions_taken: 0,
            winner: None,
        })
    }

    /// Builds and shuffles the tile pile, deals the starting hands and the
    /// secret line/route cards, and opens the game.
    pub fn start(&mut self, rng: &mut impl Rng) -> Result<(), GameError> {
        if self.phase != GamePhase::Setup {
            return Err(GameError::WrongPhase);
        }

        self.pile = TilePile::shuffled(self.players.len(), rng);
        for player in self.players.iter_mut() {
            for kind in starting_hand() {
                let tile = self
                    .pile
                    .take_kind(kind)
                    .expect("the pile always covers the starting hands");
                player.hand_mut().push(tile);
            }
        }

        let cards = deal_cards(self.players.len(), rng);
        for (player, (line_card, route_card)) in self.players.iter_mut().zip(cards) {
            player.deal(line_card, route_card);
        }

        self.phase = GamePhase::LayingTrack;
        self.active = 0;
        self.turn = 0;
        self.actions_taken = 0;
        Ok(())
    }

    #[inline]
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    #[inline]
    pub fn turn(&self) -> usize {
        self.turn
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    #[inline]
    pub fn active_player(&self) -> &Player {
        &self.players[self.active]
    }

    /// The winning player, once the game is over. `None` after a draw.
    #[inline]
    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    // The cells currently occupied by streetcars. Any of them blocks an
    // exchange, the active player's own car included.
    fn streetcar_positions(&self) -> Vec<Coord> {
        self.players
            .iter()
            .filter_map(|player| player.position())
            .collect()
    }

    /// Opens the active player's turn.
    ///
    /// For a laying-track player this runs the route-completion check; on
    /// first completion the player's cards are revealed, the streetcar is
    /// placed on the winning direction's start terminal, and the player
    /// switches to driving.
    pub fn begin_turn(&mut self) -> Result<TurnStart, GameError> {
        if matches!(self.phase, GamePhase::Setup | GamePhase::GameOver) {
            return Err(GameError::WrongPhase);
        }
        self.actions_taken = 0;

        let active = self.active;
        let player = &self.players[active];
        if player.state() == PlayerState::LayingTrack {
            if let Some(line) = player.line() {
                if let Some(complete) = check_route_completion(&self.board, line, player.stops())
                {
                    let revealed = RouteReveal {
                        line,
                        stops: player.stops().to_vec(),
                        start_terminal: complete.start_terminal,
                    };
                    let player = &mut self.players[active];
                    player.set_route(DrivingRoute {
                        start_terminal: complete.start_terminal,
                        path: complete.path,
                        index: 0,
                    });
                    player.set_state(PlayerState::Driving);
                    if self.phase == GamePhase::LayingTrack {
                        self.phase = GamePhase::Driving;
                    }
                    return Ok(TurnStart {
                        player: active,
                        route_complete: true,
                        revealed: Some(revealed),
                    });
                }
            }
            return Ok(TurnStart {
                player: active,
                route_complete: false,
                revealed: None,
            });
        }

        Ok(TurnStart {
            player: active,
            route_complete: player.state() == PlayerState::Driving,
            revealed: None,
        })
    }

    fn ensure_can_lay(&self) -> Result<(), GameError> {
        if matches!(self.phase, GamePhase::Setup | GamePhase::GameOver) {
            return Err(GameError::WrongPhase);
        }
        if self.players[self.active].state() != PlayerState::LayingTrack {
            return Err(GameError::WrongPhase);
        }
        if self.actions_taken >= ACTIONS_PER_TURN {
            return Err(GameError::NoActionsLeft);
        }
        Ok(())
    }

    /// One of the active player's two actions: lay a hand tile on an empty
    /// square. On success the board delta is returned.
    pub fn attempt_place(
        &mut self,
        kind: TileKind,
        orientation: Orientation,
        coord: Coord,
    ) -> Result<PlacementOutcome, GameError> {
        self.ensure_can_lay()?;
        let active = self.active;
        let outcome = commit_placement(
            &mut self.board,
            self.players[active].hand_mut(),
            kind,
            orientation,
            coord,
        )
        .map_err(GameError::from)?;
        self.actions_taken += 1;
        Ok(outcome)
    }

    /// One of the active player's two actions: replace a laid tile with a
    /// hand tile. The old tile goes back to the hand.
    pub fn attempt_exchange(
        &mut self,
        kind: TileKind,
        orientation: Orientation,
        coord: Coord,
    ) -> Result<ExchangeOutcome, GameError> {
        self.ensure_can_lay()?;
        let streetcars = self.streetcar_positions();
        let active = self.active;
        let outcome = commit_exchange(
            &mut self.board,
            self.players[active].hand_mut(),
            kind,
            orientation,
            coord,
            &streetcars,
        )
        .map_err(GameError::from)?;
        self.actions_taken += 1;
        Ok(outcome)
    }

    /// Moves the active driving player for one die roll. Reaching the end
    /// terminal wins the game immediately.
    pub fn drive(&mut self, face: DieFace) -> Result<DriveReport, GameError> {
        if matches!(self.phase, GamePhase::Setup | GamePhase::GameOver) {
            return Err(GameError::WrongPhase);
        }
        let active = self.active;
        if self.players[active].state() != PlayerState::Driving {
            return Err(GameError::WrongPhase);
        }
        if self.actions_taken > 0 {
            return Err(GameError::NoActionsLeft);
        }
        let route = match self.players[active].route() {
            Some(route) => route,
            None => return Err(GameError::WrongPhase),
        };

        let from = route.position();
        let index = advance(&self.board, route, face);
        let route = self
            .players[active]
            .route_mut()
            .expect("the driving player keeps their route");
        route.index = index;
        let to = route.position();
        let finished = route.at_end();

        // A driving turn is the whole turn.
        self.actions_taken = ACTIONS_PER_TURN;

        if finished {
            self.players[active].set_state(PlayerState::Finished);
            self.winner = Some(active);
            self.phase = GamePhase::GameOver;
        }

        Ok(DriveReport {
            player: active,
            face,
            from,
            to,
            finished,
        })
    }

    /// Rolls the special die and moves the active driving player.
    pub fn roll_and_drive(&mut self, rng: &mut impl Rng) -> Result<DriveReport, GameError> {
        let face = DieFace::roll(rng);
        self.drive(face)
    }

    /// Closes the active player's turn: redraws their hand up to five
    /// tiles (at most two draws), then advances to the next player still
    /// in the game.
    ///
    /// A laying-track player who has actions left may only end the turn if
    /// they genuinely have no legal move, in which case they are
    /// eliminated rather than allowed to pass.
    pub fn end_turn(&mut self) -> Result<(), GameError> {
        if matches!(self.phase, GamePhase::Setup | GamePhase::GameOver) {
            return Err(GameError::WrongPhase);
        }
        let active = self.active;
        match self.players[active].state() {
            PlayerState::LayingTrack => {
                if self.actions_taken < ACTIONS_PER_TURN {
                    let streetcars = self.streetcar_positions();
                    if has_any_legal_move(&self.board, &self.players[active], &streetcars) {
                        return Err(GameError::MovesAvailable);
                    }
                    self.eliminate(active);
                    if self.phase == GamePhase::GameOver {
                        return Ok(());
                    }
                } else {
                    self.redraw(active);
                }
            }
            PlayerState::Driving => {
                if self.actions_taken < ACTIONS_PER_TURN {
                    return Err(GameError::MovesAvailable);
                }
            }
            _ => return Err(GameError::WrongPhase),
        }

        self.advance_active();
        Ok(())
    }

    /// Plays the active player's whole turn with the built-in planner (or
    /// the die, for a driving player). `hard` enables the combinatorial
    /// pair search.
    pub fn play_ai_turn(
        &mut self,
        hard: bool,
        rng: &mut impl Rng,
    ) -> Result<TurnReport, GameError> {
        let start = self.begin_turn()?;
        let active = self.active;

        match self.players[active].state() {
            PlayerState::Driving => {
                let report = self.roll_and_drive(rng)?;
                if self.phase != GamePhase::GameOver {
                    self.end_turn()?;
                }
                Ok(TurnReport {
                    start,
                    event: TurnEvent::Drove(report),
                })
            }
            PlayerState::LayingTrack => {
                let streetcars = self.streetcar_positions();
                match plan_turn(&self.board, &self.players[active], &streetcars, hard) {
                    Ok(plan) => {
                        self.commit_plan(active, &plan)?;
                        self.end_turn()?;
                        Ok(TurnReport {
                            start,
                            event: TurnEvent::Laid(plan),
                        })
                    }
                    Err(PlannerExhaustion) => {
                        self.eliminate(active);
                        if self.phase != GamePhase::GameOver {
                            self.advance_active();
                        }
                        Ok(TurnReport {
                            start,
                            event: TurnEvent::Eliminated,
                        })
                    }
                }
            }
            _ => Err(GameError::WrongPhase),
        }
    }

    fn commit_plan(&mut self, active: usize, plan: &TurnPlan) -> Result<(), GameError> {
        if plan.joint {
            match (plan.actions[0], plan.actions[1]) {
                (
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
                ) => {
                    commit_joint_placements(
                        &mut self.board,
                        self.players[active].hand_mut(),
                        (first_kind, first_orientation, first_coord),
                        (second_kind, second_orientation, second_coord),
                    )
                    .map_err(GameError::from)?;
                    self.actions_taken = ACTIONS_PER_TURN;
                }
                _ => unreachable!("the pair search only emits placements"),
            }
            return Ok(());
        }

        for action in &plan.actions {
            match *action {
                Action::Place {
                    kind,
                    orientation,
                    coord,
                } => {
                    self.attempt_place(kind, orientation, coord)?;
                }
                Action::Exchange {
                    kind,
                    orientation,
                    coord,
                } => {
                    self.attempt_exchange(kind, orientation, coord)?;
                }
            }
        }
        Ok(())
    }

    fn redraw(&mut self, index: usize) {
        let held = self.players[index].hand().len();
        let needed = HAND_TILE_LIMIT.saturating_sub(held).min(MAX_REDRAWS_PER_TURN);
        for _ in 0..needed {
            match self.pile.draw() {
                Some(tile) => self.players[index].hand_mut().push(tile),
                None => break,
            }
        }
    }

    // Removes a player from the game, returns their hand to the pile, and
    // settles the last-player-standing outcomes.
    fn eliminate(&mut self, index: usize) {
        let surrendered = self.players[index].surrender_hand();
        self.pile.return_tiles(surrendered);
        self.players[index].set_state(PlayerState::Eliminated);

        let alive: Vec<usize> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, player)| {
                matches!(
                    player.state(),
                    PlayerState::LayingTrack | PlayerState::Driving
                )
            })
            .map(|(id, _)| id)
            .collect();

        match alive.as_slice() {
            [] => {
                // Everybody is out: a draw.
                self.phase = GamePhase::GameOver;
            }
            [last] => {
                // A sole survivor wins by default only if already driving.
                // One still laying track goes out with everyone else and
                // the game is a draw.
                if self.players[*last].state() == PlayerState::Driving {
                    self.players[*last].set_state(PlayerState::Finished);
                    self.winner = Some(*last);
                } else {
                    self.players[*last].set_state(PlayerState::Eliminated);
                }
                self.phase = GamePhase::GameOver;
            }
            _ => {}
        }
    }

    // Advances to the next player who is still in the game. An explicit
    // bounded loop: elimination cascades never recurse.
    fn advance_active(&mut self) {
        self.turn += 1;
        self.actions_taken = 0;
        let num_players = self.players.len();
        for step in 1..=num_players {
            let candidate = (self.active + step) % num_players;
            if matches!(
                self.players[candidate].state(),
                PlayerState::LayingTrack | PlayerState::Driving
            ) {
                self.active = candidate;
                return;
            }
        }
        // Nobody is left to play; elimination has already closed the game.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PlacedTile;
    use crate::card::{LineCard, RouteCard};
    use crate::tile::{Orientation, TileKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use smallvec::smallvec;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn started(num_players: usize) -> Manager {
        let mut manager = Manager::new(num_players).unwrap();
        manager.start(&mut rng()).unwrap();
        manager
    }

    // Rewires player 0 to line 1 with no required stops, and lays a track
    // joining line 1's two terminals.
    fn rig_completed_route(manager: &mut Manager) {
        manager.players[0].deal(
            LineCard { line: Line::Line1 },
            RouteCard { stops: smallvec![] },
        );
        for col in 1..=11 {
            manager.board.set_tile(
                Coord::new(6, col),
                PlacedTile::new(TileKind::Straight, Orientation::Deg90),
            );
        }
        manager.board.set_tile(
            Coord::new(6, 12),
            PlacedTile::new(TileKind::TreeJunctionTop, Orientation::Deg0),
        );
        manager.board.set_tile(
            Coord::new(5, 12),
            PlacedTile::new(TileKind::Straight, Orientation::Deg0),
        );
        manager.board.set_tile(
            Coord::new(4, 12),
            PlacedTile::new(TileKind::Straight, Orientation::Deg0),
        );
        manager.board.set_tile(
            Coord::new(3, 12),
            PlacedTile::new(TileKind::Curve, Orientation::Deg90),
        );
    }

    #[test]
    fn new_manager_player_counts() {
        for num_players in 0..=8 {
            if (2..=6).contains(&num_players) {
                assert!(
                    Manager::new(num_players).is_ok(),
                    "Fails with num_players={num_players}"
                );
            } else {
                assert!(
                    Manager::new(num_players).is_err(),
                    "Fails with num_players={num_players}"
                );
            }
        }
    }

    #[test]
    fn start_deals_hands_and_cards() {
        let manager = started(3);

        assert_eq!(manager.phase(), GamePhase::LayingTrack);
        for player in manager.players() {
            assert_eq!(player.hand().len(), HAND_TILE_LIMIT);
            assert_eq!(
                player
                    .hand()
                    .iter()
                    .filter(|kind| **kind == TileKind::Straight)
                    .count(),
                3
            );
            assert_eq!(
                player
                    .hand()
                    .iter()
                    .filter(|kind| **kind == TileKind::Curve)
                    .count(),
                2
            );
            assert!(player.line().is_some());
            assert_eq!(player.stops().len(), 2);
        }

        // 101 tiles, minus three starting hands.
        assert_eq!(manager.pile.len(), 101 - 3 * HAND_TILE_LIMIT);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut manager = started(2);
        assert!(matches!(
            manager.start(&mut rng()),
            Err(GameError::WrongPhase)
        ));
    }

    #[test]
    fn actions_before_start_are_rejected() {
        let mut manager = Manager::new(2).unwrap();

        assert!(matches!(manager.begin_turn(), Err(GameError::WrongPhase)));
        assert!(matches!(
            manager.attempt_place(TileKind::Straight, Orientation::Deg0, Coord::new(6, 6)),
            Err(GameError::WrongPhase)
        ));
        assert!(matches!(manager.end_turn(), Err(GameError::WrongPhase)));
    }

    #[test]
    fn a_full_laying_turn() {
        let mut manager = started(2);

        let start = manager.begin_turn().unwrap();
        assert_eq!(start.player, 0);
        assert!(!start.route_complete);

        manager
            .attempt_place(TileKind::Straight, Orientation::Deg90, Coord::new(6, 6))
            .unwrap();
        manager
            .attempt_place(TileKind::Straight, Orientation::Deg90, Coord::new(6, 7))
            .unwrap();

        // The two actions are spent.
        assert!(matches!(
            manager.attempt_place(TileKind::Straight, Orientation::Deg90, Coord::new(6, 9)),
            Err(GameError::NoActionsLeft)
        ));

        manager.end_turn().unwrap();
        assert_eq!(manager.active_player().id(), 1);
        assert_eq!(manager.turn(), 1);
        // The hand was refilled.
        assert_eq!(manager.players()[0].hand().len(), HAND_TILE_LIMIT);
    }

    #[test]
    fn ending_a_turn_with_moves_left_is_refused() {
        let mut manager = started(2);
        manager.begin_turn().unwrap();

        assert!(matches!(manager.end_turn(), Err(GameError::MovesAvailable)));
    }

    #[test]
    fn rejected_moves_do_not_spend_actions() {
        let mut manager = started(2);
        manager.begin_turn().unwrap();

        // Building M's cell is never placeable.
        let result =
            manager.attempt_place(TileKind::Straight, Orientation::Deg0, Coord::new(4, 6));
        assert!(matches!(result, Err(GameError::Invalid(_))));
        assert_eq!(manager.actions_taken, 0);
        assert_eq!(manager.players()[0].hand().len(), HAND_TILE_LIMIT);
    }

    #[test]
    fn ai_plays_full_turns() {
        let mut manager = started(2);
        let mut rng = rng();

        for _ in 0..6 {
            let report = manager.play_ai_turn(false, &mut rng).unwrap();
            match report.event {
                TurnEvent::Laid(plan) => assert_eq!(plan.actions.len(), 2),
                event => panic!("Unexpected event {event:?}"),
            }
        }

        // Three turns each, hands always refilled to five.
        assert_eq!(manager.turn(), 6);
        for player in manager.players() {
            assert_eq!(player.hand().len(), HAND_TILE_LIMIT);
        }
        // The first two turns are guaranteed placements (the starting
        // hands offer nothing exchange-worthy); later turns may spend
        // actions on exchanges instead.
        let laid = manager
            .board()
            .occupied_coords()
            .filter(|coord| coord.is_playable())
            .count();
        assert!(laid >= 4, "Only {laid} tiles laid");
    }

    #[test]
    fn route_completion_switches_to_driving() {
        let mut manager = started(2);
        rig_completed_route(&mut manager);

        let start = manager.begin_turn().unwrap();
        assert!(start.route_complete);
        let revealed = start.revealed.unwrap();
        assert_eq!(revealed.line, Line::Line1);
        assert_eq!(revealed.start_terminal, Coord::new(6, 0));

        assert_eq!(manager.players()[0].state(), PlayerState::Driving);
        assert_eq!(manager.phase(), GamePhase::Driving);
        assert_eq!(manager.players()[0].position(), Some(Coord::new(6, 0)));
    }

    #[test]
    fn driving_to_the_end_wins_the_game() {
        let mut manager = started(2);
        rig_completed_route(&mut manager);
        let mut rng = rng();

        let mut guard = 0;
        while manager.phase() != GamePhase::GameOver {
            guard += 1;
            assert!(guard < 100, "The game must finish");

            if manager.active_player().state() == PlayerState::Driving {
                manager.begin_turn().unwrap();
                manager.drive(DieFace::Four).unwrap();
                if manager.phase() != GamePhase::GameOver {
                    manager.end_turn().unwrap();
                }
            } else {
                manager.play_ai_turn(false, &mut rng).unwrap();
            }
        }

        assert_eq!(manager.winner(), Some(0));
        assert_eq!(manager.players()[0].state(), PlayerState::Finished);
        // The winner stands on the far terminal.
        assert_eq!(manager.players()[0].position(), Some(Coord::new(2, 13)));
    }

    #[test]
    fn drive_requires_a_driving_player() {
        let mut manager = started(2);
        manager.begin_turn().unwrap();

        assert!(matches!(
            manager.drive(DieFace::One),
            Err(GameError::WrongPhase)
        ));
    }

    #[test]
    fn stuck_player_is_eliminated_not_passed() {
        let mut manager = started(2);
        manager.begin_turn().unwrap();

        // Strip player 0's hand: no tiles, no moves.
        let stripped = manager.players[0].surrender_hand();
        manager.pile.return_tiles(stripped);

        manager.end_turn().unwrap();
        assert_eq!(manager.players()[0].state(), PlayerState::Eliminated);
        // The sole survivor was still laying track: the game is a draw
        // and they go out too.
        assert_eq!(manager.players()[1].state(), PlayerState::Eliminated);
        assert_eq!(manager.phase(), GamePhase::GameOver);
        assert_eq!(manager.winner(), None);
    }

    #[test]
    fn last_survivor_wins_only_if_driving() {
        let mut manager = started(3);
        rig_completed_route(&mut manager);
        // Player 0 starts driving.
        manager.begin_turn().unwrap();
        assert_eq!(manager.players()[0].state(), PlayerState::Driving);

        // The other two players drop out.
        manager.eliminate(1);
        assert_eq!(manager.phase(), GamePhase::Driving);
        manager.eliminate(2);

        assert_eq!(manager.phase(), GamePhase::GameOver);
        assert_eq!(manager.winner(), Some(0));
        assert_eq!(manager.players()[0].state(), PlayerState::Finished);
    }

    #[test]
    fn elimination_cascade_is_a_bounded_loop() {
        let mut manager = started(4);
        let mut rng = rng();

        // Strip everyone's hand; each turn must eliminate the active
        // player until the game closes as a draw.
        for index in 0..4 {
            let stripped = manager.players[index].surrender_hand();
            manager.pile.return_tiles(stripped);
        }

        let mut guard = 0;
        while manager.phase() != GamePhase::GameOver {
            guard += 1;
            assert!(guard <= 3, "The cascade must terminate");
            let report = manager.play_ai_turn(false, &mut rng).unwrap();
            assert!(matches!(report.event, TurnEvent::Eliminated));
        }

        assert_eq!(manager.winner(), None);
        for player in manager.players() {
            assert_eq!(player.state(), PlayerState::Eliminated);
        }
    }

    #[test]
    fn eliminated_hand_returns_to_the_pile() {
        let mut manager = started(2);
        let before = manager.pile.len();

        manager.begin_turn().unwrap();
        let hand_size = manager.players()[0].hand().len();
        manager.eliminate(0);

        assert_eq!(manager.pile.len(), before + hand_size);
        assert!(manager.players()[0].hand().is_empty());
    }

    #[test]
    fn game_phase_to_json() -> serde_json::Result<()> {
        assert_eq!(serde_json::to_string(&GamePhase::Setup)?, r#""setup""#);
        assert_eq!(
            serde_json::to_string(&GamePhase::LayingTrack)?,
            r#""laying_track""#
        );
        assert_eq!(serde_json::to_string(&GamePhase::Driving)?, r#""driving""#);
        assert_eq!(
            serde_json::to_string(&GamePhase::GameOver)?,
            r#""game_over""#
        );
        Ok(())
    }
}
