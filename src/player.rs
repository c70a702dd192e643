use crate::board::{Building, Coord, Line};
use crate::card::{LineCard, RouteCard};
use crate::tile::TileKind;

use serde::Serialize;
use strum_macros::Display;

/// Which stage of the game a player is in.
///
/// # JSON
/// States are serialized in snake_case.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlayerState {
    /// Still building towards a complete route.
    LayingTrack,
    /// Route proven complete; moving the streetcar along it.
    Driving,
    /// Drove into the destination terminal and won.
    Finished,
    /// Out of the game; the hand went back to the pile.
    Eliminated,
}

/// The fixed route a player drives once their track is proven complete,
/// plus how far along it the streetcar has come.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DrivingRoute {
    /// The terminal the route departs from, fixed by the direction in
    /// which the completion check connected.
    pub start_terminal: Coord,
    /// Every cell of the route, start terminal through end terminal.
    pub path: Vec<Coord>,
    /// Index of the streetcar's current cell in `path`.
    pub index: usize,
}

impl DrivingRoute {
    /// The cell the streetcar currently occupies.
    #[inline]
    pub fn position(&self) -> Coord {
        self.path[self.index]
    }

    /// Whether the streetcar stands on the final terminal.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.index == self.path.len() - 1
    }
}

/// One participant in the game: a hand of tiles, two secret cards, and,
/// once the route is complete, a streetcar on the board.
///
/// A `Player` does not know about the other players; turn order, draws and
/// eliminations are the [`crate::manager::Game`]'s business.
pub struct Player {
    id: usize,
    hand: Vec<TileKind>,
    line_card: Option<LineCard>,
    route_card: Option<RouteCard>,
    state: PlayerState,
    route: Option<DrivingRoute>,
}

impl Player {
    /// Creates a player with an empty hand, before any cards are dealt.
    pub fn new(id: usize) -> Self {
        Self {
            id,
            hand: Vec::new(),
            line_card: None,
            route_card: None,
            state: PlayerState::LayingTrack,
            route: None,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn state(&self) -> PlayerState {
        self.state
    }

    #[inline]
    pub(crate) fn set_state(&mut self, state: PlayerState) {
        self.state = state;
    }

    /// The player's hand. A multiset: duplicates are expected.
    #[inline]
    pub fn hand(&self) -> &[TileKind] {
        &self.hand
    }

    #[inline]
    pub(crate) fn hand_mut(&mut self) -> &mut Vec<TileKind> {
        &mut self.hand
    }

    /// Empties the hand, handing the tiles back to the caller.
    pub(crate) fn surrender_hand(&mut self) -> Vec<TileKind> {
        std::mem::take(&mut self.hand)
    }

    #[inline]
    pub(crate) fn deal(&mut self, line_card: LineCard, route_card: RouteCard) {
        self.line_card = Some(line_card);
        self.route_card = Some(route_card);
    }

    /// The line this player must join, once cards are dealt.
    #[inline]
    pub fn line(&self) -> Option<Line> {
        self.line_card.map(|card| card.line)
    }

    /// The required stops, in the order they must be visited.
    #[inline]
    pub fn stops(&self) -> &[Building] {
        self.route_card
            .as_ref()
            .map(|card| card.stops.as_slice())
            .unwrap_or(&[])
    }

    /// The driving route, once the player has one.
    #[inline]
    pub fn route(&self) -> Option<&DrivingRoute> {
        self.route.as_ref()
    }

    #[inline]
    pub(crate) fn route_mut(&mut self) -> Option<&mut DrivingRoute> {
        self.route.as_mut()
    }

    #[inline]
    pub(crate) fn set_route(&mut self, route: DrivingRoute) {
        self.route = Some(route);
    }

    /// Where the player's streetcar stands, if they are driving.
    pub fn position(&self) -> Option<Coord> {
        match self.state {
            PlayerState::Driving | PlayerState::Finished => {
                self.route.as_ref().map(|route| route.position())
            }
            _ => None,
        }
    }
}
