use crate::board::{Building, Line};
use crate::tile::TileKind;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use smallvec::SmallVec;
use strum::IntoEnumIterator;

/// How many tiles a player holds at the start of a turn.
pub const HAND_TILE_LIMIT: usize = 5;

// How many of each kind go into the pile for up to four players.
const BASE_TILE_COUNTS: [(TileKind, usize); 12] = [
    (TileKind::Straight, 21),
    (TileKind::Curve, 20),
    (TileKind::StraightLeftCurve, 10),
    (TileKind::StraightRightCurve, 10),
    (TileKind::DoubleCurveY, 10),
    (TileKind::DiagonalCurve, 6),
    (TileKind::TreeJunctionTop, 6),
    (TileKind::TreeJunctionRight, 6),
    (TileKind::TreeRoundabout, 4),
    (TileKind::TreeCrossroad, 4),
    (TileKind::TreeStraightDiagonal1, 2),
    (TileKind::TreeStraightDiagonal2, 2),
];

// Extra tiles mixed in for five or six players.
const FIVE_PLUS_EXTRA_COUNTS: [(TileKind, usize); 2] =
    [(TileKind::Straight, 15), (TileKind::Curve, 10)];

/// The secret line card: which line's two terminals the player must join.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct LineCard {
    pub line: Line,
}

/// The secret route card: the buildings the player must serve, in order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RouteCard {
    pub stops: SmallVec<[Building; 3]>,
}

// The six printed route-card variants. For each variant, per line: the
// stops for games of up to four players, and for five or six players.
type StopRow = (&'static [Building], &'static [Building]);
const ROUTE_CARD_VARIANTS: [[StopRow; 6]; 6] = {
    use Building::*;
    [
        [
            (&[A, F], &[A, C, L]),
            (&[G, L], &[C, G, K]),
            (&[C, F], &[D, H, I]),
            (&[D, F], &[C, E, M]),
            (&[A, L], &[A, B, M]),
            (&[C, E], &[E, I, K]),
        ],
        [
            (&[F, K], &[B, G, L]),
            (&[F, H], &[B, L, M]),
            (&[A, C], &[C, I, M]),
            (&[D, K], &[A, D, M]),
            (&[D, G], &[A, G, K]),
            (&[E, H], &[B, F, M]),
        ],
        [
            (&[C, M], &[C, G, M]),
            (&[F, L], &[G, H, L]),
            (&[H, K], &[C, D, M]),
            (&[E, K], &[A, E, I]),
            (&[D, I], &[D, F, I]),
            (&[B, L], &[E, K, L]),
        ],
        [
            (&[B, I], &[C, D, I]),
            (&[B, M], &[E, G, I]),
            (&[D, M], &[D, H, K]),
            (&[E, I], &[H, K, L]),
            (&[B, H], &[A, E, L]),
            (&[F, I], &[A, B, L]),
        ],
        [
            (&[B, D], &[F, I, K]),
            (&[B, E], &[F, H, K]),
            (&[B, G], &[G, M, L]),
            (&[H, L], &[E, F, K]),
            (&[A, M], &[E, H, K]),
            (&[A, D], &[B, F, I]),
        ],
        [
            (&[C, I], &[F, H, K]),
            (&[G, K], &[C, F, I]),
            (&[E, G], &[B, H, L]),
            (&[C, H], &[D, I, M]),
            (&[H, M], &[A, L, M]),
            (&[A, G], &[B, F, I]),
        ],
    ]
};

/// Deals each player a line card and a route card.
///
/// Lines and card variants are both shuffled, so no two players share a
/// line or a variant. Games of up to four players get two required stops;
/// five- and six-player games get three.
pub fn deal_cards(num_players: usize, rng: &mut impl Rng) -> Vec<(LineCard, RouteCard)> {
    let mut lines: Vec<Line> = Line::iter().collect();
    lines.shuffle(rng);
    let mut variants: Vec<usize> = (0..ROUTE_CARD_VARIANTS.len()).collect();
    variants.shuffle(rng);

    lines
        .into_iter()
        .zip(variants)
        .take(num_players)
        .map(|(line, variant)| {
            let (small_game, large_game) = ROUTE_CARD_VARIANTS[variant][line as usize - 1];
            let stops = if num_players >= 5 { large_game } else { small_game };
            (
                LineCard { line },
                RouteCard {
                    stops: SmallVec::from_slice(stops),
                },
            )
        })
        .collect()
}

/// The tiles dealt to every player before their first turn.
pub fn starting_hand() -> [TileKind; HAND_TILE_LIMIT] {
    [
        TileKind::Straight,
        TileKind::Straight,
        TileKind::Straight,
        TileKind::Curve,
        TileKind::Curve,
    ]
}

/// The face-down pile of track tiles, shuffled at setup.
///
/// Players draw from the top; eliminated players' hands go back in at the
/// bottom.
#[derive(Debug)]
pub struct TilePile {
    tiles: Vec<TileKind>,
}

impl TilePile {
    /// Builds the pile for the given number of players and shuffles it.
    /// Five- and six-player games mix in extra straights and curves.
    pub fn shuffled(num_players: usize, rng: &mut impl Rng) -> Self {
        let mut tiles = Vec::new();
        for (kind, count) in BASE_TILE_COUNTS {
            tiles.extend(std::iter::repeat(kind).take(count));
        }
        if num_players >= 5 {
            for (kind, count) in FIVE_PLUS_EXTRA_COUNTS {
                tiles.extend(std::iter::repeat(kind).take(count));
            }
        }
        tiles.shuffle(rng);
        Self { tiles }
    }

    /// A pile with exactly the given tiles, drawn from the back first.
    /// Mostly useful to pin down draws in tests.
    pub fn from_tiles(tiles: Vec<TileKind>) -> Self {
        Self { tiles }
    }

    /// Draws the top tile, if any are left.
    pub fn draw(&mut self) -> Option<TileKind> {
        self.tiles.pop()
    }

    /// Removes one tile of the given kind from anywhere in the pile.
    /// Used when dealing the fixed starting hands.
    pub fn take_kind(&mut self, kind: TileKind) -> Option<TileKind> {
        let index = self.tiles.iter().position(|tile| *tile == kind)?;
        Some(self.tiles.swap_remove(index))
    }

    /// Slides tiles back under the pile.
    pub fn return_tiles(&mut self, tiles: impl IntoIterator<Item = TileKind>) {
        // Returned tiles go to the bottom, which is the front of the vec.
        let mut returned: Vec<TileKind> = tiles.into_iter().collect();
        returned.extend(self.tiles.drain(..));
        self.tiles = returned;
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
