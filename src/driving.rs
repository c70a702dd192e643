use crate::board::Board;
use crate::player::DrivingRoute;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fmt;

/// A face of the special driving die: four numbered faces and two `H`
/// faces that jump to the next stop or terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DieFace {
    One,
    Two,
    Three,
    Four,
    NextStop,
}

const DIE_FACES: [DieFace; 6] = [
    DieFace::One,
    DieFace::Two,
    DieFace::Three,
    DieFace::Four,
    DieFace::NextStop,
    DieFace::NextStop,
];

impl DieFace {
    /// Rolls the die: faces 1–4 plus `H` twice, uniform.
    pub fn roll(rng: &mut impl Rng) -> DieFace {
        *DIE_FACES
            .choose(rng)
            .expect("the die always has six faces")
    }

    /// The number of cells to advance, for the numbered faces.
    #[inline]
    pub fn steps(self) -> Option<usize> {
        match self {
            DieFace::One => Some(1),
            DieFace::Two => Some(2),
            DieFace::Three => Some(3),
            DieFace::Four => Some(4),
            DieFace::NextStop => None,
        }
    }
}

impl fmt::Display for DieFace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DieFace::NextStop => write!(f, "H"),
            face => write!(f, "{}", face.steps().unwrap_or_default()),
        }
    }
}

/// Advances a streetcar along its fixed route for one die roll and returns
/// the new route index.
///
/// A numbered face advances that many cells, clamped to the final
/// terminal; overshooting the end is not an error, it simply arrives. An
/// `H` face advances to the next stop-sign tile or terminal ahead of the
/// streetcar, whether or not it is one of the player's required stops.
pub fn advance(board: &Board, route: &DrivingRoute, face: DieFace) -> usize {
    let last = route.path.len() - 1;
    match face.steps() {
        Some(steps) => (route.index + steps).min(last),
        None => route.path[route.index + 1..]
            .iter()
            .position(|coord| {
                board
                    .tile(*coord)
                    .map(|tile| tile.has_stop_sign || tile.is_terminal)
                    .unwrap_or(false)
            })
            .map(|offset| route.index + 1 + offset)
            .unwrap_or(last),
    }
}
