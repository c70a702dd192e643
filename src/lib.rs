pub mod board;
pub mod card;
pub mod driving;
pub mod manager;
pub mod path;
pub mod planner;
pub mod player;
pub mod rules;
pub mod tile;
