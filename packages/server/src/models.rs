pub mod config;
pub mod game;
pub mod player;
pub mod role;
pub mod room;
pub mod rule;
