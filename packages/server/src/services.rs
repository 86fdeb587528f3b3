pub mod error;
pub mod game_service;
pub mod observer;
pub mod phase_machine;
pub mod role_assignment;
pub mod room_service;
pub mod tally;
pub mod win;
