pub mod lookahead;
pub mod player;
pub mod roster;
pub mod state;
pub mod turn;
pub mod validate;
