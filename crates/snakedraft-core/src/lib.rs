// Library root: the snake draft engine, its collaborators, and the
// configuration and storage layers the server builds on.

pub mod config;
pub mod db;
pub mod directory;
pub mod draft;
pub mod engine;
pub mod error;
pub mod persist;
pub mod pool;

pub use directory::{League, PoolFilter};
pub use draft::player::{Player, PlayerId, Position, Role, Team, TeamId};
pub use draft::state::DraftState;
pub use draft::validate::PickPolicy;
pub use engine::{CommittedPick, DraftEngine, DraftStatus, PickRequest};
pub use error::{DraftError, EngineError, InvariantViolation};
