//! Core library for the social graph engine: follow graph analytics,
//! username search, feed ranking, follow recommendation and content
//! compression.

pub mod codec;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod feed;
pub mod graph;
pub mod predict;
pub mod present;
pub mod search;
pub mod similarity;
pub mod storage;

pub use config::{CaseSensitivity, Config, RankingKind};
pub use engine::SocialEngine;
pub use error::{EngineError, Result};
pub use graph::{Direction, FollowEdge, GraphStore, User, UserId};
