//! JSON API over the booking engine.
//!
//! ```text
//! request ─▶ auth extractor ─▶ schema gate ─▶ Engine op ─▶ dto
//!                 │                  │            │
//!                 └──── AppError ◀───┴────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::{create_router, RouterLimits};
pub use state::AppState;
