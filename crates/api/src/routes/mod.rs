mod analyze;
mod decisions;
mod health;

pub use analyze::analyze_router;
pub use decisions::decisions_router;
pub use health::health_router;
