pub mod cache;
pub mod controller;
pub mod events;
pub mod fetch;
pub mod nicks;
pub mod pipeline;
pub mod player;
pub mod processor;
pub mod ratelimit;
pub mod settings;
pub mod state;

// Re-exports for convenience
pub use controller::Controller;
pub use events::{Event, Lexer};
pub use pipeline::OverlayService;
pub use player::Player;
pub use state::LobbyState;
