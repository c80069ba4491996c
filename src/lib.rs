pub mod animation;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod interaction;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod session;
pub mod state;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use interaction::{Effect, PointerTarget, ViewEvent};
pub use ir::{Diagram, Edge, ModelError, Node};
pub use layout::{ViewLayout, compute_view};
pub use session::{Outcome, Session};
pub use state::ViewState;
