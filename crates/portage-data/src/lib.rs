pub mod loader;
pub mod schema;
pub mod template;

pub use loader::{DataLoadError, GameData, load_game_data};
pub use template::HostTemplate;
