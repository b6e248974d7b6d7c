// Application state handed to the presentation layer
use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::player::Player;

pub struct AppState {
    pub player: Arc<Player>,
    pub config_dir: PathBuf,
}

impl AppState {
    pub fn new(player: Player, config_dir: PathBuf) -> Self {
        Self {
            player: Arc::new(player),
            config_dir,
        }
    }
}
