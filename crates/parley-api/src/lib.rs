pub mod attachments;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod presence;
pub mod reactions;

use std::path::PathBuf;
use std::sync::Arc;

use parley_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub upload_dir: PathBuf,
}
