use std::sync::Arc;

use crate::config::Config;
use crate::console::ReconciliationConsole;
use crate::db::SubmissionStore;
use crate::delivery::Dispatcher;
use crate::submission::SubmissionIntake;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub submissions: Arc<dyn SubmissionStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub intake: SubmissionIntake,
    pub console: ReconciliationConsole,
}
