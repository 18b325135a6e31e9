use crate::config::ServerConfig;
use crate::duty::DutyCalendarService;
use crate::quick_action::QuickActionService;
use faultline_alert::cache::{AlertCache, ProbingCache};
use faultline_alert::ingress::EventIngress;
use faultline_alert::silence::SilenceStore;
use faultline_probe::supervisor::ProbingSupervisor;
use faultline_storage::UserRepo;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub cache: Arc<AlertCache>,
    pub probing_cache: Arc<ProbingCache>,
    pub silences: Arc<SilenceStore>,
    pub ingress: Arc<EventIngress>,
    pub supervisor: Arc<ProbingSupervisor>,
    pub quick_actions: Arc<QuickActionService>,
    pub users: Arc<dyn UserRepo>,
    pub duty: Arc<DutyCalendarService>,
}

/// Set by the signed-token middleware; identifies what the link may touch.
#[derive(Debug, Clone)]
pub struct TokenContext {
    pub tenant_id: String,
    pub fingerprint: String,
}

/// Set by the login middleware; the real operator of the action.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}
