pub const TOPIC_REMOTE_COMMAND: &str = "smartcooker/feeds/smartcooker";
pub const TOPIC_PHASE: &str = "smartcooker/feeds/smartcookerstatus";

pub const TOPIC_CONTROLLER_STATE: &str = "smartcooker/controller/state";
pub const TOPIC_CONTROLLER_ONLINE: &str = "smartcooker/controller/status";
