//! Glue between the engine and the transport layer.

use weft_core::wire::BackMsg;
use weft_session::manager::ConnectionManager;

use crate::engine::SessionControl;

impl SessionControl for ConnectionManager {
    fn send_back_msg(&self, msg: BackMsg) {
        ConnectionManager::send_back_msg(self, msg);
    }

    fn increment_message_cache_run_count(&self, max_age: u32) {
        ConnectionManager::increment_message_cache_run_count(self, max_age);
    }
}
