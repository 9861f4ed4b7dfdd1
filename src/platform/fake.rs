use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};

use super::{ChannelInfo, ChatPlatform, Permissions};

/// In-memory platform recording every delivered message.
#[derive(Default)]
pub struct FakePlatform {
    channels: Mutex<HashMap<u64, ChannelInfo>>,
    sent: Mutex<Vec<(u64, String)>>,
    mention_roles: Mutex<Vec<Vec<u64>>>,
    failures: Mutex<VecDeque<AppError>>,
}

impl FakePlatform {
    pub fn with_channel(self, id: u64, bot_permissions: Permissions) -> Self {
        self.channels.lock().unwrap().insert(
            id,
            ChannelInfo {
                id,
                server: Some(10),
                name: Some(format!("channel-{id}")),
                bot_permissions,
            },
        );
        self
    }

    /// A direct-message channel: postable, but outside any server.
    pub fn with_dm_channel(self, id: u64) -> Self {
        self.channels.lock().unwrap().insert(
            id,
            ChannelInfo {
                id,
                server: None,
                name: None,
                bot_permissions: Permissions::postable(),
            },
        );
        self
    }

    pub fn remove_channel(&self, id: u64) {
        self.channels.lock().unwrap().remove(&id);
    }

    /// The next `send_message` call fails with `err` instead of posting.
    pub fn fail_next_send(&self, err: AppError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn sent(&self) -> Vec<(u64, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Roles allowed to be pinged, per delivered message.
    pub fn mention_roles(&self) -> Vec<Vec<u64>> {
        self.mention_roles.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn channel(&self, channel_id: u64) -> Result<Option<ChannelInfo>> {
        Ok(self.channels.lock().unwrap().get(&channel_id).cloned())
    }

    async fn send_message(
        &self,
        channel_id: u64,
        content: &str,
        mention_roles: &[u64],
    ) -> Result<u64> {
        if !self.channels.lock().unwrap().contains_key(&channel_id) {
            return Err(AppError::ChannelNotFound(channel_id));
        }
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.mention_roles.lock().unwrap().push(mention_roles.to_vec());
        let mut sent = self.sent.lock().unwrap();
        sent.push((channel_id, content.to_string()));
        Ok(sent.len() as u64)
    }
}
