//! Minimal Discord REST client: just enough to resolve channels, work out
//! the bot's effective permissions and post messages.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::OnceCell;

use crate::error::{AppError, Result};

use super::{ChannelInfo, ChatPlatform, Permissions};

const DISCORD_API_URL: &str = "https://discord.com/api/v10";

fn snowflake<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn optional_snowflake<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| raw.parse().map_err(serde::de::Error::custom))
        .transpose()
}

fn snowflakes<'de, D>(deserializer: D) -> std::result::Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .into_iter()
        .map(|raw| raw.parse().map_err(serde::de::Error::custom))
        .collect()
}

fn permissions<'de, D>(deserializer: D) -> std::result::Result<Permissions, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(Permissions::from_wire(&raw))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u8")]
pub enum OverwriteKind {
    Role,
    Member,
}

impl From<u8> for OverwriteKind {
    fn from(value: u8) -> Self {
        match value {
            1 => OverwriteKind::Member,
            _ => OverwriteKind::Role,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Overwrite {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: OverwriteKind,
    #[serde(deserialize_with = "permissions")]
    pub allow: Permissions,
    #[serde(deserialize_with = "permissions")]
    pub deny: Permissions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    #[serde(deserialize_with = "permissions")]
    pub permissions: Permissions,
}

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    #[serde(deserialize_with = "snowflake")]
    id: u64,
    #[serde(default, deserialize_with = "optional_snowflake")]
    guild_id: Option<u64>,
    name: Option<String>,
    #[serde(default)]
    permission_overwrites: Vec<Overwrite>,
}

#[derive(Debug, Deserialize)]
struct MemberResponse {
    #[serde(deserialize_with = "snowflakes")]
    roles: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    #[serde(deserialize_with = "snowflake")]
    id: u64,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    content: &'a str,
    allowed_mentions: AllowedMentions,
}

#[derive(Debug, Serialize)]
struct AllowedMentions {
    parse: Vec<&'static str>,
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(deserialize_with = "snowflake")]
    id: u64,
}

/// Effective channel permissions of a guild member.
///
/// `@everyone` shares its id with the guild. The guild owner shortcut is
/// not applied.
pub fn compute_channel_permissions(
    guild_id: u64,
    member_id: u64,
    member_roles: &[u64],
    roles: &[Role],
    overwrites: &[Overwrite],
) -> Permissions {
    let mut base = roles
        .iter()
        .filter(|role| role.id == guild_id || member_roles.contains(&role.id))
        .fold(Permissions::none(), |acc, role| acc | role.permissions);

    if base.contains(Permissions::Administrator) {
        return Permissions::all_bits();
    }

    if let Some(everyone) = overwrites
        .iter()
        .find(|o| o.kind == OverwriteKind::Role && o.id == guild_id)
    {
        base = (base & !everyone.deny) | everyone.allow;
    }

    let (allow, deny) = overwrites
        .iter()
        .filter(|o| o.kind == OverwriteKind::Role && member_roles.contains(&o.id))
        .fold((Permissions::none(), Permissions::none()), |(allow, deny), o| {
            (allow | o.allow, deny | o.deny)
        });
    base = (base & !deny) | allow;

    if let Some(member) = overwrites
        .iter()
        .find(|o| o.kind == OverwriteKind::Member && o.id == member_id)
    {
        base = (base & !member.deny) | member.allow;
    }

    base
}

pub struct DiscordClient {
    client: Client,
    token: String,
    base_url: String,
    bot_id: OnceCell<u64>,
}

impl DiscordClient {
    pub fn new(token: String) -> Result<Self> {
        Self::with_base_url(token, DISCORD_API_URL.to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("DiscordBot (https://github.com/ShindouMihou/Amelia, 0.1)")
            .build()?;
        Ok(Self {
            client,
            token,
            base_url,
            bot_id: OnceCell::new(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(AppError::DiscordApi(format!("GET {path}: {status}: {error_text}")))
            }
        }
    }

    async fn bot_id(&self) -> Result<u64> {
        self.bot_id
            .get_or_try_init(|| async {
                let user: UserResponse = self
                    .get("/users/@me")
                    .await?
                    .ok_or_else(|| AppError::DiscordApi("bot user is not visible".into()))?;
                tracing::debug!("Resolved bot user id {}", user.id);
                Ok::<_, AppError>(user.id)
            })
            .await
            .copied()
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn channel(&self, channel_id: u64) -> Result<Option<ChannelInfo>> {
        let Some(channel) = self
            .get::<ChannelResponse>(&format!("/channels/{channel_id}"))
            .await?
        else {
            return Ok(None);
        };

        // Direct messages carry no overwrites to evaluate.
        let Some(guild_id) = channel.guild_id else {
            return Ok(Some(ChannelInfo {
                id: channel.id,
                server: None,
                name: channel.name,
                bot_permissions: Permissions::postable(),
            }));
        };

        let bot_id = self.bot_id().await?;
        let roles: Vec<Role> = self
            .get(&format!("/guilds/{guild_id}/roles"))
            .await?
            .unwrap_or_default();
        let member: Option<MemberResponse> = self
            .get(&format!("/guilds/{guild_id}/members/{bot_id}"))
            .await?;
        let Some(member) = member else {
            return Ok(None);
        };

        let bot_permissions = compute_channel_permissions(
            guild_id,
            bot_id,
            &member.roles,
            &roles,
            &channel.permission_overwrites,
        );

        Ok(Some(ChannelInfo {
            id: channel.id,
            server: Some(guild_id),
            name: channel.name,
            bot_permissions,
        }))
    }

    async fn send_message(
        &self,
        channel_id: u64,
        content: &str,
        mention_roles: &[u64],
    ) -> Result<u64> {
        // Feed text may contain `<@id>`; nothing outside `mention_roles` pings.
        let request = CreateMessageRequest {
            content,
            allowed_mentions: AllowedMentions {
                parse: Vec::new(),
                roles: mention_roles.iter().map(u64::to_string).collect(),
            },
        };

        let response = self
            .client
            .post(format!("{}/channels/{}/messages", self.base_url, channel_id))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&request)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                Err(AppError::ChannelNotFound(channel_id))
            }
            status if status.is_success() => {
                let message: MessageResponse = response.json().await?;
                Ok(message.id)
            }
            status
                if status.is_client_error()
                    && !matches!(
                        status,
                        StatusCode::UNAUTHORIZED | StatusCode::TOO_MANY_REQUESTS
                    ) =>
            {
                let error_text = response.text().await.unwrap_or_default();
                Err(AppError::MessageRejected(format!("{status}: {error_text}")))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(AppError::DiscordApi(format!("{status}: {error_text}")))
            }
        }
    }
}
