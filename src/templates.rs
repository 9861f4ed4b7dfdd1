//! User-facing message templates.
//!
//! These strings are shown verbatim to Discord users and must not change.

pub const NEUTRAL_LOADING: &str = "<a:manaWinterLoading:880162110947094628> Please wait...";

pub const ERROR_SCRIBBLEHUB_NOT_ACCESSIBLE: &str = "❌ Amelia was unable to fetch the RSS feed from ScribbleHub, this can happen because of either the user doesn't have a story published yet or ScribbleHub is down.";
pub const ERROR_SCRIBBLEHUB_UNREACHABLE: &str =
    "❌ Amelia encountered a problem while trying to send: ScribbleHub is not accessible.";
pub const ERROR_CHANNEL_NOT_FOUND: &str = "❌ Amelia was unable to find the text channel, are you sure that I can **see**, **write** and **read** on the channel?";
pub const ERROR_FEED_NOT_FOUND: &str =
    "❌ Amelia was unable to find the feed, are you sure it exists?";
pub const ERROR_DATE_NOT_FOUND: &str = "❌ Amelia was unable to fetch the date of the feed, please try contacting our support team if it still doesn't work at **amelia@mihou.pw**";
pub const ERROR_DATABASE_FAILED: &str = "❌ Amelia was unable to complete this action because of some database issue, please try contacting our support team if it still doesn't work at **amelia@mihou.pw**";
pub const ERROR_MISSING_PERMISSIONS: &str = "❌ You do not have permission to use this command, required permission: **Manage Server** or **Manage Channels**.";
pub const ERROR_FAILED_TO_PERFORM_ACTION: &str =
    "❌ Amelia was unable to perform this action, please try again later.";

pub fn registered(name: &str, channel: u64) -> String {
    format!("✅ I will try my best to send updates for {name} in <#{channel}>!")
}

pub fn unregistered(name: &str) -> String {
    format!("✅ I will no longer send updates for {name}.")
}

pub fn mentions_updated(name: &str) -> String {
    format!("✅ Mentions for {name} have been updated.")
}

pub const NO_SUBSCRIPTIONS: &str = "There are no feeds registered on this server yet.";
