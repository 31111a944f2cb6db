//! All user-facing text lives here. Telegram renders these with
//! `parse_mode: HTML`, so anything wrapped in tags must stay well formed.

use itertools::Itertools;

use crate::error::Error;
use crate::registry::StreamerSnapshot;
use crate::subscription::RoomStatus;

pub const WELCOME: &str = "\
🎉 Welcome to the sidekick monitor bot!

📋 How it works:
• send a sidekick link → start watching that room
• send the same link again → stop watching
• /list → rooms you are watching
• /help → this message

💡 Example:
https://sidekick.fans/cmahm5oy0001fl40m59hgr47g

I will ping you whenever a streamer you watch goes live or offline.";

pub const UNKNOWN_COMMAND: &str = "\
❓ Unknown command

📋 What I understand:
• a sidekick link → start/stop watching the room
• /list → rooms you are watching
• /start or /help → help

💡 Example:
https://sidekick.fans/cmahm5oy0001fl40m59hgr47g";

pub const LIST_EMPTY: &str = "\
📭 You are not watching any room yet

Send a sidekick link to start.";

pub const LIST_FAILED: &str =
    "❌ Cannot fetch your watch list right now, please try again later";

pub fn room_url(room_id: &str) -> String {
    format!("https://sidekick.fans/{}", room_id)
}

fn glyph(is_live: bool) -> &'static str {
    if is_live {
        "🟢 live"
    } else {
        "🔴 offline"
    }
}

/// The transition notification sent to every subscriber of a room. Every
/// field line is always present, absent optionals render a placeholder.
pub fn notification(info: &StreamerSnapshot) -> String {
    let status = if info.live_status {
        "🟢 went live!"
    } else {
        "🔴 went offline"
    };
    let tags = if info.tags.is_empty() {
        "none".to_string()
    } else {
        info.tags.iter().join(", ")
    };
    format!(
        "<b>{username}</b> {status}\n\
         \n\
         📺 Title: {title}\n\
         👥 Viewers: {viewer}\n\
         👤 Followers: {followers}\n\
         🏷️ Tags: {tags}\n\
         🔗 Twitter: {twitter}\n\
         \n\
         Room ID: <code>{uid}</code>\n\
         🔗 Watch: {url}",
        username = info.username,
        status = status,
        title = info.title,
        viewer = info.viewer,
        followers = info.followers,
        tags = tags,
        twitter = info.twitter.as_deref().unwrap_or("none"),
        uid = info.uid,
        url = room_url(&info.uid),
    )
}

pub fn toggle_added(info: &StreamerSnapshot) -> String {
    format!(
        "✅ Now watching {username}\n\n📺 Current status: {status}\n👤 Followers: {followers}",
        username = info.username,
        status = glyph(info.live_status),
        followers = info.followers,
    )
}

pub fn toggle_removed(info: &StreamerSnapshot) -> String {
    format!("✅ Stopped watching {}", info.username)
}

pub fn toggle_failed(err: &Error) -> String {
    match err {
        Error::UpstreamRejected { message, .. } => format!(
            "❌ Cannot fetch room info: {}\n\nPlease double-check the link",
            message
        ),
        _ => "❌ Something went wrong while handling the link, please try again later"
            .to_string(),
    }
}

pub fn subscription_list(rooms: &[RoomStatus]) -> String {
    if rooms.is_empty() {
        return LIST_EMPTY.to_string();
    }
    let mut message = "📋 Rooms you are watching:\n\n".to_string();
    for room in rooms {
        message.push_str(&format!(
            "📺 {username}\n   \
             Status: {status}\n   \
             Room ID: <code>{room_id}</code>\n   \
             Link: {url}\n   \
             Last checked: {last_checked}\n\n",
            username = room.streamer_info.username,
            status = glyph(room.is_live),
            room_id = room.room_id,
            url = room_url(&room.room_id),
            last_checked = room.last_checked.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }
    message.push_str("💡 Send the same link again to stop watching");
    message
}
