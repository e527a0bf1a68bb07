// Status message rendering

use crate::adapter::{EmbedField, StatusEmbed};
use craftwatch_core::NotificationSnapshot;

pub const COLOR_ONLINE: u32 = 0x2ecc71;
pub const COLOR_OFFLINE: u32 = 0xe74c3c;
pub const COLOR_CHECKING: u32 = 0x99aab5;

/// Render a snapshot. Offline never carries a player field.
pub fn render(snapshot: &NotificationSnapshot, title: &str) -> StatusEmbed {
    let timestamp = Some(
        snapshot
            .rendered_at
            .format("%Y-%m-%dT%H:%M:%S%.6f+00:00")
            .to_string(),
    );

    if !snapshot.online {
        return StatusEmbed {
            title: title.to_string(),
            description: "🔴 Offline".to_string(),
            color: COLOR_OFFLINE,
            fields: Vec::new(),
            timestamp,
        };
    }

    let state = snapshot.as_state();
    let entries = state.display_entries();
    let value = if entries.is_empty() {
        "0: None".to_string()
    } else {
        format!("{}: {}", state.headcount(), entries.join(", "))
    };

    StatusEmbed {
        title: title.to_string(),
        description: "🟢 Online".to_string(),
        color: COLOR_ONLINE,
        fields: vec![EmbedField {
            name: "Players".to_string(),
            value,
            inline: false,
        }],
        timestamp,
    }
}

/// Neutral placeholder shown until the first real publish
pub fn render_checking(title: &str) -> StatusEmbed {
    StatusEmbed {
        title: title.to_string(),
        description: "Checking...".to_string(),
        color: COLOR_CHECKING,
        fields: Vec::new(),
        timestamp: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn snapshot(online: bool, players: &[&str], obscured: u32) -> NotificationSnapshot {
        NotificationSnapshot {
            online,
            players: players.iter().map(|p| p.to_string()).collect::<BTreeSet<_>>(),
            obscured_count: obscured,
            rendered_at: Utc::now(),
        }
    }

    #[test]
    fn test_online_lists_sorted_names() {
        let embed = render(&snapshot(true, &["Steve", "Alex"], 0), "Status");
        assert_eq!(embed.description, "🟢 Online");
        assert_eq!(embed.color, COLOR_ONLINE);
        assert_eq!(embed.fields.len(), 1);
        assert_eq!(embed.fields[0].value, "2: Alex, Steve");
    }

    #[test]
    fn test_online_empty_shows_none() {
        let embed = render(&snapshot(true, &[], 0), "Status");
        assert_eq!(embed.fields[0].value, "0: None");
    }

    #[test]
    fn test_obscured_players_render_one_sentinel() {
        let embed = render(&snapshot(true, &[], 2), "Status");
        assert_eq!(embed.fields[0].value, "2: 2 Players");

        let embed = render(&snapshot(true, &["Alex"], 1), "Status");
        assert_eq!(embed.fields[0].value, "2: Alex, Player 1");
    }

    #[test]
    fn test_offline_has_no_player_field() {
        let embed = render(&NotificationSnapshot::offline(), "Status");
        assert_eq!(embed.description, "🔴 Offline");
        assert_eq!(embed.color, COLOR_OFFLINE);
        assert!(embed.fields.is_empty());
    }

    #[test]
    fn test_checking_placeholder() {
        let embed = render_checking("Status");
        assert_eq!(embed.title, "Status");
        assert_eq!(embed.description, "Checking...");
        assert!(embed.timestamp.is_none());
    }
}
