//! Dispatch decision for an incoming message: what reply (if any) to send.
//!
//! Kept free of I/O so the decision table is trivially testable; the gateway
//! performs the actual sends.

/// Relative time window used for every CPU query.
pub const CPU_WINDOW: &str = "1h";

/// Notice sent when authentication or the metric fetch fails.
pub const CPU_UNAVAILABLE_REPLY: &str = "⚠️ Could not fetch CPU data from VuSmartMaps.";

pub const MEM_PLACEHOLDER_REPLY: &str = "ℹ️ Memory monitoring coming soon.";
pub const DISK_PLACEHOLDER_REPLY: &str = "ℹ️ Disk metrics coming soon.";

/// Text that brings up the button menu. Case-insensitive.
const MENU_TRIGGER: &str = "hi";

/// What to do with an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Show the three-button menu (CPU / Memory / Disk).
    Menu,
    /// Fetch the CPU gauge and reply with the formatted value.
    CpuMetric,
    MemPlaceholder,
    DiskPlaceholder,
    /// Echo free text back to the sender.
    Echo(String),
    /// Neither text nor a recognized button id; acknowledge silently.
    Ignore,
}

/// Classify a message by its text and/or button-reply id. Checked in order:
/// menu trigger, button ids, then echo for any other text.
pub fn classify(text: Option<&str>, button_id: Option<&str>) -> Action {
    if let Some(t) = text {
        if t.eq_ignore_ascii_case(MENU_TRIGGER) {
            return Action::Menu;
        }
    }
    match button_id {
        Some("cpu") => return Action::CpuMetric,
        Some("mem") => return Action::MemPlaceholder,
        Some("disk") => return Action::DiskPlaceholder,
        _ => {}
    }
    if let Some(t) = text {
        return Action::Echo(t.to_string());
    }
    Action::Ignore
}

/// Reply text for a fetched CPU value, two decimal places.
pub fn cpu_reply(value: f64) -> String {
    format!("🔥 *CPU Utilization ({})*: {:.2}%", CPU_WINDOW, value)
}

/// Reply text for unrecognized free text.
pub fn echo_reply(text: &str) -> String {
    format!("You said: {}", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_trigger_is_case_insensitive() {
        assert_eq!(classify(Some("hi"), None), Action::Menu);
        assert_eq!(classify(Some("Hi"), None), Action::Menu);
        assert_eq!(classify(Some("HI"), None), Action::Menu);
    }

    #[test]
    fn menu_trigger_must_match_exactly() {
        assert_eq!(
            classify(Some("hi there"), None),
            Action::Echo("hi there".to_string())
        );
    }

    #[test]
    fn button_ids_map_to_their_actions() {
        assert_eq!(classify(None, Some("cpu")), Action::CpuMetric);
        assert_eq!(classify(None, Some("mem")), Action::MemPlaceholder);
        assert_eq!(classify(None, Some("disk")), Action::DiskPlaceholder);
    }

    #[test]
    fn other_text_echoes() {
        assert_eq!(
            classify(Some("what's up"), None),
            Action::Echo("what's up".to_string())
        );
    }

    #[test]
    fn unknown_button_without_text_is_ignored() {
        assert_eq!(classify(None, Some("net")), Action::Ignore);
        assert_eq!(classify(None, None), Action::Ignore);
    }

    #[test]
    fn cpu_reply_formats_two_decimals() {
        assert_eq!(cpu_reply(42.567), "🔥 *CPU Utilization (1h)*: 42.57%");
        assert_eq!(cpu_reply(7.0), "🔥 *CPU Utilization (1h)*: 7.00%");
    }

    #[test]
    fn echo_reply_prefixes_text() {
        assert_eq!(echo_reply("hello"), "You said: hello");
    }
}
