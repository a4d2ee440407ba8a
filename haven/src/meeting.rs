use serde::Serialize;
use url::Url;

use crate::error::HavenError;

const MEETING_DOMAIN: &str = "zoom.us";

/// A video meeting URL that passed shape validation.
///
/// Only the shape is checked: the meeting itself is owned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingLink {
    pub url: String,
    pub meeting_id: String,
}

impl MeetingLink {
    /// Accepts `http(s)://[*.]zoom.us/.../j/<digits>...`.
    pub fn parse(raw: &str) -> Result<MeetingLink, HavenError> {
        let trimmed = raw.trim();
        let invalid = || HavenError::validation("please enter a valid Zoom meeting link");

        let parsed = Url::parse(trimmed).map_err(|_| invalid())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid());
        }

        let host = parsed.host_str().ok_or_else(invalid)?;
        let on_domain = host == MEETING_DOMAIN || host.ends_with(&format!(".{}", MEETING_DOMAIN));
        if !on_domain {
            return Err(invalid());
        }

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let meeting_id = segments
            .iter()
            .position(|s| *s == "j")
            .and_then(|i| segments.get(i + 1))
            .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(invalid)?;

        Ok(MeetingLink {
            url: trimmed.to_string(),
            meeting_id: meeting_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zoom_join_links() {
        let link = MeetingLink::parse("https://zoom.us/j/1234567890").unwrap();
        assert_eq!(link.meeting_id, "1234567890");

        let link = MeetingLink::parse(" https://us02web.zoom.us/j/555?pwd=abc ").unwrap();
        assert_eq!(link.meeting_id, "555");
        assert_eq!(link.url, "https://us02web.zoom.us/j/555?pwd=abc");
    }

    #[test]
    fn rejects_other_providers_and_shapes() {
        for raw in [
            "https://meet.google.com/abc",
            "https://zoom.us/my/room",
            "https://zoom.us/j/12ab",
            "https://zoom.us/j/",
            "https://notzoom.us/j/123",
            "ftp://zoom.us/j/123",
            "zoom.us/j/123",
            "",
        ] {
            assert!(
                matches!(MeetingLink::parse(raw), Err(HavenError::Validation(_))),
                "{raw} should be rejected"
            );
        }
    }
}
