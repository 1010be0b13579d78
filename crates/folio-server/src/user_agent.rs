/// Fields parsed from a `User-Agent` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UaInfo {
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
}

fn known(value: &str) -> Option<String> {
    // woothee reports unclassified fields as "UNKNOWN" or "".
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a `User-Agent` string via the `woothee` crate.
///
/// An empty or unrecognisable agent yields all-`None` fields.
pub fn parse_user_agent(user_agent: &str) -> UaInfo {
    let user_agent = user_agent.trim();
    if user_agent.is_empty() {
        return UaInfo::default();
    }
    let Some(result) = woothee::parser::Parser::new().parse(user_agent) else {
        return UaInfo::default();
    };

    //   "pc"                        -> "desktop"
    //   "smartphone" | "mobilephone" -> "mobile"
    //   "crawler"                   -> "bot"
    let device_type = match result.category {
        "pc" => Some("desktop"),
        "smartphone" | "mobilephone" => Some("mobile"),
        "crawler" => Some("bot"),
        "appliance" => Some("appliance"),
        _ => None,
    }
    .map(str::to_string);

    UaInfo {
        browser: known(result.name),
        os: known(result.os),
        device_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_on_windows_is_desktop() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let info = parse_user_agent(ua);
        assert_eq!(info.browser.as_deref(), Some("Chrome"));
        assert_eq!(info.device_type.as_deref(), Some("desktop"));
        assert!(info.os.as_deref().is_some_and(|os| os.starts_with("Windows")));
    }

    #[test]
    fn iphone_is_mobile() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
                  (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
        let info = parse_user_agent(ua);
        assert_eq!(info.device_type.as_deref(), Some("mobile"));
        assert_eq!(info.os.as_deref(), Some("iPhone"));
    }

    #[test]
    fn empty_agent_has_no_fields() {
        assert_eq!(parse_user_agent(""), UaInfo::default());
        assert_eq!(parse_user_agent("   "), UaInfo::default());
    }
}
