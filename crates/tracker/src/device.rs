//! User-agent string parsing into coarse device/os/browser buckets. This is
//! bucketing for rollup breakdowns, not full UA fingerprinting.

use lotpulse_events::{DeviceInfo, DeviceType};

/// Parse a raw user-agent header into `{device type, os, browser}`.
pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    let ua = user_agent.to_ascii_lowercase();

    let device_type = if ua.contains("ipad") || ua.contains("tablet") {
        DeviceType::Tablet
    } else if ua.contains("android") && !ua.contains("mobile") {
        // Android without the "Mobile" token is a tablet form factor.
        DeviceType::Tablet
    } else if ua.contains("mobi") || ua.contains("iphone") {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    };

    let os = if ua.contains("iphone") || ua.contains("ipad") {
        "iOS"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("windows") {
        "Windows"
    } else if ua.contains("mac os x") || ua.contains("macintosh") {
        "macOS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Unknown"
    };

    // Order matters: Chrome-family UAs also carry "safari", Edge and Opera
    // also carry "chrome".
    let browser = if ua.contains("edg/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("firefox") {
        "Firefox"
    } else if ua.contains("chrome") || ua.contains("crios") {
        "Chrome"
    } else if ua.contains("safari") {
        "Safari"
    } else {
        "Unknown"
    };

    DeviceInfo {
        device_type,
        os: os.to_string(),
        browser: browser.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_chrome() {
        let info = parse_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        );
        assert_eq!(info.device_type, DeviceType::Desktop);
        assert_eq!(info.os, "Windows");
        assert_eq!(info.browser, "Chrome");
    }

    #[test]
    fn test_iphone_safari() {
        let info = parse_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) \
             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(info.device_type, DeviceType::Mobile);
        assert_eq!(info.os, "iOS");
        assert_eq!(info.browser, "Safari");
    }

    #[test]
    fn test_android_tablet() {
        let info = parse_user_agent(
            "Mozilla/5.0 (Linux; Android 13; SM-X710) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        );
        assert_eq!(info.device_type, DeviceType::Tablet);
        assert_eq!(info.os, "Android");
        assert_eq!(info.browser, "Chrome");
    }

    #[test]
    fn test_edge_over_chrome() {
        let info = parse_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91",
        );
        assert_eq!(info.browser, "Edge");
    }

    #[test]
    fn test_unknown_ua() {
        let info = parse_user_agent("curl/8.4.0");
        assert_eq!(info.device_type, DeviceType::Desktop);
        assert_eq!(info.os, "Unknown");
        assert_eq!(info.browser, "Unknown");
    }
}
