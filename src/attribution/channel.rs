//! Channel and device classification
//!
//! Applied once per event, at creation time, against the current navigation
//! context.

use url::Url;

use crate::attribution::types::{Channel, DeviceInfo, DeviceType, NavigationContext};

/// `utm_source` substrings mapped to channels, checked in order
const UTM_SOURCE_RULES: &[(&[&str], Channel)] = &[
    (&["google", "bing", "yahoo"], Channel::OrganicSearch),
    (&["facebook", "instagram", "twitter"], Channel::SocialMedia),
    (&["email", "mail"], Channel::Email),
];

/// Referrer host substrings mapped to channels, checked in order
const REFERRER_RULES: &[(&[&str], Channel)] = &[
    (&["google.com"], Channel::OrganicSearch),
    (&["facebook.com", "instagram.com"], Channel::SocialMedia),
    (
        &["zillow.com", "realtor.com", "redfin.com", "trulia.com", "homes.com"],
        Channel::RealEstatePortal,
    ),
];

/// Viewport widths up to this are mobile
pub const MOBILE_MAX_WIDTH: u32 = 768;

/// Viewport widths up to this (and above mobile) are tablets
pub const TABLET_MAX_WIDTH: u32 = 1024;

/// Browser names matched against the user agent, first match wins
const BROWSERS: &[&str] = &["Chrome", "Firefox", "Safari", "Edge"];

/// OS names matched against the user agent, first match wins
const OPERATING_SYSTEMS: &[&str] = &["Windows", "macOS", "Linux", "Android", "iOS"];

const UNKNOWN: &str = "Unknown";

/// Result of classifying a navigation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub channel: Channel,
    pub campaign: Option<String>,
    pub landing_page: String,
}

/// Parse absolute URLs as-is and resolve bare paths against a dummy origin
fn parse_url(raw: &str) -> Option<Url> {
    Url::parse(raw).ok().or_else(|| {
        Url::parse("http://localhost/")
            .ok()
            .and_then(|base| base.join(raw).ok())
    })
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Classify the acquisition channel of the current navigation context.
///
/// Precedence: `utm_source` query parameter, then referrer host, then direct.
/// A referrer without a parseable host is `unknown`.
pub fn classify(context: &NavigationContext) -> Classification {
    let url = parse_url(&context.url);
    let landing_page = url
        .as_ref()
        .map(|u| u.path().to_string())
        .unwrap_or_else(|| context.url.clone());
    let campaign = url.as_ref().and_then(|u| query_param(u, "utm_campaign"));
    let utm_source = url.as_ref().and_then(|u| query_param(u, "utm_source"));

    let channel = match (utm_source, context.referrer.as_deref()) {
        (Some(source), _) => channel_from_utm_source(&source),
        (None, Some(referrer)) if !referrer.trim().is_empty() => channel_from_referrer(referrer),
        _ => Channel::Direct,
    };

    Classification {
        channel,
        campaign,
        landing_page,
    }
}

/// Channel implied by a `utm_source` value; unrecognized sources are paid search
pub fn channel_from_utm_source(source: &str) -> Channel {
    let source = source.to_lowercase();
    UTM_SOURCE_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| source.contains(n)))
        .map(|(_, channel)| *channel)
        .unwrap_or(Channel::PaidSearch)
}

/// Channel implied by a referrer URL
pub fn channel_from_referrer(referrer: &str) -> Channel {
    let host = Url::parse(referrer)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase));
    let Some(host) = host else {
        return Channel::Unknown;
    };
    REFERRER_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| host.contains(n)))
        .map(|(_, channel)| *channel)
        .unwrap_or(Channel::Referral)
}

/// Device form factor, browser and OS of the current context
pub fn classify_device(context: &NavigationContext) -> DeviceInfo {
    let device_type = match context.viewport_width {
        Some(width) if width <= MOBILE_MAX_WIDTH => DeviceType::Mobile,
        Some(width) if width <= TABLET_MAX_WIDTH => DeviceType::Tablet,
        _ => DeviceType::Desktop,
    };
    let user_agent = context.user_agent.as_deref().unwrap_or("");
    DeviceInfo {
        device_type,
        browser: first_match(user_agent, BROWSERS),
        os: first_match(user_agent, OPERATING_SYSTEMS),
    }
}

fn first_match(user_agent: &str, names: &[&str]) -> String {
    names
        .iter()
        .find(|name| user_agent.contains(*name))
        .unwrap_or(&UNKNOWN)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_referrer_no_utm_is_direct() {
        let c = classify(&NavigationContext::new("https://example.com/listings"));
        assert_eq!(c.channel, Channel::Direct);
        assert_eq!(c.landing_page, "/listings");
        assert_eq!(c.campaign, None);
    }

    #[test]
    fn test_utm_source_takes_precedence() {
        let ctx = NavigationContext::new("/?utm_source=Facebook&utm_campaign=spring")
            .with_referrer("https://www.google.com/search");
        let c = classify(&ctx);
        assert_eq!(c.channel, Channel::SocialMedia);
        assert_eq!(c.campaign.as_deref(), Some("spring"));
        assert_eq!(c.landing_page, "/");
    }

    #[test]
    fn test_utm_source_rules() {
        assert_eq!(channel_from_utm_source("bing_ads"), Channel::OrganicSearch);
        assert_eq!(channel_from_utm_source("newsletter_email"), Channel::Email);
        assert_eq!(channel_from_utm_source("gmail"), Channel::Email);
        assert_eq!(channel_from_utm_source("adroll"), Channel::PaidSearch);
    }

    #[test]
    fn test_referrer_rules() {
        assert_eq!(channel_from_referrer("https://www.google.com/"), Channel::OrganicSearch);
        assert_eq!(channel_from_referrer("https://m.facebook.com/x"), Channel::SocialMedia);
        assert_eq!(channel_from_referrer("https://www.zillow.com/homedetails/1"), Channel::RealEstatePortal);
        assert_eq!(channel_from_referrer("https://blog.example.org/post"), Channel::Referral);
        assert_eq!(channel_from_referrer("not a url"), Channel::Unknown);
    }

    #[test]
    fn test_empty_referrer_is_direct() {
        let ctx = NavigationContext::new("https://example.com/").with_referrer("");
        assert_eq!(classify(&ctx).channel, Channel::Direct);
    }

    #[test]
    fn test_device_classification() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36 Edg/120.0";
        let device = classify_device(
            &NavigationContext::new("/").with_viewport_width(800).with_user_agent(ua),
        );
        assert_eq!(device.device_type, DeviceType::Tablet);
        assert_eq!(device.browser, "Chrome");
        assert_eq!(device.os, "Windows");

        let phone = classify_device(&NavigationContext::new("/").with_viewport_width(390));
        assert_eq!(phone.device_type, DeviceType::Mobile);
        assert_eq!(phone.browser, "Unknown");
        assert_eq!(phone.os, "Unknown");

        let wide = classify_device(&NavigationContext::new("/").with_viewport_width(1025));
        assert_eq!(wide.device_type, DeviceType::Desktop);
    }

    #[test]
    fn test_viewport_boundaries_inclusive() {
        let width = |w| classify_device(&NavigationContext::new("/").with_viewport_width(w)).device_type;
        assert_eq!(width(768), DeviceType::Mobile);
        assert_eq!(width(769), DeviceType::Tablet);
        assert_eq!(width(1024), DeviceType::Tablet);
        assert_eq!(width(1025), DeviceType::Desktop);
        assert_eq!(classify_device(&NavigationContext::new("/")).device_type, DeviceType::Desktop);
    }

    #[test]
    fn test_os_first_match_order() {
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/124.0 Mobile Safari/537.36";
        let device = classify_device(&NavigationContext::new("/").with_user_agent(android));
        // "Linux" precedes "Android" in the match list
        assert_eq!(device.os, "Linux");
        assert_eq!(device.browser, "Chrome");

        let ios = "Mozilla/5.0 (iPad; iOS 17_4) Firefox/125.0";
        assert_eq!(classify_device(&NavigationContext::new("/").with_user_agent(ios)).os, "iOS");

        let mac = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Safari/605.1.15";
        assert_eq!(classify_device(&NavigationContext::new("/").with_user_agent(mac)).os, "Unknown");
    }
}
