use shelfcast_transport::ChatId;

const LINK_PREFIXES: [&str; 4] = ["https://t.me/", "http://t.me/", "https://telegram.me/", "t.me/"];

/// Turn what an operator typed into a chat address.
///
/// Public links become `@name`; ids and usernames pass through trimmed.
///
/// ```
/// use shelfcast_workflow::parse_destination;
/// assert_eq!(parse_destination(" https://t.me/shelf ").unwrap().as_str(), "@shelf");
/// assert_eq!(parse_destination("-1001234567890").unwrap().as_str(), "-1001234567890");
/// assert!(parse_destination("   ").is_none());
/// ```
pub fn parse_destination(input: &str) -> Option<ChatId> {
    let input = input.trim();
    for prefix in LINK_PREFIXES {
        if let Some(rest) = input.strip_prefix(prefix) {
            let name = rest.split(['/', '?']).next().unwrap_or_default().trim_start_matches('@');
            return (!name.is_empty()).then(|| ChatId::new(format!("@{name}")));
        }
    }
    if input.is_empty() || input.contains(char::is_whitespace) {
        return None;
    }
    Some(ChatId::new(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("@shelf", Some("@shelf"))]
    #[case("http://t.me/shelf", Some("@shelf"))]
    #[case("https://t.me/shelf/", Some("@shelf"))]
    #[case("https://t.me/shelf/123", Some("@shelf"))]
    #[case("https://t.me/shelf?start=x", Some("@shelf"))]
    #[case("t.me/shelf", Some("@shelf"))]
    #[case("https://t.me/", None)]
    #[case("-100123", Some("-100123"))]
    #[case("two words", None)]
    #[case("", None)]
    fn destinations(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_destination(input).as_ref().map(ChatId::as_str), expected);
    }
}
