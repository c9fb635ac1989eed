//! Continuation cursors carried in `link` headers.

use reqwest::header::{HeaderMap, LINK};

/// Query parameter holding the cursor.
pub const CURSOR_PARAM: &str = "cursor";

/// Extracts the percent-decoded `cursor` of the `rel="next"` relation.
///
/// Accepts headers of the form `<url?...&cursor=VALUE...>; rel="next"`,
/// possibly alongside other comma-separated relations.
#[must_use]
pub fn parse_next_cursor(link: &str) -> Option<String> {
    link.split(',').find_map(|relation| {
        let (target, params) = relation.trim().split_once(';')?;
        let is_next = params.split(';').any(|param| {
            param
                .trim()
                .split_once('=')
                .is_some_and(|(key, value)| {
                    key.trim().eq_ignore_ascii_case("rel")
                        && value.trim().trim_matches('"').eq_ignore_ascii_case("next")
                })
        });
        if !is_next {
            return None;
        }

        let url = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        let (_, query) = url.split_once('?')?;
        let query = query.split('#').next().unwrap_or_default();

        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == CURSOR_PARAM)
            .map(|(_, value)| value.into_owned())
    })
}

/// Reads the next cursor from a response's `link` header.
#[must_use]
pub fn next_cursor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(LINK)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_next_cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_cursor_is_percent_decoded() {
        assert_eq!(
            parse_next_cursor("<https://x?cursor=ab%20c>; rel=\"next\""),
            Some(String::from("ab c"))
        );
    }

    #[test]
    fn test_picks_next_among_relations() {
        let link = "<https://x/logs?cursor=old&limit=10>; rel=\"prev\", \
                    <https://x/logs?limit=10&cursor=new%2Ftoken>; rel=\"next\"";
        assert_eq!(parse_next_cursor(link), Some(String::from("new/token")));
    }

    #[test]
    fn test_no_next_relation() {
        assert_eq!(parse_next_cursor("<https://x?cursor=a>; rel=\"prev\""), None);
        assert_eq!(parse_next_cursor("<https://x?limit=5>; rel=\"next\""), None);
        assert_eq!(parse_next_cursor(""), None);
    }

    #[test]
    fn test_missing_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_cursor(&headers), None);

        headers.insert(LINK, HeaderValue::from_static("<https://x?cursor=z>; rel=next"));
        assert_eq!(next_cursor(&headers), Some(String::from("z")));
    }
}
