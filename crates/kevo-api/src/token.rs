//! Login-page scraping.
//!
//! The portal's `/signin` form is protected by a Rails-style
//! `authenticity_token` hidden input. We scan every `<input>` tag on the
//! page rather than following a fixed DOM path, so layout changes around
//! the form don't break login.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

/// Name attribute of the hidden CSRF input on the login page.
pub const TOKEN_FIELD: &str = "authenticity_token";

// An unterminated comment runs to the end of the document.
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|\z)").expect("comment regex"));

static INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<input\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#).expect("input tag regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute regex")
});

/// Extract the `authenticity_token` value from a login page.
///
/// Returns the value of the first `<input name="authenticity_token">`
/// outside HTML comments. Fails with [`Error::TokenNotFound`] when no such input exists or when
/// that input carries no (or an empty) value.
pub fn extract_authenticity_token(html: &str) -> Result<String, Error> {
    let html = COMMENT_RE.replace_all(html, "");
    let field = INPUT_RE
        .captures_iter(&html)
        .filter_map(|caps| caps.get(1))
        .map(|attrs| parse_attributes(attrs.as_str()))
        .find(|attrs| attribute(attrs, "name") == Some(TOKEN_FIELD))
        .ok_or(Error::TokenNotFound)?;

    match attribute(&field, "value") {
        Some(value) if !value.is_empty() => Ok(decode_entities(value)),
        _ => Err(Error::TokenNotFound),
    }
}

/// Split the inside of a tag into `(lowercased name, raw value)` pairs.
fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some((name, value.to_owned()))
        })
        .collect()
}

fn attribute<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Decode the handful of entities Rails emits inside attribute values.
fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_owned();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&#43;", "+")
        .replace("&#x2B;", "+")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><meta name="csrf-param" content="authenticity_token"></head>
  <body>
    <form action="/signin" accept-charset="UTF-8" method="post">
      <input name="utf8" type="hidden" value="&#x2713;" />
      <input type="hidden" name="authenticity_token" value="abc123==" />
      <input type="text" name="user[username]" id="user_username" />
    </form>
  </body>
</html>"#;

    #[test]
    fn finds_token_in_login_form() {
        assert_eq!(extract_authenticity_token(LOGIN_PAGE).unwrap(), "abc123==");
    }

    #[test]
    fn attribute_order_and_nesting_do_not_matter() {
        let html = r#"<div><section><p>
            <INPUT value='tok-9' TYPE=hidden Name="authenticity_token">
        </p></section></div>"#;
        assert_eq!(extract_authenticity_token(html).unwrap(), "tok-9");
    }

    #[test]
    fn unquoted_values_are_accepted() {
        let html = "<input name=authenticity_token value=plain-token>";
        assert_eq!(extract_authenticity_token(html).unwrap(), "plain-token");
    }

    #[test]
    fn quoted_gt_inside_attribute_does_not_end_tag() {
        let html = r#"<input data-x="a>b" name="authenticity_token" value="ok">"#;
        assert_eq!(extract_authenticity_token(html).unwrap(), "ok");
    }

    #[test]
    fn entities_are_decoded() {
        let html = r#"<input name="authenticity_token" value="a&#43;b&amp;c">"#;
        assert_eq!(extract_authenticity_token(html).unwrap(), "a+b&c");
    }

    #[test]
    fn first_matching_field_wins() {
        let html = r#"
            <input name="authenticity_token" value="first">
            <input name="authenticity_token" value="second">"#;
        assert_eq!(extract_authenticity_token(html).unwrap(), "first");
    }

    #[test]
    fn commented_out_inputs_are_skipped() {
        let html = r#"
            <!-- <input name="authenticity_token" value="stale"> -->
            <form>
              <!--
                <input name="authenticity_token" value="also-stale">
              -->
              <input name="authenticity_token" value="live">
            </form>"#;
        assert_eq!(extract_authenticity_token(html).unwrap(), "live");
    }

    #[test]
    fn input_inside_unterminated_comment_is_not_found() {
        let html = r#"<!-- <input name="authenticity_token" value="hidden">"#;
        assert!(matches!(
            extract_authenticity_token(html),
            Err(Error::TokenNotFound)
        ));
    }

    #[test]
    fn missing_field_is_token_not_found() {
        let html = r#"<form><input name="user[username]" value="x"></form>"#;
        assert!(matches!(
            extract_authenticity_token(html),
            Err(Error::TokenNotFound)
        ));
    }

    #[test]
    fn field_without_value_is_token_not_found() {
        let html = r#"<input type="hidden" name="authenticity_token">"#;
        assert!(matches!(
            extract_authenticity_token(html),
            Err(Error::TokenNotFound)
        ));

        let empty = r#"<input type="hidden" name="authenticity_token" value="">"#;
        assert!(matches!(
            extract_authenticity_token(empty),
            Err(Error::TokenNotFound)
        ));
    }

    #[test]
    fn meta_tag_with_same_name_is_ignored() {
        let html = r#"<meta name="authenticity_token" content="nope">"#;
        assert!(matches!(
            extract_authenticity_token(html),
            Err(Error::TokenNotFound)
        ));
    }
}
