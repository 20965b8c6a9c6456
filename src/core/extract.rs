//! Text-level token extraction from portal pages.
//!
//! Form values come from the parsed HTML. Inline script variables are only
//! pattern-matched: the portal's JavaScript is never evaluated, so these
//! helpers return the raw literal text and leave decoding to the caller.

use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;

/// A named token was not present in a response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("token `{0}` not found")]
pub struct TokenNotFound(pub String);

/// Read the `value` attribute of the first element whose `id` or `name`
/// equals `field_id`.
pub fn form_value(html: &str, field_id: &str) -> Option<String> {
    let escaped = field_id.replace('\\', "\\\\").replace('"', "\\\"");
    let selector = Selector::parse(&format!(r#"[id="{escaped}"], [name="{escaped}"]"#)).ok()?;

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(str::to_string)
}

/// Return the right-hand side of `var <variable>=<value>;var <terminator>=`.
///
/// Whitespace around `=`, `;` and `var` is tolerated. The value is returned
/// trimmed but otherwise untouched.
pub fn script_assignment(
    body: &str,
    variable: &str,
    terminator: &str,
) -> Result<String, TokenNotFound> {
    let pattern = format!(
        r"(?s)\bvar\s+{}\s*=\s*(.*?)\s*;\s*var\s+{}\s*=",
        regex::escape(variable),
        regex::escape(terminator)
    );
    let re = Regex::new(&pattern).map_err(|_| TokenNotFound(variable.to_string()))?;

    re.captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| TokenNotFound(variable.to_string()))
}

/// Return the `{...}` object literal assigned by `var <variable>=`.
///
/// Braces inside single- or double-quoted strings are skipped.
pub fn script_object(body: &str, variable: &str) -> Result<String, TokenNotFound> {
    let not_found = || TokenNotFound(variable.to_string());
    let pattern = format!(r"\bvar\s+{}\s*=\s*\{{", regex::escape(variable));
    let re = Regex::new(&pattern).map_err(|_| not_found())?;
    let start = re.find(body).ok_or_else(not_found)?.end() - 1;

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, ch) in body[start..].char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(body[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    Err(not_found())
}

/// Swap single quotes for double quotes so a JavaScript literal can go
/// through a JSON decoder.
pub fn normalize_quotes(fragment: &str) -> String {
    fragment.replace('\'', "\"")
}

/// Case-insensitive check that every fragment appears in `body`, in order.
///
/// The portal's failure messages vary slightly between versions, so a
/// phrase is matched as fragments ("log-in information", "is incorrect").
pub fn contains_phrase(body: &str, fragments: &[&str]) -> bool {
    let haystack = body.to_lowercase();
    let mut from = 0;
    for fragment in fragments {
        let needle = fragment.to_lowercase();
        match haystack[from..].find(&needle) {
            Some(pos) => from += pos + needle.len(),
            None => return false,
        }
    }
    !fragments.is_empty()
}
