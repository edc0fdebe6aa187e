/// Expand `${VAR}` and `${VAR:-fallback}` placeholders in raw config text.
///
/// A variable that is unset (and has no fallback) keeps its placeholder so the
/// parse error, if any, points at the original text.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated placeholder, keep the tail verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        if name.is_empty() {
            out.push_str(&rest[start..start + 3 + end]);
        } else {
            let value = lookup(name).filter(|v| !v.is_empty() || fallback.is_none());
            match (value, fallback) {
                (Some(value), _) => out.push_str(&value),
                (None, Some(fallback)) => out.push_str(fallback),
                (None, None) => out.push_str(&rest[start..start + 3 + end]),
            }
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
