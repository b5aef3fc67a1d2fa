use super::descriptor::Guard;

pub fn is_applied(content: &str, guard: &Guard) -> bool {
    matched_token(content, guard).is_some()
}

pub fn matched_token<'a>(content: &str, guard: &'a Guard) -> Option<&'a str> {
    guard
        .tokens()
        .iter()
        .map(String::as_str)
        .find(|token| !token.is_empty() && content.contains(token))
}
