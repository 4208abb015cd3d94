/// Interpret an operator's free-text restart report as healthy / not healthy.
///
/// An explicit `true`/`false` answer decides; failing that, `healthy` /
/// `unhealthy` does. Within each tier the last token wins, so a report that
/// walks through "False ... then True" resolves to the final answer.
/// A preceding `not` negates. No verdict at all means not healthy.
pub fn parse_verdict(text: &str) -> bool {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect();

    let mut answer = None;
    let mut condition = None;
    for (i, token) in tokens.iter().enumerate() {
        let negated = i > 0 && tokens[i - 1] == "not";
        match token.as_str() {
            "true" => answer = Some(!negated),
            "false" => answer = Some(false),
            "healthy" => condition = Some(!negated),
            "unhealthy" => condition = Some(false),
            _ => {}
        }
    }

    answer.or(condition).unwrap_or(false)
}
