/// Sanitizes learner- and author-supplied text before it is stored.
///
/// Safe inline markup (`<b>`, `<p>`, ...) survives; scripts, iframes and
/// event-handler attributes are stripped. Surrounding whitespace is trimmed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}
