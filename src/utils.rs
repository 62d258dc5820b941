/// Shared utility functions for the briefing service
///
/// Strip HTML-style markup from official forecast narratives.
///
/// Forecast centers publish bottom lines and hazard discussions as rich
/// text. Before that text goes into a prompt it is flattened: tag-delimited
/// spans become a single space, a fixed set of named entities is decoded,
/// and runs of whitespace collapse to one space. Stripping already-stripped
/// text is a no-op.
///
/// # Examples
///
/// ```
/// use avalanche_briefing_service::utils::strip_markup;
///
/// assert_eq!(strip_markup("<p>A &amp; B</p>"), "A & B");
/// assert_eq!(strip_markup("plain text"), "plain text");
/// ```
pub fn strip_markup(input: &str) -> String {
    let tag_re = regex::Regex::new(r"<[^>]*>").unwrap();
    let without_tags = tag_re.replace_all(input, " ");

    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&rsquo;", "'")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"");

    let ws_re = regex::Regex::new(r"\s+").unwrap();
    ws_re.replace_all(&decoded, " ").trim().to_string()
}

/// Convert wind direction in degrees to a 16-point cardinal direction.
pub fn degrees_to_cardinal(degrees: f64) -> &'static str {
    const DIRECTIONS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let index = ((degrees / 22.5).round() as usize) % 16;
    DIRECTIONS[index]
}
