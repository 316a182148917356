//! Link extraction: scans only `<a>` start tags' `href` attribute. Other
//! tags (e.g. stray `<img src>`) are ignored, matching the validator's
//! narrower scope than a general-purpose HTML sanitizer.

use scraper::{Html, Selector};

/// Returns every non-empty `href` value found on an `<a>` element, in
/// document order.
pub fn extract_links(body_html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(body_html);
    let selector = Selector::parse("a").expect("static selector is valid");

    fragment
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| !href.is_empty())
        .map(|href| href.to_string())
        .collect()
}
