//! Minimal microformats2 reader for client-id documents.
//!
//! Only what client discovery needs: the first `h-app` (or legacy `h-x-app`)
//! entry with its `p-name`, `u-logo`, `p-summary` and `u-url` properties, and
//! the first `rel="redirect_uri"` link in the document. Values are returned
//! as written; resolving relative URLs is the caller's job.

use scraper::{ElementRef, Html, Selector};

use super::error::DiscoveryError;

/// Properties of an `h-app` entry plus the document's redirect URI relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDocument {
    /// `p-name`, or the implied name.
    pub name: String,
    /// `u-logo`, as written.
    pub logo: String,
    /// `p-summary`.
    pub summary: String,
    /// `u-url`, as written, if present.
    pub url: Option<String>,
    /// First `rel="redirect_uri"` href, as written.
    pub redirect_uri: String,
}

#[derive(Default)]
struct AppProperties {
    name: Option<String>,
    logo: Option<String>,
    summary: Option<String>,
    url: Option<String>,
}

/// Parses a client-id document.
///
/// # Errors
///
/// Returns `DiscoveryError::MissingApp` when the document has no `h-app`
/// entry and `DiscoveryError::MissingField` when name, logo, summary or the
/// redirect URI relation is absent or empty.
pub fn parse_app_document(html: &str) -> Result<AppDocument, DiscoveryError> {
    let document = Html::parse_document(html);

    let app_selector = selector(".h-app, .h-x-app")?;
    let app = document
        .select(&app_selector)
        .next()
        .ok_or(DiscoveryError::MissingApp)?;

    let mut props = AppProperties::default();
    collect_properties(app, &mut props);

    let name = props
        .name
        .or_else(|| implied_name(app))
        .filter(|v| !v.is_empty())
        .ok_or(DiscoveryError::MissingField("name"))?;
    let logo = props
        .logo
        .filter(|v| !v.is_empty())
        .ok_or(DiscoveryError::MissingField("logo"))?;
    let summary = props
        .summary
        .filter(|v| !v.is_empty())
        .ok_or(DiscoveryError::MissingField("summary"))?;
    let redirect_uri =
        first_rel(&document, "redirect_uri")?.ok_or(DiscoveryError::MissingField("redirect_uri"))?;

    Ok(AppDocument {
        name,
        logo,
        summary,
        url: props.url.filter(|v| !v.is_empty()),
        redirect_uri,
    })
}

fn selector(css: &str) -> Result<Selector, DiscoveryError> {
    Selector::parse(css).map_err(|e| DiscoveryError::ParseError(e.to_string()))
}

/// Walks the entry's descendants, stopping at nested microformat roots so
/// that a nested `h-card`'s name does not become the app's name.
fn collect_properties(root: ElementRef<'_>, props: &mut AppProperties) {
    for child in root.children().filter_map(ElementRef::wrap) {
        for class in child.value().classes() {
            match class {
                "p-name" if props.name.is_none() => props.name = Some(text_value(child)),
                "p-summary" if props.summary.is_none() => props.summary = Some(text_value(child)),
                "u-logo" if props.logo.is_none() => props.logo = Some(url_value(child)),
                "u-url" if props.url.is_none() => props.url = Some(url_value(child)),
                _ => {}
            }
        }

        let nested_root = child.value().classes().any(is_root_class);
        if !nested_root {
            collect_properties(child, props);
        }
    }
}

fn is_root_class(class: &str) -> bool {
    class
        .strip_prefix("h-")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_lowercase() || c == '-'))
}

/// `p-*` parsing: `title` on abbr, `value` on data/input, `alt` on
/// img/area, otherwise the collapsed text content.
fn text_value(element: ElementRef<'_>) -> String {
    let el = element.value();
    let attr = match el.name() {
        "abbr" => el.attr("title"),
        "data" | "input" => el.attr("value"),
        "img" | "area" => el.attr("alt"),
        _ => None,
    };
    match attr {
        Some(value) => value.trim().to_string(),
        None => collapsed_text(element),
    }
}

/// `u-*` parsing: the element's URL attribute, otherwise its text.
fn url_value(element: ElementRef<'_>) -> String {
    let el = element.value();
    let attr = match el.name() {
        "a" | "area" | "link" => el.attr("href"),
        "img" | "audio" | "source" | "iframe" => el.attr("src"),
        "video" => el.attr("src").or_else(|| el.attr("poster")),
        "object" => el.attr("data"),
        "abbr" => el.attr("title"),
        "data" | "input" => el.attr("value"),
        _ => None,
    };
    match attr {
        Some(value) => value.trim().to_string(),
        None => collapsed_text(element),
    }
}

fn implied_name(root: ElementRef<'_>) -> Option<String> {
    let el = root.value();
    let attr = match el.name() {
        "img" | "area" => el.attr("alt"),
        "abbr" => el.attr("title"),
        _ => None,
    };
    Some(attr.map_or_else(|| collapsed_text(root), |v| v.trim().to_string()))
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First href of an `a`, `area` or `link` element whose `rel` list contains `rel`.
fn first_rel(document: &Html, rel: &str) -> Result<Option<String>, DiscoveryError> {
    let rel_selector = selector("a[rel][href], area[rel][href], link[rel][href]")?;
    Ok(document
        .select(&rel_selector)
        .find(|el| {
            el.value()
                .attr("rel")
                .is_some_and(|rels| rels.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case(rel)))
        })
        .and_then(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty()))
}
