//! HTML templates for the authorization endpoint.
//!
//! Server-rendered consent and error pages. Every interpolated value comes
//! from a remote client document or a query string and is escaped.

use crate::identity::UserIdentity;
use crate::types::Client;

/// Shared CSS styles for all OAuth pages.
const SHARED_STYLES: &str = r#"
:root {
    --paper: #fbf8f3;
    --ink: #2b2622;
    --ink-dimmed: #7a7068;
    --accent: #00695c;
    --accent-dark: #004d40;
    --danger: #b3261e;
    --border: #e4ddd3;
    --radius: 8px;
}

* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: Georgia, "Iowan Old Style", "Palatino Linotype", serif;
    background: var(--paper);
    min-height: 100vh;
    display: flex;
    justify-content: center;
    align-items: center;
    color: var(--ink);
    line-height: 1.5;
}

.container {
    width: 100%;
    max-width: 440px;
    padding: 1rem;
}

.card {
    background: #fff;
    border: 1px solid var(--border);
    border-radius: var(--radius);
    padding: 1.5rem;
}

.client {
    display: flex;
    gap: 1rem;
    align-items: center;
    margin-bottom: 1rem;
}

.client img {
    width: 64px;
    height: 64px;
    object-fit: contain;
    border-radius: var(--radius);
}

.client-name {
    font-size: 1.25rem;
    font-weight: 600;
}

.client-url {
    font-size: 0.8rem;
    color: var(--ink-dimmed);
    word-break: break-all;
}

.summary {
    font-style: italic;
    margin-bottom: 1rem;
}

.scope-list {
    list-style: none;
    margin: 0.75rem 0 1.25rem;
}

.scope-item {
    padding: 0.5rem 0;
    border-top: 1px solid var(--border);
}

.scope-name {
    font-family: ui-monospace, monospace;
    font-size: 0.8rem;
    color: var(--ink-dimmed);
}

.btn-group {
    display: flex;
    gap: 0.75rem;
}

.btn {
    flex: 1;
    padding: 0.625rem 1rem;
    border: 1px solid var(--accent);
    border-radius: var(--radius);
    font-size: 0.95rem;
    cursor: pointer;
}

.btn-primary {
    background: var(--accent);
    color: #fff;
}

.btn-primary:hover {
    background: var(--accent-dark);
}

.btn-secondary {
    background: #fff;
    color: var(--accent);
}

.error-title {
    font-size: 1.25rem;
    font-weight: 600;
    color: var(--danger);
    margin-bottom: 0.5rem;
}

.error-code {
    font-family: ui-monospace, monospace;
    font-size: 0.8rem;
    color: var(--ink-dimmed);
    margin-top: 1rem;
}
"#;

/// Base HTML template wrapper.
fn html_page(title: &str, content: &str) -> String {
    let mut html = String::with_capacity(content.len() + SHARED_STYLES.len() + 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str("    <meta name=\"referrer\" content=\"no-referrer\">\n");
    html.push_str("    <title>");
    html.push_str(&html_escape(title));
    html.push_str("</title>\n    <style>");
    html.push_str(SHARED_STYLES);
    html.push_str("</style>\n</head>\n<body>\n    <div class=\"container\">\n");
    html.push_str(content);
    html.push_str("\n    </div>\n</body>\n</html>");
    html
}

/// Renders the consent page.
///
/// The form posts back to the authorization endpoint with either an
/// `approve` or a `cancel` field. The pending authorization travels in the
/// cookie, not in the form.
///
/// # Arguments
///
/// * `client` - Resolved client metadata
/// * `scopes` - Requested scopes with their descriptions
/// * `user` - The user being asked
pub fn render_consent_form(client: &Client, scopes: &[(String, String)], user: &UserIdentity) -> String {
    let mut content = String::with_capacity(2048);

    content.push_str("<div class=\"card\">\n<div class=\"client\">\n<img src=\"");
    content.push_str(&html_escape(&client.logo));
    content.push_str("\" alt=\"\">\n<div>\n<div class=\"client-name\">");
    content.push_str(&html_escape(&client.name));
    content.push_str("</div>\n<a class=\"client-url\" href=\"");
    content.push_str(&html_escape(&client.url));
    content.push_str("\" rel=\"noopener noreferrer\">");
    content.push_str(&html_escape(&client.url));
    content.push_str("</a>\n</div>\n</div>\n\n");

    content.push_str("<p class=\"summary\">");
    content.push_str(&html_escape(&client.summary));
    content.push_str("</p>\n\n<p>");
    content.push_str(&html_escape(user.display()));
    content.push_str(", this application would like:</p>\n\n");

    content.push_str("<ul class=\"scope-list\">\n");
    for (name, description) in scopes {
        content.push_str("<li class=\"scope-item\">\n<div>");
        content.push_str(&html_escape(description));
        content.push_str("</div>\n<div class=\"scope-name\">");
        content.push_str(&html_escape(name));
        content.push_str("</div>\n</li>\n");
    }
    content.push_str("</ul>\n\n");

    content.push_str("<form method=\"POST\">\n<div class=\"btn-group\">\n");
    content.push_str("<button type=\"submit\" name=\"cancel\" value=\"1\" class=\"btn btn-secondary\">Cancel</button>\n");
    content.push_str("<button type=\"submit\" name=\"approve\" value=\"1\" class=\"btn btn-primary\">Allow</button>\n");
    content.push_str("</div>\n</form>\n</div>");

    html_page("Authorize application", &content)
}

/// Renders an error page, used whenever the redirect URI cannot be trusted.
///
/// # Arguments
///
/// * `error_code` - OAuth error code (e.g., "invalid_request")
/// * `error_description` - Human-readable error description
pub fn render_error_page(error_code: &str, error_description: &str) -> String {
    let mut content = String::with_capacity(512);

    content.push_str("<div class=\"card\" style=\"text-align: center;\">\n");
    content.push_str("<div class=\"error-title\">Authorization Error</div>\n");
    content.push_str("<div class=\"error-description\">");
    content.push_str(&html_escape(error_description));
    content.push_str("</div>\n<div class=\"error-code\">");
    content.push_str(&html_escape(error_code));
    content.push_str("</div>\n</div>");

    html_page("Error", &content)
}

/// Simple HTML escaping to prevent XSS.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
