//! Text extraction helpers for statement pages

use scraper::{ElementRef, Node, Selector};

/// Elements under `root` matching `css`, in document order; empty when the
/// selector does not parse
pub fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => root.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    let first = root.select(&selector).next();
    first
}

/// Text of a `<pre>` (or any element) with `<br>` as a newline and a line
/// break after every nested `<div>` line.
pub fn pre_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    out
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Element(el) => {
                let is_line = el.name() == "div";
                if let Some(child) = ElementRef::wrap(child) {
                    push_text(child, out);
                }
                if is_line && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Every text node of `element` joined by single spaces, whitespace runs
/// collapsed
pub fn squashed_text(element: ElementRef<'_>) -> String {
    squash_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the handful of entities judges emit inside regex-extracted `<pre>`
/// bodies
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first_pre(html: &str) -> String {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("pre").unwrap();
        pre_text(doc.select(&sel).next().unwrap())
    }

    #[test]
    fn test_pre_text_plain() {
        assert_eq!(first_pre("<pre>3\n1 2 3\n</pre>"), "3\n1 2 3\n");
    }

    #[test]
    fn test_pre_text_br_is_newline() {
        assert_eq!(first_pre("<pre>1 2<br>3 4<br/>5</pre>"), "1 2\n3 4\n5");
    }

    #[test]
    fn test_pre_text_div_lines() {
        let html = r#"<pre><div class="l">2</div><div class="l">1 2</div><div class="l">3</div></pre>"#;
        assert_eq!(first_pre(html), "2\n1 2\n3\n");
    }

    #[test]
    fn test_squashed_text() {
        let doc = Html::parse_fragment("<p>Time  Limit:\n <b>2 sec</b> / Memory</p>");
        let sel = Selector::parse("p").unwrap();
        assert_eq!(
            squashed_text(doc.select(&sel).next().unwrap()),
            "Time Limit: 2 sec / Memory"
        );
    }

    #[test]
    fn test_select_helpers() {
        let doc = Html::parse_document("<div><p class=x>1</p><p>2</p></div>");
        let root = doc.root_element();
        assert_eq!(select_all(root, "p").len(), 2);
        assert_eq!(
            select_first(root, "p.x").map(|p| p.inner_html()),
            Some("1".to_string())
        );
        assert!(select_all(root, "p[").is_empty());
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt; b &amp;&amp; c &gt; d"), "a < b && c > d");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }
}
