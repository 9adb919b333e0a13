//! HTML to text extraction, blocked-page detection and truncation.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

pub const TRUNCATION_MARKER: &str = "...";
pub const MAX_ELEMENTS: usize = 5;
pub const MAX_ELEMENT_CHARS: usize = 200;

const MIN_TEXT_CHARS: usize = 100;

/// Never contribute visible text.
const INVISIBLE_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];
/// Page chrome dropped from the main content.
const CHROME_TAGS: [&str; 3] = ["nav", "header", "footer"];

const JS_REQUIRED_MARKERS: [&str; 5] = [
    "enable javascript",
    "javascript is required",
    "javascript is disabled",
    "please enable js",
    "requires javascript",
];
const BOT_CHALLENGE_MARKERS: [&str; 7] = [
    "captcha",
    "checking your browser",
    "verify you are human",
    "are you a robot",
    "cf-browser-verification",
    "access denied",
    "unusual traffic",
];
const REDIRECT_MARKERS: [&str; 3] = [
    "you are being redirected",
    "redirecting",
    "if you are not redirected",
];
const CONSENT_MARKERS: [&str; 4] = [
    "accept all cookies",
    "we use cookies",
    "cookie settings",
    "manage consent",
];
const ARTICLE_WORDS: [&str; 4] = ["article", "published", "posted", "author"];
const SPA_MARKERS: [&str; 5] = [
    "id=\"root\"",
    "id=\"app\"",
    "id=\"__next\"",
    "ng-version",
    "data-reactroot",
];

static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static TITLE_FALLBACKS: LazyLock<Selector> = LazyLock::new(|| selector("h1, .title, #title"));
static MAIN_CONTENT: LazyLock<[Selector; 4]> = LazyLock::new(|| {
    [
        selector("main"),
        selector("article"),
        selector(".content"),
        selector("#content"),
    ]
});
static BODY: LazyLock<Selector> = LazyLock::new(|| selector("body"));
static SCRIPT: LazyLock<Selector> = LazyLock::new(|| selector("script"));
static NOSCRIPT: LazyLock<Selector> = LazyLock::new(|| selector("noscript"));
static ARTICLE_OR_MAIN: LazyLock<Selector> = LazyLock::new(|| selector("article, main"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// What a strategy learned about one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub title: String,
    pub text: String,
    pub elements: Vec<String>,
    /// Structured output from a natural-language extraction, when requested.
    pub extracted: Option<serde_json::Value>,
}

/// Parsed view of an HTML document used for extraction and blocking checks.
pub struct HtmlPage {
    title: String,
    main_text: String,
    visible_text: String,
    script_count: usize,
    noscript_chars: usize,
    has_article: bool,
    spa_shell: bool,
    elements: Vec<String>,
}

impl HtmlPage {
    pub fn parse(html: &str, css_selector: Option<&str>) -> Self {
        let document = Html::parse_document(html);
        let lowered = html.to_lowercase();

        let title = document
            .select(&TITLE)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .or_else(|| {
                document
                    .select(&TITLE_FALLBACKS)
                    .map(element_text)
                    .find(|t| !t.is_empty())
            })
            .unwrap_or_default();

        let root = document.root_element();
        let visible_text = visible_text_of(root, &[]);

        let main_text = MAIN_CONTENT
            .iter()
            .map(|sel| {
                document
                    .select(sel)
                    .map(|el| visible_text_of(el, &CHROME_TAGS))
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| {
                let body = document.select(&BODY).next().unwrap_or(root);
                visible_text_of(body, &CHROME_TAGS)
            });

        let noscript_chars = document
            .select(&NOSCRIPT)
            .map(|el| collapse(&el.text().collect::<Vec<_>>().join(" ")).chars().count())
            .sum();

        let elements = css_selector
            .and_then(|css| Selector::parse(css).ok())
            .map(|sel| {
                document
                    .select(&sel)
                    .take(MAX_ELEMENTS)
                    .map(|el| element_text(el).chars().take(MAX_ELEMENT_CHARS).collect())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            title,
            main_text,
            visible_text,
            script_count: document.select(&SCRIPT).count(),
            noscript_chars,
            has_article: document.select(&ARTICLE_OR_MAIN).next().is_some(),
            spa_shell: SPA_MARKERS.iter().any(|m| lowered.contains(m)),
            elements,
        }
    }

    /// Why this page should be treated as a failed scrape, if at all.
    pub fn blocking_reason(&self) -> Option<String> {
        let text = self.visible_text.to_lowercase();
        let len = text.chars().count();

        if len < MIN_TEXT_CHARS {
            return Some(format!("content too short ({len} chars)"));
        }
        if JS_REQUIRED_MARKERS.iter().any(|m| text.contains(m)) && len < 2000 {
            return Some("page requires JavaScript".to_string());
        }
        if BOT_CHALLENGE_MARKERS.iter().any(|m| text.contains(m)) && len < 2000 {
            return Some("bot challenge detected".to_string());
        }
        if len < 1000 && REDIRECT_MARKERS.iter().any(|m| text.contains(m)) {
            return Some("redirect interstitial".to_string());
        }
        if len < 2000
            && !self.has_article
            && CONSENT_MARKERS.iter().any(|m| text.contains(m))
            && !ARTICLE_WORDS.iter().any(|w| text.contains(w))
        {
            return Some("consent wall".to_string());
        }
        if self.script_count > 10 && len < 1000 && self.spa_shell {
            return Some("unrendered single-page app".to_string());
        }
        if self.noscript_chars * 2 > len {
            return Some("noscript fallback dominates page".to_string());
        }
        None
    }

    pub fn into_content(self) -> PageContent {
        let text = if self.main_text.is_empty() {
            self.visible_text
        } else {
            self.main_text
        };
        PageContent {
            title: self.title,
            text,
            elements: self.elements,
            extracted: None,
        }
    }
}

pub fn is_json_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.contains("application/json") || lowered.contains("+json")
}

/// Cuts at `max_chars`, backing up to the last space when it falls within
/// the final 20% of the window, and appends [`TRUNCATION_MARKER`].
pub fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let window: String = text.chars().take(max_chars).collect();
    let cut = match window.rfind(' ') {
        Some(pos) if window[..pos].chars().count() * 5 >= max_chars * 4 => &window[..pos],
        _ => window.as_str(),
    };
    format!("{}{}", cut.trim_end(), TRUNCATION_MARKER)
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse(&element.text().collect::<Vec<_>>().join(" "))
}

fn visible_text_of(element: ElementRef<'_>, extra_skip: &[&str]) -> String {
    let skipped = |name: &str| INVISIBLE_TAGS.contains(&name) || extra_skip.contains(&name);

    let mut pieces = Vec::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| skipped(el.name()))
        });
        if !hidden {
            pieces.push(text.trim().to_string());
        }
    }
    collapse(&pieces.join(" "))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_html(body: &str) -> String {
        format!(
            "<html><head><title>Test Page</title><script>var x = 1;</script></head>\
             <body><nav>Home About</nav><main><p>{body}</p></main><footer>Copyright</footer></body></html>"
        )
    }

    #[test]
    fn extracts_title_and_main_text_without_chrome_or_scripts() {
        let page = HtmlPage::parse(&article_html(&"Paris is lovely. ".repeat(10)), None);
        assert!(page.blocking_reason().is_none());

        let content = page.into_content();
        assert_eq!(content.title, "Test Page");
        assert!(content.text.starts_with("Paris is lovely."));
        assert!(!content.text.contains("var x"));
        assert!(!content.text.contains("Home About"));
        assert!(!content.text.contains("Copyright"));
    }

    #[test]
    fn css_selector_keeps_at_most_five_short_elements() {
        let items: String = (0..8)
            .map(|i| format!("<li class=\"item\">{}{}</li>", i, "x".repeat(300)))
            .collect();
        let html = format!("<html><body><ul>{items}</ul></body></html>");
        let content = HtmlPage::parse(&html, Some("li.item")).into_content();

        assert_eq!(content.elements.len(), MAX_ELEMENTS);
        assert!(content
            .elements
            .iter()
            .all(|e| e.chars().count() == MAX_ELEMENT_CHARS));
    }

    #[test]
    fn short_and_challenge_pages_are_blocked() {
        let short = HtmlPage::parse("<html><body><p>Hi</p></body></html>", None);
        assert!(short.blocking_reason().unwrap().contains("too short"));

        let challenge = HtmlPage::parse(
            &article_html(&format!("Checking your browser before accessing. {}", "wait ".repeat(30))),
            None,
        );
        assert_eq!(challenge.blocking_reason().as_deref(), Some("bot challenge detected"));

        let js = HtmlPage::parse(
            &article_html(&format!("Please enable JavaScript to continue. {}", "x ".repeat(60))),
            None,
        );
        assert_eq!(js.blocking_reason().as_deref(), Some("page requires JavaScript"));
    }

    #[test]
    fn noscript_heavy_page_is_blocked() {
        let html = format!(
            "<html><body><noscript>{}</noscript><p>{}</p></body></html>",
            "You need a modern browser. ".repeat(10),
            "Short visible body text here. ".repeat(4)
        );
        let page = HtmlPage::parse(&html, None);
        assert_eq!(
            page.blocking_reason().as_deref(),
            Some("noscript fallback dominates page")
        );
    }

    #[test]
    fn truncation_respects_word_boundaries() {
        let text = "alpha beta gamma delta epsilon";
        let truncated = truncate_at_word(text, 20);
        assert_eq!(truncated, "alpha beta gamma...");
        assert!(truncated.chars().count() <= 20 + TRUNCATION_MARKER.len());

        assert_eq!(truncate_at_word("short", 20), "short");
        assert_eq!(truncate_at_word(&"x".repeat(30), 10), format!("{}...", "x".repeat(10)));
    }
}
