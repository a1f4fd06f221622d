pub const DEFAULT_TITLE_LIMIT: usize = 30;

const ELLIPSIS: &str = "...";
const SEGMENT_SEPARATOR: &str = " - ";
const MIN_SEGMENT_CHARS: usize = 2;

/// Shortens raw window titles into legend-sized display names.
#[derive(Debug, Clone)]
pub struct WindowNameNormalizer {
    browsers: Vec<String>,
    browser_suffixes: Vec<String>,
    title_limit: usize,
}

impl Default for WindowNameNormalizer {
    fn default() -> Self {
        Self {
            browsers: ["chrome", "firefox", "brave", "opera"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            browser_suffixes: ["- Google Chrome", "- Mozilla Firefox", "- Brave", "- Opera"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            title_limit: DEFAULT_TITLE_LIMIT,
        }
    }
}

impl WindowNameNormalizer {
    pub fn with_title_limit(mut self, title_limit: usize) -> Self {
        self.title_limit = title_limit;
        self
    }

    pub fn is_browser(&self, app_name: &str) -> bool {
        let app = app_name.to_lowercase();
        self.browsers.iter().any(|browser| app.contains(browser.as_str()))
    }

    pub fn normalize(&self, app_name: &str, window_title: &str) -> String {
        if window_title.is_empty() {
            return String::new();
        }
        if self.is_browser(app_name) {
            return self.page_title(window_title);
        }
        truncate(window_title, self.title_limit)
    }

    /// Browsers title windows "Page - Site - Browser". The shortest segment
    /// is taken as the page name; the first one wins on ties.
    fn page_title(&self, window_title: &str) -> String {
        let mut stripped = window_title.to_owned();
        for suffix in &self.browser_suffixes {
            stripped = stripped.replace(suffix.as_str(), "").trim().to_owned();
        }

        stripped
            .split(SEGMENT_SEPARATOR)
            .map(str::trim)
            .filter(|segment| segment.chars().count() > MIN_SEGMENT_CHARS)
            .fold(None::<&str>, |best, segment| match best {
                Some(current) if current.chars().count() <= segment.chars().count() => Some(current),
                _ => Some(segment),
            })
            .map(str::to_owned)
            .unwrap_or(stripped)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_title_stays_empty() {
        let normalizer = WindowNameNormalizer::default();
        assert_eq!(normalizer.normalize("chrome.exe", ""), "");
        assert_eq!(normalizer.normalize("notepad.exe", ""), "");
    }

    #[test]
    fn browser_title_keeps_shortest_segment() {
        let normalizer = WindowNameNormalizer::default();
        assert_eq!(
            normalizer.normalize("chrome.exe", "Report Q3 - Acme Dashboard - Google Chrome"),
            "Report Q3"
        );
        assert_eq!(
            normalizer.normalize("firefox", "Pull requests - GitHub - Mozilla Firefox"),
            "GitHub"
        );
    }

    #[test]
    fn equal_length_segments_keep_first_occurrence() {
        let normalizer = WindowNameNormalizer::default();
        assert_eq!(
            normalizer.normalize("Brave-Browser", "Alpha - Omega - Brave"),
            "Alpha"
        );
        assert_eq!(
            normalizer.normalize("brave", "Omega - Alpha - Brave"),
            "Omega"
        );
    }

    #[test]
    fn short_segments_are_discarded() {
        let normalizer = WindowNameNormalizer::default();
        assert_eq!(normalizer.normalize("opera", "YT - Music player - Opera"), "Music player");
        assert_eq!(normalizer.normalize("chrome", "ab - cd - Google Chrome"), "ab - cd");
    }

    #[test]
    fn browser_detection_is_case_insensitive() {
        let normalizer = WindowNameNormalizer::default();
        assert!(normalizer.is_browser("Google-CHROME"));
        assert!(normalizer.is_browser("firefox-esr"));
        assert!(!normalizer.is_browser("code"));
    }

    #[test]
    fn long_non_browser_title_is_truncated() {
        let normalizer = WindowNameNormalizer::default();
        let title = "A".repeat(40);
        let normalized = normalizer.normalize("notepad.exe", &title);
        assert_eq!(normalized.chars().count(), 33);
        assert_eq!(normalized, format!("{}...", "A".repeat(30)));
        assert_eq!(normalizer.normalize("notepad.exe", &"B".repeat(30)), "B".repeat(30));
    }

    #[test]
    fn title_limit_is_configurable() {
        let normalizer = WindowNameNormalizer::default().with_title_limit(25);
        let normalized = normalizer.normalize("code", &"x".repeat(26));
        assert_eq!(normalized, format!("{}...", "x".repeat(25)));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let normalizer = WindowNameNormalizer::default().with_title_limit(3);
        assert_eq!(normalizer.normalize("term", "ééééé"), "ééé...");
    }

    proptest! {
        #[test]
        fn non_browser_normalize_is_idempotent(title in "[a-zA-Z0-9 ._é]{0,60}", limit in 1usize..40) {
            let normalizer = WindowNameNormalizer::default().with_title_limit(limit);
            let once = normalizer.normalize("notepad.exe", &title);
            prop_assert_eq!(normalizer.normalize("notepad.exe", &once), once);
        }

        #[test]
        fn browser_normalize_is_idempotent(
            segments in prop::collection::vec("[a-z]{1,12}", 1..5),
            browser in prop::sample::select(vec!["chrome.exe", "firefox", "brave", "opera"]),
        ) {
            let normalizer = WindowNameNormalizer::default();
            let title = segments.join(" - ");
            let once = normalizer.normalize(browser, &title);
            prop_assert_eq!(normalizer.normalize(browser, &once), once);
        }
    }
}
