//! Keyword-based topic classification for chart labels.
//!
//! Rules are tried in priority order; the first rule with any keyword found in
//! the lowercased question wins. Unmatched questions get the generic topic.

use askdata_shared::TopicConfig;

/// Label/title pair used when no rule matches.
const FALLBACK_LABEL: &str = "Result";
const FALLBACK_TITLE: &str = "Chart";

/// Chart label and title chosen for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartTopic {
    pub label: String,
    pub title: String,
}

impl ChartTopic {
    pub fn new(label: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            title: title.into(),
        }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_LABEL, FALLBACK_TITLE)
    }
}

/// One keyword set mapped to a topic.
#[derive(Debug, Clone)]
pub struct TopicRule {
    /// Stored lowercased.
    keywords: Vec<String>,
    topic: ChartTopic,
}

impl TopicRule {
    pub fn new<K, S>(keywords: K, label: &str, title: &str) -> Self
    where
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            topic: ChartTopic::new(label, title),
        }
    }

    /// `lowered` must already be lowercase.
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

impl From<&TopicConfig> for TopicRule {
    fn from(config: &TopicConfig) -> Self {
        Self::new(&config.keywords, &config.label, &config.title)
    }
}

/// Holds topic rules in priority order.
#[derive(Debug, Clone)]
pub struct TopicClassifier {
    rules: Vec<TopicRule>,
}

impl TopicClassifier {
    /// Create a classifier with the built-in marketing/sales rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                TopicRule::new(["roas"], "ROAS", "Return on Ad Spend"),
                TopicRule::new(["total sales"], "Total Sales", "Total Sales Overview"),
                TopicRule::new(["cpc"], "CPC", "Cost Per Click"),
            ],
        }
    }

    /// Built-in rules preceded by configured ones.
    pub fn with_extra_rules(extra: &[TopicConfig]) -> Self {
        let mut rules: Vec<TopicRule> = extra.iter().map(TopicRule::from).collect();
        rules.extend(Self::new().rules);
        Self { rules }
    }

    /// Pick the topic for a question. Always returns a topic.
    pub fn classify(&self, question: &str) -> ChartTopic {
        let lowered = question.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.topic.clone())
            .unwrap_or_else(ChartTopic::fallback)
    }
}

impl Default for TopicClassifier {
    fn default() -> Self {
        Self::new()
    }
}
