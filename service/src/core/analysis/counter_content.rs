//! Counter-Content Rules
//!
//! Picks the counter-messaging template for a submission. Rules are evaluated
//! in order against the lower-cased submission text; the first rule with a
//! matching keyword wins and the last rule always matches.

use super::CounterContent;

/// Keyword rule mapping a topic to its template
#[derive(Clone, Copy, Debug)]
pub struct CounterContentRule {
    /// Topic name, for logging
    pub topic: &'static str,
    /// Lower-case keywords; empty means "always matches"
    pub keywords: &'static [&'static str],
    pub fact_check: &'static str,
    pub visual_content: &'static str,
    pub short_form: &'static str,
}

impl CounterContentRule {
    fn matches(&self, lower_content: &str) -> bool {
        self.keywords.is_empty() || self.keywords.iter().any(|k| lower_content.contains(k))
    }

    fn to_content(self) -> CounterContent {
        CounterContent {
            fact_check: self.fact_check.to_string(),
            visual_content: self.visual_content.to_string(),
            short_form: self.short_form.to_string(),
        }
    }
}

pub const CLIMATE_RULE: CounterContentRule = CounterContentRule {
    topic: "climate",
    keywords: &["climate", "global warming"],
    fact_check: "According to NASA and 97% of climate scientists, human activities are the primary cause of recent climate change. This is supported by decades of peer-reviewed research.",
    visual_content: "Interactive chart showing global temperature trends and scientific consensus",
    short_form: "🌍 FACT: Climate change is real and human-caused. 97% of scientists agree based on solid evidence. #ClimateScience #FactsFirst",
};

pub const DEFAULT_RULE: CounterContentRule = CounterContentRule {
    topic: "default",
    keywords: &[],
    fact_check: "This claim lacks credible evidence. Always verify information through reputable sources and fact-checking organizations.",
    visual_content: "Guide to identifying reliable sources and fact-checking methods",
    short_form: "🔍 FACT-CHECK: Verify before you share! Check multiple reputable sources for accurate information. #FactCheck",
};

/// Built-in rule table; [`DEFAULT_RULE`] must stay last
pub const DEFAULT_RULES: &[CounterContentRule] = &[CLIMATE_RULE, DEFAULT_RULE];

/// Ordered rule table
#[derive(Clone, Debug)]
pub struct CounterContentRules {
    rules: Vec<CounterContentRule>,
}

impl Default for CounterContentRules {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

impl CounterContentRules {
    /// Builds a table from custom rules, appending the default rule if the
    /// table has no catch-all
    pub fn new(mut rules: Vec<CounterContentRule>) -> Self {
        if !rules.iter().any(|r| r.keywords.is_empty()) {
            rules.push(DEFAULT_RULE);
        }
        Self { rules }
    }

    /// Returns the first matching rule
    pub fn select_rule(&self, content: &str) -> &CounterContentRule {
        let lower = content.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lower))
            .unwrap_or(&DEFAULT_RULE)
    }

    /// Returns the counter-content for the submitted text
    pub fn select(&self, content: &str) -> CounterContent {
        self.select_rule(content).to_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_climate_keywords_match() {
        let rules = CounterContentRules::default();
        assert_eq!(rules.select_rule("Climate change is a hoax").topic, "climate");
        assert_eq!(
            rules.select_rule("GLOBAL WARMING stopped in 1998").topic,
            "climate"
        );
    }

    #[test]
    fn test_unmatched_content_uses_default() {
        let rules = CounterContentRules::default();
        let content = rules.select("The Earth is flat");
        assert_eq!(content.fact_check, DEFAULT_RULE.fact_check);
        assert!(content.short_form.contains("#FactCheck"));
    }

    #[test]
    fn test_first_match_wins() {
        const FIRST: CounterContentRule = CounterContentRule {
            topic: "first",
            keywords: &["moon"],
            fact_check: "first",
            visual_content: "first",
            short_form: "first",
        };
        const SECOND: CounterContentRule = CounterContentRule {
            topic: "second",
            keywords: &["moon landing"],
            ..FIRST
        };

        let rules = CounterContentRules::new(vec![FIRST, SECOND]);
        assert_eq!(rules.select_rule("the moon landing was staged").topic, "first");
    }

    #[test]
    fn test_custom_table_gets_catch_all() {
        let rules = CounterContentRules::new(vec![CLIMATE_RULE]);
        assert_eq!(rules.select_rule("anything else").topic, "default");
    }
}
