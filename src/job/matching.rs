use crate::config::FlairRule;
use crate::job::forum::FlairChoice;

/// First rule, in configured order, whose bounds contain the score.
pub fn flair_for_score(rules: &[FlairRule], score: i32) -> Option<&FlairRule> {
    rules
        .iter()
        .find(|rule| rule.min <= score && score <= rule.max)
}

/// Template id of the subreddit flair with the same text and css class as the rule.
pub fn template_id<'a>(choices: &'a [FlairChoice], rule: &FlairRule) -> Option<&'a str> {
    choices
        .iter()
        .find(|choice| {
            choice.flair_text.as_deref() == Some(rule.text.as_str())
                && choice.flair_css_class.as_deref() == Some(rule.css_class.as_str())
        })
        .map(|choice| choice.flair_template_id.as_str())
}
