//! Classification stage: decide whether a message is a workshop search and
//! extract its parameters.
//!
//! The completion reply is parsed deterministically from labelled lines.
//! A reply missing a valid `CATEGORY` or `FORWARD` line falls back to a
//! marker scan over the whole text and is tagged [`ParseMode::Lenient`].

use std::sync::LazyLock;

use autoservice_llm::CompletionClient;
use autoservice_shared::Result;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// What the user is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    WorkshopSearch,
    Other,
}

/// How the completion reply was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Both `CATEGORY` and `FORWARD` lines were present and valid.
    Strict,
    /// Routing was decided by scanning the text for markers.
    Lenient,
}

/// Structured judgement of one user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    pub should_route: bool,
    pub location: Option<String>,
    pub vehicle_type: Option<String>,
    pub requirements: Option<String>,
    pub rationale: String,
    pub instruction: String,
    /// The completion text this was parsed from.
    pub raw: String,
    pub mode: ParseMode,
}

const WORKSHOP_SEARCH: &str = "WORKSHOP_SEARCH";

/// Values that mean "nothing extracted".
const ABSENT_VALUES: &[&str] = &[
    "",
    "-",
    "--",
    "none",
    "n/a",
    "na",
    "null",
    "unknown",
    "not specified",
    "not provided",
    "keine",
    "keiner",
    "k.a.",
    "nicht vorhanden",
];

/// Classification prompt. `{query}` is replaced with the user message.
const CLASSIFICATION_TEMPLATE: &str = "\
You are the classification stage of a vehicle-service assistant.
Decide whether the request below asks to find a car workshop, and extract the search parameters.

REQUEST: {query}

Reply with exactly these seven lines and nothing else:
CATEGORY: WORKSHOP_SEARCH or OTHER
FORWARD: YES or NO
LOCATION: city or postal code, or none
VEHICLE_TYPE: vehicle make or type, or none
REQUIREMENTS: special wishes such as good reviews, low price or a specialist, or none
RATIONALE: one sentence explaining the decision
INSTRUCTION: what the workshop search should do, or none

Examples:
\"Find me a good workshop in Berlin\" gives CATEGORY: WORKSHOP_SEARCH and FORWARD: YES
\"How often should I change the oil?\" gives CATEGORY: OTHER and FORWARD: NO
";

/// Build the classification prompt for a message.
pub fn build_classification_prompt(query: &str) -> String {
    CLASSIFICATION_TEMPLATE.replace("{query}", query)
}

/// Classify a user message with exactly one completion call.
#[instrument(skip_all, fields(query_chars = query.len()))]
pub async fn classify(
    completion: &dyn CompletionClient,
    query: &str,
    temperature: f32,
) -> Result<Classification> {
    let prompt = build_classification_prompt(query);
    debug!(prompt_chars = prompt.len(), "classification prompt built");

    let reply = completion.complete(&prompt, temperature).await?;
    let classification = parse_classification(&reply);

    info!(
        intent = ?classification.intent,
        route = classification.should_route,
        mode = ?classification.mode,
        location = classification.location.as_deref().unwrap_or("-"),
        "message classified"
    );
    Ok(classification)
}

/// Parse a completion reply into a [`Classification`].
///
/// Pure: the same text always yields the same result.
pub fn parse_classification(raw: &str) -> Classification {
    let category = label_value(raw, "CATEGORY").and_then(|v| parse_category(&v));
    let forward = label_value(raw, "FORWARD").and_then(|v| parse_forward(&v));

    let (intent, should_route, mode) = match (category, forward) {
        (Some(intent), Some(forward)) => (
            intent,
            forward || intent == Intent::WorkshopSearch,
            ParseMode::Strict,
        ),
        _ => {
            let route = lenient_route(raw);
            warn!(route, "classification reply not in expected format, using marker scan");
            let intent = if route {
                Intent::WorkshopSearch
            } else {
                Intent::Other
            };
            (intent, route, ParseMode::Lenient)
        }
    };

    Classification {
        intent,
        should_route,
        location: label_value(raw, "LOCATION").and_then(present),
        vehicle_type: label_value(raw, "VEHICLE_TYPE").and_then(present),
        requirements: label_value(raw, "REQUIREMENTS").and_then(present),
        rationale: label_value(raw, "RATIONALE").unwrap_or_default(),
        instruction: label_value(raw, "INSTRUCTION")
            .and_then(present)
            .unwrap_or_default(),
        raw: raw.to_string(),
        mode,
    }
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// Matches `LABEL: value` lines, tolerating list bullets, numbering and
/// markdown bold.
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[\s\-*#>]*(?:\d+[.)]\s*)?\**\s*(CATEGORY|FORWARD|LOCATION|VEHICLE_TYPE|REQUIREMENTS|RATIONALE|INSTRUCTION)\s*\**\s*:\s*\**(.*)$",
    )
    .expect("valid regex")
});

/// Matches an affirmative forward marker anywhere in the text.
static FORWARD_YES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FORWARD\W*:\W*YES\b").expect("valid regex"));

/// Value of the first line carrying `label`, with decoration stripped.
fn label_value(raw: &str, label: &str) -> Option<String> {
    LABEL_RE
        .captures_iter(raw)
        .find(|caps| caps[1].eq_ignore_ascii_case(label))
        .map(|caps| clean_value(&caps[2]))
}

/// Strip surrounding whitespace, markdown emphasis, brackets and quotes.
fn clean_value(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '[' | ']' | '<' | '>' | '"' | '`'))
        .trim()
        .to_string()
}

/// `None` for placeholder values such as `none` or `keine`.
fn present(value: String) -> Option<String> {
    let lower = value.to_lowercase();
    let lower = lower.trim_end_matches('.');
    if ABSENT_VALUES.contains(&lower) || lower.contains("if present") || lower.ends_with("or none")
    {
        None
    } else {
        Some(value)
    }
}

fn parse_category(value: &str) -> Option<Intent> {
    let token = first_token(value);
    if token.eq_ignore_ascii_case(WORKSHOP_SEARCH) {
        Some(Intent::WorkshopSearch)
    } else if token.eq_ignore_ascii_case("OTHER") {
        Some(Intent::Other)
    } else {
        None
    }
}

fn parse_forward(value: &str) -> Option<bool> {
    let token = first_token(value);
    if token.eq_ignore_ascii_case("YES") {
        Some(true)
    } else if token.eq_ignore_ascii_case("NO") {
        Some(false)
    } else {
        None
    }
}

/// First word of a value, ignoring trailing punctuation.
fn first_token(value: &str) -> &str {
    value
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | ';' | '(' | ')'))
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

/// Routing decision for replies without valid labelled lines.
fn lenient_route(raw: &str) -> bool {
    FORWARD_YES_RE.is_match(raw) || raw.to_ascii_uppercase().contains(WORKSHOP_SEARCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubCompletion;

    const BERLIN_REPLY: &str = "\
CATEGORY: WORKSHOP_SEARCH
FORWARD: YES
LOCATION: Berlin
VEHICLE_TYPE: BMW 3er
REQUIREMENTS: good reviews
RATIONALE: The user is looking for a workshop.
INSTRUCTION: Search workshops in Berlin with good reviews.";

    #[test]
    fn strict_parse_extracts_all_fields() {
        let c = parse_classification(BERLIN_REPLY);
        assert_eq!(c.mode, ParseMode::Strict);
        assert_eq!(c.intent, Intent::WorkshopSearch);
        assert!(c.should_route);
        assert_eq!(c.location.as_deref(), Some("Berlin"));
        assert_eq!(c.vehicle_type.as_deref(), Some("BMW 3er"));
        assert_eq!(c.requirements.as_deref(), Some("good reviews"));
        assert_eq!(c.rationale, "The user is looking for a workshop.");
        assert_eq!(c.instruction, "Search workshops in Berlin with good reviews.");
        assert_eq!(c.raw, BERLIN_REPLY);
    }

    #[test]
    fn other_without_forward_does_not_route() {
        let reply = "CATEGORY: OTHER\nFORWARD: NO\nLOCATION: none\nVEHICLE_TYPE: -\nREQUIREMENTS: n/a\nRATIONALE: General maintenance question.\nINSTRUCTION: none";
        let c = parse_classification(reply);
        assert_eq!(c.mode, ParseMode::Strict);
        assert_eq!(c.intent, Intent::Other);
        assert!(!c.should_route);
        assert!(c.location.is_none());
        assert!(c.vehicle_type.is_none());
        assert!(c.requirements.is_none());
        assert!(c.instruction.is_empty());
    }

    #[test]
    fn workshop_category_routes_even_when_forward_is_no() {
        let c = parse_classification("CATEGORY: WORKSHOP_SEARCH\nFORWARD: NO");
        assert_eq!(c.mode, ParseMode::Strict);
        assert!(c.should_route);
    }

    #[test]
    fn forward_yes_routes_other_category() {
        let c = parse_classification("CATEGORY: OTHER\nFORWARD: YES");
        assert!(c.should_route);
        assert_eq!(c.intent, Intent::Other);
    }

    #[test]
    fn tolerates_markdown_decoration() {
        let reply = "**CATEGORY:** WORKSHOP_SEARCH\n- **FORWARD**: YES\n* LOCATION: [München]\n";
        let c = parse_classification(reply);
        assert_eq!(c.mode, ParseMode::Strict);
        assert!(c.should_route);
        assert_eq!(c.location.as_deref(), Some("München"));
    }

    #[test]
    fn tolerates_numbered_lists() {
        let reply = "1. CATEGORY: WORKSHOP_SEARCH\n2. FORWARD: YES\n3) **LOCATION**: Berlin";
        let c = parse_classification(reply);
        assert_eq!(c.mode, ParseMode::Strict);
        assert!(c.should_route);
        assert_eq!(c.location.as_deref(), Some("Berlin"));
    }

    #[test]
    fn labels_are_case_insensitive() {
        let c = parse_classification("category: workshop_search\nforward: yes\nlocation: 10115");
        assert_eq!(c.mode, ParseMode::Strict);
        assert_eq!(c.intent, Intent::WorkshopSearch);
        assert_eq!(c.location.as_deref(), Some("10115"));
    }

    #[test]
    fn placeholders_are_absent() {
        let placeholders = [
            "none",
            "None.",
            "keine",
            "[keine]",
            "n/a",
            "-",
            "<city or postal code, or none>",
        ];
        for value in placeholders {
            let reply = format!("CATEGORY: OTHER\nFORWARD: NO\nLOCATION: {value}");
            assert!(
                parse_classification(&reply).location.is_none(),
                "{value} should be absent"
            );
        }
    }

    #[test]
    fn unparseable_reply_falls_back_to_marker_scan() {
        let c = parse_classification("This is clearly a WORKSHOP_SEARCH request.");
        assert_eq!(c.mode, ParseMode::Lenient);
        assert!(c.should_route);
        assert_eq!(c.intent, Intent::WorkshopSearch);

        let c = parse_classification("Category unclear. Forward: yes please");
        assert_eq!(c.mode, ParseMode::Lenient);
        assert!(c.should_route);

        let c = parse_classification("Just a general question about oil.");
        assert_eq!(c.mode, ParseMode::Lenient);
        assert!(!c.should_route);
        assert_eq!(c.intent, Intent::Other);
    }

    #[test]
    fn invalid_category_value_is_lenient() {
        let c = parse_classification("CATEGORY: MAYBE\nFORWARD: NO");
        assert_eq!(c.mode, ParseMode::Lenient);
        assert!(!c.should_route);
    }

    #[test]
    fn prompt_embeds_query() {
        let prompt = build_classification_prompt("Wie oft Ölwechsel?");
        assert!(prompt.contains("REQUEST: Wie oft Ölwechsel?"));
        assert!(prompt.contains("CATEGORY: WORKSHOP_SEARCH or OTHER"));
    }

    #[tokio::test]
    async fn classify_is_deterministic_for_same_reply() {
        let stub = StubCompletion::new([BERLIN_REPLY, BERLIN_REPLY]);
        let first = classify(&stub, "Finde eine Werkstatt in Berlin", 1.0)
            .await
            .unwrap();
        let second = classify(&stub, "Finde eine Werkstatt in Berlin", 1.0)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(stub.prompts().len(), 2);
    }

    #[tokio::test]
    async fn classify_propagates_completion_failure() {
        let stub = StubCompletion::failing();
        let err = classify(&stub, "Hallo", 1.0).await.unwrap_err();
        assert!(matches!(
            err,
            autoservice_shared::AutoserviceError::CompletionUnavailable(_)
        ));
    }
}
