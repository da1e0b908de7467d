use crate::catalog::{EventMaterials, PracticeEvent};
use crate::error::SessionError;
use crate::gateway::{AiGateway, ExpectJson};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use roleplay_types::ChatMessage;

pub const COMPANY_TYPES: &[&str] = &[
    "family-owned specialty food producer",
    "mid-sized consumer electronics manufacturer",
    "outdoor apparel brand",
    "software-as-a-service startup",
    "regional coffee roaster",
    "organic skincare company",
    "furniture maker",
    "bicycle and e-bike manufacturer",
    "educational toy company",
    "renewable energy equipment supplier",
    "boutique hotel chain",
    "pet food company",
];

pub const COUNTRIES: &[&str] = &[
    "Brazil",
    "Mexico",
    "Germany",
    "Japan",
    "South Korea",
    "India",
    "Vietnam",
    "Kenya",
    "Nigeria",
    "Australia",
    "Canada",
    "France",
    "Poland",
    "Chile",
    "Indonesia",
    "Egypt",
    "Turkey",
    "United Arab Emirates",
    "Thailand",
    "Colombia",
];

const COUNTRY_CANDIDATES: usize = 3;
const MAX_REFERENCE_EXAMPLES: usize = 3;
const TARGET_WORDS: usize = 380;

const SECTION_HEADERS: [&str; 4] = [
    "**Background Information**",
    "**Scenario**",
    "**Other Useful Information**",
    "**Requirements**",
];

/// Randomized knobs that keep consecutive scenarios from looking alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioParams {
    pub company_type: &'static str,
    pub country_candidates: Vec<&'static str>,
}

impl ScenarioParams {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let company_type = COMPANY_TYPES.choose(rng).copied().unwrap_or(COMPANY_TYPES[0]);
        let country_candidates = COUNTRIES
            .choose_multiple(rng, COUNTRY_CANDIDATES)
            .copied()
            .collect();
        Self {
            company_type,
            country_candidates,
        }
    }
}

/// Generated case study text. Never changes once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    text: String,
    params: ScenarioParams,
}

impl Scenario {
    pub fn new(text: String, params: ScenarioParams) -> Self {
        Self { text, params }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &ScenarioParams {
        &self.params
    }
}

/// Picks up to three reference examples at random, each cut to `budget` characters.
pub fn sample_examples<R: Rng + ?Sized>(examples: &[String], budget: usize, rng: &mut R) -> Vec<String> {
    let mut picked: Vec<&String> = examples.iter().collect();
    picked.shuffle(rng);
    picked
        .into_iter()
        .take(MAX_REFERENCE_EXAMPLES)
        .map(|example| truncate_chars(example, budget))
        .collect()
}

fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// A scenario prompt ready to send, together with the parameters it was built from.
#[derive(Debug, Clone)]
pub struct ScenarioRequest {
    pub params: ScenarioParams,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    char_budget: usize,
}

impl ScenarioGenerator {
    pub fn new(char_budget: usize) -> Self {
        Self { char_budget }
    }

    /// Builds the prompt. All randomness is drawn here so a seeded rng yields the same prompt.
    pub fn prepare<R: Rng + ?Sized>(
        &self,
        event: &PracticeEvent,
        materials: &EventMaterials,
        rng: &mut R,
    ) -> ScenarioRequest {
        let params = ScenarioParams::sample(rng);
        let examples = sample_examples(&materials.examples, self.char_budget, rng);

        let system = format!(
            "You write realistic role-play case studies for business competitions.\n\
TARGET EVENT: {title}\n\
DIFFICULTY: Official competitive level (fair, realistic, and solvable in 20 minutes planning + 7 minutes presentation).\n\n\
INSTRUCTIONS:\n\
1. STRUCTURE: Output these headers exactly, in this order: {headers}.\n\
2. REQUIREMENTS: Provide exactly 3 bullet points in the Requirements section that the participant must address.\n\
3. LENGTH: Aim for about {TARGET_WORDS} words (complete, not overly long).\n\
4. COMPANY: The company in the case is a {company}.\n\
5. COUNTRY: Choose exactly one country from this list and commit to it: {countries}. \
Write the case as a done deal in that country. Never mention the other candidates and never ask the participant to choose a country.\n\
6. Include concrete details (company size, constraints, stakeholders, a few data points) and keep the case self-contained.",
            title = event.title,
            headers = SECTION_HEADERS.join(", "),
            company = params.company_type,
            countries = params.country_candidates.join(", "),
        );

        let references = if examples.is_empty() {
            "(No reference examples)".to_string()
        } else {
            examples
                .iter()
                .enumerate()
                .map(|(i, ex)| format!("--- EX {} ---\n{}", i + 1, ex))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let user = format!(
            "Create a NEW scenario. Do not copy the examples.\n\n\
Event overview:\n{}\n\n\
Reference examples:\n{}\n\n\
Generate the scenario now.",
            materials.overview.as_deref().unwrap_or("(No overview provided)"),
            references,
        );

        ScenarioRequest {
            params,
            messages: vec![ChatMessage::system(&system), ChatMessage::user(&user)],
        }
    }

    pub async fn generate(
        &self,
        gateway: &dyn AiGateway,
        request: ScenarioRequest,
    ) -> Result<Scenario, SessionError> {
        let text = gateway.call_ai(request.messages, ExpectJson::No).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::MalformedResponse(
                "scenario response was empty".to_string(),
            ));
        }
        Ok(Scenario::new(text.to_string(), request.params))
    }
}

/// Structural facts about a generated scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioShape {
    pub requirement_bullets: usize,
    pub countries_named: Vec<&'static str>,
    pub word_count: usize,
}

impl ScenarioShape {
    pub fn is_expected(&self) -> bool {
        self.requirement_bullets == 3 && self.countries_named.len() == 1
    }
}

fn heading_text(line: &str) -> Option<&str> {
    let line = line.trim();
    let is_heading = line.starts_with('#') || (line.len() > 4 && line.starts_with("**") && line.ends_with("**"));
    is_heading.then(|| line.trim_matches(|c: char| c == '#' || c == '*' || c == ':' || c.is_whitespace()))
}

fn is_bullet(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("- ")
        || line.starts_with("* ")
        || line.starts_with("• ")
        || line
            .split_once(". ")
            .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Counts the bullets under the `Requirements` heading, up to the next heading.
pub fn inspect_scenario(text: &str, params: &ScenarioParams) -> ScenarioShape {
    let requirement_bullets = text
        .lines()
        .skip_while(|line| !heading_text(line).is_some_and(|h| h.eq_ignore_ascii_case("requirements")))
        .skip(1)
        .take_while(|line| heading_text(line).is_none())
        .filter(|line| is_bullet(line))
        .count();

    let countries_named = params
        .country_candidates
        .iter()
        .copied()
        .filter(|country| text.contains(country))
        .collect();

    ScenarioShape {
        requirement_bullets,
        countries_named,
        word_count: text.split_whitespace().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EventCatalog;
    use crate::error::AiError;
    use crate::gateway::MockAiGateway;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn materials() -> EventMaterials {
        EventMaterials {
            overview: Some("Competitors act as consultants.".to_string()),
            examples: (1..=5).map(|i| format!("Example {i} {}", "x".repeat(1000))).collect(),
        }
    }

    fn event() -> PracticeEvent {
        EventCatalog::builtin().events()[0].clone()
    }

    #[test]
    fn seeded_prompt_commits_to_one_country_and_three_requirements() {
        let generator = ScenarioGenerator::new(600);
        let a = generator.prepare(&event(), &materials(), &mut StdRng::seed_from_u64(9));
        let b = generator.prepare(&event(), &materials(), &mut StdRng::seed_from_u64(9));
        assert_eq!(a.params, b.params);
        assert_eq!(a.messages, b.messages);

        let system = a.messages[0].text();
        assert!(system.starts_with("You write realistic role-play case studies"));
        assert!(system.contains("exactly 3 bullet points"));
        assert!(system.contains("Choose exactly one country"));
        assert!(system.contains("never ask the participant to choose"));
        assert!(system.contains(a.params.company_type));
        assert_eq!(a.params.country_candidates.len(), 3);
        for header in SECTION_HEADERS {
            assert!(system.contains(header));
        }
    }

    #[test]
    fn examples_are_capped_and_truncated_on_char_boundaries() {
        let examples = vec!["é".repeat(20), "b".repeat(5), "c".repeat(30), "d".repeat(30)];
        let picked = sample_examples(&examples, 10, &mut StdRng::seed_from_u64(3));
        assert_eq!(picked.len(), 3);
        for example in &picked {
            assert!(example.chars().count() <= 13);
        }
    }

    #[tokio::test]
    async fn generates_scenario_from_gateway_text() {
        let mut gateway = MockAiGateway::new();
        gateway
            .expect_call_ai()
            .withf(|messages, expect| messages.len() == 2 && *expect == ExpectJson::No)
            .times(1)
            .returning(|_, _| Ok("  **Background Information**\nA case.  ".to_string()));

        let generator = ScenarioGenerator::new(600);
        let request = generator.prepare(&event(), &materials(), &mut StdRng::seed_from_u64(1));
        let params = request.params.clone();
        let scenario = generator.generate(&gateway, request).await.unwrap();

        assert_eq!(scenario.text(), "**Background Information**\nA case.");
        assert_eq!(scenario.params(), &params);
    }

    #[tokio::test]
    async fn gateway_failures_propagate() {
        let mut gateway = MockAiGateway::new();
        gateway
            .expect_call_ai()
            .returning(|_, _| Err(AiError::AuthRequired("401".to_string())));

        let generator = ScenarioGenerator::new(600);
        let request = generator.prepare(&event(), &materials(), &mut StdRng::seed_from_u64(1));
        let err = generator.generate(&gateway, request).await.unwrap_err();
        assert!(matches!(err, SessionError::AuthRequired(_)));
    }

    #[test]
    fn shape_counts_requirement_bullets_and_named_countries() {
        let params = ScenarioParams {
            company_type: "furniture maker",
            country_candidates: vec!["Brazil", "Japan", "Kenya"],
        };
        let text = "**Background Information**\nA furniture maker is expanding to Brazil.\n\n\
**Requirements**\n- Explain the entry mode\n- Analyze two alternatives\n- Propose a timeline\n";
        let shape = inspect_scenario(text, &params);
        assert_eq!(shape.requirement_bullets, 3);
        assert_eq!(shape.countries_named, vec!["Brazil"]);
        assert!(shape.is_expected());
    }

    #[test]
    fn requirement_bullets_are_counted_under_the_heading_only() {
        let params = ScenarioParams {
            company_type: "furniture maker",
            country_candidates: vec!["Brazil"],
        };
        let text = "**Scenario**\nRegulatory requirements in Brazil are strict.\n- Import duties apply\n\n\
## Requirements:\n1. Explain the entry mode\n2. Analyze two alternatives\n\n\
**Other Useful Information**\n- Budget is fixed\n";
        let shape = inspect_scenario(text, &params);
        assert_eq!(shape.requirement_bullets, 2);
        assert!(!shape.is_expected());

        assert_eq!(inspect_scenario("No headings at all.\n- a bullet", &params).requirement_bullets, 0);
    }
}
