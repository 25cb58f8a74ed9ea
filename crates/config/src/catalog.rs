//! Service catalog
//!
//! The static table mapping a dial code to a service descriptor. Handlers
//! are a closed enum resolved here, at load time: a descriptor naming a
//! handler that does not exist is a parse error, not a runtime surprise.
//! `validate` runs before the exchange answers its first call and rejects
//! any catalog that could fail mid-call for configuration reasons.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use potsbox_core::{tokens, SamplingParams};

use crate::ConfigError;

/// Closed set of known services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceName {
    Operator,
    Directory,
    Time,
    Weather,
    Joke,
    Prayer,
    Horoscope,
    Science,
    Story,
    Complaints,
}

impl ServiceName {
    pub const ALL: [ServiceName; 10] = [
        ServiceName::Operator,
        ServiceName::Directory,
        ServiceName::Time,
        ServiceName::Weather,
        ServiceName::Joke,
        ServiceName::Prayer,
        ServiceName::Horoscope,
        ServiceName::Science,
        ServiceName::Story,
        ServiceName::Complaints,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Operator => "operator",
            ServiceName::Directory => "directory",
            ServiceName::Time => "time",
            ServiceName::Weather => "weather",
            ServiceName::Joke => "joke",
            ServiceName::Prayer => "prayer",
            ServiceName::Horoscope => "horoscope",
            ServiceName::Science => "science",
            ServiceName::Story => "story",
            ServiceName::Complaints => "complaints",
        }
    }

    /// Action label the intent classifier may return for this service.
    ///
    /// The operator is not a switch target; callers land on it through the
    /// chat fallback action instead.
    pub fn action_label(&self) -> Option<&'static str> {
        match self {
            ServiceName::Operator => None,
            ServiceName::Directory => Some("SERVICE_DIRECTORY"),
            ServiceName::Time => Some("SERVICE_TIME"),
            ServiceName::Weather => Some("SERVICE_WEATHER"),
            ServiceName::Joke => Some("SERVICE_JOKE"),
            ServiceName::Prayer => Some("SERVICE_PRAYER"),
            ServiceName::Horoscope => Some("SERVICE_HOROSCOPE"),
            ServiceName::Science => Some("SERVICE_SCIENCE"),
            ServiceName::Story => Some("SERVICE_STORY"),
            ServiceName::Complaints => Some("SERVICE_COMPLAINTS"),
        }
    }

    /// Reverse of [`action_label`](Self::action_label).
    pub fn from_action_label(label: &str) -> Option<ServiceName> {
        ServiceName::ALL
            .into_iter()
            .find(|name| name.action_label() == Some(label))
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of turn handlers.
///
/// `Clock` and `Announcement` are one-shot; `Conversation` and
/// `Switchboard` loop. A `Switchboard` service has no dedicated turn
/// handler: its turns flow through intent routing and the chat fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Speaks the current time against a tone; no model call
    Clock,
    /// One templated model reply, then done
    Announcement,
    /// Persona turn handler owns every turn
    Conversation,
    /// Intent routing each turn, operator-style chat fallback
    Switchboard,
}

impl HandlerKind {
    pub fn is_loop(&self) -> bool {
        matches!(self, HandlerKind::Conversation | HandlerKind::Switchboard)
    }

    /// Whether this handler builds prompts from a system template.
    pub fn needs_prompt(&self) -> bool {
        !matches!(self, HandlerKind::Clock)
    }
}

/// One service: everything the dispatcher needs to answer an extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: ServiceName,
    /// Dial code, unique within the catalog
    pub extension: String,
    /// One-shot vs. multi-turn
    pub is_loop: bool,
    /// Voice identity for synthesis
    pub voice: String,
    /// Fixed text spoken on entry, at most once per activation
    #[serde(default)]
    pub opener: Option<String>,
    /// Fixed text spoken after a one-shot reply
    #[serde(default)]
    pub closer: Option<String>,
    /// Persona/behavior template for model calls
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Capabilities whose fields must be fetched before any model call
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub sampling: SamplingParams,
    pub handler: HandlerKind,
}

/// The published service table.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    services: Vec<ServiceDescriptor>,
}

#[derive(Deserialize)]
struct CatalogFile {
    service: Vec<ServiceDescriptor>,
}

impl ServiceCatalog {
    /// Build a catalog, requiring the operator fallback to exist.
    pub fn new(services: Vec<ServiceDescriptor>) -> Result<Self, ConfigError> {
        if !services.iter().any(|s| s.name == ServiceName::Operator) {
            return Err(ConfigError::MissingField(
                "catalog has no operator service".to_string(),
            ));
        }
        Ok(Self { services })
    }

    /// The built-in exchange: ten lines, dial codes spelled on the keypad.
    pub fn builtin() -> Self {
        Self::new(builtin_services()).expect("builtin catalog defines the operator service")
    }

    /// Parse a catalog from TOML (`[[service]]` tables).
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::new(file.service)
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn get(&self, name: ServiceName) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    fn operator(&self) -> &ServiceDescriptor {
        self.services
            .iter()
            .find(|s| s.name == ServiceName::Operator)
            .expect("catalog construction requires the operator service")
    }

    /// Resolve a dial code. Unknown, empty, and zero extensions all land on
    /// the operator; a call is never rejected outright.
    pub fn resolve(&self, extension: &str) -> &ServiceDescriptor {
        let wanted = extension.trim();
        if wanted.is_empty() || wanted == "0" {
            return self.operator();
        }
        self.services
            .iter()
            .find(|s| s.extension == wanted)
            .unwrap_or_else(|| self.operator())
    }

    /// Startup-time validation against the capability registry.
    ///
    /// `capabilities` maps each registered fetcher name to the fields it
    /// provides. Any inconsistency here is a development-time fault, caught
    /// before the table is published.
    pub fn validate(
        &self,
        capabilities: &HashMap<String, Vec<String>>,
    ) -> Result<(), ConfigError> {
        let mut extensions = HashSet::new();

        for svc in &self.services {
            let field = |part: &str| format!("service.{}.{}", svc.name, part);

            if !extensions.insert(svc.extension.trim().to_string()) {
                return Err(ConfigError::InvalidValue {
                    field: field("extension"),
                    message: format!("dial code {} is already taken", svc.extension),
                });
            }

            if svc.handler.is_loop() != svc.is_loop {
                return Err(ConfigError::InvalidValue {
                    field: field("handler"),
                    message: format!(
                        "handler {:?} does not agree with is_loop = {}",
                        svc.handler, svc.is_loop
                    ),
                });
            }

            if svc.handler.needs_prompt() && svc.system_prompt.is_none() {
                return Err(ConfigError::MissingField(field("system_prompt")));
            }

            let builtin: HashSet<&str> = tokens::VOCABULARY.iter().copied().collect();

            let mut available = builtin.clone();
            for cap in &svc.requires {
                let provides = capabilities.get(cap).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        field: field("requires"),
                        message: format!("no registered capability named {cap}"),
                    }
                })?;
                available.extend(provides.iter().map(String::as_str));
            }

            // The system prompt may draw on fetched capability fields;
            // openers and closers are spoken before any fetch happens, so
            // they only get the built-in vocabulary.
            if let Some(template) = svc.system_prompt.as_deref() {
                check_placeholders(template, &available, || field("system_prompt"))?;
            }
            for (part, template) in [("opener", &svc.opener), ("closer", &svc.closer)] {
                if let Some(template) = template.as_deref() {
                    check_placeholders(template, &builtin, || field(part))?;
                }
            }
        }

        Ok(())
    }
}

fn check_placeholders(
    template: &str,
    available: &HashSet<&str>,
    field: impl Fn() -> String,
) -> Result<(), ConfigError> {
    for key in tokens::scan(template) {
        if !available.contains(key.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: field(),
                message: format!("placeholder {{{key}}} has no defined substitution"),
            });
        }
    }
    Ok(())
}

fn builtin_services() -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor {
            name: ServiceName::Operator,
            extension: "0".to_string(),
            is_loop: true,
            voice: "ash".to_string(),
            opener: Some("Operator. How may I help you?".to_string()),
            closer: None,
            system_prompt: Some(
                "You are a 1970s telephone operator. Calm, efficient, polite. \
                 Speak in one or two short sentences. If the caller seems lost, \
                 mention they can ask for the time, the weather, a joke, a story, \
                 or their horoscope."
                    .to_string(),
            ),
            requires: vec![],
            sampling: SamplingParams {
                temperature: 0.7,
                max_tokens: 120,
            },
            handler: HandlerKind::Switchboard,
        },
        ServiceDescriptor {
            name: ServiceName::Directory,
            extension: "411".to_string(),
            is_loop: true,
            voice: "cedar".to_string(),
            opener: Some("Directory assistance. Whom would you like to reach?".to_string()),
            closer: None,
            system_prompt: Some(
                "You are directory assistance on a novelty telephone exchange. \
                 Whatever the caller asks for, suggest one of the house lines: \
                 the time, the weather report, the joke line, the story line, \
                 the science line, the horoscope, or the complaints department. \
                 One short sentence."
                    .to_string(),
            ),
            requires: vec![],
            sampling: SamplingParams {
                temperature: 0.7,
                max_tokens: 80,
            },
            handler: HandlerKind::Switchboard,
        },
        ServiceDescriptor {
            name: ServiceName::Time,
            extension: "8463".to_string(),
            is_loop: false,
            voice: "verse".to_string(),
            opener: None,
            closer: None,
            system_prompt: None,
            requires: vec![],
            sampling: SamplingParams::default(),
            handler: HandlerKind::Clock,
        },
        ServiceDescriptor {
            name: ServiceName::Weather,
            extension: "9328437".to_string(),
            is_loop: false,
            voice: "marin".to_string(),
            opener: None,
            closer: Some(
                "Remember folks, if you don't like the weather, wait five minutes. Goodbye."
                    .to_string(),
            ),
            system_prompt: Some(
                "You are the recorded weather announcer on a small-town telephone \
                 line. Read the current conditions with warmth and a little \
                 theater, three sentences at most, no fake precision. Current \
                 conditions for {place}: {temp_f} degrees Fahrenheit, wind \
                 {wind_mph} miles an hour, precipitation {precipitation_in} \
                 inches right now."
                    .to_string(),
            ),
            requires: vec!["weather".to_string()],
            sampling: SamplingParams {
                temperature: 0.9,
                max_tokens: 140,
            },
            handler: HandlerKind::Announcement,
        },
        ServiceDescriptor {
            name: ServiceName::Joke,
            extension: "5653".to_string(),
            is_loop: false,
            voice: "coral".to_string(),
            opener: None,
            closer: Some("Call again tomorrow for another one. Goodbye.".to_string()),
            system_prompt: Some(
                "You are Dial-a-Joke. Tell ONE short joke and stop. No greeting, \
                 nothing after the punchline. Keep it dry, not corny."
                    .to_string(),
            ),
            requires: vec![],
            sampling: SamplingParams {
                temperature: 0.9,
                max_tokens: 120,
            },
            handler: HandlerKind::Announcement,
        },
        ServiceDescriptor {
            name: ServiceName::Prayer,
            extension: "772937".to_string(),
            is_loop: false,
            voice: "shimmer".to_string(),
            opener: None,
            closer: Some("Go in peace. Goodbye.".to_string()),
            system_prompt: Some(
                "Offer a short, gentle, nondenominational prayer suited to a \
                 {season} {day_of_week}. Four sentences at most, spoken slowly."
                    .to_string(),
            ),
            requires: vec![],
            sampling: SamplingParams {
                temperature: 0.8,
                max_tokens: 140,
            },
            handler: HandlerKind::Announcement,
        },
        ServiceDescriptor {
            name: ServiceName::Horoscope,
            extension: "46767".to_string(),
            is_loop: false,
            voice: "nova".to_string(),
            opener: None,
            closer: Some("The stars thank you for calling. Goodbye.".to_string()),
            system_prompt: Some(
                "You are the horoscope line. Today the sun is in {zodiac_sign}, \
                 the moon is a {moon_phase} at {moon_illumination} percent \
                 illumination, and the day belongs to {day_planet}. Eclipse \
                 season: {eclipse_season}. Deliver today's reading for \
                 {zodiac_sign} in a mystical radio voice, five sentences at most."
                    .to_string(),
            ),
            requires: vec![],
            sampling: SamplingParams {
                temperature: 0.9,
                max_tokens: 160,
            },
            handler: HandlerKind::Announcement,
        },
        ServiceDescriptor {
            name: ServiceName::Science,
            extension: "7242362".to_string(),
            is_loop: true,
            voice: "sage".to_string(),
            opener: None,
            closer: None,
            system_prompt: Some(
                "You are the Science Line, an enthusiastic host who cannot believe \
                 their luck that somebody called. Today's bulletin: {quake_report} \
                 Also: {space_event} Open with one item from the bulletin, then \
                 take questions. Two or three sentences per turn. When you have \
                 nothing left, thank the caller and say goodbye."
                    .to_string(),
            ),
            requires: vec!["earthquake".to_string(), "space".to_string()],
            sampling: SamplingParams {
                temperature: 0.8,
                max_tokens: 140,
            },
            handler: HandlerKind::Conversation,
        },
        ServiceDescriptor {
            name: ServiceName::Story,
            extension: "78679".to_string(),
            is_loop: true,
            voice: "fable".to_string(),
            opener: None,
            closer: None,
            system_prompt: Some(
                "You are the bedtime story line. First ask what kind of story the \
                 caller would like tonight. Then tell it a few sentences per turn, \
                 pausing so the caller can react. Wrap the story up within a \
                 handful of turns and bid the caller goodnight."
                    .to_string(),
            ),
            requires: vec![],
            sampling: SamplingParams {
                temperature: 0.9,
                max_tokens: 160,
            },
            handler: HandlerKind::Conversation,
        },
        ServiceDescriptor {
            name: ServiceName::Complaints,
            extension: "26675".to_string(),
            is_loop: true,
            voice: "ballad".to_string(),
            opener: Some("Complaints department. What seems to be the problem?".to_string()),
            closer: None,
            system_prompt: Some(
                "You are the complaints department of a telephone exchange that \
                 fixes nothing. Commiserate theatrically, take everything down \
                 in triplicate, never actually solve anything. For perspective, \
                 the most recent complaint filed in the city: {complaint}. Two \
                 sentences per turn."
                    .to_string(),
            ),
            requires: vec!["complaint".to_string()],
            sampling: SamplingParams {
                temperature: 0.8,
                max_tokens: 120,
            },
            handler: HandlerKind::Conversation,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HashMap<String, Vec<String>> {
        let mut caps = HashMap::new();
        caps.insert(
            "weather".to_string(),
            vec![
                "place".to_string(),
                "temp_f".to_string(),
                "wind_mph".to_string(),
                "precipitation_in".to_string(),
            ],
        );
        caps.insert("earthquake".to_string(), vec!["quake_report".to_string()]);
        caps.insert("space".to_string(), vec!["space_event".to_string()]);
        caps.insert("complaint".to_string(), vec!["complaint".to_string()]);
        caps
    }

    #[test]
    fn test_builtin_catalog_validates() {
        let catalog = ServiceCatalog::builtin();
        catalog.validate(&registry()).unwrap();
    }

    #[test]
    fn test_resolve_known_extension() {
        let catalog = ServiceCatalog::builtin();
        assert_eq!(catalog.resolve("8463").name, ServiceName::Time);
        assert_eq!(catalog.resolve("411").name, ServiceName::Directory);
    }

    #[test]
    fn test_unknown_extension_falls_back_to_operator() {
        let catalog = ServiceCatalog::builtin();
        assert_eq!(catalog.resolve("999999").name, ServiceName::Operator);
        assert_eq!(catalog.resolve("").name, ServiceName::Operator);
        assert_eq!(catalog.resolve("0").name, ServiceName::Operator);
    }

    #[test]
    fn test_missing_capability_is_rejected() {
        let catalog = ServiceCatalog::builtin();
        let mut caps = registry();
        caps.remove("weather");
        let err = catalog.validate(&caps).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let mut services = builtin_services();
        if let Some(svc) = services.iter_mut().find(|s| s.name == ServiceName::Joke) {
            svc.system_prompt = Some("Tell a joke about {nonsense_key}.".to_string());
        }
        let catalog = ServiceCatalog::new(services).unwrap();
        let err = catalog.validate(&registry()).unwrap_err();
        match err {
            ConfigError::InvalidValue { message, .. } => {
                assert!(message.contains("nonsense_key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_loop_handler_mismatch_is_rejected() {
        let mut services = builtin_services();
        if let Some(svc) = services.iter_mut().find(|s| s.name == ServiceName::Time) {
            svc.is_loop = true;
        }
        let catalog = ServiceCatalog::new(services).unwrap();
        assert!(catalog.validate(&registry()).is_err());
    }

    #[test]
    fn test_duplicate_extension_is_rejected() {
        let mut services = builtin_services();
        if let Some(svc) = services.iter_mut().find(|s| s.name == ServiceName::Joke) {
            svc.extension = "8463".to_string();
        }
        let catalog = ServiceCatalog::new(services).unwrap();
        assert!(catalog.validate(&registry()).is_err());
    }

    #[test]
    fn test_catalog_without_operator_is_rejected() {
        let services: Vec<ServiceDescriptor> = builtin_services()
            .into_iter()
            .filter(|s| s.name != ServiceName::Operator)
            .collect();
        assert!(ServiceCatalog::new(services).is_err());
    }

    #[test]
    fn test_action_labels_round_trip() {
        for name in ServiceName::ALL {
            if let Some(label) = name.action_label() {
                assert_eq!(ServiceName::from_action_label(label), Some(name));
            }
        }
        assert_eq!(ServiceName::from_action_label("SERVICE_PIZZA"), None);
        assert_eq!(ServiceName::Operator.action_label(), None);
    }

    #[test]
    fn test_catalog_from_toml() {
        let text = r#"
            [[service]]
            name = "operator"
            extension = "0"
            is_loop = true
            voice = "ash"
            opener = "Operator."
            system_prompt = "You are a telephone operator."
            handler = "switchboard"

            [[service]]
            name = "joke"
            extension = "5653"
            is_loop = false
            voice = "coral"
            system_prompt = "Tell one joke."
            handler = "announcement"

            [service.sampling]
            temperature = 0.9
            max_tokens = 100
        "#;
        let catalog = ServiceCatalog::from_toml_str(text).unwrap();
        assert_eq!(catalog.services().len(), 2);
        assert_eq!(catalog.resolve("5653").name, ServiceName::Joke);
        catalog.validate(&HashMap::new()).unwrap();
    }
}
