//! Turn dispatcher
//!
//! One instance serves every call. Per-turn flow, in priority order:
//! hang-up phrases, empty input, the active service's turn handler,
//! intent-based switching, and finally the operator-style chat fallback.
//! Nothing below this layer may leak an error to the telephony boundary;
//! whatever escapes the steps is caught here and converted into an apology
//! and a hangup.

use std::sync::Arc;

use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use potsbox_capability::CapabilityRegistry;
use potsbox_config::{HandlerKind, ServiceCatalog, ServiceDescriptor, ServiceName};
use potsbox_core::{
    CallContext, Error, FieldMap, LanguageModel, Result, Speaker, Turn, Verdict, tokens,
};

use crate::handlers::HandlerFlow;
use crate::intent::{IntentAction, IntentClassifier};
use crate::store::ConversationStore;

/// Leave-taking phrases, matched on word boundaries in caller speech and in
/// spoken replies.
static HANGUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(bye|goodbye|hang up|get off|gotta go|have to go|see you)\b").unwrap()
});

pub(crate) const FAREWELL_LINE: &str = "Alright. Goodbye.";
pub(crate) const REPROMPT_LINE: &str = "Are you still there?";
pub(crate) const UNAVAILABLE_LINE: &str =
    "That service is temporarily unavailable. Please try your call again later. Goodbye.";
pub(crate) const APOLOGY_LINE: &str =
    "I'm sorry, we seem to be having trouble on the line. Please call again. Goodbye.";

/// Dispatcher tuning
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Most recent turns replayed into model calls
    pub context_window: usize,
    /// Minimum classifier confidence for a service switch
    pub confidence_threshold: f32,
    /// Offset from UTC for caller-local time
    pub utc_offset_hours: i32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            context_window: 8,
            confidence_threshold: 0.6,
            utc_offset_hours: -5,
        }
    }
}

/// The core state machine, shared by every call.
pub struct TurnDispatcher {
    pub(crate) catalog: Arc<ServiceCatalog>,
    pub(crate) llm: Arc<dyn LanguageModel>,
    pub(crate) capabilities: Arc<CapabilityRegistry>,
    pub(crate) speaker: Arc<dyn Speaker>,
    pub(crate) store: Arc<ConversationStore>,
    pub(crate) classifier: IntentClassifier,
    pub(crate) config: DispatcherConfig,
}

impl TurnDispatcher {
    pub fn new(
        catalog: Arc<ServiceCatalog>,
        llm: Arc<dyn LanguageModel>,
        capabilities: Arc<CapabilityRegistry>,
        speaker: Arc<dyn Speaker>,
        store: Arc<ConversationStore>,
        config: DispatcherConfig,
    ) -> Self {
        let classifier = IntentClassifier::new(llm.clone());
        Self {
            catalog,
            llm,
            capabilities,
            speaker,
            store,
            classifier,
            config,
        }
    }

    /// Use a separate model for intent classification.
    pub fn with_classifier_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.classifier = IntentClassifier::new(llm);
        self
    }

    /// Run the opener path for a fresh session.
    ///
    /// One-shot services deliver their content here and the call ends; loop
    /// services greet (statically or through one empty-input turn) and keep
    /// listening.
    pub async fn open(&self, session: &mut crate::CallSession) -> Verdict {
        match self.try_open(session).await {
            Ok(verdict) => verdict,
            Err(err) => self.apologize(session, err).await,
        }
    }

    async fn try_open(&self, session: &mut crate::CallSession) -> Result<Verdict> {
        let svc = self.descriptor(session.service)?;

        if !svc.is_loop {
            match svc.handler {
                HandlerKind::Clock => self.run_clock(session, svc).await?,
                HandlerKind::Announcement => self.run_announcement(session, svc, "").await?,
                _ => {
                    return Err(Error::Internal(format!(
                        "one-shot service {} has a looping handler",
                        svc.name
                    )))
                }
            }
            session.ended = true;
            return Ok(Verdict::Terminated);
        }

        if !session.greeted {
            if let Some(opener) = &svc.opener {
                let line = self.expand_static(session, opener)?;
                self.say(session, &line).await?;
                session.greeted = true;
            } else if svc.handler == HandlerKind::Conversation {
                // No static opener: one empty-input turn lets the service
                // speak its real greeting.
                let flow = self.run_conversation_turn(session, svc, "").await?;
                session.greeted = true;
                if session.ended || flow == HandlerFlow::Exit {
                    session.ended = true;
                    return Ok(Verdict::Terminated);
                }
            } else {
                session.greeted = true;
            }
        }

        Ok(Verdict::Continue)
    }

    /// Dispatch one caller utterance and decide the call's continuation.
    pub async fn dispatch(&self, session: &mut crate::CallSession, heard: &str) -> Verdict {
        match self.try_dispatch(session, heard).await {
            Ok(verdict) => verdict,
            Err(err) => self.apologize(session, err).await,
        }
    }

    async fn try_dispatch(
        &self,
        session: &mut crate::CallSession,
        heard: &str,
    ) -> Result<Verdict> {
        if session.ended {
            return Ok(Verdict::Terminated);
        }

        let heard = heard.trim();

        // 1. Hang-up beats everything, including the classifier.
        if HANGUP_RE.is_match(heard) {
            self.store.append(&session.call_id, Turn::caller(heard));
            self.say(session, FAREWELL_LINE).await?;
            session.ended = true;
            return Ok(Verdict::Terminated);
        }

        // 2. Silence is not a service action.
        if heard.is_empty() {
            self.say(session, REPROMPT_LINE).await?;
            return Ok(Verdict::Continue);
        }

        session.turn_index += 1;
        self.store.append(&session.call_id, Turn::caller(heard));

        let svc = self.descriptor(session.service)?;

        match svc.handler {
            // 3a. One-shot handlers run exactly once; their own opinion of
            // the turn never keeps the call alive.
            HandlerKind::Clock => {
                self.run_clock(session, svc).await?;
                session.ended = true;
                Ok(Verdict::Terminated)
            }
            HandlerKind::Announcement => {
                self.run_announcement(session, svc, heard).await?;
                session.ended = true;
                Ok(Verdict::Terminated)
            }
            // 3b. A looping service with its own handler owns the turn.
            HandlerKind::Conversation => {
                let flow = self.run_conversation_turn(session, svc, heard).await?;
                self.finish_loop_turn(session, svc, flow).await
            }
            // 4-5. Switchboard turns: try a confident switch, else chat.
            HandlerKind::Switchboard => {
                let intent = self.classifier.classify(heard).await;
                if let IntentAction::Switch(target) = intent.action {
                    if intent.confidence > self.config.confidence_threshold
                        && target != session.service
                    {
                        return self.switch_service(session, target, heard).await;
                    }
                }
                let flow = self.run_conversation_turn(session, svc, heard).await?;
                self.finish_loop_turn(session, svc, flow).await
            }
        }
    }

    /// Route the caller to a different service mid-call.
    async fn switch_service(
        &self,
        session: &mut crate::CallSession,
        target: ServiceName,
        heard: &str,
    ) -> Result<Verdict> {
        tracing::info!(
            call_id = %session.call_id,
            from = %session.service,
            to = %target,
            "intent switch"
        );

        session.switch_to(target);
        let svc = self.descriptor(target)?;

        if let Some(opener) = &svc.opener {
            let line = self.expand_static(session, opener)?;
            self.say(session, &line).await?;
            session.greeted = true;
        }

        match svc.handler {
            HandlerKind::Clock => {
                self.run_clock(session, svc).await?;
                session.ended = true;
                Ok(Verdict::Terminated)
            }
            HandlerKind::Announcement => {
                self.run_announcement(session, svc, heard).await?;
                session.ended = true;
                Ok(Verdict::Terminated)
            }
            HandlerKind::Conversation => {
                // Dynamic greeting: the new service speaks first.
                let flow = self.run_conversation_turn(session, svc, "").await?;
                session.greeted = true;
                self.finish_loop_turn(session, svc, flow).await
            }
            HandlerKind::Switchboard => {
                session.greeted = true;
                Ok(Verdict::Continue)
            }
        }
    }

    /// Translate a loop handler's flow into the call verdict, speaking the
    /// service's closer when the handler decided the interaction is done.
    async fn finish_loop_turn(
        &self,
        session: &mut crate::CallSession,
        svc: &ServiceDescriptor,
        flow: HandlerFlow,
    ) -> Result<Verdict> {
        if flow == HandlerFlow::Exit && !session.ended {
            if let Some(closer) = &svc.closer {
                let line = self.expand_static(session, closer)?;
                self.say(session, &line).await?;
            }
        }

        if session.ended || flow == HandlerFlow::Exit {
            session.ended = true;
            Ok(Verdict::Terminated)
        } else {
            Ok(Verdict::Continue)
        }
    }

    /// Speak a line in the active service's voice and record it.
    ///
    /// The spoken text itself is scanned for leave-taking phrases: a reply
    /// that says goodbye ends the call on the spot, whatever the handler
    /// thought. Heuristic, and occasionally wrong about a story that merely
    /// mentions goodbyes.
    pub(crate) async fn say(&self, session: &mut crate::CallSession, text: &str) -> Result<()> {
        let svc = self.descriptor(session.service)?;
        self.speaker.say(&session.call_id, &svc.voice, text).await?;
        self.store.append(&session.call_id, Turn::assistant(text));
        if HANGUP_RE.is_match(text) {
            session.ended = true;
        }
        Ok(())
    }

    async fn apologize(&self, session: &mut crate::CallSession, err: Error) -> Verdict {
        tracing::error!(
            call_id = %session.call_id,
            service = %session.service,
            error = %err,
            "turn failed, terminating call"
        );
        if let Err(say_err) = self.say(session, APOLOGY_LINE).await {
            tracing::error!(call_id = %session.call_id, error = %say_err, "could not speak apology");
        }
        session.ended = true;
        Verdict::Terminated
    }

    pub(crate) fn descriptor(&self, name: ServiceName) -> Result<&ServiceDescriptor> {
        self.catalog
            .get(name)
            .ok_or_else(|| Error::Internal(format!("service {name} missing from catalog")))
    }

    pub(crate) fn call_context(&self, session: &crate::CallSession) -> CallContext {
        let now = (Utc::now() + Duration::hours(self.config.utc_offset_hours as i64)).naive_utc();
        CallContext::new(
            session.call_id.as_str(),
            session.extension.as_str(),
            session.city.as_str(),
            now,
        )
    }

    /// Expand an opener/closer, which only ever uses built-in placeholders.
    pub(crate) fn expand_static(
        &self,
        session: &crate::CallSession,
        template: &str,
    ) -> Result<String> {
        let ctx = self.call_context(session);
        Ok(tokens::expand(template, &ctx, &FieldMap::new())?)
    }

    /// Purge transient state before a call id is (re)used.
    pub async fn reset_call(&self, call_id: &str) {
        if let Err(err) = self.speaker.reset(call_id).await {
            tracing::warn!(call_id, error = %err, "could not reset call audio");
        }
        self.store.purge(call_id);
    }

    /// Drop per-call state once a call has terminated. Response audio stays
    /// behind for the telephony layer to play out; the sweep collects it.
    pub fn end_call(&self, call_id: &str) {
        self.store.purge(call_id);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use potsbox_core::{CapabilityFetcher, GenerateRequest};

    use crate::CallSession;

    #[derive(Default)]
    pub(crate) struct ScriptedLlm {
        replies: Mutex<VecDeque<std::result::Result<String, String>>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedLlm {
        pub fn push_ok(&self, text: &str) {
            self.replies.lock().push_back(Ok(text.to_string()));
        }

        pub fn push_err(&self, message: &str) {
            self.replies.lock().push_back(Err(message.to_string()));
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        pub fn request(&self, index: usize) -> GenerateRequest {
            self.requests.lock()[index].clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn generate(&self, request: &GenerateRequest) -> Result<String> {
            self.requests.lock().push(request.clone());
            match self.replies.lock().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(Error::Llm(message)),
                None => Ok("All right then.".to_string()),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingSpeaker {
        pub lines: Mutex<Vec<String>>,
        pub resets: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Speaker for RecordingSpeaker {
        async fn say(&self, _call_id: &str, _voice_id: &str, text: &str) -> Result<()> {
            self.lines.lock().push(text.to_string());
            Ok(())
        }

        async fn reset(&self, call_id: &str) -> Result<()> {
            self.resets.lock().push(call_id.to_string());
            Ok(())
        }
    }

    pub(crate) struct MapFetcher {
        name: &'static str,
        provides: &'static [&'static str],
        map: FieldMap,
    }

    impl MapFetcher {
        pub fn new(
            name: &'static str,
            provides: &'static [&'static str],
            entries: &[(&str, &str)],
        ) -> Self {
            let map = entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            Self {
                name,
                provides,
                map,
            }
        }

        pub fn empty(name: &'static str, provides: &'static [&'static str]) -> Self {
            Self {
                name,
                provides,
                map: FieldMap::new(),
            }
        }
    }

    #[async_trait]
    impl CapabilityFetcher for MapFetcher {
        fn name(&self) -> &'static str {
            self.name
        }

        fn provides(&self) -> &'static [&'static str] {
            self.provides
        }

        async fn fetch(&self, _ctx: &CallContext) -> FieldMap {
            self.map.clone()
        }
    }

    pub(crate) struct Fixture {
        pub dispatcher: TurnDispatcher,
        pub llm: Arc<ScriptedLlm>,
        pub speaker: Arc<RecordingSpeaker>,
        pub store: Arc<ConversationStore>,
    }

    pub(crate) fn fixture_with(registry: CapabilityRegistry) -> Fixture {
        let llm = Arc::new(ScriptedLlm::default());
        let speaker = Arc::new(RecordingSpeaker::default());
        let store = Arc::new(ConversationStore::new());
        let dispatcher = TurnDispatcher::new(
            Arc::new(ServiceCatalog::builtin()),
            llm.clone(),
            Arc::new(registry),
            speaker.clone(),
            store.clone(),
            DispatcherConfig::default(),
        );
        Fixture {
            dispatcher,
            llm,
            speaker,
            store,
        }
    }

    pub(crate) fn fixture() -> Fixture {
        fixture_with(CapabilityRegistry::new())
    }

    pub(crate) fn science_registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(MapFetcher::new(
            "earthquake",
            &["quake_report"],
            &[("quake_report", "Magnitude 5.0 earthquake near Testville.")],
        )));
        registry.register(Arc::new(MapFetcher::new(
            "space",
            &["space_event"],
            &[("space_event", "A comet was photographed.")],
        )));
        registry
    }

    pub(crate) fn session(service: ServiceName) -> CallSession {
        let extension = ServiceCatalog::builtin()
            .get(service)
            .map(|s| s.extension.clone())
            .unwrap_or_default();
        CallSession::new("c1", extension, "New York City", service)
    }

    fn greeted_session(service: ServiceName) -> CallSession {
        let mut s = session(service);
        s.greeted = true;
        s
    }

    #[tokio::test]
    async fn test_hangup_has_priority_over_everything() {
        let f = fixture();
        let mut s = greeted_session(ServiceName::Operator);
        // Even a classifier that would confidently switch never gets asked.
        f.llm.push_ok(r#"{"action":"SERVICE_JOKE","confidence":0.95}"#);

        let verdict = f.dispatcher.dispatch(&mut s, "okay, goodbye now").await;

        assert_eq!(verdict, Verdict::Terminated);
        assert_eq!(f.llm.request_count(), 0);
        assert_eq!(f.speaker.lines.lock().last().map(String::as_str), Some(FAREWELL_LINE));
    }

    #[tokio::test]
    async fn test_hangup_inside_a_loop_service() {
        let f = fixture_with(science_registry());
        let mut s = greeted_session(ServiceName::Science);

        f.llm.push_ok("Did you know magnets are fascinating?");
        assert_eq!(f.dispatcher.dispatch(&mut s, "tell me something").await, Verdict::Continue);
        assert_eq!(f.llm.request_count(), 1);

        // The science handler never runs on the goodbye turn.
        assert_eq!(f.dispatcher.dispatch(&mut s, "goodbye").await, Verdict::Terminated);
        assert_eq!(f.llm.request_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_reprompts_without_consuming_a_turn() {
        let f = fixture();
        let mut s = greeted_session(ServiceName::Operator);

        let verdict = f.dispatcher.dispatch(&mut s, "   ").await;

        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(s.turn_index, 0);
        assert_eq!(f.speaker.lines.lock().as_slice(), [REPROMPT_LINE]);
        // The re-prompt is spoken, not logged as a conversation turn with
        // the caller's silence.
        assert_eq!(f.store.turns("c1").len(), 1);
        assert_eq!(f.llm.request_count(), 0);
    }

    #[tokio::test]
    async fn test_ended_session_terminates_immediately() {
        let f = fixture();
        let mut s = greeted_session(ServiceName::Operator);
        s.ended = true;

        assert_eq!(f.dispatcher.dispatch(&mut s, "hello?").await, Verdict::Terminated);
        assert!(f.speaker.lines.lock().is_empty());
    }

    #[tokio::test]
    async fn test_confident_intent_switches_to_one_shot_joke() {
        let f = fixture();
        let mut s = greeted_session(ServiceName::Operator);
        f.llm.push_ok(r#"{"action":"SERVICE_JOKE","confidence":0.9}"#);
        f.llm.push_ok("Two antennas met on a roof and got married.");

        let verdict = f.dispatcher.dispatch(&mut s, "tell me a joke").await;

        assert_eq!(verdict, Verdict::Terminated);
        assert_eq!(s.service, ServiceName::Joke);
        let lines = f.speaker.lines.lock();
        assert!(lines.iter().any(|l| l.contains("antennas")));
        // The joke line's closer follows the joke.
        assert!(lines.last().map(|l| l.contains("Goodbye")).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_low_confidence_intent_falls_back_to_chat() {
        let f = fixture();
        let mut s = greeted_session(ServiceName::Operator);
        f.llm.push_ok(r#"{"action":"SERVICE_JOKE","confidence":0.3}"#);
        f.llm.push_ok("One moment, I'll see what I can do.");

        let verdict = f.dispatcher.dispatch(&mut s, "tell me a joke").await;

        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(s.service, ServiceName::Operator);
        assert_eq!(f.llm.request_count(), 2);
    }

    #[tokio::test]
    async fn test_switch_to_loop_service_speaks_dynamic_opener() {
        let f = fixture();
        let mut s = greeted_session(ServiceName::Operator);
        f.llm.push_ok(r#"{"action":"SERVICE_STORY","confidence":0.88}"#);
        f.llm.push_ok("What kind of story would you like tonight?");

        let verdict = f.dispatcher.dispatch(&mut s, "tell me a story").await;

        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(s.service, ServiceName::Story);
        assert!(s.greeted);
        assert!(f
            .speaker
            .lines
            .lock()
            .iter()
            .any(|l| l.contains("What kind of story")));
    }

    #[tokio::test]
    async fn test_switch_to_same_service_is_not_a_switch() {
        let f = fixture();
        let mut s = greeted_session(ServiceName::Operator);
        // Classifier has no operator switch action; an unknown action that
        // failed to parse would fall back to chat anyway.
        f.llm.push_ok(r#"{"action":"OPERATOR_CHAT","confidence":0.99}"#);
        f.llm.push_ok("Still here with you.");

        let verdict = f.dispatcher.dispatch(&mut s, "just chatting").await;
        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(s.service, ServiceName::Operator);
    }

    #[tokio::test]
    async fn test_one_shot_clock_at_open() {
        let f = fixture();
        let mut s = session(ServiceName::Time);

        let verdict = f.dispatcher.open(&mut s).await;

        assert_eq!(verdict, Verdict::Terminated);
        let lines = f.speaker.lines.lock();
        assert!(lines[0].starts_with("At the tone, the time will be"));
        assert_eq!(lines.last().map(String::as_str), Some("Goodbye."));
        assert_eq!(f.llm.request_count(), 0);
    }

    #[tokio::test]
    async fn test_opener_is_spoken_exactly_once() {
        let f = fixture();
        let mut s = session(ServiceName::Operator);

        assert_eq!(f.dispatcher.open(&mut s).await, Verdict::Continue);
        assert_eq!(f.dispatcher.open(&mut s).await, Verdict::Continue);

        let lines = f.speaker.lines.lock();
        assert_eq!(lines.as_slice(), ["Operator. How may I help you?"]);
        assert!(s.greeted);
    }

    #[tokio::test]
    async fn test_story_line_opens_with_a_generated_greeting() {
        let f = fixture();
        let mut s = session(ServiceName::Story);
        f.llm.push_ok("Hello night owl. What story shall it be?");

        let verdict = f.dispatcher.open(&mut s).await;

        assert_eq!(verdict, Verdict::Continue);
        assert!(s.greeted);
        assert_eq!(f.llm.request_count(), 1);
        assert!(f.speaker.lines.lock()[0].contains("night owl"));
    }

    #[tokio::test]
    async fn test_capability_failure_fails_closed() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(MapFetcher::empty(
            "weather",
            &["place", "temp_f", "wind_mph", "precipitation_in"],
        )));
        let f = fixture_with(registry);
        let mut s = session(ServiceName::Weather);

        let verdict = f.dispatcher.open(&mut s).await;

        assert_eq!(verdict, Verdict::Terminated);
        assert_eq!(f.llm.request_count(), 0);
        let lines = f.speaker.lines.lock();
        assert_eq!(lines.as_slice(), [UNAVAILABLE_LINE]);
        // Nothing with an unexpanded placeholder ever reaches the caller.
        assert!(lines.iter().all(|l| !l.contains('{')));
    }

    #[tokio::test]
    async fn test_weather_report_with_live_data() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(MapFetcher::new(
            "weather",
            &["place", "temp_f", "wind_mph", "precipitation_in"],
            &[
                ("place", "Testville, United States"),
                ("temp_f", "28"),
                ("wind_mph", "11"),
                ("precipitation_in", "0"),
            ],
        )));
        let f = fixture_with(registry);
        let mut s = session(ServiceName::Weather);
        f.llm.push_ok("Twenty-eight brisk degrees in Testville tonight.");

        let verdict = f.dispatcher.open(&mut s).await;

        assert_eq!(verdict, Verdict::Terminated);
        // The expanded prompt carried the fetched fields.
        let request = f.llm.request(0);
        let system = &request.messages[0].content;
        assert!(system.contains("Testville"));
        assert!(system.contains("28 degrees"));
        assert!(!system.contains('{'));
    }

    #[tokio::test]
    async fn test_bounded_context_window() {
        let f = fixture();
        let mut s = greeted_session(ServiceName::Operator);
        for i in 0..50 {
            f.store.append("c1", Turn::caller(format!("line {i}")));
        }
        f.llm.push_ok(r#"{"action":"OPERATOR_CHAT","confidence":0.2}"#);
        f.llm.push_ok("Quite a conversation we're having.");

        f.dispatcher.dispatch(&mut s, "still with me?").await;

        let chat_request = f.llm.request(1);
        let user = &chat_request.messages[1].content;
        // Context lines render as "Caller: ..."; the fresh utterance is
        // appended separately after a bare "Caller:" header.
        assert_eq!(user.matches("Caller: ").count(), 8);
        assert!(user.contains("line 49"));
        assert!(!user.contains("line 41"));
    }

    #[tokio::test]
    async fn test_goodbye_in_spoken_reply_ends_the_call() {
        let f = fixture_with(science_registry());
        let mut s = greeted_session(ServiceName::Science);
        f.llm
            .push_ok("And that's the answer to the riddle. Goodbye!");

        let verdict = f.dispatcher.dispatch(&mut s, "so what is it?").await;

        assert_eq!(verdict, Verdict::Terminated);
        assert!(s.ended);
    }

    #[tokio::test]
    async fn test_model_failure_recovers_with_reduced_context() {
        let f = fixture_with(science_registry());
        let mut s = greeted_session(ServiceName::Science);
        f.llm.push_err("connection refused");
        f.llm.push_ok("Short answer: yes.");

        let verdict = f.dispatcher.dispatch(&mut s, "is the moon real?").await;

        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(f.llm.request_count(), 2);
        let reduced = f.llm.request(1);
        assert_eq!(reduced.messages.len(), 2);
        assert_eq!(reduced.params.max_tokens, 60);
    }

    #[tokio::test]
    async fn test_double_model_failure_apologizes_and_terminates() {
        let f = fixture_with(science_registry());
        let mut s = greeted_session(ServiceName::Science);
        f.llm.push_err("connection refused");
        f.llm.push_err("still refused");

        let verdict = f.dispatcher.dispatch(&mut s, "hello?").await;

        assert_eq!(verdict, Verdict::Terminated);
        assert_eq!(
            f.speaker.lines.lock().last().map(String::as_str),
            Some(APOLOGY_LINE)
        );
    }

    #[tokio::test]
    async fn test_reset_call_purges_state() {
        let f = fixture();
        f.store.append("c1", Turn::caller("stale"));

        f.dispatcher.reset_call("c1").await;

        assert!(f.store.turns("c1").is_empty());
        assert_eq!(f.speaker.resets.lock().as_slice(), ["c1"]);
    }
}
