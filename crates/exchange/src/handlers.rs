//! Turn handlers, one per handler kind
//!
//! Each handler speaks its piece through the dispatcher's `say`, so every
//! reply lands in the conversation log and gets the goodbye scan. Handlers
//! own the fail-closed rule: a template that cannot be fully expanded
//! produces the fixed unavailable message, never a prompt with a hole in it.

use chrono::Timelike;

use potsbox_config::ServiceDescriptor;
use potsbox_core::{Error, FieldMap, GenerateRequest, Message, Result, SamplingParams, tokens};
use potsbox_llm::prompt;

use crate::dispatcher::{TurnDispatcher, UNAVAILABLE_LINE};
use crate::CallSession;

/// A looping handler's opinion of the turn. For one-shot handlers the
/// dispatcher ignores it and terminates regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFlow {
    /// Stay in this service
    Continue,
    /// The interaction is complete
    Exit,
}

impl TurnDispatcher {
    /// The speaking clock. No model involved, just the caller's wall time.
    pub(crate) async fn run_clock(
        &self,
        session: &mut CallSession,
        _svc: &ServiceDescriptor,
    ) -> Result<()> {
        let ctx = self.call_context(session);
        let time = ctx.now.format("%-I:%M %p");
        let seconds = ctx.now.second();
        let plural = if seconds == 1 { "" } else { "s" };

        self.say(
            session,
            &format!("At the tone, the time will be {time} and {seconds} second{plural}."),
        )
        .await?;
        self.say(session, "BEEP.").await?;
        self.say(session, "Goodbye.").await?;
        Ok(())
    }

    /// One templated reply, then the closer.
    pub(crate) async fn run_announcement(
        &self,
        session: &mut CallSession,
        svc: &ServiceDescriptor,
        heard: &str,
    ) -> Result<()> {
        let system = match self.expand_system_prompt(session, svc).await? {
            Some(prompt) => prompt,
            None => {
                self.say(session, UNAVAILABLE_LINE).await?;
                session.ended = true;
                return Ok(());
            }
        };

        let mut messages = vec![Message::system(system)];
        if !heard.is_empty() {
            messages.push(Message::user(heard));
        }

        let reply = self
            .llm
            .generate(&GenerateRequest::new(messages, svc.sampling))
            .await?;
        self.say(session, &reply).await?;

        if let Some(closer) = &svc.closer {
            let line = self.expand_static(session, closer)?;
            self.say(session, &line).await?;
        }

        Ok(())
    }

    /// One turn of a persona conversation: expanded system prompt, bounded
    /// history, the caller's line, one reply.
    ///
    /// A failed model call is retried once with reduced context; the second
    /// failure propagates and ends the call upstream.
    pub(crate) async fn run_conversation_turn(
        &self,
        session: &mut CallSession,
        svc: &ServiceDescriptor,
        heard: &str,
    ) -> Result<HandlerFlow> {
        let system = match self.expand_system_prompt(session, svc).await? {
            Some(prompt) => prompt,
            None => {
                self.say(session, UNAVAILABLE_LINE).await?;
                session.ended = true;
                return Ok(HandlerFlow::Exit);
            }
        };

        let window = self.store.window(&session.call_id, self.config.context_window);
        let context = prompt::context_block(&window);
        let user = if heard.is_empty() {
            format!(
                "Conversation so far:\n{context}\n\nThe caller has just been connected. \
                 Open the conversation."
            )
        } else {
            prompt::caller_message(&context, heard)
        };

        let request = GenerateRequest::new(
            vec![Message::system(system.clone()), Message::user(user)],
            svc.sampling,
        );

        let reply = match self.llm.generate(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(
                    call_id = %session.call_id,
                    service = %svc.name,
                    error = %err,
                    "model call failed, retrying with reduced context"
                );
                let line = if heard.is_empty() { "Hello?" } else { heard };
                let reduced = GenerateRequest::new(
                    vec![
                        Message::system(system),
                        Message::user(format!("Caller: {line}")),
                    ],
                    SamplingParams {
                        temperature: svc.sampling.temperature,
                        max_tokens: 60,
                    },
                );
                self.llm.generate(&reduced).await?
            }
        };

        if reply.is_empty() {
            return Ok(HandlerFlow::Exit);
        }

        self.say(session, &reply).await?;
        Ok(HandlerFlow::Continue)
    }

    /// Fetch a service's required capabilities and expand its system prompt.
    ///
    /// `Ok(None)` means a required field never materialized: the service
    /// must fail closed rather than leak a raw placeholder or improvise a
    /// report without data.
    pub(crate) async fn expand_system_prompt(
        &self,
        session: &CallSession,
        svc: &ServiceDescriptor,
    ) -> Result<Option<String>> {
        let template = svc.system_prompt.as_deref().ok_or_else(|| {
            Error::Internal(format!("service {} has no system prompt", svc.name))
        })?;

        let ctx = self.call_context(session);

        let mut fields = FieldMap::new();
        for cap in &svc.requires {
            match self.capabilities.get(cap) {
                // Later fetchers overwrite identical keys: last write wins.
                Some(fetcher) => fields.extend(fetcher.fetch(&ctx).await),
                None => {
                    // Validation rejects this at startup; a live mismatch
                    // still fails closed below.
                    tracing::error!(
                        service = %svc.name,
                        capability = %cap,
                        "required capability is not registered"
                    );
                }
            }
        }

        match tokens::expand(template, &ctx, &fields) {
            Ok(prompt) => Ok(Some(prompt)),
            Err(tokens::TokenError::MissingValue(key)) => {
                tracing::warn!(
                    call_id = %session.call_id,
                    service = %svc.name,
                    placeholder = %key,
                    "missing template data, failing closed"
                );
                Ok(None)
            }
        }
    }
}
