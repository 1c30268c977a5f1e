//! Content dispatch.
//!
//! Routes a decrypted content to a processor by its numeric type; commands
//! route by command name first, and group commands fall back to the generic
//! "group" processor when no name-specific one is registered. Processor
//! instances are created lazily from injected factories and cached for the
//! dispatcher's lifetime — registration is explicit, there is no reflection
//! and no process-wide static state.

use std::collections::HashMap;

use tracing::debug;

use dm_proto::{command::names, content::ContentBody, Content, InstantMessage, ID};

use crate::error::CoreError;
use crate::resolver::IdentityResolver;
use crate::transport::OutboundChannel;

/// Collaborators a processor may use while handling one content.
pub struct ProcessorContext<'a> {
    pub resolver: &'a dyn IdentityResolver,
    pub outbound: &'a dyn OutboundChannel,
}

/// One processor per dispatch key. May annotate the content in place (group
/// commands record `added`/`removed`) and may return a response content.
pub trait ContentProcessor: Send {
    fn process(
        &mut self,
        content: &mut Content,
        sender: &ID,
        msg: &InstantMessage,
        ctx: &ProcessorContext<'_>,
    ) -> Result<Option<Content>, CoreError>;
}

pub type ProcessorFactory = Box<dyn Fn() -> Box<dyn ContentProcessor> + Send>;

/// Fallback dispatch key for group commands without a name-specific
/// processor.
pub const GROUP_FALLBACK: &str = "group";

#[derive(Default)]
pub struct ContentDispatcher {
    content_factories: HashMap<u8, ProcessorFactory>,
    command_factories: HashMap<String, ProcessorFactory>,
    content_processors: HashMap<u8, Box<dyn ContentProcessor>>,
    command_processors: HashMap<String, Box<dyn ContentProcessor>>,
}

impl ContentDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a numeric content type. Double registration is
    /// a configuration error and fails immediately.
    pub fn register_content(
        &mut self,
        content_type: u8,
        factory: ProcessorFactory,
    ) -> Result<(), CoreError> {
        if self.content_factories.contains_key(&content_type) {
            return Err(CoreError::ProcessorConflict(format!("type {content_type}")));
        }
        self.content_factories.insert(content_type, factory);
        Ok(())
    }

    /// Register a factory for a command name (lower-cased dispatch key).
    pub fn register_command(
        &mut self,
        name: &str,
        factory: ProcessorFactory,
    ) -> Result<(), CoreError> {
        let key = name.to_ascii_lowercase();
        if self.command_factories.contains_key(&key) {
            return Err(CoreError::ProcessorConflict(key));
        }
        self.command_factories.insert(key, factory);
        Ok(())
    }

    /// Dispatcher with the standard group command set registered.
    pub fn standard() -> Self {
        let mut dispatcher = Self::new();
        // Fresh registries cannot conflict.
        let _ = crate::processors::register_group_processors(&mut dispatcher);
        dispatcher
    }

    /// Process one content: group consistency check first, then dispatch.
    pub fn process(
        &mut self,
        content: &mut Content,
        sender: &ID,
        msg: &InstantMessage,
        ctx: &ProcessorContext<'_>,
    ) -> Result<Option<Content>, CoreError> {
        self.check_group(content, sender, ctx)?;
        match self.processor_for(content) {
            Some(processor) => processor.process(content, sender, msg, ctx),
            None => Ok(Some(Self::unsupported(content))),
        }
    }

    /// Group-addressed content needs known group meta; unknown meta defers
    /// the message. When the membership state is empty and the content is not
    /// an invite (which repairs emptiness itself), proactively query the
    /// sender for current group info.
    fn check_group(
        &self,
        content: &Content,
        sender: &ID,
        ctx: &ProcessorContext<'_>,
    ) -> Result<(), CoreError> {
        let Some(group) = &content.group else {
            return Ok(());
        };
        if group.is_broadcast() {
            return Ok(());
        }
        let Some(info) = ctx.resolver.group_info(group) else {
            return Err(CoreError::GroupUnavailable(group.clone()));
        };
        let is_invite = content
            .as_group_command()
            .is_some_and(|cmd| cmd.is(names::INVITE));
        if info.is_empty() && !is_invite {
            debug!(%group, "membership state empty, querying sender");
            ctx.outbound.send_content(Content::query(group.clone()), sender);
        }
        Ok(())
    }

    fn processor_for(&mut self, content: &Content) -> Option<&mut Box<dyn ContentProcessor>> {
        let command_key = match &content.body {
            ContentBody::Command(cmd) => Some(cmd.name.to_ascii_lowercase()),
            ContentBody::GroupCommand(cmd) => Some(cmd.name.to_ascii_lowercase()),
            _ => None,
        };
        if let Some(key) = command_key {
            if let Some(key) = self.resolve_command_key(&key, content) {
                return self.command_processors.get_mut(&key);
            }
        }
        let content_type = content.content_type();
        if !self.content_processors.contains_key(&content_type) {
            let factory = self.content_factories.get(&content_type)?;
            self.content_processors.insert(content_type, factory());
        }
        self.content_processors.get_mut(&content_type)
    }

    /// Ensure a cached instance exists for the command's dispatch key,
    /// falling back to the generic "group" key for group commands.
    fn resolve_command_key(&mut self, key: &str, content: &Content) -> Option<String> {
        for candidate in [key, GROUP_FALLBACK] {
            if candidate == GROUP_FALLBACK && content.as_group_command().is_none() {
                break;
            }
            if self.command_processors.contains_key(candidate) {
                return Some(candidate.to_string());
            }
            if let Some(factory) = self.command_factories.get(candidate) {
                self.command_processors
                    .insert(candidate.to_string(), factory());
                return Some(candidate.to_string());
            }
        }
        None
    }

    /// Default outcome for unregistered content types — a normal, non-fatal
    /// user-visible response.
    fn unsupported(content: &Content) -> Content {
        let mut response = Content::text(format!(
            "Content (type: {}) not supported yet!",
            content.content_type()
        ));
        response.group = content.group.clone();
        response
    }
}
