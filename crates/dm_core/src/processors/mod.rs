//! Content processors.
//!
//! Group membership commands live here; applications register their own
//! processors for additional content types and command names through the
//! dispatcher's factory registries.

pub mod group;

use crate::dispatcher::{ContentDispatcher, GROUP_FALLBACK};
use crate::error::CoreError;

use dm_proto::command::names;

/// Register the standard group command set plus the generic group fallback.
pub fn register_group_processors(dispatcher: &mut ContentDispatcher) -> Result<(), CoreError> {
    dispatcher.register_command(names::INVITE, Box::new(|| Box::new(group::InviteProcessor)))?;
    dispatcher.register_command(names::EXPEL, Box::new(|| Box::new(group::ExpelProcessor)))?;
    dispatcher.register_command(names::QUIT, Box::new(|| Box::new(group::QuitProcessor)))?;
    dispatcher.register_command(names::QUERY, Box::new(|| Box::new(group::QueryProcessor)))?;
    dispatcher.register_command(names::RESET, Box::new(|| Box::new(group::ResetProcessor)))?;
    dispatcher.register_command(
        GROUP_FALLBACK,
        Box::new(|| Box::new(group::GroupFallbackProcessor)),
    )?;
    Ok(())
}
