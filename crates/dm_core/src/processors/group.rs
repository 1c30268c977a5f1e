//! Group membership command processors.
//!
//! All of them share two gates before touching state:
//! 1. permission — the sender must be a current member or assistant
//! 2. structural repair — a group with no owner or no members is
//!    inconsistent; the requested operation is redirected to `reset`
//!
//! Successful mutations are silent (no response content) but annotate the
//! command in place with `added`/`removed` lists for audit/echo. Denials and
//! malformed commands produce user-visible text responses addressed to the
//! group.

use tracing::debug;

use dm_proto::{content::ContentBody, Content, GroupCommand, InstantMessage, ID};

use crate::dispatcher::{ContentProcessor, ProcessorContext};
use crate::error::CoreError;
use crate::resolver::GroupInfo;

const STR_INVITE_CMD_ERROR: &str = "Invite command error.";
const STR_INVITE_NOT_ALLOWED: &str =
    "Sorry, you are not allowed to invite new members into this group.";
const STR_EXPEL_CMD_ERROR: &str = "Expel command error.";
const STR_EXPEL_NOT_ALLOWED: &str =
    "Sorry, you are not allowed to expel members from this group.";
const STR_EXPEL_OWNER: &str = "Sorry, you cannot expel the group owner.";
const STR_QUIT_OWNER: &str = "Sorry, the group owner cannot quit.";
const STR_QUIT_NOT_MEMBER: &str = "Sorry, you are not a member of this group.";
const STR_QUERY_NOT_ALLOWED: &str =
    "Sorry, you are not allowed to query members of this group.";
const STR_RESET_CMD_ERROR: &str = "Reset command error.";
const STR_RESET_NOT_ALLOWED: &str = "Sorry, you are not allowed to reset this group.";

fn respond_text(text: &str, group: &ID) -> Option<Content> {
    let mut content = Content::text(text);
    content.group = Some(group.clone());
    Some(content)
}

/// Pull the group ID and the mutable command body out of a dispatched
/// content. The dispatcher only routes group commands here.
fn open_command(content: &mut Content) -> Result<(ID, &mut GroupCommand), CoreError> {
    let group = content
        .group
        .clone()
        .ok_or_else(|| CoreError::Proto(dm_proto::ProtoError::InvalidContent(
            "group command without group".into(),
        )))?;
    match &mut content.body {
        ContentBody::GroupCommand(cmd) => Ok((group, cmd)),
        _ => Err(CoreError::Proto(dm_proto::ProtoError::InvalidContent(
            "not a group command".into(),
        ))),
    }
}

fn group_state(ctx: &ProcessorContext<'_>, group: &ID) -> Result<GroupInfo, CoreError> {
    ctx.resolver
        .group_info(group)
        .ok_or_else(|| CoreError::GroupUnavailable(group.clone()))
}

fn is_member_or_assistant(info: &GroupInfo, id: &ID) -> bool {
    info.has_member(id) || info.has_assistant(id)
}

fn may_administrate(info: &GroupInfo, id: &ID) -> bool {
    info.is_owner(id) || info.has_assistant(id)
}

/// Authoritative resync of the member set. Shared between the reset
/// processor and the redirects from the other commands.
fn apply_reset(
    cmd: &mut GroupCommand,
    group: &ID,
    info: &GroupInfo,
    sender: &ID,
    ctx: &ProcessorContext<'_>,
) -> Result<Option<Content>, CoreError> {
    // When state survives, only the owner or an assistant may resync.
    if !info.is_empty() && !may_administrate(info, sender) {
        return Ok(respond_text(STR_RESET_NOT_ALLOWED, group));
    }
    let mut new_members = cmd.member_list();
    if new_members.is_empty() {
        return Ok(respond_text(STR_RESET_CMD_ERROR, group));
    }
    // The owner is a member by definition; force it into the new set.
    if let Some(owner) = &info.owner {
        if !new_members.contains(owner) {
            new_members.insert(0, owner.clone());
        }
    }

    let added: Vec<ID> = new_members
        .iter()
        .filter(|m| !info.has_member(m))
        .cloned()
        .collect();
    let removed: Vec<ID> = info
        .members
        .iter()
        .filter(|m| !new_members.contains(m))
        .cloned()
        .collect();

    if ctx.resolver.save_members(&new_members, group) {
        if !added.is_empty() {
            cmd.added = Some(added);
        }
        if !removed.is_empty() {
            cmd.removed = Some(removed);
        }
        debug!(%group, count = new_members.len(), "member set reset");
    }
    Ok(None)
}

// ── invite ───────────────────────────────────────────────────────────────────

pub struct InviteProcessor;

impl ContentProcessor for InviteProcessor {
    fn process(
        &mut self,
        content: &mut Content,
        sender: &ID,
        _msg: &InstantMessage,
        ctx: &ProcessorContext<'_>,
    ) -> Result<Option<Content>, CoreError> {
        let (group, cmd) = open_command(content)?;
        let info = group_state(ctx, &group)?;

        // Membership lost? Repair instead of inviting.
        if info.is_empty() {
            return apply_reset(cmd, &group, &info, sender, ctx);
        }
        if !is_member_or_assistant(&info, sender) {
            return Ok(respond_text(STR_INVITE_NOT_ALLOWED, &group));
        }

        let invite_list = cmd.member_list();
        if invite_list.is_empty() {
            return Ok(respond_text(STR_INVITE_CMD_ERROR, &group));
        }
        // Owner inviting the owner is an authoritative resync in disguise.
        if info.is_owner(sender) && info.owner.as_ref().is_some_and(|o| invite_list.contains(o)) {
            return apply_reset(cmd, &group, &info, sender, ctx);
        }

        let mut members = info.members.clone();
        let mut added = Vec::new();
        for item in invite_list {
            if members.contains(&item) {
                continue;
            }
            members.push(item.clone());
            added.push(item);
        }
        if !added.is_empty() && ctx.resolver.save_members(&members, &group) {
            cmd.added = Some(added);
        }
        // Group commands are silent acks on success.
        Ok(None)
    }
}

// ── expel ────────────────────────────────────────────────────────────────────

pub struct ExpelProcessor;

impl ContentProcessor for ExpelProcessor {
    fn process(
        &mut self,
        content: &mut Content,
        sender: &ID,
        _msg: &InstantMessage,
        ctx: &ProcessorContext<'_>,
    ) -> Result<Option<Content>, CoreError> {
        let (group, cmd) = open_command(content)?;
        let info = group_state(ctx, &group)?;

        if info.is_empty() {
            return apply_reset(cmd, &group, &info, sender, ctx);
        }
        if !may_administrate(&info, sender) {
            return Ok(respond_text(STR_EXPEL_NOT_ALLOWED, &group));
        }

        let expel_list = cmd.member_list();
        if expel_list.is_empty() {
            return Ok(respond_text(STR_EXPEL_CMD_ERROR, &group));
        }
        // All-or-nothing: an attempt on the owner changes nothing.
        if info.owner.as_ref().is_some_and(|o| expel_list.contains(o)) {
            return Ok(respond_text(STR_EXPEL_OWNER, &group));
        }

        let mut members = info.members.clone();
        let mut removed = Vec::new();
        for item in expel_list {
            if let Some(pos) = members.iter().position(|m| m == &item) {
                members.remove(pos);
                removed.push(item);
            }
        }
        if !removed.is_empty() && ctx.resolver.save_members(&members, &group) {
            cmd.removed = Some(removed);
        }
        Ok(None)
    }
}

// ── quit ─────────────────────────────────────────────────────────────────────

pub struct QuitProcessor;

impl ContentProcessor for QuitProcessor {
    fn process(
        &mut self,
        content: &mut Content,
        sender: &ID,
        _msg: &InstantMessage,
        ctx: &ProcessorContext<'_>,
    ) -> Result<Option<Content>, CoreError> {
        let (group, cmd) = open_command(content)?;
        let info = group_state(ctx, &group)?;

        if info.is_empty() {
            return apply_reset(cmd, &group, &info, sender, ctx);
        }
        if info.is_owner(sender) {
            return Ok(respond_text(STR_QUIT_OWNER, &group));
        }
        if !info.has_member(sender) {
            return Ok(respond_text(STR_QUIT_NOT_MEMBER, &group));
        }

        let mut members = info.members.clone();
        members.retain(|m| m != sender);
        if ctx.resolver.save_members(&members, &group) {
            cmd.removed = Some(vec![sender.clone()]);
        }
        Ok(None)
    }
}

// ── query ────────────────────────────────────────────────────────────────────

pub struct QueryProcessor;

impl ContentProcessor for QueryProcessor {
    fn process(
        &mut self,
        content: &mut Content,
        sender: &ID,
        _msg: &InstantMessage,
        ctx: &ProcessorContext<'_>,
    ) -> Result<Option<Content>, CoreError> {
        let (group, cmd) = open_command(content)?;
        let info = group_state(ctx, &group)?;

        if info.is_empty() {
            return apply_reset(cmd, &group, &info, sender, ctx);
        }
        if !is_member_or_assistant(&info, sender) {
            return Ok(respond_text(STR_QUERY_NOT_ALLOWED, &group));
        }

        // Answer with an authoritative member list, owner first. No mutation.
        let mut members = Vec::with_capacity(info.members.len() + 1);
        if let Some(owner) = &info.owner {
            members.push(owner.clone());
        }
        for member in &info.members {
            if !members.contains(member) {
                members.push(member.clone());
            }
        }
        Ok(Some(Content::reset(group, members)))
    }
}

// ── reset ────────────────────────────────────────────────────────────────────

pub struct ResetProcessor;

impl ContentProcessor for ResetProcessor {
    fn process(
        &mut self,
        content: &mut Content,
        sender: &ID,
        _msg: &InstantMessage,
        ctx: &ProcessorContext<'_>,
    ) -> Result<Option<Content>, CoreError> {
        let (group, cmd) = open_command(content)?;
        let info = group_state(ctx, &group)?;
        apply_reset(cmd, &group, &info, sender, ctx)
    }
}

// ── generic fallback ─────────────────────────────────────────────────────────

/// Handles group commands without a name-specific processor.
pub struct GroupFallbackProcessor;

impl ContentProcessor for GroupFallbackProcessor {
    fn process(
        &mut self,
        content: &mut Content,
        _sender: &ID,
        _msg: &InstantMessage,
        _ctx: &ProcessorContext<'_>,
    ) -> Result<Option<Content>, CoreError> {
        let (group, cmd) = open_command(content)?;
        let text = format!("Group command (name: {}) not supported yet!", cmd.name);
        Ok(respond_text(&text, &group))
    }
}
