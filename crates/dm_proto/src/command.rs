//! Command and group-command bodies.
//!
//! A command is a content variant carrying an action name plus free-form
//! parameters. Group commands additionally carry membership data and are
//! annotated in place by the group processors (`added` / `removed`) as an
//! observable audit trail.

use serde_json::{Map, Value};

use crate::id::ID;

/// Registered command names. Matching is case-insensitive.
pub mod names {
    pub const HANDSHAKE: &str = "handshake";
    pub const RECEIPT: &str = "receipt";
    pub const MUTE: &str = "mute";
    pub const BLOCK: &str = "block";
    pub const STORAGE: &str = "storage";
    pub const CONTACTS: &str = "contacts";
    pub const PRIVATE_KEY: &str = "private_key";

    pub const INVITE: &str = "invite";
    pub const EXPEL: &str = "expel";
    pub const QUIT: &str = "quit";
    pub const QUERY: &str = "query";
    pub const RESET: &str = "reset";
    pub const JOIN: &str = "join";
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    pub name: String,
    /// Additional command parameters, kept verbatim for unknown commands.
    pub extra: Map<String, Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            extra: Map::new(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Membership-mutating command addressed to a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCommand {
    pub name: String,
    pub member: Option<ID>,
    pub members: Option<Vec<ID>>,
    /// Filled by the invite/reset processors after a successful mutation.
    pub added: Option<Vec<ID>>,
    /// Filled by the expel/quit/reset processors after a successful mutation.
    pub removed: Option<Vec<ID>>,
}

impl GroupCommand {
    pub fn new(name: impl Into<String>) -> Self {
        GroupCommand {
            name: name.into(),
            member: None,
            members: None,
            added: None,
            removed: None,
        }
    }

    pub fn with_member(name: impl Into<String>, member: ID) -> Self {
        let mut cmd = GroupCommand::new(name);
        cmd.member = Some(member);
        cmd
    }

    pub fn with_members(name: impl Into<String>, members: Vec<ID>) -> Self {
        let mut cmd = GroupCommand::new(name);
        cmd.members = Some(members);
        cmd
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// The identifiers this command operates on: the `members` list, or the
    /// single `member`, or nothing.
    pub fn member_list(&self) -> Vec<ID> {
        if let Some(members) = &self.members {
            members.clone()
        } else if let Some(member) = &self.member {
            vec![member.clone()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{Address, NetworkType};

    fn member(name: &str) -> ID {
        ID::new(Some(name), Address::concrete(NetworkType::Main, name))
    }

    #[test]
    fn name_matching_is_case_insensitive() {
        let cmd = GroupCommand::new("Invite");
        assert!(cmd.is(names::INVITE));
        assert!(!cmd.is(names::EXPEL));
    }

    #[test]
    fn member_list_prefers_members_field() {
        let both = GroupCommand {
            member: Some(member("carol")),
            ..GroupCommand::with_members(names::INVITE, vec![member("alice"), member("bob")])
        };
        assert_eq!(both.member_list(), vec![member("alice"), member("bob")]);

        let single = GroupCommand::with_member(names::QUIT, member("carol"));
        assert_eq!(single.member_list(), vec![member("carol")]);

        assert!(GroupCommand::new(names::QUERY).member_list().is_empty());
    }
}
