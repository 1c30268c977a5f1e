//! Message content — the closed set of payload variants.
//!
//! Wire form is a keyed structure with a numeric `type` tag, a serial number
//! `sn`, an optional `group`, and variant-specific fields. The tag directs
//! (de)serialisation, so the derive machinery is bypassed in favour of an
//! explicit mapping: unknown tags round-trip verbatim through the `Unknown`
//! variant instead of failing, which is what lets the dispatcher answer them
//! with a "not supported" text.

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use serde_repr::{Deserialize_repr, Serialize_repr};

use dm_crypto::SymmetricKey;

use crate::b64::B64;
use crate::command::{names, Command, GroupCommand};
use crate::error::ProtoError;
use crate::id::ID;
use crate::message::ReliableMessage;

/// Registered content type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ContentType {
    Unknown = 0x00,
    Text = 0x01,
    File = 0x10,
    Image = 0x12,
    Audio = 0x14,
    Video = 0x16,
    Page = 0x20,
    Command = 0x88,
    History = 0x89,
    Customized = 0xCC,
    Forward = 0xFF,
}

/// File-shaped payload (File/Image/Audio/Video).
///
/// Outbound, `data` holds the raw bytes until the pipeline has encrypted and
/// uploaded them, after which only `url` remains. Inbound, `password` keeps
/// the content key around when the download collaborator cannot resolve the
/// reference yet, so decryption can be retried later.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    pub media: ContentType,
    pub filename: Option<String>,
    pub data: Option<B64>,
    pub url: Option<String>,
    pub password: Option<SymmetricKey>,
}

/// Application-customised content (0xCC).
#[derive(Debug, Clone, PartialEq)]
pub struct CustomizedContent {
    pub app: String,
    pub module: String,
    pub action: String,
    pub extra: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBody {
    Text { text: String },
    File(FileContent),
    Forward(Box<ReliableMessage>),
    Command(Command),
    GroupCommand(GroupCommand),
    Customized(CustomizedContent),
    Unknown { content_type: u8, fields: Map<String, Value> },
}

/// The logical payload inside a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    /// Serial number, random and non-zero.
    pub sn: u32,
    /// Associated group; None for personal messages.
    pub group: Option<ID>,
    pub body: ContentBody,
}

fn fresh_sn() -> u32 {
    rand::thread_rng().gen_range(1..=u32::MAX)
}

impl Content {
    pub fn new(body: ContentBody) -> Self {
        Content {
            sn: fresh_sn(),
            group: None,
            body,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Content::new(ContentBody::Text { text: text.into() })
    }

    pub fn file(file: FileContent) -> Self {
        Content::new(ContentBody::File(file))
    }

    pub fn forward(message: ReliableMessage) -> Self {
        Content::new(ContentBody::Forward(Box::new(message)))
    }

    pub fn command(command: Command) -> Self {
        Content::new(ContentBody::Command(command))
    }

    pub fn group_command(group: ID, command: GroupCommand) -> Self {
        let mut content = Content::new(ContentBody::GroupCommand(command));
        content.group = Some(group);
        content
    }

    /// `invite` — add members to a group.
    pub fn invite(group: ID, members: Vec<ID>) -> Self {
        Content::group_command(group, GroupCommand::with_members(names::INVITE, members))
    }

    /// `query` — ask a member for the current group info.
    pub fn query(group: ID) -> Self {
        Content::group_command(group, GroupCommand::new(names::QUERY))
    }

    /// `reset` — authoritative resync of the whole member set.
    pub fn reset(group: ID, members: Vec<ID>) -> Self {
        Content::group_command(group, GroupCommand::with_members(names::RESET, members))
    }

    pub fn customized(content: CustomizedContent) -> Self {
        Content::new(ContentBody::Customized(content))
    }

    /// The numeric type tag of this content.
    pub fn content_type(&self) -> u8 {
        match &self.body {
            ContentBody::Text { .. } => ContentType::Text as u8,
            ContentBody::File(file) => file.media as u8,
            ContentBody::Forward(_) => ContentType::Forward as u8,
            ContentBody::Command(_) => ContentType::Command as u8,
            ContentBody::GroupCommand(_) => ContentType::History as u8,
            ContentBody::Customized(_) => ContentType::Customized as u8,
            ContentBody::Unknown { content_type, .. } => *content_type,
        }
    }

    pub fn as_group_command(&self) -> Option<&GroupCommand> {
        match &self.body {
            ContentBody::GroupCommand(cmd) => Some(cmd),
            _ => None,
        }
    }

    // ── Wire mapping ─────────────────────────────────────────────────────────

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), json!(self.content_type()));
        map.insert("sn".into(), json!(self.sn));
        if let Some(group) = &self.group {
            map.insert("group".into(), json!(group));
        }
        match &self.body {
            ContentBody::Text { text } => {
                map.insert("text".into(), json!(text));
            }
            ContentBody::File(file) => {
                if let Some(filename) = &file.filename {
                    map.insert("filename".into(), json!(filename));
                }
                if let Some(data) = &file.data {
                    map.insert("data".into(), json!(data));
                }
                if let Some(url) = &file.url {
                    map.insert("url".into(), json!(url));
                }
                if let Some(password) = &file.password {
                    map.insert("password".into(), json!(password));
                }
            }
            ContentBody::Forward(message) => {
                map.insert("forward".into(), json!(message));
            }
            ContentBody::Command(command) => {
                map.insert("command".into(), json!(command.name));
                for (key, value) in &command.extra {
                    map.insert(key.clone(), value.clone());
                }
            }
            ContentBody::GroupCommand(command) => {
                map.insert("command".into(), json!(command.name));
                if let Some(member) = &command.member {
                    map.insert("member".into(), json!(member));
                }
                if let Some(members) = &command.members {
                    map.insert("members".into(), json!(members));
                }
                if let Some(added) = &command.added {
                    map.insert("added".into(), json!(added));
                }
                if let Some(removed) = &command.removed {
                    map.insert("removed".into(), json!(removed));
                }
            }
            ContentBody::Customized(content) => {
                map.insert("app".into(), json!(content.app));
                map.insert("mod".into(), json!(content.module));
                map.insert("act".into(), json!(content.action));
                if let Some(extra) = &content.extra {
                    map.insert("extra".into(), extra.clone());
                }
            }
            ContentBody::Unknown { fields, .. } => {
                for (key, value) in fields {
                    map.insert(key.clone(), value.clone());
                }
            }
        }
        Value::Object(map)
    }

    pub fn from_value(value: Value) -> Result<Self, ProtoError> {
        let Value::Object(mut map) = value else {
            return Err(ProtoError::InvalidContent("content must be an object".into()));
        };
        let content_type = map
            .get("type")
            .and_then(Value::as_u64)
            .and_then(|t| u8::try_from(t).ok())
            .ok_or_else(|| ProtoError::InvalidContent("missing or out-of-range 'type'".into()))?;
        let sn = map
            .get("sn")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| ProtoError::InvalidContent("missing or out-of-range 'sn'".into()))?;
        let group: Option<ID> = match map.get("group") {
            Some(value) => Some(parse_field(value, "group")?),
            None => None,
        };

        let body = match content_type {
            t if t == ContentType::Text as u8 => ContentBody::Text {
                text: map
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProtoError::InvalidContent("text content missing 'text'".into()))?
                    .to_string(),
            },
            t if t == ContentType::File as u8
                || t == ContentType::Image as u8
                || t == ContentType::Audio as u8
                || t == ContentType::Video as u8 =>
            {
                ContentBody::File(FileContent {
                    media: match t {
                        t if t == ContentType::Image as u8 => ContentType::Image,
                        t if t == ContentType::Audio as u8 => ContentType::Audio,
                        t if t == ContentType::Video as u8 => ContentType::Video,
                        _ => ContentType::File,
                    },
                    filename: map
                        .get("filename")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    data: match map.get("data") {
                        Some(value) => Some(parse_field(value, "data")?),
                        None => None,
                    },
                    url: map.get("url").and_then(Value::as_str).map(str::to_string),
                    password: match map.get("password") {
                        Some(value) => Some(parse_field(value, "password")?),
                        None => None,
                    },
                })
            }
            t if t == ContentType::Forward as u8 => {
                let forward = map
                    .remove("forward")
                    .ok_or_else(|| ProtoError::InvalidContent("forward content missing 'forward'".into()))?;
                ContentBody::Forward(Box::new(parse_field(&forward, "forward")?))
            }
            t if t == ContentType::Command as u8 || t == ContentType::History as u8 => {
                let name = map
                    .get("command")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProtoError::InvalidContent("command content missing 'command'".into()))?
                    .to_string();
                if t == ContentType::History as u8 && group.is_some() {
                    ContentBody::GroupCommand(GroupCommand {
                        name,
                        member: match map.get("member") {
                            Some(value) => Some(parse_field(value, "member")?),
                            None => None,
                        },
                        members: match map.get("members") {
                            Some(value) => Some(parse_field(value, "members")?),
                            None => None,
                        },
                        added: match map.get("added") {
                            Some(value) => Some(parse_field(value, "added")?),
                            None => None,
                        },
                        removed: match map.get("removed") {
                            Some(value) => Some(parse_field(value, "removed")?),
                            None => None,
                        },
                    })
                } else {
                    let mut extra = map.clone();
                    for key in ["type", "sn", "group", "command"] {
                        extra.remove(key);
                    }
                    ContentBody::Command(Command { name, extra })
                }
            }
            t if t == ContentType::Customized as u8 => ContentBody::Customized(CustomizedContent {
                app: require_str(&map, "app")?,
                module: require_str(&map, "mod")?,
                action: require_str(&map, "act")?,
                extra: map.get("extra").cloned(),
            }),
            other => {
                let mut fields = map.clone();
                for key in ["type", "sn", "group"] {
                    fields.remove(key);
                }
                ContentBody::Unknown {
                    content_type: other,
                    fields,
                }
            }
        };

        Ok(Content { sn, group, body })
    }
}

fn parse_field<T: serde::de::DeserializeOwned>(value: &Value, field: &str) -> Result<T, ProtoError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ProtoError::InvalidContent(format!("bad '{field}': {e}")))
}

fn require_str(map: &Map<String, Value>, field: &str) -> Result<String, ProtoError> {
    map.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProtoError::InvalidContent(format!("missing '{field}'")))
}

impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let value = Value::deserialize(deserializer)?;
        Content::from_value(value).map_err(D::Error::custom)
    }
}
