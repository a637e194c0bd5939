//! Shared primitive types used across the desk.

/// Monotonic report id assigned by the store.
pub type ReportId = i64;

/// Profile id, `pid-` followed by eight hex characters.
pub type ProfileId = String;

/// End user (reporter, searcher or admin) id on the chat platform.
pub type UserId = i64;

/// Chat id. One session exists per chat.
pub type ChatId = i64;

/// Id of a message previously sent by the desk.
pub type MessageId = i64;

/// Opaque reference to a stored photo (platform file id or path).
pub type FileRef = String;
