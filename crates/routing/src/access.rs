use sheetbot_common::UserId;

/// Users allowed to drive the bot. Immutable after startup.
///
/// Only numeric Telegram user ids are accepted. Usernames can be changed and
/// reclaimed by someone else, so they never grant access.
#[derive(Debug, Clone)]
pub struct AccessList {
    ids: Vec<UserId>,
}

/// Why an allowlist could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessListError {
    #[error("access allowlist is empty")]
    Empty,
    #[error("allowlist entry '{entry}' is not a numeric Telegram user id")]
    NotAnId { entry: String },
}

impl AccessList {
    /// Build the list from user ids. Blank entries are skipped.
    ///
    /// An empty list is refused rather than read as "allow everyone".
    pub fn new<I, S>(entries: I) -> Result<Self, AccessListError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            if !is_user_id(entry) {
                return Err(AccessListError::NotAnId {
                    entry: entry.to_string(),
                });
            }
            ids.push(UserId::new(entry));
        }
        if ids.is_empty() {
            return Err(AccessListError::Empty);
        }
        Ok(Self { ids })
    }

    /// Pure lookup: is this user on the list?
    pub fn authorize(&self, user: &UserId) -> Result<(), AccessDenied> {
        if self.ids.contains(user) {
            Ok(())
        } else {
            Err(AccessDenied {
                user_id: user.clone(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A user not on the allowlist tried to issue a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("user {user_id} not on allowlist")]
pub struct AccessDenied {
    pub user_id: UserId,
}

/// Telegram user ids are positive integers.
fn is_user_id(entry: &str) -> bool {
    entry.bytes().all(|b| b.is_ascii_digit()) && entry.parse::<u64>().is_ok_and(|id| id > 0)
}
