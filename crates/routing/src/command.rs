//! Text → [`Command`] classification.
//!
//! Menu labels are matched case-insensitively and exactly (after trimming).
//! While a date is pending, only a strict `DD.MM.YYYY` answer counts; anything
//! else is [`Command::Unknown`].

use std::sync::LazyLock;

use {regex::Regex, sheetbot_sessions::PendingInput};

pub const LABEL_START: &str = "Старт";
pub const LABEL_DATE: &str = "Дата";
pub const LABEL_UPDATE_INTERVALS: &str = "Обновить Интервалы";
pub const LABEL_STATUS: &str = "Статус";
pub const LABEL_CLEAR: &str = "Очистить";
pub const LABEL_RESTART: &str = "Рестарт";
/// Prefix of the "select file" buttons, followed by the registry key.
pub const LABEL_FILE_PREFIX: &str = "Файл";

/// Day 00–31, month 00–12, four-digit year. ASCII digits only.
#[allow(clippy::unwrap_used)]
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-2][0-9]|3[01])\.(?:0[0-9]|1[0-2])\.[0-9]{4}$").unwrap()
});

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    ShowDate,
    SubmitDate(String),
    UpdateIntervals,
    ShowStatus,
    ClearResource,
    SelectResource(String),
    Restart,
    Unknown(String),
}

impl Command {
    /// Stable name for logs and metric labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ShowDate => "show_date",
            Self::SubmitDate(_) => "submit_date",
            Self::UpdateIntervals => "update_intervals",
            Self::ShowStatus => "show_status",
            Self::ClearResource => "clear_resource",
            Self::SelectResource(_) => "select_resource",
            Self::Restart => "restart",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Whether `text` is a strict `DD.MM.YYYY` date.
#[must_use]
pub fn is_date(text: &str) -> bool {
    DATE_PATTERN.is_match(text)
}

/// Classify raw message text given the user's pending input.
#[must_use]
pub fn classify(text: &str, pending: Option<PendingInput>) -> Command {
    let text = text.trim();

    if pending == Some(PendingInput::AwaitingDate) {
        return if is_date(text) {
            Command::SubmitDate(text.to_string())
        } else {
            Command::Unknown(text.to_string())
        };
    }

    let lowered = text.to_lowercase();
    let lowered = strip_bot_mention(&lowered);

    if lowered == "/start" || lowered == LABEL_START.to_lowercase() {
        return Command::Start;
    }
    if lowered == LABEL_DATE.to_lowercase() {
        return Command::ShowDate;
    }
    if lowered == LABEL_UPDATE_INTERVALS.to_lowercase() {
        return Command::UpdateIntervals;
    }
    if lowered == LABEL_STATUS.to_lowercase() {
        return Command::ShowStatus;
    }
    if lowered == LABEL_CLEAR.to_lowercase() {
        return Command::ClearResource;
    }
    if lowered == LABEL_RESTART.to_lowercase() {
        return Command::Restart;
    }
    if let Some(key) = file_key(lowered) {
        return Command::SelectResource(key.to_string());
    }

    Command::Unknown(text.to_string())
}

/// Button label that selects the resource registered under `key`.
#[must_use]
pub fn file_label(key: &str) -> String {
    format!("{LABEL_FILE_PREFIX} {key}")
}

/// `"/start@sheet_bot"` → `"/start"`. Plain text passes through.
fn strip_bot_mention(text: &str) -> &str {
    if text.starts_with('/') {
        text.split('@').next().unwrap_or(text)
    } else {
        text
    }
}

fn file_key(lowered: &str) -> Option<&str> {
    let prefix = LABEL_FILE_PREFIX.to_lowercase();
    let rest = lowered
        .strip_prefix(prefix.as_str())
        .or_else(|| lowered.strip_prefix("/file"))?;
    // "файл 3" and "файл3" both select "3"; "файлы" does not.
    let key = rest.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    if rest.starts_with(char::is_whitespace) || key.chars().all(|c| c.is_ascii_digit()) {
        Some(key)
    } else {
        None
    }
}
