use sheetbot_backend::{BackendError, BackendErrorKind, StatusReport};

use crate::{
    command::{
        LABEL_CLEAR, LABEL_DATE, LABEL_RESTART, LABEL_START, LABEL_STATUS,
        LABEL_UPDATE_INTERVALS, file_label,
    },
    resources::ResourceRegistry,
};

pub const GREETING: &str = "Добро пожаловать! Выбери действие:";
pub const INTERVALS_UPDATED: &str = "Интервалы успешно обновлены!";
pub const RESTARTING: &str = "Бот будет перезапущен...";
pub const FALLBACK: &str = "Выбери действие на клавиатуре.";
pub const ACCESS_DENIED: &str = "Доступ запрещён.";
pub const SELECT_FIRST: &str = "Сначала выбери файл.";
pub const DATE_FORMAT_ERROR: &str =
    "Неверный формат даты. Используй ДД.ММ.ГГГГ и снова нажми «Дата».";
pub const CLEARED: &str = "Таблица очищена.";
pub const BACKEND_TIMEOUT: &str = "Таблица не ответила вовремя. Попробуй ещё раз позже.";
pub const BACKEND_MALFORMED: &str = "Таблица вернула неожиданный ответ.";

const MAX_DIAGNOSTIC_CHARS: usize = 120;

/// Which keyboard accompanies a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMenu {
    /// The main action keyboard.
    Main,
    /// Hide the keyboard so the user types free text.
    Remove,
    /// Leave whatever keyboard the client shows.
    None,
}

/// Text plus menu choice; rendering belongs to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub menu: ReplyMenu,
}

impl Reply {
    pub fn main(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            menu: ReplyMenu::Main,
        }
    }

    pub fn remove_menu(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            menu: ReplyMenu::Remove,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            menu: ReplyMenu::None,
        }
    }
}

/// Result of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(Reply),
    /// Send the acknowledgement, then terminate so the supervisor restarts us.
    Restart(Reply),
}

impl Outcome {
    pub fn reply(&self) -> &Reply {
        match self {
            Self::Reply(reply) | Self::Restart(reply) => reply,
        }
    }

    pub fn is_restart(&self) -> bool {
        matches!(self, Self::Restart(_))
    }
}

/// Rows of button labels for the main keyboard.
pub fn main_menu(registry: &ResourceRegistry) -> Vec<Vec<String>> {
    let mut rows = vec![
        vec![LABEL_START.to_string(), LABEL_DATE.to_string()],
        vec![LABEL_UPDATE_INTERVALS.to_string()],
        vec![LABEL_STATUS.to_string(), LABEL_CLEAR.to_string()],
    ];
    let files: Vec<String> = registry.keys().map(file_label).collect();
    rows.extend(files.chunks(2).map(<[String]>::to_vec));
    rows.push(vec![LABEL_RESTART.to_string()]);
    rows
}

pub(crate) fn date_prompt(date: &str) -> String {
    format!("Текущая дата: {date}\nКакую дату ставим?")
}

pub(crate) fn date_set(date: &str) -> String {
    format!("Новая дата {date} установлена")
}

pub(crate) fn resource_selected(key: &str) -> String {
    format!("Выбран файл {key}.")
}

pub(crate) fn unknown_resource(key: &str, registry: &ResourceRegistry) -> String {
    let known: Vec<&str> = registry.keys().collect();
    if known.is_empty() {
        format!("Файл {key} не найден: выбор файлов не настроен.")
    } else {
        format!("Файл {key} не найден. Доступны: {}.", known.join(", "))
    }
}

pub(crate) fn status_report(report: &StatusReport) -> String {
    if report.is_empty() {
        return "Статус: ок".to_string();
    }
    let mut text = String::from("Статус:");
    for (name, value) in &report.counters {
        text.push_str(&format!("\n{name}: {value}"));
    }
    text
}

/// User-facing text for a failed backend call. Raw transport details are
/// cut down to a short diagnostic.
pub(crate) fn backend_error(err: &BackendError) -> String {
    match err.kind {
        BackendErrorKind::Timeout => BACKEND_TIMEOUT.to_string(),
        BackendErrorKind::Transport => {
            format!("Ошибка соединения с таблицей: {}", short_diagnostic(&err.message))
        },
        BackendErrorKind::MalformedResponse => BACKEND_MALFORMED.to_string(),
        BackendErrorKind::ApplicationError => format!("Ошибка таблицы: {}", err.message),
    }
}

fn short_diagnostic(message: &str) -> String {
    let line = message.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
    cut.push('…');
    cut
}
