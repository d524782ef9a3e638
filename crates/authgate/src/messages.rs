//! Player-facing text for the login commands.
//!
//! Every reply is `prefix + message`, with `&`-style colour codes turned
//! into the `§` codes clients render.

use serde::{Deserialize, Serialize};

/// `[messages]` section of the server config.
///
/// Keys are kebab-case in TOML (`already-logged-in = "..."`). Missing keys
/// fall back to the built-in text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Messages {
    pub prefix: String,
    pub already_logged_in: String,
    pub usage_login: String,
    pub not_registered: String,
    pub login_success: String,
    pub login_failed: String,
    pub usage_register: String,
    pub password_mismatch: String,
    pub already_registered: String,
    pub register_success: String,
    pub login_required: String,
    pub unknown_command: String,
    pub internal_error: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            prefix: "&8[&6Authgate&8] &7".into(),
            already_logged_in: "&cYou are already logged in.".into(),
            usage_login: "Usage: /login <password>".into(),
            not_registered: "&cYou are not registered. Use /register <password> <password>."
                .into(),
            login_success: "&aLogged in.".into(),
            login_failed: "&cWrong password.".into(),
            usage_register: "Usage: /register <password> <password>".into(),
            password_mismatch: "&cThe passwords do not match.".into(),
            already_registered: "&cThis name is already registered. Use /login <password>."
                .into(),
            register_success: "&aRegistered and logged in.".into(),
            login_required: "Please /login <password> or /register <password> <password>."
                .into(),
            unknown_command: "&cUnknown command.".into(),
            internal_error: "&cSomething went wrong. Please try again.".into(),
        }
    }
}

impl Messages {
    /// `prefix + text` with colour codes translated.
    pub fn render(&self, text: &str) -> String {
        translate_colour_codes(&format!("{}{}", self.prefix, text))
    }
}

/// Replaces `&c` with `§c` for every valid colour or format code `c`.
///
/// Codes are case-insensitive and come out lowercase. An `&` not followed
/// by a valid code is left alone.
pub fn translate_colour_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&' {
            if let Some(&code) = chars.peek() {
                if is_colour_code(code) {
                    out.push('§');
                    out.push(code.to_ascii_lowercase());
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn is_colour_code(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), '0'..='9' | 'a'..='f' | 'k'..='o' | 'r' | 'x')
}
