//! Connection settings form.
//!
//! Every edit replaces exactly one field of the current settings and is handed
//! to the host straight away. Nothing is validated here: a port that does not
//! parse is stored as absent and left for the backend to default.

use common::models::settings::{
    DataSourceSettings, SecureOptions, DEFAULT_PORT, DEFAULT_USERNAME, PASSWORD_KEY,
};

/// Receives the edited settings.
pub trait OptionsHost {
    fn on_options_change(&mut self, settings: DataSourceSettings);
}

impl<T: OptionsHost + ?Sized> OptionsHost for Box<T> {
    fn on_options_change(&mut self, settings: DataSourceSettings) {
        (**self).on_options_change(settings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    /// Masked input that can be reset once stored.
    Secret,
}

/// Describes one input of the form for the host to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub placeholder: Option<&'static str>,
}

const PORT_PLACEHOLDER: &str = "6875";

pub const FIELDS: [FieldDescriptor; 4] = [
    FieldDescriptor {
        key: "host",
        label: "Host",
        kind: FieldKind::Text,
        placeholder: None,
    },
    FieldDescriptor {
        key: "port",
        label: "Port",
        kind: FieldKind::Number,
        placeholder: Some(PORT_PLACEHOLDER),
    },
    FieldDescriptor {
        key: "username",
        label: "Username",
        kind: FieldKind::Text,
        placeholder: Some(DEFAULT_USERNAME),
    },
    FieldDescriptor {
        key: PASSWORD_KEY,
        label: "Password",
        kind: FieldKind::Secret,
        placeholder: None,
    },
];

/// What the password input shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretState {
    /// A password is stored; its value is never sent back.
    Configured,
    NotConfigured,
}

pub struct ConfigEditor<H> {
    options: DataSourceSettings,
    host: H,
}

impl<H: OptionsHost> ConfigEditor<H> {
    pub fn new(options: DataSourceSettings, host: H) -> Self {
        Self { options, host }
    }

    pub fn options(&self) -> &DataSourceSettings {
        &self.options
    }

    /// Takes settings pushed by the host, e.g. after a save.
    pub fn set_options(&mut self, options: DataSourceSettings) {
        self.options = options;
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        &FIELDS
    }

    pub fn password_state(&self) -> SecretState {
        if self.options.is_password_configured() {
            SecretState::Configured
        } else {
            SecretState::NotConfigured
        }
    }

    pub fn on_host_change(&mut self, value: &str) {
        let mut next = self.options.clone();
        next.json_data.host = Some(value.to_string());
        self.commit(next);
    }

    pub fn on_port_change(&mut self, value: &str) {
        let mut next = self.options.clone();
        next.json_data.port = parse_port(value);
        self.commit(next);
    }

    pub fn on_username_change(&mut self, value: &str) {
        let mut next = self.options.clone();
        next.json_data.username = Some(value.to_string());
        self.commit(next);
    }

    /// The new password only ever goes to the secure settings.
    pub fn on_password_change(&mut self, value: &str) {
        let mut next = self.options.clone();
        next.secure_json_data = Some(SecureOptions {
            password: Some(value.to_string()),
        });
        self.commit(next);
    }

    /// Forgets the stored password so a new one can be entered.
    pub fn on_reset_password(&mut self) {
        let mut next = self.options.clone();
        next.secure_json_fields.insert(PASSWORD_KEY.to_string(), false);
        next.secure_json_data = Some(SecureOptions {
            password: Some(String::new()),
        });
        self.commit(next);
    }

    fn commit(&mut self, next: DataSourceSettings) {
        self.options = next.clone();
        self.host.on_options_change(next);
    }
}

/// Parses the leading decimal integer of `value`, ignoring anything after it.
///
/// Input without leading digits, or a number that is not a valid port, gives
/// `None`.
pub fn parse_port(value: &str) -> Option<u16> {
    let value = value.trim_start();
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 || negative {
        return None;
    }
    digits[..end].parse().ok()
}

/// The port the backend will use when none is configured.
pub fn effective_port(settings: &DataSourceSettings) -> u16 {
    settings.json_data.port.unwrap_or(DEFAULT_PORT)
}
