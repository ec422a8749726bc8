use std::fmt;

use crate::security::Secret;

/// A RouterOS console command assembled from plain and sensitive parts.
///
/// `Display` renders sensitive parts through [`Secret`], so logging a command
/// never shows the password. [`RemoteCommand::wire`] renders the text that is
/// actually sent over the SSH channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Plain(String),
    Sensitive(Secret),
}

impl RemoteCommand {
    pub fn new(head: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Plain(head.into())],
        }
    }

    /// Append plain text.
    pub fn push(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Plain(text.into()));
        self
    }

    /// Append a secret value inside a RouterOS double-quoted string.
    pub fn push_quoted_secret(mut self, secret: &Secret) -> Self {
        self.segments.push(Segment::Plain("\"".to_string()));
        self.segments
            .push(Segment::Sensitive(Secret::new(escape_quoted(secret.expose()))));
        self.segments.push(Segment::Plain("\"".to_string()));
        self
    }

    /// `/system backup save name=<name> password="<password>"`
    pub fn backup_save(name: &str, password: &Secret) -> Self {
        RemoteCommand::new("/system backup save name=")
            .push(name)
            .push(" password=")
            .push_quoted_secret(password)
    }

    /// `/file remove <name>`
    pub fn file_remove(name: &str) -> Self {
        RemoteCommand::new("/file remove ").push(name)
    }

    /// Text sent to the appliance, secrets included.
    pub fn wire(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Plain(text) => text.as_str(),
                Segment::Sensitive(secret) => secret.expose(),
            })
            .collect()
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Plain(text) => f.write_str(text)?,
                Segment::Sensitive(secret) => write!(f, "{}", secret)?,
            }
        }
        Ok(())
    }
}

/// Escape a value for use inside a RouterOS double-quoted string.
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
