//! SMTP service extensions advertised in EHLO replies.

use std::collections::BTreeMap;

use crate::types::Reply;

/// Extension set negotiated for one session epoch.
///
/// Maps each advertised keyword (upper-cased) to its optional parameter
/// string. Keywords the session does not act on are kept as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    entries: BTreeMap<String, Option<String>>,
}

impl Extensions {
    /// Creates an empty extension set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Builds the extension set from an EHLO reply.
    ///
    /// The first line carries the server greeting and is skipped.
    #[must_use]
    pub fn from_ehlo(reply: &Reply) -> Self {
        let mut extensions = Self::new();
        for line in reply.message.iter().skip(1) {
            extensions.insert_line(line);
        }
        extensions
    }

    /// Records one EHLO keyword line such as `SIZE 1000000`.
    pub fn insert_line(&mut self, line: &str) {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return;
        };
        let param = parts.collect::<Vec<_>>().join(" ");
        let param = (!param.is_empty()).then_some(param);
        self.entries.insert(keyword.to_uppercase(), param);
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns true if no extension was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of advertised keywords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if a keyword was advertised (case-insensitive).
    #[must_use]
    pub fn contains(&self, keyword: &str) -> bool {
        self.entries.contains_key(&keyword.to_uppercase())
    }

    /// Returns the parameter of an advertised keyword.
    ///
    /// `None` if the keyword is absent, `Some(None)` if it carries no parameter.
    #[must_use]
    pub fn get(&self, keyword: &str) -> Option<Option<&str>> {
        self.entries
            .get(&keyword.to_uppercase())
            .map(Option::as_deref)
    }

    /// Checks if STARTTLS is offered.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.contains("STARTTLS")
    }

    /// Checks if SMTPUTF8 is offered.
    #[must_use]
    pub fn supports_smtputf8(&self) -> bool {
        self.contains("SMTPUTF8")
    }

    /// Checks if 8BITMIME is offered.
    #[must_use]
    pub fn supports_8bitmime(&self) -> bool {
        self.contains("8BITMIME")
    }

    /// Checks if PIPELINING is offered.
    #[must_use]
    pub fn supports_pipelining(&self) -> bool {
        self.contains("PIPELINING")
    }

    /// Returns the maximum message size, if advertised.
    ///
    /// `SIZE 0` means the server declares no fixed limit and yields `None`.
    #[must_use]
    pub fn max_size(&self) -> Option<usize> {
        self.get("SIZE")
            .flatten()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&size| size > 0)
    }

}
