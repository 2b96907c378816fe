//! Whitespace-splitting parser for inbound protocol lines.
//!
//! `[:prefix] COMMAND [param ...] [:trailing text]`
//!
//! The parser is deliberately lenient: it never rejects a line that has a
//! command token, and leaves field-count checks to the dispatcher.

use crate::error::MalformedLine;

/// Sender of a line: `nick!user@host` or a bare server name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    /// Part before `!` (the whole prefix for servers).
    pub nick: String,
    /// Full `nick!user@host` without the leading `:`.
    pub identity: String,
}

impl Prefix {
    pub fn parse(raw: &str) -> Self {
        let identity = raw.strip_prefix(':').unwrap_or(raw).to_string();
        let nick = identity.split('!').next().unwrap_or("").to_string();
        Self { nick, identity }
    }
}

/// Structured view of one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub prefix: Option<Prefix>,
    /// Command token, case preserved.
    pub command: String,
    /// Middle parameters, in order.
    pub params: Vec<String>,
    /// Free text after ` :`, spacing preserved.
    pub trailing: Option<String>,
}

impl ParsedEvent {
    pub fn parse(line: &str) -> Result<Self, MalformedLine> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start();

        // Message tags are never negotiated, but skip them if a server sends some.
        if rest.starts_with('@') {
            rest = split_token(rest).1;
        }
        if rest.is_empty() {
            return Err(MalformedLine::Empty);
        }

        let prefix = if rest.starts_with(':') {
            let (token, tail) = split_token(rest);
            rest = tail;
            Some(Prefix::parse(token))
        } else {
            None
        };

        let (command, tail) = split_token(rest);
        if command.is_empty() {
            return Err(MalformedLine::MissingCommand);
        }
        rest = tail;

        let mut params = Vec::new();
        let mut trailing = None;
        while !rest.is_empty() {
            if let Some(text) = rest.strip_prefix(':') {
                trailing = Some(text.to_string());
                break;
            }
            let (token, tail) = split_token(rest);
            params.push(token.to_string());
            rest = tail;
        }

        Ok(Self {
            prefix,
            command: command.to_string(),
            params,
            trailing,
        })
    }

    /// Number of whitespace-separated fields on the original line
    /// (prefix, command, params and the trailing parameter as one field).
    pub fn field_count(&self) -> usize {
        usize::from(self.prefix.is_some()) + 1 + self.params.len() + usize::from(self.trailing.is_some())
    }

    /// Parameter `i`, counting the trailing parameter as the last one.
    pub fn arg(&self, i: usize) -> Option<&str> {
        match self.params.get(i) {
            Some(p) => Some(p.as_str()),
            None if i == self.params.len() => self.trailing.as_deref(),
            None => None,
        }
    }

    /// Everything from parameter `i` onward, as the sender wrote it.
    pub fn text_from(&self, i: usize) -> Option<String> {
        if i < self.params.len() {
            let mut words: Vec<&str> = self.params[i..].iter().map(String::as_str).collect();
            if let Some(ref t) = self.trailing {
                words.push(t);
            }
            Some(words.join(" "))
        } else if i == self.params.len() {
            self.trailing.clone()
        } else {
            None
        }
    }
}

/// First whitespace-delimited token, and the remainder with leading
/// whitespace removed.
fn split_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_privmsg() {
        let ev = ParsedEvent::parse(":nick!user@host PRIVMSG #chan :hello world\r\n").unwrap();
        let prefix = ev.prefix.as_ref().unwrap();
        assert_eq!(prefix.nick, "nick");
        assert_eq!(prefix.identity, "nick!user@host");
        assert_eq!(ev.command, "PRIVMSG");
        assert_eq!(ev.params, vec!["#chan"]);
        assert_eq!(ev.trailing.as_deref(), Some("hello world"));
        assert_eq!(ev.field_count(), 4);
    }

    #[test]
    fn parses_unprefixed_ping() {
        let ev = ParsedEvent::parse("PING abc123").unwrap();
        assert!(ev.prefix.is_none());
        assert_eq!(ev.command, "PING");
        assert_eq!(ev.arg(0), Some("abc123"));
        assert_eq!(ev.trailing, None);

        let ev = ParsedEvent::parse("PING :irc.example.org").unwrap();
        assert_eq!(ev.arg(0), Some("irc.example.org"));
        assert!(ev.params.is_empty());
    }

    #[test]
    fn trailing_keeps_inner_spacing_and_colons() {
        let ev = ParsedEvent::parse(":a!b@c PRIVMSG #x :two  spaces :colon").unwrap();
        assert_eq!(ev.trailing.as_deref(), Some("two  spaces :colon"));
    }

    #[test]
    fn server_prefix_has_no_user() {
        let ev = ParsedEvent::parse(":irc.example.org 001 skelly :Welcome").unwrap();
        let prefix = ev.prefix.as_ref().unwrap();
        assert_eq!(prefix.nick, "irc.example.org");
        assert_eq!(ev.command, "001");
        assert_eq!(ev.arg(0), Some("skelly"));
        assert_eq!(ev.arg(1), Some("Welcome"));
        assert_eq!(ev.arg(2), None);
    }

    #[test]
    fn text_from_joins_middle_params() {
        let ev = ParsedEvent::parse(":a!b@c PRIVMSG #x hello there").unwrap();
        assert_eq!(ev.text_from(1).as_deref(), Some("hello there"));
        let ev = ParsedEvent::parse(":a!b@c PRIVMSG #x :hello there").unwrap();
        assert_eq!(ev.text_from(1).as_deref(), Some("hello there"));
        assert_eq!(ev.text_from(2), None);
    }

    #[test]
    fn rejects_empty_and_bare_prefix() {
        assert_eq!(ParsedEvent::parse(""), Err(MalformedLine::Empty));
        assert_eq!(ParsedEvent::parse("   \r\n"), Err(MalformedLine::Empty));
        assert_eq!(ParsedEvent::parse(":only.prefix"), Err(MalformedLine::MissingCommand));
    }

    #[test]
    fn skips_message_tags() {
        let ev = ParsedEvent::parse("@time=2024-01-01T00:00:00Z :a!b@c PRIVMSG #x :hi").unwrap();
        assert_eq!(ev.command, "PRIVMSG");
        assert_eq!(ev.prefix.unwrap().nick, "a");
    }

    #[test]
    fn parse_is_deterministic() {
        let line = ":n!u@h KICK #chan victim :bye";
        assert_eq!(ParsedEvent::parse(line), ParsedEvent::parse(line));
    }
}
