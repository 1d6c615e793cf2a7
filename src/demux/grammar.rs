//! Delimiter grammar of the streaming tag demultiplexer

use thiserror::Error;

use crate::core::STREAM_END_FLAG;

/// Errors raised when building a grammar
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("delimiter '{0}' is empty")]
    Empty(&'static str),

    #[error("delimiter '{outer}' contains delimiter '{inner}'")]
    Overlapping { outer: String, inner: String },
}

/// Which delimiter of the grammar matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    NameOpen,
    NameClose,
    PayloadOpen,
    PayloadClose,
    End,
}

impl Delimiter {
    fn label(&self) -> &'static str {
        match self {
            Delimiter::NameOpen => "name_open",
            Delimiter::NameClose => "name_close",
            Delimiter::PayloadOpen => "payload_open",
            Delimiter::PayloadClose => "payload_close",
            Delimiter::End => "end",
        }
    }
}

/// Literal delimiters framing each artifact
///
/// An artifact is `name_open NAME name_close payload_open PAYLOAD
/// payload_close`; `end` terminates the whole generation. No delimiter may be
/// empty or contain another one, which guarantees that splitting the input
/// differently never changes where a delimiter is recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxGrammar {
    name_open: String,
    name_close: String,
    payload_open: String,
    payload_close: String,
    end: String,
}

impl DemuxGrammar {
    pub fn new(
        name_open: impl Into<String>,
        name_close: impl Into<String>,
        payload_open: impl Into<String>,
        payload_close: impl Into<String>,
        end: impl Into<String>,
    ) -> Result<Self, GrammarError> {
        let grammar = Self {
            name_open: name_open.into(),
            name_close: name_close.into(),
            payload_open: payload_open.into(),
            payload_close: payload_close.into(),
            end: end.into(),
        };
        grammar.validate()?;
        Ok(grammar)
    }

    fn validate(&self) -> Result<(), GrammarError> {
        let all = self.all();
        for (kind, literal) in &all {
            if literal.is_empty() {
                return Err(GrammarError::Empty(kind.label()));
            }
        }
        for (i, (_, outer)) in all.iter().enumerate() {
            for (j, (_, inner)) in all.iter().enumerate() {
                if i != j && outer.contains(*inner) {
                    return Err(GrammarError::Overlapping {
                        outer: outer.to_string(),
                        inner: inner.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn all(&self) -> [(Delimiter, &str); 5] {
        [
            (Delimiter::NameOpen, self.name_open.as_str()),
            (Delimiter::NameClose, self.name_close.as_str()),
            (Delimiter::PayloadOpen, self.payload_open.as_str()),
            (Delimiter::PayloadClose, self.payload_close.as_str()),
            (Delimiter::End, self.end.as_str()),
        ]
    }

    pub fn literal(&self, delimiter: Delimiter) -> &str {
        match delimiter {
            Delimiter::NameOpen => &self.name_open,
            Delimiter::NameClose => &self.name_close,
            Delimiter::PayloadOpen => &self.payload_open,
            Delimiter::PayloadClose => &self.payload_close,
            Delimiter::End => &self.end,
        }
    }

    /// Length in bytes of the longest delimiter
    pub fn longest(&self) -> usize {
        self.all().iter().map(|(_, l)| l.len()).max().unwrap_or(0)
    }
}

impl Default for DemuxGrammar {
    fn default() -> Self {
        Self {
            name_open: "<file_name>".into(),
            name_close: "</file_name>".into(),
            payload_open: "<code>".into(),
            payload_close: "</code>".into(),
            end: STREAM_END_FLAG.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grammar_is_valid() {
        let grammar = DemuxGrammar::default();
        assert!(grammar.validate().is_ok());
        assert_eq!(grammar.longest(), "[STREAM_END_FLAG]".len());
        assert_eq!(grammar.literal(Delimiter::End), "[STREAM_END_FLAG]");
    }

    #[test]
    fn test_rejects_empty_delimiter() {
        let err = DemuxGrammar::new("<n>", "", "<p>", "</p>", "END").unwrap_err();
        assert_eq!(err, GrammarError::Empty("name_close"));
    }

    #[test]
    fn test_rejects_nested_delimiters() {
        let err = DemuxGrammar::new("<n>", "</n>", "<p>", "</p>", "<p>!").unwrap_err();
        assert!(matches!(err, GrammarError::Overlapping { .. }));
        assert!(err.to_string().contains("'<p>!' contains delimiter '<p>'"));
    }

    #[test]
    fn test_custom_grammar() {
        let grammar = DemuxGrammar::new("[[", "]]", "{{", "}}", "<<END>>").unwrap();
        assert_eq!(grammar.literal(Delimiter::PayloadOpen), "{{");
        assert_eq!(grammar.longest(), 7);
    }
}
