static OPEN_DELIMITER: &str = "{{";
static CLOSE_DELIMITER: &str = "}}";


#[derive(Clone)]
pub(crate) struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Reader {
            input,
            pos: 0
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<Token<'a>> {
        if self.pos == self.input.len() {
            None
        } else {
            let tail = &self.input[self.pos..];
            let token = if tail.starts_with(OPEN_DELIMITER) {
                self.read_tag(tail)
            } else {
                self.read_text(tail)
            };
            Some(token)
        }
    }

    fn read_text(&mut self, tail: &'a str) -> Token<'a> {
        let (text, after_text) = tail.span_text();
        self.pos += after_text;
        Token::Text(text)
    }

    fn read_tag(&mut self, tail: &'a str) -> Token<'a> {
        if let Some((code, after_tag)) = tail.span_tag() {
            self.pos += after_tag;
            Token::Tag(code)
        } else {
            // without a close here there is none further on either
            self.pos = self.input.len();
            Token::Text(tail)
        }
    }
}


#[derive(PartialEq, Debug)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    /// Delimiter content, already trimmed.
    Tag(&'a str),
}

trait ReaderStringOps {
    fn span_text(&self) -> (&str, usize);
    fn span_tag(&self) -> Option<(&str, usize)>;
}

impl ReaderStringOps for str {
    // return the text before the next open delimiter and the position after it
    fn span_text(&self) -> (&str, usize) {
        let after_text = self.find(OPEN_DELIMITER).unwrap_or(self.len());
        (&self[..after_text], after_text)
    }

    // return the trimmed tag content and the position after the close delimiter;
    // the content holds at least one character after any leading whitespace,
    // so `{{}}}` and `{{ }}}` both close on the last pair
    fn span_tag(&self) -> Option<(&str, usize)> {
        let odl = OPEN_DELIMITER.len();
        let inner = &self[odl..];
        let lead = inner.len() - inner.trim_start().len();
        let first = inner[lead..].chars().next()?.len_utf8();
        let end = match inner[lead + first..].find(CLOSE_DELIMITER) {
            Some(p) => lead + first + p,
            // whitespace only, closed right after it
            None if lead > 0 && inner[lead..].starts_with(CLOSE_DELIMITER) => lead,
            None => return None
        };
        Some((inner[..end].trim(), odl + end + CLOSE_DELIMITER.len()))
    }
}
