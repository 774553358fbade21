//! Tokenizer for `;`-separated attribute lines.
//!
//! Descriptor requirement lines and the component lines of the resolution
//! cache file share this tokenizer. A line is `ID; name=value; name:=value ...`:
//! the first token is the identifier, every later token that contains `=` is an
//! attribute, anything else is dropped. `name=` and `name:=` are distinct keys;
//! consumers look up the exact form they recognize.

/// One attribute token following the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    /// Written as `name:=value` rather than `name=value`.
    pub directive: bool,
    pub value: &'a str,
}

/// A line split into its identifier and attributes, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedLine<'a> {
    pub id: &'a str,
    pub attributes: Vec<Attribute<'a>>,
}

impl<'a> TokenizedLine<'a> {
    /// Value of `name=...`. The last occurrence wins.
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.find(|a| !a.directive && a.name == name)
    }

    /// Value of `name:=...`. The last occurrence wins.
    pub fn directive(&self, name: &str) -> Option<&'a str> {
        self.find(|a| a.directive && a.name == name)
    }

    /// Value of `name` in either form. The last occurrence wins.
    pub fn value(&self, name: &str) -> Option<&'a str> {
        self.find(|a| a.name == name)
    }

    fn find(&self, mut pred: impl FnMut(&Attribute<'a>) -> bool) -> Option<&'a str> {
        self.attributes
            .iter()
            .rev()
            .find(|a| pred(a))
            .map(|a| a.value)
    }
}

/// Split a line into identifier and attributes.
///
/// Returns `None` when the line has fewer than two `;`-separated tokens or an
/// empty identifier; such lines are not requirement lines.
pub fn tokenize(line: &str) -> Option<TokenizedLine<'_>> {
    let mut tokens = line.split(';');
    let id = tokens.next()?.trim();
    let rest: Vec<&str> = tokens.collect();
    if id.is_empty() || rest.is_empty() {
        return None;
    }

    let attributes = rest
        .into_iter()
        .filter_map(|token| parse_attribute(token.trim()))
        .collect();

    Some(TokenizedLine { id, attributes })
}

fn parse_attribute(token: &str) -> Option<Attribute<'_>> {
    let (key, value) = token.split_once('=')?;
    let (name, directive) = match key.strip_suffix(':') {
        Some(name) => (name, true),
        None => (key, false),
    };
    if name.is_empty() {
        return None;
    }
    Some(Attribute {
        name,
        directive,
        value: unquote(value),
    })
}

/// Strip exactly one layer of matching double quotes.
pub fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
