//! The `<Test ...>...</Test>` body shared by every command except heartbeats.
//!
//! Only the subset the control protocol produces is understood: one root
//! element with attributes and a flat list of text-only children, each of
//! which may carry attributes of its own.
use std::fmt::Write as _;

use crate::error::FrameError;

const ROOT: &str = "Test";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Child {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
}

impl Child {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        lookup(&self.attributes, name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestBody {
    attributes: Vec<(String, String)>,
    children: Vec<Child>,
}

fn lookup<'body>(attributes: &'body [(String, String)], name: &str) -> Option<&'body str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

impl TestBody {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn with_child(mut self, name: &str, text: &str) -> Self {
        self.children.push(Child {
            name: name.to_owned(),
            attributes: Vec::new(),
            text: text.to_owned(),
        });
        self
    }

    pub fn push_child(&mut self, child: Child) {
        self.children.push(child);
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        lookup(&self.attributes, name)
    }

    /// Text of the first child called `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|child| child.name == name)
            .map(|child| child.text.as_str())
    }

    pub fn children_named<'body>(&'body self, name: &'body str) -> impl Iterator<Item = &'body Child> {
        self.children.iter().filter(move |child| child.name == name)
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push('<');
        out.push_str(ROOT);
        render_attributes(&mut out, &self.attributes);
        out.push('>');
        for child in &self.children {
            out.push('<');
            out.push_str(&child.name);
            render_attributes(&mut out, &child.attributes);
            out.push('>');
            out.push_str(&escape(&child.text));
            let _written = write!(out, "</{}>", child.name);
        }
        let _written = write!(out, "</{}>", ROOT);
        out
    }

    /// Parses a rendered body.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not a single well-formed `<Test>`
    /// element.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let mut cursor = Cursor { rest: text };
        let root = cursor.open_tag()?;
        if root.name != ROOT {
            return Err(FrameError::UnexpectedElement {
                expected: ROOT,
                found: root.name,
            });
        }
        let mut body = TestBody {
            attributes: root.attributes,
            children: Vec::new(),
        };
        if root.self_closing {
            return Ok(body);
        }
        loop {
            cursor.skip_whitespace();
            if cursor.rest.starts_with("</") {
                cursor.close_tag(ROOT)?;
                break;
            }
            let tag = cursor.open_tag()?;
            let text = if tag.self_closing {
                String::new()
            } else {
                let text = cursor.text()?;
                cursor.close_tag(&tag.name)?;
                text
            };
            body.children.push(Child {
                name: tag.name,
                attributes: tag.attributes,
                text,
            });
        }
        Ok(body)
    }
}

fn render_attributes(out: &mut String, attributes: &[(String, String)]) {
    for (name, value) in attributes {
        let _written = write!(out, " {}=\"{}\"", name, escape(value));
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_owned();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

struct OpenTag {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
}

struct Cursor<'text> {
    rest: &'text str,
}

impl<'text> Cursor<'text> {
    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, token: &str) -> bool {
        match self.rest.strip_prefix(token) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn take_until(&mut self, stop: impl Fn(char) -> bool) -> &'text str {
        let end = self.rest.find(stop).unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }

    fn open_tag(&mut self) -> Result<OpenTag, FrameError> {
        self.skip_whitespace();
        if !self.eat("<") {
            return Err(FrameError::MalformedBody {
                reason: "expected '<'",
            });
        }
        let name = self
            .take_until(|ch| ch.is_whitespace() || ch == '>' || ch == '/')
            .to_owned();
        if name.is_empty() {
            return Err(FrameError::MalformedBody {
                reason: "empty element name",
            });
        }
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.eat("/>") {
                return Ok(OpenTag {
                    name,
                    attributes,
                    self_closing: true,
                });
            }
            if self.eat(">") {
                return Ok(OpenTag {
                    name,
                    attributes,
                    self_closing: false,
                });
            }
            let key = self
                .take_until(|ch| ch == '=' || ch.is_whitespace() || ch == '>')
                .to_owned();
            self.skip_whitespace();
            if key.is_empty() || !self.eat("=") {
                return Err(FrameError::MalformedBody {
                    reason: "attribute without value",
                });
            }
            self.skip_whitespace();
            let quote = if self.eat("\"") {
                '"'
            } else if self.eat("'") {
                '\''
            } else {
                return Err(FrameError::MalformedBody {
                    reason: "unquoted attribute value",
                });
            };
            let value = unescape(self.take_until(|ch| ch == quote));
            if !self.eat(if quote == '"' { "\"" } else { "'" }) {
                return Err(FrameError::MalformedBody {
                    reason: "unterminated attribute value",
                });
            }
            attributes.push((key, value));
        }
    }

    fn text(&mut self) -> Result<String, FrameError> {
        let raw = self.take_until(|ch| ch == '<');
        if self.rest.is_empty() {
            return Err(FrameError::MalformedBody {
                reason: "unterminated element",
            });
        }
        Ok(unescape(raw))
    }

    fn close_tag(&mut self, name: &str) -> Result<(), FrameError> {
        if !self.eat("</") {
            return Err(FrameError::MalformedBody {
                reason: "expected closing tag",
            });
        }
        let found = self.take_until(|ch| ch == '>' || ch.is_whitespace());
        if found != name {
            return Err(FrameError::MalformedBody {
                reason: "mismatched closing tag",
            });
        }
        self.skip_whitespace();
        if !self.eat(">") {
            return Err(FrameError::MalformedBody {
                reason: "unterminated closing tag",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};

    #[test]
    fn parses_attributes_children_and_entities() -> AppResult<()> {
        let body = TestBody::parse(
            r#"<Test time="t0" targetIP='unused'> <Class>Basic</Class><UserData>a &lt;b&gt; &amp; c</UserData><Metric name="GetIterations">4</Metric><Empty/></Test>"#,
        )?;
        if body.attribute("time") != Some("t0") || body.attribute("targetIP") != Some("unused") {
            return Err(AppError::validation("attributes not parsed"));
        }
        if body.child("Class") != Some("Basic") || body.child("UserData") != Some("a <b> & c") {
            return Err(AppError::validation("children not parsed"));
        }
        let metric = body.children_named("Metric").next();
        if metric.and_then(|child| child.attribute("name")) != Some("GetIterations") {
            return Err(AppError::validation("child attributes not parsed"));
        }
        if body.child("Empty") != Some("") {
            return Err(AppError::validation("self-closing child lost"));
        }
        Ok(())
    }

    #[test]
    fn rendered_body_escapes_markup() -> AppResult<()> {
        let body = TestBody::new()
            .with_attribute("targetIP", "a\"b")
            .with_child("UserData", "<x & y>");
        let rendered = body.render();
        if rendered != r#"<Test targetIP="a&quot;b"><UserData>&lt;x &amp; y&gt;</UserData></Test>"# {
            return Err(AppError::validation(format!("rendered {}", rendered)));
        }
        if TestBody::parse(&rendered)? != body {
            return Err(AppError::validation("escaped body did not parse back"));
        }
        Ok(())
    }

    #[test]
    fn rejects_malformed_bodies() -> AppResult<()> {
        for text in [
            "",
            "Test",
            "<Other></Other>",
            "<Test><Class>x</Klass></Test>",
            "<Test><Class>x",
            "<Test time=t0></Test>",
        ] {
            if TestBody::parse(text).is_ok() {
                return Err(AppError::validation(format!("accepted {:?}", text)));
            }
        }
        Ok(())
    }

    #[test]
    fn element_text_runs_up_to_the_next_tag() -> AppResult<()> {
        let body = TestBody::parse("<Test><UserData> spaced out </UserData>\n</Test>")?;
        if body.child("UserData") != Some(" spaced out ") {
            return Err(AppError::validation("element text trimmed or truncated"));
        }
        if TestBody::parse("<Test><UserData>no closing tag at all").is_ok() {
            return Err(AppError::validation("accepted text running to end of input"));
        }
        Ok(())
    }
}
