//! Log template compiler.
//!
//! A template is literal text with `{token}` placeholders. It is scanned once
//! at setup into a list of [`Emitter`]s that every request reuses.
//!
//! Scanner rules:
//! - `\` makes the next character literal in whichever buffer is active
//! - `{` ends the current literal and starts a token
//! - `}` resolves the token: a built-in field, `http-<Name>` for a request
//!   header, or anything else is re-emitted as `{token}` text
//! - an unterminated `{` at end of input is kept as literal text
//! - every line ends with `\n`

use std::collections::BTreeSet;

use crate::capture::Capture;
use crate::format::emitters::{Emitter, Field};
use crate::http::RequestSnapshot;

const HEADER_TOKEN_PREFIX: &str = "http-";

/// Compiled, immutable log format. Safe to share between requests.
#[derive(Debug, Clone)]
pub struct CompiledFormat {
    emitters: Vec<Emitter>,
    headers: Vec<String>,
}

impl CompiledFormat {
    pub fn compile(template: &str) -> Self {
        let mut scanner = Scanner::default();
        for c in template.chars() {
            scanner.feed(c);
        }
        scanner.finish()
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    /// Request headers named by `http-` tokens. The supervisor snapshots
    /// these before the handler runs.
    pub fn header_names(&self) -> &[String] {
        &self.headers
    }

    pub fn render_into(&self, capture: &Capture, request: &RequestSnapshot, out: &mut Vec<u8>) {
        for emitter in &self.emitters {
            emitter.emit(capture, request, out);
        }
    }

    pub fn render(&self, capture: &Capture, request: &RequestSnapshot) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        self.render_into(capture, request, &mut out);
        out
    }
}

#[derive(Default)]
struct Scanner {
    emitters: Vec<Emitter>,
    headers: BTreeSet<String>,
    literal: String,
    token: String,
    in_token: bool,
    escaped: bool,
}

impl Scanner {
    fn feed(&mut self, c: char) {
        if self.escaped {
            self.escaped = false;
            self.active().push(c);
            return;
        }
        match c {
            '\\' => self.escaped = true,
            '{' => {
                if self.in_token {
                    // An earlier `{` was never closed; keep it as text.
                    self.literal.push('{');
                    let partial = std::mem::take(&mut self.token);
                    self.literal.push_str(&partial);
                }
                self.flush_literal();
                self.in_token = true;
            }
            '}' if self.in_token => {
                self.in_token = false;
                let token = std::mem::take(&mut self.token);
                self.resolve(token);
            }
            _ => self.active().push(c),
        }
    }

    fn active(&mut self) -> &mut String {
        if self.in_token {
            &mut self.token
        } else {
            &mut self.literal
        }
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            let text = std::mem::take(&mut self.literal);
            self.emitters.push(Emitter::Literal(text));
        }
    }

    fn resolve(&mut self, token: String) {
        if let Some(field) = Field::from_token(&token) {
            self.emitters.push(Emitter::Field(field));
        } else if let Some(name) = token.strip_prefix(HEADER_TOKEN_PREFIX) {
            self.headers.insert(name.to_string());
            self.emitters.push(Emitter::Header(name.to_string()));
        } else {
            // Unknown tokens are not errors, so templates written for newer
            // field sets still produce readable lines.
            self.literal.push('{');
            self.literal.push_str(&token);
            self.literal.push('}');
        }
    }

    fn finish(mut self) -> CompiledFormat {
        if self.in_token {
            self.literal.push('{');
            let partial = std::mem::take(&mut self.token);
            self.literal.push_str(&partial);
        }
        self.literal.push('\n');
        self.flush_literal();
        CompiledFormat {
            emitters: self.emitters,
            headers: self.headers.into_iter().collect(),
        }
    }
}
