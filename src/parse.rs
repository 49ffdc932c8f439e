//! Parse tree for crypt(3) hash strings.
//!
//! A hash string parses into an optional prefix and a list of fragments.
//! Each fragment is either an opaque value or a group of comma-joined
//! values (`m=512,t=3,p=1`). A single `key=value` with no comma stays a
//! plain value; the engines coerce it to a singleton group on demand.

use crate::error::{Error, Result};
use crate::lex::{Kind, Lexer};

/// Hash prefix node, spanning the prefix text including its delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixNode {
    pub text: String,
    pub end: usize,
}

/// Opaque value between separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueNode {
    pub text: String,
    pub pos: usize,
    pub end: usize,
}

/// A single fragment of a hash string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Value(ValueNode),
    /// Comma-joined values; always holds at least one value.
    Group(Vec<ValueNode>),
}

impl Fragment {
    /// Label used in unmarshal error messages.
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Fragment::Value(_) => "value",
            Fragment::Group(_) => "group",
        }
    }

    /// Offset one past the fragment's last byte.
    pub(crate) fn end(&self) -> usize {
        match self {
            Fragment::Value(v) => v.end,
            Fragment::Group(values) => values.last().map_or(0, |v| v.end),
        }
    }
}

/// Parsed representation of a hash string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    pub prefix: Option<PrefixNode>,
    pub fragments: Vec<Fragment>,
}

/// Parses a hash string into its prefix and fragments.
pub fn parse(input: &str) -> Result<Tree> {
    let mut tree = Tree::default();
    let mut values: Vec<ValueNode> = Vec::new();
    let mut grouped = false;

    fn flush(fragments: &mut Vec<Fragment>, values: &mut Vec<ValueNode>, grouped: &mut bool) {
        if values.is_empty() {
            return;
        }
        let taken = std::mem::take(values);
        if *grouped {
            fragments.push(Fragment::Group(taken));
        } else {
            // flush is only called with at most one ungrouped value
            for v in taken {
                fragments.push(Fragment::Value(v));
            }
        }
        *grouped = false;
    }

    for token in Lexer::new(input) {
        match token.kind {
            Kind::Error => return Err(Error::syntax(token.pos, token.text)),
            Kind::Prefix => {
                tree.prefix = Some(PrefixNode {
                    text: token.text.to_string(),
                    end: token.end(),
                });
            }
            Kind::Value => values.push(ValueNode {
                text: token.text.to_string(),
                pos: token.pos,
                end: token.end(),
            }),
            Kind::Comma => grouped = true,
            Kind::Dollar | Kind::Eof => flush(&mut tree.fragments, &mut values, &mut grouped),
        }
    }
    Ok(tree)
}
