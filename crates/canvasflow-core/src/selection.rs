//! Selection tokens and the per-client selection set.

use crate::shapes::ShapeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Addresses a selectable shape.
///
/// Screen children are addressed through their screen so the same child id
/// can be resolved to world coordinates without a parent lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SelectionToken {
    /// A top-level shape.
    Shape(ShapeId),
    /// A child of a screen.
    Child { screen: ShapeId, child: ShapeId },
}

impl SelectionToken {
    pub fn shape(id: impl Into<ShapeId>) -> Self {
        SelectionToken::Shape(id.into())
    }

    pub fn child(screen: impl Into<ShapeId>, child: impl Into<ShapeId>) -> Self {
        SelectionToken::Child {
            screen: screen.into(),
            child: child.into(),
        }
    }

    /// Id of the shape the token points at.
    pub fn shape_id(&self) -> &str {
        match self {
            SelectionToken::Shape(id) => id,
            SelectionToken::Child { child, .. } => child,
        }
    }

    /// Owning screen, for child tokens.
    pub fn screen_id(&self) -> Option<&str> {
        match self {
            SelectionToken::Shape(_) => None,
            SelectionToken::Child { screen, .. } => Some(screen),
        }
    }

    /// Parse the canonical `id` or `screenId/childId` form.
    pub fn parse(s: &str) -> Self {
        match s.split_once('/') {
            Some((screen, child)) if !screen.is_empty() && !child.is_empty() => {
                SelectionToken::child(screen, child)
            }
            _ => SelectionToken::shape(s),
        }
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionToken::Shape(id) => write!(f, "{id}"),
            SelectionToken::Child { screen, child } => write!(f, "{screen}/{child}"),
        }
    }
}

impl From<SelectionToken> for String {
    fn from(token: SelectionToken) -> Self {
        token.to_string()
    }
}

impl From<String> for SelectionToken {
    fn from(s: String) -> Self {
        SelectionToken::parse(&s)
    }
}

/// Ordered set of selected tokens. Ephemeral and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    tokens: Vec<SelectionToken>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn contains(&self, token: &SelectionToken) -> bool {
        self.tokens.contains(token)
    }

    /// Whether any token points at the given shape id.
    pub fn contains_shape(&self, id: &str) -> bool {
        self.tokens.iter().any(|t| t.shape_id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectionToken> {
        self.tokens.iter()
    }

    pub fn tokens(&self) -> &[SelectionToken] {
        &self.tokens
    }

    /// Replace the selection with a single token.
    pub fn select_only(&mut self, token: SelectionToken) {
        self.tokens.clear();
        self.tokens.push(token);
    }

    /// Replace the selection with the given tokens.
    pub fn set(&mut self, tokens: impl IntoIterator<Item = SelectionToken>) {
        self.tokens.clear();
        for token in tokens {
            self.add(token);
        }
    }

    pub fn add(&mut self, token: SelectionToken) {
        if !self.contains(&token) {
            self.tokens.push(token);
        }
    }

    /// Toggle membership; returns true if the token is now selected.
    pub fn toggle(&mut self, token: SelectionToken) -> bool {
        if let Some(pos) = self.tokens.iter().position(|t| *t == token) {
            self.tokens.remove(pos);
            false
        } else {
            self.tokens.push(token);
            true
        }
    }

    pub fn remove(&mut self, token: &SelectionToken) {
        self.tokens.retain(|t| t != token);
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Drop tokens that no longer resolve.
    pub fn retain(&mut self, mut keep: impl FnMut(&SelectionToken) -> bool) {
        self.tokens.retain(|t| keep(t));
    }

    /// Canonical string forms for the UI shell.
    pub fn to_strings(&self) -> Vec<String> {
        self.tokens.iter().map(ToString::to_string).collect()
    }
}
