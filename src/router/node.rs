//! Trie nodes — one per registered path segment.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use super::{Handler, RouteError};
use crate::middleware::MiddlewareHandler;

/// How a node matches one request path segment.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Literal text, e.g. `users`.
    Static(String),
    /// `:name` — matches any single segment and captures it.
    Param(String),
    /// `:name(expr)` — captures the segment only if `expr` matches it.
    Regex { name: String, pattern: Regex },
    /// `*` — one segment mid-path, every remaining segment at the end of a route.
    Wildcard,
}

impl Segment {
    /// Classify one segment of a registered path.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when the expression of a `:name(expr)` segment does
    /// not compile.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        if raw == "*" {
            return Ok(Self::Wildcard);
        }

        let Some(rest) = raw.strip_prefix(':') else {
            return Ok(Self::Static(raw.to_owned()));
        };

        let regex_parts = rest
            .split_once('(')
            .and_then(|(name, expr)| Some((name, expr.strip_suffix(')')?)));

        if let Some((name, expr)) = regex_parts {
            let pattern = Regex::new(expr).map_err(|source| RouteError::InvalidPattern {
                pattern: raw.to_owned(),
                source,
            })?;
            return Ok(Self::Regex {
                name: name.to_owned(),
                pattern,
            });
        }

        Ok(Self::Param(rest.to_owned()))
    }

    /// Whether `raw` would be stored in a node's single dynamic slot.
    fn is_dynamic(raw: &str) -> bool {
        raw == "*" || raw.starts_with(':')
    }

    /// The name a captured value is stored under, for param and regex segments.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Param(name) | Self::Regex { name, .. } => Some(name),
            Self::Static(_) | Self::Wildcard => None,
        }
    }

    /// Whether a node of this kind accepts the request segment `seg`.
    ///
    /// Regex patterns are searched, not anchored: `[0-9]+` accepts `a1`. Anchor the
    /// expression (`^[0-9]+$`) to require a full match.
    pub fn admits(&self, seg: &str) -> bool {
        match self {
            Self::Static(literal) => literal == seg,
            Self::Param(_) | Self::Wildcard => true,
            Self::Regex { pattern, .. } => pattern.is_match(seg),
        }
    }
}

/// One node of a per-method routing trie.
///
/// A node has any number of static children and at most one dynamic child. The dynamic
/// child's own [`Segment`] says whether it is a param, regex or wildcard node, so a
/// parent can never hold two dynamic kinds at once.
pub struct Node {
    pattern: String,
    segment: Segment,
    children: HashMap<String, Node>,
    dynamic_child: Option<Box<Node>>,
    handler: Option<Handler>,
    middleware: Vec<MiddlewareHandler>,
    route: Option<String>,
}

impl Node {
    fn new(pattern: &str, segment: Segment) -> Self {
        Self {
            pattern: pattern.to_owned(),
            segment,
            children: HashMap::new(),
            dynamic_child: None,
            handler: None,
            middleware: Vec::new(),
            route: None,
        }
    }

    pub(crate) fn root() -> Self {
        Self::new("/", Segment::Static("/".to_owned()))
    }

    /// The segment text this node was registered with, e.g. `:id([0-9]+)`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    pub fn middleware(&self) -> &[MiddlewareHandler] {
        &self.middleware
    }

    /// The full registered path of the route bound here, e.g. `/users/:id`.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.handler.is_some()
    }

    pub(crate) fn bind(&mut self, route: &str, handler: Handler) {
        self.handler = Some(handler);
        self.route = Some(route.to_owned());
    }

    pub(crate) fn attach(&mut self, middleware: Vec<MiddlewareHandler>) {
        self.middleware.extend(middleware);
    }

    /// Return the child for the registered segment `raw`, creating it if needed.
    ///
    /// # Errors
    ///
    /// - [`RouteError::ConflictingDynamicChild`] when `raw` is dynamic and this node
    ///   already has a dynamic child registered with different text.
    /// - [`RouteError::InvalidPattern`] when a new regex segment does not compile.
    pub(crate) fn child_or_create(&mut self, raw: &str) -> Result<&mut Node, RouteError> {
        if !Segment::is_dynamic(raw) {
            return Ok(self
                .children
                .entry(raw.to_owned())
                .or_insert_with(|| Node::new(raw, Segment::Static(raw.to_owned()))));
        }

        let child = match self.dynamic_child.take() {
            Some(existing) if existing.pattern != raw => {
                let err = RouteError::ConflictingDynamicChild {
                    existing: existing.pattern.clone(),
                    attempted: raw.to_owned(),
                };
                self.dynamic_child = Some(existing);
                return Err(err);
            }
            Some(existing) => existing,
            None => Box::new(Node::new(raw, Segment::parse(raw)?)),
        };

        Ok(&mut **self.dynamic_child.insert(child))
    }

    /// Matcher step: the child that accepts request segment `seg`.
    ///
    /// An exact static child wins; otherwise the dynamic child is tried (a regex child
    /// only if its pattern matches).
    pub(crate) fn child_of(&self, seg: &str) -> Option<&Node> {
        if let Some(child) = self.children.get(seg) {
            return Some(child);
        }
        let child = self.dynamic_child.as_deref()?;
        child.segment.admits(seg).then_some(child)
    }

    /// Every child, dynamic first, for the breadth-first middleware walk.
    ///
    /// Static children come out in `HashMap` order. The walk stays deterministic only
    /// because static keys are distinct literals and a static node admits nothing but
    /// its own literal, so at most one static sibling passes any segment. Loosening
    /// static admission requires an ordered map here.
    pub(crate) fn successors(&self) -> impl Iterator<Item = &Node> {
        self.dynamic_child
            .as_deref()
            .into_iter()
            .chain(self.children.values())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("pattern", &self.pattern)
            .field("segment", &self.segment)
            .field("children", &self.children)
            .field("dynamic_child", &self.dynamic_child)
            .field("bound", &self.handler.is_some())
            .field("middleware", &self.middleware.len())
            .field("route", &self.route)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_classifies_segments() {
        assert!(matches!(Segment::parse("users").unwrap(), Segment::Static(s) if s == "users"));
        assert!(matches!(Segment::parse("*").unwrap(), Segment::Wildcard));
        assert!(matches!(Segment::parse(":id").unwrap(), Segment::Param(s) if s == "id"));
        match Segment::parse(":id([0-9]+)").unwrap() {
            Segment::Regex { name, pattern } => {
                assert_eq!(name, "id");
                assert_eq!(pattern.as_str(), "[0-9]+");
            }
            other => panic!("expected Regex, got {other:?}"),
        }
    }

    #[test]
    fn parse_regex_keeps_inner_parens() {
        match Segment::parse(":slug((a|b)+)").unwrap() {
            Segment::Regex { name, pattern } => {
                assert_eq!(name, "slug");
                assert_eq!(pattern.as_str(), "(a|b)+");
            }
            other => panic!("expected Regex, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_bad_regex() {
        assert!(matches!(
            Segment::parse(":id([0-9)"),
            Err(RouteError::InvalidPattern { pattern, .. }) if pattern == ":id([0-9)"
        ));
    }

    #[test]
    fn admits_per_kind() {
        assert!(Segment::parse("a").unwrap().admits("a"));
        assert!(!Segment::parse("a").unwrap().admits("b"));
        assert!(Segment::parse(":x").unwrap().admits("anything"));
        assert!(Segment::parse("*").unwrap().admits("anything"));
        assert!(Segment::parse(":x([0-9]+)").unwrap().admits("42"));
        assert!(!Segment::parse(":x([0-9]+)").unwrap().admits("abc"));
    }

    #[test]
    fn child_or_create_reuses_existing_children() {
        let mut root = Node::root();
        root.child_or_create("user").unwrap().attach(Vec::new());
        root.child_or_create(":id").unwrap();
        root.child_or_create(":id").unwrap();
        root.child_or_create("user").unwrap();

        assert_eq!(root.children.len(), 1);
        assert_eq!(root.dynamic_child.as_ref().unwrap().pattern(), ":id");
    }

    #[test]
    fn child_or_create_rejects_second_dynamic_kind() {
        let mut root = Node::root();
        root.child_or_create("*").unwrap();

        let err = root.child_or_create(":id").unwrap_err();
        assert!(matches!(
            err,
            RouteError::ConflictingDynamicChild { ref existing, ref attempted }
                if existing == "*" && attempted == ":id"
        ));
        // The existing child survives the failed attempt.
        assert_eq!(root.dynamic_child.as_ref().unwrap().pattern(), "*");
    }

    #[test]
    fn child_or_create_rejects_renamed_param() {
        let mut root = Node::root();
        root.child_or_create(":id").unwrap();
        assert!(matches!(
            root.child_or_create(":name"),
            Err(RouteError::ConflictingDynamicChild { .. })
        ));
    }

    #[test]
    fn child_of_prefers_static_then_dynamic() {
        let mut root = Node::root();
        root.child_or_create("create").unwrap();
        root.child_or_create("*").unwrap();

        assert_eq!(root.child_of("create").unwrap().pattern(), "create");
        assert_eq!(root.child_of("delete").unwrap().pattern(), "*");
    }

    #[test]
    fn child_of_checks_regex() {
        let mut root = Node::root();
        root.child_or_create(":id([0-9]+)").unwrap();

        assert!(root.child_of("123").is_some());
        assert!(root.child_of("abc").is_none());
    }

    #[test]
    fn successors_yield_dynamic_first() {
        let mut root = Node::root();
        root.child_or_create("a").unwrap();
        root.child_or_create(":p").unwrap();
        root.child_or_create("b").unwrap();

        let patterns: Vec<&str> = root.successors().map(Node::pattern).collect();
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns[0], ":p");
    }
}
