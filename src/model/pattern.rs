//! Name matching for pointcuts and REST-style translet names.

/// Glob match over translet names.
///
/// `**` matches across `/`, `*` matches within one segment and `?` matches a
/// single non-separator character.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    glob(&pattern, &name)
}

fn glob(p: &[char], s: &[char]) -> bool {
    match p.first() {
        None => s.is_empty(),
        Some('*') if p.get(1) == Some(&'*') => {
            let rest = &p[2..];
            (0..=s.len()).any(|i| glob(rest, &s[i..]))
        }
        Some('*') => {
            let rest = &p[1..];
            let limit = s.iter().position(|&c| c == '/').unwrap_or(s.len());
            (0..=limit).any(|i| glob(rest, &s[i..]))
        }
        Some('?') => matches!(s.first(), Some(&c) if c != '/') && glob(&p[1..], &s[1..]),
        Some(c) => s.first() == Some(c) && glob(&p[1..], &s[1..]),
    }
}

/// Selects the translets an aspect applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pointcut {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl Pointcut {
    pub fn new<I, S>(includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            includes: includes.into_iter().map(Into::into).collect(),
            excludes: Vec::new(),
        }
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// An empty include list matches every name.
    pub fn matches(&self, translet_name: &str) -> bool {
        let included = self.includes.is_empty()
            || self.includes.iter().any(|p| wildcard_match(p, translet_name));
        included && !self.excludes.iter().any(|p| wildcard_match(p, translet_name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Glob(String),
    Parameter(String),
    Attribute(String),
}

/// Values captured from a REST-style name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVariables {
    pub parameters: Vec<(String, String)>,
    pub attributes: Vec<(String, String)>,
}

impl PathVariables {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.attributes.is_empty()
    }
}

/// A translet name such as `/users/${id}` or `/files/*`.
///
/// Segments written as `${name}` capture a request parameter, `@{name}`
/// captures a request attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Returns `None` when the name holds no variable or wildcard segment.
    pub fn parse(name: &str) -> Option<Self> {
        let segments: Vec<Segment> = name.split('/').map(parse_segment).collect();
        let dynamic = segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)));
        dynamic.then_some(Self { segments })
    }

    pub fn matches(&self, name: &str) -> Option<PathVariables> {
        let parts: Vec<&str> = name.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut vars = PathVariables::default();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Glob(p) if wildcard_match(p, part) => {}
                Segment::Parameter(n) if !part.is_empty() => {
                    vars.parameters.push((n.clone(), part.to_string()))
                }
                Segment::Attribute(n) if !part.is_empty() => {
                    vars.attributes.push((n.clone(), part.to_string()))
                }
                _ => return None,
            }
        }
        Some(vars)
    }
}

fn parse_segment(segment: &str) -> Segment {
    let enclosed = |prefix: &str| {
        segment
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix('}'))
            .map(str::to_string)
    };
    if let Some(name) = enclosed("${") {
        Segment::Parameter(name)
    } else if let Some(name) = enclosed("@{") {
        Segment::Attribute(name)
    } else if segment.contains('*') || segment.contains('?') {
        Segment::Glob(segment.to_string())
    } else {
        Segment::Literal(segment.to_string())
    }
}
