//! Segment trie holding the path allowlist.
//!
//! Built once at startup and never mutated afterwards, so the guard can share
//! it across request tasks without locking. Lookups walk the request path in
//! place: no splitting into owned strings, no regex, no allocation.
//!
//! Matching rules:
//! - default deny: empty, whitespace-only and bare `/` paths never match
//! - whole-segment comparison: `/admin` does not admit `/admin-dashboard`
//! - prefix semantics: once a configured prefix is fully matched, every
//!   descendant path is admitted (`/test` admits `/test/`, `/test/a/b`)
//! - a leading `//` yields an empty first segment, which never matches
//! - a path holding a `.` or `..` segment, plain or percent-encoded, never
//!   matches; the HTTP client would resolve it away and send a path that
//!   was never checked

#[derive(Debug)]
struct Node {
    segment: Box<str>,
    is_end: bool,
    // Fan-out per level is small; a linear scan beats hashing here.
    children: Vec<Node>,
}

impl Node {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.into(),
            is_end: false,
            children: Vec::new(),
        }
    }

    fn child(&self, segment: &str) -> Option<&Node> {
        self.children.iter().find(|child| {
            child.segment.len() == segment.len() && child.segment.as_bytes() == segment.as_bytes()
        })
    }
}

/// Prefix allowlist over `/`-separated path segments.
#[derive(Debug)]
pub struct AllowlistTrie {
    root: Node,
    prefixes: usize,
}

impl Default for AllowlistTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl AllowlistTrie {
    pub fn new() -> Self {
        Self {
            root: Node::new(""),
            prefixes: 0,
        }
    }

    /// Build a trie from an ordered list of prefixes.
    pub fn from_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Self::new();
        for prefix in prefixes {
            trie.insert(prefix.as_ref());
        }
        trie
    }

    /// Number of `insert` calls that produced at least one segment.
    pub fn len(&self) -> usize {
        self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes == 0
    }

    /// Add an allowlisted prefix. Empty segments (leading, trailing or
    /// doubled slashes) are skipped.
    ///
    /// Inserting `/` or an empty string marks the root, which `is_allowed`
    /// never consults, so such an entry admits nothing.
    pub fn insert(&mut self, path: &str) {
        let mut current = &mut self.root;
        let mut depth = 0;

        for part in path.split('/').filter(|part| !part.is_empty()) {
            let index = match current
                .children
                .iter()
                .position(|child| &*child.segment == part)
            {
                Some(index) => index,
                None => {
                    current.children.push(Node::new(part));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[index];
            depth += 1;
        }

        current.is_end = true;
        if depth > 0 {
            self.prefixes += 1;
        }
    }

    /// Whether `path` falls under any allowlisted prefix.
    ///
    /// `path` must not contain the query string; callers pass the URI path
    /// component only.
    pub fn is_allowed(&self, path: &str) -> bool {
        if path.trim().is_empty() {
            return false;
        }

        let rest = path.strip_prefix('/').unwrap_or(path);
        if rest.split('/').any(is_dot_segment) {
            return false;
        }

        let mut current = &self.root;

        for segment in rest.split('/') {
            match current.child(segment) {
                Some(next) if next.is_end => return true,
                Some(next) => current = next,
                None => return false,
            }
        }

        false
    }
}

/// `.` or `..`, with any dot possibly written as `%2e` / `%2E`.
fn is_dot_segment(segment: &str) -> bool {
    let mut rest = segment.as_bytes();
    let mut dots = 0;
    while !rest.is_empty() {
        rest = match rest {
            [b'.', tail @ ..] => tail,
            [b'%', b'2', b'e' | b'E', tail @ ..] => tail,
            _ => return false,
        };
        dots += 1;
    }
    matches!(dots, 1 | 2)
}
