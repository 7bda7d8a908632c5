use rustc_hash::FxHashSet;

/// Compiled hostname matcher built from Adblock-style blocklist text.
///
/// Supported line forms:
/// - `||example.org^` / `||example.org`: block the domain and its subdomains
/// - `@@||example.org^`: exception, exempts the domain subtree
/// - `0.0.0.0 example.org`: hosts-file style
/// - `example.org`: bare domain
///
/// Comments (`!`, `#`) and rules using wildcards, paths or `$` modifiers are
/// skipped; this crate treats the wider Adblock grammar as opaque.
#[derive(Debug, Default)]
pub struct HostMatcher {
    blocked: FxHashSet<Box<str>>,
    exceptions: FxHashSet<Box<str>>,
}

enum Rule<'a> {
    Block(&'a str),
    Except(&'a str),
}

impl HostMatcher {
    pub fn from_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Self {
        let mut matcher = HostMatcher::default();
        for line in lines {
            match Self::parse_line(line) {
                Some(Rule::Block(d)) => {
                    matcher.blocked.insert(d.to_lowercase().into_boxed_str());
                }
                Some(Rule::Except(d)) => {
                    matcher.exceptions.insert(d.to_lowercase().into_boxed_str());
                }
                None => {}
            }
        }
        matcher
    }

    fn parse_line(line: &str) -> Option<Rule<'_>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('!') || line.starts_with('#') {
            return None;
        }

        let (exception, rest) = match line.strip_prefix("@@") {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let rest = rest.strip_prefix("||").unwrap_or(rest);

        // `$`-modified rules target request properties a DNS filter never
        // sees; skip them wholesale.
        if rest.contains('$') {
            return None;
        }
        // Domain runs up to the separator anchor, if any.
        let domain = match rest.find('^') {
            Some(idx) => &rest[..idx],
            None => rest,
        };

        // Hosts-file form: "0.0.0.0 example.org".
        let domain = domain.split_whitespace().last().unwrap_or(domain);

        if domain.is_empty() || domain.contains(['*', '/', '|']) || !domain.contains('.') {
            return None;
        }

        if exception {
            Some(Rule::Except(domain))
        } else {
            Some(Rule::Block(domain))
        }
    }

    /// Membership test with iterative suffix walk: `a.b.example.org` matches
    /// a rule for `example.org`. Exceptions win over blocks.
    pub fn is_match(&self, hostname: &str) -> bool {
        let mut part = hostname;
        loop {
            if self.exceptions.contains(part) {
                return false;
            }
            if self.blocked.contains(part) {
                return true;
            }
            match part.find('.') {
                Some(idx) => {
                    part = &part[idx + 1..];
                    if part.is_empty() {
                        break;
                    }
                }
                None => break,
            }
        }
        false
    }

    /// Number of blocking rules.
    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(text: &str) -> HostMatcher {
        HostMatcher::from_lines(text.lines())
    }

    #[test]
    fn test_anchor_rules() {
        let m = matcher("||example.org^\n||ads.net\n");

        assert!(m.is_match("example.org"));
        assert!(m.is_match("sub.example.org"));
        assert!(m.is_match("a.b.example.org"));
        assert!(m.is_match("ads.net"));

        assert!(!m.is_match("other.org"));
        assert!(!m.is_match("notexample.org"));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let m = matcher("! title\n# note\n\n||example.org^\n");
        assert_eq!(m.len(), 1);
        assert!(m.is_match("example.org"));
    }

    #[test]
    fn test_exception_wins() {
        let m = matcher("||example.org^\n@@||good.example.org^\n");
        assert!(m.is_match("example.org"));
        assert!(m.is_match("bad.example.org"));
        assert!(!m.is_match("good.example.org"));
        assert!(!m.is_match("cdn.good.example.org"));
    }

    #[test]
    fn test_hosts_and_bare_forms() {
        let m = matcher("0.0.0.0 tracker.example\nplain.example\n");
        assert!(m.is_match("tracker.example"));
        assert!(m.is_match("plain.example"));
    }

    #[test]
    fn test_unsupported_patterns_skipped() {
        let m = matcher("||ads.example/banner\n||*.wild.example^\n||tracked.example^$third-party\nlocalhost\n");
        assert!(!m.is_match("ads.example"));
        assert!(!m.is_match("wild.example"));
        assert!(!m.is_match("tracked.example"));
        assert!(!m.is_match("localhost"));
    }

    #[test]
    fn test_case_insensitive() {
        let m = matcher("||Example.ORG^\n");
        assert!(m.is_match("example.org"));
    }
}
