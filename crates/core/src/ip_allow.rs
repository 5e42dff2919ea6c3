//! Client IP allow-list.
//!
//! Entries are matched three ways: exact text, equal addresses after parsing
//! (so `::ffff:10.0.0.1` matches `10.0.0.1`), and wildcard patterns where `*`
//! stands for any run of characters across the whole address.

use std::net::IpAddr;

use regex::Regex;

#[derive(Debug, Clone)]
enum Entry {
    Exact { text: String, addr: Option<IpAddr> },
    Wildcard(Regex),
}

/// Compiled allow-list. An empty list, or one containing `*`, admits everyone.
#[derive(Debug, Clone)]
pub struct IpAllowList {
    allow_all: bool,
    entries: Vec<Entry>,
}

impl IpAllowList {
    /// Compile the configured patterns. Blank entries are ignored.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allow_all = false;
        let mut entries = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            if pattern == "*" {
                allow_all = true;
            } else if pattern.contains('*') {
                let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
                let re = Regex::new(&format!("^{}$", escaped.join(".*")))?;
                entries.push(Entry::Wildcard(re));
            } else {
                entries.push(Entry::Exact {
                    text: pattern.to_string(),
                    addr: parse_canonical(pattern),
                });
            }
        }

        let allow_all = allow_all || entries.is_empty();
        Ok(Self { allow_all, entries })
    }

    pub fn allows(&self, ip: &str) -> bool {
        if self.allow_all {
            return true;
        }
        let parsed = parse_canonical(ip);
        self.entries.iter().any(|entry| match entry {
            Entry::Exact { text, addr } => {
                text == ip || (addr.is_some() && parsed.is_some() && *addr == parsed)
            }
            Entry::Wildcard(re) => re.is_match(ip),
        })
    }
}

fn parse_canonical(ip: &str) -> Option<IpAddr> {
    ip.parse::<IpAddr>().ok().map(|a| a.to_canonical())
}
