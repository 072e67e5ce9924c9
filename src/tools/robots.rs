//! Minimal robots.txt evaluation: user-agent groups, Allow/Disallow prefixes
//! with `*` and `$`, and Crawl-delay.

#[derive(Clone, Debug, Default, PartialEq)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
struct Rule {
    allow: bool,
    pattern: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RobotsTxt {
    groups: Vec<Group>,
}

impl RobotsTxt {
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        // consecutive User-agent lines share one group
        let mut collecting_agents = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match field.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    if !collecting_agents && !current.agents.is_empty() {
                        groups.push(std::mem::take(&mut current));
                    }
                    current.agents.push(value.to_ascii_lowercase());
                    collecting_agents = true;
                }
                "allow" | "disallow" if !current.agents.is_empty() => {
                    collecting_agents = false;
                    let allow = field.trim().eq_ignore_ascii_case("allow");
                    // an empty Disallow allows everything
                    if !value.is_empty() {
                        current.rules.push(Rule {
                            allow,
                            pattern: value.to_string(),
                        });
                    }
                }
                "crawl-delay" if !current.agents.is_empty() => {
                    collecting_agents = false;
                    current.crawl_delay = value.parse().ok();
                }
                _ => {}
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }
        Self { groups }
    }

    /// Group for `user_agent`: the longest agent token contained in its
    /// product name, else `*`.
    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let product = user_agent
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.groups
            .iter()
            .flat_map(|group| group.agents.iter().map(move |agent| (agent, group)))
            .filter(|(agent, _)| agent.as_str() != "*" && product.contains(agent.as_str()))
            .max_by_key(|(agent, _)| agent.len())
            .map(|(_, group)| group)
            .or_else(|| {
                self.groups
                    .iter()
                    .find(|group| group.agents.iter().any(|agent| agent == "*"))
            })
    }

    /// Longest matching rule wins; Allow wins a tie.
    pub fn can_fetch(&self, user_agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };
        let path = if path.is_empty() { "/" } else { path };
        group
            .rules
            .iter()
            .filter(|rule| pattern_matches(&rule.pattern, path))
            .max_by_key(|rule| (rule.pattern.len(), rule.allow))
            .map_or(true, |rule| rule.allow)
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.group_for(user_agent).and_then(|group| group.crawl_delay)
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (pattern, false),
    };
    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or_default();
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };
    let pieces: Vec<&str> = pieces.collect();
    if pieces.is_empty() {
        return !anchored || rest.is_empty();
    }
    for (idx, piece) in pieces.iter().enumerate() {
        let last = idx == pieces.len() - 1;
        if last && anchored {
            return rest.ends_with(piece);
        }
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    true
}
