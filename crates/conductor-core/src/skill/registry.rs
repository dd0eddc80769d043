//! Skill registry: name→handler lookup and the domain index consulted by
//! `get_skill` and the Context Assembler's system prompt, which lists
//! skill domains by name in sorted order.

use std::collections::BTreeMap;

/// One domain's entry in the top-level brief returned by `get_skill()` with
/// no argument.
#[derive(Debug, Clone)]
pub struct DomainIndex {
    pub domain: String,
    pub brief: String,
    /// `domain.action` names, sorted.
    pub skills: Vec<String>,
}

/// A single skill's documentation.
#[derive(Debug, Clone)]
pub struct SkillDoc {
    /// Full `domain.action` name.
    pub name: String,
    pub domain: String,
    /// Short description (used in domain briefs and progressive disclosure).
    pub description: String,
    /// Complete markdown body, injected into a sub-agent's system prompt
    /// when the skill is granted.
    pub markdown: String,
}

/// Name→handler lookup plus the domain index consulted by `get_skill` and
/// the Context Assembler.
pub trait SkillRegistry: Send + Sync {
    /// Every domain's brief index, for `get_skill()` with no argument.
    fn domains(&self) -> Vec<DomainIndex>;

    /// A single skill's full documentation, or a domain's full index when
    /// `name` names a domain rather than `domain.action`.
    fn get(&self, name: &str) -> Option<SkillDoc>;

    /// All skills under a domain (for `get_skill("domain.all")`).
    fn domain_all(&self, domain: &str) -> Vec<SkillDoc>;

    /// Markdown bodies for the given skill names, sorted alphabetically by
    /// name to stabilize the prompt-cache key.
    fn markdown_for(&self, names: &[String]) -> Vec<(String, String)> {
        let mut sorted: Vec<&String> = names.iter().collect();
        sorted.sort();
        sorted
            .into_iter()
            .filter_map(|n| self.get(n).map(|doc| (doc.name, doc.markdown)))
            .collect()
    }
}

/// A simple in-memory registry, e.g. loaded from a directory of `SKILL.md`
/// files at process start. Sufficient for the harness binary; production
/// deployments would back this with the real skill store.
#[derive(Debug, Default)]
pub struct StaticSkillRegistry {
    skills: BTreeMap<String, SkillDoc>,
}

impl StaticSkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc: SkillDoc) {
        self.skills.insert(doc.name.clone(), doc);
    }
}

impl SkillRegistry for StaticSkillRegistry {
    fn domains(&self) -> Vec<DomainIndex> {
        let mut by_domain: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for doc in self.skills.values() {
            by_domain.entry(doc.domain.clone()).or_default().push(doc.name.clone());
        }
        by_domain
            .into_iter()
            .map(|(domain, mut skills)| {
                skills.sort();
                let brief = skills.len().to_string() + " skill(s)";
                DomainIndex { domain, brief, skills }
            })
            .collect()
    }

    fn get(&self, name: &str) -> Option<SkillDoc> {
        self.skills.get(name).cloned()
    }

    fn domain_all(&self, domain: &str) -> Vec<SkillDoc> {
        let mut out: Vec<SkillDoc> =
            self.skills.values().filter(|d| d.domain == domain).cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> StaticSkillRegistry {
        let mut r = StaticSkillRegistry::new();
        r.insert(SkillDoc {
            name: "calendar.list".to_string(),
            domain: "calendar".to_string(),
            description: "List events".to_string(),
            markdown: "# calendar.list\nLists events.".to_string(),
        });
        r.insert(SkillDoc {
            name: "calendar.create".to_string(),
            domain: "calendar".to_string(),
            description: "Create event".to_string(),
            markdown: "# calendar.create\nCreates an event.".to_string(),
        });
        r.insert(SkillDoc {
            name: "email.send".to_string(),
            domain: "email".to_string(),
            description: "Send email".to_string(),
            markdown: "# email.send\nSends an email.".to_string(),
        });
        r
    }

    #[test]
    fn domains_are_sorted_and_grouped() {
        let r = sample_registry();
        let domains = r.domains();
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].domain, "calendar");
        assert_eq!(domains[0].skills, vec!["calendar.create", "calendar.list"]);
    }

    #[test]
    fn markdown_for_is_sorted_by_name() {
        let r = sample_registry();
        let names = vec!["email.send".to_string(), "calendar.list".to_string()];
        let md = r.markdown_for(&names);
        assert_eq!(md[0].0, "calendar.list");
        assert_eq!(md[1].0, "email.send");
    }

    #[test]
    fn domain_all_returns_only_that_domain() {
        let r = sample_registry();
        let all = r.domain_all("calendar");
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|d| d.domain == "calendar"));
    }
}
