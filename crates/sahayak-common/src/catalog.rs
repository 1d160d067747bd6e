use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder guideline text used when a program id is unknown. Evaluation
/// proceeds with this notice instead of failing.
pub const MISSING_GUIDELINE_NOTICE: &str =
    "No guideline text was found for this scheme. Treat eligibility as unverifiable.";

const CATALOG_MARKDOWN: &str = include_str!("../data/programs.md");

/// A government assistance scheme. Immutable once the catalog is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Stable identifier, e.g. "pm-kisan".
    pub id: String,
    /// Display name from the section heading.
    pub name: String,
    /// Program category, e.g. "Income Support".
    pub category: String,
    /// One-line benefit summary.
    pub benefit: String,
    /// Full eligibility guideline text used to ground evaluation.
    pub guideline_text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// The static program catalog, loaded once at process start. Program order
/// is the order of sections in the embedded catalog document and is the
/// order analysis results are returned in.
#[derive(Debug)]
pub struct Catalog {
    programs: Vec<Program>,
}

impl Catalog {
    pub fn load() -> Result<Self, CatalogError> {
        let programs = parse_catalog(CATALOG_MARKDOWN)?;
        Ok(Self { programs })
    }

    /// Programs in catalog order.
    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Program> {
        self.programs.iter().find(|p| p.id == id)
    }

    /// Guideline text for a program id. `None` if the id is unknown; callers
    /// that must not fail substitute [`MISSING_GUIDELINE_NOTICE`].
    pub fn guideline_text(&self, id: &str) -> Option<&str> {
        self.get(id).map(|p| p.guideline_text.as_str())
    }
}

fn parse_catalog(content: &str) -> Result<Vec<Program>, CatalogError> {
    // Anchors and headings follow the same convention as the source
    // document: <a id="..."></a> immediately before an H2 heading.
    let anchor_re = Regex::new(r#"^<a id="([a-z0-9-]+)"></a>$"#)
        .map_err(|e| CatalogError::Parse { line: 0, message: e.to_string() })?;

    let lines: Vec<&str> = content.lines().collect();
    let mut programs = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = anchor_re.captures(lines[i].trim()) else {
            i += 1;
            continue;
        };
        let id = caps[1].to_string();
        let anchor_line = i + 1;

        // The H2 heading must follow the anchor, allowing blank lines.
        let mut j = i + 1;
        while j < lines.len() && lines[j].trim().is_empty() {
            j += 1;
        }
        let name = lines
            .get(j)
            .and_then(|l| l.strip_prefix("## "))
            .map(|l| l.trim().to_string())
            .ok_or_else(|| CatalogError::Parse {
                line: anchor_line,
                message: format!("anchor '{id}' is not followed by an H2 heading"),
            })?;

        // Section body runs until the next anchor or end of document.
        let mut end = j + 1;
        while end < lines.len() && !anchor_re.is_match(lines[end].trim()) {
            end += 1;
        }

        let mut category = None;
        let mut benefit = None;
        let mut guideline_lines: Vec<&str> = Vec::new();
        for line in &lines[j + 1..end] {
            if let Some(value) = line.trim().strip_prefix("- Category:") {
                category = Some(value.trim().to_string());
            } else if let Some(value) = line.trim().strip_prefix("- Benefit:") {
                benefit = Some(value.trim().to_string());
            } else {
                guideline_lines.push(line);
            }
        }

        let category = category.ok_or_else(|| CatalogError::Parse {
            line: anchor_line,
            message: format!("program '{id}' is missing a '- Category:' field"),
        })?;
        let benefit = benefit.ok_or_else(|| CatalogError::Parse {
            line: anchor_line,
            message: format!("program '{id}' is missing a '- Benefit:' field"),
        })?;
        let guideline_text = guideline_lines.join("\n").trim().to_string();
        if guideline_text.is_empty() {
            return Err(CatalogError::Parse {
                line: anchor_line,
                message: format!("program '{id}' has no guideline text"),
            });
        }

        programs.push(Program {
            id,
            name,
            category,
            benefit,
            guideline_text,
        });
        i = end;
    }

    if programs.is_empty() {
        return Err(CatalogError::Parse {
            line: 0,
            message: "catalog document contains no program sections".to_string(),
        });
    }
    Ok(programs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_document() {
        let content = r#"# Catalog

<a id="scheme-a"></a>
## Scheme A

- Category: Credit
- Benefit: Cheap loans

Everyone with land qualifies.

<a id="scheme-b"></a>
## Scheme B

- Category: Insurance
- Benefit: Crop cover

Only notified crops qualify.
Tenant farmers included.
"#;
        let programs = parse_catalog(content).unwrap();
        assert_eq!(programs.len(), 2);
        assert_eq!(programs[0].id, "scheme-a");
        assert_eq!(programs[0].name, "Scheme A");
        assert_eq!(programs[0].category, "Credit");
        assert_eq!(programs[0].benefit, "Cheap loans");
        assert_eq!(programs[0].guideline_text, "Everyone with land qualifies.");
        assert!(programs[1].guideline_text.contains("Tenant farmers"));
    }

    #[test]
    fn missing_fields_are_parse_errors() {
        let content = r#"<a id="broken"></a>
## Broken Scheme

Some guideline text without fields.
"#;
        let err = parse_catalog(content).unwrap_err();
        assert!(err.to_string().contains("Category"), "got: {err}");
    }

    #[test]
    fn anchor_without_heading_is_a_parse_error() {
        let content = "<a id=\"dangling\"></a>\n\njust prose\n";
        let err = parse_catalog(content).unwrap_err();
        assert!(err.to_string().contains("H2 heading"), "got: {err}");
    }

    #[test]
    fn embedded_catalog_loads_in_order() {
        let catalog = Catalog::load().unwrap();
        assert_eq!(catalog.len(), 6);
        let ids: Vec<&str> = catalog.programs().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["pm-kisan", "pmfby", "kcc", "pm-kmy", "shc", "nmsa"]);
    }

    #[test]
    fn guideline_lookup_by_id() {
        let catalog = Catalog::load().unwrap();
        let text = catalog.guideline_text("pm-kisan").unwrap();
        assert!(text.contains("landholding farmer families"));
        assert!(catalog.guideline_text("no-such-scheme").is_none());
    }
}
