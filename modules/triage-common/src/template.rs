use anyhow::{bail, Result};
use std::collections::HashMap;

/// A piece of a parsed template.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Var(&'a str),
}

/// Split a template into literal text and `{{name}}` placeholders.
/// `\{{` is a literal `{{`.
fn parse(template: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        if open > 0 && rest.as_bytes()[open - 1] == b'\\' {
            segments.push(Segment::Text(&rest[..open - 1]));
            segments.push(Segment::Text("{{"));
            rest = &rest[open + 2..];
            continue;
        }

        if open > 0 {
            segments.push(Segment::Text(&rest[..open]));
        }
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            bail!("Unclosed template variable near: {{{{{}", after.chars().take(20).collect::<String>());
        };
        segments.push(Segment::Var(after[..close].trim()));
        rest = &after[close + 2..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}

/// Fill `{{var}}` placeholders from `vars`. Unknown names are left in place.
pub fn resolve_vars(template: &str, vars: &HashMap<&str, &str>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    for segment in parse(template)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Var(name) => match vars.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    out.push_str("{{");
                    out.push_str(name);
                    out.push_str("}}");
                }
            },
        }
    }
    Ok(out)
}

/// Every placeholder must be one of `allowed`.
pub fn validate_template(template: &str, allowed: &[&str]) -> Result<()> {
    for segment in parse(template)? {
        if let Segment::Var(name) = segment {
            if !allowed.contains(&name) {
                bail!("Unknown template variable: {{{{{name}}}}}. Allowed: {allowed:?}");
            }
        }
    }
    Ok(())
}
