use anyhow::{Context, Result};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};

const PLACEHOLDER_PATTERN: &str = r"\{(\w+)\}";

/// Placeholder names in `command`, unique, in order of first appearance.
pub fn extract_placeholders(command: &str) -> Result<Vec<String>> {
    let re = Regex::new(PLACEHOLDER_PATTERN).context("Failed to create placeholder regex")?;

    let mut seen = HashSet::new();
    Ok(re
        .captures_iter(command)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect())
}

/// Substitute known placeholders; unknown ones (or empty values) stay literal.
pub fn fill_template(command: &str, values: &HashMap<String, String>) -> Result<String> {
    let re = Regex::new(PLACEHOLDER_PATTERN).context("Failed to create placeholder regex")?;

    Ok(re
        .replace_all(command, |cap: &Captures| match values.get(&cap[1]) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => cap[0].to_string(),
        })
        .into_owned())
}

/// Parse a `name=value` pair given on the command line.
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing placeholder name in '{s}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Fill every placeholder in `command`, prompting for the ones not provided.
///
/// Without a terminal to prompt on, a missing value is an error.
pub fn resolve_command(
    command: &str,
    provided: &HashMap<String, String>,
    interactive: bool,
) -> Result<String> {
    let mut values = provided.clone();

    for name in extract_placeholders(command)? {
        if values.get(&name).is_some_and(|v| !v.is_empty()) {
            continue;
        }
        if !interactive {
            anyhow::bail!("no value for placeholder '{{{name}}}'; pass --var {name}=VALUE");
        }

        let value = dialoguer::Input::<String>::new()
            .with_prompt(&name)
            .interact_text()
            .with_context(|| format!("reading a value for '{name}'"))?;
        values.insert(name, value);
    }

    fill_template(command, &values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_placeholders() {
        assert_eq!(
            extract_placeholders("git push origin {branch}").unwrap(),
            vec!["branch"]
        );
        assert_eq!(
            extract_placeholders("docker build -t {image}:{tag} . # {image}").unwrap(),
            vec!["image", "tag"]
        );
        assert!(extract_placeholders("ls -la").unwrap().is_empty());
    }

    #[test]
    fn test_extract_ignores_non_word_braces() {
        assert!(
            extract_placeholders("awk '{print $1}' file")
                .unwrap()
                .is_empty()
        );
        assert!(extract_placeholders("echo ${HOME} {}").unwrap().contains(&"HOME".to_string()));
    }

    #[test]
    fn test_fill_template() {
        let values = vars(&[("branch", "main"), ("remote", "")]);
        assert_eq!(
            fill_template("git push {remote} {branch}", &values).unwrap(),
            "git push {remote} main"
        );
        assert_eq!(
            fill_template("echo {unknown}", &values).unwrap(),
            "echo {unknown}"
        );
    }

    #[test]
    fn test_fill_is_single_pass() {
        let values = vars(&[("a", "{b}"), ("b", "x")]);
        assert_eq!(fill_template("{a} {b}", &values).unwrap(), "{b} x");
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("tag=v1=final").unwrap(),
            ("tag".to_string(), "v1=final".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_resolve_without_terminal() {
        let values = vars(&[("image", "alpine")]);
        assert_eq!(
            resolve_command("docker run -it {image}", &values, false).unwrap(),
            "docker run -it alpine"
        );

        let err = resolve_command("docker build -t {tag} .", &values, false).unwrap_err();
        assert!(err.to_string().contains("no value for placeholder '{tag}'"));
    }
}
