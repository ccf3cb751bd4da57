//! Generation of zonecfg command files.
//!
//! Every mutating operation except delete, export, import and template
//! creation is expressed as a short script that zonecfg executes with
//! `-f <file>` as one transaction against the zone's in-memory config.

use crate::resources;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resource properties keyed by name. Sorted so generated scripts are stable.
/// Keys and values are written verbatim, so they must not contain control
/// characters; [`CommandScript::check`] rejects scripts where they do.
pub type Properties = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("unknown method {0}")]
    UnknownMethod(String),
    #[error("resource selector {0} not found in parameters")]
    SelectorNotFound(String),
    #[error("control character in command {0:?}")]
    ControlCharacter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PropertyMethod {
    Set,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceMethod {
    Add,
    Update,
}

impl PropertyMethod {
    pub fn parse(name: &str) -> Result<Self, ScriptError> {
        Self::from_str(name).map_err(|_| ScriptError::UnknownMethod(name.to_string()))
    }
}

impl ResourceMethod {
    pub fn parse(name: &str) -> Result<Self, ScriptError> {
        Self::from_str(name).map_err(|_| ScriptError::UnknownMethod(name.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandScript {
    lines: Vec<String>,
}

impl CommandScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: Into<String>>(&mut self, line: S) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Fail if any command carries a control character. A newline smuggled in
    /// through a value would otherwise start a command of its own.
    pub fn check(&self) -> Result<(), ScriptError> {
        match self.lines.iter().find(|l| l.chars().any(char::is_control)) {
            Some(line) => Err(ScriptError::ControlCharacter(line.clone())),
            None => Ok(()),
        }
    }

    /// The script as file content, one command per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for CommandScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("; "))
    }
}

/// `create -b` followed by brand and zonepath.
pub fn create(brand: &str, zonepath: &str, force: bool) -> CommandScript {
    let mut script = CommandScript::new();
    script.push(if force { "create -b -F" } else { "create -b" });
    script.push(format!("set brand={}", brand));
    script.push(format!("set zonepath={}", zonepath));
    script
}

/// Set or clear a single top-level property. The value is ignored for clear.
pub fn property(method: PropertyMethod, key: &str, value: Option<&str>) -> CommandScript {
    let mut script = CommandScript::new();
    match method {
        PropertyMethod::Set => script.push(format!("set {}={}", key, value.unwrap_or_default())),
        PropertyMethod::Clear => script.push(format!("clear {}", key)),
    }
    script
}

/// Add a new resource, or select an existing one by `selector` and update it.
///
/// Keys listed as setters for the resource type become `set key=value`,
/// everything else becomes `add key value` (e.g. repeated `property` entries).
pub fn resource(
    method: ResourceMethod,
    resource_type: &str,
    selector: Option<&str>,
    properties: &Properties,
) -> Result<CommandScript, ScriptError> {
    let mut script = CommandScript::new();

    let selector = match method {
        ResourceMethod::Add => {
            script.push(format!("add {}", resource_type));
            None
        }
        ResourceMethod::Update => {
            let key = selector.unwrap_or_default();
            let value = properties
                .get(key)
                .ok_or_else(|| ScriptError::SelectorNotFound(key.to_string()))?;
            script.push(format!("select {} {}={}", resource_type, key, value));
            Some(key)
        }
    };

    for (key, value) in properties {
        if selector == Some(key.as_str()) {
            continue;
        }
        if resources::is_setter(resource_type, key) {
            script.push(format!("set {}={}", key, value));
        } else {
            script.push(format!("add {} {}", key, value));
        }
    }
    script.push("end");
    Ok(script)
}

pub fn remove_resource(resource_type: &str, key: &str, value: &str) -> CommandScript {
    let mut script = CommandScript::new();
    script.push(format!("remove {} {}={}", resource_type, key, value));
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_create_script() {
        let script = create("ipkg", "/zones/web", false);
        assert_eq!(
            script.lines(),
            ["create -b", "set brand=ipkg", "set zonepath=/zones/web"]
        );
        assert_eq!(script.render(), "create -b\nset brand=ipkg\nset zonepath=/zones/web\n");
    }

    #[test]
    fn test_create_forced() {
        let script = create("sparse", "/zones/db", true);
        assert_eq!(script.lines()[0], "create -b -F");
    }

    #[test]
    fn test_property_set_and_clear() {
        assert_eq!(
            property(PropertyMethod::Set, "cpu-shares", Some("100")).lines(),
            ["set cpu-shares=100"]
        );
        assert_eq!(
            property(PropertyMethod::Clear, "cpu-shares", Some("ignored")).lines(),
            ["clear cpu-shares"]
        );
    }

    #[test]
    fn test_method_names() {
        assert_eq!(PropertyMethod::parse("set"), Ok(PropertyMethod::Set));
        assert_eq!(ResourceMethod::parse("update"), Ok(ResourceMethod::Update));
        assert_matches!(
            PropertyMethod::parse("add"),
            Err(ScriptError::UnknownMethod(m)) if m == "add"
        );
        assert_matches!(ResourceMethod::parse("delete"), Err(ScriptError::UnknownMethod(_)));
        assert_eq!(
            PropertyMethod::parse("frobnicate").unwrap_err().to_string(),
            "unknown method frobnicate"
        );
    }

    #[test]
    fn test_add_resource_set_vs_add() {
        let properties = props(&[
            ("name", "zone.max-locked-memory"),
            ("value", "(priv=privileged,limit=33554432,action=deny)"),
        ]);
        let script = resource(ResourceMethod::Add, "rctl", None, &properties).unwrap();
        let lines = script.lines();
        assert_eq!(lines.first().map(String::as_str), Some("add rctl"));
        assert_eq!(lines.last().map(String::as_str), Some("end"));
        assert!(lines.contains(&"set name=zone.max-locked-memory".to_string()));
        assert!(lines.contains(
            &"set value=(priv=privileged,limit=33554432,action=deny)".to_string()
        ));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_every_key_appears_once_with_correct_verb() {
        let properties = props(&[
            ("physical", "e1000g0"),
            ("address", "192.168.1.10/24"),
            ("property", "(name=mtu,value=9000)"),
            ("vlan-id", "12"),
            ("custom", "x"),
        ]);
        let script = resource(ResourceMethod::Add, "net", None, &properties).unwrap();
        for (key, value) in &properties {
            let matching: Vec<&String> = script
                .lines()
                .iter()
                .filter(|l| {
                    l.starts_with(&format!("set {}=", key))
                        || l.starts_with(&format!("add {} ", key))
                })
                .collect();
            assert_eq!(matching.len(), 1, "key {} should appear once", key);
            let expected = if resources::is_setter("net", key) {
                format!("set {}={}", key, value)
            } else {
                format!("add {} {}", key, value)
            };
            assert_eq!(matching[0], &expected);
        }
    }

    #[test]
    fn test_unknown_resource_type_adds_everything() {
        let properties = props(&[("name", "a")]);
        let script = resource(ResourceMethod::Add, "widget", None, &properties).unwrap();
        assert_eq!(script.lines(), ["add widget", "add name a", "end"]);
    }

    #[test]
    fn test_update_selects_and_skips_selector() {
        let properties = props(&[("dir", "/data"), ("special", "tank/data"), ("type", "lofs")]);
        let script = resource(ResourceMethod::Update, "fs", Some("dir"), &properties).unwrap();
        assert_eq!(
            script.lines(),
            ["select fs dir=/data", "set special=tank/data", "set type=lofs", "end"]
        );
    }

    #[test]
    fn test_update_without_selector_fails() {
        let properties = props(&[("special", "tank/data")]);
        let err = resource(ResourceMethod::Update, "fs", Some("dir"), &properties).unwrap_err();
        assert_eq!(err, ScriptError::SelectorNotFound("dir".to_string()));
        assert_eq!(err.to_string(), "resource selector dir not found in parameters");
    }

    #[test]
    fn test_check_rejects_embedded_newline() {
        let script = property(PropertyMethod::Set, "comment", Some("x\nremove net physical=e0"));
        assert_matches!(
            script.check(),
            Err(ScriptError::ControlCharacter(l)) if l.starts_with("set comment=x")
        );

        let properties = props(&[("name", "comment"), ("value", "a\tb")]);
        let script = resource(ResourceMethod::Add, "attr", None, &properties).unwrap();
        assert_matches!(script.check(), Err(ScriptError::ControlCharacter(_)));

        assert_eq!(create("ipkg", "/zones/web", false).check(), Ok(()));
    }

    #[test]
    fn test_remove_resource() {
        assert_eq!(
            remove_resource("rctl", "name", "zone.max-locked-memory").lines(),
            ["remove rctl name=zone.max-locked-memory"]
        );
    }
}
