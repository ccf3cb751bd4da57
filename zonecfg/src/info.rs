//! Parser for the report printed by `zonecfg -z <zone> info`.
//!
//! The report is line oriented. Top-level properties start in column zero,
//! resource blocks start with a bare header line (`net:`) followed by
//! tab-indented properties. Values zonecfg derives itself are wrapped in
//! brackets, e.g. `[cpu-shares: 1]`, and are only kept when asked for.
//!
//! ```text
//! zonename: web
//! zonepath: /zones/web
//! autoboot: true
//! net:
//!         address: 192.168.1.10/24
//!         physical: e1000g0
//! rctl:
//!         name: zone.cpu-shares
//!         value: (priv=privileged,limit=100,action=none)
//! ```

use crate::resources;
use crate::value::{parse_value, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::mem;
use tracing::{debug, warn};

/// One instance of a resource block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceRecord {
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
    /// Repeated `property: (name=..,value=..)` lines keyed by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub property: BTreeMap<String, Value>,
}

impl ResourceRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Structured form of a zone configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedConfig {
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub property: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub resources: BTreeMap<String, Vec<ResourceRecord>>,
}

impl ParsedConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// All instances of a resource type, empty when there are none.
    pub fn resource(&self, resource_type: &str) -> &[ResourceRecord] {
        self.resources
            .get(resource_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.property.is_empty() && self.resources.is_empty()
    }
}

/// Where the parser currently is.
#[derive(Debug)]
enum Block {
    TopLevel,
    Resource {
        kind: String,
        record: ResourceRecord,
    },
    /// Children of a calculated resource that was not asked for.
    SkippedCalculated,
}

struct InfoParser {
    show_all: bool,
    block: Block,
    config: ParsedConfig,
}

impl InfoParser {
    fn new(show_all: bool) -> Self {
        Self {
            show_all,
            block: Block::TopLevel,
            config: ParsedConfig::default(),
        }
    }

    /// Close the open resource instance, if any, and return to top level.
    fn flush(&mut self) {
        if let Block::Resource { kind, record } = mem::replace(&mut self.block, Block::TopLevel) {
            self.config.resources.entry(kind).or_default().push(record);
        }
    }

    fn open_resource(&mut self, kind: &str) {
        self.flush();
        self.config.resources.entry(kind.to_string()).or_default();
        self.block = Block::Resource {
            kind: kind.to_string(),
            record: ResourceRecord::default(),
        };
    }

    fn feed(&mut self, line: &str) {
        if !line.contains(':') {
            return;
        }

        let indented = line.starts_with('\t');
        let trimmed = line.trim();
        let (calculated, text) = match unbracket(trimmed) {
            Some(inner) => (true, inner),
            // a bracketed line that lost its closing bracket
            None if trimmed.starts_with('[') => (true, &trimmed[1..]),
            None => (false, trimmed),
        };

        let Some((key, raw)) = text.split_once(':') else {
            return;
        };
        let key = key.trim();

        if calculated && !self.show_all {
            if !indented {
                self.flush();
                if resources::is_calculated_resource(key) || resources::is_info_resource(key) {
                    self.block = Block::SkippedCalculated;
                }
            }
            return;
        }

        if resources::is_calculated_resource(key) && !indented {
            if self.show_all {
                self.open_resource(key);
            } else {
                self.flush();
                self.block = Block::SkippedCalculated;
            }
            return;
        }

        if resources::is_info_resource(key) && !indented {
            self.open_resource(key);
            return;
        }

        if indented {
            match &mut self.block {
                Block::Resource { record, .. } => {
                    store(&mut record.properties, &mut record.property, key, raw);
                }
                Block::SkippedCalculated => {}
                Block::TopLevel => {
                    debug!(target: "zonecfg", "indented line outside of a resource: {}", line);
                }
            }
            return;
        }

        self.flush();
        store(
            &mut self.config.properties,
            &mut self.config.property,
            key,
            raw,
        );
    }

    fn finish(mut self) -> ParsedConfig {
        self.flush();
        self.config
    }
}

fn unbracket(text: &str) -> Option<&str> {
    text.strip_prefix('[')?.strip_suffix(']')
}

fn store(
    properties: &mut BTreeMap<String, Value>,
    property: &mut BTreeMap<String, Value>,
    key: &str,
    raw: &str,
) {
    let value = parse_value(raw);
    if key != "property" {
        properties.insert(key.to_string(), value);
        return;
    }

    match (value.get("name"), value.get("value")) {
        (Some(name), Some(val)) => {
            property.insert(name.to_string(), val.clone());
        }
        _ => warn!(target: "zonecfg", "not sure how to deal with property: {}", value),
    }
}

/// Parse an info report. Calculated values and resources are included only
/// when `show_all` is set.
pub fn parse_info(report: &str, show_all: bool) -> ParsedConfig {
    let mut parser = InfoParser::new(show_all);
    for line in report.lines() {
        parser.feed(line);
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "zonename: web
zonepath: /zones/web
brand: ipkg
autoboot: true
bootargs:
pool:
limitpriv: default,dtrace_proc
scheduling-class:
ip-type: exclusive
hostid:
fs-allowed:
[cpu-shares: 100]
fs:
\tdir: /data
\tspecial: tank/data
\traw not specified
\ttype: lofs
\toptions: [ro,nodevices]
net:
\taddress not specified
\tallowed-address not specified
\tphysical: web0
\tdefrouter not specified
\tproperty: (name=mtu,value=\"9000\")
net:
\tphysical: web1
rctl:
\tname: zone.cpu-shares
\tvalue: (priv=privileged,limit=100,action=none)
capped-memory:
\tphysical: 1G
\t[swap: 2G]
[max-lwps: 2000]
dataset:
\tname: tank/web
";

    fn map(pairs: &[(&str, Value)]) -> Value {
        Value::Map(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn test_top_level_scalars() {
        let cfg = parse_info(REPORT, false);
        assert_eq!(cfg.get("zonename"), Some(&Value::from("web")));
        assert_eq!(cfg.get("autoboot"), Some(&Value::Boolean(true)));
        assert_eq!(cfg.get("bootargs"), Some(&Value::from("")));
        assert_eq!(cfg.get("limitpriv"), Some(&Value::from("default,dtrace_proc")));
    }

    #[test]
    fn test_resource_blocks() {
        let cfg = parse_info(REPORT, false);
        let fs = cfg.resource("fs");
        assert_eq!(fs.len(), 1);
        assert_eq!(fs[0].get("dir"), Some(&Value::from("/data")));
        assert_eq!(
            fs[0].get("options"),
            Some(&Value::List(vec!["ro".into(), "nodevices".into()]))
        );
        assert_eq!(fs[0].get("raw"), None);

        let net = cfg.resource("net");
        assert_eq!(net.len(), 2);
        assert_eq!(net[0].get("physical"), Some(&Value::from("web0")));
        assert_eq!(net[0].property.get("mtu"), Some(&Value::Integer(9000)));
        assert_eq!(net[1].get("physical"), Some(&Value::from("web1")));
        assert!(net[1].property.is_empty());

        assert_eq!(cfg.resource("dataset")[0].get("name"), Some(&Value::from("tank/web")));
    }

    #[test]
    fn test_rctl_block() {
        let report =
            "rctl:\n\tname: \"zone.cpu-shares\"\n\tvalue: (priv=privileged,limit=100,action=none)";
        let cfg = parse_info(report, false);
        let rctl = cfg.resource("rctl");
        assert_eq!(rctl.len(), 1);
        assert_eq!(rctl[0].get("name"), Some(&Value::from("zone.cpu-shares")));
        assert_eq!(
            rctl[0].get("value"),
            Some(&map(&[
                ("priv", Value::from("privileged")),
                ("limit", Value::Integer(100)),
                ("action", Value::from("none")),
            ]))
        );
    }

    #[test]
    fn test_calculated_hidden_by_default() {
        let cfg = parse_info(REPORT, false);
        assert_eq!(cfg.get("cpu-shares"), None);
        assert_eq!(cfg.get("max-lwps"), None);
        assert!(!cfg.resources.contains_key("capped-memory"));
        // the capped-memory children must not leak anywhere
        assert_eq!(cfg.get("physical"), None);
        assert_eq!(cfg.get("swap"), None);
    }

    #[test]
    fn test_calculated_shown_when_requested() {
        let cfg = parse_info(REPORT, true);
        assert_eq!(cfg.get("cpu-shares"), Some(&Value::Integer(100)));
        assert_eq!(cfg.get("max-lwps"), Some(&Value::Integer(2000)));
        let capped = cfg.resource("capped-memory");
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].get("physical"), Some(&Value::from("1G")));
        assert_eq!(capped[0].get("swap"), Some(&Value::from("2G")));
    }

    #[test]
    fn test_indented_calculated_line_inside_resource() {
        let report = "net:\n\tphysical: net0\n\t[swap: 2G]\n\tdefrouter: 10.0.0.1\n";

        let net = &parse_info(report, false).resources["net"][0];
        assert_eq!(net.get("swap"), None);
        // the resource stays open past the hidden line
        assert_eq!(net.get("defrouter"), Some(&Value::from("10.0.0.1")));
        assert_eq!(net.get("physical"), Some(&Value::from("net0")));

        let net = &parse_info(report, true).resources["net"][0];
        assert_eq!(net.get("swap"), Some(&Value::from("2G")));
    }

    #[test]
    fn test_calculated_blocks_accumulate() {
        let report = "[capped-cpu:]\n\t[ncpus: 1.50]\nzonename: a\n[capped-cpu:]\n\t[ncpus: 2]\n";
        let cfg = parse_info(report, true);
        let capped = cfg.resource("capped-cpu");
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].get("ncpus"), Some(&Value::from("1.50")));
        assert_eq!(capped[1].get("ncpus"), Some(&Value::Integer(2)));

        let hidden = parse_info(report, false);
        assert!(hidden.resources.is_empty());
        assert_eq!(hidden.get("zonename"), Some(&Value::from("a")));
    }

    #[test]
    fn test_hidden_calculated_header_closes_open_resource() {
        let report = "net:\n\tphysical: e0\n[capped-cpu:]\n\tncpus: 2\nzonename: a\n";
        let cfg = parse_info(report, false);
        let net = cfg.resource("net");
        assert_eq!(net.len(), 1);
        assert_eq!(net[0].get("ncpus"), None);
        assert_eq!(cfg.get("ncpus"), None);
        assert_eq!(cfg.get("zonename"), Some(&Value::from("a")));
    }

    #[test]
    fn test_top_level_property_accumulates() {
        let report = "zonename: a\nproperty: (name=foo,value=bar)\nproperty: (name=n,value=1)\n";
        let cfg = parse_info(report, false);
        assert_eq!(cfg.property.get("foo"), Some(&Value::from("bar")));
        assert_eq!(cfg.property.get("n"), Some(&Value::Integer(1)));
        assert_eq!(cfg.get("property"), None);
    }

    #[test]
    fn test_malformed_property_is_dropped() {
        let report = "net:\n\tproperty: (name=mtu)\n\tphysical: e0\n";
        let cfg = parse_info(report, false);
        let net = cfg.resource("net");
        assert_eq!(net.len(), 1);
        assert!(net[0].property.is_empty());
        assert_eq!(net[0].get("physical"), Some(&Value::from("e0")));
    }

    #[test]
    fn test_top_level_line_closes_resource() {
        let report = "net:\n\tphysical: e0\nautoboot: false\n\tstray: 1\n";
        let cfg = parse_info(report, false);
        assert_eq!(cfg.resource("net").len(), 1);
        assert_eq!(cfg.get("autoboot"), Some(&Value::Boolean(false)));
        assert_eq!(cfg.get("stray"), None);
        assert!(cfg.resource("net")[0].get("stray").is_none());
    }

    #[test]
    fn test_empty_resource_block_is_kept() {
        let cfg = parse_info("dedicated-cpu:\n", false);
        assert_eq!(cfg.resource("dedicated-cpu"), [ResourceRecord::default()]);
    }

    #[test]
    fn test_empty_report() {
        assert!(parse_info("", true).is_empty());
    }

    #[test]
    fn test_serializes_as_single_mapping() {
        let report = concat!(
            "zonename: a\nrctl:\n\tname: zone.max-lwps\n",
            "\tvalue: (priv=privileged,limit=500,action=deny)\n"
        );
        let json = serde_json::to_value(parse_info(report, false)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "zonename": "a",
                "rctl": [{
                    "name": "zone.max-lwps",
                    "value": {"priv": "privileged", "limit": 500, "action": "deny"}
                }]
            })
        );
    }
}
