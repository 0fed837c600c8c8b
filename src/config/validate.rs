//! Walks a parsed [`ConfigEntry`] tree and produces a validated
//! `Vec<ServerConfig>`, collecting every semantic error rather than
//! stopping at the first (per `spec.md` §9).

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};

use super::diagnostic::ConfigError;
use super::entry::ConfigEntry;
use super::token::{Token, TokenKind};
use crate::http::Method;

const SERVER_ENTRIES: &[&str] = &[
    "listen",
    "server_name",
    "error_page",
    "client_max_body_size",
    "location",
];

const LOCATION_ENTRIES: &[&str] = &[
    "methods",
    "root",
    "index",
    "autoindex",
    "return",
    "cgi",
    "allow_upload",
    "client_max_body_size",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddrV4,
    pub server_name: String,
    pub error_pages: HashMap<u16, String>,
    pub client_max_body_size: u64,
    pub locations: Vec<LocationConfig>,
}

impl ServerConfig {
    /// Locations sorted by prefix length descending, ties broken by
    /// declaration order (per `spec.md` §4.3 and §4.5).
    pub fn locations_by_specificity(&self) -> Vec<&LocationConfig> {
        let mut indexed: Vec<(usize, &LocationConfig)> = self.locations.iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| {
            b.prefix.len().cmp(&a.prefix.len()).then(ia.cmp(ib))
        });
        indexed.into_iter().map(|(_, loc)| loc).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocationConfig {
    pub prefix: String,
    pub methods: Vec<Method>,
    pub root: Option<String>,
    pub index: Vec<String>,
    pub autoindex: bool,
    pub redirect: Option<(u16, String)>,
    pub cgi: HashMap<String, String>,
    pub allow_upload: bool,
    pub max_body_size: Option<u64>,
}

struct Validator<'a> {
    source: &'a str,
    errors: Vec<ConfigError>,
}

/// Validates a parsed config tree, returning every `ServerConfig` found or
/// every semantic error encountered.
pub fn validate(root: &ConfigEntry, source: &str) -> Result<Vec<ServerConfig>, Vec<ConfigError>> {
    let mut v = Validator { source, errors: Vec::new() };
    let mut servers = Vec::new();

    for entry in &root.children {
        match entry.name() {
            Some("server") => {
                if let Some(cfg) = v.validate_server(entry) {
                    servers.push(cfg);
                }
            }
            Some(_) => {
                let tok = entry.args[0].clone();
                v.errors.push(ConfigError::UnknownEntry {
                    token: tok,
                    name: entry.name().unwrap_or_default().to_string(),
                    allowed: vec!["server".to_string()],
                });
            }
            None => {}
        }
    }

    if v.errors.is_empty() {
        Ok(servers)
    } else {
        Err(v.errors)
    }
}

impl<'a> Validator<'a> {
    fn validate_server(&mut self, entry: &ConfigEntry) -> Option<ServerConfig> {
        if entry.inline {
            self.errors.push(ConfigError::MismatchEntry {
                token: entry.args[0].clone(),
                usage: "server { ... }".to_string(),
            });
            return None;
        }

        let mut listen = None;
        let mut server_name = String::new();
        let mut error_pages = HashMap::new();
        let mut client_max_body_size = u64::MAX;
        let mut locations = Vec::new();

        for child in &entry.children {
            match child.name() {
                Some("listen") => {
                    if let Some(addr) = self.validate_listen(child) {
                        listen = Some(addr);
                    }
                }
                Some("server_name") => {
                    if let Some(name) = self.expect_inline_single(child, "server_name <name>") {
                        server_name = name.text.clone();
                    }
                }
                Some("error_page") => {
                    if let Some((code, path)) = self.validate_error_page(child) {
                        error_pages.insert(code, path);
                    }
                }
                Some("client_max_body_size") => {
                    if let Some(n) = self.validate_body_size(child) {
                        client_max_body_size = n;
                    }
                }
                Some("location") => {
                    if let Some(loc) = self.validate_location(child) {
                        locations.push(loc);
                    }
                }
                Some(other) => {
                    self.errors.push(ConfigError::UnknownEntry {
                        token: child.args[0].clone(),
                        name: other.to_string(),
                        allowed: SERVER_ENTRIES.iter().map(|s| s.to_string()).collect(),
                    });
                }
                None => {}
            }
        }

        let listen = listen?;

        Some(ServerConfig {
            listen,
            server_name,
            error_pages,
            client_max_body_size,
            locations,
        })
    }

    fn validate_location(&mut self, entry: &ConfigEntry) -> Option<LocationConfig> {
        if entry.inline || entry.args.len() != 2 {
            self.errors.push(ConfigError::MismatchEntry {
                token: entry.args[0].clone(),
                usage: "location <prefix> { ... }".to_string(),
            });
            return None;
        }

        let prefix = entry.args[1].text.clone();
        let mut loc = LocationConfig {
            prefix,
            ..Default::default()
        };

        for child in &entry.children {
            match child.name() {
                Some("methods") => {
                    if !self.expect_inline(child) {
                        continue;
                    }
                    if child.rest().is_empty() {
                        self.errors.push(ConfigError::MismatchEntry {
                            token: child.args[0].clone(),
                            usage: "methods <METHOD>...".to_string(),
                        });
                        continue;
                    }
                    for tok in child.rest() {
                        match tok.text.parse::<Method>() {
                            Ok(m) => loc.methods.push(m),
                            Err(_) => self.errors.push(ConfigError::InvalidMethod {
                                token: tok.clone(),
                                name: tok.text.clone(),
                            }),
                        }
                    }
                }
                Some("root") => {
                    if let Some(tok) = self.expect_inline_single(child, "root <dir>") {
                        loc.root = Some(tok.text.clone());
                    }
                }
                Some("index") => {
                    if !self.expect_inline(child) {
                        continue;
                    }
                    if child.rest().is_empty() {
                        self.errors.push(ConfigError::MismatchEntry {
                            token: child.args[0].clone(),
                            usage: "index <file>...".to_string(),
                        });
                        continue;
                    }
                    loc.index = child.rest().iter().map(|t| t.text.clone()).collect();
                }
                Some("autoindex") => {
                    if let Some(on) = self.validate_on_off(child, "autoindex on|off") {
                        loc.autoindex = on;
                    }
                }
                Some("allow_upload") => {
                    if let Some(on) = self.validate_on_off(child, "allow_upload on|off") {
                        loc.allow_upload = on;
                    }
                }
                Some("return") => {
                    if !self.expect_inline(child) {
                        continue;
                    }
                    if child.rest().len() != 2 {
                        self.errors.push(ConfigError::MismatchEntry {
                            token: child.args[0].clone(),
                            usage: "return <code> <url>".to_string(),
                        });
                        continue;
                    }
                    let args = child.rest();
                    if let Some(code) = self.expect_number(&args[0], 100, 599) {
                        loc.redirect = Some((code as u16, args[1].text.clone()));
                    }
                }
                Some("cgi") => {
                    if !self.expect_inline(child) {
                        continue;
                    }
                    if child.rest().len() != 2 {
                        self.errors.push(ConfigError::MismatchEntry {
                            token: child.args[0].clone(),
                            usage: "cgi <ext> <interpreter>".to_string(),
                        });
                        continue;
                    }
                    let args = child.rest();
                    loc.cgi.insert(args[0].text.clone(), args[1].text.clone());
                }
                Some("client_max_body_size") => {
                    if let Some(n) = self.validate_body_size(child) {
                        loc.max_body_size = Some(n);
                    }
                }
                Some(other) => {
                    self.errors.push(ConfigError::UnknownEntry {
                        token: child.args[0].clone(),
                        name: other.to_string(),
                        allowed: LOCATION_ENTRIES.iter().map(|s| s.to_string()).collect(),
                    });
                }
                None => {}
            }
        }

        Some(loc)
    }

    fn validate_listen(&mut self, entry: &ConfigEntry) -> Option<SocketAddrV4> {
        let tok = self.expect_inline_single(entry, "listen <addr>")?;
        parse_listen_addr(&tok.text).or_else(|| {
            self.errors.push(ConfigError::Addr { token: tok.clone() });
            None
        })
    }

    fn validate_error_page(&mut self, entry: &ConfigEntry) -> Option<(u16, String)> {
        if !self.expect_inline(entry) {
            return None;
        }
        if entry.rest().len() != 2 {
            self.errors.push(ConfigError::MismatchEntry {
                token: entry.args[0].clone(),
                usage: "error_page <code> <path>".to_string(),
            });
            return None;
        }
        let args = entry.rest();
        let code = self.expect_number(&args[0], 100, 599)?;
        Some((code as u16, args[1].text.clone()))
    }

    fn validate_body_size(&mut self, entry: &ConfigEntry) -> Option<u64> {
        let tok = self.expect_inline_single(entry, "client_max_body_size <bytes>")?;
        match &tok.kind {
            TokenKind::Number(n) if *n >= 0 => Some(*n as u64),
            TokenKind::Number(n) => {
                self.errors.push(ConfigError::NotInRange {
                    token: tok.clone(),
                    value: *n,
                    min: 0,
                    max: i64::MAX,
                });
                None
            }
            _ => {
                self.errors.push(ConfigError::MismatchEntry {
                    token: tok.clone(),
                    usage: "client_max_body_size <bytes>".to_string(),
                });
                None
            }
        }
    }

    fn validate_on_off(&mut self, entry: &ConfigEntry, usage: &str) -> Option<bool> {
        let tok = self.expect_inline_single(entry, usage)?;
        match tok.text.as_str() {
            "on" => Some(true),
            "off" => Some(false),
            _ => {
                self.errors.push(ConfigError::MismatchEntry {
                    token: tok.clone(),
                    usage: usage.to_string(),
                });
                None
            }
        }
    }

    fn expect_inline_single<'b>(&mut self, entry: &'b ConfigEntry, usage: &str) -> Option<&'b Token> {
        if !self.expect_inline(entry) {
            return None;
        }
        if entry.rest().len() != 1 {
            self.errors.push(ConfigError::MismatchEntry {
                token: entry.args[0].clone(),
                usage: usage.to_string(),
            });
            return None;
        }
        Some(&entry.rest()[0])
    }

    /// Reports [`ConfigError::NotInline`] when `entry` was declared as a
    /// `{ ... }` block but its directive requires the inline `name value...`
    /// form, distinct from [`ConfigError::MismatchEntry`]'s "inline but
    /// wrong argument count" case.
    fn expect_inline(&mut self, entry: &ConfigEntry) -> bool {
        if !entry.inline {
            self.errors.push(ConfigError::NotInline {
                token: entry.args[0].clone(),
                name: entry.name().unwrap_or_default().to_string(),
            });
            return false;
        }
        true
    }

    fn expect_number(&mut self, tok: &Token, min: i64, max: i64) -> Option<i64> {
        match &tok.kind {
            TokenKind::Number(n) if *n >= min && *n <= max => Some(*n),
            TokenKind::Number(n) => {
                self.errors.push(ConfigError::NotInRange {
                    token: tok.clone(),
                    value: *n,
                    min,
                    max,
                });
                None
            }
            _ => {
                self.errors.push(ConfigError::UnexpectedToken {
                    token: tok.clone(),
                    expected: "Number".to_string(),
                    found: tok.kind_name().to_string(),
                });
                None
            }
        }
    }
}

fn parse_listen_addr(text: &str) -> Option<SocketAddrV4> {
    let (host, port) = text.rsplit_once(':')?;
    let ip: Ipv4Addr = host.parse().ok()?;
    let port: u16 = port.parse().ok()?;
    Some(SocketAddrV4::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{entry, token};

    fn validate_src(src: &str) -> Result<Vec<ServerConfig>, Vec<ConfigError>> {
        let tokens = token::tokenize(src);
        let root = entry::parse(&tokens).expect("tokenized source should parse");
        validate(&root, src)
    }

    #[test]
    fn minimal_server_validates() {
        let src = "server {\n    listen 127.0.0.1:18080\n    location / {\n        methods GET\n        root ./www\n    }\n}\n";
        let servers = validate_src(src).unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].listen, "127.0.0.1:18080".parse().unwrap());
        assert_eq!(servers[0].locations[0].root.as_deref(), Some("./www"));
    }

    #[test]
    fn listen_without_argument_is_mismatch_entry() {
        let src = "server {\n    listen\n}\n";
        let errs = validate_src(src).unwrap_err();
        assert!(matches!(errs[0], ConfigError::MismatchEntry { .. }));
    }

    #[test]
    fn block_form_of_an_inline_only_directive_is_not_inline() {
        let src = "server {\n    listen 127.0.0.1:8080\n    server_name x {\n    }\n}\n";
        let errs = validate_src(src).unwrap_err();
        assert!(matches!(errs[0], ConfigError::NotInline { .. }));
    }

    #[test]
    fn bad_address_is_addr_error() {
        let src = "server {\n    listen notanaddress\n}\n";
        let errs = validate_src(src).unwrap_err();
        assert!(matches!(errs[0], ConfigError::Addr { .. }));
    }

    #[test]
    fn invalid_method_is_reported() {
        let src = "server {\n    listen 127.0.0.1:8080\n    location / {\n        methods PATCH\n    }\n}\n";
        let errs = validate_src(src).unwrap_err();
        assert!(matches!(errs[0], ConfigError::InvalidMethod { .. }));
    }

    #[test]
    fn unknown_top_level_entry_is_reported() {
        let errs = validate_src("frobnicate true\n").unwrap_err();
        assert!(matches!(errs[0], ConfigError::UnknownEntry { .. }));
    }

    #[test]
    fn locations_sorted_by_specificity() {
        let src = "server {\n    listen 127.0.0.1:8080\n    location / {\n        methods GET\n    }\n    location /api {\n        methods GET\n    }\n}\n";
        let servers = validate_src(src).unwrap();
        let sorted = servers[0].locations_by_specificity();
        assert_eq!(sorted[0].prefix, "/api");
        assert_eq!(sorted[1].prefix, "/");
    }
}
